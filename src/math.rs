//! Type aliases for the math primitives used by the solver.

/// The scalar type used throughout the solver.
pub type Real = f32;

/// The linear 3D vector type.
pub type Vector = na::Vector3<Real>;

/// The angular 3D vector type (angular velocities, torques).
pub type AngVector = na::Vector3<Real>;

/// A world-space angular inertia matrix.
pub type AngularInertia = na::Matrix3<Real>;
