use crate::math::{AngVector, Real, Vector};

/// The contribution of one constraint row to one body: how the row's relative
/// velocity depends on that body's linear and angular velocities.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Jacobian {
    /// The linear part of the Jacobian.
    pub linear: Vector,
    /// The angular part of the Jacobian.
    pub angular: AngVector,
}

impl Jacobian {
    /// A Jacobian with the given linear and angular parts.
    pub fn new(linear: Vector, angular: AngVector) -> Self {
        Self { linear, angular }
    }

    /// A zero Jacobian.
    pub fn zero() -> Self {
        Self {
            linear: na::zero(),
            angular: na::zero(),
        }
    }
}

/// The Jacobians of one constraint row for both constrained bodies.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JacobianPair {
    /// The Jacobian of the first body.
    pub body1: Jacobian,
    /// The Jacobian of the second body.
    pub body2: Jacobian,
}

impl JacobianPair {
    /// A pair of zero Jacobians.
    pub fn zero() -> Self {
        Self {
            body1: Jacobian::zero(),
            body2: Jacobian::zero(),
        }
    }

    /// The pair `(J, -J)` of a purely linear constraint along `axis`:
    /// equal and opposite contributions, no angular part.
    pub fn linear_coupling(axis: Vector) -> Self {
        Self {
            body1: Jacobian::new(axis, na::zero()),
            body2: Jacobian::new(-axis, na::zero()),
        }
    }

    /// The pair `(J, -J)` of a purely angular constraint about `axis`, as
    /// the off-axis rows of a hinge are.
    pub fn angular_coupling(axis: AngVector) -> Self {
        Self {
            body1: Jacobian::new(na::zero(), axis),
            body2: Jacobian::new(na::zero(), -axis),
        }
    }
}

/// One degree of freedom of a constraint, assembled by the Jacobian builder
/// and refined in place by the force iteration.
///
/// Rows live in a single shared buffer; each constraint owns the contiguous
/// range reserved for it during assembly, so builders running on different
/// threads never collide.
#[derive(Copy, Clone, Debug)]
pub struct ConstraintRow {
    /// The Jacobian pair of this degree of freedom.
    pub jacobian: JacobianPair,
    /// The accumulated constraint force, warm-started from the previous
    /// timestep's feedback.
    pub force: Real,
    /// Diagonal damping: `JM⁻¹Jᵀ` scaled by the row's stiffness.
    pub diag_damp: Real,
    /// The inverse effective mass of the row: `1 / (JM⁻¹Jᵀ · (1 + s))`.
    pub inv_diag: Real,
    /// The desired relative acceleration along this row for the current
    /// sub-step.
    pub coordinate_accel: Real,
    /// The external-acceleration contribution snapshot taken during assembly,
    /// available to the acceleration callback on every sub-step.
    pub delta_accel: Real,
    /// Restitution term, untouched by the solver.
    pub restitution: Real,
    /// Penetration term, untouched by the solver.
    pub penetration: Real,
    /// Penetration stiffness term, untouched by the solver.
    pub penetration_stiffness: Real,
    /// Lower force bound (or friction coefficient if the row is coupled).
    pub lower_bound: Real,
    /// Upper force bound (or friction coefficient if the row is coupled).
    pub upper_bound: Real,
    /// [`crate::dynamics::BILATERAL_ROW`], or the index within the same
    /// constraint of the normal-force row scaling this row's bounds. Must
    /// refer to a row solved earlier in the same sweep.
    pub coupled_row: i32,
    /// Motor rows skip the velocity-error refresh of `coordinate_accel`.
    pub is_motor: bool,
    /// Peak `|force|` observed during the solve, for the impulse estimate
    /// reported in the joint feedback.
    pub max_impact: Real,
}

impl ConstraintRow {
    pub(crate) fn zeroed() -> Self {
        Self {
            jacobian: JacobianPair::zero(),
            force: 0.0,
            diag_damp: 0.0,
            inv_diag: 0.0,
            coordinate_accel: 0.0,
            delta_accel: 0.0,
            restitution: 0.0,
            penetration: 0.0,
            penetration_stiffness: 0.0,
            lower_bound: -Real::MAX,
            upper_bound: Real::MAX,
            coupled_row: crate::dynamics::BILATERAL_ROW,
            is_motor: false,
            max_impact: 0.0,
        }
    }
}
