use crate::math::{AngVector, AngularInertia, Real, Vector};
use crate::utils;

/// The dynamics state of one rigid body, as seen by the constraint solver.
///
/// The solver owns none of this long-term: the caller populates a
/// `&mut [SolverBody]` slice once per island per timestep (gravity and other
/// external forces already accumulated into `ext_force`/`ext_torque`), the
/// solver updates `linvel`/`angvel` in place, and the slice is discarded or
/// reused for the next timestep.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SolverBody {
    /// The inverse of the body's mass. Zero makes the body static: it never
    /// receives impulses and induces no batching conflicts.
    pub inv_mass: Real,
    /// The inverse of the body's angular inertia tensor, in world space.
    pub inv_world_inertia: AngularInertia,
    /// The body's linear velocity.
    pub linvel: Vector,
    /// The body's angular velocity.
    pub angvel: AngVector,
    /// External force accumulated on this body for the current timestep.
    pub ext_force: Vector,
    /// External torque accumulated on this body for the current timestep.
    pub ext_torque: AngVector,
    /// Net linear acceleration actually applied over the last timestep
    /// (constraint forces included). Written by the solver, zeroed when below
    /// the convergence tolerance.
    pub net_accel: Vector,
    /// Net angular acceleration actually applied over the last timestep.
    /// Written by the solver.
    pub net_alpha: AngVector,
    /// Whether this body is in stable equilibrium. Resting bodies skip
    /// velocity integration until a large enough velocity step wakes them up.
    pub resting: bool,
}

impl SolverBody {
    /// A dynamic body of the given mass, with a diagonal (principal) angular
    /// inertia, at rest.
    pub fn dynamic(mass: Real, principal_inertia: Vector) -> Self {
        Self {
            inv_mass: utils::inv(mass),
            inv_world_inertia: AngularInertia::from_diagonal(&principal_inertia.map(utils::inv)),
            ..Self::fixed()
        }
    }

    /// A static (immovable) body.
    pub fn fixed() -> Self {
        Self {
            inv_mass: 0.0,
            inv_world_inertia: AngularInertia::zeros(),
            linvel: Vector::zeros(),
            angvel: AngVector::zeros(),
            ext_force: Vector::zeros(),
            ext_torque: AngVector::zeros(),
            net_accel: Vector::zeros(),
            net_alpha: AngVector::zeros(),
            resting: false,
        }
    }

    /// Is this body static (infinite mass)?
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }
}
