use crate::math::{AngVector, Vector};
use num::Zero;
use std::ops::{Add, AddAssign};

/// A linear/angular pair, used both for the per-body internal force/torque
/// accumulators and for velocity snapshots.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolverVel {
    /// The linear part (force or linear velocity).
    pub linear: Vector,
    /// The angular part (torque or angular velocity).
    pub angular: AngVector,
}

impl SolverVel {
    /// A pair with both parts zeroed.
    pub fn zero() -> Self {
        Self {
            linear: na::zero(),
            angular: na::zero(),
        }
    }
}

impl Add for SolverVel {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            linear: self.linear + rhs.linear,
            angular: self.angular + rhs.angular,
        }
    }
}

impl AddAssign for SolverVel {
    fn add_assign(&mut self, rhs: Self) {
        self.linear += rhs.linear;
        self.angular += rhs.angular;
    }
}

impl Zero for SolverVel {
    fn zero() -> Self {
        Self {
            linear: na::zero(),
            angular: na::zero(),
        }
    }

    fn is_zero(&self) -> bool {
        self.linear.is_zero() && self.angular.is_zero()
    }
}
