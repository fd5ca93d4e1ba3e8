//! # Impulsion
//!
//! Impulsion is a parallel constraint solver for rigid-body simulation. It takes
//! a set of joint constraints between rigid bodies and computes the corrective
//! forces/impulses that keep those constraints satisfied, using an iterative
//! projected Gauss-Seidel method.
//!
//! The solver is an in-process numerical kernel: broad-phase collision detection,
//! island discovery, and the concrete joint types are the responsibility of the
//! caller. A joint only has to implement the [`dynamics::JointDynamics`] trait
//! (a Jacobian-derivative callback and an acceleration callback).
//!
//! Two drivers are provided:
//! - [`dynamics::IslandSolver`] runs every solver phase on the calling thread.
//! - [`dynamics::ParallelIslandSolver`] partitions the constraints into
//!   conflict-free batches by graph coloring and distributes each phase across
//!   the rayon thread pool, so that no two threads ever write to the same
//!   body's force accumulators concurrently.

#![deny(bare_trait_objects)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub extern crate nalgebra as na;
#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;
extern crate num_traits as num;

pub mod counters;
pub mod dynamics;
pub mod math;
pub mod utils;

/// Prelude re-exporting the types needed to drive the solver.
pub mod prelude {
    pub use crate::dynamics::{
        AccelerationDescriptor, ConstraintDescriptor, ConstraintRowDesc, IntegrationParameters,
        IslandSolver, JointConstraint, JointDynamics, JointFeedback, ParallelIslandSolver,
        SolverBody, BILATERAL_ROW, MAX_CONSTRAINT_ROWS,
    };
    pub use crate::math::{AngVector, AngularInertia, Real, Vector};
}
