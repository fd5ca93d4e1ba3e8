//! Structures related to the dynamics of the constraint solver: rigid-body
//! state, joint constraints, and the solver itself.

pub use self::integration_parameters::IntegrationParameters;
pub use self::joint::{
    AccelerationDescriptor, ConstraintDescriptor, ConstraintRowDesc, JointConstraint,
    JointDynamics, JointFeedback, BILATERAL_ROW, MAX_CONSTRAINT_ROWS,
};
pub use self::solver::{
    ConstraintBatches, ConstraintRow, IslandSolver, Jacobian, JacobianPair, ParallelIslandSolver,
    SolverVel,
};
pub use self::solver_body::SolverBody;

mod integration_parameters;
mod joint;
pub mod solver;
mod solver_body;
