//! The iterative constraint solver core: batch partitioning, Jacobian
//! assembly, the projected Gauss-Seidel force iteration, and velocity
//! integration.

pub use self::constraint_batches::ConstraintBatches;
pub use self::island_solver::IslandSolver;
pub use self::jacobian::{ConstraintRow, Jacobian, JacobianPair};
pub use self::parallel_island_solver::ParallelIslandSolver;
pub use self::solver_vel::SolverVel;

pub(crate) use self::scheduler::ThreadContext;
pub(crate) use self::solver_context::SolverContext;

mod constraint_batches;
mod island_solver;
mod jacobian;
mod jacobian_builder;
mod parallel_island_solver;
mod scheduler;
mod solver_context;
mod solver_vel;
mod velocity_solver;

#[cfg(test)]
pub(crate) mod test_fixtures;
