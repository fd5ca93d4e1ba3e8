//! The rayon-based parallel island solve driver.

use crate::counters::Counters;
use crate::dynamics::solver::island_solver::{solve_island, SolverWorkspace};
use crate::dynamics::{IntegrationParameters, JointConstraint, SolverBody};
use crate::math::Real;

/// A driver distributing every solver phase across the rayon thread pool.
///
/// Worker tasks claim work from a shared atomic cursor, and each phase ends
/// with a full barrier before the next one starts. Within the force
/// iteration the batches produced by the graph coloring are processed one at
/// a time, so no two tasks ever write to the same body's force accumulators.
///
/// The result matches [`super::IslandSolver`] up to floating-point
/// accumulation order, which depends on the order tasks claim constraints.
pub struct ParallelIslandSolver {
    workspace: SolverWorkspace,
    num_tasks: usize,
    /// Performance counters of the last solve.
    pub counters: Counters,
}

impl ParallelIslandSolver {
    /// Creates a parallel solver spawning one task per thread of the global
    /// rayon pool.
    pub fn new() -> Self {
        Self::with_num_tasks(rayon::current_num_threads())
    }

    /// Creates a parallel solver spawning `num_tasks` tasks per phase.
    pub fn with_num_tasks(num_tasks: usize) -> Self {
        assert!(num_tasks > 0, "at least one solver task is required");
        Self {
            workspace: SolverWorkspace::new(),
            num_tasks,
            counters: Counters::new(false),
        }
    }

    /// Resolves the constraints of one island and integrates the body
    /// velocities over `dt`. See [`super::IslandSolver::solve`].
    pub fn solve(
        &mut self,
        params: &IntegrationParameters,
        bodies: &mut [SolverBody],
        constraints: &mut [JointConstraint],
        dt: Real,
    ) {
        self.counters.reset();
        self.counters.step_started();
        solve_island(
            &mut self.workspace,
            &mut self.counters,
            params,
            bodies,
            constraints,
            dt,
            self.num_tasks,
        );
        self.counters.step_completed();
    }
}

impl Default for ParallelIslandSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::solver::test_fixtures::AxisConstraint;
    use crate::dynamics::IslandSolver;
    use crate::math::Vector;
    use approx::assert_relative_eq;
    use rand::prelude::*;
    use std::sync::Arc;

    const DT: Real = 1.0 / 60.0;

    // A chain of bodies with randomized masses, inertias, and external
    // loads, joined along alternating linear axes with a hinge-style angular
    // lock every third link. Consecutive constraints share a body, so the
    // coloring has to produce at least two batches.
    fn chain_scenario(num_bodies: usize, seed: u64) -> (Vec<SolverBody>, Vec<JointConstraint>) {
        let mut rng = StdRng::seed_from_u64(seed);

        let bodies = (0..num_bodies)
            .map(|_| {
                let mut body = SolverBody::dynamic(
                    rng.gen_range(0.5..4.0),
                    Vector::new(1.0, 1.0, 1.0) * rng.gen_range(0.5..2.0),
                );
                body.ext_force = Vector::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-20.0..0.0),
                    rng.gen_range(-5.0..5.0),
                );
                body.ext_torque = Vector::new(
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                );
                body
            })
            .collect();

        let constraints = (0..num_bodies - 1)
            .map(|i| {
                let dynamics = match i % 3 {
                    0 => AxisConstraint::new(Vector::y()),
                    1 => AxisConstraint::new(Vector::x()),
                    _ => AxisConstraint::angular(Vector::z()),
                };
                JointConstraint::new(i, i + 1, Arc::new(dynamics))
            })
            .collect();

        (bodies, constraints)
    }

    #[test]
    fn parallel_solve_matches_the_sequential_solve() {
        let (mut seq_bodies, mut seq_constraints) = chain_scenario(40, 7);
        let (mut par_bodies, mut par_constraints) = chain_scenario(40, 7);
        let params = IntegrationParameters::default();

        let mut sequential = IslandSolver::new();
        sequential.solve(&params, &mut seq_bodies, &mut seq_constraints, DT);

        let mut parallel = ParallelIslandSolver::with_num_tasks(4);
        parallel.solve(&params, &mut par_bodies, &mut par_constraints, DT);

        assert!(parallel.counters.solver.nbatches >= 2);

        for (seq, par) in seq_bodies.iter().zip(par_bodies.iter()) {
            assert_relative_eq!(seq.linvel, par.linvel, epsilon = 1.0e-4);
            assert_relative_eq!(seq.angvel, par.angvel, epsilon = 1.0e-4);
        }
        for (seq, par) in seq_constraints.iter().zip(par_constraints.iter()) {
            assert_relative_eq!(
                seq.feedback[0].force,
                par.feedback[0].force,
                epsilon = 1.0e-3
            );
        }
    }

    #[test]
    fn repeated_parallel_solves_stay_finite() {
        let (mut bodies, mut constraints) = chain_scenario(25, 42);
        let params = IntegrationParameters::default();
        let mut solver = ParallelIslandSolver::with_num_tasks(4);

        for _ in 0..30 {
            solver.solve(&params, &mut bodies, &mut constraints, DT);
        }

        for body in &bodies {
            assert!(body.linvel.iter().all(|x| x.is_finite()));
            assert!(body.angvel.iter().all(|x| x.is_finite()));
        }
        for constraint in &constraints {
            assert!(constraint.feedback[0].force.is_finite());
        }
    }

    #[test]
    fn parallel_zero_constraint_island_is_a_no_op() {
        let params = IntegrationParameters::default();
        let mut bodies = vec![SolverBody::dynamic(1.0, Vector::new(1.0, 1.0, 1.0))];
        bodies[0].linvel = Vector::new(0.0, 3.0, 0.0);

        let mut solver = ParallelIslandSolver::with_num_tasks(4);
        solver.solve(&params, &mut bodies, &mut [], DT);

        assert_eq!(bodies[0].linvel, Vector::new(0.0, 3.0, 0.0));
    }
}
