//! The sequential island solve driver and the per-solve workspace.

use crate::counters::Counters;
use crate::dynamics::solver::jacobian_builder::{build_jacobian_kernel, scatter_warm_start_kernel};
use crate::dynamics::solver::scheduler::fork_join;
use crate::dynamics::solver::velocity_solver::{
    feedback_callbacks_kernel, integrate_impulses_kernel, integrate_velocities_kernel,
    joint_accelerations_kernel, joint_forces_kernel, write_feedback_kernel, write_net_accels_kernel,
};
use crate::dynamics::solver::{
    ConstraintBatches, ConstraintRow, SolverContext, SolverVel, ThreadContext,
};
use crate::dynamics::{IntegrationParameters, JointConstraint, SolverBody, MAX_CONSTRAINT_ROWS};
use crate::math::Real;
use crate::utils;
use log::{debug, trace};
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of indices a task claims from the phase cursor at a time.
const CLAIM_BATCH_SIZE: usize = 8;

/// Buffers reused across island solves: the batch partition, the shared row
/// buffer, the per-body accumulators, and the per-task scratch slots.
pub(crate) struct SolverWorkspace {
    pub batches: ConstraintBatches,
    pub rows: Vec<ConstraintRow>,
    pub internal_forces: Vec<SolverVel>,
    pub start_vels: Vec<SolverVel>,
    pub accel_norms: Vec<Real>,
    pub has_feedback: Vec<bool>,
    pub row_cursor: AtomicUsize,
    pub thread: ThreadContext,
}

impl SolverWorkspace {
    pub fn new() -> Self {
        Self {
            batches: ConstraintBatches::new(),
            rows: Vec::new(),
            internal_forces: Vec::new(),
            start_vels: Vec::new(),
            accel_norms: Vec::new(),
            has_feedback: Vec::new(),
            row_cursor: AtomicUsize::new(0),
            thread: ThreadContext::new(CLAIM_BATCH_SIZE),
        }
    }

    /// Partitions the constraints into conflict-free batches and sizes every
    /// per-solve buffer. The body velocities are snapshotted here for the
    /// net-acceleration write-back at the end of the solve.
    pub fn prepare(
        &mut self,
        bodies: &[SolverBody],
        constraints: &[JointConstraint],
        num_tasks: usize,
    ) {
        self.batches.partition(bodies, constraints);

        self.rows.clear();
        self.rows
            .resize(constraints.len() * MAX_CONSTRAINT_ROWS, ConstraintRow::zeroed());
        self.internal_forces.clear();
        self.internal_forces.resize(bodies.len(), SolverVel::zero());
        self.start_vels.clear();
        self.start_vels.extend(bodies.iter().map(|body| SolverVel {
            linear: body.linvel,
            angular: body.angvel,
        }));
        self.accel_norms.clear();
        self.accel_norms.resize(num_tasks, 0.0);
        self.has_feedback.clear();
        self.has_feedback.resize(num_tasks, false);
        self.row_cursor.store(0, Ordering::SeqCst);
    }

    /// Exposes the workspace and the caller's body/constraint slices as a
    /// single context shareable by every task of the solve.
    pub fn context<'a>(
        &'a mut self,
        bodies: &'a mut [SolverBody],
        constraints: &'a mut [JointConstraint],
        params: &'a IntegrationParameters,
        dt: Real,
    ) -> SolverContext<'a> {
        let inv_dt = utils::inv(dt);

        SolverContext {
            bodies: bodies.as_mut_ptr(),
            num_bodies: bodies.len(),
            constraints: constraints.as_mut_ptr(),
            num_constraints: constraints.len(),
            sorted_constraints: self.batches.sorted_constraints().as_ptr(),
            rows: self.rows.as_mut_ptr(),
            internal_forces: self.internal_forces.as_mut_ptr(),
            start_vels: self.start_vels.as_ptr(),
            accel_norms: self.accel_norms.as_mut_ptr(),
            has_feedback: self.has_feedback.as_mut_ptr(),
            row_cursor: &self.row_cursor,
            thread: &self.thread,
            params,
            dt,
            inv_dt,
            dt_substep: dt / params.max_substeps as Real,
            inv_dt_substep: inv_dt * params.max_substeps as Real,
            _phantom: PhantomData,
        }
    }
}

/// Runs the full solve pipeline on `num_tasks` tasks: Jacobian assembly and
/// warm-start scatter, then per-sub-step accelerate/iterate/integrate, then
/// the feedback and net-acceleration write-backs.
pub(crate) fn solve_island(
    workspace: &mut SolverWorkspace,
    counters: &mut Counters,
    params: &IntegrationParameters,
    bodies: &mut [SolverBody],
    constraints: &mut [JointConstraint],
    dt: Real,
    num_tasks: usize,
) {
    assert!(params.max_substeps > 0, "at least one sub-step is required");

    workspace.prepare(bodies, constraints, num_tasks);
    counters.solver.nconstraints = constraints.len();
    counters.solver.nbatches = workspace.batches.num_batches();

    debug!(
        "solving island: {} bodies, {} constraints, {} batches, {} tasks",
        bodies.len(),
        constraints.len(),
        workspace.batches.num_batches(),
        num_tasks
    );

    let batch_ranges: Vec<Range<usize>> = (0..workspace.batches.num_batches())
        .map(|i| workspace.batches.batch_range(i))
        .collect();
    let ctx = workspace.context(bodies, constraints, params, dt);

    counters.assembly_started();
    ctx.thread.reset(0);
    fork_join(num_tasks, |_| build_jacobian_kernel(&ctx));

    for range in &batch_ranges {
        ctx.thread.reset(range.start);
        fork_join(num_tasks, |_| scatter_warm_start_kernel(&ctx, range.end));
    }
    counters.assembly_completed();
    counters.solver.nrows = ctx.row_cursor.load(Ordering::SeqCst);

    let mut first_pass = true;
    for _ in 0..params.max_substeps {
        counters.resolution_started();
        ctx.thread.reset(0);
        fork_join(num_tasks, |_| joint_accelerations_kernel(&ctx, first_pass));
        first_pass = false;

        // Non-convergence at the iteration cap is not an error: the forces
        // computed so far are the accepted approximation.
        let mut accel_norm = params.max_error * 2.0;
        let mut iterations = 0;

        while iterations < params.max_iterations && accel_norm > params.max_error {
            ctx.reset_accel_norms(num_tasks);

            for range in &batch_ranges {
                ctx.thread.reset(range.start);
                fork_join(num_tasks, |task_id| {
                    joint_forces_kernel(&ctx, range.end, task_id)
                });
            }

            accel_norm = ctx.max_accel_norm(num_tasks);
            iterations += 1;
        }

        if accel_norm > params.max_error {
            trace!(
                "iteration cap reached with residual {} > {}",
                accel_norm,
                params.max_error
            );
        }

        counters.solver.niterations += iterations;
        counters.resolution_completed();

        counters.velocity_update_started();
        ctx.thread.reset(0);
        if ctx.dt != 0.0 {
            fork_join(num_tasks, |_| integrate_velocities_kernel(&ctx));
        } else {
            fork_join(num_tasks, |_| integrate_impulses_kernel(&ctx));
        }
        counters.velocity_update_completed();
    }

    counters.writeback_started();
    ctx.thread.reset(0);
    fork_join(num_tasks, |task_id| write_feedback_kernel(&ctx, task_id));

    // No meaningful acceleration can be derived from a zero-duration solve.
    if ctx.dt != 0.0 {
        ctx.thread.reset(0);
        fork_join(num_tasks, |_| write_net_accels_kernel(&ctx));
    }

    if ctx.any_feedback(num_tasks) {
        ctx.thread.reset(0);
        fork_join(num_tasks, |task_id| feedback_callbacks_kernel(&ctx, task_id));
    }
    counters.writeback_completed();
}

/// A sequential driver running every solver phase on the calling thread.
///
/// It shares its phase kernels with [`super::ParallelIslandSolver`], claims
/// work in index order, and is therefore deterministic: two runs over the
/// same inputs produce bit-identical results.
pub struct IslandSolver {
    workspace: SolverWorkspace,
    /// Performance counters of the last solve.
    pub counters: Counters,
}

impl IslandSolver {
    /// Creates a new sequential island solver.
    pub fn new() -> Self {
        Self {
            workspace: SolverWorkspace::new(),
            counters: Counters::new(false),
        }
    }

    /// Resolves the constraints of one island and integrates the body
    /// velocities over `dt`.
    ///
    /// A zero `dt` switches the solver to impulse mode: the accumulated
    /// constraint values are applied to the velocities without timestep
    /// scaling.
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
            1,
        );
        self.counters.step_completed();
    }
}

impl Default for IslandSolver {
    fn default() -> Self {
        Self::new()
    }
}
