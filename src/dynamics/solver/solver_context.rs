use crate::dynamics::solver::{ConstraintRow, SolverVel, ThreadContext};
use crate::dynamics::{IntegrationParameters, JointConstraint, SolverBody};
use crate::math::Real;
use std::marker::PhantomData;
use std::sync::atomic::AtomicUsize;

/// The shared state of one island solve, visible to every phase kernel.
///
/// All the slices are stored as raw pointers so that the same context can be
/// captured by every task spawned for a phase. The phase kernels uphold the
/// aliasing rules themselves:
/// - `rows` is written at disjoint ranges reserved through `row_cursor`
///   during assembly, then only through each constraint's own range;
/// - `internal_forces` is written only while solving a single
///   coloring-validated batch, so the two slots touched by a constraint are
///   exclusive to the task that claimed it;
/// - `bodies` is mutated only by the velocity and write-back passes, where
///   each body index is claimed by exactly one task;
/// - `accel_norms` and `has_feedback` are indexed by task id.
///
/// Every phase ends with a full barrier (the rayon scope join), so writes of
/// one phase are visible to the next.
pub(crate) struct SolverContext<'a> {
    pub bodies: *mut SolverBody,
    pub num_bodies: usize,
    pub constraints: *mut JointConstraint,
    pub num_constraints: usize,
    /// Constraint indices sorted by batch color.
    pub sorted_constraints: *const usize,
    pub rows: *mut ConstraintRow,
    pub internal_forces: *mut SolverVel,
    /// Body velocities snapshotted before the first sub-step.
    pub start_vels: *const SolverVel,
    /// Per-task worst residual acceleration of the current iteration.
    pub accel_norms: *mut Real,
    /// Per-task flag: did any claimed constraint request a feedback callback?
    pub has_feedback: *mut bool,
    /// Next free slot of the shared row buffer.
    pub row_cursor: &'a AtomicUsize,
    /// The work-claiming cursor of the current phase.
    pub thread: &'a ThreadContext,
    pub params: &'a IntegrationParameters,
    /// The full timestep (zero in impulse mode).
    pub dt: Real,
    /// The inverse of the full timestep (zero in impulse mode).
    pub inv_dt: Real,
    /// The sub-step timestep: `dt / max_substeps`.
    pub dt_substep: Real,
    /// The inverse sub-step timestep (zero in impulse mode).
    pub inv_dt_substep: Real,
    pub _phantom: PhantomData<&'a mut ()>,
}

// The raw pointers all originate from exclusive borrows held by the driver
// for the whole solve; disjointness of the actual accesses is documented on
// the struct and upheld by each kernel.
unsafe impl Send for SolverContext<'_> {}
unsafe impl Sync for SolverContext<'_> {}

impl SolverContext<'_> {
    /// # Safety
    /// No task may hold a mutable reference to body `i`.
    pub unsafe fn body(&self, i: usize) -> &SolverBody {
        &*self.bodies.add(i)
    }

    /// # Safety
    /// The calling task must be the only one claiming body `i` during the
    /// current phase.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn body_mut(&self, i: usize) -> &mut SolverBody {
        &mut *self.bodies.add(i)
    }

    /// # Safety
    /// No task may hold a mutable reference to constraint `i`.
    pub unsafe fn constraint(&self, i: usize) -> &JointConstraint {
        &*self.constraints.add(i)
    }

    /// # Safety
    /// The calling task must be the only one claiming constraint `i` during
    /// the current phase.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn constraint_mut(&self, i: usize) -> &mut JointConstraint {
        &mut *self.constraints.add(i)
    }

    /// The `i`-th entry of the color-sorted constraint index array.
    pub fn sorted_constraint(&self, i: usize) -> usize {
        unsafe { *self.sorted_constraints.add(i) }
    }

    /// # Safety
    /// No task may hold a mutable reference to any row of `range` during the
    /// current phase.
    pub unsafe fn rows(&self, range: std::ops::Range<usize>) -> &[ConstraintRow] {
        std::slice::from_raw_parts(self.rows.add(range.start), range.end - range.start)
    }

    /// # Safety
    /// `range` must be a row range reserved for a single constraint, and the
    /// calling task must be the only one claiming that constraint during the
    /// current phase.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn rows_mut(&self, range: std::ops::Range<usize>) -> &mut [ConstraintRow] {
        std::slice::from_raw_parts_mut(self.rows.add(range.start), range.end - range.start)
    }

    /// # Safety
    /// No task may hold a mutable reference to the accumulator of body `i`.
    pub unsafe fn internal_force(&self, i: usize) -> SolverVel {
        *self.internal_forces.add(i)
    }

    /// # Safety
    /// The batch coloring must guarantee that no other task of the current
    /// phase touches the accumulator of body `i`.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn internal_force_mut(&self, i: usize) -> &mut SolverVel {
        &mut *self.internal_forces.add(i)
    }

    /// The pre-solve velocity snapshot of body `i`.
    pub fn start_vel(&self, i: usize) -> SolverVel {
        unsafe { *self.start_vels.add(i) }
    }

    /// # Safety
    /// `task_id` must be the id of the calling task.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn accel_norm_mut(&self, task_id: usize) -> &mut Real {
        &mut *self.accel_norms.add(task_id)
    }

    /// # Safety
    /// `task_id` must be the id of the calling task.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn has_feedback_mut(&self, task_id: usize) -> &mut bool {
        &mut *self.has_feedback.add(task_id)
    }

    /// Zeroes every per-task residual slot. Only called between phase
    /// barriers, while no task is running.
    pub fn reset_accel_norms(&self, num_tasks: usize) {
        for task_id in 0..num_tasks {
            unsafe { *self.accel_norm_mut(task_id) = 0.0 };
        }
    }

    /// The worst residual acceleration reported by any task. Only called
    /// between phase barriers.
    pub fn max_accel_norm(&self, num_tasks: usize) -> Real {
        (0..num_tasks)
            .map(|task_id| unsafe { *self.accel_norm_mut(task_id) })
            .fold(0.0, Real::max)
    }

    /// Did any task encounter a constraint requesting the post-solve
    /// callback? Only called between phase barriers.
    pub fn any_feedback(&self, num_tasks: usize) -> bool {
        (0..num_tasks).any(|task_id| unsafe { *self.has_feedback_mut(task_id) })
    }
}
