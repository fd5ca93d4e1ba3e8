//! The projected Gauss-Seidel force iteration and the velocity passes.

use crate::dynamics::solver::scheduler::concurrent_loop;
use crate::dynamics::solver::SolverContext;
use crate::dynamics::{AccelerationDescriptor, MAX_CONSTRAINT_ROWS};
use crate::math::Real;

/// Refreshes the desired row accelerations for the current sub-step.
///
/// On the first sub-step every constraint is refreshed; on the later
/// sub-steps a constraint whose two bodies are both resting keeps its rows
/// untouched, matching the resting skip of the force iteration.
pub(crate) fn joint_accelerations_kernel(ctx: &SolverContext, first_pass: bool) {
    let cursor = &ctx.thread.cursor;

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, ctx.num_constraints] {
            let constraint = unsafe { ctx.constraint(i) };
            let body1 = unsafe { ctx.body(constraint.body1) };
            let body2 = unsafe { ctx.body(constraint.body2) };

            if first_pass || !(body1.resting && body2.resting) {
                let mut desc = AccelerationDescriptor {
                    rows: unsafe { ctx.rows_mut(constraint.row_range()) },
                    body1,
                    body2,
                    dt: ctx.dt_substep,
                    inv_dt: ctx.inv_dt_substep,
                    first_pass,
                };
                constraint.dynamics.joint_accelerations(&mut desc);
            }
        }
    }
}

/// One projected Gauss-Seidel sweep over the constraints of a single batch.
///
/// The phase cursor must be preset to the batch start and `batch_end` to its
/// end: the coloring of the batch is what makes the unguarded accumulator
/// writes race-free. The worst residual acceleration observed by this task is
/// merged into its `accel_norms` slot for the convergence check.
pub(crate) fn joint_forces_kernel(ctx: &SolverContext, batch_end: usize, task_id: usize) {
    let cursor = &ctx.thread.cursor;
    let mut acc_norm: Real = unsafe { *ctx.accel_norm_mut(task_id) };

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, batch_end] {
            let constraint = unsafe { ctx.constraint(ctx.sorted_constraint(i)) };
            let body1 = unsafe { ctx.body(constraint.body1) };
            let body2 = unsafe { ctx.body(constraint.body2) };

            if !(body1.resting && body2.resting) {
                let rows = unsafe { ctx.rows_mut(constraint.row_range()) };
                let mut f1 = unsafe { ctx.internal_force(constraint.body1) };
                let mut f2 = unsafe { ctx.internal_force(constraint.body2) };

                // Forces solved earlier in this sweep, for friction coupling.
                let mut solved_force = [1.0; MAX_CONSTRAINT_ROWS];

                for k in 0..rows.len() {
                    let row = &mut rows[k];

                    let jminv_linear1 = row.jacobian.body1.linear * body1.inv_mass;
                    let jminv_angular1 = body1.inv_world_inertia * row.jacobian.body1.angular;
                    let jminv_linear2 = row.jacobian.body2.linear * body2.inv_mass;
                    let jminv_angular2 = body2.inv_world_inertia * row.jacobian.body2.angular;

                    let a = row.coordinate_accel
                        - row.force * row.diag_damp
                        - (jminv_linear1.dot(&f1.linear)
                            + jminv_angular1.dot(&f1.angular)
                            + jminv_linear2.dot(&f2.linear)
                            + jminv_angular2.dot(&f2.angular));
                    let mut f = row.force + row.inv_diag * a;

                    let coupling = if row.coupled_row < 0 {
                        1.0
                    } else {
                        solved_force[row.coupled_row as usize]
                    };
                    let lower = coupling * row.lower_bound;
                    let upper = coupling * row.upper_bound;

                    // A clamped row contributes no residual: it cannot be
                    // corrected any further this iteration.
                    let mut residual = a;
                    if f > upper {
                        f = upper;
                        residual = 0.0;
                    } else if f < lower {
                        f = lower;
                        residual = 0.0;
                    }
                    debug_assert!(f.is_finite());

                    acc_norm = acc_norm.max(residual.abs());

                    let delta = f - row.force;
                    row.force = f;
                    row.max_impact = row.max_impact.max(f.abs());
                    solved_force[k] = f;

                    f1.linear += row.jacobian.body1.linear * delta;
                    f1.angular += row.jacobian.body1.angular * delta;
                    f2.linear += row.jacobian.body2.linear * delta;
                    f2.angular += row.jacobian.body2.angular * delta;
                }

                if !body1.is_static() {
                    *unsafe { ctx.internal_force_mut(constraint.body1) } = f1;
                }
                if !body2.is_static() {
                    *unsafe { ctx.internal_force_mut(constraint.body2) } = f2;
                }
            }
        }
    }

    unsafe { *ctx.accel_norm_mut(task_id) = acc_norm };
}

/// Integrates the accumulated internal forces plus the external forces into
/// the body velocities over one sub-step.
///
/// Resting bodies skip the integration; a step large enough to exceed the
/// freeze threshold clears the resting flag instead of being applied, and the
/// body integrates normally from the next sub-step on.
pub(crate) fn integrate_velocities_kernel(ctx: &SolverContext) {
    let cursor = &ctx.thread.cursor;
    let freeze_speed2 = ctx.params.freeze_speed2;

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, ctx.num_bodies] {
            let body = unsafe { ctx.body_mut(i) };
            let accumulated = unsafe { ctx.internal_force(i) };

            let force = accumulated.linear + body.ext_force;
            let torque = accumulated.angular + body.ext_torque;
            let linvel_step = force * (body.inv_mass * ctx.dt_substep);
            let angvel_step = (body.inv_world_inertia * torque) * ctx.dt_substep;

            if !body.resting {
                body.linvel += linvel_step;
                body.angvel += angvel_step;
            } else if linvel_step.norm_squared() > freeze_speed2
                || angvel_step.norm_squared() > freeze_speed2
            {
                body.resting = false;
            }
        }
    }
}

/// Zero-timestep variant of the velocity pass: the accumulated values are
/// impulses (momenta), applied to the velocities without any timestep
/// scaling. External forces do not contribute since no time elapses.
pub(crate) fn integrate_impulses_kernel(ctx: &SolverContext) {
    let cursor = &ctx.thread.cursor;

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, ctx.num_bodies] {
            let body = unsafe { ctx.body_mut(i) };
            let momentum = unsafe { ctx.internal_force(i) };

            body.linvel += momentum.linear * body.inv_mass;
            body.angvel += body.inv_world_inertia * momentum.angular;
        }
    }
}

/// Copies the final per-row forces and impulse estimates into the joints'
/// feedback slots, and records whether any claimed constraint wants the
/// post-solve callback.
pub(crate) fn write_feedback_kernel(ctx: &SolverContext, task_id: usize) {
    let cursor = &ctx.thread.cursor;
    let mut any_feedback = false;

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, ctx.num_constraints] {
            let constraint = unsafe { ctx.constraint_mut(i) };
            let rows = unsafe { ctx.rows(constraint.row_range()) };

            for (feedback, row) in constraint.feedback.iter_mut().zip(rows.iter()) {
                debug_assert!(row.force.is_finite());
                feedback.force = row.force;
                feedback.impulse = row.max_impact * ctx.dt_substep;
            }

            any_feedback |= constraint.dynamics.has_feedback();
        }
    }

    unsafe { *ctx.has_feedback_mut(task_id) |= any_feedback };
}

/// Derives the net acceleration actually applied to each body over the whole
/// timestep by comparing its velocity with the pre-solve snapshot.
/// Accelerations below the convergence tolerance are flushed to zero.
pub(crate) fn write_net_accels_kernel(ctx: &SolverContext) {
    let cursor = &ctx.thread.cursor;
    let max_accel2 = ctx.params.max_error * ctx.params.max_error;

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, ctx.num_bodies] {
            let body = unsafe { ctx.body_mut(i) };
            let start = ctx.start_vel(i);

            let mut accel = (body.linvel - start.linear) * ctx.inv_dt;
            let mut alpha = (body.angvel - start.angular) * ctx.inv_dt;

            if accel.norm_squared() < max_accel2 {
                accel = na::zero();
            }
            if alpha.norm_squared() < max_accel2 {
                alpha = na::zero();
            }

            body.net_accel = accel;
            body.net_alpha = alpha;
        }
    }
}

/// Invokes the post-solve callback of every constraint that asked for one.
pub(crate) fn feedback_callbacks_kernel(ctx: &SolverContext, task_id: usize) {
    let cursor = &ctx.thread.cursor;

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, ctx.num_constraints] {
            let constraint = unsafe { ctx.constraint(i) };
            if constraint.dynamics.has_feedback() {
                constraint
                    .dynamics
                    .on_feedback(constraint.row_feedback(), ctx.dt, task_id);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::solver::island_solver::SolverWorkspace;
    use crate::dynamics::solver::SolverVel;
    use crate::dynamics::{IntegrationParameters, SolverBody};
    use crate::math::Vector;
    use approx::assert_relative_eq;

    #[test]
    fn resting_body_is_frozen_below_threshold() {
        let params = IntegrationParameters::default();
        let mut bodies = vec![SolverBody::dynamic(1.0, Vector::new(1.0, 1.0, 1.0))];
        bodies[0].resting = true;
        bodies[0].linvel = Vector::new(0.5, 0.0, 0.0);
        // A tiny force: the resulting step is far below the freeze threshold.
        bodies[0].ext_force = Vector::new(1.0e-4, 0.0, 0.0);

        let mut workspace = SolverWorkspace::new();
        workspace.prepare(&bodies, &[], 1);
        let mut constraints = vec![];
        let ctx = workspace.context(&mut bodies, &mut constraints, &params, 1.0 / 60.0);
        integrate_velocities_kernel(&ctx);

        assert!(bodies[0].resting);
        assert_eq!(bodies[0].linvel, Vector::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn resting_body_wakes_on_a_large_step() {
        let params = IntegrationParameters::default();
        let mut bodies = vec![SolverBody::dynamic(1.0, Vector::new(1.0, 1.0, 1.0))];
        bodies[0].resting = true;
        bodies[0].ext_force = Vector::new(100.0, 0.0, 0.0);

        let mut workspace = SolverWorkspace::new();
        workspace.prepare(&bodies, &[], 1);
        let mut constraints = vec![];
        let ctx = workspace.context(&mut bodies, &mut constraints, &params, 1.0 / 60.0);
        integrate_velocities_kernel(&ctx);

        // The waking step itself is not applied.
        assert!(!bodies[0].resting);
        assert_eq!(bodies[0].linvel, Vector::zeros());
    }

    #[test]
    fn zero_timestep_integrates_impulses_directly() {
        let params = IntegrationParameters::default();
        let mut bodies = vec![SolverBody::dynamic(2.0, Vector::new(1.0, 1.0, 1.0))];
        // External forces are ignored in impulse mode.
        bodies[0].ext_force = Vector::new(0.0, -10.0, 0.0);

        let mut workspace = SolverWorkspace::new();
        workspace.prepare(&bodies, &[], 1);
        workspace.internal_forces[0] = SolverVel {
            linear: Vector::new(4.0, 0.0, 0.0),
            angular: na::zero(),
        };
        let mut constraints = vec![];
        let ctx = workspace.context(&mut bodies, &mut constraints, &params, 0.0);
        integrate_impulses_kernel(&ctx);

        assert_relative_eq!(bodies[0].linvel, Vector::new(2.0, 0.0, 0.0));
    }
}
