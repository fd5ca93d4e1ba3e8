//! Assembly of the constraint rows at the start of a timestep.

use crate::dynamics::solver::scheduler::concurrent_loop;
use crate::dynamics::solver::{ConstraintRow, SolverContext, SolverVel};
use crate::dynamics::ConstraintDescriptor;
use std::sync::atomic::Ordering;

/// Fills the shared row buffer from the constraints' derivative callbacks.
///
/// Each task claims whole constraints from the phase cursor, reserves a
/// contiguous range of the row buffer through the atomic row cursor, and
/// writes only inside that range, so tasks never collide. The warm-start
/// force is seeded from the feedback slot of the previous timestep.
pub(crate) fn build_jacobian_kernel(ctx: &SolverContext) {
    let cursor = &ctx.thread.cursor;

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, ctx.num_constraints] {
            // Claimed indices are unique, so the mutable borrow is exclusive.
            let constraint = unsafe { ctx.constraint_mut(i) };
            let mut desc = ConstraintDescriptor::new(ctx.dt, ctx.inv_dt);
            constraint.dynamics.jacobian_derivative(&mut desc);

            constraint.row_count = desc.len();
            constraint.row_start = ctx.row_cursor.fetch_add(desc.len(), Ordering::SeqCst);

            let body1 = unsafe { ctx.body(constraint.body1) };
            let body2 = unsafe { ctx.body(constraint.body2) };
            let rows = unsafe { ctx.rows_mut(constraint.row_range()) };

            for (k, (row, row_desc)) in rows.iter_mut().zip(desc.rows().iter()).enumerate() {
                debug_assert!(
                    row_desc.coupled_row < k as i32,
                    "a coupled row must refer to an earlier row of the same constraint"
                );
                debug_assert!((0.1..=100.0).contains(&row_desc.stiffness));

                let j = row_desc.jacobian;
                let jminv_linear1 = j.body1.linear * body1.inv_mass;
                let jminv_angular1 = body1.inv_world_inertia * j.body1.angular;
                let jminv_linear2 = j.body2.linear * body2.inv_mass;
                let jminv_angular2 = body2.inv_world_inertia * j.body2.angular;

                let diag = jminv_linear1.dot(&j.body1.linear)
                    + jminv_angular1.dot(&j.body1.angular)
                    + jminv_linear2.dot(&j.body2.linear)
                    + jminv_angular2.dot(&j.body2.angular);
                debug_assert!(diag > 0.0, "degenerate row: both sides immovable or zero Jacobian");

                // Acceleration already produced by the external forces along
                // this row; the constraint only has to supply the rest.
                let ext_accel = -(jminv_linear1.dot(&body1.ext_force)
                    + jminv_angular1.dot(&body1.ext_torque)
                    + jminv_linear2.dot(&body2.ext_force)
                    + jminv_angular2.dot(&body2.ext_torque));

                let stiffness = ctx.params.psd_damping * row_desc.stiffness;

                *row = ConstraintRow {
                    jacobian: j,
                    force: constraint.feedback[k].force,
                    diag_damp: diag * stiffness,
                    inv_diag: 1.0 / (diag * (1.0 + stiffness)),
                    coordinate_accel: row_desc.accel + ext_accel,
                    delta_accel: ext_accel,
                    restitution: row_desc.restitution,
                    penetration: row_desc.penetration,
                    penetration_stiffness: row_desc.penetration_stiffness,
                    lower_bound: row_desc.lower_bound,
                    upper_bound: row_desc.upper_bound,
                    coupled_row: row_desc.coupled_row,
                    is_motor: row_desc.is_motor,
                    max_impact: 0.0,
                };
            }
        }
    }
}

/// Scatters the warm-started row forces into the per-body accumulators.
///
/// Runs once per batch, between barriers: the coloring guarantees that the
/// two accumulator slots touched by a claimed constraint belong to no other
/// constraint of the same batch. Static bodies keep a zeroed slot.
pub(crate) fn scatter_warm_start_kernel(ctx: &SolverContext, batch_end: usize) {
    let cursor = &ctx.thread.cursor;

    concurrent_loop! {
        let batch_size = ctx.thread.batch_size;
        for i in [cursor, batch_end] {
            let constraint = unsafe { ctx.constraint(ctx.sorted_constraint(i)) };
            let rows = unsafe { ctx.rows(constraint.row_range()) };

            let mut y1 = SolverVel::zero();
            let mut y2 = SolverVel::zero();

            for row in rows {
                debug_assert!(row.force.is_finite());
                y1.linear += row.jacobian.body1.linear * row.force;
                y1.angular += row.jacobian.body1.angular * row.force;
                y2.linear += row.jacobian.body2.linear * row.force;
                y2.angular += row.jacobian.body2.angular * row.force;
            }

            if !unsafe { ctx.body(constraint.body1) }.is_static() {
                *unsafe { ctx.internal_force_mut(constraint.body1) } += y1;
            }
            if !unsafe { ctx.body(constraint.body2) }.is_static() {
                *unsafe { ctx.internal_force_mut(constraint.body2) } += y2;
            }
        }
    }
}
