use crate::dynamics::solver::{ConstraintRow, JacobianPair};
use crate::dynamics::SolverBody;
use crate::math::Real;
use std::ops::Range;
use std::sync::Arc;

/// The maximum number of Jacobian rows a single constraint may produce.
pub const MAX_CONSTRAINT_ROWS: usize = 16;

/// Coupled-row index marking a row as bilateral (no friction coupling).
///
/// A bilateral row's force bounds are used as-is. A row with a non-negative
/// coupled-row index has its bounds scaled by the current force of that row,
/// which must belong to the same constraint and come *before* this row.
pub const BILATERAL_ROW: i32 = -1;

/// Force and impulse computed for one constraint row, readable by the owning
/// joint after the timestep completes (e.g. for motor torque readback).
///
/// The force value is also the warm-start seed for the next timestep.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct JointFeedback {
    /// The constraint force at the end of the last solve.
    pub force: Real,
    /// An estimate of the peak impulse applied by this row during the last
    /// solve (`max |force| * sub-step timestep`).
    pub impulse: Real,
}

/// One Jacobian row, as described by a joint's derivative callback.
#[derive(Copy, Clone, Debug)]
pub struct ConstraintRowDesc {
    /// The Jacobian pair of this degree of freedom.
    pub jacobian: JacobianPair,
    /// Relative stiffness of this row, in `[0.1, 100.0]`.
    pub stiffness: Real,
    /// The desired relative acceleration along this row.
    pub accel: Real,
    /// Restitution term, carried for contact-style acceleration callbacks.
    pub restitution: Real,
    /// Penetration term, carried for contact-style acceleration callbacks.
    pub penetration: Real,
    /// Penetration stiffness term, carried for contact-style acceleration callbacks.
    pub penetration_stiffness: Real,
    /// Lower force bound, or lower friction coefficient if this row is
    /// coupled to a normal-force row.
    pub lower_bound: Real,
    /// Upper force bound, or upper friction coefficient if coupled.
    pub upper_bound: Real,
    /// [`BILATERAL_ROW`], or the index (within this constraint) of the
    /// normal-force row whose current force scales this row's bounds.
    pub coupled_row: i32,
    /// Motor rows keep the acceleration set by the derivative callback
    /// instead of having it refreshed from the velocity error.
    pub is_motor: bool,
}

impl Default for ConstraintRowDesc {
    fn default() -> Self {
        Self {
            jacobian: JacobianPair::zero(),
            stiffness: 1.0,
            accel: 0.0,
            restitution: 0.0,
            penetration: 0.0,
            penetration_stiffness: 0.0,
            lower_bound: -Real::MAX,
            upper_bound: Real::MAX,
            coupled_row: BILATERAL_ROW,
            is_motor: false,
        }
    }
}

/// The descriptor filled by a joint's [`JointDynamics::jacobian_derivative`]
/// callback: an ordered list of up to [`MAX_CONSTRAINT_ROWS`] rows.
pub struct ConstraintDescriptor {
    /// The timestep being resolved.
    pub dt: Real,
    /// The inverse timestep (zero if `dt` is zero).
    pub inv_dt: Real,
    len: usize,
    rows: [ConstraintRowDesc; MAX_CONSTRAINT_ROWS],
}

impl ConstraintDescriptor {
    pub(crate) fn new(dt: Real, inv_dt: Real) -> Self {
        Self {
            dt,
            inv_dt,
            len: 0,
            rows: [ConstraintRowDesc::default(); MAX_CONSTRAINT_ROWS],
        }
    }

    /// Adds one row to the constraint.
    ///
    /// Panics if the constraint already has [`MAX_CONSTRAINT_ROWS`] rows:
    /// a joint producing more rows than the reserved maximum is a
    /// configuration error, not something the solver can truncate silently.
    pub fn push(&mut self, row: ConstraintRowDesc) {
        assert!(
            self.len < MAX_CONSTRAINT_ROWS,
            "constraint exceeded the maximum of {} Jacobian rows",
            MAX_CONSTRAINT_ROWS
        );
        self.rows[self.len] = row;
        self.len += 1;
    }

    /// The rows pushed so far.
    pub fn rows(&self) -> &[ConstraintRowDesc] {
        &self.rows[..self.len]
    }

    /// The number of rows pushed so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no row was pushed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The context handed to a joint's [`JointDynamics::joint_accelerations`]
/// callback at the start of each sub-step.
pub struct AccelerationDescriptor<'a> {
    /// This constraint's Jacobian rows. The callback refreshes
    /// `coordinate_accel` (typically from `delta_accel` and the current
    /// relative velocity); motor rows are usually left untouched.
    pub rows: &'a mut [ConstraintRow],
    /// The first constrained body.
    pub body1: &'a SolverBody,
    /// The second constrained body.
    pub body2: &'a SolverBody,
    /// The sub-step timestep.
    pub dt: Real,
    /// The inverse sub-step timestep (zero if the timestep is zero).
    pub inv_dt: Real,
    /// `true` on the first sub-step of a timestep, where every constraint is
    /// refreshed regardless of the bodies' resting state.
    pub first_pass: bool,
}

/// The capability interface a joint must expose to the solver.
///
/// Exactly two operations are required (the Jacobian-derivative callback and
/// the acceleration callback); the post-solve feedback notification is
/// optional. Everything else about the joint (its type, its anchors, its
/// limits) is opaque to the solver.
pub trait JointDynamics: Send + Sync {
    /// Fills the Jacobian rows, force bounds, and stiffness for this
    /// constraint at the start of the timestep.
    fn jacobian_derivative(&self, desc: &mut ConstraintDescriptor);

    /// Refreshes the desired accelerations of this constraint's rows for the
    /// current sub-step.
    fn joint_accelerations(&self, desc: &mut AccelerationDescriptor);

    /// Whether this joint wants [`Self::on_feedback`] invoked after the solve.
    fn has_feedback(&self) -> bool {
        false
    }

    /// Post-solve notification with the final per-row forces and impulse
    /// estimates. Only called if [`Self::has_feedback`] returns `true`.
    fn on_feedback(&self, _feedback: &[JointFeedback], _dt: Real, _thread_id: usize) {}
}

/// A constraint between two rigid bodies, identified by their indices into
/// the island's body slice.
#[derive(Clone)]
pub struct JointConstraint {
    /// Index of the first constrained body.
    pub body1: usize,
    /// Index of the second constrained body.
    pub body2: usize,
    /// The joint's callback interface.
    pub dynamics: Arc<dyn JointDynamics>,
    /// Per-row feedback slots, updated by the solver at the end of each
    /// timestep and consumed as warm-start seeds at the start of the next.
    pub feedback: [JointFeedback; MAX_CONSTRAINT_ROWS],
    pub(crate) row_start: usize,
    pub(crate) row_count: usize,
}

impl JointConstraint {
    /// Creates a constraint between the bodies at indices `body1` and `body2`.
    ///
    /// Panics if both indices are equal: a self-referential joint is a
    /// configuration error upstream.
    pub fn new(body1: usize, body2: usize, dynamics: Arc<dyn JointDynamics>) -> Self {
        assert_ne!(body1, body2, "a joint cannot constrain a body to itself");
        Self {
            body1,
            body2,
            dynamics,
            feedback: [JointFeedback::default(); MAX_CONSTRAINT_ROWS],
            row_start: 0,
            row_count: 0,
        }
    }

    /// The number of Jacobian rows generated by this constraint during the
    /// last solve.
    pub fn num_rows(&self) -> usize {
        self.row_count
    }

    /// The feedback slots of the rows generated during the last solve.
    pub fn row_feedback(&self) -> &[JointFeedback] {
        &self.feedback[..self.row_count]
    }

    pub(crate) fn row_range(&self) -> Range<usize> {
        self.row_start..self.row_start + self.row_count
    }
}
