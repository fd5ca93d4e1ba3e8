//! Minimal joint implementations used by the solver tests.

use crate::dynamics::solver::JacobianPair;
use crate::dynamics::{
    AccelerationDescriptor, ConstraintDescriptor, ConstraintRowDesc, JointDynamics, JointFeedback,
};
use crate::math::{Real, Vector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A single bilateral row locking one relative velocity coordinate of the
/// two bodies, linear or angular. The acceleration callback drives the
/// relative velocity to zero over one sub-step.
pub(crate) struct AxisConstraint {
    jacobian: JacobianPair,
}

impl AxisConstraint {
    /// Locks the relative linear velocity along `axis`.
    pub fn new(axis: Vector) -> Self {
        Self {
            jacobian: JacobianPair::linear_coupling(axis),
        }
    }

    /// Locks the relative angular velocity about `axis`, as a hinge does for
    /// its off-axis rows.
    pub fn angular(axis: Vector) -> Self {
        Self {
            jacobian: JacobianPair::angular_coupling(axis),
        }
    }
}

impl JointDynamics for AxisConstraint {
    fn jacobian_derivative(&self, desc: &mut ConstraintDescriptor) {
        desc.push(ConstraintRowDesc {
            jacobian: self.jacobian,
            ..Default::default()
        });
    }

    fn joint_accelerations(&self, desc: &mut AccelerationDescriptor) {
        for row in desc.rows.iter_mut() {
            if row.is_motor {
                continue;
            }

            let rel_vel = row.jacobian.body1.linear.dot(&desc.body1.linvel)
                + row.jacobian.body1.angular.dot(&desc.body1.angvel)
                + row.jacobian.body2.linear.dot(&desc.body2.linvel)
                + row.jacobian.body2.angular.dot(&desc.body2.angvel);
            row.coordinate_accel = row.delta_accel - rel_vel * desc.inv_dt;
        }
    }
}

/// A contact-like constraint: a normal row forced to a fixed value plus a
/// friction row whose bounds are the friction coefficients scaled by the
/// normal row's current force.
pub(crate) struct ContactFixture {
    pub normal_force: Real,
    pub friction_coeff: Real,
}

impl JointDynamics for ContactFixture {
    fn jacobian_derivative(&self, desc: &mut ConstraintDescriptor) {
        // Pinning both bounds to the same value forces the row to converge to
        // exactly that normal force.
        desc.push(ConstraintRowDesc {
            jacobian: JacobianPair::linear_coupling(Vector::y()),
            lower_bound: self.normal_force,
            upper_bound: self.normal_force,
            is_motor: true,
            ..Default::default()
        });
        // A friction row driven hard enough to always saturate its bounds.
        desc.push(ConstraintRowDesc {
            jacobian: JacobianPair::linear_coupling(Vector::x()),
            accel: 1000.0,
            lower_bound: -self.friction_coeff,
            upper_bound: self.friction_coeff,
            coupled_row: 0,
            is_motor: true,
            ..Default::default()
        });
    }

    fn joint_accelerations(&self, _: &mut AccelerationDescriptor) {
        // Motor rows keep their assembled accelerations.
    }
}

/// An [`AxisConstraint`] that also records its post-solve feedback callback.
///
/// The `silent` variant opts out of feedback so tests can check the callback
/// is never delivered to joints that did not subscribe.
pub(crate) struct FeedbackRecorder {
    inner: AxisConstraint,
    wants_feedback: bool,
    pub calls: AtomicUsize,
    pub reported: Mutex<Vec<JointFeedback>>,
}

impl FeedbackRecorder {
    pub fn new(axis: Vector) -> Self {
        Self::with_subscription(axis, true)
    }

    pub fn silent(axis: Vector) -> Self {
        Self::with_subscription(axis, false)
    }

    fn with_subscription(axis: Vector, wants_feedback: bool) -> Self {
        Self {
            inner: AxisConstraint::new(axis),
            wants_feedback,
            calls: AtomicUsize::new(0),
            reported: Mutex::new(Vec::new()),
        }
    }
}

impl JointDynamics for FeedbackRecorder {
    fn jacobian_derivative(&self, desc: &mut ConstraintDescriptor) {
        self.inner.jacobian_derivative(desc)
    }

    fn joint_accelerations(&self, desc: &mut AccelerationDescriptor) {
        self.inner.joint_accelerations(desc)
    }

    fn has_feedback(&self) -> bool {
        self.wants_feedback
    }

    fn on_feedback(&self, feedback: &[JointFeedback], _dt: Real, _task_id: usize) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.reported.lock().unwrap() = feedback.to_vec();
    }
}
