use crate::math::Real;

/// Parameters for the constraint resolution of one timestep.
///
/// The iteration and tolerance values are engine-tuning constants obtained
/// empirically, so treat them as knobs rather than ground truth. Raising the
/// sub-step or iteration counts trades CPU time for constraint-violation
/// accuracy; reaching the iteration cap before convergence is not an error,
/// the solver simply returns the best approximation computed so far.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IntegrationParameters {
    /// Number of sub-steps per timestep (default: `4`).
    ///
    /// Each timestep is subdivided into `max_substeps` passes of
    /// accelerate/iterate/integrate, in the manner of a Runge-Kutta scheme.
    /// This is the main "solver quality" knob.
    pub max_substeps: usize,
    /// Maximum number of projected Gauss-Seidel sweeps per sub-step (default: `4`).
    ///
    /// A sub-step stops iterating earlier if the convergence residual drops
    /// below [`Self::max_error`].
    pub max_iterations: usize,
    /// Convergence tolerance on the worst-case residual acceleration (default: `1.0e-2`).
    pub max_error: Real,
    /// Scale applied to each row's stiffness to derive its diagonal damping
    /// (default: `1.0e-2`).
    ///
    /// A damped row converges to a slightly softer force than the exact
    /// complementarity solution, which keeps ill-conditioned systems stable.
    pub psd_damping: Real,
    /// Squared velocity-step threshold above which a resting body is woken up
    /// (default: `1.0e-4`).
    ///
    /// Bodies flagged as resting skip velocity integration entirely unless
    /// the step computed for them exceeds this threshold.
    pub freeze_speed2: Real,
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            max_substeps: 4,
            max_iterations: 4,
            max_error: 1.0e-2,
            psd_damping: 1.0e-2,
            freeze_speed2: 1.0e-4,
        }
    }
}
