//! Counters for benchmarking the various phases of the solver.

use std::fmt::{Display, Formatter, Result};
use std::time::Duration;

/// A timer.
#[derive(Copy, Clone, Debug, Default)]
pub struct Timer {
    time: Duration,
    #[allow(dead_code)] // The field isn't used if the `profiler` feature isn't enabled.
    start: Option<std::time::Instant>,
}

impl Timer {
    /// Creates a new timer initialized to zero and not started.
    pub fn new() -> Self {
        Timer {
            time: Duration::from_secs(0),
            start: None,
        }
    }

    /// Resets the timer to 0.
    pub fn reset(&mut self) {
        self.time = Duration::from_secs(0)
    }

    /// Start the timer.
    pub fn start(&mut self) {
        #[cfg(feature = "profiler")]
        {
            self.time = Duration::from_secs(0);
            self.start = Some(std::time::Instant::now());
        }
    }

    /// Pause the timer.
    pub fn pause(&mut self) {
        #[cfg(feature = "profiler")]
        {
            if let Some(start) = self.start {
                self.time += std::time::Instant::now().duration_since(start);
            }
            self.start = None;
        }
    }

    /// Resume the timer.
    pub fn resume(&mut self) {
        #[cfg(feature = "profiler")]
        {
            self.start = Some(std::time::Instant::now());
        }
    }

    /// The measured time between the last `.start()` and `.pause()` calls, in milliseconds.
    pub fn time_ms(&self) -> f64 {
        self.time.as_secs_f64() * 1000.0
    }
}

impl Display for Timer {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}s", self.time.as_secs_f32())
    }
}

/// Performance counters related to constraint resolution.
#[derive(Default, Clone, Copy)]
pub struct SolverCounters {
    /// Number of constraints solved.
    pub nconstraints: usize,
    /// Number of Jacobian rows generated.
    pub nrows: usize,
    /// Number of conflict-free constraint batches.
    pub nbatches: usize,
    /// Number of Gauss-Seidel iterations actually run, summed over all sub-steps.
    pub niterations: usize,
    /// Time spent assembling the Jacobian rows.
    pub jacobian_assembly_time: Timer,
    /// Time spent in the iterative force resolution.
    pub resolution_time: Timer,
    /// Time spent integrating body velocities.
    pub velocity_update_time: Timer,
    /// Time spent writing forces back to the joint feedback slots.
    pub writeback_time: Timer,
}

impl SolverCounters {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        SolverCounters::default()
    }

    /// Reset all the counters to zero.
    pub fn reset(&mut self) {
        self.nconstraints = 0;
        self.nrows = 0;
        self.nbatches = 0;
        self.niterations = 0;
        self.jacobian_assembly_time.reset();
        self.resolution_time.reset();
        self.velocity_update_time.reset();
        self.writeback_time.reset();
    }
}

impl Display for SolverCounters {
    fn fmt(&self, f: &mut Formatter) -> Result {
        writeln!(f, "Number of constraints: {}", self.nconstraints)?;
        writeln!(f, "Number of rows: {}", self.nrows)?;
        writeln!(f, "Number of batches: {}", self.nbatches)?;
        writeln!(f, "Number of iterations: {}", self.niterations)?;
        writeln!(f, "Jacobian assembly time: {}", self.jacobian_assembly_time)?;
        writeln!(f, "Resolution time: {}", self.resolution_time)?;
        writeln!(f, "Velocity update time: {}", self.velocity_update_time)?;
        writeln!(f, "Writeback time: {}", self.writeback_time)
    }
}

/// Aggregation of all the performance counters tracked by the solver.
#[derive(Clone, Copy)]
pub struct Counters {
    /// Whether the counters are enabled or not.
    pub enabled: bool,
    /// Timer for a whole timestep.
    pub step_time: Timer,
    /// Counters for the constraint resolution stage.
    pub solver: SolverCounters,
}

impl Counters {
    /// Creates a new set of counters initialized to zero.
    pub fn new(enabled: bool) -> Self {
        Counters {
            enabled,
            step_time: Timer::new(),
            solver: SolverCounters::new(),
        }
    }

    /// Enable all the counters.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Return `true` if the counters are enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disable all the counters.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Notify that the time-step has started.
    pub fn step_started(&mut self) {
        if self.enabled {
            self.step_time.start();
        }
    }

    /// Notify that the time-step has finished.
    pub fn step_completed(&mut self) {
        if self.enabled {
            self.step_time.pause();
        }
    }

    /// Total time spent for one solve, in milliseconds.
    pub fn step_time(&self) -> f64 {
        self.step_time.time_ms()
    }

    /// Reset all the counters to zero.
    pub fn reset(&mut self) {
        self.step_time.reset();
        self.solver.reset();
    }
}

macro_rules! measure_method {
    ($started:ident, $stopped:ident, $time:ident, $info:ident. $timer:ident) => {
        impl Counters {
            /// Resume this timer.
            pub fn $started(&mut self) {
                if self.enabled {
                    self.$info.$timer.resume()
                }
            }

            /// Pause this timer.
            pub fn $stopped(&mut self) {
                if self.enabled {
                    self.$info.$timer.pause()
                }
            }

            /// Gets the time elapsed for this timer, in milliseconds.
            pub fn $time(&self) -> f64 {
                if self.enabled {
                    self.$info.$timer.time_ms()
                } else {
                    0.0
                }
            }
        }
    };
}

measure_method!(
    assembly_started,
    assembly_completed,
    assembly_time,
    solver.jacobian_assembly_time
);
measure_method!(
    resolution_started,
    resolution_completed,
    resolution_time,
    solver.resolution_time
);
measure_method!(
    velocity_update_started,
    velocity_update_completed,
    velocity_update_time,
    solver.velocity_update_time
);
measure_method!(
    writeback_started,
    writeback_completed,
    writeback_time,
    solver.writeback_time
);

impl Default for Counters {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Display for Counters {
    fn fmt(&self, f: &mut Formatter) -> Result {
        writeln!(f, "Total timestep time: {}", self.step_time)?;
        self.solver.fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disabled_counters_ignore_timer_notifications() {
        let mut counters = Counters::new(false);
        assert!(!counters.enabled());

        counters.step_started();
        counters.assembly_started();
        counters.assembly_completed();
        counters.step_completed();

        assert!(counters.step_time.start.is_none());
        assert_eq!(counters.assembly_time(), 0.0);
    }

    #[test]
    fn enable_and_disable_toggle_the_gate() {
        let mut counters = Counters::new(false);
        counters.enable();
        assert!(counters.enabled());
        counters.disable();
        assert!(!counters.enabled());
    }
}
