//! Fork-join scheduling of the solver phases.
//!
//! Every phase is executed by `num_tasks` worker tasks pulling chunks of work
//! from a shared atomic cursor, which balances load without a dedicated
//! scheduler thread. The end of the rayon scope is the full barrier between
//! phases: no phase overlaps the next.

use std::sync::atomic::{AtomicUsize, Ordering};

/// The work-stealing cursor shared by all tasks of one solver phase.
pub(crate) struct ThreadContext {
    /// Number of indices claimed per `fetch_add`.
    pub batch_size: usize,
    /// The next unclaimed index.
    pub cursor: AtomicUsize,
}

impl ThreadContext {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Rewinds the cursor to `start`. Only called between phase barriers,
    /// while no task is running.
    pub fn reset(&self, start: usize) {
        self.cursor.store(start, Ordering::SeqCst);
    }
}

/// Claims chunks of `batch_size` indices from `[cursor, end)` until the
/// cursor runs past `end`, running the body once per claimed index.
macro_rules! concurrent_loop {
    (let batch_size = $batch_size: expr;
     for $i: ident in [$cursor: expr, $end: expr] $f: expr) => {
        loop {
            let start = $cursor.fetch_add($batch_size, ::std::sync::atomic::Ordering::SeqCst);
            if start >= $end {
                break;
            }

            let stop = (start + $batch_size).min($end);
            for $i in start..stop {
                $f
            }
        }
    };
}

pub(crate) use concurrent_loop;

/// Runs `kernel` on `num_tasks` tasks of the rayon pool and waits for all of
/// them: the scope join is the synchronization barrier between solver phases.
///
/// With a single task the kernel runs inline on the calling thread, which
/// both avoids the scheduling overhead and makes the claim order (hence the
/// floating-point accumulation order) deterministic.
pub(crate) fn fork_join<F: Fn(usize) + Sync>(num_tasks: usize, kernel: F) {
    if num_tasks <= 1 {
        kernel(0);
        return;
    }

    rayon::scope(|scope| {
        let kernel = &kernel;
        for thread_id in 0..num_tasks {
            scope.spawn(move |_| kernel(thread_id));
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_index_is_claimed_exactly_once() {
        let num_indices = 1000;
        let thread = ThreadContext::new(8);
        let claims = AtomicUsize::new(0);
        let sum = AtomicUsize::new(0);

        fork_join(4, |_| {
            concurrent_loop! {
                let batch_size = thread.batch_size;
                for i in [thread.cursor, num_indices] {
                    claims.fetch_add(1, Ordering::SeqCst);
                    sum.fetch_add(i, Ordering::SeqCst);
                }
            }
        });

        assert_eq!(claims.load(Ordering::SeqCst), num_indices);
        assert_eq!(sum.load(Ordering::SeqCst), num_indices * (num_indices - 1) / 2);
    }

    #[test]
    fn cursor_reset_supports_offset_ranges() {
        let thread = ThreadContext::new(3);
        thread.reset(10);
        let claims = AtomicUsize::new(0);

        fork_join(2, |_| {
            concurrent_loop! {
                let batch_size = thread.batch_size;
                for _i in [thread.cursor, 25] {
                    claims.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        assert_eq!(claims.load(Ordering::SeqCst), 15);
    }
}
