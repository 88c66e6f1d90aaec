//! Wall-clock timing of operation batches.

use std::fmt;
use std::time::{Duration, Instant};

/// Run `operation` `amount` times and return the elapsed wall time.
pub fn time_it(mut operation: impl FnMut(), amount: usize) -> Duration {
    let start = Instant::now();
    for _ in 0..amount {
        operation();
    }
    start.elapsed()
}

/// Timings of one operation batch, run once against the baseline and once
/// against the pointer under test.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Human-readable description of the batch.
    pub operation: &'static str,
    /// Number of repetitions in each batch.
    pub amount: usize,
    /// Name of the baseline implementation.
    pub baseline_name: &'static str,
    /// Time taken by the baseline.
    pub baseline: Duration,
    /// Name of the implementation under test.
    pub tested_name: &'static str,
    /// Time taken by the implementation under test.
    pub tested: Duration,
}

impl Comparison {
    /// How many times slower the tested implementation was.
    ///
    /// Returns `f64::INFINITY` if the baseline batch took no measurable time.
    #[must_use]
    pub fn slowdown(&self) -> f64 {
        let baseline = self.baseline.as_secs_f64();
        if baseline == 0.0 {
            f64::INFINITY
        } else {
            self.tested.as_secs_f64() / baseline
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} times)", self.operation, self.amount)?;
        writeln!(
            f,
            "  {:<14} {:>10.6} s",
            self.baseline_name,
            self.baseline.as_secs_f64()
        )?;
        write!(
            f,
            "  {:<14} {:>10.6} s ({:.2}x)",
            self.tested_name,
            self.tested.as_secs_f64(),
            self.slowdown()
        )
    }
}

/// Time the same batch against a baseline and a tested implementation.
pub fn compare_it(
    operation: &'static str,
    amount: usize,
    (baseline_name, baseline_op): (&'static str, impl FnMut()),
    (tested_name, tested_op): (&'static str, impl FnMut()),
) -> Comparison {
    tracing::debug!(operation, amount, "batch_start");
    let baseline = time_it(baseline_op, amount);
    let tested = time_it(tested_op, amount);
    tracing::debug!(
        operation,
        baseline_ns = baseline.as_nanos(),
        tested_ns = tested.as_nanos(),
        "batch_end"
    );
    Comparison {
        operation,
        amount,
        baseline_name,
        baseline,
        tested_name,
        tested,
    }
}
