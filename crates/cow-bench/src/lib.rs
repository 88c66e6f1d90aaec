//! Microbenchmark driver for `cow-ptr`.
//!
//! Times batches of black-box pointer operations for each ownership strategy
//! and reports how much slower each one is than a baseline. The baseline is
//! either a plain [`std::sync::Arc`] or a `CowPtr` with the unsynchronized
//! flag. Batch sizes and the strategies to measure come from the environment,
//! see [`BenchConfig::from_env`].
//!
//! The `criterion` benches of `cow-ptr` give statistically sound numbers; this
//! driver gives a quick side-by-side table.

#![warn(missing_docs)]

pub mod config;
pub mod suite;
pub mod timing;

pub use config::{Baseline, BenchConfig, BenchConfigError, StrategySelection};
pub use suite::{compare_operation, run_strategy, run_suite, BenchPointer, Operation};
pub use timing::{compare_it, time_it, Comparison};
