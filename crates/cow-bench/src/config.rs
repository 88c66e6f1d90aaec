//! Benchmark driver configuration.

use std::num::NonZeroUsize;
use std::str::FromStr;

use thiserror::Error;

/// Environment variable dividing every batch size.
pub const SCALE_VAR: &str = "COW_BENCH_SCALE";
/// Environment variable selecting the strategies to measure.
pub const STRATEGY_VAR: &str = "COW_BENCH_STRATEGY";
/// Environment variable selecting the baseline to compare against.
pub const BASELINE_VAR: &str = "COW_BENCH_BASELINE";

/// Default divisor applied to the full-size batches.
pub const DEFAULT_SCALE: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(scale) => scale,
    None => unreachable!(),
};

/// Errors raised while reading the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BenchConfigError {
    /// The scale was not a positive integer.
    #[error("{SCALE_VAR} must be a positive integer, got {0:?}")]
    InvalidScale(String),
    /// The strategy name was not recognised.
    #[error("{STRATEGY_VAR} must be one of unsync, mutex, atomic, all; got {0:?}")]
    UnknownStrategy(String),
    /// The baseline name was not recognised.
    #[error("{BASELINE_VAR} must be one of arc, unsync; got {0:?}")]
    UnknownBaseline(String),
}

/// Which ownership strategies to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategySelection {
    /// Only the unsynchronized flag.
    Unsync,
    /// Only the mutex flag.
    Mutex,
    /// Only the lock-free flag.
    Atomic,
    /// All three, one after the other.
    #[default]
    All,
}

impl FromStr for StrategySelection {
    type Err = BenchConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsync" | "thread_unsafe" => Ok(Self::Unsync),
            "mutex" => Ok(Self::Mutex),
            "atomic" => Ok(Self::Atomic),
            "all" => Ok(Self::All),
            _ => Err(BenchConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

/// What the measured pointer is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Baseline {
    /// A plain `Arc`, the cost of reference counting alone.
    #[default]
    Arc,
    /// A `CowPtr` with the unsynchronized flag, the cost of copy-on-write
    /// without thread safety.
    Unsync,
}

impl FromStr for Baseline {
    type Err = BenchConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arc" => Ok(Self::Arc),
            "unsync" | "thread_unsafe" => Ok(Self::Unsync),
            _ => Err(BenchConfigError::UnknownBaseline(s.to_string())),
        }
    }
}

/// Settings of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Every batch size is divided by this.
    pub scale: NonZeroUsize,
    /// Strategies to measure.
    pub strategy: StrategySelection,
    /// Implementation to compare against.
    pub baseline: Baseline,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            strategy: StrategySelection::default(),
            baseline: Baseline::default(),
        }
    }
}

impl BenchConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value. Unset
    /// variables keep their default.
    pub fn from_env() -> Result<Self, BenchConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BenchConfigError> {
        let mut config = Self::default();
        if let Some(scale) = lookup(SCALE_VAR) {
            config.scale = scale
                .trim()
                .parse()
                .ok()
                .and_then(NonZeroUsize::new)
                .ok_or(BenchConfigError::InvalidScale(scale))?;
        }
        if let Some(strategy) = lookup(STRATEGY_VAR) {
            config.strategy = strategy.parse()?;
        }
        if let Some(baseline) = lookup(BASELINE_VAR) {
            config.baseline = baseline.parse()?;
        }
        Ok(config)
    }

    /// Scale a full-size batch down, never below one repetition.
    #[must_use]
    pub fn amount(&self, full_size: usize) -> usize {
        (full_size / self.scale.get()).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = BenchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = BenchConfig::from_lookup(lookup(&[
            (SCALE_VAR, "10"),
            (STRATEGY_VAR, "Mutex"),
            (BASELINE_VAR, "unsync"),
        ]))
        .unwrap();
        assert_eq!(config.scale.get(), 10);
        assert_eq!(config.strategy, StrategySelection::Mutex);
        assert_eq!(config.baseline, Baseline::Unsync);
    }

    #[test]
    fn test_rejects_zero_scale() {
        let err = BenchConfig::from_lookup(lookup(&[(SCALE_VAR, "0")])).unwrap_err();
        assert_eq!(err, BenchConfigError::InvalidScale("0".to_string()));
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let err = BenchConfig::from_lookup(lookup(&[(STRATEGY_VAR, "rwlock")])).unwrap_err();
        assert_eq!(err, BenchConfigError::UnknownStrategy("rwlock".to_string()));
        assert!(err.to_string().contains(STRATEGY_VAR));
    }

    #[test]
    fn test_amount_never_zero() {
        let config = BenchConfig {
            scale: NonZeroUsize::new(1000).unwrap(),
            ..BenchConfig::default()
        };
        assert_eq!(config.amount(10), 1);
        assert_eq!(config.amount(10_000), 10);
    }

    #[test]
    fn test_smallest_scale_keeps_full_size() {
        let config = BenchConfig {
            scale: NonZeroUsize::MIN,
            ..BenchConfig::default()
        };
        assert_eq!(config.amount(10), 10);
        assert_eq!(config.amount(0), 1);
    }

    #[test]
    fn test_rejects_non_numeric_scale() {
        let err = BenchConfig::from_lookup(lookup(&[(SCALE_VAR, "-3")])).unwrap_err();
        assert_eq!(err, BenchConfigError::InvalidScale("-3".to_string()));
    }
}
