//! The microbenchmark suite: every operation, for every selected strategy.

use std::hint::black_box;
use std::sync::Arc;

use cow_ptr::{AtomicFlag, CowPtr, MutexFlag, OwnershipFlag, ThreadUnsafeFlag};

use crate::config::{Baseline, BenchConfig, StrategySelection};
use crate::timing::{compare_it, Comparison};

/// Payload used by every batch.
pub type Data = u64;

/// Value written and read by every batch.
pub const TYPICAL_VALUE: Data = 42;

/// One black-box pointer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Allocate a pointer and drop it.
    Create,
    /// Allocate a pointer, move-construct a second from it, drop both.
    CreateMove,
    /// Copy a shared pointer.
    Copy,
    /// Copy a shared pointer and move-assign the copy.
    CopyMoveAssign,
    /// Copy-assign from a shared pointer.
    CopyAssign,
    /// Read through a pointer.
    Read,
    /// Copy a pointer and write through the copy, forcing a detach.
    ColdWrite,
    /// Write through a pointer that already owns its payload.
    WarmWrite,
}

impl Operation {
    /// Every operation, in the order the suite runs them.
    pub const ALL: [Self; 8] = [
        Self::Create,
        Self::CreateMove,
        Self::Copy,
        Self::CopyMoveAssign,
        Self::CopyAssign,
        Self::Read,
        Self::ColdWrite,
        Self::WarmWrite,
    ];

    /// Human-readable description, used in reports.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Create => "creating pointers",
            Self::CreateMove => "creating and move-constructing pointers",
            Self::Copy => "copying pointers",
            Self::CopyMoveAssign => "copying and move-assigning pointers",
            Self::CopyAssign => "copy-assigning pointers",
            Self::Read => "reading from pointers",
            Self::ColdWrite => "copying pointers and writing to the copy",
            Self::WarmWrite => "writing to owned pointers",
        }
    }

    /// Repetitions of a full-size batch, before scaling.
    #[must_use]
    pub const fn full_amount(self) -> usize {
        const CREATE: usize = 20_000_000;
        const COPY: usize = 40_000_000;
        match self {
            Self::Create => CREATE,
            Self::CreateMove => 5 * CREATE,
            Self::Copy => COPY,
            Self::CopyMoveAssign | Self::ColdWrite => 5 * COPY,
            Self::CopyAssign => 64_000_000,
            Self::Read => 128_000_000,
            Self::WarmWrite => 20 * COPY,
        }
    }
}

/// The pointer operations a batch is built from.
pub trait BenchPointer: Clone {
    /// Name used in reports.
    const NAME: &'static str;

    /// Allocate a new pointer.
    fn create(value: Data) -> Self;

    /// Move-construct a new pointer out of `self`.
    #[must_use]
    fn relocate(self) -> Self;

    /// Move-assign `source` into `self`.
    fn assign(&mut self, source: Self);

    /// Borrow the pointee.
    fn value(&self) -> &Data;

    /// Replace the pointee, detaching first if needed.
    fn store(&mut self, value: Data);
}

impl BenchPointer for Arc<Data> {
    const NAME: &'static str = "arc";

    fn create(value: Data) -> Self {
        Self::new(value)
    }

    fn relocate(self) -> Self {
        self
    }

    fn assign(&mut self, source: Self) {
        *self = source;
    }

    fn value(&self) -> &Data {
        self
    }

    fn store(&mut self, value: Data) {
        *Self::make_mut(self) = value;
    }
}

impl<F: OwnershipFlag> BenchPointer for CowPtr<Data, F> {
    const NAME: &'static str = F::STRATEGY;

    fn create(value: Data) -> Self {
        Self::new(value)
    }

    fn relocate(self) -> Self {
        Self::transfer(self)
    }

    fn assign(&mut self, source: Self) {
        Self::assign(self, source);
    }

    fn value(&self) -> &Data {
        self.read()
    }

    fn store(&mut self, value: Data) {
        self.write(value);
    }
}

/// Time one operation against a baseline `B` and a tested pointer `P`.
pub fn compare_operation<B: BenchPointer, P: BenchPointer>(
    operation: Operation,
    amount: usize,
) -> Comparison {
    let name = operation.description();
    match operation {
        Operation::Create => compare_it(
            name,
            amount,
            (B::NAME, || {
                black_box(B::create(black_box(TYPICAL_VALUE)));
            }),
            (P::NAME, || {
                black_box(P::create(black_box(TYPICAL_VALUE)));
            }),
        ),
        Operation::CreateMove => compare_it(
            name,
            amount,
            (B::NAME, || {
                let source = B::create(black_box(TYPICAL_VALUE));
                black_box(source.relocate());
            }),
            (P::NAME, || {
                let source = P::create(black_box(TYPICAL_VALUE));
                black_box(source.relocate());
            }),
        ),
        Operation::Copy => {
            let baseline = B::create(TYPICAL_VALUE);
            let tested = P::create(TYPICAL_VALUE);
            compare_it(
                name,
                amount,
                (B::NAME, || {
                    black_box(black_box(&baseline).clone());
                }),
                (P::NAME, || {
                    black_box(black_box(&tested).clone());
                }),
            )
        }
        Operation::CopyMoveAssign => {
            let baseline = B::create(TYPICAL_VALUE);
            let tested = P::create(TYPICAL_VALUE);
            let mut baseline_dest = baseline.clone();
            let mut tested_dest = tested.clone();
            compare_it(
                name,
                amount,
                (B::NAME, || baseline_dest.assign(black_box(&baseline).clone())),
                (P::NAME, || tested_dest.assign(black_box(&tested).clone())),
            )
        }
        Operation::CopyAssign => {
            let baseline = B::create(TYPICAL_VALUE);
            let tested = P::create(TYPICAL_VALUE);
            let mut baseline_dest = B::create(TYPICAL_VALUE);
            let mut tested_dest = P::create(TYPICAL_VALUE);
            compare_it(
                name,
                amount,
                (B::NAME, || baseline_dest.clone_from(black_box(&baseline))),
                (P::NAME, || tested_dest.clone_from(black_box(&tested))),
            )
        }
        Operation::Read => {
            let baseline = B::create(TYPICAL_VALUE);
            let tested = P::create(TYPICAL_VALUE);
            compare_it(
                name,
                amount,
                (B::NAME, || {
                    black_box(*black_box(&baseline).value());
                }),
                (P::NAME, || {
                    black_box(*black_box(&tested).value());
                }),
            )
        }
        Operation::ColdWrite => {
            let baseline = B::create(TYPICAL_VALUE);
            let tested = P::create(TYPICAL_VALUE);
            compare_it(
                name,
                amount,
                (B::NAME, || {
                    let mut dest = baseline.clone();
                    dest.store(black_box(TYPICAL_VALUE));
                    black_box(dest);
                }),
                (P::NAME, || {
                    let mut dest = tested.clone();
                    dest.store(black_box(TYPICAL_VALUE));
                    black_box(dest);
                }),
            )
        }
        Operation::WarmWrite => {
            let mut baseline = B::create(TYPICAL_VALUE);
            let mut tested = P::create(TYPICAL_VALUE);
            compare_it(
                name,
                amount,
                (B::NAME, || baseline.store(black_box(TYPICAL_VALUE))),
                (P::NAME, || tested.store(black_box(TYPICAL_VALUE))),
            )
        }
    }
}

/// Run every operation for strategy `F` against the configured baseline.
pub fn run_strategy<F: OwnershipFlag>(config: &BenchConfig) -> Vec<Comparison> {
    tracing::info!(strategy = F::STRATEGY, baseline = ?config.baseline, "strategy_start");
    Operation::ALL
        .iter()
        .map(|&operation| {
            let amount = config.amount(operation.full_amount());
            match config.baseline {
                Baseline::Arc => compare_operation::<Arc<Data>, CowPtr<Data, F>>(operation, amount),
                Baseline::Unsync => compare_operation::<
                    CowPtr<Data, ThreadUnsafeFlag>,
                    CowPtr<Data, F>,
                >(operation, amount),
            }
        })
        .collect()
}

/// Run the whole suite for every strategy the configuration selects.
pub fn run_suite(config: &BenchConfig) -> Vec<Comparison> {
    match config.strategy {
        StrategySelection::Unsync => run_strategy::<ThreadUnsafeFlag>(config),
        StrategySelection::Mutex => run_strategy::<MutexFlag>(config),
        StrategySelection::Atomic => run_strategy::<AtomicFlag>(config),
        StrategySelection::All => {
            let mut comparisons = run_strategy::<ThreadUnsafeFlag>(config);
            comparisons.extend(run_strategy::<MutexFlag>(config));
            comparisons.extend(run_strategy::<AtomicFlag>(config));
            comparisons
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn tiny(strategy: StrategySelection, baseline: Baseline) -> BenchConfig {
        BenchConfig {
            scale: NonZeroUsize::MAX,
            strategy,
            baseline,
        }
    }

    #[test]
    fn test_suite_covers_every_operation() {
        let comparisons = run_suite(&tiny(StrategySelection::Atomic, Baseline::Arc));
        assert_eq!(comparisons.len(), Operation::ALL.len());
        for (comparison, operation) in comparisons.iter().zip(Operation::ALL) {
            assert_eq!(comparison.operation, operation.description());
            assert_eq!(comparison.amount, 1);
            assert_eq!(comparison.baseline_name, "arc");
            assert_eq!(comparison.tested_name, "atomic");
        }
    }

    #[test]
    fn test_all_strategies_against_unsync() {
        let comparisons = run_suite(&tiny(StrategySelection::All, Baseline::Unsync));
        assert_eq!(comparisons.len(), 3 * Operation::ALL.len());
        assert!(comparisons
            .iter()
            .all(|c| c.baseline_name == ThreadUnsafeFlag::STRATEGY));
        let tested: Vec<_> = comparisons
            .chunks(Operation::ALL.len())
            .map(|chunk| chunk[0].tested_name)
            .collect();
        assert_eq!(tested, ["thread_unsafe", "mutex", "atomic"]);
    }

    #[test]
    fn test_pointer_operations_agree() {
        fn exercise<P: BenchPointer>() {
            let source = P::create(1);
            let mut copy = source.clone().relocate();
            copy.store(2);
            assert_eq!(*source.value(), 1);
            assert_eq!(*copy.value(), 2);

            copy.assign(source.clone());
            assert_eq!(*copy.value(), 1);
            copy.clone_from(&P::create(3));
            assert_eq!(*copy.value(), 3);
        }
        exercise::<Arc<Data>>();
        exercise::<CowPtr<Data, ThreadUnsafeFlag>>();
        exercise::<CowPtr<Data, MutexFlag>>();
        exercise::<CowPtr<Data, AtomicFlag>>();
    }

    #[test]
    fn test_full_amounts_scale_from_creation() {
        assert_eq!(Operation::CreateMove.full_amount(), 5 * Operation::Create.full_amount());
        assert_eq!(Operation::WarmWrite.full_amount(), 4 * Operation::ColdWrite.full_amount());
    }
}
