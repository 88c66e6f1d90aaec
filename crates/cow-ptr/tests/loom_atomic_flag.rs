//! Loom tests for `AtomicFlag` memory ordering.
//!
//! These tests only build with `RUSTFLAGS="--cfg loom"`, which swaps the
//! flag's atomics for loom's model-checked ones:
//!
//! ```text
//! RUSTFLAGS="--cfg loom" cargo test -p cow-ptr --test loom_atomic_flag --release
//! ```

#![cfg(loom)]

use cow_ptr::flag::{AtomicFlag, OwnershipFlag, OwnershipStatus};
use loom::cell::UnsafeCell;
use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::sync::Arc;

/// A flag guarding data that only the detach closure writes.
struct Guarded {
    flag: AtomicFlag,
    data: UnsafeCell<usize>,
    runs: AtomicUsize,
}

// SAFETY: `data` is written only inside the detach closure, which the flag
// runs on one thread, and read only after acquisition returned.
unsafe impl Sync for Guarded {}

impl Guarded {
    fn new() -> Self {
        Self {
            flag: AtomicFlag::new(false),
            data: UnsafeCell::new(0),
            runs: AtomicUsize::new(0),
        }
    }

    fn acquire_and_read(&self) -> usize {
        self.flag.acquire_ownership_once(|| {
            self.runs.fetch_add(1, Ordering::Relaxed);
            self.data.with_mut(|p| unsafe { *p = 42 });
        });
        self.data.with(|p| unsafe { *p })
    }
}

/// Test that the detach runs once and losers see its writes.
#[test]
fn test_acquire_once_publishes_detach() {
    loom::model(|| {
        let guarded = Arc::new(Guarded::new());

        let other = loom::thread::spawn({
            let guarded = Arc::clone(&guarded);
            move || guarded.acquire_and_read()
        });

        let mine = guarded.acquire_and_read();
        let theirs = other.join().unwrap();

        assert_eq!(mine, 42);
        assert_eq!(theirs, 42);
        assert_eq!(guarded.runs.load(Ordering::Relaxed), 1);
    });
}

/// Test that a failed detach hands the acquisition to a waiting thread.
#[test]
fn test_failed_detach_lets_waiter_retry() {
    loom::model(|| {
        let guarded = Arc::new(Guarded::new());

        let failing = loom::thread::spawn({
            let guarded = Arc::clone(&guarded);
            move || guarded.flag.try_acquire_ownership_once(|| Err::<(), _>("failed"))
        });

        let value = guarded.acquire_and_read();
        let failed = failing.join().unwrap();

        assert_eq!(value, 42);
        assert_eq!(guarded.runs.load(Ordering::Relaxed), 1);
        assert!(failed.is_ok() || failed == Err("failed"));
        assert_eq!(guarded.flag.status(), OwnershipStatus::Owner);
    });
}

/// Test that `set_ownership` never lands in the middle of an acquisition.
#[test]
fn test_set_ownership_serializes_with_acquire() {
    loom::model(|| {
        let guarded = Arc::new(Guarded::new());

        let acquirer = loom::thread::spawn({
            let guarded = Arc::clone(&guarded);
            move || {
                guarded.flag.acquire_ownership_once(|| {
                    guarded.runs.fetch_add(1, Ordering::Relaxed);
                });
            }
        });

        guarded.flag.set_ownership(false);
        acquirer.join().unwrap();

        let status = guarded.flag.status();
        assert_ne!(status, OwnershipStatus::AcquiringOwnership);
        if status == OwnershipStatus::NotOwner {
            // set_ownership ran after the acquisition completed.
            assert_eq!(guarded.runs.load(Ordering::Relaxed), 1);
        }
    });
}
