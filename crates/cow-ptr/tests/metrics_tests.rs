//! Integration tests for the detach metrics.
//!
//! Counters are process-wide and other tests in this binary may bump them
//! concurrently, so assertions compare lower bounds of deltas.

#![cfg(not(loom))]

use cow_ptr::{detach_metrics, AtomicCowPtr, CowPtr, MutexCowPtr, UnsyncCowPtr};

#[test]
fn test_deep_copy_counted() {
    let metrics = detach_metrics();
    let detaches = metrics.total_detaches();
    let copies = metrics.total_deep_copies();

    let origin: AtomicCowPtr<Vec<u8>> = CowPtr::new(vec![0; 64]);
    let mut copy = origin.clone();
    copy.make_mut()[0] = 1;

    assert!(metrics.total_detaches() > detaches);
    assert!(metrics.total_deep_copies() > copies);
}

#[test]
fn test_reclaim_counted() {
    let metrics = detach_metrics();
    let reclaims = metrics.total_reclaims();

    let mut p: UnsyncCowPtr<i32> = CowPtr::new(1);
    drop(p.clone());
    p.write(2);

    assert!(metrics.total_reclaims() > reclaims);
    assert_eq!(*p.read(), 2);
}

#[test]
fn test_failed_detach_counted() {
    let metrics = detach_metrics();
    let failures = metrics.total_failed_detaches();

    let origin: MutexCowPtr<i32> = CowPtr::new(1);
    let mut copy = origin.clone();
    assert!(copy.try_make_mut_with(|_| Err::<i32, _>(())).is_err());

    assert!(metrics.total_failed_detaches() > failures);
}

#[test]
fn test_owner_write_counts_nothing_new() {
    let mut p: UnsyncCowPtr<i32> = CowPtr::new(1);
    // A fresh handle never detaches, whatever other tests are doing.
    for i in 0..10 {
        p.write(i);
    }
    assert!(p.is_owner());
    assert_eq!(*p.read(), 9);
}
