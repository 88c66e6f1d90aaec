//! A copy-on-write smart pointer for Rust.
//!
//! `cow-ptr` provides [`CowPtr<T, F>`], a handle to a heap-allocated value
//! that is cheap to duplicate and that makes a private copy of its storage
//! the first time a duplicate is written to.
//!
//! # Features
//!
//! - **O(1) copies**: cloning a `CowPtr` shares the allocation
//! - **Write isolation**: a write through one handle is never visible
//!   through another
//! - **Pluggable ownership strategies**: the acquire-once gate in front of
//!   every detach is a type parameter, see [`flag`]
//! - **Lock-free steady state**: with the default [`AtomicFlag`], a handle
//!   that already owns its payload pays one atomic load per write
//!
//! # Quick Start
//!
//! ```
//! use cow_ptr::CowPtr;
//!
//! let original: CowPtr<Vec<i32>> = CowPtr::new(vec![1, 2, 3]);
//! let mut copy = original.clone();
//! assert!(CowPtr::ptr_eq(&original, &copy));
//!
//! copy.make_mut().push(4);
//! assert_eq!(*original.read(), [1, 2, 3]);
//! assert_eq!(*copy.read(), [1, 2, 3, 4]);
//! ```
//!
//! # Choosing a strategy
//!
//! ```
//! use cow_ptr::{MutexCowPtr, UnsyncCowPtr};
//!
//! // Never shared between threads: skip synchronization entirely.
//! let mut local = UnsyncCowPtr::new(String::from("local"));
//! local.write(String::from("changed"));
//!
//! // Shared by reference between threads, lock-based acquisition.
//! let shared = MutexCowPtr::new(0_u64);
//! assert_eq!(*shared.read(), 0);
//! ```
//!
//! # Thread Safety
//!
//! `CowPtr<T, F>` is `Send` when `T: Send + Sync` and `F: Send`, and `Sync`
//! when additionally `F: Sync`. [`ThreadUnsafeFlag`] is not `Sync`, so
//! [`UnsyncCowPtr`] handles can move between threads but not be shared.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod flag;
mod metrics;
mod payload;
mod ptr;
mod sync;
mod tracing;

// Re-export public API
pub use flag::{AtomicFlag, MutexFlag, OwnershipFlag, OwnershipStatus, ThreadUnsafeFlag};
pub use metrics::{detach_metrics, DetachMetrics};
pub use payload::SharedPayload;
pub use ptr::{AtomicCowPtr, CowPtr, MutexCowPtr, UnsyncCowPtr};
