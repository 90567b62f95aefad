//! Loom / shuttle compatibility shim.
//!
//! When compiled with `cfg(loom)`, re-exports loom's blocking primitives;
//! with `cfg(shuttle)`, shuttle's. Otherwise, re-exports `std::sync`.
//!
//! This allows the baton hand-off to be model-checked without code changes.

// ---------------------------------------------------------------------------
// Loom mode
// ---------------------------------------------------------------------------

#[cfg(loom)]
pub(crate) use loom::sync::{Condvar, Mutex};

// ---------------------------------------------------------------------------
// Shuttle mode
// ---------------------------------------------------------------------------

#[cfg(all(shuttle, not(loom)))]
pub(crate) use shuttle::sync::{Condvar, Mutex};

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

#[cfg(not(any(loom, shuttle)))]
pub(crate) use std::sync::{Condvar, Mutex};
