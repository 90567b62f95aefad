//! Host-thread primitives that emulate a uniprocessor.
//!
//! [`Baton`] is the only place a host thread ever blocks: each process
//! parks on its own baton until another process hands it the CPU.
//! [`IrqCell`] protects kernel data the way disabling interrupts does on a
//! real uniprocessor. It never blocks and treats contention as a bug.

mod baton;
mod irq_cell;
pub(crate) mod loom_compat;

pub use baton::{Baton, Wake};
pub use irq_cell::{IrqCell, IrqCellGuard};
