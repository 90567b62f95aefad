//! Core types and hand-off primitives for the Baton kernel.
//!
//! This crate contains the host-testable building blocks of the kernel:
//! identifiers, process states, the saved register file, statistics,
//! the FIFO ready queue and join wait table, the pending-interrupt queue,
//! and the two primitives that make host threads behave like processes on
//! a uniprocessor (the hand-off [`Baton`](sync::Baton) and the
//! interrupt-discipline [`IrqCell`](sync::IrqCell)).
//!
//! Nothing here knows about the kernel context; `baton-kernel` wires these
//! pieces together.

#![warn(missing_docs)]

pub mod id;
pub mod interrupt;
pub mod process;
pub mod regs;
pub mod safety;
pub mod sched;
pub mod stats;
pub mod sync;
