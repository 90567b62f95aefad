//! Simulated interrupt hardware state.
//!
//! Devices do not interrupt asynchronously. Instead, each device schedules
//! an event at an absolute tick, and the clock controller fires events
//! whose time has come whenever interrupts are re-enabled or the machine
//! idles. [`PendingQueue`] keeps those events ordered.

use core::fmt;
use std::collections::BTreeMap;

use serde::Serialize;

/// The simulated interrupt level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IntLevel {
    /// Interrupts are masked.
    Off,
    /// Interrupts may fire.
    On,
}

impl IntLevel {
    /// Returns `On` for `true`, `Off` for `false`.
    pub const fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::On } else { Self::Off }
    }

    /// Returns `true` for `On`.
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for IntLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
        })
    }
}

/// What the simulated CPU is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MachineMode {
    /// Nothing is runnable; waiting for an interrupt.
    Idle,
    /// Executing kernel code (or an interrupt handler).
    System,
    /// Executing user instructions.
    User,
}

impl MachineMode {
    /// Returns a short human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// The device that raised an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InterruptKind {
    /// Periodic or randomized timer.
    Timer,
    /// Disk request completion.
    Disk,
    /// Console finished writing a character.
    ConsoleWrite,
    /// Console has a character available.
    ConsoleRead,
    /// Network packet sent.
    NetworkSend,
    /// Network packet received.
    NetworkRecv,
}

impl InterruptKind {
    /// Returns the name used in interrupt traces.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Disk => "disk",
            Self::ConsoleWrite => "console write",
            Self::ConsoleRead => "console read",
            Self::NetworkSend => "network send",
            Self::NetworkRecv => "network recv",
        }
    }
}

impl fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An interrupt scheduled to fire at an absolute tick.
pub struct PendingInterrupt<H> {
    /// Absolute simulated tick at which the interrupt fires.
    pub fire_time: u64,
    /// Originating device.
    pub kind: InterruptKind,
    /// Deferred handler call.
    pub handler: H,
    seq: u64,
}

impl<H> fmt::Debug for PendingInterrupt<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInterrupt")
            .field("fire_time", &self.fire_time)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Pending interrupts ordered by fire time.
///
/// Events with equal fire times keep their insertion order. An event taken
/// with [`pop_first`](Self::pop_first) and handed back with
/// [`restore`](Self::restore) regains its exact former position.
pub struct PendingQueue<H> {
    entries: BTreeMap<(u64, u64), PendingInterrupt<H>>,
    next_seq: u64,
}

impl<H> PendingQueue<H> {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `handler` to fire at `fire_time`.
    pub fn insert(&mut self, fire_time: u64, kind: InterruptKind, handler: H) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            (fire_time, seq),
            PendingInterrupt {
                fire_time,
                kind,
                handler,
                seq,
            },
        );
    }

    /// Removes and returns the earliest pending interrupt.
    pub fn pop_first(&mut self) -> Option<PendingInterrupt<H>> {
        self.entries.pop_first().map(|(_, entry)| entry)
    }

    /// Puts back an interrupt taken with [`pop_first`](Self::pop_first).
    pub fn restore(&mut self, entry: PendingInterrupt<H>) {
        self.entries.insert((entry.fire_time, entry.seq), entry);
    }

    /// Returns the earliest pending interrupt without removing it.
    pub fn peek(&self) -> Option<&PendingInterrupt<H>> {
        self.entries.values().next()
    }

    /// Iterates in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingInterrupt<H>> {
        self.entries.values()
    }

    /// Returns the number of pending interrupts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every pending interrupt.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<H> Default for PendingQueue<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(q: &mut PendingQueue<&'static str>) -> Vec<(u64, &'static str)> {
        let mut out = Vec::new();
        while let Some(entry) = q.pop_first() {
            out.push((entry.fire_time, entry.handler));
        }
        out
    }

    #[test]
    fn fires_in_time_order() {
        let mut q = PendingQueue::new();
        q.insert(30, InterruptKind::Disk, "c");
        q.insert(10, InterruptKind::Timer, "a");
        q.insert(20, InterruptKind::ConsoleWrite, "b");
        assert_eq!(drain(&mut q), [(10, "a"), (20, "b"), (30, "c")]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut q = PendingQueue::new();
        q.insert(50, InterruptKind::Disk, "first");
        q.insert(10, InterruptKind::Timer, "early");
        q.insert(50, InterruptKind::ConsoleRead, "second");
        q.insert(50, InterruptKind::NetworkRecv, "third");
        assert_eq!(
            drain(&mut q),
            [(10, "early"), (50, "first"), (50, "second"), (50, "third")]
        );
    }

    #[test]
    fn restore_regains_position() {
        let mut q = PendingQueue::new();
        q.insert(5, InterruptKind::Timer, "a");
        q.insert(5, InterruptKind::Disk, "b");
        let first = q.pop_first().unwrap();
        assert_eq!(first.handler, "a");
        q.restore(first);
        assert_eq!(q.peek().map(|e| e.handler), Some("a"));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn empty_queue() {
        let mut q: PendingQueue<()> = PendingQueue::default();
        assert!(q.is_empty());
        assert!(q.peek().is_none());
        assert!(q.pop_first().is_none());
    }

    #[test]
    fn level_helpers() {
        assert!(IntLevel::from_enabled(true).is_on());
        assert_eq!(IntLevel::from_enabled(false), IntLevel::Off);
        assert_eq!(IntLevel::On.to_string(), "on");
    }
}
