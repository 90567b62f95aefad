//! Simulated-time accounting.
//!
//! Every advance of the simulated clock is charged to exactly one of the
//! idle, system or user buckets, so `total = idle + system + user` holds
//! at all times.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Ticks charged per interrupt re-enable while executing user code.
pub const USER_TICK: u64 = 1;
/// Ticks charged per interrupt re-enable while executing kernel code.
pub const SYSTEM_TICK: u64 = 10;
/// Mean ticks between timer interrupts.
pub const TIMER_TICKS: u64 = 100;

/// The cost of one clock advance, by execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TickCosts {
    /// Charged while in system mode.
    pub system: u64,
    /// Charged while in user mode.
    pub user: u64,
}

impl Default for TickCosts {
    fn default() -> Self {
        Self {
            system: SYSTEM_TICK,
            user: USER_TICK,
        }
    }
}

/// Machine-wide performance counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Simulated time since boot.
    pub total_ticks: u64,
    /// Time spent with nothing to run.
    pub idle_ticks: u64,
    /// Time spent executing kernel code.
    pub system_ticks: u64,
    /// Time spent executing user instructions.
    pub user_ticks: u64,
    /// Disk sectors read.
    pub num_disk_reads: u64,
    /// Disk sectors written.
    pub num_disk_writes: u64,
    /// Console characters read.
    pub num_console_chars_read: u64,
    /// Console characters written.
    pub num_console_chars_written: u64,
    /// Virtual memory page faults.
    pub num_page_faults: u64,
    /// Network packets sent.
    pub num_packets_sent: u64,
    /// Network packets received.
    pub num_packets_recvd: u64,
}

impl Statistics {
    /// Charges `ticks` of kernel execution.
    pub fn charge_system(&mut self, ticks: u64) {
        self.system_ticks += ticks;
        self.total_ticks += ticks;
    }

    /// Charges `ticks` of user execution.
    pub fn charge_user(&mut self, ticks: u64) {
        self.user_ticks += ticks;
        self.total_ticks += ticks;
    }

    /// Fast-forwards the clock to `to`, charging the gap as idle time.
    /// Does nothing if `to` is not in the future.
    pub fn idle_until(&mut self, to: u64) {
        if let Some(gap) = to.checked_sub(self.total_ticks) {
            self.idle_ticks += gap;
            self.total_ticks = to;
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ticks: total {}, idle {}, system {}, user {}",
            self.total_ticks, self.idle_ticks, self.system_ticks, self.user_ticks
        )?;
        writeln!(
            f,
            "Disk I/O: reads {}, writes {}",
            self.num_disk_reads, self.num_disk_writes
        )?;
        writeln!(
            f,
            "Console I/O: reads {}, writes {}",
            self.num_console_chars_read, self.num_console_chars_written
        )?;
        writeln!(f, "Paging: faults {}", self.num_page_faults)?;
        write!(
            f,
            "Network I/O: packets received {}, sent {}",
            self.num_packets_recvd, self.num_packets_sent
        )
    }
}
