//! The timer device.
//!
//! Raises a timer interrupt every `ticks` ticks, or, when seeded, after a
//! pseudo-random interval in `1..=2 * ticks`. Each expiry asks the
//! interrupted process to yield, which time-slices the processes at
//! reproducible but irregular points.

use baton_core::interrupt::{InterruptKind, MachineMode};

use crate::config::TimerConfig;
use crate::kdebug;
use crate::kernel::Kernel;

/// Fallback seed; xorshift never leaves zero.
const ZERO_SEED_FALLBACK: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// xorshift64 interval generator.
#[derive(Debug, Clone)]
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> Self {
        let mixed = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self(if mixed == 0 { ZERO_SEED_FALLBACK } else { mixed })
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

/// A periodic or randomized interrupt source.
#[derive(Debug, Clone)]
pub struct Timer {
    ticks: u64,
    rng: Option<XorShift64>,
}

impl Timer {
    /// Creates a timer from its configuration without attaching it.
    pub fn new(config: &TimerConfig) -> Self {
        Self {
            ticks: config.ticks.max(1),
            rng: config.random_seed.map(XorShift64::new),
        }
    }

    /// Creates a timer and schedules its first interrupt.
    pub fn attach(kernel: &Kernel, config: &TimerConfig) {
        kdebug!(
            INTERRUPT,
            "Attaching timer: every {} ticks{}",
            config.ticks,
            if config.random_seed.is_some() { " (randomized)" } else { "" }
        );
        Self::new(config).arm(kernel);
    }

    /// Ticks until the next interrupt.
    pub fn next_interval(&mut self) -> u64 {
        match &mut self.rng {
            Some(rng) => 1 + rng.next() % (self.ticks * 2),
            None => self.ticks,
        }
    }

    fn arm(mut self, kernel: &Kernel) {
        let delay = self.next_interval();
        kernel
            .clock()
            .schedule(Self::expired, self, delay, InterruptKind::Timer);
    }

    fn expired(kernel: &Kernel, timer: Self) {
        timer.arm(kernel);
        if kernel.clock().mode() != MachineMode::Idle {
            kernel.clock().yield_on_return();
        }
    }
}
