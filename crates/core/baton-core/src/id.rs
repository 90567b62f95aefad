//! Type-safe identifiers for kernel resources.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Process identifier.
///
/// Identifiers are handed out in increasing order and never reused. The
/// boot process always receives [`Pid::BOOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Pid(u32);

impl Pid {
    /// The boot process.
    pub const BOOT: Self = Self(0);

    /// Creates a new `Pid`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the value as it is passed through a register.
    #[expect(
        clippy::cast_possible_wrap,
        reason = "pids are allocated sequentially and stay far below i32::MAX"
    )]
    pub const fn as_register(self) -> i32 {
        self.0 as i32
    }

    /// Interprets a register value as a pid. Negative values are not pids.
    pub fn from_register(val: i32) -> Option<Self> {
        u32::try_from(val).ok().map(Self)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_roundtrip() {
        let pid = Pid::new(42);
        assert_eq!(pid.as_u32(), 42);
        assert_eq!(pid.to_string(), "42");
    }

    #[test]
    fn boot_pid_is_zero() {
        assert_eq!(Pid::BOOT.as_u32(), 0);
    }

    #[test]
    fn register_conversion() {
        assert_eq!(Pid::from_register(7), Some(Pid::new(7)));
        assert_eq!(Pid::from_register(-1), None);
        assert_eq!(Pid::new(9).as_register(), 9);
    }

    #[test]
    fn pids_order_by_allocation() {
        assert!(Pid::new(1) < Pid::new(2));
    }
}
