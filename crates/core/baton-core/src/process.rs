//! Process lifecycle states.

use core::fmt;

use serde::Serialize;

/// The state of a process control block.
///
/// ```text
/// Created ──fork──▶ Ready ──dispatch──▶ Running ──finish──▶ Killed
///                     ▲                   │
///                     └──yield────────────┤
///                                         ▼
///               Ready ◀──wakeup────── Blocked
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessState {
    /// Constructed but never forked.
    Created,
    /// Currently owns the simulated CPU.
    Running,
    /// Sitting in the ready queue.
    Ready,
    /// Waiting on a semaphore, a join, or a destroy.
    Blocked,
    /// Destroyed; never scheduled again.
    Killed,
}

impl ProcessState {
    /// Returns a short human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::Killed => "killed",
        }
    }

    /// Whether the scheduler may legally move a process from `self` to `to`.
    pub const fn can_become(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Created | Self::Running | Self::Blocked, Self::Ready)
                | (Self::Ready | Self::Blocked, Self::Running)
                | (Self::Running, Self::Blocked)
                | (Self::Blocked | Self::Ready | Self::Created, Self::Killed)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_and_dispatch_are_legal() {
        assert!(ProcessState::Created.can_become(ProcessState::Ready));
        assert!(ProcessState::Ready.can_become(ProcessState::Running));
        assert!(ProcessState::Running.can_become(ProcessState::Ready));
        assert!(ProcessState::Running.can_become(ProcessState::Blocked));
        assert!(ProcessState::Blocked.can_become(ProcessState::Ready));
    }

    #[test]
    fn killed_is_terminal() {
        for to in [
            ProcessState::Created,
            ProcessState::Running,
            ProcessState::Ready,
            ProcessState::Blocked,
            ProcessState::Killed,
        ] {
            assert!(!ProcessState::Killed.can_become(to));
        }
    }

    #[test]
    fn created_cannot_run_without_fork() {
        assert!(!ProcessState::Created.can_become(ProcessState::Running));
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(ProcessState::Blocked.to_string(), "blocked");
    }
}
