//! Process control blocks.
//!
//! A [`Pcb`] is one logical process. Its body runs on a dedicated host
//! thread (the execution vehicle), created parked the first time the
//! process is dispatched. The vehicle only runs while it holds the CPU; at
//! every other moment it is suspended on the PCB's baton.

mod switch;

use std::fmt;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};

use baton_core::id::Pid;
use baton_core::kernel_assert;
use baton_core::process::ProcessState;
use baton_core::regs::RegisterFile;
use baton_core::sync::{Baton, IrqCell};

use crate::machine::AddressSpace;

pub use switch::JoinOutcome;

/// The deferred body of a forked process.
pub(crate) type Entry = Box<dyn FnOnce() + Send>;

// ── PCB ───────────────────────────────────────────────────────────────

/// Mutable PCB fields. Only touched while the process is offline, or by
/// the process itself around a switch.
struct PcbInner {
    state: ProcessState,
    registers: RegisterFile,
    space: Option<Box<dyn AddressSpace>>,
    entry: Option<Entry>,
    started: bool,
}

/// A process control block.
pub struct Pcb {
    pid: Pid,
    name: String,
    inner: IrqCell<PcbInner>,
    baton: Baton,
    vehicle: OnceLock<ThreadId>,
}

impl Pcb {
    pub(crate) fn new(pid: Pid, name: String) -> Self {
        Self {
            pid,
            name,
            inner: IrqCell::named(
                "pcb",
                PcbInner {
                    state: ProcessState::Created,
                    registers: RegisterFile::zeroed(),
                    space: None,
                    entry: None,
                    started: false,
                },
            ),
            baton: Baton::new(),
            vehicle: OnceLock::new(),
        }
    }

    /// Returns the process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Returns the debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.inner.lock().state
    }

    pub(crate) fn set_state(&self, to: ProcessState) {
        let mut inner = self.inner.lock();
        kernel_assert!(
            inner.state.can_become(to),
            "process {} cannot go from {} to {}",
            self.name,
            inner.state,
            to
        );
        inner.state = to;
    }

    // ── Saved user state ──────────────────────────────────────────────

    /// Returns the saved register file.
    pub fn saved_registers(&self) -> RegisterFile {
        self.inner.lock().registers
    }

    /// Replaces the saved register file.
    pub fn set_saved_registers(&self, regs: RegisterFile) {
        self.inner.lock().registers = regs;
    }

    /// Reads one saved register.
    pub fn saved_register(&self, reg: usize) -> i32 {
        self.inner.lock().registers.read(reg)
    }

    /// Writes one saved register, e.g. a join result for a blocked parent.
    pub fn write_saved_register(&self, reg: usize, value: i32) {
        self.inner.lock().registers.write(reg, value);
    }

    /// Installs an address space, returning the one it replaces.
    pub fn set_address_space(&self, space: Box<dyn AddressSpace>) -> Option<Box<dyn AddressSpace>> {
        self.inner.lock().space.replace(space)
    }

    /// Whether the process runs user code.
    pub fn has_address_space(&self) -> bool {
        self.inner.lock().space.is_some()
    }

    /// Runs `f` on the address space, if there is one.
    pub fn with_address_space<R>(&self, f: impl FnOnce(&mut dyn AddressSpace) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        match inner.space.as_deref_mut() {
            Some(space) => Some(f(space)),
            None => None,
        }
    }

    pub(crate) fn take_address_space(&self) -> Option<Box<dyn AddressSpace>> {
        self.inner.lock().space.take()
    }

    // ── Vehicle ───────────────────────────────────────────────────────

    pub(crate) fn install_entry(&self, entry: Entry) {
        let mut inner = self.inner.lock();
        kernel_assert!(
            inner.state == ProcessState::Created && inner.entry.is_none(),
            "process {} forked twice",
            self.name
        );
        inner.entry = Some(entry);
    }

    pub(crate) fn take_entry(&self) -> Option<Entry> {
        self.inner.lock().entry.take()
    }

    /// Whether the execution vehicle has been created.
    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    pub(crate) fn mark_started(&self) {
        self.inner.lock().started = true;
    }

    pub(crate) fn baton(&self) -> &Baton {
        &self.baton
    }

    /// Binds the process to the calling host thread.
    pub(crate) fn bind_vehicle(&self) {
        let id = thread::current().id();
        kernel_assert!(
            self.vehicle.set(id).is_ok() || self.vehicle.get() == Some(&id),
            "process {} moved to another vehicle",
            self.name
        );
    }

    /// Turns the calling thread into this process's vehicle, already
    /// running. Used once, for the boot process.
    pub(crate) fn boot_on_current_thread(&self) {
        self.bind_vehicle();
        let mut inner = self.inner.lock();
        inner.state = ProcessState::Running;
        inner.started = true;
    }

    /// Whether the calling host thread is this process's vehicle.
    pub fn is_on_current_thread(&self) -> bool {
        self.vehicle.get() == Some(&thread::current().id())
    }
}

impl fmt::Display for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.name, self.pid, self.state())
    }
}

impl fmt::Debug for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pcb")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use baton_core::regs::RESULT_REG;

    use super::*;

    struct FakeSpace {
        saves: u32,
    }

    impl AddressSpace for FakeSpace {
        fn save_state(&mut self) {
            self.saves += 1;
        }

        fn restore_state(&mut self) {}

        fn initial_registers(&self) -> RegisterFile {
            RegisterFile::zeroed()
        }

        fn duplicate(&self) -> Box<dyn AddressSpace> {
            Box::new(FakeSpace { saves: 0 })
        }
    }

    #[test]
    fn new_pcb_is_created() {
        let pcb = Pcb::new(Pid::new(3), "worker".into());
        assert_eq!(pcb.pid(), Pid::new(3));
        assert_eq!(pcb.name(), "worker");
        assert_eq!(pcb.state(), ProcessState::Created);
        assert!(!pcb.is_started());
        assert!(!pcb.has_address_space());
        assert!(!pcb.is_on_current_thread());
        assert_eq!(pcb.to_string(), "worker (3) created");
    }

    #[test]
    fn saved_registers() {
        let pcb = Pcb::new(Pid::new(1), "p".into());
        pcb.write_saved_register(RESULT_REG, -1);
        assert_eq!(pcb.saved_register(RESULT_REG), -1);
        assert_eq!(pcb.saved_registers().read(RESULT_REG), -1);
    }

    #[test]
    fn address_space_ownership() {
        let pcb = Pcb::new(Pid::new(1), "user".into());
        assert!(pcb.set_address_space(Box::new(FakeSpace { saves: 0 })).is_none());
        assert_eq!(pcb.with_address_space(|s| s.save_state()), Some(()));
        assert!(pcb.has_address_space());
        assert!(pcb.take_address_space().is_some());
        assert_eq!(pcb.with_address_space(|s| s.save_state()), None);
    }

    #[test]
    #[should_panic(expected = "cannot go from created to running")]
    fn illegal_transition_is_fatal() {
        let pcb = Pcb::new(Pid::new(1), "p".into());
        pcb.set_state(ProcessState::Running);
    }

    #[test]
    #[should_panic(expected = "forked twice")]
    fn double_fork_is_fatal() {
        let pcb = Pcb::new(Pid::new(1), "p".into());
        pcb.install_entry(Box::new(|| {}));
        pcb.install_entry(Box::new(|| {}));
    }

    #[test]
    fn boot_binds_current_thread() {
        let pcb = Pcb::new(Pid::BOOT, "main".into());
        pcb.boot_on_current_thread();
        assert!(pcb.is_on_current_thread());
        assert_eq!(pcb.state(), ProcessState::Running);
        assert!(pcb.is_started());
    }
}
