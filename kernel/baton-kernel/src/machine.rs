//! Interfaces to the simulated hardware the kernel does not implement.
//!
//! The instruction interpreter, the MMU and the storage that holds program
//! images are collaborators. The kernel only saves and restores their
//! state around context switches and asks them to run or load programs.

use std::fmt;
use std::sync::Arc;

use baton_core::regs::RegisterFile;
use baton_core::sync::IrqCell;

use crate::kernel::Kernel;

/// The simulated CPU.
pub trait ExecutionUnit: Send + Sync {
    /// Snapshots every CPU register.
    fn save_registers(&self) -> RegisterFile;

    /// Loads every CPU register from `regs`.
    fn restore_registers(&self, regs: &RegisterFile);

    /// Reads one CPU register.
    fn read_register(&self, reg: usize) -> i32;

    /// Writes one CPU register.
    fn write_register(&self, reg: usize, value: i32);

    /// Reads a NUL-terminated string from the current address space.
    /// Returns `None` if `addr` does not translate.
    fn read_user_string(&self, addr: i32) -> Option<String>;

    /// Executes user instructions for the current process.
    ///
    /// Implementations call [`ClockController::advance_tick`] once per
    /// instruction and dispatch system-call traps through
    /// [`Kernel::syscall`], which also steps the program counter past the
    /// trap. A well-behaved program leaves through the `Exit` or `Halt`
    /// call and so never returns here.
    ///
    /// [`ClockController::advance_tick`]: crate::interrupt::ClockController::advance_tick
    fn run(&self, kernel: &Kernel);
}

/// A user process's translation state.
pub trait AddressSpace: Send {
    /// Saves MMU state when the owning process is switched out.
    fn save_state(&mut self);

    /// Reinstalls MMU state when the owning process is switched in.
    fn restore_state(&mut self);

    /// Register values a fresh image starts with (program counter, stack).
    fn initial_registers(&self) -> RegisterFile;

    /// Copies the whole space for a forked child.
    fn duplicate(&self) -> Box<dyn AddressSpace>;
}

/// Errors raised while loading a program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No image exists at the path.
    NotFound(String),
    /// The image exists but cannot be loaded.
    BadImage {
        /// Path of the rejected image.
        path: String,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// The kernel was built without an image loader.
    NoLoader,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(path) => write!(f, "unable to open file {path}"),
            LoadError::BadImage { path, reason } => write!(f, "bad image {path}: {reason}"),
            LoadError::NoLoader => write!(f, "no image loader attached"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Loads program images from the simulated file system.
pub trait ImageLoader: Send + Sync {
    /// Reads the image at `path` into a fresh address space.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the image is missing or malformed.
    fn load(&self, path: &str) -> Result<Box<dyn AddressSpace>, LoadError>;
}

/// Collaborators attached to a kernel. Both are optional: a kernel that
/// only runs kernel processes needs neither.
#[derive(Clone, Default)]
pub struct Hardware {
    /// The CPU user processes run on.
    pub cpu: Option<Arc<dyn ExecutionUnit>>,
    /// Where `Exec` finds program images.
    pub loader: Option<Arc<dyn ImageLoader>>,
}

/// The register half of an [`ExecutionUnit`].
///
/// Interpreters embed one and delegate the register methods to it.
pub struct RegisterBank {
    regs: IrqCell<RegisterFile>,
}

impl RegisterBank {
    /// Creates a bank with every register cleared.
    pub const fn new() -> Self {
        Self {
            regs: IrqCell::named("cpu registers", RegisterFile::zeroed()),
        }
    }

    /// Snapshots every register.
    pub fn save(&self) -> RegisterFile {
        *self.regs.lock()
    }

    /// Loads every register.
    pub fn restore(&self, regs: &RegisterFile) {
        *self.regs.lock() = *regs;
    }

    /// Reads one register.
    pub fn read(&self, reg: usize) -> i32 {
        self.regs.lock().read(reg)
    }

    /// Writes one register.
    pub fn write(&self, reg: usize, value: i32) {
        self.regs.lock().write(reg, value);
    }

    /// Advances the program counters past the current instruction.
    pub fn advance_pc(&self) {
        self.regs.lock().advance_pc();
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use baton_core::regs::{PC_REG, RESULT_REG};

    use super::*;

    #[test]
    fn bank_save_restore() {
        let bank = RegisterBank::new();
        bank.write(RESULT_REG, 7);
        let snapshot = bank.save();
        bank.write(RESULT_REG, 9);
        assert_eq!(bank.read(RESULT_REG), 9);
        bank.restore(&snapshot);
        assert_eq!(bank.read(RESULT_REG), 7);
    }

    #[test]
    fn bank_advances_pc() {
        let bank = RegisterBank::new();
        bank.write(PC_REG, 0);
        bank.write(baton_core::regs::NEXT_PC_REG, 4);
        bank.advance_pc();
        assert_eq!(bank.read(PC_REG), 4);
    }

    #[test]
    fn load_error_display() {
        assert_eq!(
            LoadError::NotFound("halt".into()).to_string(),
            "unable to open file halt"
        );
        assert_eq!(LoadError::NoLoader.to_string(), "no image loader attached");
    }
}
