//! System calls from user programs.
//!
//! The execution unit traps into [`Kernel::syscall`] with the call number
//! in r2 and arguments in r4..r7. Results go back in r2. Process-management
//! calls are served here. The file-system calls belong to the storage
//! collaborator and are not served by this kernel.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use baton_core::id::Pid;
use baton_core::interrupt::MachineMode;
use baton_core::kernel_assert;
use baton_core::regs::{ARG_REGS, RESULT_REG, SYSCALL_CODE_REG};

use crate::kernel::Kernel;
use crate::machine::{ExecutionUnit, LoadError};
use crate::proc::{JoinOutcome, Pcb};
use crate::{kdebug, kerr};

/// System-call numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SyscallNumber {
    /// Stop the machine.
    Halt = 0,
    /// Terminate the calling process.
    Exit = 1,
    /// Replace the calling process's program.
    Exec = 2,
    /// Wait for a process to exit.
    Join = 3,
    /// Create a file.
    Create = 4,
    /// Open a file.
    Open = 5,
    /// Read from an open file.
    Read = 6,
    /// Write to an open file.
    Write = 7,
    /// Close an open file.
    Close = 8,
    /// Duplicate the calling process.
    Fork = 9,
    /// Give up the CPU.
    Yield = 10,
}

impl TryFrom<i32> for SyscallNumber {
    type Error = SyscallError;

    fn try_from(code: i32) -> Result<Self, SyscallError> {
        Ok(match code {
            0 => Self::Halt,
            1 => Self::Exit,
            2 => Self::Exec,
            3 => Self::Join,
            4 => Self::Create,
            5 => Self::Open,
            6 => Self::Read,
            7 => Self::Write,
            8 => Self::Close,
            9 => Self::Fork,
            10 => Self::Yield,
            _ => return Err(SyscallError::Unknown(code)),
        })
    }
}

/// Errors raised while decoding a system call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyscallError {
    /// The call number is not assigned.
    Unknown(i32),
    /// The call exists but this kernel does not serve it.
    Unsupported(SyscallNumber),
    /// A pointer argument does not translate.
    BadAddress(i32),
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyscallError::Unknown(code) => write!(f, "unknown system call {code}"),
            SyscallError::Unsupported(number) => write!(f, "unsupported system call {number:?}"),
            SyscallError::BadAddress(addr) => write!(f, "bad user address {addr:#x}"),
        }
    }
}

impl std::error::Error for SyscallError {}

/// A decoded system call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syscall {
    /// Stop the machine.
    Halt,
    /// Terminate with an exit code.
    Exit(i32),
    /// Run the program at a path.
    Exec(String),
    /// Wait for the process with this raw pid.
    Join(i32),
    /// Duplicate the caller.
    Fork,
    /// Give up the CPU.
    Yield,
}

impl Syscall {
    /// Decodes the call in the CPU's registers.
    ///
    /// # Errors
    ///
    /// Returns [`SyscallError`] for unassigned or unsupported numbers and
    /// for path arguments that do not translate.
    pub fn decode(cpu: &dyn ExecutionUnit) -> Result<Self, SyscallError> {
        let number = SyscallNumber::try_from(cpu.read_register(SYSCALL_CODE_REG))?;
        let arg = cpu.read_register(ARG_REGS[0]);
        Ok(match number {
            SyscallNumber::Halt => Self::Halt,
            SyscallNumber::Exit => Self::Exit(arg),
            SyscallNumber::Exec => Self::Exec(
                cpu.read_user_string(arg)
                    .ok_or(SyscallError::BadAddress(arg))?,
            ),
            SyscallNumber::Join => Self::Join(arg),
            SyscallNumber::Fork => Self::Fork,
            SyscallNumber::Yield => Self::Yield,
            SyscallNumber::Create
            | SyscallNumber::Open
            | SyscallNumber::Read
            | SyscallNumber::Write
            | SyscallNumber::Close => return Err(SyscallError::Unsupported(number)),
        })
    }
}

impl Kernel {
    fn cpu(&self) -> Arc<dyn ExecutionUnit> {
        match &self.hardware().cpu {
            Some(cpu) => cpu.clone(),
            None => panic!("kernel invariant violated: user program without an execution unit"),
        }
    }

    /// Handles a system-call trap from the current process.
    ///
    /// Steps the program counter past the trap, serves the call in system
    /// mode and writes any result to r2. An undecodable call halts the
    /// machine.
    pub fn syscall(&self) {
        let cpu = self.cpu();
        let mut regs = cpu.save_registers();
        regs.advance_pc();
        cpu.restore_registers(&regs);

        let prev_mode = self.clock().mode();
        self.clock().set_mode(MachineMode::System);

        let call = match Syscall::decode(cpu.as_ref()) {
            Ok(call) => call,
            Err(e) => {
                kerr!("{e}");
                self.clock().halt();
            }
        };
        kdebug!(SYSCALL, "System call {call:?}");
        if let Some(result) = self.handle_syscall(call) {
            cpu.write_register(RESULT_REG, result);
        }

        self.clock().set_mode(prev_mode);
    }

    /// Serves a decoded call. Returns the value for the result register.
    pub fn handle_syscall(&self, call: Syscall) -> Option<i32> {
        match call {
            Syscall::Halt => self.clock().halt(),
            Syscall::Exit(code) => self.exit(code),
            Syscall::Exec(path) => match self.exec(&path) {
                Ok(never) => match never {},
                Err(e) => {
                    kerr!("exec {path}: {e}");
                    Some(JoinOutcome::REJECTED_CODE)
                }
            },
            Syscall::Join(target) => Some(
                Pid::from_register(target)
                    .map_or(JoinOutcome::Rejected, |pid| self.join(pid))
                    .as_register(),
            ),
            Syscall::Fork => Some(self.fork_user().as_register()),
            Syscall::Yield => {
                self.yield_now();
                None
            }
        }
    }

    /// Replaces the current process's program with the image at `path`
    /// and runs it. Only returns on failure to load.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if no loader is attached or the image cannot
    /// be loaded. The caller's program is left untouched.
    pub fn exec(&self, path: &str) -> Result<Infallible, LoadError> {
        let loader = self.hardware().loader.clone().ok_or(LoadError::NoLoader)?;
        let space = loader.load(path)?;
        let cpu = self.cpu();
        let me = self.current_process();
        kdebug!(SYSCALL, "Exec {path} in process {}", me.name());

        let regs = space.initial_registers();
        drop(me.set_address_space(space));
        me.set_saved_registers(regs);
        self.restore_user_state(&me);
        self.run_user(&me, cpu.as_ref())
    }

    /// Creates a process that runs the program at `path`.
    pub fn spawn_program(&self, path: &str) -> Arc<Pcb> {
        let kernel = self.handle();
        self.spawn(
            path,
            move |path: String| {
                if let Err(e) = kernel.exec(&path) {
                    kerr!("{e}");
                }
            },
            path.to_string(),
        )
    }

    /// Duplicates the current user process. The child resumes after the
    /// trap with 0 in r2; the parent gets the child's pid.
    pub fn fork_user(&self) -> Pid {
        let parent = self.current_process();
        let cpu = self.cpu();
        let space = parent.with_address_space(|space| space.duplicate());
        let Some(space) = space else {
            panic!(
                "kernel invariant violated: fork from kernel process {}",
                parent.name()
            );
        };

        let child = self.create_process(format!("{}.child", parent.name()));
        child.set_address_space(space);
        let mut regs = cpu.save_registers();
        regs.write(RESULT_REG, 0);
        child.set_saved_registers(regs);
        kdebug!(
            SYSCALL,
            "Process {} forks {} ({})",
            parent.name(),
            child.name(),
            child.pid()
        );

        let kernel = self.handle();
        self.fork(&child, move |()| { kernel.resume_user(); }, ());
        child.pid()
    }

    /// Enters the saved user state of the current process on its first
    /// dispatch.
    fn resume_user(&self) -> ! {
        let me = self.current_process();
        let cpu = self.cpu();
        self.restore_user_state(&me);
        self.run_user(&me, cpu.as_ref())
    }

    fn run_user(&self, me: &Pcb, cpu: &dyn ExecutionUnit) -> ! {
        kernel_assert!(
            me.has_address_space(),
            "process {} entered user mode without an address space",
            me.name()
        );
        kdebug!(MACHINE, "Process {} enters user mode", me.name());
        self.clock().set_mode(MachineMode::User);
        cpu.run(self);
        panic!(
            "kernel invariant violated: user program in process {} returned without exiting",
            me.name()
        )
    }
}
