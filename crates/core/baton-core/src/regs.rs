//! The simulated CPU's register file layout.
//!
//! A MIPS-style layout: 32 general-purpose registers followed by the
//! special registers the interpreter keeps alongside them. System calls
//! pass their number in [`SYSCALL_CODE_REG`], their arguments in
//! [`ARG_REGS`], and return their result in [`RESULT_REG`].

use core::ops::{Index, IndexMut};

/// Number of general-purpose registers.
pub const NUM_GP_REGS: usize = 32;
/// Total number of registers, special registers included.
pub const NUM_TOTAL_REGS: usize = 40;

/// Holds system-call numbers on entry and results on return.
pub const RESULT_REG: usize = 2;
/// Alias of [`RESULT_REG`] used on system-call entry.
pub const SYSCALL_CODE_REG: usize = 2;
/// First four argument registers.
pub const ARG_REGS: [usize; 4] = [4, 5, 6, 7];
/// User stack pointer.
pub const STACK_REG: usize = 29;
/// Return address of the current call.
pub const RET_ADDR_REG: usize = 31;
/// Multiply/divide high word.
pub const HI_REG: usize = 32;
/// Multiply/divide low word.
pub const LO_REG: usize = 33;
/// Current program counter.
pub const PC_REG: usize = 34;
/// Next program counter (branch delay).
pub const NEXT_PC_REG: usize = 35;
/// Previous program counter, for debugging.
pub const PREV_PC_REG: usize = 36;
/// Target register of a delayed load.
pub const LOAD_REG: usize = 37;
/// Value of a delayed load.
pub const LOAD_VALUE_REG: usize = 38;
/// Faulting virtual address after an exception.
pub const BAD_VADDR_REG: usize = 39;

/// A snapshot of every register of the simulated CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile([i32; NUM_TOTAL_REGS]);

impl RegisterFile {
    /// A register file with every register cleared.
    pub const fn zeroed() -> Self {
        Self([0; NUM_TOTAL_REGS])
    }

    /// Reads one register.
    ///
    /// # Panics
    ///
    /// Panics if `reg >= NUM_TOTAL_REGS`.
    pub fn read(&self, reg: usize) -> i32 {
        self.0[reg]
    }

    /// Writes one register.
    ///
    /// # Panics
    ///
    /// Panics if `reg >= NUM_TOTAL_REGS`.
    pub fn write(&mut self, reg: usize, value: i32) {
        self.0[reg] = value;
    }

    /// Advances the program counters past the current instruction.
    pub fn advance_pc(&mut self) {
        self.0[PREV_PC_REG] = self.0[PC_REG];
        self.0[PC_REG] = self.0[NEXT_PC_REG];
        self.0[NEXT_PC_REG] = self.0[PC_REG].wrapping_add(4);
    }

    /// Returns the raw register array.
    pub const fn as_array(&self) -> &[i32; NUM_TOTAL_REGS] {
        &self.0
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Index<usize> for RegisterFile {
    type Output = i32;

    fn index(&self, reg: usize) -> &i32 {
        &self.0[reg]
    }
}

impl IndexMut<usize> for RegisterFile {
    fn index_mut(&mut self, reg: usize) -> &mut i32 {
        &mut self.0[reg]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_by_default() {
        let regs = RegisterFile::default();
        assert!(regs.as_array().iter().all(|&r| r == 0));
    }

    #[test]
    fn read_write() {
        let mut regs = RegisterFile::zeroed();
        regs.write(RESULT_REG, 42);
        assert_eq!(regs.read(RESULT_REG), 42);
        regs[STACK_REG] = 0x1000;
        assert_eq!(regs[STACK_REG], 0x1000);
    }

    #[test]
    fn advance_pc_shifts_program_counters() {
        let mut regs = RegisterFile::zeroed();
        regs[PC_REG] = 100;
        regs[NEXT_PC_REG] = 104;
        regs.advance_pc();
        assert_eq!(regs[PREV_PC_REG], 100);
        assert_eq!(regs[PC_REG], 104);
        assert_eq!(regs[NEXT_PC_REG], 108);
    }

    #[test]
    fn special_registers_follow_general_purpose() {
        assert_eq!(HI_REG, NUM_GP_REGS);
        assert_eq!(BAD_VADDR_REG, NUM_TOTAL_REGS - 1);
    }

    #[test]
    #[should_panic]
    fn out_of_range_register_panics() {
        let regs = RegisterFile::zeroed();
        let _ = regs.read(NUM_TOTAL_REGS);
    }
}
