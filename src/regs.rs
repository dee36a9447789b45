use core::fmt::Debug;

/// Width in bytes of the instruction that traps into the monitor.
///
/// Every trapping instruction (`hvc`, `svc`, `wfi`, loads and stores) is a fixed
/// 32-bit encoding on the supported architectures.
pub const INSTRUCTION_WIDTH: usize = 4;

/// Architecture-specific snapshot of the guest's user-visible registers.
///
/// The core never looks into the layout; it only needs the program counter and
/// indexed general purpose registers. Each architecture provides a plain-data
/// implementation that the HAL reads from and writes to the guest thread.
pub trait GuestRegs: Clone + Default + Debug {
    /// Returns the program counter.
    fn pc(&self) -> usize;

    /// Sets the program counter.
    fn set_pc(&mut self, pc: usize);

    /// Returns the value of a general-purpose register.
    fn gpr(&self, reg: usize) -> usize;

    /// Sets the value of a general-purpose register.
    fn set_gpr(&mut self, reg: usize, val: usize);

    /// Moves the program counter past the trapping instruction.
    fn advance_pc(&mut self) {
        self.set_pc(self.pc().wrapping_add(INSTRUCTION_WIDTH));
    }
}
