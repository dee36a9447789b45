use core::fmt;

use crate::addr::GuestPhysAddr;
use crate::regs::GuestRegs;

/// Write-not-Read bit of a data abort syndrome.
const FSR_WNR: u32 = 1 << 6;
/// Syndrome-valid bit: SAS and SRT carry information.
const FSR_ISV: u32 = 1 << 24;
const FSR_SAS_SHIFT: u32 = 22;
const FSR_SRT_SHIFT: u32 = 16;
const FSR_SRT_MASK: u32 = 0x1f;

/// The kind of fault an episode is handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// No fault has been captured yet.
    None,
    /// A data read from guest-physical memory.
    Read,
    /// A data write to guest-physical memory.
    Write,
    /// An instruction fetch from guest-physical memory.
    Prefetch,
    /// The guest is idling in `wfi`/`wfe` until an interrupt arrives.
    WaitForInterrupt,
}

/// The state of the fault episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultState {
    /// No episode in flight.
    Idle = 0,
    /// A fault was captured and is waiting for a terminal action.
    Pending = 1,
    /// The guest is to be resumed with the (possibly modified) registers.
    Restarted = 2,
    /// The guest must never be resumed for this fault.
    Abandoned = 3,
}

/// Width of a trapped data access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    Half,
    Word,
    Double,
}

impl AccessWidth {
    /// Size of the access in bytes.
    pub const fn size(self) -> usize {
        match self {
            AccessWidth::Byte => 1,
            AccessWidth::Half => 2,
            AccessWidth::Word => 4,
            AccessWidth::Double => 8,
        }
    }

    /// Mask selecting the bytes of a register touched by the access.
    pub const fn mask(self) -> usize {
        if self.size() >= core::mem::size_of::<usize>() {
            usize::MAX
        } else {
            (1usize << (self.size() * 8)) - 1
        }
    }
}

/// The single fault episode of a VM.
///
/// One context exists per VM and is reused across episodes. [`FaultContext::begin`]
/// (or [`FaultContext::begin_wfi`]) captures a new fault, device handlers then move it
/// to exactly one terminal state with [`FaultContext::restart`] or
/// [`FaultContext::abandon`]. The dispatcher acts on that state once the handlers return.
pub struct FaultContext<R: GuestRegs> {
    regs: R,
    /// Registers were modified and must be written back before resuming.
    regs_dirty: bool,
    kind: FaultKind,
    addr: GuestPhysAddr,
    ip: usize,
    fsr: u32,
    state: FaultState,
}

impl<R: GuestRegs> FaultContext<R> {
    /// Creates an idle context.
    pub fn new() -> Self {
        Self {
            regs: R::default(),
            regs_dirty: false,
            kind: FaultKind::None,
            addr: GuestPhysAddr::from_usize(0),
            ip: 0,
            fsr: 0,
            state: FaultState::Idle,
        }
    }

    /// Starts a new memory-fault episode.
    pub fn begin(&mut self, regs: R, addr: GuestPhysAddr, ip: usize, prefetch: bool, fsr: u32) {
        self.capture(regs);
        self.addr = addr;
        self.ip = ip;
        self.fsr = fsr;
        self.kind = if prefetch {
            FaultKind::Prefetch
        } else if fsr & FSR_WNR != 0 {
            FaultKind::Write
        } else {
            FaultKind::Read
        };
    }

    /// Starts a new wait-for-interrupt episode.
    pub fn begin_wfi(&mut self, regs: R) {
        self.ip = regs.pc();
        self.capture(regs);
        self.addr = GuestPhysAddr::from_usize(0);
        self.fsr = 0;
        self.kind = FaultKind::WaitForInterrupt;
    }

    fn capture(&mut self, regs: R) {
        if self.state == FaultState::Pending {
            warn!("Fault {:?} replaced before it was handled", self.kind);
        }
        self.regs = regs;
        self.regs_dirty = false;
        self.state = FaultState::Pending;
    }

    /// Marks the fault as handled; the guest resumes with the current registers.
    pub fn restart(&mut self) {
        self.finish(FaultState::Restarted);
    }

    /// Marks the fault as handled; the guest must not be resumed.
    pub fn abandon(&mut self) {
        self.finish(FaultState::Abandoned);
    }

    /// Abandons the fault whatever a handler decided before failing.
    pub(crate) fn fail(&mut self) {
        self.state = FaultState::Abandoned;
    }

    fn finish(&mut self, to: FaultState) {
        if self.state == FaultState::Pending {
            self.state = to;
        } else {
            warn!("Fault state is not Pending, but {:?}; {:?} ignored", self.state, to);
        }
    }

    /// Skips the faulting instruction and restarts the guest.
    pub fn advance(&mut self) {
        self.regs.advance_pc();
        self.regs_dirty = true;
        self.restart();
    }

    /// Whether the episode reached a terminal state.
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, FaultState::Restarted | FaultState::Abandoned)
    }

    /// Get the state of the episode.
    pub fn state(&self) -> FaultState {
        self.state
    }

    /// Get the kind of the fault.
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn is_read(&self) -> bool {
        self.kind == FaultKind::Read
    }

    pub fn is_write(&self) -> bool {
        self.kind == FaultKind::Write
    }

    pub fn is_prefetch(&self) -> bool {
        self.kind == FaultKind::Prefetch
    }

    pub fn is_wfi(&self) -> bool {
        self.kind == FaultKind::WaitForInterrupt
    }

    /// The faulting guest physical address. Only meaningful for memory faults.
    pub fn address(&self) -> GuestPhysAddr {
        self.addr
    }

    /// Redirects the fault to another address, e.g. for the next step of a
    /// multi-access instruction.
    pub fn set_address(&mut self, addr: GuestPhysAddr) {
        self.addr = addr;
    }

    /// The instruction pointer reported with the fault.
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// The raw fault status word.
    pub fn fsr(&self) -> u32 {
        self.fsr
    }

    /// The width of the trapped access, if the syndrome carries it.
    pub fn access_width(&self) -> Option<AccessWidth> {
        if self.fsr & FSR_ISV == 0 {
            return None;
        }
        Some(match (self.fsr >> FSR_SAS_SHIFT) & 0b11 {
            0 => AccessWidth::Byte,
            1 => AccessWidth::Half,
            2 => AccessWidth::Word,
            _ => AccessWidth::Double,
        })
    }

    /// The register transferring the data of the trapped access.
    pub fn transfer_register(&self) -> Option<usize> {
        (self.fsr & FSR_ISV != 0).then(|| ((self.fsr >> FSR_SRT_SHIFT) & FSR_SRT_MASK) as usize)
    }

    /// The value stored by a trapped write, truncated to the access width.
    pub fn data(&self) -> Option<usize> {
        let reg = self.transfer_register()?;
        let width = self.access_width()?;
        Some(self.regs.gpr(reg) & width.mask())
    }

    /// Completes a trapped read by loading `val` into the transfer register.
    ///
    /// Returns `false` if the syndrome does not identify the register.
    pub fn set_data(&mut self, val: usize) -> bool {
        match (self.transfer_register(), self.access_width()) {
            (Some(reg), Some(width)) => {
                self.regs.set_gpr(reg, val & width.mask());
                self.regs_dirty = true;
                true
            }
            _ => false,
        }
    }

    /// The captured registers.
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// The captured registers, to be written back when the guest resumes.
    pub fn regs_mut(&mut self) -> &mut R {
        self.regs_dirty = true;
        &mut self.regs
    }

    /// Whether the registers were modified during this episode.
    pub fn regs_dirty(&self) -> bool {
        self.regs_dirty
    }
}

impl<R: GuestRegs> Default for FaultContext<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: GuestRegs> fmt::Display for FaultContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} fault @ {:#x} from pc {:#x} (fsr {:#010x}, {:?})",
            self.kind,
            self.addr.as_usize(),
            self.ip,
            self.fsr,
            self.state
        )?;
        write!(f, "\n  regs: {:?}", self.regs)
    }
}
