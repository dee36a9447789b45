use crate::addr::GuestPhysAddr;
use crate::error::DispatchError;
use crate::hal::AxVMHal;
use crate::regs::GuestRegs;
use crate::vm::AxVM;

/// Register carrying both the argument and the result of a hypercall.
const ARG_REG: usize = 0;

/// Hypercalls understood by the monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hypercall {
    /// Host physical to guest physical address.
    PaToIpa = 65,
    /// Guest physical to host physical address.
    IpaToPa = 66,
    /// Does nothing; used by guests as a trace marker.
    Nop = 67,
}

impl Hypercall {
    /// Looks up the hypercall with number `nr`.
    pub const fn from_nr(nr: usize) -> Option<Self> {
        match nr {
            65 => Some(Hypercall::PaToIpa),
            66 => Some(Hypercall::IpaToPa),
            67 => Some(Hypercall::Nop),
            _ => None,
        }
    }

    /// The hypercall number.
    pub const fn nr(self) -> usize {
        self as usize
    }
}

impl<H: AxVMHal> AxVM<H> {
    /// Executes hypercall `nr` issued at `ip` against the register snapshot `regs`.
    ///
    /// `regs` is updated in place; the caller writes it back.
    pub(crate) fn handle_hypercall(
        &self,
        nr: usize,
        ip: usize,
        regs: &mut H::Regs,
    ) -> Result<(), DispatchError> {
        let call = Hypercall::from_nr(nr).ok_or(DispatchError::UnknownHypercall { nr, ip })?;
        trace!("Hypercall {:?} from [{}]", call, self.name());
        match call {
            Hypercall::PaToIpa => {
                // Guest memory is identity mapped wherever this call is used.
                let pa = regs.gpr(ARG_REG);
                trace!("PA translation hypercall from [{}]: {:#x}->{:#x}", self.name(), pa, pa);
                regs.set_gpr(ARG_REG, pa);
            }
            Hypercall::IpaToPa => self.ipa_to_pa(regs),
            Hypercall::Nop => trace!("NOP hypercall from [{}]", self.name()),
        }
        Ok(())
    }

    fn ipa_to_pa(&self, regs: &mut H::Regs) {
        let ipa = GuestPhysAddr::from_usize(regs.gpr(ARG_REG));
        let pa = match self.translate_guest_range(ipa, 1) {
            Some(pa) => pa,
            None => {
                if let Err(err) = self.map_guest_ram(ipa) {
                    error!(
                        "[{}] Could not map address {:#x} for IPA translation: {:?}",
                        self.name(),
                        ipa.as_usize(),
                        err
                    );
                    return;
                }
                match self.translate_guest_range(ipa, 1) {
                    Some(pa) => pa,
                    None => {
                        error!(
                            "[{}] No mapping for {:#x} after mapping RAM",
                            self.name(),
                            ipa.as_usize()
                        );
                        return;
                    }
                }
            }
        };
        trace!(
            "IPA translation hypercall from [{}]: {:#x}->{:#x}",
            self.name(),
            ipa.as_usize(),
            pa.as_usize()
        );
        regs.set_gpr(ARG_REG, pa.as_usize());
    }
}
