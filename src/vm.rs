use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};

use crate::config::AxVMConfig;
use crate::device::AxVmDevice;
use crate::error::DispatchError;
use crate::exit::FaultMessage;
use crate::fault::{FaultContext, FaultState};
use crate::hal::AxVMHal;
use crate::reboot::RebootHook;
use crate::regs::GuestRegs;
use crate::vcpu_trap::{classify, VcpuTrapOutcome};

/// A guest virtual machine as seen by its fault handler.
///
/// The VM owns the installed devices, the reboot hooks and the single fault context
/// reused by every fault episode. Devices and hooks are registered through `&mut self`
/// before the fault loop starts; fault handling then works on `&self`, so device
/// handlers and hooks can be handed the VM while the dispatcher runs.
///
/// Note that:
/// - This struct handles internal mutability itself with [`RefCell`]s. A device
///   handler must use the fault context it is given; [`AxVM::try_fault`] returns
///   `None` while a fault is being dispatched.
/// - This struct is not thread-safe. Faults of one VM are handled one at a time.
pub struct AxVM<H: AxVMHal> {
    pub(crate) config: AxVMConfig,
    hal: RefCell<H>,
    pub(crate) devices: Vec<AxVmDevice<H>>,
    pub(crate) reboot_hooks: Vec<RebootHook<H>>,
    fault: RefCell<FaultContext<H::Regs>>,
}

impl<H: AxVMHal> AxVM<H> {
    /// Create a new [`AxVM`] on top of the collaborators in `hal`.
    pub fn new(config: AxVMConfig, hal: H) -> Self {
        Self {
            devices: Vec::with_capacity(config.max_devices),
            reboot_hooks: Vec::with_capacity(config.max_reboot_hooks),
            config,
            hal: RefCell::new(hal),
            fault: RefCell::new(FaultContext::new()),
        }
    }

    /// Get the name of the VM.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the configuration of the VM.
    pub fn config(&self) -> &AxVMConfig {
        &self.config
    }

    /// Borrow the collaborators of the VM.
    pub fn hal(&self) -> Ref<'_, H> {
        self.hal.borrow()
    }

    /// Mutably borrow the collaborators of the VM.
    pub fn hal_mut(&self) -> RefMut<'_, H> {
        self.hal.borrow_mut()
    }

    /// Borrow the fault context of the VM.
    ///
    /// # Panics
    ///
    /// Panics if called from a device handler while the fault is being dispatched.
    pub fn fault(&self) -> Ref<'_, FaultContext<H::Regs>> {
        self.fault.borrow()
    }

    /// Borrow the fault context of the VM, or `None` while it is being dispatched.
    pub fn try_fault(&self) -> Option<Ref<'_, FaultContext<H::Regs>>> {
        self.fault.try_borrow().ok()
    }

    /// Logs the guest registers, if they can be read.
    fn dump_registers(&self) {
        match self.hal().read_registers() {
            Ok(regs) => error!("  regs: {:?}", regs),
            Err(err) => warn!("  registers unavailable: {:?}", err),
        }
    }

    /// Decodes a raw fault message and dispatches it.
    pub fn handle_message(&self, label: usize, words: &[usize]) -> Result<(), DispatchError> {
        let msg = FaultMessage::decode(label, words).inspect_err(|err| {
            error!("[{}] {}", self.name(), err);
        })?;
        self.dispatch_fault(&msg)
    }

    /// Handles one fault message delivered for the guest.
    ///
    /// On success the guest has either been resumed, or is parked in a
    /// wait-for-interrupt fault until [`AxVM::wake_waiting`]. On error the guest is
    /// left suspended.
    pub fn dispatch_fault(&self, msg: &FaultMessage) -> Result<(), DispatchError> {
        match *msg {
            FaultMessage::VmFault {
                addr,
                ip,
                prefetch,
                fsr,
            } => {
                let regs = self.hal().read_registers()?;
                let mut fault = self.fault.borrow_mut();
                fault.begin(regs, addr, ip, prefetch, fsr);
                while !fault.is_resolved() {
                    if let Err(err) = self.route_page_fault(&mut fault) {
                        fault.fail();
                        error!("[{}] {}: {}", self.name(), err, *fault);
                        return Err(err);
                    }
                }
                self.complete_fault(&fault)
            }
            FaultMessage::UnknownSyscall { nr, ip } => {
                let mut regs = self.hal().read_registers()?;
                regs.advance_pc();
                if let Err(err) = self.handle_hypercall(nr, ip, &mut regs) {
                    error!("[{}] Bad hypercall: {}", self.name(), err);
                    error!("  regs: {:?}", regs);
                    return Err(err);
                }
                let mut hal = self.hal_mut();
                hal.write_registers(&regs)?;
                hal.reply();
                Ok(())
            }
            FaultMessage::UserException { ip, number, code } => {
                error!(
                    "[{}] Invalid instruction at PC {:#x} (exception {}, code {:#x})",
                    self.name(),
                    ip,
                    number,
                    code
                );
                self.dump_registers();
                self.hal_mut().reply();
                Ok(())
            }
            FaultMessage::VgicMaintenance { index } => {
                let Some(index) = index else {
                    error!("[{}] Spurious VGIC maintenance", self.name());
                    return Err(DispatchError::SpuriousMaintenance);
                };
                let mut hal = self.hal_mut();
                hal.handle_vgic_maintenance(index)
                    .map_err(DispatchError::Maintenance)?;
                hal.reply();
                Ok(())
            }
            FaultMessage::VcpuFault { hsr } => self.handle_vcpu_fault(hsr),
            FaultMessage::Unknown { label, length } => {
                error!(
                    "[{}] Unknown fault: label={:#x} length={}",
                    self.name(),
                    label,
                    length
                );
                Err(DispatchError::UnknownFault { label, length })
            }
        }
    }

    fn handle_vcpu_fault(&self, hsr: u32) -> Result<(), DispatchError> {
        match classify(hsr) {
            VcpuTrapOutcome::WaitForEvent { advance: false } => {
                let regs = self.hal().read_registers()?;
                self.fault.borrow_mut().begin_wfi(regs);
                Ok(())
            }
            VcpuTrapOutcome::WaitForEvent { advance: true } => {
                warn!(
                    "[{}] VCPU fault HSR {:#010x} handled as WFI",
                    self.name(),
                    hsr
                );
                let regs = self.hal().read_registers()?;
                let mut fault = self.fault.borrow_mut();
                fault.begin_wfi(regs);
                fault.advance();
                self.complete_fault(&fault)
            }
            VcpuTrapOutcome::Unhandled => {
                error!("[{}] Unhandled VCPU fault: HSR {:#010x}", self.name(), hsr);
                self.dump_registers();
                Err(DispatchError::UnhandledVcpuTrap { hsr })
            }
        }
    }

    /// Resumes a guest parked by a wait-for-interrupt fault.
    ///
    /// Returns `false` if the guest was not waiting. That includes calls made by a
    /// device handler while a memory fault is being dispatched.
    pub fn wake_waiting(&self) -> Result<bool, DispatchError> {
        let Ok(mut fault) = self.fault.try_borrow_mut() else {
            return Ok(false);
        };
        if !fault.is_wfi() || fault.state() != FaultState::Pending {
            return Ok(false);
        }
        fault.advance();
        self.complete_fault(&fault)?;
        Ok(true)
    }

    /// Carries out the terminal action of a resolved fault.
    fn complete_fault(&self, fault: &FaultContext<H::Regs>) -> Result<(), DispatchError> {
        if fault.state() == FaultState::Restarted {
            let mut hal = self.hal_mut();
            if fault.regs_dirty() {
                hal.write_registers(fault.regs())?;
            }
            hal.reply();
        }
        Ok(())
    }
}
