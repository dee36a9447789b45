use axerrno::AxResult;

use crate::addr::{GuestPhysAddr, HostPhysAddr, PageSize};
use crate::device::DeviceId;
use crate::error::DispatchError;
use crate::fault::FaultContext;
use crate::hal::{AxVMHal, MappingFlags};
use crate::vm::AxVM;

impl<H: AxVMHal> AxVM<H> {
    /// Routes one step of a memory fault to the device owning the faulting address.
    ///
    /// Errors of the device handler are propagated as-is. A fault no device claims is
    /// resolved by on-demand installation when enabled, and abandoned otherwise.
    pub(crate) fn route_page_fault(
        &self,
        fault: &mut FaultContext<H::Regs>,
    ) -> Result<(), DispatchError> {
        let addr = fault.address();
        if let Some(dev) = self.find_device_by_addr(addr) {
            if dev.id == DeviceId::Ram {
                trace!(
                    "[{}] {:?} fault @ {:#x} from {:#x}",
                    dev.name,
                    fault.kind(),
                    addr.as_usize(),
                    fault.ip()
                );
            } else {
                debug!(
                    "[{}] {:?} fault @ {:#x} from {:#x}",
                    dev.name,
                    fault.kind(),
                    addr.as_usize(),
                    fault.ip()
                );
            }
            return dev
                .handle_fault(self, fault)
                .map_err(|err| DispatchError::Device {
                    name: dev.name,
                    err,
                });
        }

        if self.config.ondemand_device_install && self.install_on_demand(fault) {
            return Ok(());
        }
        fault.abandon();
        Err(DispatchError::UnhandledMemoryFault {
            addr: addr.as_usize(),
            ip: fault.ip(),
        })
    }

    /// Maps the faulting page as a passthrough device, or failing that as RAM.
    fn install_on_demand(&self, fault: &mut FaultContext<H::Regs>) -> bool {
        let page = PageSize::Size4K.page_base(fault.address().as_usize());
        if page == 0 {
            return false;
        }
        let gpa = GuestPhysAddr::from_usize(page);

        let mapped = self.hal_mut().install_mapping(
            gpa,
            HostPhysAddr::from_usize(page),
            PageSize::Size4K,
            MappingFlags::PASSTHROUGH,
        );
        if mapped.is_ok() {
            warn!(
                "[{}] Blindly mapped device @ {:#x} for PC {:#x}",
                self.name(),
                fault.address().as_usize(),
                fault.ip()
            );
            fault.restart();
            return true;
        }

        match self.map_guest_ram(gpa) {
            Ok(_) => {
                warn!(
                    "[{}] Mapped RAM for device @ {:#x} for PC {:#x}",
                    self.name(),
                    fault.address().as_usize(),
                    fault.ip()
                );
                fault.restart();
                true
            }
            Err(err) => {
                warn!("[{}] Unhandled fault on address {:#x}: {:?}", self.name(), page, err);
                false
            }
        }
    }

    /// Backs the 4K page containing `gpa` with a fresh RAM frame.
    pub(crate) fn map_guest_ram(&self, gpa: GuestPhysAddr) -> AxResult<HostPhysAddr> {
        let page = GuestPhysAddr::from_usize(PageSize::Size4K.page_base(gpa.as_usize()));
        let mut hal = self.hal_mut();
        let frame = hal.alloc_frame(PageSize::Size4K)?;
        if let Err(err) = hal.install_mapping(page, frame, PageSize::Size4K, MappingFlags::RAM) {
            hal.dealloc_frame(frame, PageSize::Size4K);
            return Err(err);
        }
        Ok(frame)
    }
}
