use alloc::rc::Rc;
use core::fmt;

use axerrno::AxResult;

use crate::addr::GuestPhysAddr;
use crate::error::RegistryError;
use crate::fault::FaultContext;
use crate::hal::AxVMHal;
use crate::vm::AxVM;

/// Identity of an installed device.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceId {
    /// Guest RAM.
    Ram,
    /// Distributor of the virtual interrupt controller.
    VgicDist,
    /// CPU interface of the virtual interrupt controller.
    VgicVcpu,
    /// Serial port.
    Uart,
    /// Timer.
    Timer,
    /// Clock controller.
    Clock,
    /// GPIO controller.
    Gpio,
    /// A device defined by the monitor.
    Custom(u32),
}

/// Fault-handling capability of a device.
///
/// The handler is called with the fault context of the current episode. It either
/// resolves the fault ([`FaultContext::restart`], [`FaultContext::abandon`] or one of
/// their helpers) or leaves it pending to be called again, after having made progress
/// (e.g. one access of a multi-access instruction). A handler that neither resolves
/// nor changes the fault will be called forever.
pub trait DeviceFaultHandler<H: AxVMHal> {
    /// Handles a fault whose address falls into `dev`.
    fn handle_fault(
        &self,
        dev: &AxVmDevice<H>,
        vm: &AxVM<H>,
        fault: &mut FaultContext<H::Regs>,
    ) -> AxResult;
}

impl<H, F> DeviceFaultHandler<H> for F
where
    H: AxVMHal,
    F: Fn(&AxVmDevice<H>, &AxVM<H>, &mut FaultContext<H::Regs>) -> AxResult,
{
    fn handle_fault(
        &self,
        dev: &AxVmDevice<H>,
        vm: &AxVM<H>,
        fault: &mut FaultContext<H::Regs>,
    ) -> AxResult {
        self(dev, vm, fault)
    }
}

/// A memory-mapped device of the guest, emulated or passed through.
///
/// The device claims the guest physical range `[base, base + size)`.
pub struct AxVmDevice<H: AxVMHal> {
    /// The identity of the device.
    pub id: DeviceId,
    /// Human-readable name, used in diagnostics.
    pub name: &'static str,
    /// Guest physical base address.
    pub base: GuestPhysAddr,
    /// Size of the range in bytes.
    pub size: usize,
    handler: Rc<dyn DeviceFaultHandler<H>>,
}

impl<H: AxVMHal> AxVmDevice<H> {
    /// Create a new device descriptor.
    pub fn new(
        id: DeviceId,
        name: &'static str,
        base: GuestPhysAddr,
        size: usize,
        handler: impl DeviceFaultHandler<H> + 'static,
    ) -> Self {
        Self {
            id,
            name,
            base,
            size,
            handler: Rc::new(handler),
        }
    }

    /// Whether `addr` falls into the range of the device.
    pub fn contains(&self, addr: GuestPhysAddr) -> bool {
        let addr = addr.as_usize();
        let base = self.base.as_usize();
        addr >= base && addr - base < self.size
    }

    /// Invokes the fault handler of the device.
    pub fn handle_fault(&self, vm: &AxVM<H>, fault: &mut FaultContext<H::Regs>) -> AxResult {
        self.handler.handle_fault(self, vm, fault)
    }
}

impl<H: AxVMHal> Clone for AxVmDevice<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name,
            base: self.base,
            size: self.size,
            handler: Rc::clone(&self.handler),
        }
    }
}

impl<H: AxVMHal> fmt::Debug for AxVmDevice<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxVmDevice")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base", &self.base)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl<H: AxVMHal> AxVM<H> {
    /// Installs a device into the device table.
    ///
    /// Ranges are not checked for overlap; lookups return the first device in
    /// installation order.
    pub fn install_device(&mut self, dev: AxVmDevice<H>) -> Result<(), RegistryError> {
        let max = self.config.max_devices;
        if self.devices.len() >= max {
            return Err(RegistryError::CapacityExceeded {
                table: "device",
                max,
            });
        }
        debug!(
            "[{}] install device {} @ {:#x}..{:#x}",
            self.name(),
            dev.name,
            dev.base.as_usize(),
            dev.base.as_usize().saturating_add(dev.size)
        );
        self.devices.push(dev);
        Ok(())
    }

    /// The installed devices, in installation order.
    pub fn devices(&self) -> &[AxVmDevice<H>] {
        &self.devices
    }

    /// Returns the first installed device matching `pred`.
    pub fn find_device<P>(&self, pred: P) -> Option<&AxVmDevice<H>>
    where
        P: Fn(&AxVmDevice<H>) -> bool,
    {
        self.devices.iter().find(|dev| pred(dev))
    }

    /// Returns the first installed device with identity `id`.
    pub fn find_device_by_id(&self, id: DeviceId) -> Option<&AxVmDevice<H>> {
        self.find_device(|dev| dev.id == id)
    }

    /// Returns the first installed device whose range contains `addr`.
    pub fn find_device_by_addr(&self, addr: GuestPhysAddr) -> Option<&AxVmDevice<H>> {
        self.find_device(|dev| dev.contains(addr))
    }
}
