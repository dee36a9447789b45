use axerrno::AxResult;
use bitflags::bitflags;

use crate::addr::{GuestMapping, GuestPhysAddr, HostPhysAddr, PageSize};
use crate::regs::GuestRegs;

bitflags! {
    /// Access rights and memory attributes of a stage-2 mapping.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MappingFlags: usize {
        /// Readable by the guest.
        const READ = 1 << 0;
        /// Writable by the guest.
        const WRITE = 1 << 1;
        /// Executable by the guest.
        const EXECUTE = 1 << 2;
        /// Device (uncached, strongly ordered) memory.
        const DEVICE = 1 << 3;
    }
}

impl MappingFlags {
    /// Rights used for guest RAM frames.
    pub const RAM: Self = Self::READ.union(Self::WRITE).union(Self::EXECUTE);
    /// Rights used for passthrough device frames.
    pub const PASSTHROUGH: Self = Self::READ.union(Self::WRITE).union(Self::DEVICE);
}

/// The interfaces which the surrounding monitor must implement for one guest.
///
/// An implementation bundles the handles the VM construction phase created: the
/// guest's stage-2 address space, its thread (register/scheduling context) and the
/// fault endpoint a reply goes through.
pub trait AxVMHal {
    /// Register snapshot type of the guest architecture.
    type Regs: GuestRegs;

    /// Reads the guest's registers.
    fn read_registers(&self) -> AxResult<Self::Regs>;

    /// Writes the guest's registers back.
    fn write_registers(&mut self, regs: &Self::Regs) -> AxResult;

    /// Replies to the pending fault with an empty message, resuming the guest.
    fn reply(&mut self);

    /// Looks up the mapping of the page containing `gpa`.
    ///
    /// # Returns
    ///
    /// * `None` - The page is unmapped, or the query itself failed.
    fn get_mapping(&self, gpa: GuestPhysAddr) -> Option<GuestMapping>;

    /// Maps the host frame `frame` at the page `gpa` of the guest address space.
    fn install_mapping(
        &mut self,
        gpa: GuestPhysAddr,
        frame: HostPhysAddr,
        size: PageSize,
        flags: MappingFlags,
    ) -> AxResult;

    /// Allocates a frame of guest RAM.
    fn alloc_frame(&mut self, size: PageSize) -> AxResult<HostPhysAddr>;

    /// Releases a frame obtained from [`AxVMHal::alloc_frame`] that was never mapped.
    fn dealloc_frame(&mut self, frame: HostPhysAddr, size: PageSize);

    /// Handles a maintenance event of the virtual interrupt controller.
    fn handle_vgic_maintenance(&mut self, index: usize) -> AxResult;
}
