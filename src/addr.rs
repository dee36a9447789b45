use memory_addr::{align_down, def_usize_addr, def_usize_addr_formatter};

/// Host physical address.
pub type HostPhysAddr = memory_addr::PhysAddr;

def_usize_addr! {
    /// Guest physical address (IPA).
    pub type GuestPhysAddr;
}

def_usize_addr_formatter! {
    GuestPhysAddr = "GPA:{}";
}

/// Granularity of a single stage-2 mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSize {
    /// 4 KiB small page.
    Size4K = 0x1000,
    /// 2 MiB section / large page.
    Size2M = 0x20_0000,
}

impl PageSize {
    /// Size of the page in bytes.
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Rounds `addr` down to the start of the page of this size containing it.
    pub const fn page_base(self, addr: usize) -> usize {
        align_down(addr, self.bytes())
    }

    /// Offset of `addr` inside the page of this size containing it.
    pub const fn page_offset(self, addr: usize) -> usize {
        addr - self.page_base(addr)
    }
}

/// A single existing mapping of guest memory, as reported by the address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuestMapping {
    /// Host physical base of the frame backing the page.
    pub frame: HostPhysAddr,
    /// Granularity of the mapping; `frame` is aligned to it.
    pub size: PageSize,
}
