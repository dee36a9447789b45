use crate::addr::{GuestPhysAddr, HostPhysAddr};
use crate::hal::AxVMHal;
use crate::vm::AxVM;

/// Translates `[guest_base, guest_base + size)` to a physically contiguous host range.
///
/// The range is walked page by page at the granularity each page is actually mapped
/// with. Every page must be mapped, and its host address must be exactly as far from
/// the host address of `guest_base` as its guest address is from `guest_base`.
/// An empty range translates `guest_base` alone.
///
/// Only the existing mappings are read; nothing is installed.
pub(crate) fn translate_range<H: AxVMHal>(
    hal: &H,
    guest_base: GuestPhysAddr,
    size: usize,
) -> Option<HostPhysAddr> {
    let base = guest_base.as_usize();
    let last = base.checked_add(size.saturating_sub(1))?;

    let first = hal.get_mapping(guest_base)?;
    let host_base = first.frame.as_usize() + first.size.page_offset(base);

    let mut ipa = match first.size.page_base(base).checked_add(first.size.bytes()) {
        Some(next) => next,
        None => return Some(HostPhysAddr::from_usize(host_base)),
    };
    while ipa <= last {
        let mapping = hal.get_mapping(GuestPhysAddr::from_usize(ipa))?;
        let host = mapping.frame.as_usize() + mapping.size.page_offset(ipa);
        if host.wrapping_sub(host_base) != ipa - base {
            debug!(
                "IPA range {:#x}+{:#x} is not contiguous at {:#x} (PA {:#x})",
                base, size, ipa, host
            );
            return None;
        }
        ipa = match mapping.size.page_base(ipa).checked_add(mapping.size.bytes()) {
            Some(next) => next,
            None => break,
        };
    }
    Some(HostPhysAddr::from_usize(host_base))
}

impl<H: AxVMHal> AxVM<H> {
    /// Translates a guest physical range to the host physical address of `guest_base`.
    ///
    /// # Returns
    ///
    /// * `None` - Some page of the range is unmapped, or the range is not backed by
    ///   one physically contiguous host region. Partial results are never returned.
    pub fn translate_guest_range(
        &self,
        guest_base: GuestPhysAddr,
        size: usize,
    ) -> Option<HostPhysAddr> {
        translate_range(&*self.hal(), guest_base, size)
    }
}
