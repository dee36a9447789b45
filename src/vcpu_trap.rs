/// Shift of the exception class field in the hypervisor syndrome register.
const HSR_EC_SHIFT: u32 = 26;
/// Exception class of a trapped `wfi`/`wfe`.
const HSR_EC_WFX: u32 = 0x01;

/// Syndromes of idle loops that trap without the WFx exception class.
const HSR_IDLE_MASK: u32 = 0xfc30_0000;
const HSR_IDLE_VALUE: u32 = 0x6020_0000;
const HSR_IDLE_EXACT: u32 = 0xf200_0800;

/// How the dispatcher reacts to a virtual CPU trap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VcpuTrapOutcome {
    /// The guest is idling.
    WaitForEvent {
        /// The trapping instruction must be skipped and the guest resumed at once.
        advance: bool,
    },
    /// The trap is not understood.
    Unhandled,
}

/// Classifies a virtual CPU trap by its syndrome `hsr`.
pub const fn classify(hsr: u32) -> VcpuTrapOutcome {
    if hsr >> HSR_EC_SHIFT == HSR_EC_WFX {
        VcpuTrapOutcome::WaitForEvent { advance: false }
    } else if hsr & HSR_IDLE_MASK == HSR_IDLE_VALUE || hsr == HSR_IDLE_EXACT {
        VcpuTrapOutcome::WaitForEvent { advance: true }
    } else {
        VcpuTrapOutcome::Unhandled
    }
}
