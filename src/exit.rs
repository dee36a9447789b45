use crate::addr::GuestPhysAddr;
use crate::error::DispatchError;

/// Fault labels used by the microkernel's trap-delivery convention.
pub mod label {
    /// Unknown syscall, used by the guest for hypercalls.
    pub const UNKNOWN_SYSCALL: usize = 2;
    /// User exception (undefined instruction).
    pub const USER_EXCEPTION: usize = 3;
    /// Stage-2 memory fault.
    pub const VM_FAULT: usize = 5;
    /// Virtual interrupt controller maintenance.
    pub const VGIC_MAINTENANCE: usize = 6;
    /// Other virtualization trap of the virtual CPU.
    pub const VCPU_FAULT: usize = 7;
}

/// Message register layout of a memory fault.
mod vm_fault {
    pub const IP: usize = 0;
    pub const ADDR: usize = 1;
    pub const PREFETCH_FAULT: usize = 2;
    pub const FSR: usize = 3;
    pub const LENGTH: usize = 4;
}

/// Message register layout of an unknown syscall (`r0`-`r7` precede these).
mod unknown_syscall {
    pub const FAULT_IP: usize = 8;
    pub const SYSCALL: usize = 12;
    pub const LENGTH: usize = 13;
}

/// Message register layout of a user exception.
mod user_exception {
    pub const FAULT_IP: usize = 0;
    pub const NUMBER: usize = 3;
    pub const CODE: usize = 4;
    pub const LENGTH: usize = 5;
}

const VGIC_MAINTENANCE_LENGTH: usize = 1;
const VCPU_FAULT_LENGTH: usize = 1;

/// A fault message delivered by the microkernel for the guest thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultMessage {
    /// The guest touched guest-physical memory that is unmapped or lacks the rights.
    VmFault {
        /// The faulting guest physical address.
        addr: GuestPhysAddr,
        /// The instruction pointer of the faulting access.
        ip: usize,
        /// Whether the fault happened on an instruction fetch.
        prefetch: bool,
        /// The fault status word (syndrome ISS) of the access.
        fsr: u32,
    },
    /// The guest executed a hypercall the kernel does not know.
    UnknownSyscall {
        /// The hypercall number.
        nr: usize,
        /// The instruction pointer of the hypercall instruction.
        ip: usize,
    },
    /// The guest executed an illegal instruction.
    UserException {
        /// The instruction pointer of the faulting instruction.
        ip: usize,
        /// Architecture exception number.
        number: usize,
        /// Architecture exception code.
        code: usize,
    },
    /// The virtual interrupt controller needs maintenance.
    VgicMaintenance {
        /// The list register index, `None` for spurious events.
        index: Option<usize>,
    },
    /// Any other virtualization trap of the virtual CPU.
    VcpuFault {
        /// The hypervisor syndrome register.
        hsr: u32,
    },
    /// A label the monitor does not understand.
    Unknown {
        /// The raw message label.
        label: usize,
        /// The message length in words.
        length: usize,
    },
}

impl FaultMessage {
    /// Decodes a raw message from its label and message registers.
    ///
    /// Unknown labels decode to [`FaultMessage::Unknown`]; a known label with an
    /// unexpected length is rejected as [`DispatchError::MalformedFault`].
    pub fn decode(label: usize, words: &[usize]) -> Result<Self, DispatchError> {
        let expect = |expected: usize| {
            if words.len() == expected {
                Ok(())
            } else {
                Err(DispatchError::MalformedFault {
                    label,
                    expected,
                    length: words.len(),
                })
            }
        };
        let msg = match label {
            label::VM_FAULT => {
                expect(vm_fault::LENGTH)?;
                FaultMessage::VmFault {
                    addr: GuestPhysAddr::from_usize(words[vm_fault::ADDR]),
                    ip: words[vm_fault::IP],
                    prefetch: words[vm_fault::PREFETCH_FAULT] != 0,
                    fsr: words[vm_fault::FSR] as u32,
                }
            }
            label::UNKNOWN_SYSCALL => {
                expect(unknown_syscall::LENGTH)?;
                FaultMessage::UnknownSyscall {
                    nr: words[unknown_syscall::SYSCALL],
                    ip: words[unknown_syscall::FAULT_IP],
                }
            }
            label::USER_EXCEPTION => {
                expect(user_exception::LENGTH)?;
                FaultMessage::UserException {
                    ip: words[user_exception::FAULT_IP],
                    number: words[user_exception::NUMBER],
                    code: words[user_exception::CODE],
                }
            }
            label::VGIC_MAINTENANCE => {
                expect(VGIC_MAINTENANCE_LENGTH)?;
                // The kernel reports a spurious event as index -1.
                let index = words[0] as isize;
                FaultMessage::VgicMaintenance {
                    index: (index >= 0).then_some(index as usize),
                }
            }
            label::VCPU_FAULT => {
                expect(VCPU_FAULT_LENGTH)?;
                FaultMessage::VcpuFault {
                    hsr: words[0] as u32,
                }
            }
            _ => FaultMessage::Unknown {
                label,
                length: words.len(),
            },
        };
        Ok(msg)
    }

    /// The raw label this message was delivered with.
    pub const fn label(&self) -> usize {
        match self {
            FaultMessage::VmFault { .. } => label::VM_FAULT,
            FaultMessage::UnknownSyscall { .. } => label::UNKNOWN_SYSCALL,
            FaultMessage::UserException { .. } => label::USER_EXCEPTION,
            FaultMessage::VgicMaintenance { .. } => label::VGIC_MAINTENANCE,
            FaultMessage::VcpuFault { .. } => label::VCPU_FAULT,
            FaultMessage::Unknown { label, .. } => *label,
        }
    }
}
