use axerrno::AxError;
use thiserror::Error;

/// Errors raised while populating the device or reboot hook tables.
///
/// These are configuration errors of the caller and are never retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{table} table is full ({max} entries)")]
    CapacityExceeded { table: &'static str, max: usize },

    #[error("reboot hook is missing")]
    MissingHook,
}

/// A reboot hook failed; hooks registered after it were not run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("reboot hook #{index} failed with code {code}")]
pub struct HookError {
    /// Position of the failing hook in registration order.
    pub index: usize,
    /// The error code the hook returned.
    pub code: i32,
}

/// Terminal errors of a fault episode.
///
/// Whenever dispatch fails the guest is left suspended.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unknown fault: label={label:#x} length={length}")]
    UnknownFault { label: usize, length: usize },

    #[error("malformed fault message: label={label:#x} length={length}, expected {expected}")]
    MalformedFault {
        label: usize,
        expected: usize,
        length: usize,
    },

    #[error("unknown hypercall {nr} at pc {ip:#x}")]
    UnknownHypercall { nr: usize, ip: usize },

    #[error("unhandled vcpu fault: hsr={hsr:#010x}")]
    UnhandledVcpuTrap { hsr: u32 },

    #[error("unhandled memory fault at {addr:#x} from pc {ip:#x}")]
    UnhandledMemoryFault { addr: usize, ip: usize },

    #[error("device [{name}] failed to handle fault: {err}")]
    Device { name: &'static str, err: AxError },

    #[error("spurious vgic maintenance event")]
    SpuriousMaintenance,

    #[error("vgic maintenance failed: {0}")]
    Maintenance(AxError),

    #[error("guest access failed: {0}")]
    Hal(AxError),
}

impl From<AxError> for DispatchError {
    fn from(err: AxError) -> Self {
        DispatchError::Hal(err)
    }
}

impl From<DispatchError> for AxError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownFault { .. }
            | DispatchError::MalformedFault { .. }
            | DispatchError::UnknownHypercall { .. } => AxError::InvalidInput,
            DispatchError::UnhandledVcpuTrap { .. } => AxError::Unsupported,
            DispatchError::UnhandledMemoryFault { .. } => AxError::BadAddress,
            DispatchError::SpuriousMaintenance => AxError::BadState,
            DispatchError::Device { err, .. }
            | DispatchError::Maintenance(err)
            | DispatchError::Hal(err) => err,
        }
    }
}
