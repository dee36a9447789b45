//! Per-VM configuration of the fault-handling core.

use alloc::string::String;

/// Default bound of the device table.
pub const DEFAULT_MAX_DEVICES: usize = 50;
/// Default bound of the reboot hook table.
pub const DEFAULT_MAX_REBOOT_HOOKS: usize = 10;

/// Configuration of an [`AxVM`](crate::AxVM).
#[derive(Clone, Debug)]
pub struct AxVMConfig {
    /// Name of the guest, used in diagnostics.
    pub name: String,
    /// Maximum number of devices that can be installed.
    pub max_devices: usize,
    /// Maximum number of reboot hooks that can be registered.
    pub max_reboot_hooks: usize,
    /// Map unknown device pages on first fault instead of abandoning the fault.
    ///
    /// Faults on pages no device claims are resolved by identity-mapping the host
    /// page at the same address, falling back to a fresh RAM frame. Nothing checks
    /// that the guest may own that host page, so this must stay off for untrusted
    /// guests. Defaults to the `ondemand-device-install` feature.
    pub ondemand_device_install: bool,
}

impl AxVMConfig {
    /// Creates a configuration with default bounds.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_devices: DEFAULT_MAX_DEVICES,
            max_reboot_hooks: DEFAULT_MAX_REBOOT_HOOKS,
            ondemand_device_install: cfg!(feature = "ondemand-device-install"),
        }
    }

    pub fn with_max_devices(mut self, max: usize) -> Self {
        self.max_devices = max;
        self
    }

    pub fn with_max_reboot_hooks(mut self, max: usize) -> Self {
        self.max_reboot_hooks = max;
        self
    }

    pub fn with_ondemand_device_install(mut self, enable: bool) -> Self {
        self.ondemand_device_install = enable;
        self
    }
}

impl Default for AxVMConfig {
    fn default() -> Self {
        Self::new("vm")
    }
}
