use crate::error::{HookError, RegistryError};
use crate::hal::AxVMHal;
use crate::vm::AxVM;

/// A callback run when the guest is reset.
///
/// It is called with the VM and the token it was registered with, and returns a
/// non-zero error code on failure.
pub type RebootHookFn<H> = fn(&AxVM<H>, usize) -> Result<(), i32>;

pub(crate) struct RebootHook<H: AxVMHal> {
    func: RebootHookFn<H>,
    token: usize,
}

impl<H: AxVMHal> AxVM<H> {
    /// Registers a reboot hook; hooks run in registration order.
    pub fn register_reboot_hook(
        &mut self,
        hook: Option<RebootHookFn<H>>,
        token: usize,
    ) -> Result<(), RegistryError> {
        let Some(func) = hook else {
            error!("[{}] reboot hook is missing", self.name());
            return Err(RegistryError::MissingHook);
        };
        let max = self.config.max_reboot_hooks;
        if self.reboot_hooks.len() >= max {
            return Err(RegistryError::CapacityExceeded {
                table: "reboot hook",
                max,
            });
        }
        self.reboot_hooks.push(RebootHook { func, token });
        Ok(())
    }

    /// Number of registered reboot hooks.
    pub fn reboot_hook_count(&self) -> usize {
        self.reboot_hooks.len()
    }

    /// Runs the reboot hooks in registration order.
    ///
    /// Stops at the first failing hook and returns its error; hooks after it are not
    /// run and the effects of the hooks before it are kept.
    pub fn run_reboot_hooks(&self) -> Result<(), HookError> {
        for (index, hook) in self.reboot_hooks.iter().enumerate() {
            if let Err(code) = (hook.func)(self, hook.token) {
                error!("[{}] reboot hook #{} returned error: {}", self.name(), index, code);
                return Err(HookError { index, code });
            }
        }
        Ok(())
    }
}
