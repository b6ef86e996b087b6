// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::dumper::ModuleDumper;
use crate::hooks::{HookError, LoadListener};
use crate::host::Host;
use crate::utils::panic_message;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Installs hooks on the dynamic loader's entry points and owns the registry
/// of functions already intercepted.
pub struct LoaderHooks {
    host: Arc<dyn Host>,
    dumper: Arc<ModuleDumper>,
    settle_delay: Duration,
    library_indicator: String,
    hooked: Mutex<BTreeSet<String>>,
}

impl LoaderHooks {
    pub fn new(host: Arc<dyn Host>, dumper: Arc<ModuleDumper>, config: &Config) -> Self {
        Self {
            host,
            dumper,
            settle_delay: config.settle_delay(),
            library_indicator: config.library_indicator.clone(),
            hooked: Mutex::new(BTreeSet::new()),
        }
    }

    /// Intercepts `function_name`. Safe to call repeatedly: a function that is
    /// already hooked is reported as success without a second install.
    pub fn hook(&self, function_name: &str) -> bool {
        // Held across the install so two callers cannot both attach.
        let mut hooked = self.hooked.lock();
        if hooked.contains(function_name) {
            log::info!("{} is already hooked", function_name);
            return true;
        }

        let installed = panic::catch_unwind(AssertUnwindSafe(|| self.install(function_name)))
            .unwrap_or_else(|payload| Err(HookError::AttachFailed(panic_message(payload.as_ref()))));

        match installed {
            Ok(()) => {
                hooked.insert(function_name.to_string());
                log::info!("hooked {}", function_name);
                true
            }
            Err(HookError::ExportNotFound(name)) => {
                log::warn!("{} is not exported in this process, skipping", name);
                false
            }
            Err(err) => {
                log::error!("failed to hook {}: {}", function_name, err);
                false
            }
        }
    }

    fn install(&self, function_name: &str) -> Result<(), HookError> {
        let address = self
            .host
            .find_export(function_name)
            .ok_or_else(|| HookError::ExportNotFound(function_name.to_string()))?;

        let listener = LoadListener::new(
            function_name,
            self.host.clone(),
            self.dumper.clone(),
            self.settle_delay,
            &self.library_indicator,
        );

        log::debug!("attaching to {} at {}", function_name, address);
        self.host.attach(address, Arc::new(listener))
    }

    pub fn is_hooked(&self, function_name: &str) -> bool {
        self.hooked.lock().contains(function_name)
    }

    pub fn list_hooked(&self) -> BTreeSet<String> {
        self.hooked.lock().clone()
    }
}
