// Tue Jan 13 2026 - Alex

use crate::dumper::ModuleDumper;
use crate::host::{Host, InvocationArgs, InvocationContext, InvocationListener};
use crate::memory::Address;
use crate::utils::panic_message;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Entry/exit callbacks attached to one loader function.
pub struct LoadListener {
    function: String,
    host: Arc<dyn Host>,
    dumper: Arc<ModuleDumper>,
    settle_delay: Duration,
    library_indicator: String,
}

impl LoadListener {
    pub fn new(
        function: &str,
        host: Arc<dyn Host>,
        dumper: Arc<ModuleDumper>,
        settle_delay: Duration,
        library_indicator: &str,
    ) -> Self {
        Self {
            function: function.to_string(),
            host,
            dumper,
            settle_delay,
            library_indicator: library_indicator.to_string(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

impl InvocationListener for LoadListener {
    fn on_enter(&self, args: &InvocationArgs) -> InvocationContext {
        let captured_path = args
            .get(0)
            .filter(|ptr| !ptr.is_null())
            .and_then(|ptr| self.host.read_c_string(ptr).ok());

        InvocationContext { captured_path }
    }

    fn on_leave(&self, context: InvocationContext, retval: Address) {
        let Some(path) = context.captured_path else {
            return;
        };
        if retval.is_null() || !path.contains(&self.library_indicator) {
            return;
        }

        log::debug!("{}({}) returned {}", self.function, path, retval);

        let host = self.host.clone();
        let dumper = self.dumper.clone();
        self.host.schedule_once(
            self.settle_delay,
            Box::new(move || resolve_and_dump(host.as_ref(), &dumper, &path, retval)),
        );
    }
}

/// Deferred half of a loader hook: find the freshly loaded module and dump it.
fn resolve_and_dump(host: &dyn Host, dumper: &ModuleDumper, path: &str, handle: Address) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let module = host
            .find_module_by_name(path)
            .or_else(|| host.find_module_by_address(handle));

        match module {
            Some(module) => {
                dumper.dump(&module);
            }
            None => log::warn!(
                "{} loaded but not resolvable yet, a periodic scan may pick it up",
                path
            ),
        }
    }));

    if let Err(payload) = outcome {
        log::error!("deferred resolution of {} failed: {}", path, panic_message(payload.as_ref()));
    }
}
