// Tue Jan 13 2026 - Alex

//! Session bootstrap for the preloaded library.

use crate::config::{Config, ConfigError};
use crate::host::LocalHost;
use crate::orchestrator::DumpCoordinator;
use crate::output::{SinkError, StreamSink};
use crate::utils;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Output error: {0}")]
    Sink(#[from] SinkError),
    #[error("Host setup failed: {0}")]
    Host(#[source] std::io::Error),
}

static SESSION: OnceCell<DumpCoordinator> = OnceCell::new();

/// Starts the process-wide session with `config`. Later calls return the
/// session that is already running and ignore their argument.
pub fn start_session(config: Config) -> Result<&'static DumpCoordinator, StartupError> {
    SESSION.get_or_try_init(|| {
        utils::init_for_session(&config);

        let host = Arc::new(LocalHost::new().map_err(StartupError::Host)?);
        let sink = Arc::new(StreamSink::open(&config.resolved_output())?);
        let coordinator = DumpCoordinator::new(config, host, sink)?;
        coordinator.start();
        Ok(coordinator)
    })
}

pub fn start_from_env() -> Result<&'static DumpCoordinator, StartupError> {
    start_session(Config::from_env()?)
}

pub fn session() -> Option<&'static DumpCoordinator> {
    SESSION.get()
}

#[cfg(all(feature = "preload", not(test)))]
#[ctor::ctor]
fn init() {
    if !Config::requested_by_env() {
        return;
    }

    // Nothing may unwind into the loader that is running constructors.
    match std::panic::catch_unwind(start_from_env) {
        Ok(Ok(_)) => log::info!("module-dumper active in pid {}", std::process::id()),
        Ok(Err(err)) => eprintln!("module-dumper: startup failed: {}", err),
        Err(payload) => eprintln!(
            "module-dumper: startup panicked: {}",
            utils::panic_message(payload.as_ref())
        ),
    }
}
