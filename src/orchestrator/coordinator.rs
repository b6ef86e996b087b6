// Tue Jan 13 2026 - Alex

use crate::config::{Config, ConfigError};
use crate::dumper::ModuleDumper;
use crate::hooks::LoaderHooks;
use crate::host::Host;
use crate::output::MessageSink;
use crate::scanner::MemoryScanner;
use crate::utils::{pluralize, ScopedTimer};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct ScanCounters {
    passes: AtomicU64,
    discoveries: AtomicU64,
}

impl ScanCounters {
    fn record(&self, found: usize) {
        self.discoveries.fetch_add(found as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub started: bool,
    pub processed: Vec<String>,
    pub hooked: Vec<String>,
    pub scan_passes: u64,
    pub discoveries: u64,
}

/// Wires the dumper, the loader hooks and the scanner together for one
/// session and drives the startup sequence.
pub struct DumpCoordinator {
    config: Config,
    host: Arc<dyn Host>,
    dumper: Arc<ModuleDumper>,
    hooks: Arc<LoaderHooks>,
    scanner: Arc<MemoryScanner>,
    counters: Arc<ScanCounters>,
    started: AtomicBool,
}

impl DumpCoordinator {
    pub fn new(config: Config, host: Arc<dyn Host>, sink: Arc<dyn MessageSink>) -> Result<Self, ConfigError> {
        config.validate()?;

        let dumper = Arc::new(ModuleDumper::new(host.clone(), sink.clone(), &config));
        let hooks = Arc::new(LoaderHooks::new(host.clone(), dumper.clone(), &config));
        let scanner = Arc::new(MemoryScanner::new(host.clone(), dumper.clone(), sink, &config));

        Ok(Self {
            config,
            host,
            dumper,
            hooks,
            scanner,
            counters: Arc::new(ScanCounters::default()),
            started: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dumper(&self) -> &Arc<ModuleDumper> {
        &self.dumper
    }

    pub fn hooks(&self) -> &Arc<LoaderHooks> {
        &self.hooks
    }

    /// Initial module pass, hook installation, then the periodic scan.
    /// Returns false if the session was already started.
    pub fn start(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            log::warn!("dump session already started");
            return false;
        }

        log::info!("starting dump session (pid {})", std::process::id());

        let initial = self.scanner.scan_known_modules();
        self.counters.record(initial);
        log::info!("initial enumeration found {}", pluralize(initial, "module", "modules"));

        let hooked = self
            .config
            .loader_functions
            .iter()
            .filter(|function| self.hooks.hook(function))
            .count();
        if hooked == 0 {
            log::warn!("no loader function could be hooked, relying on periodic scans");
        }

        let scanner = self.scanner.clone();
        let counters = self.counters.clone();
        self.host.schedule_periodic(
            self.config.scan_interval(),
            Box::new(move || run_scan_pass(&scanner, &counters)),
        );
        log::info!("periodic scan every {:?}", self.config.scan_interval());

        true
    }

    /// Snapshot of the session. Detached from the live registries.
    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            started: self.started.load(Ordering::SeqCst),
            processed: self.dumper.snapshot_processed().into_iter().collect(),
            hooked: self.hooks.list_hooked().into_iter().collect(),
            scan_passes: self.counters.passes.load(Ordering::Relaxed),
            discoveries: self.counters.discoveries.load(Ordering::Relaxed),
        }
    }
}

fn run_scan_pass(scanner: &MemoryScanner, counters: &ScanCounters) {
    let _timer = ScopedTimer::new("scan pass");

    let found = scanner.scan_signatures() + scanner.scan_known_modules();
    let pass = counters.passes.fetch_add(1, Ordering::Relaxed) + 1;
    counters.record(found);

    if found > 0 {
        log::info!("scan pass {} found {}", pass, pluralize(found, "new module", "new modules"));
    } else {
        log::debug!("scan pass {} found nothing new", pass);
    }
}
