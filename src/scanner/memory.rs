// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::dumper::ModuleDumper;
use crate::host::Host;
use crate::memory::{MemoryRegion, Protection};
use crate::module::ModuleDescriptor;
use crate::output::{MessageSink, OutboundMessage};
use crate::scanner::signature::{matches_signature, SIGNATURE_LEN};
use crate::utils::panic_message;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Finds library images the loader hooks did not report.
///
/// Two passes: a signature sweep over executable memory, which catches
/// manually mapped or unlinked images, and a walk of the host's own module
/// list, which catches ordinary loads that happened before the hooks or
/// through an entry point nobody hooked.
pub struct MemoryScanner {
    host: Arc<dyn Host>,
    dumper: Arc<ModuleDumper>,
    sink: Arc<dyn MessageSink>,
    library_extensions: Vec<String>,
}

impl MemoryScanner {
    pub fn new(
        host: Arc<dyn Host>,
        dumper: Arc<ModuleDumper>,
        sink: Arc<dyn MessageSink>,
        config: &Config,
    ) -> Self {
        Self {
            host,
            dumper,
            sink,
            library_extensions: config.library_extensions.clone(),
        }
    }

    /// Returns how many dumps this pass started.
    pub fn scan_signatures(&self) -> usize {
        let regions = match self.host.enumerate_ranges(Protection::ReadExecute, true) {
            Ok(regions) => regions,
            Err(err) => {
                log::error!("range enumeration failed: {}", err);
                self.sink.send(OutboundMessage::error(format!("range enumeration failed: {}", err)));
                return 0;
            }
        };

        log::debug!("signature scan over {} executable ranges", regions.len());
        let mut started = 0;

        for region in &regions {
            let inspected = panic::catch_unwind(AssertUnwindSafe(|| self.inspect_region(region)));
            match inspected {
                Ok(Some(module)) => {
                    log::info!("signature hit at {} belongs to {}", region.start(), module.name);
                    if self.dumper.dump(&module).claimed() {
                        started += 1;
                    }
                }
                Ok(None) => {}
                Err(payload) => {
                    log::trace!("inspecting {} failed: {}", region, panic_message(payload.as_ref()));
                }
            }
        }

        started
    }

    /// Resolves a region to a module worth dumping, or `None` for anything
    /// that should be skipped.
    fn inspect_region(&self, region: &MemoryRegion) -> Option<ModuleDescriptor> {
        if region.start().is_null() || region.size() < SIGNATURE_LEN as u64 {
            return None;
        }

        let header = self.host.read_bytes(region.start(), SIGNATURE_LEN).ok()?;
        if !matches_signature(&header) {
            return None;
        }

        let Some(module) = self.host.find_module_by_address(region.start()) else {
            log::debug!("ELF image at {} has no owning module", region.start());
            return None;
        };

        if !module.looks_like_library(&self.library_extensions) {
            log::trace!("{} is not a shared library, skipping", module.name);
            return None;
        }

        if self.dumper.is_processed(&module.name) {
            return None;
        }

        Some(module)
    }

    /// Dumps every library-like module the host already knows about that has
    /// not been processed. Best effort: failures are logged only.
    pub fn scan_known_modules(&self) -> usize {
        let modules = match self.host.enumerate_modules() {
            Ok(modules) => modules,
            Err(err) => {
                log::warn!("module enumeration failed: {}", err);
                return 0;
            }
        };

        let mut started = 0;

        for module in modules {
            if !module.looks_like_library(&self.library_extensions) || self.dumper.is_processed(&module.name) {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| self.dumper.dump(&module))) {
                Ok(outcome) if outcome.claimed() => started += 1,
                Ok(_) => {}
                Err(payload) => {
                    log::error!("dumping {} failed: {}", module.name, panic_message(payload.as_ref()));
                }
            }
        }

        if started > 0 {
            log::info!("module list pass started {} dumps", started);
        }
        started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Address, MemoryRange};
    use crate::testing::{FakeHost, RecordingSink};

    fn setup() -> (Arc<FakeHost>, Arc<RecordingSink>, Arc<ModuleDumper>, MemoryScanner) {
        let host = Arc::new(FakeHost::new());
        let sink = Arc::new(RecordingSink::new());
        let config = Config::default();
        let dumper = Arc::new(ModuleDumper::new(host.clone(), sink.clone(), &config));
        let scanner = MemoryScanner::new(host.clone(), dumper.clone(), sink.clone(), &config);
        (host, sink, dumper, scanner)
    }

    fn elf_image(len: usize) -> Vec<u8> {
        let mut image = vec![0u8; len];
        image[..4].copy_from_slice(b"\x7fELF");
        image
    }

    fn exec_region(start: u64, size: u64) -> MemoryRegion {
        MemoryRegion::new(MemoryRange::from_start_size(Address::new(start), size), Protection::ReadExecute)
    }

    #[test]
    fn test_signature_scan_dumps_new_library() {
        let (host, sink, dumper, scanner) = setup();
        host.map_memory(Address::new(0x10000), elf_image(0x1000));
        host.add_region(exec_region(0x10000, 0x1000));
        host.add_module(ModuleDescriptor::new("libpacked.so", Address::new(0x10000), 0x1000));

        assert_eq!(scanner.scan_signatures(), 1);
        assert!(dumper.is_processed("libpacked.so"));
        assert!(matches!(sink.messages().last(), Some(OutboundMessage::ModuleComplete { .. })));

        assert_eq!(scanner.scan_signatures(), 0);
    }

    #[test]
    fn test_signature_scan_skips_non_matches_and_unresolved() {
        let (host, sink, _dumper, scanner) = setup();
        // plain code, no magic
        host.map_memory(Address::new(0x10000), vec![0x90; 0x1000]);
        host.add_region(exec_region(0x10000, 0x1000));
        // magic but anonymous
        host.map_memory(Address::new(0x20000), elf_image(0x1000));
        host.add_region(exec_region(0x20000, 0x1000));
        // magic but the owner is an executable, not a library
        host.map_memory(Address::new(0x30000), elf_image(0x1000));
        host.add_region(exec_region(0x30000, 0x1000));
        host.add_module(ModuleDescriptor::new("app_process64", Address::new(0x30000), 0x1000));
        // unreadable
        host.add_region(exec_region(0x40000, 0x1000));
        // too small
        host.add_region(exec_region(0x50000, 2));

        assert_eq!(scanner.scan_signatures(), 0);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_signature_scan_survives_panicking_read() {
        let (host, _sink, dumper, scanner) = setup();
        host.add_region(exec_region(0x10000, 0x1000));
        host.panic_on_read(Address::new(0x10000));
        host.map_memory(Address::new(0x20000), elf_image(0x100));
        host.add_region(exec_region(0x20000, 0x100));
        host.add_module(ModuleDescriptor::new("libnext.so", Address::new(0x20000), 0x100));

        assert_eq!(scanner.scan_signatures(), 1);
        assert!(dumper.is_processed("libnext.so"));
    }

    #[test]
    fn test_signature_scan_reports_enumeration_failure() {
        let (host, sink, _dumper, scanner) = setup();
        host.fail_range_enumeration(true);

        assert_eq!(scanner.scan_signatures(), 0);
        assert!(matches!(sink.messages().as_slice(), [OutboundMessage::Error { .. }]));
    }

    #[test]
    fn test_only_executable_ranges_are_read() {
        let (host, _sink, dumper, scanner) = setup();
        host.map_memory(Address::new(0x10000), elf_image(0x100));
        host.add_region(MemoryRegion::new(
            MemoryRange::from_start_size(Address::new(0x10000), 0x100),
            Protection::Read,
        ));
        host.add_module(ModuleDescriptor::new("libdata.so", Address::new(0x10000), 0x100));

        assert_eq!(scanner.scan_signatures(), 0);
        assert!(!dumper.is_processed("libdata.so"));
    }

    #[test]
    fn test_known_module_pass() {
        let (host, _sink, dumper, scanner) = setup();
        host.map_memory(Address::new(0x10000), vec![1; 0x100]);
        host.map_memory(Address::new(0x20000), vec![2; 0x100]);
        host.add_module(ModuleDescriptor::new("liba.so", Address::new(0x10000), 0x100));
        host.add_module(ModuleDescriptor::new("libb.so.1", Address::new(0x20000), 0x100));
        host.add_module(ModuleDescriptor::new("app_process64", Address::new(0x30000), 0x100));

        assert_eq!(scanner.scan_known_modules(), 2);
        assert!(dumper.is_processed("liba.so"));
        assert!(dumper.is_processed("libb.so.1"));
        assert!(!dumper.is_processed("app_process64"));

        assert_eq!(scanner.scan_known_modules(), 0);
    }

    #[test]
    fn test_known_module_enumeration_failure_is_silent() {
        let (host, sink, _dumper, scanner) = setup();
        host.fail_module_enumeration(true);

        assert_eq!(scanner.scan_known_modules(), 0);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_known_module_fault_is_isolated() {
        let (host, sink, dumper, scanner) = setup();
        host.map_memory(Address::new(0x10000), vec![1; 0x100]);
        host.map_memory(Address::new(0x20000), vec![2; 0x100]);
        host.add_module(ModuleDescriptor::new("liba.so", Address::new(0x10000), 0x100));
        host.add_module(ModuleDescriptor::new("libb.so", Address::new(0x20000), 0x100));
        host.panic_on_read(Address::new(0x10000));

        assert_eq!(scanner.scan_known_modules(), 2);
        assert!(dumper.is_processed("liba.so"));
        assert!(matches!(sink.for_module("liba.so").last(), Some(OutboundMessage::ModuleError { .. })));
        assert!(matches!(sink.for_module("libb.so").last(), Some(OutboundMessage::ModuleComplete { .. })));
    }

    #[test]
    fn test_known_module_pass_survives_panicking_sink() {
        struct FaultySink {
            inner: RecordingSink,
        }

        impl MessageSink for FaultySink {
            fn send(&self, message: OutboundMessage) {
                if let OutboundMessage::ModuleInfo { name, .. } = &message {
                    if name == "liba.so" {
                        panic!("sink fault");
                    }
                }
                self.inner.send(message);
            }
        }

        let host = Arc::new(FakeHost::new());
        let sink = Arc::new(FaultySink { inner: RecordingSink::new() });
        let config = Config::default();
        let dumper = Arc::new(ModuleDumper::new(host.clone(), sink.clone(), &config));
        let scanner = MemoryScanner::new(host.clone(), dumper.clone(), sink.clone(), &config);
        host.map_memory(Address::new(0x10000), vec![1; 0x100]);
        host.map_memory(Address::new(0x20000), vec![2; 0x100]);
        host.add_module(ModuleDescriptor::new("liba.so", Address::new(0x10000), 0x100));
        host.add_module(ModuleDescriptor::new("libb.so", Address::new(0x20000), 0x100));

        assert_eq!(scanner.scan_known_modules(), 1);
        assert!(dumper.is_processed("liba.so"));
        assert!(matches!(sink.inner.for_module("libb.so").last(), Some(OutboundMessage::ModuleComplete { .. })));
        assert_eq!(scanner.scan_known_modules(), 0);
    }

    #[test]
    fn test_concurrent_passes_count_each_module_once() {
        let (host, _sink, dumper, scanner) = setup();
        let scanner = Arc::new(scanner);
        for i in 0..20u64 {
            let base = Address::new(0x10000 + i * 0x1000);
            host.map_memory(base, vec![i as u8; 0x100]);
            host.add_module(ModuleDescriptor::new(&format!("lib{}.so", i), base, 0x100));
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let scanner = scanner.clone();
                std::thread::spawn(move || scanner.scan_known_modules())
            })
            .collect();
        let started: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(started, 20);
        assert_eq!(dumper.snapshot_processed().len(), 20);
    }
}
