// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::dumper::DumpError;
use crate::host::Host;
use crate::memory::MemoryError;
use crate::module::ModuleDescriptor;
use crate::output::{MessageSink, OutboundMessage};
use crate::utils::{format_bytes, panic_message};
use bytes::Bytes;
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Where the bytes of a finished dump came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Memory,
    File,
}

/// How one call to [`ModuleDumper::dump`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpOutcome {
    /// Claimed here and streamed to the end.
    Completed,
    /// Claimed here; a module error was sent.
    Failed,
    /// Someone else already claimed the name. Nothing was sent.
    AlreadyProcessed,
    /// The descriptor was invalid and never claimed.
    Rejected,
}

impl DumpOutcome {
    /// True when this call claimed the name and started a dump.
    pub fn claimed(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Completed | Self::AlreadyProcessed)
    }
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
        }
    }
}

/// Streams module images to the sink, at most once per module name.
///
/// The processed-set only grows. A name is claimed before any byte is read,
/// so a scan and a loader hook racing on the same library cannot both
/// extract it, and a claimed module that fails is never retried.
pub struct ModuleDumper {
    host: Arc<dyn Host>,
    sink: Arc<dyn MessageSink>,
    chunk_size: usize,
    processed: Mutex<IndexSet<String>>,
}

impl ModuleDumper {
    pub fn new(host: Arc<dyn Host>, sink: Arc<dyn MessageSink>, config: &Config) -> Self {
        Self {
            host,
            sink,
            chunk_size: config.chunk_size.max(1),
            processed: Mutex::new(IndexSet::new()),
        }
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.lock().contains(name)
    }

    /// Names in the order they were claimed. The copy is detached from the
    /// live set.
    pub fn snapshot_processed(&self) -> IndexSet<String> {
        self.processed.lock().clone()
    }

    /// Check and insert under one lock acquisition.
    fn claim(&self, name: &str) -> bool {
        self.processed.lock().insert(name.to_string())
    }

    /// Extracts `module`. A name that was already processed is left alone.
    pub fn dump(&self, module: &ModuleDescriptor) -> DumpOutcome {
        if let Err(err) = validate(module) {
            log::error!("{}", err);
            self.sink.send(OutboundMessage::error(err.to_string()));
            return DumpOutcome::Rejected;
        }

        if !self.claim(&module.name) {
            log::trace!("{} already processed", module.name);
            return DumpOutcome::AlreadyProcessed;
        }

        log::info!("dumping {} ({})", module, module.path.as_deref().unwrap_or("memory only"));
        self.sink.send(OutboundMessage::module_info(module));

        if module.size == 0 {
            // A zero size is either an empty mapping or a size lookup that
            // failed upstream; both finish with no chunks.
            log::warn!("zero-size module {} at {}, nothing to read", module.name, module.base);
            self.sink.send(OutboundMessage::module_complete(&module.name));
            return DumpOutcome::Completed;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.extract(module)))
            .unwrap_or_else(|payload| Err(DumpError::Unexpected(panic_message(payload.as_ref()))));

        match outcome {
            Ok((source, written)) => {
                log::info!("{} complete: {} from {}", module.name, format_bytes(written), source);
                self.sink.send(OutboundMessage::module_complete(&module.name));
                DumpOutcome::Completed
            }
            Err(err) => {
                log::error!("{} failed: {}", module.name, err);
                self.sink.send(OutboundMessage::module_error(&module.name, err.to_string()));
                DumpOutcome::Failed
            }
        }
    }

    /// Memory first. The first failed read abandons the memory pass and, if
    /// the module has a backing file, restarts from the file at offset 0.
    fn extract(&self, module: &ModuleDescriptor) -> Result<(ExtractionSource, u64), DumpError> {
        let failure = match self.stream_memory(module) {
            Ok(written) => return Ok((ExtractionSource::Memory, written)),
            Err(err) => err,
        };

        let Some(path) = module.backing_file() else {
            return Err(failure);
        };

        log::warn!("{}: {}, falling back to {}", module.name, failure, path);
        let written = self.stream_file(module, path)?;
        Ok((ExtractionSource::File, written))
    }

    fn stream_memory(&self, module: &ModuleDescriptor) -> Result<u64, DumpError> {
        let mut offset = 0u64;

        while offset < module.size {
            let len = (module.size - offset).min(self.chunk_size as u64) as usize;
            let address = module.base.checked_add(offset).ok_or_else(|| DumpError::MemoryRead {
                offset,
                source: MemoryError::read_failed(module.base.as_u64(), "address overflow"),
            })?;

            let bytes = self
                .host
                .read_bytes(address, len)
                .map_err(|source| DumpError::MemoryRead { offset, source })?;

            self.sink.send(OutboundMessage::module_chunk(&module.name, offset, Bytes::from(bytes)));
            offset += len as u64;
        }

        Ok(offset)
    }

    fn stream_file(&self, module: &ModuleDescriptor, path: &str) -> Result<u64, DumpError> {
        let data = self.host.read_file(path).map_err(|source| DumpError::FileRead {
            path: path.to_string(),
            source,
        })?;
        if data.is_empty() {
            return Err(DumpError::EmptyFile(path.to_string()));
        }

        let data = Bytes::from(data);
        let total = data.len();
        let mut offset = 0usize;

        while offset < total {
            let end = (offset + self.chunk_size).min(total);
            self.sink.send(OutboundMessage::module_chunk(&module.name, offset as u64, data.slice(offset..end)));
            offset = end;
        }

        Ok(total as u64)
    }
}

fn validate(module: &ModuleDescriptor) -> Result<(), DumpError> {
    if module.name.is_empty() {
        return Err(DumpError::InvalidInput(format!("empty module name (base {})", module.base)));
    }
    if module.base.is_null() {
        return Err(DumpError::InvalidInput(format!("{} has a null base address", module.name)));
    }
    Ok(())
}
