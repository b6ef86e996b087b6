// Tue Jan 13 2026 - Alex

use crate::memory::{Address, MemoryRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One loaded shared-library image.
///
/// `name` is the deduplication key for the whole pipeline. `path` is absent
/// when the image only exists in memory (loaded from a buffer, or its file
/// was unlinked after mapping).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub base: Address,
    pub size: u64,
    pub path: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, base: Address, size: u64) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Builds a descriptor from a filesystem path, naming it after the file.
    pub fn from_path(path: &str, base: Address, size: u64) -> Self {
        Self::new(file_name_of(path), base, size).with_path(path)
    }

    pub fn range(&self) -> MemoryRange {
        MemoryRange::from_start_size(self.base, self.size)
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.range().contains(addr)
    }

    /// The fallback source, if one is usable. An empty path counts as none.
    pub fn backing_file(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| !p.is_empty())
    }

    /// True when the name looks like a shared object under any of the given
    /// extensions, either plain (`libfoo.so`) or versioned (`libc.so.6`).
    pub fn looks_like_library(&self, extensions: &[String]) -> bool {
        is_library_name(&self.name, extensions)
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} ({} bytes)", self.name, self.base, self.size)
    }
}

pub fn is_library_name(name: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| {
        !ext.is_empty() && (name.ends_with(ext.as_str()) || name.contains(&format!("{}.", ext)))
    })
}

pub fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
