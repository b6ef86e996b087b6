// Tue Jan 13 2026 - Alex

use crate::memory::Address;
use crate::module::ModuleDescriptor;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Everything the dumper tells the collector.
///
/// For one module the order is always `ModuleInfo`, any number of
/// `ModuleChunk`, then exactly one of `ModuleComplete` or `ModuleError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    ModuleInfo {
        name: String,
        base: Address,
        size: u64,
        path: Option<String>,
    },
    ModuleChunk {
        module: String,
        offset: u64,
        data: Bytes,
    },
    ModuleComplete {
        name: String,
    },
    ModuleError {
        name: String,
        error: String,
    },
    Error {
        error: String,
    },
}

/// The structured half of a message. Chunk payload bytes travel separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageHeader {
    ModuleInfo {
        name: String,
        base: Address,
        size: u64,
        path: Option<String>,
    },
    ModuleChunk {
        module: String,
        offset: u64,
        chunk_size: usize,
    },
    ModuleComplete {
        name: String,
    },
    ModuleError {
        name: String,
        error: String,
    },
    Error {
        error: String,
    },
}

impl OutboundMessage {
    pub fn module_info(module: &ModuleDescriptor) -> Self {
        Self::ModuleInfo {
            name: module.name.clone(),
            base: module.base,
            size: module.size,
            path: module.path.clone(),
        }
    }

    pub fn module_chunk(module: &str, offset: u64, data: Bytes) -> Self {
        Self::ModuleChunk {
            module: module.to_string(),
            offset,
            data,
        }
    }

    pub fn module_complete(name: &str) -> Self {
        Self::ModuleComplete { name: name.to_string() }
    }

    pub fn module_error(name: &str, error: impl Into<String>) -> Self {
        Self::ModuleError {
            name: name.to_string(),
            error: error.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error { error: error.into() }
    }

    /// The module this message belongs to, if any.
    pub fn module_name(&self) -> Option<&str> {
        match self {
            Self::ModuleInfo { name, .. }
            | Self::ModuleComplete { name }
            | Self::ModuleError { name, .. } => Some(name),
            Self::ModuleChunk { module, .. } => Some(module),
            Self::Error { .. } => None,
        }
    }

    /// True for messages that end a module's stream (and generic errors).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ModuleComplete { .. } | Self::ModuleError { .. } | Self::Error { .. }
        )
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::ModuleChunk { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn header(&self) -> MessageHeader {
        match self {
            Self::ModuleInfo { name, base, size, path } => MessageHeader::ModuleInfo {
                name: name.clone(),
                base: *base,
                size: *size,
                path: path.clone(),
            },
            Self::ModuleChunk { module, offset, data } => MessageHeader::ModuleChunk {
                module: module.clone(),
                offset: *offset,
                chunk_size: data.len(),
            },
            Self::ModuleComplete { name } => MessageHeader::ModuleComplete { name: name.clone() },
            Self::ModuleError { name, error } => MessageHeader::ModuleError {
                name: name.clone(),
                error: error.clone(),
            },
            Self::Error { error } => MessageHeader::Error { error: error.clone() },
        }
    }

    /// Rebuilds a message from a decoded header and its payload.
    pub fn from_parts(header: MessageHeader, payload: Bytes) -> Self {
        match header {
            MessageHeader::ModuleInfo { name, base, size, path } => Self::ModuleInfo { name, base, size, path },
            MessageHeader::ModuleChunk { module, offset, .. } => Self::ModuleChunk {
                module,
                offset,
                data: payload,
            },
            MessageHeader::ModuleComplete { name } => Self::ModuleComplete { name },
            MessageHeader::ModuleError { name, error } => Self::ModuleError { name, error },
            MessageHeader::Error { error } => Self::Error { error },
        }
    }
}
