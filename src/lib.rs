// Tue Jan 15 2026 - Alex

pub mod config;
pub mod dumper;
pub mod entry;
pub mod hooks;
pub mod host;
pub mod memory;
pub mod module;
pub mod orchestrator;
pub mod output;
pub mod scanner;
pub mod utils;

#[cfg(test)]
pub mod testing;

pub use config::{Config, ConfigError};
pub use dumper::{DumpError, ModuleDumper};
pub use entry::{start_from_env, start_session, StartupError};
pub use hooks::{HookError, LoaderHooks};
pub use host::{Host, LocalHost};
pub use memory::{Address, MemoryError};
pub use module::ModuleDescriptor;
pub use orchestrator::{CoordinatorStatus, DumpCoordinator};
pub use output::{FrameDecoder, MessageSink, OutboundMessage, StreamSink};
pub use scanner::MemoryScanner;
