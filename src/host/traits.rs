// Wed Jan 15 2026 - Alex

use crate::hooks::HookError;
use crate::memory::{Address, MemoryError, MemoryReader};
use crate::module::ModuleDescriptor;
use std::sync::Arc;
use std::time::Duration;

pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Lookups against the host's module bookkeeping.
pub trait ModuleResolver: Send + Sync {
    fn enumerate_modules(&self) -> Result<Vec<ModuleDescriptor>, MemoryError>;

    fn find_module_by_address(&self, addr: Address) -> Option<ModuleDescriptor>;

    /// Accepts either a bare file name (`libfoo.so`) or a full path.
    fn find_module_by_name(&self, name: &str) -> Option<ModuleDescriptor>;

    /// Resolves an exported function across every loaded module.
    fn find_export(&self, name: &str) -> Option<Address>;
}

/// Raw argument values of one intercepted call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationArgs {
    args: Vec<Address>,
}

impl InvocationArgs {
    pub fn new(args: &[Address]) -> Self {
        Self { args: args.to_vec() }
    }

    pub fn get(&self, index: usize) -> Option<Address> {
        self.args.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// State captured on entry to one intercepted call and handed back on exit of
/// that same call. Each invocation owns its own value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub captured_path: Option<String>,
}

pub trait InvocationListener: Send + Sync {
    fn on_enter(&self, args: &InvocationArgs) -> InvocationContext;

    fn on_leave(&self, context: InvocationContext, retval: Address);
}

pub trait Interceptor: Send + Sync {
    fn attach(&self, target: Address, listener: Arc<dyn InvocationListener>) -> Result<(), HookError>;
}

pub trait FileSource: Send + Sync {
    fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>>;
}

/// Deferred callbacks. Every task runs on the same logical thread.
pub trait Scheduler: Send + Sync {
    fn schedule_once(&self, delay: Duration, task: Task);

    fn schedule_periodic(&self, interval: Duration, task: RepeatingTask);
}

/// Everything the dumper needs from the process it lives in.
pub trait Host: MemoryReader + ModuleResolver + Interceptor + FileSource + Scheduler {}

impl<T> Host for T where T: MemoryReader + ModuleResolver + Interceptor + FileSource + Scheduler {}
