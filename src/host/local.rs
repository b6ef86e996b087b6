// Tue Jan 13 2026 - Alex

use crate::hooks::HookError;
use crate::host::preload;
use crate::host::timer::TimerQueue;
use crate::host::{
    FileSource, Interceptor, InvocationListener, ModuleResolver, RepeatingTask, Scheduler, Task,
};
use crate::memory::maps::{modules_from_maps, read_self_maps};
use crate::memory::{Address, MemoryError, MemoryReader, MemoryRegion, ProcessMemory, Protection};
use crate::module::{file_name_of, ModuleDescriptor};
use std::ffi::CString;
use std::sync::Arc;
use std::time::Duration;

/// The production host: the live process this library was injected into.
pub struct LocalHost {
    memory: ProcessMemory,
    timers: TimerQueue,
}

impl LocalHost {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            memory: ProcessMemory::current(),
            timers: TimerQueue::start("module-dumper-timer")?,
        })
    }
}

impl MemoryReader for LocalHost {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        self.memory.read_bytes(addr, len)
    }

    fn read_c_string(&self, addr: Address) -> Result<String, MemoryError> {
        self.memory.read_c_string(addr)
    }

    fn enumerate_ranges(
        &self,
        required: Protection,
        coalesce: bool,
    ) -> Result<Vec<MemoryRegion>, MemoryError> {
        self.memory.enumerate_ranges(required, coalesce)
    }
}

impl ModuleResolver for LocalHost {
    fn enumerate_modules(&self) -> Result<Vec<ModuleDescriptor>, MemoryError> {
        let entries = read_self_maps()
            .map_err(|e| MemoryError::EnumerationFailed(e.to_string()))?;
        Ok(modules_from_maps(&entries))
    }

    fn find_module_by_address(&self, addr: Address) -> Option<ModuleDescriptor> {
        self.enumerate_modules()
            .ok()?
            .into_iter()
            .find(|m| m.contains(addr))
    }

    fn find_module_by_name(&self, name: &str) -> Option<ModuleDescriptor> {
        find_by_name(self.enumerate_modules().ok()?, name)
    }

    fn find_export(&self, name: &str) -> Option<Address> {
        let symbol = CString::new(name).ok()?;
        let ptr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, symbol.as_ptr()) };
        if ptr.is_null() {
            None
        } else {
            Some(Address::from_ptr(ptr as *const libc::c_void))
        }
    }
}

/// The loader sees the path as the caller spelled it while the maps show the
/// canonical one, so try the literal name, then the canonical path, then the
/// file name alone.
fn find_by_name(modules: Vec<ModuleDescriptor>, name: &str) -> Option<ModuleDescriptor> {
    if let Some(index) = modules
        .iter()
        .position(|m| m.name == name || m.path.as_deref() == Some(name))
    {
        return modules.into_iter().nth(index);
    }

    if let Some(canonical) = std::fs::canonicalize(name)
        .ok()
        .and_then(|p| p.to_str().map(str::to_string))
    {
        if let Some(index) = modules.iter().position(|m| m.path.as_deref() == Some(canonical.as_str())) {
            return modules.into_iter().nth(index);
        }
    }

    let file_name = file_name_of(name);
    modules.into_iter().find(|m| m.name == file_name)
}

impl Interceptor for LocalHost {
    fn attach(&self, target: Address, listener: Arc<dyn InvocationListener>) -> Result<(), HookError> {
        preload::attach(target, listener)
    }
}

impl FileSource for LocalHost {
    fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

impl Scheduler for LocalHost {
    fn schedule_once(&self, delay: Duration, task: Task) {
        self.timers.schedule_once(delay, task);
    }

    fn schedule_periodic(&self, interval: Duration, task: RepeatingTask) {
        self.timers.schedule_periodic(interval, task);
    }
}
