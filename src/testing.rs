// Tue Jan 13 2026 - Alex

//! In-process doubles for the host capabilities and the message sink.
//!
//! `FakeHost` keeps a virtual clock: scheduled tasks only run when a test calls
//! `advance`, on the calling thread, in deadline order.

use crate::hooks::HookError;
use crate::host::{
    FileSource, Interceptor, InvocationArgs, InvocationContext, InvocationListener, ModuleResolver,
    RepeatingTask, Scheduler, Task,
};
use crate::memory::{Address, MemoryError, MemoryRange, MemoryReader, MemoryRegion, Protection};
use crate::module::ModuleDescriptor;
use crate::output::{MessageSink, OutboundMessage};
use itertools::Itertools;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

enum FakeJob {
    Once(Task),
    Periodic { interval: Duration, task: RepeatingTask },
}

struct FakeTimer {
    due: Duration,
    seq: u64,
    job: FakeJob,
}

#[derive(Default)]
struct FakeState {
    memory: Vec<(Address, Vec<u8>)>,
    failing: Vec<MemoryRange>,
    panicking: Vec<Address>,
    panicking_lookups: Vec<String>,
    reads: Vec<(Address, usize)>,
    files: HashMap<String, Vec<u8>>,
    file_reads: Vec<String>,
    regions: Vec<MemoryRegion>,
    modules: Vec<ModuleDescriptor>,
    fail_ranges: bool,
    fail_modules: bool,
    exports: HashMap<String, Address>,
    listeners: HashMap<u64, Arc<dyn InvocationListener>>,
    fail_attach: bool,
    attach_count: usize,
    now: Duration,
    next_seq: u64,
    timers: Vec<FakeTimer>,
}

impl FakeState {
    fn mapping(&self, addr: Address) -> Option<&[u8]> {
        self.memory.iter().find_map(|(base, data)| {
            let end = base.checked_add(data.len() as u64)?;
            if addr.is_within_range(*base, end) {
                Some(&data[(addr - *base) as usize..])
            } else {
                None
            }
        })
    }

    fn push_timer(&mut self, due: Duration, job: FakeJob) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(FakeTimer { due, seq, job });
    }

    fn pop_due(&mut self, deadline: Duration) -> Option<FakeTimer> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= deadline)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        Some(self.timers.swap_remove(index))
    }
}

#[derive(Default)]
pub struct FakeHost {
    state: Mutex<FakeState>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_memory(&self, base: Address, data: Vec<u8>) {
        self.state.lock().memory.push((base, data));
    }

    /// Any read overlapping `range` fails.
    pub fn fail_reads(&self, range: MemoryRange) {
        self.state.lock().failing.push(range);
    }

    /// A read starting exactly at `addr` panics.
    pub fn panic_on_read(&self, addr: Address) {
        self.state.lock().panicking.push(addr);
    }

    /// Looking up `name` as a module panics.
    pub fn panic_on_lookup(&self, name: &str) {
        self.state.lock().panicking_lookups.push(name.to_string());
    }

    pub fn reads(&self) -> Vec<(Address, usize)> {
        self.state.lock().reads.clone()
    }

    pub fn add_file(&self, path: &str, data: Vec<u8>) {
        self.state.lock().files.insert(path.to_string(), data);
    }

    pub fn file_reads(&self) -> Vec<String> {
        self.state.lock().file_reads.clone()
    }

    pub fn add_region(&self, region: MemoryRegion) {
        self.state.lock().regions.push(region);
    }

    pub fn fail_range_enumeration(&self, fail: bool) {
        self.state.lock().fail_ranges = fail;
    }

    pub fn add_module(&self, module: ModuleDescriptor) {
        self.state.lock().modules.push(module);
    }

    pub fn fail_module_enumeration(&self, fail: bool) {
        self.state.lock().fail_modules = fail;
    }

    pub fn add_export(&self, name: &str, address: Address) {
        self.state.lock().exports.insert(name.to_string(), address);
    }

    pub fn fail_attach(&self, fail: bool) {
        self.state.lock().fail_attach = fail;
    }

    pub fn attach_count(&self) -> usize {
        self.state.lock().attach_count
    }

    fn listener(&self, target: Address) -> Option<Arc<dyn InvocationListener>> {
        self.state.lock().listeners.get(&target.as_u64()).cloned()
    }

    /// Entry half of a call to `target`. `None` when nothing is attached.
    pub fn enter(&self, target: Address, args: &[Address]) -> Option<InvocationContext> {
        let listener = self.listener(target)?;
        Some(listener.on_enter(&InvocationArgs::new(args)))
    }

    pub fn leave(&self, target: Address, context: InvocationContext, retval: Address) {
        if let Some(listener) = self.listener(target) {
            listener.on_leave(context, retval);
        }
    }

    /// A complete call to `target` returning `retval`.
    pub fn invoke(&self, target: Address, args: &[Address], retval: Address) {
        if let Some(context) = self.enter(target, args) {
            self.leave(target, context, retval);
        }
    }

    /// Moves the virtual clock forward, running every task that comes due.
    pub fn advance(&self, by: Duration) {
        let deadline = self.state.lock().now + by;

        loop {
            let timer = {
                let mut state = self.state.lock();
                match state.pop_due(deadline) {
                    Some(timer) => {
                        state.now = timer.due;
                        timer
                    }
                    None => {
                        state.now = deadline;
                        return;
                    }
                }
            };

            match timer.job {
                FakeJob::Once(task) => task(),
                FakeJob::Periodic { interval, mut task } => {
                    task();
                    let interval = interval.max(Duration::from_millis(1));
                    self.state
                        .lock()
                        .push_timer(timer.due + interval, FakeJob::Periodic { interval, task });
                }
            }
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }
}

impl MemoryReader for FakeHost {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        let mut state = self.state.lock();
        state.reads.push((addr, len));

        if state.panicking.contains(&addr) {
            drop(state);
            panic!("simulated access violation at {}", addr);
        }

        let requested = MemoryRange::from_start_size(addr, len as u64);
        if state
            .failing
            .iter()
            .any(|r| r.start() < requested.end() && requested.start() < r.end())
        {
            return Err(MemoryError::read_failed(addr.as_u64(), "injected failure"));
        }

        match state.mapping(addr) {
            Some(data) if data.len() >= len => Ok(data[..len].to_vec()),
            Some(data) => Err(MemoryError::ShortRead {
                address: addr.as_u64(),
                wanted: len,
                got: data.len(),
            }),
            None => Err(MemoryError::read_failed(addr.as_u64(), "unmapped")),
        }
    }

    fn read_c_string(&self, addr: Address) -> Result<String, MemoryError> {
        let state = self.state.lock();
        let data = state
            .mapping(addr)
            .ok_or_else(|| MemoryError::read_failed(addr.as_u64(), "unmapped"))?;
        let end = data
            .iter()
            .position(|&b| b == 0)
            .ok_or(MemoryError::UnterminatedString(addr.as_u64()))?;
        Ok(String::from_utf8_lossy(&data[..end]).into_owned())
    }

    fn enumerate_ranges(
        &self,
        required: Protection,
        coalesce: bool,
    ) -> Result<Vec<MemoryRegion>, MemoryError> {
        let state = self.state.lock();
        if state.fail_ranges {
            return Err(MemoryError::EnumerationFailed("injected failure".to_string()));
        }

        let selected = state
            .regions
            .iter()
            .filter(|r| r.protection().includes(required))
            .cloned()
            .sorted_by_key(|r| r.start());

        if coalesce {
            Ok(selected.coalesce(|a, b| a.coalesce(b)).collect())
        } else {
            Ok(selected.collect())
        }
    }
}

impl ModuleResolver for FakeHost {
    fn enumerate_modules(&self) -> Result<Vec<ModuleDescriptor>, MemoryError> {
        let state = self.state.lock();
        if state.fail_modules {
            return Err(MemoryError::EnumerationFailed("injected failure".to_string()));
        }
        Ok(state.modules.clone())
    }

    fn find_module_by_address(&self, addr: Address) -> Option<ModuleDescriptor> {
        self.state.lock().modules.iter().find(|m| m.contains(addr)).cloned()
    }

    fn find_module_by_name(&self, name: &str) -> Option<ModuleDescriptor> {
        let state = self.state.lock();
        if state.panicking_lookups.iter().any(|n| n == name) {
            drop(state);
            panic!("simulated resolver fault for {}", name);
        }
        state
            .modules
            .iter()
            .find(|m| m.name == name || m.path.as_deref() == Some(name))
            .cloned()
    }

    fn find_export(&self, name: &str) -> Option<Address> {
        self.state.lock().exports.get(name).copied()
    }
}

impl Interceptor for FakeHost {
    fn attach(&self, target: Address, listener: Arc<dyn InvocationListener>) -> Result<(), HookError> {
        let mut state = self.state.lock();
        if state.fail_attach {
            return Err(HookError::AttachFailed("injected failure".to_string()));
        }
        if state.listeners.contains_key(&target.as_u64()) {
            return Err(HookError::AlreadyAttached(target));
        }
        state.listeners.insert(target.as_u64(), listener);
        state.attach_count += 1;
        Ok(())
    }
}

impl FileSource for FakeHost {
    fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.file_reads.push(path.to_string());
        state.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("{} not found", path))
        })
    }
}

impl Scheduler for FakeHost {
    fn schedule_once(&self, delay: Duration, task: Task) {
        let mut state = self.state.lock();
        let due = state.now + delay;
        state.push_timer(due, FakeJob::Once(task));
    }

    fn schedule_periodic(&self, interval: Duration, task: RepeatingTask) {
        let mut state = self.state.lock();
        let due = state.now + interval;
        state.push_timer(due, FakeJob::Periodic { interval, task });
    }
}

/// Keeps every message it is sent, in order.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().clone()
    }

    pub fn for_module(&self, name: &str) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.module_name() == Some(name))
            .cloned()
            .collect()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, message: OutboundMessage) {
        self.messages.lock().push(message);
    }
}
