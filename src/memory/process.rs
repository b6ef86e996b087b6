// Tue Jan 13 2026 - Alex

use crate::memory::maps::{read_self_maps, select_ranges};
use crate::memory::{Address, MemoryError, MemoryReader, MemoryRegion, Protection};
use libc::{c_void, iovec, pid_t};

const MAX_C_STRING: usize = 4096;
const C_STRING_BLOCK: usize = 64;

/// Reads the address space of the process this library is loaded into.
///
/// Reads go through `process_vm_readv` against our own pid, so an unmapped or
/// guard page fails with `EFAULT` instead of faulting the host.
pub struct ProcessMemory {
    pid: pid_t,
}

impl ProcessMemory {
    pub fn current() -> Self {
        Self { pid: unsafe { libc::getpid() } }
    }

    pub fn read_memory(&self, address: u64, size: usize) -> Result<Vec<u8>, MemoryError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        if address == 0 {
            return Err(MemoryError::read_failed(address, "null address"));
        }

        let mut buffer = vec![0u8; size];
        let local = iovec {
            iov_base: buffer.as_mut_ptr() as *mut c_void,
            iov_len: size,
        };
        let remote = iovec {
            iov_base: address as usize as *mut c_void,
            iov_len: size,
        };

        let read = unsafe { libc::process_vm_readv(self.pid, &local, 1, &remote, 1, 0) };
        if read < 0 {
            let err = std::io::Error::last_os_error();
            return Err(MemoryError::read_failed(address, err.to_string()));
        }
        if read as usize != size {
            return Err(MemoryError::ShortRead {
                address,
                wanted: size,
                got: read as usize,
            });
        }

        Ok(buffer)
    }

    /// Reads a block, shrinking to single bytes when the block crosses into
    /// an unreadable page.
    fn read_string_block(&self, address: u64) -> Result<Vec<u8>, MemoryError> {
        match self.read_memory(address, C_STRING_BLOCK) {
            Ok(block) => Ok(block),
            Err(_) => self.read_memory(address, 1),
        }
    }
}

impl MemoryReader for ProcessMemory {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        self.read_memory(addr.as_u64(), len)
    }

    fn read_c_string(&self, addr: Address) -> Result<String, MemoryError> {
        let mut bytes = Vec::new();
        let mut current = addr.as_u64();

        while bytes.len() < MAX_C_STRING {
            let block = self.read_string_block(current)?;
            if let Some(nul) = block.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&block[..nul]);
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.extend_from_slice(&block);
            current += block.len() as u64;
        }

        Err(MemoryError::UnterminatedString(addr.as_u64()))
    }

    fn enumerate_ranges(
        &self,
        required: Protection,
        coalesce: bool,
    ) -> Result<Vec<MemoryRegion>, MemoryError> {
        let entries = read_self_maps()
            .map_err(|e| MemoryError::EnumerationFailed(e.to_string()))?;
        Ok(select_ranges(&entries, required, coalesce))
    }
}
