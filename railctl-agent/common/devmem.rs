use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::common::port::{PortProvider, RegisterPort};
use crate::error::{RailError, Result};

const PAGE_SIZE: u64 = 0x1000;

/// Register port over a physical window mapped through `/dev/mem`
pub struct DevMemPort {
    name: String,
    base: u64,
    len: usize,
    ptr: NonNull<u8>,
    lock: Mutex<()>,
}

// The mapping is only touched with `lock` held and lives until drop.
unsafe impl Send for DevMemPort {}
unsafe impl Sync for DevMemPort {}

impl DevMemPort {
    pub fn open(path: &Path, base: u64, len: usize) -> Result<Self> {
        if base % PAGE_SIZE != 0 {
            return Err(RailError::ConfigError(format!(
                "Base address 0x{base:X} is not page aligned"
            )));
        }
        let length = NonZeroUsize::new(len)
            .ok_or_else(|| RailError::ConfigError("Register window is empty".to_string()))?;
        let offset = libc::off_t::try_from(base).map_err(|_| {
            RailError::ConfigError(format!("Base address 0x{base:X} out of range"))
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)?;

        let raw = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                Some(&file),
                offset,
            )
        }?;

        let ptr = NonNull::new(raw as *mut u8)
            .ok_or_else(|| RailError::PortError("mmap returned null".to_string()))?;

        tracing::info!(
            "Mapped {} bytes at physical 0x{:08X} from {}",
            len,
            base,
            path.display()
        );

        Ok(Self {
            name: format!("{}@0x{:08x}", path.display(), base),
            base,
            len,
            ptr,
            lock: Mutex::new(()),
        })
    }

    fn register(&self, offset: u32) -> Result<*mut u32> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|start| start % 4 == 0)
            .filter(|start| start.checked_add(4).is_some_and(|end| end <= self.len));

        match start {
            Some(start) => Ok(unsafe { self.ptr.as_ptr().add(start) as *mut u32 }),
            None => Err(RailError::PortError(format!(
                "Offset 0x{offset:X} outside {}-byte window or unaligned",
                self.len
            ))),
        }
    }
}

impl RegisterPort for DevMemPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, offset: u32) -> Result<u32> {
        let reg = self.register(offset)?;
        let _guard = self.lock.lock();
        let value = unsafe { reg.read_volatile() };
        tracing::debug!("MMIO read: 0x{:08x} = 0x{:08x}", self.base + offset as u64, value);
        Ok(value)
    }

    fn write(&self, offset: u32, value: u32) -> Result<()> {
        let reg = self.register(offset)?;
        let _guard = self.lock.lock();
        unsafe { reg.write_volatile(value) };
        tracing::debug!("MMIO write: 0x{:08x} = 0x{:08x}", self.base + offset as u64, value);
        Ok(())
    }

    fn update_bits(&self, offset: u32, mask: u32, value: u32) -> Result<()> {
        let reg = self.register(offset)?;
        let _guard = self.lock.lock();
        let old = unsafe { reg.read_volatile() };
        let new = (old & !mask) | (value & mask);
        if new != old {
            unsafe { reg.write_volatile(new) };
        }
        tracing::debug!(
            "MMIO update: 0x{:08x} 0x{:08x} -> 0x{:08x}",
            self.base + offset as u64,
            old,
            new
        );
        Ok(())
    }
}

impl Drop for DevMemPort {
    fn drop(&mut self) {
        let _ = unsafe { munmap(self.ptr.as_ptr().cast(), self.len) };
    }
}

/// Provides a [`DevMemPort`] once the memory device can be opened
pub struct DevMemProvider {
    pub path: PathBuf,
    pub base: u64,
    pub len: usize,
}

impl PortProvider for DevMemProvider {
    fn name(&self) -> &str {
        self.path.to_str().unwrap_or("devmem")
    }

    fn try_port(&self) -> Result<Option<Arc<dyn RegisterPort>>> {
        match DevMemPort::open(&self.path, self.base, self.len) {
            Ok(port) => Ok(Some(Arc::new(port))),
            Err(RailError::IoError(e))
                if e.kind() == ErrorKind::NotFound || e.raw_os_error() == Some(libc::EBUSY) =>
            {
                tracing::debug!("{} not ready: {}", self.path.display(), e);
                Ok(None)
            }
            Err(RailError::IoError(e)) => Err(RailError::PortError(format!(
                "Failed to open {}: {}",
                self.path.display(),
                e
            ))),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_declines() {
        let provider = DevMemProvider {
            path: PathBuf::from("/nonexistent/railctl/mem"),
            base: 0x0300_0000,
            len: 0x1000,
        };
        assert!(matches!(provider.try_port(), Ok(None)));
    }

    fn temp_window(name: &str, len: u64) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "railctl-devmem-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::File::create(&path).unwrap().set_len(len).unwrap();
        path
    }

    #[test]
    fn test_offsets_outside_window_rejected() {
        let path = temp_window("bounds", 0x1000);
        let port = DevMemPort::open(&path, 0, 0x1000).unwrap();

        port.write(0xFFC, 0xA5A5_0001).unwrap();
        assert_eq!(port.read(0xFFC).unwrap(), 0xA5A5_0001);

        for offset in [0x1000, 0xFFE, 2, u32::MAX - 3, u32::MAX] {
            assert!(
                matches!(port.read(offset), Err(RailError::PortError(_))),
                "offset 0x{offset:X}"
            );
            assert!(matches!(
                port.update_bits(offset, 0xFF, 0x12),
                Err(RailError::PortError(_))
            ));
        }

        drop(port);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_provider_named_after_device() {
        let provider = DevMemProvider {
            path: PathBuf::from("/dev/mem"),
            base: 0x0300_0000,
            len: 0x1000,
        };
        assert_eq!(provider.name(), "/dev/mem");
    }

    #[test]
    fn test_unaligned_base_rejected() {
        let result = DevMemPort::open(Path::new("/dev/null"), 0x0300_0010, 0x1000);
        assert!(matches!(result, Err(RailError::ConfigError(_))));
    }
}
