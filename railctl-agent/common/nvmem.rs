//! Non-volatile calibration storage
//!
//! Trim values live in eFuse cells. A store answers with the cell's byte,
//! `None` when the cell is not provisioned, or an error for anything else.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::error::{RailError, Result};

pub trait CalibrationStore: Send + Sync {
    fn read_u8(&self, cell: &str) -> Result<Option<u8>>;
}

/// Fixed cell contents, for simulation and tests
#[derive(Debug, Default, Clone)]
pub struct StaticStore {
    cells: HashMap<String, u8>,
    failure: Option<String>,
}

impl StaticStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(mut self, cell: impl Into<String>, value: u8) -> Self {
        self.cells.insert(cell.into(), value);
        self
    }

    /// Make every read fail with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            cells: HashMap::new(),
            failure: Some(reason.into()),
        }
    }
}

impl CalibrationStore for StaticStore {
    fn read_u8(&self, cell: &str) -> Result<Option<u8>> {
        if let Some(reason) = &self.failure {
            return Err(RailError::CalibrationReadError {
                cell: cell.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.cells.get(cell).copied())
    }
}

/// Reads cells from a Linux nvmem device file
///
/// Each known cell maps to a byte offset within the device. Cells without a
/// mapping, and offsets past the end of the device, are unprovisioned.
#[derive(Debug, Clone)]
pub struct NvmemFileStore {
    path: PathBuf,
    offsets: HashMap<String, u64>,
}

impl NvmemFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offsets: HashMap::new(),
        }
    }

    pub fn with_cell(mut self, cell: impl Into<String>, offset: u64) -> Self {
        self.offsets.insert(cell.into(), offset);
        self
    }

    fn read_at(&self, cell: &str, offset: u64) -> Result<Option<u8>> {
        let fail = |e: std::io::Error| RailError::CalibrationReadError {
            cell: cell.to_string(),
            reason: format!("{}: {}", self.path.display(), e),
        };

        let mut file = File::open(&self.path).map_err(fail)?;
        file.seek(SeekFrom::Start(offset)).map_err(fail)?;

        let mut buffer = [0u8; 1];
        match file.read_exact(&mut buffer) {
            Ok(()) => Ok(Some(buffer[0])),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(fail(e)),
        }
    }
}

impl CalibrationStore for NvmemFileStore {
    fn read_u8(&self, cell: &str) -> Result<Option<u8>> {
        let Some(&offset) = self.offsets.get(cell) else {
            tracing::debug!("No nvmem offset configured for cell {}", cell);
            return Ok(None);
        };

        let value = self.read_at(cell, offset)?;
        tracing::debug!(
            "nvmem read: {} cell {} @0x{:x} = {:?}",
            self.path.display(),
            cell,
            offset,
            value
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_nvmem(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "railctl-nvmem-{}-{}",
            std::process::id(),
            name
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_static_store() {
        let store = StaticStore::new().with_cell("bg_trim", 0x1C);
        assert_eq!(store.read_u8("bg_trim").unwrap(), Some(0x1C));
        assert_eq!(store.read_u8("other").unwrap(), None);

        let store = StaticStore::failing("EIO");
        assert!(matches!(
            store.read_u8("bg_trim"),
            Err(RailError::CalibrationReadError { .. })
        ));
    }

    #[test]
    fn test_file_store_reads_offset() {
        let path = temp_nvmem("offset", &[0x00, 0x11, 0x22, 0x33]);
        let store = NvmemFileStore::new(&path).with_cell("bg_trim", 2);
        assert_eq!(store.read_u8("bg_trim").unwrap(), Some(0x22));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_file_store_unprovisioned() {
        let path = temp_nvmem("short", &[0x00]);
        let store = NvmemFileStore::new(&path).with_cell("bg_trim", 0x2A);
        assert_eq!(store.read_u8("bg_trim").unwrap(), None);
        assert_eq!(store.read_u8("unknown").unwrap(), None);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_file_store_missing_device() {
        let store = NvmemFileStore::new("/nonexistent/nvmem").with_cell("bg_trim", 0);
        assert!(matches!(
            store.read_u8("bg_trim"),
            Err(RailError::CalibrationReadError { .. })
        ));
    }
}
