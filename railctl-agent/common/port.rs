//! Register access ports
//!
//! A [`RegisterPort`] is the one shared, mutable resource: a 32-bit register
//! space addressed by byte offset. Ports serialize their own transactions,
//! and [`RegisterPort::update_bits`] is a single locked read-modify-write so
//! callers touching disjoint bits of one word never lose each other's
//! updates.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{RailError, Result};

pub trait RegisterPort: Send + Sync {
    fn name(&self) -> &str;

    fn read(&self, offset: u32) -> Result<u32>;

    fn write(&self, offset: u32, value: u32) -> Result<()>;

    /// Replace the bits selected by `mask` with the same bits of `value`
    fn update_bits(&self, offset: u32, mask: u32, value: u32) -> Result<()>;
}

/// A source the port can be obtained from, tried in order by [`acquire_port`]
pub trait PortProvider {
    fn name(&self) -> &str;

    /// `Ok(None)` means this source is not ready or not present
    fn try_port(&self) -> Result<Option<Arc<dyn RegisterPort>>>;
}

/// Obtain a port from the first provider that yields one
///
/// If every provider declines, the owning device is not up yet and the
/// caller should retry bring-up later ([`RailError::PortUnavailable`]).
/// Hard failures from a provider are returned as-is.
pub fn acquire_port(providers: &[&dyn PortProvider]) -> Result<Arc<dyn RegisterPort>> {
    for provider in providers {
        match provider.try_port()? {
            Some(port) => {
                tracing::info!(
                    "Acquired register port {} from {}",
                    port.name(),
                    provider.name()
                );
                return Ok(port);
            }
            None => {
                tracing::warn!("Register port provider {} not ready", provider.name());
            }
        }
    }

    let tried: Vec<&str> = providers.iter().map(|p| p.name()).collect();
    Err(RailError::PortUnavailable(format!(
        "no provider ready (tried: {})",
        tried.join(", ")
    )))
}

#[derive(Default)]
struct MemoryState {
    words: HashMap<u32, u32>,
    faults: HashSet<u32>,
}

/// In-process register file
///
/// Unwritten offsets read as zero. Offsets marked with
/// [`MemoryPort::inject_fault`] fail every access with
/// [`RailError::PortError`].
pub struct MemoryPort {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Create a port with the given initial register contents
    pub fn with_words(name: impl Into<String>, words: &[(u32, u32)]) -> Self {
        let port = Self::new(name);
        port.state.lock().words.extend(words.iter().copied());
        port
    }

    pub fn inject_fault(&self, offset: u32) {
        self.state.lock().faults.insert(offset);
    }

    pub fn clear_fault(&self, offset: u32) {
        self.state.lock().faults.remove(&offset);
    }

    /// Current contents without going through fault injection
    pub fn peek(&self, offset: u32) -> u32 {
        self.state.lock().words.get(&offset).copied().unwrap_or(0)
    }

    fn check(state: &MemoryState, port: &str, offset: u32) -> Result<()> {
        if state.faults.contains(&offset) {
            return Err(RailError::PortError(format!(
                "{port}: access to 0x{offset:03X} failed"
            )));
        }
        Ok(())
    }
}

impl RegisterPort for MemoryPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, offset: u32) -> Result<u32> {
        let state = self.state.lock();
        Self::check(&state, &self.name, offset)?;
        let value = state.words.get(&offset).copied().unwrap_or(0);
        tracing::debug!("{} read: 0x{:03x} = 0x{:08x}", self.name, offset, value);
        Ok(value)
    }

    fn write(&self, offset: u32, value: u32) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, &self.name, offset)?;
        state.words.insert(offset, value);
        tracing::debug!("{} write: 0x{:03x} = 0x{:08x}", self.name, offset, value);
        Ok(())
    }

    fn update_bits(&self, offset: u32, mask: u32, value: u32) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, &self.name, offset)?;
        let word = state.words.entry(offset).or_insert(0);
        let old = *word;
        *word = (old & !mask) | (value & mask);
        tracing::debug!(
            "{} update: 0x{:03x} 0x{:08x} -> 0x{:08x}",
            self.name,
            offset,
            old,
            *word
        );
        Ok(())
    }
}

/// Provider handing out a fixed, already-created port
pub struct StaticProvider {
    name: String,
    port: Option<Arc<dyn RegisterPort>>,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, port: Option<Arc<dyn RegisterPort>>) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

impl PortProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_port(&self) -> Result<Option<Arc<dyn RegisterPort>>> {
        Ok(self.port.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_port_update_bits() {
        let port = MemoryPort::with_words("test", &[(0x10, 0xFFFF_0000)]);
        port.update_bits(0x10, 0x0000_FF00, 0x1234_5678).unwrap();
        assert_eq!(port.read(0x10).unwrap(), 0xFFFF_5600);
        assert_eq!(port.read(0x20).unwrap(), 0);
    }

    #[test]
    fn test_memory_port_fault() {
        let port = MemoryPort::new("test");
        port.inject_fault(0x10);
        assert!(matches!(port.read(0x10), Err(RailError::PortError(_))));
        assert!(matches!(
            port.update_bits(0x10, 1, 1),
            Err(RailError::PortError(_))
        ));
        port.clear_fault(0x10);
        assert!(port.write(0x10, 7).is_ok());
        assert_eq!(port.peek(0x10), 7);
    }

    #[test]
    fn test_acquire_falls_back() {
        let absent = StaticProvider::new("syscon", None);
        let present = StaticProvider::new(
            "parent",
            Some(Arc::new(MemoryPort::new("parent-regs")) as Arc<dyn RegisterPort>),
        );

        let port = acquire_port(&[&absent, &present]).unwrap();
        assert_eq!(port.name(), "parent-regs");
    }

    #[test]
    fn test_acquire_defers_when_nothing_ready() {
        let a = StaticProvider::new("syscon", None);
        let b = StaticProvider::new("parent", None);

        let err = acquire_port(&[&a, &b]).err().unwrap();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("syscon, parent"));
    }
}
