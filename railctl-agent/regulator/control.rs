//! Generic bit-field control of a rail through its register port
//!
//! Every operation is at most one read and one write. Writes go through
//! [`RegisterPort::update_bits`], so only the rail's own bits change.

use railctl_raw::{Capability, RailDescriptor};
use serde::Serialize;

use crate::common::RegisterPort;
use crate::error::{RailError, Result};

fn require(desc: &RailDescriptor, capability: Capability) -> Result<()> {
    if desc.supports(capability) {
        Ok(())
    } else {
        Err(RailError::Unsupported {
            rail: desc.name.to_string(),
            operation: capability.name(),
        })
    }
}

/// Program selector `code` into the rail's selector field
pub fn set_selector(port: &dyn RegisterPort, desc: &RailDescriptor, code: u32) -> Result<()> {
    require(desc, Capability::SetVoltage)?;

    let n_codes = desc.ladder.n_codes();
    if code >= n_codes {
        return Err(RailError::OutOfRange(format!(
            "selector {code} for {} (ladder has {n_codes} codes)",
            desc.name
        )));
    }

    port.update_bits(desc.vsel.offset, desc.vsel.mask, desc.vsel.encode(code))?;
    tracing::debug!("{}: selector set to {}", desc.name, code);
    Ok(())
}

/// Read back the rail's current selector
pub fn get_selector(port: &dyn RegisterPort, desc: &RailDescriptor) -> Result<u32> {
    require(desc, Capability::GetVoltage)?;
    let word = port.read(desc.vsel.offset)?;
    Ok(desc.vsel.extract(word))
}

pub fn enable(port: &dyn RegisterPort, desc: &RailDescriptor) -> Result<()> {
    require(desc, Capability::Enable)?;
    let field = enable_field(desc)?;
    port.update_bits(field.offset, field.mask, field.mask)?;
    tracing::info!("{}: enabled", desc.name);
    Ok(())
}

pub fn disable(port: &dyn RegisterPort, desc: &RailDescriptor) -> Result<()> {
    require(desc, Capability::Disable)?;
    let field = enable_field(desc)?;
    port.update_bits(field.offset, field.mask, 0)?;
    tracing::info!("{}: disabled", desc.name);
    Ok(())
}

pub fn is_enabled(port: &dyn RegisterPort, desc: &RailDescriptor) -> Result<bool> {
    require(desc, Capability::IsEnabled)?;
    let field = enable_field(desc)?;
    let word = port.read(field.offset)?;
    Ok(word & field.mask != 0)
}

fn enable_field(desc: &RailDescriptor) -> Result<railctl_raw::BitField> {
    desc.enable.ok_or_else(|| RailError::Unsupported {
        rail: desc.name.to_string(),
        operation: Capability::Enable.name(),
    })
}

/// Snapshot of one rail's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RailStatus {
    pub name: &'static str,
    pub supply: &'static str,
    pub selector: u32,
    /// `None` when the register holds a code outside the ladder
    pub voltage_uv: Option<u32>,
    /// `None` for rails without an enable bit
    pub enabled: Option<bool>,
}

/// A usable rail: a descriptor bound to its rail set's port
#[derive(Clone, Copy)]
pub struct Rail<'a> {
    desc: &'static RailDescriptor,
    port: &'a dyn RegisterPort,
}

impl<'a> Rail<'a> {
    pub(crate) fn new(desc: &'static RailDescriptor, port: &'a dyn RegisterPort) -> Self {
        Self { desc, port }
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    pub fn descriptor(&self) -> &'static RailDescriptor {
        self.desc
    }

    pub fn set_selector(&self, code: u32) -> Result<()> {
        set_selector(self.port, self.desc, code)
    }

    pub fn get_selector(&self) -> Result<u32> {
        get_selector(self.port, self.desc)
    }

    pub fn list_voltage(&self, code: u32) -> Result<u32> {
        Ok(self.desc.ladder.voltage_of(code)?)
    }

    pub fn get_voltage(&self) -> Result<u32> {
        let code = self.get_selector()?;
        self.list_voltage(code)
    }

    /// Program the lowest ladder voltage inside `min_uv..=max_uv`
    ///
    /// Returns the selector written.
    pub fn set_voltage(&self, min_uv: u32, max_uv: u32) -> Result<u32> {
        require(self.desc, Capability::SetVoltage)?;
        let code = self.desc.ladder.selector_for_range(min_uv, max_uv)?;
        self.set_selector(code)?;
        tracing::info!(
            "{}: set to {} uV (selector {})",
            self.desc.name,
            self.desc.ladder.voltage_of(code)?,
            code
        );
        Ok(code)
    }

    pub fn enable(&self) -> Result<()> {
        enable(self.port, self.desc)
    }

    pub fn disable(&self) -> Result<()> {
        disable(self.port, self.desc)
    }

    pub fn is_enabled(&self) -> Result<bool> {
        is_enabled(self.port, self.desc)
    }

    pub fn status(&self) -> Result<RailStatus> {
        let selector = self.get_selector()?;
        let enabled = if self.desc.supports(Capability::IsEnabled) {
            Some(self.is_enabled()?)
        } else {
            None
        };

        Ok(RailStatus {
            name: self.desc.name,
            supply: self.desc.supply_name,
            selector,
            voltage_uv: self.desc.ladder.voltage_of(selector).ok(),
            enabled,
        })
    }
}

impl std::fmt::Debug for Rail<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rail")
            .field("name", &self.desc.name)
            .field("port", &self.port.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MemoryPort;
    use railctl_raw::current_soc::{analog, system};
    use std::sync::Arc;

    #[test]
    fn test_set_then_get_selector() {
        let port = MemoryPort::new("test");
        for code in 0..8 {
            set_selector(&port, &analog::ALDO, code).unwrap();
            assert_eq!(get_selector(&port, &analog::ALDO).unwrap(), code);
        }
        assert_eq!(port.peek(0x348), 7 << 12);
    }

    #[test]
    fn test_set_selector_out_of_range() {
        let port = MemoryPort::with_words("test", &[(0x150, 0x1234)]);
        assert!(matches!(
            set_selector(&port, &system::LDOA, 32),
            Err(RailError::OutOfRange(_))
        ));
        // Field is 8 bits wide, but only 32 codes exist
        assert!(set_selector(&port, &system::LDOA, 0xFF).is_err());
        assert_eq!(port.peek(0x150), 0x1234);
    }

    #[test]
    fn test_enable_on_always_on_rail_is_unsupported() {
        let port = MemoryPort::new("test");
        for desc in [&system::LDOA, &system::LDOB] {
            assert!(matches!(
                enable(&port, desc),
                Err(RailError::Unsupported { .. })
            ));
            assert!(matches!(
                disable(&port, desc),
                Err(RailError::Unsupported { .. })
            ));
            assert!(matches!(
                is_enabled(&port, desc),
                Err(RailError::Unsupported { .. })
            ));
        }
        assert_eq!(port.peek(0x150), 0);
    }

    #[test]
    fn test_enable_disable_touch_only_enable_bit() {
        let port = MemoryPort::with_words("test", &[(0x348, 0x0000_5319)]);

        enable(&port, &analog::HPLDO).unwrap();
        assert_eq!(port.peek(0x348), 0x4000_5319);
        assert!(is_enabled(&port, &analog::HPLDO).unwrap());
        assert!(!is_enabled(&port, &analog::ALDO).unwrap());

        enable(&port, &analog::ALDO).unwrap();
        disable(&port, &analog::HPLDO).unwrap();
        assert_eq!(port.peek(0x348), 0x8000_5319);
    }

    #[test]
    fn test_disjoint_fields_in_same_register() {
        let port = MemoryPort::with_words("test", &[(0x348, 0xC000_0019)]);

        set_selector(&port, &analog::ALDO, 5).unwrap();
        let before = port.peek(0x348) & !analog::ALDO.vsel.mask;

        set_selector(&port, &analog::ALDO, 2).unwrap();
        assert_eq!(port.peek(0x348) & !analog::ALDO.vsel.mask, before);

        set_selector(&port, &analog::HPLDO, 6).unwrap();
        assert_eq!(get_selector(&port, &analog::ALDO).unwrap(), 2);
        assert_eq!(port.peek(0x348) & 0xFF, 0x19);
        assert_eq!(port.peek(0x348) & 0xC000_0000, 0xC000_0000);
    }

    #[test]
    fn test_concurrent_updates_on_shared_word() {
        let port = Arc::new(MemoryPort::new("test"));

        let handles: Vec<_> = [&system::LDOA, &system::LDOB]
            .into_iter()
            .map(|desc| {
                let port = Arc::clone(&port);
                std::thread::spawn(move || {
                    for i in 0..1000u32 {
                        let code = i % desc.ladder.n_codes();
                        set_selector(port.as_ref(), desc, code).unwrap();
                    }
                    set_selector(port.as_ref(), desc, desc.ladder.n_codes() - 1).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(get_selector(port.as_ref(), &system::LDOA).unwrap(), 31);
        assert_eq!(get_selector(port.as_ref(), &system::LDOB).unwrap(), 63);
    }

    #[test]
    fn test_port_error_propagates() {
        let port = MemoryPort::new("test");
        port.inject_fault(0x150);
        assert!(matches!(
            get_selector(&port, &system::LDOB),
            Err(RailError::PortError(_))
        ));
        assert!(matches!(
            set_selector(&port, &system::LDOB, 1),
            Err(RailError::PortError(_))
        ));
    }

    #[test]
    fn test_rail_voltage_helpers() {
        let port = MemoryPort::new("test");
        let rail = Rail::new(&system::LDOA, &port);

        assert_eq!(rail.set_voltage(1_620_000, 1_650_000).unwrap(), 2);
        assert_eq!(rail.get_voltage().unwrap(), 1_626_667);
        assert!(matches!(
            rail.set_voltage(2_100_000, 2_200_000),
            Err(RailError::OutOfRange(_))
        ));

        let status = rail.status().unwrap();
        assert_eq!(status.selector, 2);
        assert_eq!(status.voltage_uv, Some(1_626_667));
        assert_eq!(status.enabled, None);
    }

    #[test]
    fn test_status_with_code_outside_ladder() {
        // ldoa's field holds 8 bits, the ladder only 32 codes
        let port = MemoryPort::with_words("test", &[(0x150, 0x0000_00F0)]);
        let rail = Rail::new(&system::LDOA, &port);
        assert!(matches!(rail.get_voltage(), Err(RailError::OutOfRange(_))));
        assert_eq!(rail.status().unwrap().voltage_uv, None);
    }
}
