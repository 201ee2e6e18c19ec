//! Rail descriptors and rail set definitions
//!
//! A [`RailDescriptor`] is immutable, statically defined metadata for one
//! power rail: its ladder, where its selector lives and, optionally, where
//! its enable bit lives. The operations a rail supports are derived from the
//! fields present, see [`RailDescriptor::capabilities`].

use crate::error::{RawError, Result};
use crate::ladder::Ladder;
use crate::register::BitField;

/// Operations a rail may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SetVoltage,
    GetVoltage,
    Enable,
    Disable,
    IsEnabled,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::SetVoltage => "set-voltage",
            Capability::GetVoltage => "get-voltage",
            Capability::Enable => "enable",
            Capability::Disable => "disable",
            Capability::IsEnabled => "is-enabled",
        }
    }

    pub fn all() -> Vec<Capability> {
        vec![
            Capability::SetVoltage,
            Capability::GetVoltage,
            Capability::Enable,
            Capability::Disable,
            Capability::IsEnabled,
        ]
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Set of [`Capability`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub const fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::all()
            .into_iter()
            .filter(move |c| self.contains(*c))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|c| c.name()).collect()
    }
}

/// Static description of one power rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailDescriptor {
    /// Rail name, unique within its set
    pub name: &'static str,
    /// Name of the parent supply feeding this rail
    pub supply_name: &'static str,
    /// Key used by the discovery layer to bind board configuration
    pub match_key: &'static str,
    pub ladder: Ladder,
    /// Where the selector code is stored
    pub vsel: BitField,
    /// Software enable bit, absent for always-on rails
    pub enable: Option<BitField>,
}

impl RailDescriptor {
    /// Operations supported by this rail, derived from its fields
    pub const fn capabilities(&self) -> Capabilities {
        let caps = Capabilities::empty()
            .with(Capability::SetVoltage)
            .with(Capability::GetVoltage);

        match self.enable {
            Some(_) => caps
                .with(Capability::Enable)
                .with(Capability::Disable)
                .with(Capability::IsEnabled),
            None => caps,
        }
    }

    pub const fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// Check the descriptor's internal consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason| {
            Err(RawError::InvalidDescriptor {
                name: self.name,
                reason,
            })
        };

        if self.name.is_empty() {
            return invalid("empty rail name");
        }
        if self.ladder.n_codes() == 0 {
            return invalid("ladder has no selector codes");
        }
        if self.ladder.step_uv() == 0 {
            return invalid("ladder step must be non-zero");
        }
        if !self.vsel.is_contiguous() {
            return invalid("selector mask must be non-empty and contiguous");
        }
        if u64::from(self.ladder.n_codes()) > self.vsel.capacity() {
            return invalid("selector mask too narrow for ladder");
        }
        if let Some(enable) = self.enable {
            if enable.mask.count_ones() != 1 {
                return invalid("enable mask must be a single bit");
            }
            if enable.overlaps(&self.vsel) {
                return invalid("enable bit overlaps selector field");
            }
        }
        if self.ladder.max_uv().is_err() {
            return invalid("ladder maximum overflows");
        }

        Ok(())
    }

    /// Register fields owned by this rail
    pub fn fields(&self) -> impl Iterator<Item = BitField> {
        std::iter::once(self.vsel).chain(self.enable)
    }
}

/// Calibration step run once before any rail of a set is used
///
/// A trim byte is read from the named non-volatile cell and programmed into
/// `field`. Unprovisioned cells (absent or reading as zero) are replaced by
/// `default_trim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSpec {
    /// Non-volatile cell holding the trim
    pub cell: &'static str,
    pub field: BitField,
    pub default_trim: u8,
}

/// A fixed collection of rails sharing one register port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailSetSpec {
    /// Key the discovery layer matches against
    pub match_key: &'static str,
    pub description: &'static str,
    pub rails: &'static [RailDescriptor],
    pub calibration: Option<CalibrationSpec>,
}

impl RailSetSpec {
    pub fn rail(&self, name: &str) -> Option<&'static RailDescriptor> {
        self.rails.iter().find(|rail| rail.name == name)
    }

    /// Validate every rail, then cross-rail constraints
    ///
    /// Names must be unique and no two rails may claim the same bits.
    pub fn validate(&self) -> Result<()> {
        for rail in self.rails {
            rail.validate()?;
        }

        for (i, a) in self.rails.iter().enumerate() {
            for b in &self.rails[i + 1..] {
                if a.name == b.name {
                    return Err(RawError::DuplicateRail { name: b.name });
                }
                if a.fields().any(|fa| b.fields().any(|fb| fa.overlaps(&fb))) {
                    return Err(RawError::InvalidDescriptor {
                        name: b.name,
                        reason: "register field overlaps another rail",
                    });
                }
            }
        }

        if let Some(cal) = &self.calibration {
            if !cal.field.is_contiguous() || cal.field.max_value() < u32::from(cal.default_trim) {
                return Err(RawError::InvalidDescriptor {
                    name: cal.cell,
                    reason: "calibration field cannot hold trim",
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{bit, genmask};

    const fn rail(name: &'static str, vsel: u32, enable: Option<u32>) -> RailDescriptor {
        RailDescriptor {
            name,
            supply_name: "vin",
            match_key: name,
            ladder: Ladder::linear(1_000_000, 25_000, 8),
            vsel: BitField::new(0x10, vsel),
            enable: match enable {
                Some(mask) => Some(BitField::new(0x10, mask)),
                None => None,
            },
        }
    }

    #[test]
    fn test_capabilities_derived_from_fields() {
        let switchable = rail("a", genmask(2, 0), Some(bit(31)));
        assert!(switchable.supports(Capability::Enable));
        assert!(switchable.supports(Capability::IsEnabled));
        assert_eq!(switchable.capabilities().iter().count(), 5);

        let always_on = rail("b", genmask(2, 0), None);
        assert!(always_on.supports(Capability::SetVoltage));
        assert!(always_on.supports(Capability::GetVoltage));
        assert!(!always_on.supports(Capability::Enable));
        assert!(!always_on.supports(Capability::Disable));
        assert_eq!(always_on.capabilities().names(), vec!["set-voltage", "get-voltage"]);
    }

    #[test]
    fn test_validate_accepts_good_rail() {
        assert!(rail("a", genmask(2, 0), Some(bit(31))).validate().is_ok());
        assert!(rail("a", genmask(7, 0), None).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_narrow_mask() {
        // 8 codes need 3 bits
        let err = rail("a", genmask(1, 0), None).validate().unwrap_err();
        assert_eq!(
            err,
            RawError::InvalidDescriptor {
                name: "a",
                reason: "selector mask too narrow for ladder"
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_enable() {
        assert!(rail("a", genmask(2, 0), Some(genmask(31, 30)))
            .validate()
            .is_err());
        assert!(rail("a", genmask(2, 0), Some(bit(1))).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_sparse_mask() {
        assert!(rail("a", 0b1011, None).validate().is_err());
    }

    #[test]
    fn test_set_rejects_duplicate_names() {
        static RAILS: [RailDescriptor; 2] = [
            rail("dup", genmask(2, 0), None),
            rail("dup", genmask(6, 4), None),
        ];
        let set = RailSetSpec {
            match_key: "test",
            description: "",
            rails: &RAILS,
            calibration: None,
        };
        assert_eq!(
            set.validate(),
            Err(RawError::DuplicateRail { name: "dup" })
        );
    }

    #[test]
    fn test_set_rejects_overlapping_fields() {
        static RAILS: [RailDescriptor; 2] = [
            rail("a", genmask(2, 0), Some(bit(31))),
            rail("b", genmask(4, 2), None),
        ];
        let set = RailSetSpec {
            match_key: "test",
            description: "",
            rails: &RAILS,
            calibration: None,
        };
        assert!(set.validate().is_err());
        assert!(set.rail("b").is_some());
        assert!(set.rail("c").is_none());
    }
}
