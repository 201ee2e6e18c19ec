//! System LDO register definitions for sun20i
//!
//! `ldoa` and `ldob` are always on once `ldo-in` is up; software only picks
//! the output level. Their ladders step in 40/3 mV, so both use
//! [`Ladder::Fractional`].

use crate::ladder::Ladder;
use crate::rail::{RailDescriptor, RailSetSpec};
use crate::register::{genmask, BitField, RegisterLayout};

/// Register offsets within the system control block
pub mod reg {
    /// System LDO control: ldoa and ldob selectors
    pub const SUN20I_SYS_LDO_CTRL_REG: u32 = 0x150;
}

pub const LDOA: RailDescriptor = RailDescriptor {
    name: "ldoa",
    supply_name: "ldo-in",
    match_key: "ldoa",
    ladder: Ladder::fractional(1_600_000, 13_333, 32),
    vsel: BitField::new(reg::SUN20I_SYS_LDO_CTRL_REG, genmask(7, 0)),
    enable: None,
};

pub const LDOB: RailDescriptor = RailDescriptor {
    name: "ldob",
    supply_name: "ldo-in",
    match_key: "ldob",
    ladder: Ladder::fractional(1_166_666, 13_333, 64),
    vsel: BitField::new(reg::SUN20I_SYS_LDO_CTRL_REG, genmask(15, 8)),
    enable: None,
};

pub static RAILS: [RailDescriptor; 2] = [LDOA, LDOB];

pub static SYSTEM_LDOS: RailSetSpec = RailSetSpec {
    match_key: "allwinner,sun20i-d1-system-ldos",
    description: "D1 system LDOs (ldoa, ldob)",
    rails: &RAILS,
    calibration: None,
};

/// System LDO control register layout
///
/// | Bits   | Field     | Description             |
/// |--------|-----------|-------------------------|
/// | 0-7    | ldoa_vsel | ldoa voltage selector   |
/// | 8-15   | ldob_vsel | ldob voltage selector   |
/// | 16-31  | reserved  |                         |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemLdoControl {
    pub ldoa_vsel: u8,
    pub ldob_vsel: u8,
    pub reserved: u32,
}

impl RegisterLayout for SystemLdoControl {
    fn to_reg_value(&self) -> u32 {
        LDOA.vsel.encode(self.ldoa_vsel as u32)
            | LDOB.vsel.encode(self.ldob_vsel as u32)
            | (self.reserved & !genmask(15, 0))
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            ldoa_vsel: LDOA.vsel.extract(value) as u8,
            ldob_vsel: LDOB.vsel.extract(value) as u8,
            reserved: value & !genmask(15, 0),
        }
    }

    /// The selector fields are 8 bits wide but only the low codes exist
    fn validate(&self) -> Result<(), &'static str> {
        if u32::from(self.ldoa_vsel) >= LDOA.ladder.n_codes() {
            return Err("ldoa selector must be < 32");
        }
        if u32::from(self.ldob_vsel) >= LDOB.ladder.n_codes() {
            return Err("ldob selector must be < 64");
        }
        Ok(())
    }
}
