//! Analog LDO register definitions for sun20i
//!
//! `aldo` feeds the audio codec and `hpldo` the headphone amplifier. Both
//! share one register with the bandgap trim, which must be programmed from
//! the `bg_trim` eFuse cell before either rail is used.

use crate::ladder::Ladder;
use crate::rail::{CalibrationSpec, RailDescriptor, RailSetSpec};
use crate::register::{bit, genmask, BitField, RegisterLayout};

/// Register offsets within the system control block
pub mod reg {
    /// Analog power control: bandgap trim, LDO selectors and enables
    pub const SUN20I_POWER_REG: u32 = 0x348;
}

/// Bandgap trim field
pub const BG_TRIM: BitField = BitField::new(reg::SUN20I_POWER_REG, genmask(7, 0));

/// Trim programmed when the eFuse is blank; yields a 900 mV bandgap
pub const BG_TRIM_DEFAULT: u8 = 0x19;

pub const ALDO: RailDescriptor = RailDescriptor {
    name: "aldo",
    supply_name: "vdd33",
    match_key: "aldo",
    ladder: Ladder::linear(1_650_000, 50_000, 8),
    vsel: BitField::new(reg::SUN20I_POWER_REG, genmask(14, 12)),
    enable: Some(BitField::new(reg::SUN20I_POWER_REG, bit(31))),
};

pub const HPLDO: RailDescriptor = RailDescriptor {
    name: "hpldo",
    supply_name: "hpldoin",
    match_key: "hpldo",
    ladder: Ladder::linear(1_650_000, 50_000, 8),
    vsel: BitField::new(reg::SUN20I_POWER_REG, genmask(10, 8)),
    enable: Some(BitField::new(reg::SUN20I_POWER_REG, bit(30))),
};

pub static RAILS: [RailDescriptor; 2] = [ALDO, HPLDO];

pub static ANALOG_LDOS: RailSetSpec = RailSetSpec {
    match_key: "allwinner,sun20i-d1-analog-ldos",
    description: "D1 analog LDOs (aldo, hpldo)",
    rails: &RAILS,
    calibration: Some(CalibrationSpec {
        cell: "bg_trim",
        field: BG_TRIM,
        default_trim: BG_TRIM_DEFAULT,
    }),
};

/// Analog power control register layout
///
/// ## Register Format
///
/// | Bits   | Field      | Description                          |
/// |--------|------------|--------------------------------------|
/// | 0-7    | bg_trim    | Bandgap reference trim               |
/// | 8-10   | hpldo_vsel | hpldo voltage selector               |
/// | 11     | reserved   |                                      |
/// | 12-14  | aldo_vsel  | aldo voltage selector                |
/// | 15-29  | reserved   |                                      |
/// | 30     | hpldo_en   | hpldo enable                         |
/// | 31     | aldo_en    | aldo enable                          |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalogPowerControl {
    pub bg_trim: u8,
    pub hpldo_vsel: u8,
    pub aldo_vsel: u8,
    pub hpldo_enable: bool,
    pub aldo_enable: bool,
    /// Bits not covered by the fields above, kept so a write-back is lossless
    pub reserved: u32,
}

impl AnalogPowerControl {
    const KNOWN: u32 = genmask(7, 0) | genmask(10, 8) | genmask(14, 12) | bit(30) | bit(31);
}

impl RegisterLayout for AnalogPowerControl {
    fn to_reg_value(&self) -> u32 {
        let value = BG_TRIM.encode(self.bg_trim as u32)
            | HPLDO.vsel.encode(self.hpldo_vsel as u32)
            | ALDO.vsel.encode(self.aldo_vsel as u32)
            | if self.hpldo_enable { bit(30) } else { 0 }
            | if self.aldo_enable { bit(31) } else { 0 };
        value | (self.reserved & !Self::KNOWN)
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            bg_trim: BG_TRIM.extract(value) as u8,
            hpldo_vsel: HPLDO.vsel.extract(value) as u8,
            aldo_vsel: ALDO.vsel.extract(value) as u8,
            hpldo_enable: value & bit(30) != 0,
            aldo_enable: value & bit(31) != 0,
            reserved: value & !Self::KNOWN,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.hpldo_vsel > 7 {
            return Err("hpldo selector must be <= 7 (3 bits)");
        }
        if self.aldo_vsel > 7 {
            return Err("aldo selector must be <= 7 (3 bits)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_control_decode() {
        let ctrl = AnalogPowerControl::from_reg_value(0xC000_5319);
        assert_eq!(ctrl.bg_trim, 0x19);
        assert_eq!(ctrl.hpldo_vsel, 3);
        assert_eq!(ctrl.aldo_vsel, 5);
        assert!(ctrl.hpldo_enable);
        assert!(ctrl.aldo_enable);
        assert_eq!(ctrl.reserved, 0);
        assert_eq!(ctrl.to_reg_value(), 0xC000_5319);
    }

    #[test]
    fn test_power_control_keeps_reserved_bits() {
        let ctrl = AnalogPowerControl::from_reg_value(0x0001_0800);
        assert_eq!(ctrl.reserved, 0x0001_0800);
        assert_eq!(ctrl.to_reg_value(), 0x0001_0800);
    }

    #[test]
    fn test_power_control_validation() {
        let mut ctrl = AnalogPowerControl::default();
        assert!(ctrl.validate().is_ok());

        ctrl.aldo_vsel = 8;
        assert!(ctrl.validate().is_err());
    }

    #[test]
    fn test_trim_field_disjoint_from_rails() {
        for rail in &RAILS {
            assert!(rail.fields().all(|f| !f.overlaps(&BG_TRIM)));
        }
    }
}
