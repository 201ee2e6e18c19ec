//! Allwinner sun20i (D1 / T113) internal LDO definitions
//!
//! The D1 exposes two groups of regulators inside its system control block:
//!
//! - **Analog LDOs** (`aldo`, `hpldo`) - 50 mV integer ladders with enable
//!   bits, sharing the power register at `0x348` with the bandgap trim.
//! - **System LDOs** (`ldoa`, `ldob`) - 40/3 mV fractional ladders, always
//!   on, sharing the control register at `0x150`.
//!
//! ## References
//!
//! - Allwinner D1-H User Manual, System Configuration chapter

pub mod analog;
pub mod system;

use crate::rail::RailSetSpec;

/// Physical base of the system control block holding both register groups
pub const SYSCON_BASE: u64 = 0x0300_0000;

/// Size of the register window that covers every offset used here
pub const SYSCON_WINDOW: usize = 0x1000;

/// Every rail set variant of this family, keyed by match key
pub static VARIANTS: [&RailSetSpec; 2] = [&analog::ANALOG_LDOS, &system::SYSTEM_LDOS];

/// Look up a rail set variant by its match key
pub fn lookup(match_key: &str) -> Option<&'static RailSetSpec> {
    VARIANTS
        .iter()
        .copied()
        .find(|spec| spec.match_key == match_key)
}
