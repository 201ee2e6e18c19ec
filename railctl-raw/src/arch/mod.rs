//! SoC-specific rail and register definitions
//!
//! Each SoC family places its internal regulators at different register
//! offsets with different ladders. This module provides the definitions
//! organized by SoC family.
//!
//! ## Supported Families
//!
//! - **Allwinner sun20i** (`sun20i` feature) - D1 / T113 analog and system LDOs

#[cfg(feature = "sun20i")]
pub mod sun20i;
