//! # railctl-raw
//!
//! Voltage ladder arithmetic and register definitions for SoC-internal LDO
//! regulators.
//!
//! This crate is hardware-independent: it describes rails declaratively
//! (ladder shape, register offsets, bit positions) and provides the pure
//! arithmetic that maps selector codes to voltages and back. Register access
//! lives in `railctl-agent`.
//!
//! ## Features
//!
//! Select the SoC family via feature flags:
//! - `sun20i` (default) - Allwinner D1 / T113 analog and system LDOs
//!
//! ## Usage
//!
//! ```
//! use railctl_raw::current_soc::system::LDOA;
//!
//! let uv = LDOA.ladder.voltage_of(1)?;
//! assert_eq!(uv, 1_613_333);
//! assert_eq!(LDOA.ladder.selector_for(uv)?, 1);
//! # Ok::<(), railctl_raw::RawError>(())
//! ```

pub mod arch;
pub mod error;
pub mod ladder;
pub mod rail;
pub mod register;

// Re-export for convenience
pub use error::{RawError, Result};
pub use ladder::Ladder;
pub use rail::{Capabilities, Capability, CalibrationSpec, RailDescriptor, RailSetSpec};
pub use register::{BitField, Register, RegisterLayout};

// Export current SoC family based on feature flag
#[cfg(feature = "sun20i")]
pub use arch::sun20i as current_soc;
