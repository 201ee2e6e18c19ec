// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prom;
pub mod regulator;

pub use config::{PortSource, RailctlConfig, TrimSource};
pub use error::{RailError, Result};
pub use prom::RailMetricExporter;
pub use regulator::{CalibrationHook, Rail, RailSet, RailStatus};
