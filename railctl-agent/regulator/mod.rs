pub mod calibration;
pub mod control;
pub mod rail_set;

pub use calibration::CalibrationHook;
pub use control::{Rail, RailStatus};
pub use rail_set::RailSet;
