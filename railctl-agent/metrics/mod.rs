pub mod rail;

pub use rail::RailMetric;
