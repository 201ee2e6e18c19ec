pub mod rail;

pub use rail::RailMetricExporter;
