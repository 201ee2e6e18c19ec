use std::io;
use thiserror::Error;

use railctl_raw::RawError;

#[derive(Error, Debug)]
pub enum RailError {
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Rail {rail} does not support {operation}")]
    Unsupported {
        rail: String,
        operation: &'static str,
    },

    #[error("Register port operation failed: {0}")]
    PortError(String),

    #[error("Failed to read calibration cell {cell}: {reason}")]
    CalibrationReadError { cell: String, reason: String },

    #[error("Register port unavailable, try again later: {0}")]
    PortUnavailable(String),

    #[error("Calibration already applied for {0}")]
    AlreadyCalibrated(String),

    #[error("Rail set {0} has not been brought up")]
    NotBroughtUp(String),

    #[error("Invalid rail descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Duplicate rail name: {0}")]
    DuplicateRail(String),

    #[error("Unknown rail: {0}")]
    UnknownRail(String),

    #[error("Unknown rail set variant: {0}")]
    UnknownVariant(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),
}

impl RailError {
    /// Bring-up may succeed if retried once the owning bus device is ready
    pub fn is_retryable(&self) -> bool {
        matches!(self, RailError::PortUnavailable(_))
    }
}

impl From<RawError> for RailError {
    fn from(err: RawError) -> Self {
        if err.is_out_of_range() {
            return RailError::OutOfRange(err.to_string());
        }
        match err {
            RawError::DuplicateRail { name } => RailError::DuplicateRail(name.to_string()),
            _ => RailError::InvalidDescriptor(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_error_mapping() {
        let err: RailError = RawError::SelectorOutOfRange {
            selector: 40,
            n_codes: 32,
        }
        .into();
        assert!(matches!(err, RailError::OutOfRange(_)));

        for raw in [
            RawError::VoltageOutOfRange {
                target_uv: 2_100_000,
                min_uv: 1_650_000,
                max_uv: 2_000_000,
            },
            RawError::EmptyWindow {
                min_uv: 1_710_000,
                max_uv: 1_740_000,
            },
            RawError::Overflow { selector: 7 },
        ] {
            assert!(matches!(RailError::from(raw), RailError::OutOfRange(_)));
        }

        let err: RailError = RawError::DuplicateRail { name: "ldoa" }.into();
        assert!(matches!(err, RailError::DuplicateRail(ref n) if n == "ldoa"));

        let err: RailError = RawError::InvalidDescriptor {
            name: "ldoa",
            reason: "ladder step must be non-zero",
        }
        .into();
        assert!(matches!(err, RailError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(RailError::PortUnavailable("syscon".into()).is_retryable());
        assert!(!RailError::PortError("read".into()).is_retryable());
        assert!(!RailError::CalibrationReadError {
            cell: "bg_trim".into(),
            reason: "EIO".into()
        }
        .is_retryable());
    }
}
