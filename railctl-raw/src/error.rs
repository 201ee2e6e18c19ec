//! Errors raised by ladder arithmetic and descriptor validation

pub type Result<T> = std::result::Result<T, RawError>;

/// Errors that can occur without touching hardware
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RawError {
    #[error("Selector {selector} out of range (ladder has {n_codes} codes)")]
    SelectorOutOfRange { selector: u32, n_codes: u32 },

    #[error("Voltage {target_uv} uV out of range ({min_uv}..={max_uv} uV)")]
    VoltageOutOfRange {
        target_uv: u32,
        min_uv: u32,
        max_uv: u32,
    },

    #[error("Voltage window {min_uv}..={max_uv} uV has no ladder entry")]
    EmptyWindow { min_uv: u32, max_uv: u32 },

    #[error("Ladder voltage overflows at selector {selector}")]
    Overflow { selector: u32 },

    #[error("Duplicate rail name {name}")]
    DuplicateRail { name: &'static str },

    #[error("Invalid descriptor {name}: {reason}")]
    InvalidDescriptor {
        name: &'static str,
        reason: &'static str,
    },
}

impl RawError {
    /// True for the arithmetic failures reported as out-of-range to callers
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            RawError::SelectorOutOfRange { .. }
                | RawError::VoltageOutOfRange { .. }
                | RawError::EmptyWindow { .. }
                | RawError::Overflow { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_error_display() {
        let err = RawError::SelectorOutOfRange {
            selector: 8,
            n_codes: 8,
        };
        assert!(err.to_string().contains("Selector 8 out of range"));
        assert!(err.is_out_of_range());

        let err = RawError::InvalidDescriptor {
            name: "aldo",
            reason: "empty ladder",
        };
        assert!(!err.is_out_of_range());
    }
}
