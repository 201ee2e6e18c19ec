//! Voltage ladders: selector code <-> microvolt arithmetic
//!
//! A ladder maps each selector code in `[0, n_codes)` to an output voltage.
//! Two shapes exist:
//!
//! - [`Ladder::Linear`]: `min_uv + step_uv * code`, exact.
//! - [`Ladder::Fractional`]: the true step is a multiple of 1/3 uV, so
//!   `step_uv` only stores its truncated integer part. Each code gets a
//!   correction of `(code + 1 + min_uv % 4) / 3` uV, which yields the
//!   correctly rounded absolute voltage of the true ladder.
//!
//! All arithmetic is integer-only so results are identical on every target.

use crate::error::{RawError, Result};

/// Shape of a rail's voltage ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ladder {
    /// Integer step, exact
    Linear {
        min_uv: u32,
        step_uv: u32,
        n_codes: u32,
    },
    /// Step with a repeating-decimal denominator of 3
    Fractional {
        min_uv: u32,
        step_uv: u32,
        n_codes: u32,
    },
}

impl Ladder {
    pub const fn linear(min_uv: u32, step_uv: u32, n_codes: u32) -> Self {
        Ladder::Linear {
            min_uv,
            step_uv,
            n_codes,
        }
    }

    pub const fn fractional(min_uv: u32, step_uv: u32, n_codes: u32) -> Self {
        Ladder::Fractional {
            min_uv,
            step_uv,
            n_codes,
        }
    }

    pub const fn min_uv(&self) -> u32 {
        match *self {
            Ladder::Linear { min_uv, .. } | Ladder::Fractional { min_uv, .. } => min_uv,
        }
    }

    pub const fn step_uv(&self) -> u32 {
        match *self {
            Ladder::Linear { step_uv, .. } | Ladder::Fractional { step_uv, .. } => step_uv,
        }
    }

    pub const fn n_codes(&self) -> u32 {
        match *self {
            Ladder::Linear { n_codes, .. } | Ladder::Fractional { n_codes, .. } => n_codes,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ladder::Linear { .. } => "linear",
            Ladder::Fractional { .. } => "fractional",
        }
    }

    /// Output voltage in microvolts for `selector`
    ///
    /// # Errors
    ///
    /// [`RawError::SelectorOutOfRange`] when `selector >= n_codes`, and
    /// [`RawError::Overflow`] when the voltage does not fit in `u32`.
    pub fn voltage_of(&self, selector: u32) -> Result<u32> {
        let n_codes = self.n_codes();
        if selector >= n_codes {
            return Err(RawError::SelectorOutOfRange { selector, n_codes });
        }

        let min_uv = u64::from(self.min_uv());
        let naive = min_uv + u64::from(self.step_uv()) * u64::from(selector);

        let uv = match self {
            Ladder::Linear { .. } => naive,
            // Produce correctly-rounded absolute voltages
            Ladder::Fractional { .. } => naive + (u64::from(selector) + 1 + min_uv % 4) / 3,
        };

        u32::try_from(uv).map_err(|_| RawError::Overflow { selector })
    }

    /// Highest voltage on the ladder
    pub fn max_uv(&self) -> Result<u32> {
        self.voltage_of(self.n_codes().saturating_sub(1))
    }

    /// Smallest selector whose voltage is at or above `target_uv`
    ///
    /// Targets below the ladder minimum map to selector 0.
    ///
    /// # Errors
    ///
    /// [`RawError::VoltageOutOfRange`] when `target_uv` exceeds the ladder
    /// maximum.
    pub fn selector_for(&self, target_uv: u32) -> Result<u32> {
        let n_codes = self.n_codes();
        let (mut lo, mut hi) = (0u32, n_codes);

        // Ladders are strictly increasing, so a lower-bound search suffices
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.voltage_of(mid)? < target_uv {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        if lo == n_codes {
            return Err(RawError::VoltageOutOfRange {
                target_uv,
                min_uv: self.min_uv(),
                max_uv: self.max_uv()?,
            });
        }

        Ok(lo)
    }

    /// Smallest selector whose voltage falls inside `min_uv..=max_uv`
    pub fn selector_for_range(&self, min_uv: u32, max_uv: u32) -> Result<u32> {
        if min_uv > max_uv {
            return Err(RawError::EmptyWindow { min_uv, max_uv });
        }

        let selector = self.selector_for(min_uv)?;
        if self.voltage_of(selector)? > max_uv {
            return Err(RawError::EmptyWindow { min_uv, max_uv });
        }

        Ok(selector)
    }

    /// Every `(selector, voltage)` pair in ascending selector order
    pub fn voltages(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.n_codes()).filter_map(move |sel| self.voltage_of(sel).ok().map(|uv| (sel, uv)))
    }
}
