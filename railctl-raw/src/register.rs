//! Generic register abstractions for bit-field and typed register programming

/// Build a contiguous mask covering bits `low..=high` (inclusive)
///
/// `genmask(14, 12)` is `0x7000`.
pub const fn genmask(high: u32, low: u32) -> u32 {
    (u32::MAX >> (31 - high)) & (u32::MAX << low)
}

/// Single-bit mask
pub const fn bit(n: u32) -> u32 {
    1 << n
}

/// A contiguous group of bits inside one 32-bit register
///
/// A field is addressed by the register offset within the port's address
/// space and a mask selecting its bits. Values are stored right-aligned, so
/// a field with mask `0x7000` holds values `0..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitField {
    /// Register offset in bytes
    pub offset: u32,
    /// Bits owned by this field
    pub mask: u32,
}

impl BitField {
    pub const fn new(offset: u32, mask: u32) -> Self {
        Self { offset, mask }
    }

    /// Position of the lowest bit of the field
    pub const fn shift(&self) -> u32 {
        self.mask.trailing_zeros()
    }

    /// Largest value the field can hold
    pub const fn max_value(&self) -> u32 {
        if self.mask == 0 {
            0
        } else {
            self.mask >> self.shift()
        }
    }

    /// Number of distinct values the field can hold
    pub const fn capacity(&self) -> u64 {
        self.max_value() as u64 + 1
    }

    /// True when the mask is non-zero and has no holes
    pub const fn is_contiguous(&self) -> bool {
        if self.mask == 0 {
            return false;
        }
        let normalized = self.mask >> self.shift();
        normalized & (normalized.wrapping_add(1)) == 0
    }

    /// True when both fields live in the same register and share a bit
    pub const fn overlaps(&self, other: &BitField) -> bool {
        self.offset == other.offset && (self.mask & other.mask) != 0
    }

    /// Extract this field's value from a full register word
    pub const fn extract(&self, word: u32) -> u32 {
        if self.mask == 0 {
            return 0;
        }
        (word & self.mask) >> self.shift()
    }

    /// Place `value` into the field's position, masked to its width
    pub const fn encode(&self, value: u32) -> u32 {
        if self.mask == 0 {
            return 0;
        }
        (value << self.shift()) & self.mask
    }
}

/// Trait for register layouts that can be converted to/from raw register words
///
/// This trait provides type-safe conversion between structured register
/// layouts and the raw 32-bit values read from or written to a register port.
///
/// # Example
///
/// ```
/// use railctl_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct MyControl {
///     enable: bool,
///     level: u8,
/// }
///
/// impl RegisterLayout for MyControl {
///     fn to_reg_value(&self) -> u32 {
///         (self.enable as u32) | ((self.level as u32) << 8)
///     }
///
///     fn from_reg_value(value: u32) -> Self {
///         Self {
///             enable: (value & 1) != 0,
///             level: ((value >> 8) & 0xFF) as u8,
///         }
///     }
/// }
///
/// let ctrl = MyControl::from_reg_value(0x0301);
/// assert!(ctrl.enable);
/// assert_eq!(ctrl.level, 3);
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw register value
    fn to_reg_value(&self) -> u32;

    /// Parse a raw register value into this register layout
    fn from_reg_value(value: u32) -> Self;

    /// Validate that the register values are within acceptable ranges
    ///
    /// Returns `Ok(())` if valid, or an error message if invalid.
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

/// A hardware register with offset and typed layout
#[derive(Debug, Clone, Copy)]
pub struct Register<T: RegisterLayout> {
    /// Offset within the register port
    pub offset: u32,
    /// Typed register layout
    pub layout: T,
}

impl<T: RegisterLayout> Register<T> {
    /// Create a new register with the given offset and layout
    pub fn new(offset: u32, layout: T) -> Self {
        Self { offset, layout }
    }

    /// Create a register with default layout
    pub fn with_offset(offset: u32) -> Self
    where
        T: Default,
    {
        Self {
            offset,
            layout: T::default(),
        }
    }

    /// Validate the register layout
    pub fn validate(&self) -> Result<(), &'static str> {
        self.layout.validate()
    }

    /// Get the raw value for this register
    pub fn to_reg_value(&self) -> u32 {
        self.layout.to_reg_value()
    }

    /// Update the layout from a raw register value
    pub fn from_reg_value(&mut self, value: u32) {
        self.layout = T::from_reg_value(value);
    }
}
