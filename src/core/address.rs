//! Integer and hex-tuple addressing of tile positions and tile variants.
//!
//! A tile position is the tuple `(version, path, step)`; a tile variant adds
//! a `value` (0 is the reference variant). Each field has a configured number
//! of hex digits and the integer form is the hex concatenation
//! `version | path | step [| value]`, so integer order equals tuple order.
//!
//! ```
//! use tile_library::core::address::{AddressCodec, AddressConfig, TilePosition};
//!
//! let codec = AddressCodec::new(AddressConfig::default()).unwrap();
//! let position = TilePosition::new(0, 0x2c5, 0x1a);
//! let encoded = codec.encode_position(position).unwrap();
//! assert_eq!(encoded, 0x0_2c5_001a);
//! assert_eq!(codec.decode_position(encoded).unwrap(), position);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("{field} value {value:#x} does not fit in {digits} hex digits")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        digits: u32,
    },

    #[error("Integer {value:#x} is too large to decode with {digits} hex digits")]
    IntegerTooLarge { value: u64, digits: u32 },

    #[error("Malformed tile token '{token}': {reason}")]
    MalformedToken { token: String, reason: String },

    #[error("Invalid address configuration: {0}")]
    InvalidConfig(String),
}

/// Number of hex digits used for each address field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    pub path_digits: u32,
    pub version_digits: u32,
    pub step_digits: u32,
    pub variant_digits: u32,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            path_digits: 3,
            version_digits: 2,
            step_digits: 4,
            variant_digits: 3,
        }
    }
}

/// Largest digit count for a single field (fields are `u32`)
const MAX_FIELD_DIGITS: u32 = 8;

/// Largest total digit count (the integer form is a `u64`)
const MAX_TOTAL_DIGITS: u32 = 16;

impl AddressConfig {
    /// Check that every field has between 1 and 8 digits and the full
    /// variant address fits in a `u64`.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::InvalidConfig` describing the offending width.
    pub fn validate(&self) -> Result<(), AddressError> {
        let fields = [
            ("path", self.path_digits),
            ("version", self.version_digits),
            ("step", self.step_digits),
            ("variant", self.variant_digits),
        ];
        for (name, digits) in fields {
            if digits == 0 || digits > MAX_FIELD_DIGITS {
                return Err(AddressError::InvalidConfig(format!(
                    "{name} width must be between 1 and {MAX_FIELD_DIGITS} hex digits, got {digits}"
                )));
            }
        }
        if self.variant_address_digits() > MAX_TOTAL_DIGITS {
            return Err(AddressError::InvalidConfig(format!(
                "total width {} exceeds {MAX_TOTAL_DIGITS} hex digits",
                self.variant_address_digits()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn position_address_digits(&self) -> u32 {
        self.version_digits + self.path_digits + self.step_digits
    }

    #[must_use]
    pub fn variant_address_digits(&self) -> u32 {
        self.position_address_digits() + self.variant_digits
    }

    /// Largest value representable in the given number of hex digits
    #[must_use]
    pub fn max_value(digits: u32) -> u64 {
        if digits >= MAX_TOTAL_DIGITS {
            u64::MAX
        } else {
            (1u64 << (4 * digits)) - 1
        }
    }
}

/// A node of the tiled genome graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePosition {
    pub version: u32,
    pub path: u32,
    pub step: u32,
}

impl TilePosition {
    #[must_use]
    pub fn new(version: u32, path: u32, step: u32) -> Self {
        Self {
            version,
            path,
            step,
        }
    }

    /// The position `k` steps earlier in the same path, if any
    #[must_use]
    pub fn step_back(self, k: u32) -> Option<Self> {
        self.step.checked_sub(k).map(|step| Self { step, ..self })
    }

    /// The position `k` steps later in the same path
    #[must_use]
    pub fn step_forward(self, k: u32) -> Option<Self> {
        self.step.checked_add(k).map(|step| Self { step, ..self })
    }

    /// The reference variant at this position
    #[must_use]
    pub fn reference_variant(self) -> TileVariantId {
        TileVariantId::new(self, 0)
    }
}

/// Displayed in the compact `path.version.step` form with the default widths
///
/// Error messages and log fields use this form whatever widths a library
/// declares. Output meant to be parsed back goes through
/// [`format_position`](crate::core::token::format_position) with the
/// library's [`AddressConfig`].
impl std::fmt::Display for TilePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03x}.{:02x}.{:04x}", self.path, self.version, self.step)
    }
}

/// A concrete sequence observed at a tile position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileVariantId {
    pub position: TilePosition,
    pub value: u32,
}

impl TileVariantId {
    #[must_use]
    pub fn new(position: TilePosition, value: u32) -> Self {
        Self { position, value }
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.value == 0
    }
}

impl std::fmt::Display for TileVariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03x}", self.position, self.value)
    }
}

/// Converts between tuples and their integer form under one [`AddressConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressCodec {
    config: AddressConfig,
}

impl Default for AddressCodec {
    fn default() -> Self {
        Self {
            config: AddressConfig::default(),
        }
    }
}

impl AddressCodec {
    /// # Errors
    ///
    /// Returns `AddressError::InvalidConfig` if the widths are unusable.
    pub fn new(config: AddressConfig) -> Result<Self, AddressError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &AddressConfig {
        &self.config
    }

    fn check_field(field: &'static str, value: u32, digits: u32) -> Result<u64, AddressError> {
        let value = u64::from(value);
        if value > AddressConfig::max_value(digits) {
            return Err(AddressError::FieldOverflow {
                field,
                value,
                digits,
            });
        }
        Ok(value)
    }

    /// Encode `(version, path, step)` into its integer form
    ///
    /// # Errors
    ///
    /// Returns `AddressError::FieldOverflow` if a field exceeds its width.
    pub fn encode_position(&self, position: TilePosition) -> Result<u64, AddressError> {
        let c = &self.config;
        let version = Self::check_field("version", position.version, c.version_digits)?;
        let path = Self::check_field("path", position.path, c.path_digits)?;
        let step = Self::check_field("step", position.step, c.step_digits)?;

        Ok((((version << (4 * c.path_digits)) | path) << (4 * c.step_digits)) | step)
    }

    /// Decode an integer produced by [`encode_position`](Self::encode_position)
    ///
    /// # Errors
    ///
    /// Returns `AddressError::IntegerTooLarge` if `value` has more hex digits
    /// than a position address.
    pub fn decode_position(&self, value: u64) -> Result<TilePosition, AddressError> {
        let c = &self.config;
        let digits = c.position_address_digits();
        if value > AddressConfig::max_value(digits) {
            return Err(AddressError::IntegerTooLarge { value, digits });
        }

        let step = value & AddressConfig::max_value(c.step_digits);
        let rest = value >> (4 * c.step_digits);
        let path = rest & AddressConfig::max_value(c.path_digits);
        let version = rest >> (4 * c.path_digits);

        // Each part is bounded by a width of at most 8 hex digits
        #[allow(clippy::cast_possible_truncation)]
        Ok(TilePosition::new(version as u32, path as u32, step as u32))
    }

    /// Encode a tile variant into its integer form
    ///
    /// # Errors
    ///
    /// Returns `AddressError::FieldOverflow` if a field exceeds its width.
    pub fn encode_variant(&self, id: TileVariantId) -> Result<u64, AddressError> {
        let position = self.encode_position(id.position)?;
        self.variant_for(position, id.value)
    }

    /// Decode an integer produced by [`encode_variant`](Self::encode_variant)
    ///
    /// # Errors
    ///
    /// Returns `AddressError::IntegerTooLarge` if `value` has more hex digits
    /// than a variant address.
    pub fn decode_variant(&self, value: u64) -> Result<TileVariantId, AddressError> {
        let c = &self.config;
        let position = self.position_of(value)?;
        #[allow(clippy::cast_possible_truncation)]
        let variant = (value & AddressConfig::max_value(c.variant_digits)) as u32;
        Ok(TileVariantId::new(self.decode_position(position)?, variant))
    }

    /// Integer position of an integer tile variant
    ///
    /// # Errors
    ///
    /// Returns `AddressError::IntegerTooLarge` if `variant` is out of range.
    pub fn position_of(&self, variant: u64) -> Result<u64, AddressError> {
        let digits = self.config.variant_address_digits();
        if variant > AddressConfig::max_value(digits) {
            return Err(AddressError::IntegerTooLarge {
                value: variant,
                digits,
            });
        }
        Ok(variant >> (4 * self.config.variant_digits))
    }

    /// Integer tile variant with the given `value` at an integer position
    ///
    /// # Errors
    ///
    /// Returns `AddressError::IntegerTooLarge` if `position` is out of range,
    /// or `AddressError::FieldOverflow` if `value` exceeds the variant width.
    pub fn variant_for(&self, position: u64, value: u32) -> Result<u64, AddressError> {
        let c = &self.config;
        let digits = c.position_address_digits();
        if position > AddressConfig::max_value(digits) {
            return Err(AddressError::IntegerTooLarge {
                value: position,
                digits,
            });
        }
        let value = Self::check_field("variant", value, c.variant_digits)?;
        Ok((position << (4 * c.variant_digits)) | value)
    }

    /// Inclusive integer bounds of every position a path can hold
    ///
    /// # Errors
    ///
    /// Returns `AddressError::FieldOverflow` if `version` or `path` are too wide.
    pub fn path_bounds(&self, version: u32, path: u32) -> Result<(u64, u64), AddressError> {
        let first = self.encode_position(TilePosition::new(version, path, 0))?;
        Ok((first, first | AddressConfig::max_value(self.config.step_digits)))
    }
}
