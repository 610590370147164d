//! Compact textual names of tile variants.
//!
//! A token is written `PPP.VV.SSSS.XXX[+H]`: path, version, step and variant
//! value as fixed-width hex fields, with an optional hex `+H` suffix giving
//! the number of positions spanned when it is greater than one. A call that
//! could not be made confidently is written with `-` in place of the variant
//! field, e.g. `2c5.00.001a.-`.

use serde::{Deserialize, Serialize};

use crate::core::address::{AddressConfig, AddressError, TilePosition, TileVariantId};

/// Variant field used by the not-well-sequenced sentinel
pub const NOT_WELL_SEQUENCED_FIELD: &str = "-";

/// Reference to a tile variant, with the number of positions it spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Token {
    pub variant: TileVariantId,
    pub span: u32,
}

impl Token {
    #[must_use]
    pub fn new(variant: TileVariantId, span: u32) -> Self {
        Self {
            variant,
            span: span.max(1),
        }
    }

    #[must_use]
    pub fn position(&self) -> TilePosition {
        self.variant.position
    }

    /// The last position this token covers
    #[must_use]
    pub fn last_position(&self) -> TilePosition {
        let position = self.variant.position;
        TilePosition {
            step: position.step.saturating_add(self.span - 1),
            ..position
        }
    }

    /// The same variant without its span suffix
    #[must_use]
    pub fn non_spanning(&self) -> TileVariantId {
        self.variant
    }

    /// Whether this token covers `position`
    #[must_use]
    pub fn covers(&self, position: TilePosition) -> bool {
        let first = self.variant.position;
        first.version == position.version
            && first.path == position.path
            && first.step <= position.step
            && position.step <= self.last_position().step
    }

    /// Write the token in its compact form
    #[must_use]
    pub fn to_compact(&self, config: &AddressConfig) -> String {
        let mut out = format!(
            "{}.{:0vw$x}",
            format_position(self.variant.position, config),
            self.variant.value,
            vw = config.variant_digits as usize
        );
        if self.span > 1 {
            out.push_str(&format!("+{:x}", self.span));
        }
        out
    }

    /// Parse a compact token such as `2c5.00.001a.003+2`
    ///
    /// # Errors
    ///
    /// Returns `AddressError::MalformedToken` if the text does not have four
    /// fixed-width hex fields or the span suffix is invalid.
    pub fn parse(text: &str, config: &AddressConfig) -> Result<Self, AddressError> {
        match Call::parse(text, config)? {
            Call::Tile(token) => Ok(token),
            Call::NotWellSequenced(_) => Err(malformed(text, "expected a tile variant, found a no-call")),
        }
    }
}

/// One entry of a haplotype's ordered call list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Call {
    Tile(Token),
    /// The position was not sequenced well enough to make a call
    NotWellSequenced(TilePosition),
}

impl Call {
    #[must_use]
    pub fn position(&self) -> TilePosition {
        match self {
            Self::Tile(token) => token.position(),
            Self::NotWellSequenced(position) => *position,
        }
    }

    #[must_use]
    pub fn last_position(&self) -> TilePosition {
        match self {
            Self::Tile(token) => token.last_position(),
            Self::NotWellSequenced(position) => *position,
        }
    }

    #[must_use]
    pub fn covers(&self, position: TilePosition) -> bool {
        match self {
            Self::Tile(token) => token.covers(position),
            Self::NotWellSequenced(p) => *p == position,
        }
    }

    /// Whether this is the not-well-sequenced sentinel
    #[must_use]
    pub fn is_gap(&self) -> bool {
        matches!(self, Self::NotWellSequenced(_))
    }

    #[must_use]
    pub fn to_compact(&self, config: &AddressConfig) -> String {
        match self {
            Self::Tile(token) => token.to_compact(config),
            Self::NotWellSequenced(position) => {
                format!("{}.{NOT_WELL_SEQUENCED_FIELD}", format_position(*position, config))
            }
        }
    }

    /// Parse a compact token or a not-well-sequenced sentinel
    ///
    /// # Errors
    ///
    /// Returns `AddressError::MalformedToken` for anything else.
    pub fn parse(text: &str, config: &AddressConfig) -> Result<Self, AddressError> {
        let trimmed = text.trim();
        let (body, span) = match trimmed.split_once('+') {
            Some((body, suffix)) => (body, Some(suffix)),
            None => (trimmed, None),
        };

        let fields: Vec<&str> = body.split('.').collect();
        if fields.len() != 4 {
            return Err(malformed(
                text,
                &format!("expected 4 dot-separated fields, found {}", fields.len()),
            ));
        }

        let path = parse_hex_field(text, "path", fields[0], config.path_digits)?;
        let version = parse_hex_field(text, "version", fields[1], config.version_digits)?;
        let step = parse_hex_field(text, "step", fields[2], config.step_digits)?;
        let position = TilePosition::new(version, path, step);

        if fields[3] == NOT_WELL_SEQUENCED_FIELD {
            if span.is_some() {
                return Err(malformed(text, "a no-call cannot carry a span"));
            }
            return Ok(Self::NotWellSequenced(position));
        }

        let value = parse_hex_field(text, "variant", fields[3], config.variant_digits)?;
        let span = match span {
            None => 1,
            Some(suffix) => {
                if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(malformed(text, "span suffix must be hex"));
                }
                let span = u32::from_str_radix(suffix, 16)
                    .map_err(|e| malformed(text, &format!("invalid span suffix: {e}")))?;
                if span == 0 {
                    return Err(malformed(text, "span must be at least 1"));
                }
                span
            }
        };

        Ok(Self::Tile(Token::new(TileVariantId::new(position, value), span)))
    }
}

/// Compact form under the default address widths
///
/// Used for error messages and log fields. Use [`Call::to_compact`] for
/// output under a library's own widths.
impl std::fmt::Display for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_compact(&AddressConfig::default()))
    }
}

/// Write a position as the first three fields of a compact token
#[must_use]
pub fn format_position(position: TilePosition, config: &AddressConfig) -> String {
    format!(
        "{:0pw$x}.{:0vw$x}.{:0sw$x}",
        position.path,
        position.version,
        position.step,
        pw = config.path_digits as usize,
        vw = config.version_digits as usize,
        sw = config.step_digits as usize
    )
}

/// Parse the `PPP.VV.SSSS` form written by [`format_position`]
///
/// # Errors
///
/// Returns `AddressError::MalformedToken` unless the text has exactly three
/// fixed-width hex fields.
pub fn parse_position(text: &str, config: &AddressConfig) -> Result<TilePosition, AddressError> {
    let fields: Vec<&str> = text.trim().split('.').collect();
    if fields.len() != 3 {
        return Err(malformed(
            text,
            &format!("expected 3 dot-separated fields, found {}", fields.len()),
        ));
    }
    let path = parse_hex_field(text, "path", fields[0], config.path_digits)?;
    let version = parse_hex_field(text, "version", fields[1], config.version_digits)?;
    let step = parse_hex_field(text, "step", fields[2], config.step_digits)?;
    Ok(TilePosition::new(version, path, step))
}

fn parse_hex_field(
    token: &str,
    name: &str,
    field: &str,
    digits: u32,
) -> Result<u32, AddressError> {
    if field.len() != digits as usize {
        return Err(malformed(
            token,
            &format!("{name} field '{field}' must be exactly {digits} hex digits"),
        ));
    }
    if !field.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(malformed(
            token,
            &format!("{name} field '{field}' is not hexadecimal"),
        ));
    }
    u32::from_str_radix(field, 16)
        .map_err(|e| malformed(token, &format!("{name} field '{field}': {e}")))
}

fn malformed(token: &str, reason: &str) -> AddressError {
    AddressError::MalformedToken {
        token: token.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AddressConfig {
        AddressConfig::default()
    }

    #[test]
    fn test_parse_plain_token() {
        let token = Token::parse("2c5.00.001a.003", &config()).unwrap();
        assert_eq!(token.position(), TilePosition::new(0, 0x2c5, 0x1a));
        assert_eq!(token.variant.value, 3);
        assert_eq!(token.span, 1);
        assert_eq!(token.to_compact(&config()), "2c5.00.001a.003");
    }

    #[test]
    fn test_parse_spanning_token() {
        let token = Token::parse("2c5.00.001a.003+1f", &config()).unwrap();
        assert_eq!(token.span, 0x1f);
        assert_eq!(token.last_position().step, 0x1a + 0x1e);
        assert_eq!(token.to_compact(&config()), "2c5.00.001a.003+1f");
        assert_eq!(
            token.non_spanning(),
            TileVariantId::new(TilePosition::new(0, 0x2c5, 0x1a), 3)
        );
    }

    #[test]
    fn test_span_of_one_is_normalized() {
        let token = Token::parse("000.00.0000.000+1", &config()).unwrap();
        assert_eq!(token.span, 1);
        assert_eq!(token.to_compact(&config()), "000.00.0000.000");
    }

    #[test]
    fn test_non_hex_path_is_rejected() {
        let err = Token::parse("zzz.00.0000.000", &config()).unwrap_err();
        assert!(matches!(err, AddressError::MalformedToken { .. }));
    }

    #[test]
    fn test_malformed_tokens() {
        let bad = [
            "",
            "000.00.0000",
            "000.00.0000.000.000",
            "00.00.0000.000",
            "000.00.00000.000",
            "000.00.0000.000+",
            "000.00.0000.000+0",
            "000.00.0000.000+g",
            "-00.00.0000.000",
            "000.00.0000.+0a",
        ];
        for text in bad {
            assert!(
                Call::parse(text, &config()).is_err(),
                "'{text}' should have been rejected"
            );
        }
    }

    #[test]
    fn test_not_well_sequenced_sentinel() {
        let call = Call::parse("2c5.00.001a.-", &config()).unwrap();
        assert_eq!(
            call,
            Call::NotWellSequenced(TilePosition::new(0, 0x2c5, 0x1a))
        );
        assert_eq!(call.to_compact(&config()), "2c5.00.001a.-");
        assert!(Call::parse("2c5.00.001a.-+2", &config()).is_err());
        assert!(Token::parse("2c5.00.001a.-", &config()).is_err());
    }

    #[test]
    fn test_parse_position() {
        let position = parse_position("2c5.00.001a", &config()).unwrap();
        assert_eq!(position, TilePosition::new(0, 0x2c5, 0x1a));
        assert_eq!(format_position(position, &config()), "2c5.00.001a");
        assert!(parse_position("2c5.00.001a.000", &config()).is_err());
        assert!(parse_position("2c5.00.1a", &config()).is_err());
    }

    #[test]
    fn test_display_uses_default_widths() {
        let wide = AddressConfig {
            path_digits: 4,
            step_digits: 5,
            ..AddressConfig::default()
        };
        let position = TilePosition::new(0, 0x2c5, 0x1a);
        let call = Call::NotWellSequenced(position);

        assert_eq!(position.to_string(), format_position(position, &config()));
        assert_eq!(call.to_string(), call.to_compact(&config()));
        assert_eq!(format_position(position, &wide), "02c5.00.0001a");
        assert_eq!(call.to_compact(&wide), "02c5.00.0001a.-");
        assert_eq!(Call::parse(&call.to_compact(&wide), &wide).unwrap(), call);
    }

    #[test]
    fn test_covers() {
        let token = Token::parse("001.00.0004.002+3", &config()).unwrap();
        assert!(!token.covers(TilePosition::new(0, 1, 3)));
        assert!(token.covers(TilePosition::new(0, 1, 4)));
        assert!(token.covers(TilePosition::new(0, 1, 6)));
        assert!(!token.covers(TilePosition::new(0, 1, 7)));
        assert!(!token.covers(TilePosition::new(0, 2, 5)));
    }

    #[test]
    fn test_custom_widths() {
        let config = AddressConfig {
            path_digits: 4,
            version_digits: 1,
            step_digits: 2,
            variant_digits: 2,
        };
        let token = Token::parse("0abc.1.ff.0e", &config).unwrap();
        assert_eq!(token.position(), TilePosition::new(1, 0xabc, 0xff));
        assert_eq!(token.to_compact(&config), "0abc.1.ff.0e");
    }
}
