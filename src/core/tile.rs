use serde::{Deserialize, Serialize};

use crate::core::address::{TilePosition, TileVariantId};
use crate::core::token::Token;
use crate::utils::validation::compute_md5;

/// A sequence observed at a tile position
///
/// Variants are written once by ingestion and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileVariant {
    /// Position and variant value (0 is the reference)
    pub id: TileVariantId,

    /// Number of consecutive reference positions this variant replaces
    #[serde(default = "default_span")]
    pub num_positions_spanned: u32,

    /// Length of `sequence`
    pub length: usize,

    /// Lowercase hex MD5 of `sequence`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,

    /// Bases, tags included
    pub sequence: String,

    /// Start tag, stored for variants whose tag differs from the reference
    /// tile's. Empty at the start of a path, otherwise the first tag-length
    /// bases of `sequence`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_tag: Option<String>,

    /// End tag, stored like `start_tag`. Empty at the end of a path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_tag: Option<String>,

    /// Whether call providers can report this variant by name
    #[serde(default = "default_exported", skip_serializing_if = "is_exported")]
    pub exported: bool,
}

fn default_span() -> u32 {
    1
}

fn default_exported() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde skip_serializing_if signature
fn is_exported(exported: &bool) -> bool {
    *exported
}

impl TileVariant {
    pub fn new(id: TileVariantId, sequence: impl Into<String>) -> Self {
        let sequence = sequence.into();
        Self {
            id,
            num_positions_spanned: 1,
            length: sequence.len(),
            md5: compute_md5(&sequence),
            sequence,
            start_tag: None,
            end_tag: None,
            exported: true,
        }
    }

    #[must_use]
    pub fn with_span(mut self, num_positions_spanned: u32) -> Self {
        self.num_positions_spanned = num_positions_spanned.max(1);
        self
    }

    #[cfg(test)]
    pub fn unexported(mut self) -> Self {
        self.exported = false;
        self
    }

    #[must_use]
    pub fn position(&self) -> TilePosition {
        self.id.position
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.id.is_reference()
    }

    /// Whether this variant replaces more than one reference position
    #[must_use]
    pub fn is_spanning(&self) -> bool {
        self.num_positions_spanned > 1
    }

    /// The last position covered by this variant
    #[must_use]
    pub fn last_position(&self) -> TilePosition {
        self.token_unchecked().last_position()
    }

    /// The name call providers use for this variant, if it has one
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.exported.then(|| self.token_unchecked())
    }

    fn token_unchecked(&self) -> Token {
        Token::new(self.id, self.num_positions_spanned)
    }

    fn leading_bases(&self, tag_length: usize) -> &str {
        &self.sequence[..tag_length.min(self.sequence.len())]
    }

    fn trailing_bases(&self, tag_length: usize) -> &str {
        &self.sequence[self.sequence.len().saturating_sub(tag_length)..]
    }

    /// Leading tag of the variant
    #[must_use]
    pub fn start_tag(&self, tag_length: usize) -> &str {
        self.start_tag
            .as_deref()
            .unwrap_or_else(|| self.leading_bases(tag_length))
    }

    /// Trailing tag of the variant
    #[must_use]
    pub fn end_tag(&self, tag_length: usize) -> &str {
        self.end_tag
            .as_deref()
            .unwrap_or_else(|| self.trailing_bases(tag_length))
    }

    /// First stored tag that disagrees with the bases it names, as
    /// `(side, stored, bases)`
    #[must_use]
    pub fn conflicting_tag(&self, tag_length: usize) -> Option<(&'static str, &str, &str)> {
        [
            ("start", self.start_tag(tag_length), self.leading_bases(tag_length)),
            ("end", self.end_tag(tag_length), self.trailing_bases(tag_length)),
        ]
        .into_iter()
        .find(|(_, stored, bases)| !stored.is_empty() && stored != bases)
    }
}
