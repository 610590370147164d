use serde::{Deserialize, Serialize};

use crate::core::address::TileVariantId;
use crate::core::types::{Assembly, Chromosome};

/// Identifier of a genome variant in the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenomeVariantId(pub u64);

impl std::fmt::Display for GenomeVariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A SNP, substitution or indel anchored to reference coordinates
///
/// `[start, end)` is 0-based half-open on the reference; an insertion has
/// `start == end` and empty `reference_bases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeVariant {
    pub id: GenomeVariantId,
    pub assembly: Assembly,
    pub chromosome: Chromosome,
    pub start: u64,
    pub end: u64,
    pub reference_bases: String,
    pub alternate_bases: String,
    /// External names such as dbSNP identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

impl GenomeVariant {
    /// Change in sequence length introduced by this variant
    #[must_use]
    pub fn length_delta(&self) -> i64 {
        len_i64(&self.alternate_bases) - len_i64(&self.reference_bases)
    }

    #[must_use]
    pub fn is_snp(&self) -> bool {
        self.reference_bases.len() == 1 && self.alternate_bases.len() == 1
    }
}

fn len_i64(s: &str) -> i64 {
    i64::try_from(s.len()).unwrap_or(i64::MAX)
}

/// Links a genome variant to a tile variant through tile-relative offsets
///
/// `[start, end)` indexes into the tile variant's sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub genome_variant: GenomeVariantId,
    pub tile_variant: TileVariantId,
    pub start: usize,
    pub end: usize,
}

/// Largest `num_positions_spanned` observed in a path
///
/// Recomputed by library maintenance; may lag behind freshly ingested data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanningStatistic {
    pub path: u32,
    pub max_num_positions_spanned: u32,
}
