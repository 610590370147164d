use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default number of bases shared between adjacent tiles.
///
/// Every tile's locus interval overlaps its neighbour's by exactly this many
/// bases. A library records the tag length it was built with; changing it
/// means regenerating the whole library.
pub const DEFAULT_TAG_LENGTH: usize = 24;

/// Reference assembly a locus is anchored to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Assembly {
    Grch37,
    Grch38,
    Other(String),
}

impl std::fmt::Display for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grch37 => write!(f, "GRCh37"),
            Self::Grch38 => write!(f, "GRCh38"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

impl From<String> for Assembly {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(assembly) => assembly,
            Err(never) => match never {},
        }
    }
}

impl From<Assembly> for String {
    fn from(assembly: Assembly) -> Self {
        assembly.to_string()
    }
}

impl FromStr for Assembly {
    type Err = std::convert::Infallible;

    /// Accepts GRC and UCSC names as well as the bare build numbers
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "grch37" | "hg19" | "b37" | "37" | "19" => Self::Grch37,
            "grch38" | "hg38" | "38" => Self::Grch38,
            _ => Self::Other(s.trim().to_string()),
        })
    }
}

/// Chromosome a tile path belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Chromosome {
    /// Autosomes 1-22
    Autosome(u8),
    X,
    Y,
    /// Mitochondrial genome
    M,
    /// Unplaced, unlocalized or otherwise named sequences
    Other(String),
}

impl std::fmt::Display for Chromosome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Autosome(n) => write!(f, "chr{n}"),
            Self::X => write!(f, "chrX"),
            Self::Y => write!(f, "chrY"),
            Self::M => write!(f, "chrM"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

impl From<String> for Chromosome {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(chromosome) => chromosome,
            Err(never) => match never {},
        }
    }
}

impl From<Chromosome> for String {
    fn from(chromosome: Chromosome) -> Self {
        chromosome.to_string()
    }
}

impl FromStr for Chromosome {
    type Err = std::convert::Infallible;

    /// Parses UCSC (`chr1`, `chrM`) and NCBI (`1`, `MT`) names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = trimmed
            .strip_prefix("chr")
            .or_else(|| trimmed.strip_prefix("Chr"))
            .unwrap_or(trimmed);

        Ok(match bare.to_uppercase().as_str() {
            "X" | "23" => Self::X,
            "Y" | "24" => Self::Y,
            "M" | "MT" | "25" => Self::M,
            other => match other.parse::<u8>() {
                Ok(n) if (1..=22).contains(&n) => Self::Autosome(n),
                _ => Self::Other(trimmed.to_string()),
            },
        })
    }
}

/// Identifier of a sequenced individual, as reported by the call provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub String);

impl SampleId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two haplotypes of a diploid call set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    A,
    B,
}

impl Phase {
    pub const BOTH: [Phase; 2] = [Phase::A, Phase::B];

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Coordinate convention of user-supplied base positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Indexing {
    /// 0-based, half-open (the internal convention)
    #[default]
    #[value(name = "0")]
    Zero,
    /// 1-based, as used by most genome browsers
    #[value(name = "1")]
    One,
}

impl Indexing {
    /// Parse the `0`/`1` form used by the range query surface
    #[must_use]
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            _ => None,
        }
    }
}
