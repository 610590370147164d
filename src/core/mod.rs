//! Core data types of the tiled genome library.
//!
//! - [`address`]: integer/hex-tuple addressing of tile positions and variants
//! - [`token`]: compact textual tile variant names and haplotype calls
//! - [`tile`]: [`TileVariant`](tile::TileVariant), one observed sequence at a position
//! - [`locus`]: [`LocusAnnotation`](locus::LocusAnnotation), per-assembly intervals
//! - [`variant`]: genome variants, their tile translations and spanning statistics
//! - [`types`]: assemblies, chromosomes, samples and phases
//!
//! ## Addressing
//!
//! | Field   | Hex digits | Token slot |
//! |---------|------------|------------|
//! | path    | 3          | `PPP`      |
//! | version | 2          | `VV`       |
//! | step    | 4          | `SSSS`     |
//! | variant | 3          | `XXX`      |
//!
//! Widths are a property of the library and are read from its file.

pub mod address;
pub mod locus;
pub mod tile;
pub mod token;
pub mod types;
pub mod variant;
