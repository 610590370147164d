//! # tile-library
//!
//! A library for reconstructing sample haplotypes from a tiled genome library.
//!
//! The reference genome is cut into overlapping tiles. Each tile position is
//! addressed by `(path, version, step)` and holds any number of observed tile
//! variants; adjacent positions share a fixed-length tag. A sample's haplotype
//! is the list of tile variants it was called with, so the bases over any
//! locus range can be rebuilt by stitching those variants on their tags.
//!
//! ## Features
//!
//! - **Addressing**: lossless integer and compact-token forms of positions and variants
//! - **Range resolution**: locus ranges to tile positions, including structural
//!   variants that span into the range from earlier positions
//! - **Translation**: tile variants to the exact bases they contribute, indel-aware
//! - **Assembly**: tag-checked stitching of both haplotypes of every sample
//! - **Call providers**: in-memory call sets or a remote JSON call service
//!
//! ## Example
//!
//! ```rust,no_run
//! use tile_library::{InMemoryCallProvider, QueryConfig, QueryEngine, RangeQuery, TileLibrary};
//! use tile_library::core::types::{Assembly, Chromosome};
//! use std::path::Path;
//!
//! let library = TileLibrary::load_from_file(Path::new("library.json")).unwrap();
//! let provider =
//!     InMemoryCallProvider::from_file(Path::new("calls.tsv"), &library.config().address).unwrap();
//! let engine = QueryEngine::new(&library, &provider, QueryConfig::default());
//!
//! let query = RangeQuery::new(Assembly::Grch37, Chromosome::Autosome(13), 32_315_474, 32_315_574);
//! for (sample, [a, b]) in engine.sequences_in_range(&query).unwrap() {
//!     println!("{sample}\n  A: {a}\n  B: {b}");
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Addresses, tokens, tiles, loci and genome variants
//! - [`library`]: Library storage, loading and locus lookups
//! - [`query`]: Range resolution, translation, assembly and the query engine
//! - [`provider`]: Sources of per-sample calls
//! - [`parsing`]: Call-set file parser
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: JSON query service

pub mod cli;
pub mod core;
pub mod library;
pub mod parsing;
pub mod provider;
pub mod query;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use core::address::{AddressCodec, AddressConfig, TilePosition, TileVariantId};
pub use core::token::{Call, Token};
pub use core::types::*;
pub use library::{LocusIndex, TileLibrary};
pub use provider::{CallProvider, HttpCallProvider, InMemoryCallProvider};
pub use query::{AroundQuery, QueryConfig, QueryEngine, QueryError, RangeQuery};
