//! Query pipeline: locus range to per-haplotype sequences.
//!
//! - [`resolver`]: locus range to the tile positions covering it
//! - [`translator`]: tile variants to the bases they contribute
//! - [`assembler`]: stitching translated calls on their shared tags
//! - [`engine`]: the pipeline run for a whole population of samples
//!
//! ## Example
//!
//! ```rust,no_run
//! use tile_library::core::types::{Assembly, Chromosome};
//! use tile_library::library::TileLibrary;
//! use tile_library::provider::InMemoryCallProvider;
//! use tile_library::query::{QueryConfig, QueryEngine, RangeQuery};
//! use std::path::Path;
//!
//! let library = TileLibrary::load_from_file(Path::new("library.json")).unwrap();
//! let provider =
//!     InMemoryCallProvider::from_file(Path::new("calls.tsv"), &library.config().address).unwrap();
//!
//! let engine = QueryEngine::new(&library, &provider, QueryConfig::default());
//! let query = RangeQuery::new(Assembly::Grch37, Chromosome::Autosome(13), 32_315_474, 32_315_574);
//! for (sample, [a, b]) in engine.sequences_in_range(&query).unwrap() {
//!     println!("{sample}\t{a}\t{b}");
//! }
//! ```

pub mod assembler;
pub mod engine;
pub mod resolver;
pub mod translator;

pub use assembler::{
    AroundSequence, AssemblyConfig, AssemblyError, GapPolicy, SequenceAssembler, Strand,
};
pub use engine::{AroundQuery, QueryConfig, QueryEngine, QueryError, RangeQuery};
pub use resolver::{RangeResolver, ResolveError, ResolvedRange};
pub use translator::{TranslateError, TranslationTable, VariantTranslator, Window};
