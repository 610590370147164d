//! Tile library storage and lookups.
//!
//! A [`TileLibrary`] holds every tile variant, locus annotation, genome
//! variant, translation and spanning statistic of one library build. It is
//! loaded from a JSON file, checked for internal consistency, and is
//! read-only afterwards, so any number of queries can share it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tile_library::library::{LocusIndex, TileLibrary};
//! use tile_library::core::types::Assembly;
//! use std::path::Path;
//!
//! let library = TileLibrary::load_from_file(Path::new("library.json")).unwrap();
//! let index = LocusIndex::new(&library);
//! let highest = index.highest_position_in_path(0x2c5).unwrap();
//! let locus = index.locus_for(&Assembly::Grch37, highest).unwrap();
//! println!("{highest} covers [{}, {})", locus.begin, locus.end);
//! ```

pub mod index;
pub mod store;

pub use index::{IndexError, LocusIndex, StatisticsFallback};
pub use store::{LibraryConfig, LibraryError, PathInfo, TileLibrary};
