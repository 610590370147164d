//! Parsers for call-set files.
//!
//! A call-set file lists, per sample and phase, the tile variants a sample
//! was called with:
//!
//! ```text
//! sample  phase  calls
//! hu001   A      2c5.00.0000.000 2c5.00.0001.003+2 2c5.00.0003.000
//! hu001   B      2c5.00.0000.000 2c5.00.0001.- 2c5.00.0002.000 2c5.00.0003.000
//! ```
//!
//! Columns are tab-separated; calls within the last column are separated by
//! whitespace. A token ending in `.-` marks a position that was not well
//! sequenced.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tile_library::core::address::AddressConfig;
//! use tile_library::parsing::calls::parse_calls_file;
//! use std::path::Path;
//!
//! let calls = parse_calls_file(Path::new("calls.tsv"), &AddressConfig::default()).unwrap();
//! for (sample, phased) in &calls {
//!     println!("{sample}: {} + {} calls", phased[0].len(), phased[1].len());
//! }
//! ```

pub mod calls;
