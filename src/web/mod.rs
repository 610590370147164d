//! JSON query service over a loaded tile library.
//!
//! The server answers range and around-target queries with the same engine
//! the CLI uses. Queries run on blocking workers, since call providers and
//! sequence assembly are synchronous.
//!
//! ## Starting the Server
//!
//! ```text
//! # Serve a library with calls from a file
//! tile-library serve --library library.json --calls calls.tsv
//!
//! # Calls from a remote service, bound to all interfaces
//! tile-library serve --library library.json --provider-url http://calls:9000 --address 0.0.0.0
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /api/library` - Library settings and counts
//! - `GET /api/samples` - Samples the call provider knows
//! - `POST /api/resolve` - Tile positions covering a range
//! - `POST /api/sequences` - Both haplotypes per sample over a range
//! - `POST /api/around` - Bases either side of a target base, per haplotype
//!
//! Failures answer `{"message": "..."}`: 400 when the request was at fault,
//! 500 with an opaque message otherwise.

pub mod server;
