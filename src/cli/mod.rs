//! Command-line interface for tile-library.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **query**: Assemble haplotype sequences over a range or around a base
//! - **resolve**: Show the tile positions covering a locus range
//! - **token**: Encode and decode compact tile variant names
//! - **library**: Inspect, export, or refresh a library file
//! - **serve**: Start the JSON range query service
//!
//! ## Usage
//!
//! ```text
//! # Both haplotypes of every sample over chr13:32315474-32315574
//! tile-library query range --library library.json --calls calls.tsv \
//!     --assembly hg19 --chromosome 13 --low 32315474 --high 32315574
//!
//! # 10 bases either side of a base, 1-based, from a remote call service
//! tile-library query around --library library.json --provider-url http://calls:9000 \
//!     --assembly hg19 --chromosome 13 --target 32315508 --number-around 10 --indexing 1
//!
//! # Decode a token
//! tile-library token decode 2c5.00.001a.003+2
//!
//! # Serve the query API
//! tile-library serve --library library.json --calls calls.tsv --port 8080
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::core::address::AddressConfig;
use crate::library::{StatisticsFallback, TileLibrary};
use crate::provider::{CallProvider, HttpCallProvider, HttpProviderConfig, InMemoryCallProvider};
use crate::query::assembler::{AssemblyConfig, GapPolicy, DEFAULT_MAX_EXTENSION};
use crate::query::QueryConfig;

pub mod library;
pub mod query;
pub mod resolve;
pub mod token;

#[derive(Parser)]
#[command(name = "tile-library")]
#[command(version)]
#[command(about = "Assemble sample haplotypes from a tiled genome library")]
#[command(
    long_about = "tile-library answers range queries against a tiled genome library.\n\nThe genome is cut into overlapping tiles addressed by path, version and step. Given per-sample calls of tile variants it:\n- Resolves locus ranges to tile positions, including spanning variants\n- Translates tile variants into the bases they contribute\n- Stitches both haplotypes of every sample on the shared tags"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble sample sequences from the library and a call source
    Query(query::QueryArgs),

    /// Resolve a locus range to tile positions
    Resolve(resolve::ResolveArgs),

    /// Encode or decode tile variant tokens
    Token(token::TokenArgs),

    /// Inspect and maintain a library file
    Library(library::LibraryArgs),

    /// Start the web server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,

    /// Library file (JSON, optionally gzipped)
    #[arg(long, required = true)]
    pub library: PathBuf,

    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Where per-sample calls come from
#[derive(Args, Clone)]
pub struct ProviderArgs {
    /// Call-set file: tab-separated sample, phase (A/B) and tokens
    #[arg(long, conflicts_with = "provider_url", required_unless_present = "provider_url")]
    pub calls: Option<PathBuf>,

    /// Base URL of a remote call service
    #[arg(long)]
    pub provider_url: Option<String>,

    /// Timeout for call service requests, in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

impl ProviderArgs {
    /// Build the configured call provider
    ///
    /// # Errors
    ///
    /// Returns an error if the call-set file cannot be parsed or the HTTP
    /// client cannot be built.
    pub fn build(
        &self,
        address: &AddressConfig,
    ) -> anyhow::Result<Box<dyn CallProvider + Send + Sync>> {
        if let Some(path) = &self.calls {
            let provider = InMemoryCallProvider::from_file(path, address)?;
            tracing::debug!(samples = provider.len(), path = %path.display(), "Loaded call set");
            return Ok(Box::new(provider));
        }
        let url = self
            .provider_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Either --calls or --provider-url is required"))?;
        let config =
            HttpProviderConfig::new(url).with_timeout(Duration::from_secs(self.timeout.max(1)));
        Ok(Box::new(HttpCallProvider::new(config, *address)?))
    }
}

/// Assembly and lookup settings
#[derive(Args, Clone)]
pub struct EngineArgs {
    /// What to do with not-well-sequenced calls
    #[arg(long, value_enum, default_value = "abort-on-gap")]
    pub gap_policy: GapPolicy,

    /// Positions an around-target query may fetch beyond its window, per direction
    #[arg(long, default_value_t = DEFAULT_MAX_EXTENSION)]
    pub max_extension: usize,

    /// Fail instead of scanning when a path has no spanning statistic
    #[arg(long)]
    pub strict_statistics: bool,
}

impl EngineArgs {
    #[must_use]
    pub fn config(&self) -> QueryConfig {
        QueryConfig {
            assembly: AssemblyConfig {
                gap_policy: self.gap_policy,
                max_extension: self.max_extension,
            },
            statistics: if self.strict_statistics {
                StatisticsFallback::Fail
            } else {
                StatisticsFallback::Scan
            },
        }
    }
}

/// Load a library file, reporting its size when verbose
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails its integrity checks.
pub fn load_library(path: &Path, verbose: bool) -> anyhow::Result<TileLibrary> {
    let library = TileLibrary::load_from_file(path)?;
    if verbose {
        eprintln!(
            "Loaded library with {} tile variants and {} loci",
            library.len(),
            library.num_loci()
        );
    }
    Ok(library)
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
