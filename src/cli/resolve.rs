use std::path::PathBuf;

use clap::Args;

use crate::cli::{load_library, OutputFormat};
use crate::core::token::{format_position, Token};
use crate::core::types::{Assembly, Chromosome, Indexing};
use crate::library::{LocusIndex, StatisticsFallback, TileLibrary};
use crate::query::{RangeResolver, ResolvedRange};
use crate::utils::validation::to_half_open;

#[derive(Args)]
pub struct ResolveArgs {
    /// Library file (JSON, optionally gzipped)
    #[arg(long, required = true)]
    pub library: PathBuf,

    /// Assembly of the coordinates (e.g., "GRCh37", "hg19")
    #[arg(long, required = true)]
    pub assembly: Assembly,

    /// Chromosome (e.g., "13", "chr13")
    #[arg(long, required = true)]
    pub chromosome: Chromosome,

    /// First base of the range
    #[arg(long, required = true)]
    pub low: u64,

    /// End of the range (exclusive 0-based, inclusive 1-based)
    #[arg(long, required = true)]
    pub high: u64,

    /// Coordinate convention of the bases given
    #[arg(long, value_enum, default_value = "0")]
    pub indexing: Indexing,

    /// Answer in the loci of another assembly (not supported yet; fails loudly)
    #[arg(long)]
    pub liftover_to: Option<Assembly>,

    /// Fail instead of scanning when a path has no spanning statistic
    #[arg(long)]
    pub strict_statistics: bool,
}

/// Execute resolve subcommand
///
/// # Errors
///
/// Returns an error if the library cannot be loaded or the range does not resolve.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ResolveArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let library = load_library(&args.library, verbose)?;
    let fallback = if args.strict_statistics {
        StatisticsFallback::Fail
    } else {
        StatisticsFallback::Scan
    };
    let resolver = RangeResolver::new(LocusIndex::new(&library).with_fallback(fallback));

    let (low, high) = to_half_open(args.low, args.high, args.indexing)?;
    let to = args.liftover_to.as_ref().unwrap_or(&args.assembly);
    let range = resolver.resolve_lifted(&args.assembly, to, &args.chromosome, low, high)?;

    let address = &library.config().address;
    match format {
        OutputFormat::Text => print_text(&range, &library),
        OutputFormat::Json => print_json(&range, &library)?,
        OutputFormat::Tsv => {
            println!("position\tbegin\tend");
            for locus in &range.loci {
                println!(
                    "{}\t{}\t{}",
                    format_position(locus.position, address),
                    locus.begin,
                    locus.end
                );
            }
        }
    }
    Ok(())
}

/// Compact names of the variants spanning into the range, with their spans
fn spanning_names(range: &ResolvedRange, library: &TileLibrary) -> Vec<String> {
    let address = &library.config().address;
    range
        .spanning
        .iter()
        .map(|id| {
            let span = library
                .tile_variant(*id)
                .map_or(1, |v| v.num_positions_spanned);
            Token::new(*id, span).to_compact(address)
        })
        .collect()
}

fn print_text(range: &ResolvedRange, library: &TileLibrary) {
    let address = &library.config().address;
    println!(
        "{}:{}-{} ({}): {} positions\n",
        range.chromosome,
        range.low,
        range.high,
        range.assembly,
        range.loci.len()
    );
    println!("{:<14} {:>12} {:>12}", "Position", "Begin", "End");
    println!("{}", "-".repeat(40));
    for locus in &range.loci {
        println!(
            "{:<14} {:>12} {:>12}",
            format_position(locus.position, address),
            locus.begin,
            locus.end
        );
    }

    if !range.spanning.is_empty() {
        println!(
            "\nVariants spanning into {}:",
            format_position(range.first(), address)
        );
        for name in spanning_names(range, library) {
            println!("  {name}");
        }
    }
}

fn print_json(range: &ResolvedRange, library: &TileLibrary) -> anyhow::Result<()> {
    let address = &library.config().address;
    let positions: Vec<_> = range
        .loci
        .iter()
        .map(|locus| {
            serde_json::json!({
                "position": format_position(locus.position, address),
                "begin": locus.begin,
                "end": locus.end,
            })
        })
        .collect();
    let spanning = spanning_names(range, library);

    let output = serde_json::json!({
        "assembly": range.assembly,
        "chromosome": range.chromosome,
        "low": range.low,
        "high": range.high,
        "positions": positions,
        "spanning": spanning,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
