use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::cli::{load_library, EngineArgs, OutputFormat, ProviderArgs};
use crate::core::types::{Assembly, Chromosome, Indexing, Phase, SampleId};
use crate::query::{AroundQuery, AroundSequence, QueryEngine, RangeQuery};

#[derive(Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommands,
}

#[derive(Subcommand)]
pub enum QueryCommands {
    /// Assemble both haplotypes of each sample over a base range
    Range {
        #[command(flatten)]
        common: CommonArgs,

        /// First base of the range
        #[arg(long, required = true)]
        low: u64,

        /// End of the range (exclusive 0-based, inclusive 1-based)
        #[arg(long, required = true)]
        high: u64,

        /// Answer in the loci of another assembly (not supported yet; fails loudly)
        #[arg(long)]
        liftover_to: Option<Assembly>,
    },

    /// Assemble the bases on each side of a target base
    Around {
        #[command(flatten)]
        common: CommonArgs,

        /// Target base
        #[arg(long, required = true)]
        target: u64,

        /// Bases to report on each side of the target
        #[arg(short = 'n', long, required = true)]
        number_around: u64,
    },
}

#[derive(Args)]
pub struct CommonArgs {
    /// Library file (JSON, optionally gzipped)
    #[arg(long, required = true)]
    pub library: PathBuf,

    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Assembly of the coordinates (e.g., "GRCh37", "hg19")
    #[arg(long, required = true)]
    pub assembly: Assembly,

    /// Chromosome (e.g., "13", "chr13")
    #[arg(long, required = true)]
    pub chromosome: Chromosome,

    /// Coordinate convention of the bases given
    #[arg(long, value_enum, default_value = "0")]
    pub indexing: Indexing,

    /// Sample to assemble (repeatable); every sample when omitted
    #[arg(long = "sample")]
    pub samples: Vec<String>,
}

impl CommonArgs {
    fn samples(&self) -> Option<Vec<SampleId>> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().map(SampleId::new).collect())
        }
    }
}

/// Execute query subcommand
///
/// # Errors
///
/// Returns an error if the library or calls cannot be loaded or the query fails.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: QueryArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        QueryCommands::Range {
            common,
            low,
            high,
            liftover_to,
        } => {
            let query = RangeQuery {
                indexing: common.indexing,
                liftover_to,
                samples: common.samples(),
                ..RangeQuery::new(common.assembly.clone(), common.chromosome.clone(), low, high)
            };
            run_range(&common, &query, format, verbose)
        }
        QueryCommands::Around {
            common,
            target,
            number_around,
        } => {
            let query = AroundQuery {
                indexing: common.indexing,
                samples: common.samples(),
                ..AroundQuery::new(
                    common.assembly.clone(),
                    common.chromosome.clone(),
                    target,
                    number_around,
                )
            };
            run_around(&common, &query, format, verbose)
        }
    }
}

fn run_range(
    common: &CommonArgs,
    query: &RangeQuery,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let library = load_library(&common.library, verbose)?;
    let provider = common.provider.build(&library.config().address)?;
    let engine = QueryEngine::new(&library, provider.as_ref(), common.engine.config());

    let sequences = engine.sequences_in_range(query)?;
    if verbose {
        eprintln!("Assembled {} samples", sequences.len());
    }

    match format {
        OutputFormat::Text => print_range_text(query, &sequences),
        OutputFormat::Json => print_range_json(query, &sequences)?,
        OutputFormat::Tsv => {
            println!("sample\tphase\tsequence");
            for (sample, phased) in &sequences {
                for phase in Phase::BOTH {
                    println!("{sample}\t{phase}\t{}", phased[phase.index()]);
                }
            }
        }
    }
    Ok(())
}

fn print_range_text(query: &RangeQuery, sequences: &BTreeMap<SampleId, [String; 2]>) {
    println!(
        "{}:{}-{} ({}, {}-based), {} samples\n",
        query.chromosome,
        query.low,
        query.high,
        query.assembly,
        match query.indexing {
            Indexing::Zero => 0,
            Indexing::One => 1,
        },
        sequences.len()
    );
    let width = sequences
        .keys()
        .map(|s| s.0.len())
        .max()
        .unwrap_or(6)
        .max(6);
    for (sample, phased) in sequences {
        for phase in Phase::BOTH {
            println!(
                "{:<width$}  {}  {}",
                sample.0,
                phase,
                phased[phase.index()]
            );
        }
    }
}

fn print_range_json(
    query: &RangeQuery,
    sequences: &BTreeMap<SampleId, [String; 2]>,
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "assembly": query.assembly,
        "chromosome": query.chromosome,
        "low": query.low,
        "high": query.high,
        "indexing": query.indexing,
        "sequences": sequences,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_around(
    common: &CommonArgs,
    query: &AroundQuery,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let library = load_library(&common.library, verbose)?;
    let provider = common.provider.build(&library.config().address)?;
    let engine = QueryEngine::new(&library, provider.as_ref(), common.engine.config());

    let sequences = engine.sequences_around(query)?;

    match format {
        OutputFormat::Text => print_around_text(query, &sequences),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "assembly": query.assembly,
                "chromosome": query.chromosome,
                "target": query.target,
                "number_around": query.number_around,
                "indexing": query.indexing,
                "sequences": sequences,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("sample\tphase\tbefore\tcenter\tafter");
            for (sample, phased) in &sequences {
                for phase in Phase::BOTH {
                    let around = &phased[phase.index()];
                    println!(
                        "{sample}\t{phase}\t{}\t{}\t{}",
                        around.before, around.center, around.after
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_around_text(query: &AroundQuery, sequences: &BTreeMap<SampleId, [AroundSequence; 2]>) {
    println!(
        "{}:{} ({}) +/- {} bases, {} samples\n",
        query.chromosome,
        query.target,
        query.assembly,
        query.number_around,
        sequences.len()
    );
    for (sample, phased) in sequences {
        for phase in Phase::BOTH {
            let around = &phased[phase.index()];
            let center = if around.center.is_empty() {
                "-"
            } else {
                around.center.as_str()
            };
            println!(
                "{sample}  {phase}  {}[{center}]{}",
                around.before, around.after
            );
        }
    }
}
