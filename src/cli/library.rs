use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use crate::cli::{load_library, OutputFormat};
use crate::library::TileLibrary;

#[derive(Args)]
pub struct LibraryArgs {
    #[command(subcommand)]
    pub command: LibraryCommands,
}

#[derive(Subcommand)]
pub enum LibraryCommands {
    /// Summarize a library: settings, counts, and per-path statistics
    Info {
        /// Library file (JSON, optionally gzipped)
        #[arg(required = true)]
        library: PathBuf,
    },

    /// Recompute spanning statistics and write an updated library
    RefreshStats {
        /// Library file (JSON, optionally gzipped)
        #[arg(required = true)]
        library: PathBuf,

        /// Output file (gzipped if it ends in .gz)
        #[arg(short, long, required = true)]
        output: PathBuf,
    },

    /// Check a library and write it back out in canonical form
    Export {
        /// Library file (JSON, optionally gzipped)
        #[arg(required = true)]
        library: PathBuf,

        /// Output file (gzipped if it ends in .gz)
        #[arg(short, long, required = true)]
        output: PathBuf,
    },
}

/// Execute library subcommand
///
/// # Errors
///
/// Returns an error if the library cannot be loaded or written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: LibraryArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        LibraryCommands::Info { library } => run_info(&library, format, verbose),
        LibraryCommands::RefreshStats { library, output } => {
            run_refresh_stats(&library, &output, format, verbose)
        }
        LibraryCommands::Export { library, output } => run_export(&library, &output, verbose),
    }
}

struct PathSummary {
    path: u32,
    chromosome: Option<String>,
    num_steps: Option<u32>,
    variants: usize,
    max_span: Option<u32>,
}

fn summarize_paths(library: &TileLibrary) -> anyhow::Result<Vec<PathSummary>> {
    let mut paths: Vec<u32> = library.paths().map(|p| p.path).collect();
    paths.extend(library.populated_paths());
    paths.sort_unstable();
    paths.dedup();

    paths
        .into_iter()
        .map(|path| -> anyhow::Result<PathSummary> {
            let info = library.path_info(path);
            Ok(PathSummary {
                path,
                chromosome: info.map(|i| i.chromosome.to_string()),
                num_steps: info.map(|i| i.num_steps),
                variants: library.variants_in_path(path)?.count(),
                max_span: library.cached_max_span(path),
            })
        })
        .collect()
}

fn run_info(path: &Path, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let library = load_library(path, verbose)?;
    let config = library.config();
    let paths = summarize_paths(&library)?;
    let assemblies: Vec<String> = library.assemblies().iter().map(ToString::to_string).collect();

    match format {
        OutputFormat::Text => {
            println!("Tile Library: {}\n", path.display());
            println!("Tag length:       {}", config.tag_length);
            println!(
                "Address widths:   path {} / version {} / step {} / variant {}",
                config.address.path_digits,
                config.address.version_digits,
                config.address.step_digits,
                config.address.variant_digits
            );
            println!("Path version:     {:#x}", config.path_version);
            println!("Tile variants:    {}", library.len());
            println!("Loci:             {}", library.num_loci());
            println!("Genome variants:  {}", library.num_genome_variants());
            println!("Assemblies:       {}", assemblies.join(", "));

            println!(
                "\n{:<8} {:<12} {:>8} {:>10} {:>9}",
                "Path", "Chromosome", "Steps", "Variants", "Max span"
            );
            println!("{}", "-".repeat(51));
            for p in &paths {
                println!(
                    "{:<8} {:<12} {:>8} {:>10} {:>9}",
                    format!("{:#x}", p.path),
                    p.chromosome.as_deref().unwrap_or("-"),
                    p.num_steps.map_or_else(|| "-".to_string(), |n| n.to_string()),
                    p.variants,
                    p.max_span.map_or_else(|| "-".to_string(), |n| n.to_string()),
                );
            }
        }
        OutputFormat::Json => {
            let path_entries: Vec<_> = paths
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "path": p.path,
                        "chromosome": p.chromosome,
                        "num_steps": p.num_steps,
                        "tile_variants": p.variants,
                        "max_num_positions_spanned": p.max_span,
                    })
                })
                .collect();
            let output = serde_json::json!({
                "tag_length": config.tag_length,
                "address": config.address,
                "path_version": config.path_version,
                "tile_variants": library.len(),
                "loci": library.num_loci(),
                "genome_variants": library.num_genome_variants(),
                "assemblies": assemblies,
                "paths": path_entries,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("path\tchromosome\tnum_steps\ttile_variants\tmax_num_positions_spanned");
            for p in &paths {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    p.path,
                    p.chromosome.as_deref().unwrap_or(""),
                    p.num_steps.map_or_else(String::new, |n| n.to_string()),
                    p.variants,
                    p.max_span.map_or_else(String::new, |n| n.to_string()),
                );
            }
        }
    }
    Ok(())
}

fn run_refresh_stats(
    path: &Path,
    output: &Path,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut library = load_library(path, verbose)?;
    let before: Vec<Option<u32>> = library
        .populated_paths()
        .into_iter()
        .map(|p| library.cached_max_span(p))
        .collect();
    let fresh = library.recompute_spanning_statistics()?;
    library.save_to_file(output)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&fresh)?);
        }
        OutputFormat::Text | OutputFormat::Tsv => {
            let changed = fresh
                .iter()
                .zip(&before)
                .filter(|(s, old)| **old != Some(s.max_num_positions_spanned))
                .count();
            println!(
                "Recomputed {} spanning statistics ({changed} changed), wrote {}",
                fresh.len(),
                output.display()
            );
        }
    }
    Ok(())
}

fn run_export(path: &Path, output: &Path, verbose: bool) -> anyhow::Result<()> {
    let library = load_library(path, verbose)?;
    library.save_to_file(output)?;
    println!(
        "Exported {} tile variants to {}",
        library.len(),
        output.display()
    );
    Ok(())
}
