//! `apicat` command-line driver.
//!
//! - `apicat build --units DIR --out FILE` ingests every unit file below DIR
//!   and writes a catalog.
//! - `apicat info FILE` prints catalog statistics.
//! - `apicat show FILE FINGERPRINT` prints one API with its declarations,
//!   availability and usage.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apicat_core::config::{compression_level_from_env, unit_workers_from_env};
use apicat_core::{Catalog, CatalogBuilder, CatalogError, CatalogResult, Fingerprint};
use apicat_core::{IngestOptions, WriterOptions};

#[derive(Debug, Parser)]
#[command(name = "apicat")]
#[command(version, about = "Build and inspect API catalog files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a catalog from a directory of unit files.
    Build {
        /// Directory scanned recursively for `*.json` unit files.
        #[arg(long)]
        units: PathBuf,
        /// Catalog file to write.
        #[arg(long)]
        out: PathBuf,
        /// Deflate level, 0-9.
        #[arg(long, default_value_t = compression_level_from_env())]
        compression_level: u32,
        /// Parser threads.
        #[arg(long, default_value_t = unit_workers_from_env())]
        workers: usize,
    },
    /// Print catalog statistics.
    Info {
        file: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print one API.
    Show { file: PathBuf, fingerprint: String },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build {
            units,
            out,
            compression_level,
            workers,
        } => build(&units, &out, compression_level, workers),
        Commands::Info { file, json } => show_info(&file, json),
        Commands::Show { file, fingerprint } => show_api(&file, &fingerprint),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build(units: &Path, out: &Path, compression_level: u32, workers: usize) -> CatalogResult<()> {
    let mut builder = CatalogBuilder::new();
    builder.index_directory(units, &IngestOptions { workers: workers.max(1) })?;
    let report = builder.report().clone();

    // Staged beside the target; renamed only after a complete write.
    let staging = out.with_extension("partial");
    let file = File::create(&staging)?;
    let mut writer = BufWriter::new(file);
    let options = WriterOptions::default().with_compression_level(compression_level);
    let summary = builder.build(&mut writer, &options)?;
    writer.flush()?;
    drop(writer);
    fs::rename(&staging, out)?;

    info!(
        out = %out.display(),
        units = report.units,
        usage_units = report.usage_units,
        files_failed = report.files_failed,
        apis = report.apis_defined,
        apis_dropped = report.apis_dropped,
        declarations = report.declarations_defined,
        placeholders = summary.placeholders_patched,
        syntax_blobs = summary.syntax_blobs_written,
        syntax_reused = summary.syntax_blobs_reused,
        "catalog built"
    );
    println!(
        "wrote {} ({} bytes uncompressed)",
        out.display(),
        summary.total_size()
    );
    Ok(())
}

fn show_info(file: &Path, json: bool) -> CatalogResult<()> {
    let catalog = Catalog::open(file)?;
    let stats = catalog.statistics();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{stats}");
    }
    Ok(())
}

fn show_api(file: &Path, fingerprint: &str) -> CatalogResult<()> {
    let catalog = Catalog::open(file)?;
    let fingerprint: Fingerprint = fingerprint.parse()?;
    let api = catalog
        .api_by_fingerprint(&fingerprint)
        .ok_or_else(|| CatalogError::Format(format!("no API with fingerprint {fingerprint}")))?;

    println!("{} ({:?})", api.full_name(), api.kind());
    println!("fingerprint {}", api.fingerprint());

    println!("declarations:");
    for declaration in api.declarations() {
        let assembly = declaration.assembly();
        println!("  {} {}", assembly.name(), assembly.version());
        println!("    {}", declaration.syntax_text());
        if let Some(obsoletion) = declaration.obsoletion() {
            let severity = if obsoletion.is_error() { "error" } else { "warning" };
            println!("    obsolete ({severity}): {}", obsoletion.message());
        }
    }

    println!("availability:");
    for entry in api.availability().frameworks {
        match entry.package {
            None => println!("  {} (in-box)", entry.framework.name()),
            Some((package, folder)) => println!(
                "  {} via {} {} [{}]",
                entry.framework.name(),
                package.name(),
                package.version(),
                folder.name()
            ),
        }
    }

    let usages: Vec<_> = api.usages().collect();
    if !usages.is_empty() {
        println!("usage:");
        for usage in usages {
            let source = usage.usage_source();
            let date = source.date().map(|d| d.to_string()).unwrap_or_default();
            println!("  {} {date}: {:.2}%", source.name(), usage.percentage() * 100.0);
        }
    }

    let children = api.sorted_children();
    if !children.is_empty() {
        println!("children:");
        for child in children {
            println!("  {} {}", child.fingerprint(), child.name());
        }
    }
    Ok(())
}
