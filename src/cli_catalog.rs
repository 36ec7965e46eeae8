use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use metadata_catalog_server::analyzer::{load_snapshot, run_feeds, AnalyzerFeed};
use metadata_catalog_server::server::parse_time;
use metadata_catalog_server::{CatalogPath, CatalogService, Payload, RemoteCatalog};

#[derive(Parser, Debug)]
#[command(name = "cli-catalog")]
#[command(about = "Inspect and edit a remote metadata catalog")]
struct CliArgs {
    /// Base URL of the catalog server.
    #[clap(long, default_value = "http://localhost:3001")]
    pub url: String,

    /// Request timeout in seconds.
    #[clap(long, default_value_t = 30)]
    pub timeout_sec: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a path with an empty document, or bumps its version.
    Touch { path: String },

    /// Writes a JSON object at a path. Patches by default.
    Write {
        path: String,
        /// JSON object, or @file to read it from a file.
        metadata: String,
        /// Type tag of the document.
        #[clap(long = "type", default_value = "")]
        doc_type: String,
        /// Replace the stored document instead of merging into it.
        #[clap(long)]
        put: bool,
    },

    /// Removes a path and, unless --no-cascade is given, its descendants.
    Rm {
        path: String,
        #[clap(long)]
        no_cascade: bool,
    },

    /// Lists the children of a path.
    Ls {
        #[clap(default_value = "/")]
        path: String,
        /// Point in time to list at (RFC 3339).
        #[clap(long, value_parser = parse_time)]
        time: Option<DateTime<Utc>>,
    },

    /// Prints the document stored at a path.
    Read {
        path: String,
        #[clap(long, value_parser = parse_time)]
        time: Option<DateTime<Utc>>,
    },

    /// Searches documents, e.g. `type:profile path:/db orders`.
    Search {
        query: String,
        #[clap(long, value_parser = parse_time)]
        time: Option<DateTime<Utc>>,
    },

    /// Prints every version written at a path.
    History { path: String },

    /// Writes the documents of a JSON snapshot file as patches.
    Load { snapshot: PathBuf },

    /// Prints the server status.
    Status,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_metadata(raw: &str) -> Result<Payload> {
    let text = match raw.strip_prefix('@') {
        Some(file) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read metadata file {}", file))?,
        None => raw.to_string(),
    };
    let value: serde_json::Value =
        serde_json::from_str(&text).context("Metadata is not valid JSON")?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("Metadata must be a JSON object"),
    }
}

fn execute(catalog: &RemoteCatalog, command: Command) -> Result<()> {
    match command {
        Command::Touch { path } => catalog.touch(&path)?,
        Command::Write {
            path,
            metadata,
            doc_type,
            put,
        } => catalog.write(&path, &doc_type, parse_metadata(&metadata)?, !put)?,
        Command::Rm { path, no_cascade } => catalog.rm(&path, !no_cascade)?,
        Command::Ls { path, time } => match catalog.ls(&path, time)? {
            Some(children) => {
                for child in children {
                    println!("{}", child);
                }
            }
            None => bail!("{} not found", path),
        },
        Command::Read { path, time } => match catalog.read(&path, time)? {
            Some(document) => print_json(&document)?,
            None => bail!("{} not found", path),
        },
        Command::Search { query, time } => {
            for hit in catalog.search(&query, time)? {
                println!("{}\t{}", hit.path, hit.document.doc_type);
            }
        }
        Command::History { path } => match catalog.history(&path)? {
            Some(records) => print_json(&records)?,
            None => bail!("{} not found", path),
        },
        Command::Load { snapshot } => {
            let feeds = load_snapshot(&snapshot)?;
            let paths: Vec<CatalogPath> = feeds
                .iter()
                .flat_map(|feed| feed.paths().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let feeds: Vec<&dyn AnalyzerFeed> =
                feeds.iter().map(|feed| feed as &dyn AnalyzerFeed).collect();
            let report = run_feeds(catalog, &feeds, &paths)?;
            println!(
                "{} documents written, {} skipped",
                report.written, report.skipped
            );
        }
        Command::Status => print_json(&catalog.status()?)?,
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .init();

    let args = CliArgs::parse();
    let catalog = RemoteCatalog::new(&args.url, Duration::from_secs(args.timeout_sec))?;
    execute(&catalog, args.command)
}
