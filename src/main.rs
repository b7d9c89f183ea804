//! # Capitol Statements
//!
//! Command-line front end: loads settings and the rule registry, turns the
//! subcommand into a list of sources, runs them as one batch and writes the
//! outcome as JSON.
//!
//! ## Usage
//!
//! ```sh
//! capitol_statements feed https://hageman.house.gov/rss.xml
//! capitol_statements scrape crapo recordlist --page 2
//! capitol_statements group committee -o committee.json
//! capitol_statements list
//! ```
//!
//! Logs go to stderr so stdout carries only JSON.

use chrono::Local;
use clap::Parser;
use serde::Serialize;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use capitol_statements::config::Settings;
use capitol_statements::outputs::json;
use capitol_statements::registry::{Registry, SourceGroup};
use capitol_statements::{BatchRunner, HttpFetcher, Pipeline, Source};
use cli::{Cli, Command};

#[derive(Serialize)]
struct ListingEntry<'a> {
    name: &'a str,
    group: SourceGroup,
    first_page: u32,
    urls: &'a [String],
}

fn load_settings(args: &Cli) -> Result<Settings, Box<dyn Error>> {
    let mut settings = match &args.config {
        Some(path) => {
            let settings = Settings::load(path)?;
            info!(path = %path.display(), "Loaded settings");
            settings
        }
        None => Settings::default(),
    };
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = timeout;
    }
    if let Some(concurrency) = args.concurrency {
        settings.concurrency = concurrency;
    }
    settings.validate()?;
    Ok(settings)
}

fn load_registry(settings: &Settings) -> Result<Registry, Box<dyn Error>> {
    let mut registry = Registry::builtin()?;
    for path in &settings.registry_files {
        let added = registry.extend_from_file(path)?;
        info!(path = %path.display(), added, "Merged rule table");
    }
    Ok(registry)
}

fn select_sources(command: &Command, registry: &Registry) -> Result<Vec<Source>, Box<dyn Error>> {
    let sources = match command {
        Command::Feed { urls } => urls.iter().map(Source::feed).collect(),
        Command::Scrape { names, page, urls } => {
            let mut sources = Vec::new();
            for name in names {
                let entry = registry.get(name)?;
                if urls.is_empty() {
                    sources.extend(entry.sources(*page));
                } else {
                    sources.extend(urls.iter().map(|url| entry.at(url)));
                }
            }
            sources
        }
        Command::Group { group, page } => registry
            .group((*group).into())
            .into_iter()
            .flat_map(|entry| entry.sources(*page))
            .collect(),
        Command::List => Vec::new(),
    };
    Ok(sources)
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(command = ?args.command, "Parsed CLI arguments");

    let settings = load_settings(&args)?;
    let registry = load_registry(&settings)?;

    if args.command == Command::List {
        let listing: Vec<ListingEntry<'_>> = registry
            .names()
            .into_iter()
            .filter_map(|name| registry.get(name).ok())
            .map(|entry| ListingEntry {
                name: &entry.name,
                group: entry.group,
                first_page: entry.first_page,
                urls: &entry.urls,
            })
            .collect();
        return json::write_json(&listing, args.output.as_deref()).await;
    }

    let sources = select_sources(&args.command, &registry)?;
    info!(
        sources = sources.len(),
        concurrency = settings.concurrency,
        timeout_secs = settings.timeout_secs,
        "Starting batch"
    );

    let fetcher = HttpFetcher::new(&settings.user_agent)?;
    let options = settings.pipeline_options(Local::now().date_naive());
    let runner = BatchRunner::new(Pipeline::new(fetcher, options), settings.concurrency);
    let outcome = runner.run(&sources).await;

    json::write_outcome(&outcome, args.output.as_deref()).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        records = outcome.records.len(),
        failures = outcome.failures.len(),
        "Execution complete"
    );
    Ok(())
}
