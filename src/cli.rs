//! Command-line interface definitions.
//!
//! Global options override the settings file; everything else selects which
//! sources to run.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use capitol_statements::registry::SourceGroup;

/// Collect press releases from congressional feeds and websites.
///
/// # Examples
///
/// ```sh
/// # Two RSS feeds
/// capitol_statements feed https://amo.house.gov/rss.xml https://hageman.house.gov/rss.xml
///
/// # Second page of two named scrapers, written to a file
/// capitol_statements -o out/crapo.json scrape crapo shaheen --page 2
///
/// # Every committee entry
/// capitol_statements group committee
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a settings YAML file
    #[arg(short, long, global = true, env = "CAPITOL_STATEMENTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write JSON here instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Number of sources fetched at once
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Read RSS or Atom feeds
    Feed {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Run named scrapers from the registry
    Scrape {
        #[arg(required = true)]
        names: Vec<String>,
        /// Listing page to read (defaults to each entry's first page)
        #[arg(long)]
        page: Option<u32>,
        /// Read these URLs with the named rule instead of its own URLs
        #[arg(long = "url")]
        urls: Vec<String>,
    },
    /// Run every registry entry in a group
    Group {
        group: GroupArg,
        #[arg(long)]
        page: Option<u32>,
    },
    /// List registry entries
    List,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupArg {
    Member,
    Committee,
}

impl From<GroupArg> for SourceGroup {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::Member => SourceGroup::Member,
            GroupArg::Committee => SourceGroup::Committee,
        }
    }
}
