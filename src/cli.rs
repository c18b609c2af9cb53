//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Archive the full-text sources of a bibliography.
///
/// Bibarchive reads a BibTeX collection (or a Zotero group library), finds
/// the best reachable copy of each record's source and stores it under
/// content-derived identifiers.
#[derive(Parser, Debug)]
#[command(name = "bibarchive")]
#[command(author, version, about)]
pub struct Args {
    /// BibTeX file to archive (`-` reads stdin), or a Zotero group id with --zotero
    pub source: String,

    /// Treat SOURCE as a Zotero group id
    #[arg(long)]
    pub zotero: bool,

    /// Configuration file (default: $XDG_CONFIG_HOME/bibarchive/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory the archive is written to
    #[arg(short = 'd', long, value_name = "DIR", default_value = "./archive")]
    pub out_dir: PathBuf,

    /// Acquire and report without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the collection back with URLs pointing at the archived files
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Contact email for Unpaywall open-access lookups
    #[arg(long, value_name = "EMAIL")]
    pub email: Option<String>,

    /// Convert HTML pages to self-contained snapshots with monolith
    #[arg(long)]
    pub snapshot: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
