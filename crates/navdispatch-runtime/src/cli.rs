//! CLI definition using clap derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "navdispatch", about = "navigation dispatch policy")]
pub struct Cli {
    /// Dispatch config (TOML)
    #[arg(long, short = 'c', global = true, env = "NAVDISPATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host handler table (TOML)
    #[arg(long, global = true, env = "NAVDISPATCH_HOST")]
    pub host: Option<PathBuf>,

    /// Log decisions at debug level
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decide one navigation and print the dispatch as JSON
    Decide(DecideOpts),
    /// Replay scenario files, exit non-zero on any mismatch
    Replay(ReplayOpts),
    /// Decode a descriptor URL to JSON
    Decode(DecodeOpts),
    /// Read descriptor JSON from stdin and print its URL
    Encode,
}

#[derive(clap::Args)]
pub struct DecideOpts {
    /// Destination URL
    #[arg(long)]
    pub url: String,

    #[arg(long)]
    pub referrer: Option<String>,

    /// Transition flags, e.g. `link` or `link,from_external_launch`
    #[arg(long, default_value = "link")]
    pub transition: String,

    #[arg(long)]
    pub redirect: bool,

    #[arg(long)]
    pub gesture: bool,

    /// Gesture timestamp in epoch milliseconds (default: now)
    #[arg(long)]
    pub gesture_at_ms: Option<i64>,

    #[arg(long)]
    pub incognito: bool,

    /// Navigation happens in a background tab
    #[arg(long)]
    pub background: bool,

    /// Navigation happens in a subframe
    #[arg(long)]
    pub subframe: bool,

    /// Scoped app the navigation runs under
    #[arg(long)]
    pub scope: Option<String>,

    #[arg(long)]
    pub new_tab: bool,

    #[arg(long)]
    pub no_foreground_required: bool,

    /// Descriptor URL that opened the tab from another application
    #[arg(long)]
    pub origin: Option<String>,

    /// Decide without feeding the navigation to the chain tracker
    #[arg(long)]
    pub untracked: bool,
}

#[derive(clap::Args)]
pub struct ReplayOpts {
    /// Scenario files (JSON)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print every step, not only failures
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args)]
pub struct DecodeOpts {
    pub url: String,
}
