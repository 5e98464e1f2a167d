//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

use crate::config::DiffConfig;
use crate::pool::SelectionPolicy;

#[derive(Parser, Debug, Default)]
#[command(name = "rediff")]
#[command(about = "Diff two Redis instances and optionally copy A onto B", long_about = None)]
pub struct Args {
    /// Side A, `host[:port]` or `redis://` URL
    #[arg(short = 'a', long = "clienta")]
    pub client_a: Option<String>,

    /// Side B, `host[:port]` or `redis://` URL
    #[arg(short = 'b', long = "clientb")]
    pub client_b: Option<String>,

    /// Connections per side
    #[arg(short = 'p', long = "pool")]
    pub pool: Option<usize>,

    /// Minimum milliseconds between per-key dispatches
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Print keys present on only one side
    #[arg(short = 'u', long)]
    pub output_unique: bool,

    /// Print keys present on both sides
    #[arg(short = 's', long)]
    pub output_shared: bool,

    /// Print shared keys whose values differ
    #[arg(short = 'd', long)]
    pub output_different: bool,

    /// Hide progress and informational logs
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Make B match A after diffing
    #[arg(short = 'w', long)]
    pub write: bool,

    /// Keyspace scan pattern
    #[arg(long)]
    pub pattern: Option<String>,

    /// Glob of keys to leave out (repeatable)
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Cap on outstanding per-key tasks (0 = no cap)
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Connection selection policy
    #[arg(long = "select", value_enum)]
    pub select: Option<SelectionPolicy>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Config file (default: <config dir>/rediff/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Apply flags on top of a file-loaded config. Switches only turn
    /// options on; exclusions are appended.
    pub fn into_config(self, mut base: DiffConfig) -> DiffConfig {
        if self.client_a.is_some() {
            base.client_a = self.client_a;
        }
        if self.client_b.is_some() {
            base.client_b = self.client_b;
        }
        if let Some(pool) = self.pool {
            base.pool_size = pool;
        }
        if let Some(interval) = self.interval {
            base.interval_ms = interval;
        }
        if let Some(max) = self.max_in_flight {
            base.max_in_flight = max;
        }
        if let Some(select) = self.select {
            base.selection = select;
        }
        if let Some(pattern) = self.pattern {
            base.pattern = pattern;
        }
        base.exclude.extend(self.exclude);

        base.output_unique |= self.output_unique;
        base.output_shared |= self.output_shared;
        base.output_different |= self.output_different;
        base.quiet |= self.quiet;
        base.write |= self.write;
        base.json |= self.json;
        base
    }
}
