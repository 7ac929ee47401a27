use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "atlas")]
#[command(author, version, about = "Project journal days into a constellation atlas")]
#[command(propagate_version = true)]
pub struct Cli {
    /// SQLite database holding the atlas
    #[arg(long, global = true, env = "ATLAS_DB_PATH", default_value = "atlas.db")]
    pub db: PathBuf,

    /// JSON engine configuration; missing fields use defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for rolling log files; logging is off when absent
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true, env = "ATLAS_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add or update one day's star
    Record {
        /// Day as YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// Score vector as JSON, e.g. '{"empathy": 72}'
        #[arg(long)]
        scores: Option<String>,

        /// Keyword for the day (repeatable)
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// Date to connect this day to (repeatable)
        #[arg(long = "link")]
        links: Vec<String>,

        /// Journal length in characters
        #[arg(long)]
        content_length: Option<usize>,
    },

    /// Delete one day's star
    #[command(alias = "rm")]
    Remove {
        #[arg(long)]
        date: String,
    },

    /// Recompute clusters and derived connections
    Recluster {
        #[command(flatten)]
        window: WindowArgs,

        /// Skip the pass when nothing changed since the last one
        #[arg(long)]
        if_dirty: bool,
    },

    /// Print display coordinates as JSON
    Render {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Write the atlas document as JSON
    Export {
        /// Output file; stdout when absent
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replace the atlas with a JSON document
    Import {
        path: PathBuf,
    },

    /// Rank constellations against a score history file
    Insights {
        /// JSON object mapping YYYY-MM-DD to score vectors
        #[arg(long)]
        scores_file: PathBuf,

        #[arg(long, default_value_t = atlas_core::insight::DEFAULT_RANK_LIMIT)]
        limit: usize,
    },

    /// Show counts and the dirty flag
    Status,
}

#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    /// Only include days within this many days of today
    #[arg(long, conflicts_with = "since")]
    pub recent_days: Option<u32>,

    /// Only include days on or after this date
    #[arg(long)]
    pub since: Option<String>,
}
