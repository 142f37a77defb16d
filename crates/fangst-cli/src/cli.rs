use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fangst", about = "Inspect and maintain the Fångst local cache")]
pub struct Cli {
    /// Path to the cache database (overrides FANGST_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List catches saved by the local fallback
    Catches,

    /// List the comments cached for a catch
    Comments { catch_id: String },

    /// Delete a locally saved catch and its comments
    Remove { catch_id: String },

    /// Show every cache namespace with its entry count
    Namespaces,

    /// Render the offline feed (local catches plus placeholders)
    Feed {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check what a promo code would grant
    Promo { code: String },

    /// Save a demo catch against a slow in-memory remote store
    Demo {
        /// Remote write latency in milliseconds
        #[arg(long, default_value_t = 3_000)]
        delay_ms: u64,

        /// Owner uid for the demo catch
        #[arg(long, default_value = "demo-user")]
        owner: String,
    },
}
