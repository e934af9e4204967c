//! CLI module for the Seedora API
//!
//! - `serve`: run the HTTP server (default)
//! - `key-stats`: inspect a stored API key and its usage records

pub mod key_stats;
pub mod serve;

use clap::{Parser, Subcommand};

/// Seedora API - DFU risk prediction backend
#[derive(Parser)]
#[command(name = "seedora-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Show call counters and usage records for a stored key
    KeyStats(key_stats::KeyStatsArgs),
}
