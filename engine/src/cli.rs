//! CLI interface for variantd
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Variant question generator
///
/// Turns one multiple-choice exam question into several validated variants
/// that test the same knowledge point.
#[derive(Parser, Debug)]
#[command(name = "variantd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP gateway
    Serve {
        /// Bind address (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Generate variants once and print them
    Generate {
        /// Source question text
        #[arg(short, long)]
        question: String,

        /// Number of variants (1-5)
        #[arg(short, long, default_value = "3")]
        num: i64,
    },

    /// Validate configuration, secrets and provider reachability
    Check,
}
