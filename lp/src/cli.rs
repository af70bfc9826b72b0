//! CLI argument parsing for logpipe

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::level::Level;

#[derive(Parser, Debug)]
#[command(name = "lp")]
#[command(author, version, about = "Structured logging pipeline on an ordered dispatch queue", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level for logpipe's own diagnostics (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log messages through the configured consumers
    Emit {
        /// Messages to log, one record each
        #[arg(required = true)]
        messages: Vec<String>,

        /// Record level
        #[arg(short = 'L', long, default_value = "info")]
        level: Level,

        /// Extra tag as key=value (repeatable)
        #[arg(short, long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },

    /// Log from several threads at once and report how many records arrived
    Threads {
        /// Number of producer threads
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Messages per thread
        #[arg(short, long, default_value = "1000")]
        messages: usize,
    },

    /// Measure dispatch throughput with a counting consumer
    Bench {
        /// Number of messages to log
        #[arg(short, long, default_value = "100000")]
        messages: usize,
    },
}

/// Parse a `key=value` tag argument
pub fn parse_tag(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid tag '{}': expected key=value", s)),
    }
}
