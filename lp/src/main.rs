//! Logpipe - structured logging pipeline
//!
//! CLI entry point for emitting records and exercising the dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use clap::Parser;
use colored::*;
use dispatchq::ErrorPolicy;
use eyre::{Context, Result};
use tracing::{debug, info};

use logpipe::cli::{Cli, Command};
use logpipe::config::Config;
use logpipe::{Level, Logger, Pipeline, Tags};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    debug!(?level, "setup_logging: initialized");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Emit { messages, level, tags } => cmd_emit(&config, messages, level, tags),
        Command::Threads { threads, messages } => cmd_threads(&config, threads, messages),
        Command::Bench { messages } => cmd_bench(&config, messages),
    }
}

fn cmd_emit(config: &Config, messages: Vec<String>, level: Level, tags: Vec<(String, String)>) -> Result<()> {
    debug!(count = messages.len(), %level, "cmd_emit: called");
    let pipeline = Pipeline::from_config(config)?;
    let logger = pipeline.logger().extend(tags.into_iter().collect());
    for message in messages {
        logger.log(level, message);
    }
    drop(logger);
    pipeline.shutdown()
}

/// Logger with only a counting consumer attached
fn counting_logger(config: &Config) -> Result<(Logger, Arc<AtomicUsize>, dispatchq::Subscription)> {
    let logger: Logger =
        Logger::new(config.queue.clone(), ErrorPolicy::log_and_continue()).context("Failed to start dispatcher")?;
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let subscription = logger.subscribe(move |_: &Tags| {
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    });
    Ok((logger, delivered, subscription))
}

fn cmd_threads(config: &Config, threads: usize, messages: usize) -> Result<()> {
    debug!(threads, messages, "cmd_threads: called");
    let (logger, delivered, subscription) = counting_logger(config)?;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let logger = logger.extend(Tags::new().with("thread", t));
            thread::spawn(move || {
                for i in 0..messages {
                    logger.logf(Level::Info, "message {} from thread {}", &[&i, &t]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle
            .join()
            .map_err(|_| eyre::eyre!("Producer thread panicked"))?;
    }
    subscription.release();

    let count = delivered.load(Ordering::Relaxed);
    info!(count, "cmd_threads: done");
    println!(
        "{} Delivered {} of {} records from {} threads",
        "✓".green(),
        count,
        threads * messages,
        threads
    );
    Ok(())
}

fn cmd_bench(config: &Config, messages: usize) -> Result<()> {
    debug!(messages, "cmd_bench: called");
    let (logger, delivered, subscription) = counting_logger(config)?;

    let start = Instant::now();
    for i in 0..messages {
        logger.logf(Level::Info, "bench message {}", &[&i]);
    }
    let pushed = start.elapsed();
    logger.flush().context("Failed to flush dispatcher")?;
    let total = start.elapsed();
    subscription.release();

    let count = delivered.load(Ordering::Relaxed);
    let rate = count as f64 / total.as_secs_f64().max(f64::EPSILON);
    println!("{} {}", "Records:".cyan(), count);
    println!("{} {:?}", "Push time:".cyan(), pushed);
    println!("{} {:?}", "Total time:".cyan(), total);
    println!("{} {:.0} records/s", "Throughput:".cyan(), rate);
    Ok(())
}
