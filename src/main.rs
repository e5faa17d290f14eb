//! Keyferry - keyspace migration between Redis-compatible stores
//!
//! This is the CLI entry point: parse flags, open both store handles, and
//! run the scan/restore pipeline to completion or first fatal error.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use keyferry::{Migrator, StoreHandle, DEFAULT_QUEUE_CAPACITY};

/// Keyferry - copy every key from one Redis-compatible store to another
///
/// Uses SCAN + pipelined DUMP on the source and pipelined RESTORE on the
/// destination. Values are transferred binary-exact, without TTLs.
#[derive(Parser, Debug)]
#[command(name = "keyferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source store address, e.g. 127.0.0.1:6379
    #[arg(long = "from", value_name = "ADDR", env = "KEYFERRY_FROM")]
    from: String,

    /// Destination store address, e.g. 127.0.0.1:6380
    #[arg(long = "to", value_name = "ADDR", env = "KEYFERRY_TO")]
    to: String,

    /// Source password (AUTH is skipped when empty)
    #[arg(
        long = "from-password",
        value_name = "PASSWORD",
        env = "KEYFERRY_FROM_PASSWORD",
        default_value = ""
    )]
    from_password: String,

    /// Destination password (AUTH is skipped when empty)
    #[arg(
        long = "to-password",
        value_name = "PASSWORD",
        env = "KEYFERRY_TO_PASSWORD",
        default_value = ""
    )]
    to_password: String,

    /// Source database index
    #[arg(long = "from-db", value_name = "DB", default_value_t = 0)]
    from_db: u32,

    /// Destination database index
    #[arg(long = "to-db", value_name = "DB", default_value_t = 0)]
    to_db: u32,

    /// Queue capacity in batches (one batch per scan page)
    #[arg(
        long = "queue-capacity",
        value_name = "BATCHES",
        default_value_t = DEFAULT_QUEUE_CAPACITY
    )]
    queue_capacity: usize,

    /// Log level: trace, debug, info, warn, error
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        env = "KEYFERRY_LOG_LEVEL",
        default_value = "warn"
    )]
    log_level: String,
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn password(raw: &str) -> Option<&str> {
    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}

async fn run(cli: &Cli) -> ExitCode {
    info!(
        from = %cli.from,
        from_db = cli.from_db,
        to = %cli.to,
        to_db = cli.to_db,
        queue_capacity = cli.queue_capacity,
        "starting migration"
    );

    let source = match StoreHandle::connect(&cli.from, cli.from_db, password(&cli.from_password))
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("source: {}", e);
            eprintln!("keyferry: source: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let destination =
        match StoreHandle::connect(&cli.to, cli.to_db, password(&cli.to_password)).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("destination: {}", e);
                eprintln!("keyferry: destination: {}", e);
                return ExitCode::FAILURE;
            }
        };

    let migrator = Migrator::new(source, destination).with_queue_capacity(cli.queue_capacity);

    match migrator.run().await {
        Ok(summary) => {
            println!();
            println!(
                "Sync done. {} keys in {} batches ({} skipped) in {:.1}s.",
                summary.keys_restored,
                summary.pages,
                summary.keys_skipped,
                summary.elapsed.as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!();
            eprintln!("keyferry: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    run(&cli).await
}
