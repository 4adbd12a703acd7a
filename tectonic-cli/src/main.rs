//! tectonic-cli - Command-line interface for tectonic
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tectonic_client::{Client, ConnectionConfig};
use tectonic_protocol::DEFAULT_DB;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tectonic-cli")]
#[command(about = "Command-line interface for the tectonic tick database")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Server host [default: $TECTONIC_HOST or localhost]
    #[arg(long)]
    host: Option<String>,

    /// Server port [default: $TECTONIC_PORT or 9001]
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds to wait for each response
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Ping the server
    Ping,

    /// Get server info
    Info,

    /// Show the server's command help
    Help,

    /// Count rows across all databases
    Count {
        /// Count only rows held in memory
        #[arg(long)]
        in_mem: bool,
    },

    /// Create a database
    Create {
        /// Database name
        db: String,
    },

    /// Clear in-memory rows of the current database (or all with --all)
    Clear {
        #[arg(long)]
        all: bool,
    },

    /// Flush the current database to disk (or all with --all)
    Flush {
        #[arg(long)]
        all: bool,
    },

    /// Insert one row
    Insert {
        /// Timestamp (ms)
        ts: u64,

        /// Sequence number
        seq: u32,

        /// Price
        price: f32,

        /// Size
        size: f32,

        /// Row is a trade
        #[arg(long)]
        trade: bool,

        /// Row is on the bid side
        #[arg(long)]
        bid: bool,

        /// Target database
        #[arg(short, long, default_value = DEFAULT_DB)]
        db: String,
    },

    /// Bulk insert rows from a file, one `ts, seq, t|f, t|f, price, size;` per line
    BulkAdd {
        /// Row file
        file: PathBuf,

        /// Database to switch to first
        #[arg(short, long)]
        db: Option<String>,
    },

    /// Get the latest N rows as JSON
    Get {
        /// Number of rows
        n: u64,

        /// Database to switch to first
        #[arg(short, long)]
        db: Option<String>,
    },

    /// Get every row as JSON
    GetAll {
        /// Database to switch to first
        #[arg(short, long)]
        db: Option<String>,
    },

    /// Export rows in a timestamp range as CSV
    Range {
        /// Database name
        db: String,

        /// Range start
        start: u64,

        /// Range end
        finish: u64,
    },

    /// Follow new rows of a database until Ctrl+C
    Subscribe {
        /// Database name
        #[arg(default_value = DEFAULT_DB)]
        db: String,

        /// Milliseconds to wait after an empty poll
        #[arg(long, default_value_t = 10)]
        interval_ms: u64,
    },

    /// Measure insert round-trip latency
    Latency {
        /// Number of inserts
        #[arg(short, long, default_value_t = 10_000)]
        count: usize,

        /// Target database
        #[arg(short, long, default_value = DEFAULT_DB)]
        db: String,
    },

    /// Send a raw command line
    Raw {
        /// Command words, joined by spaces
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config =
        ConnectionConfig::from_env().with_request_timeout(Duration::from_secs(cli.timeout));
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let client = Client::connect(&config).await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(&client, &config).await?;
        }
        Some(Commands::Subscribe { db, interval_ms }) => {
            let Some(sub) = client.subscription(&db).await? else {
                eprintln!("{}: subscription to {} refused", "Error".red(), db.cyan());
                std::process::exit(1);
            };
            let sub = sub.with_poll_interval(Duration::from_millis(interval_ms));

            eprintln!("{} {}", "Subscribed to".green(), db.cyan());
            eprintln!("{}", "Press Ctrl+C to stop...".dimmed());

            loop {
                tokio::select! {
                    event = sub.next_raw() => {
                        match event {
                            Ok(Some(body)) => println!("{}", String::from_utf8_lossy(&body)),
                            Ok(None) => {
                                eprintln!("{}", "Subscription ended by server".yellow());
                                break;
                            }
                            Err(e) => {
                                eprintln!("{}: {}", "Error".red(), e);
                                std::process::exit(1);
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        eprintln!("\n{}", "Unsubscribing...".dimmed());
                        break;
                    }
                }
            }

            // A poll interrupted mid-frame leaves the session broken, in which
            // case there is nothing left to unsubscribe.
            let _ = sub.finish().await;
        }
        Some(cmd) => match commands::execute(&client, cmd).await {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                std::process::exit(1);
            }
        },
    }

    client.close().await?;
    Ok(())
}
