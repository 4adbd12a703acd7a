//! Command execution.

use crate::Commands;
use colored::Colorize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tectonic_client::Client;
use tectonic_protocol::{Response, Update};

/// Executes a command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl => unreachable!(),

        // Subscribe streams events; handled in main.rs
        Commands::Subscribe { .. } => unreachable!(),

        Commands::Ping => Ok(format_response(&client.ping().await?)),

        Commands::Info => Ok(format_response(&client.info().await?)),

        Commands::Help => Ok(format_response(&client.help().await?)),

        Commands::Count { in_mem } => {
            let response = if in_mem {
                client.count_all_in_mem().await?
            } else {
                client.count_all().await?
            };
            Ok(format_response(&response))
        }

        Commands::Create { db } => {
            let response = client.create(&db).await?;
            if response.success {
                Ok(format!("{} database {}", "Created".green(), db.cyan()))
            } else {
                Ok(format_response(&response))
            }
        }

        Commands::Clear { all } => {
            let response = if all {
                client.clear_all().await?
            } else {
                client.clear().await?
            };
            Ok(format_response(&response))
        }

        Commands::Flush { all } => {
            let response = if all {
                client.flush_all().await?
            } else {
                client.flush().await?
            };
            Ok(format_response(&response))
        }

        Commands::Insert {
            ts,
            seq,
            price,
            size,
            trade,
            bid,
            db,
        } => {
            let update = Update::new(ts, seq, trade, bid, price, size);
            Ok(format_response(&client.insert(&update, &db).await?))
        }

        Commands::BulkAdd { file, db } => {
            let content = std::fs::read_to_string(&file)?;
            let rows = parse_rows(&content)?;
            tracing::debug!("Parsed {} rows from {}", rows.len(), file.display());

            if let Some(db) = db {
                switch_db(client, &db).await?;
            }

            let result = client.bulk_add(rows).await?;
            let summary = format!(
                "{} {} rows ({} rejected)",
                "Sent".green(),
                result.rows,
                result.rejected
            );
            Ok(format!("{}\n{}", summary, format_response(&result.response)))
        }

        Commands::Get { n, db } => {
            if let Some(db) = db {
                switch_db(client, &db).await?;
            }
            match client.get(n).await? {
                Some(value) => Ok(format_json(&value)),
                None => Ok("No data".yellow().to_string()),
            }
        }

        Commands::GetAll { db } => {
            if let Some(db) = db {
                switch_db(client, &db).await?;
            }
            match client.get_all().await? {
                Some(value) => Ok(format_json(&value)),
                None => Ok("No data".yellow().to_string()),
            }
        }

        Commands::Range { db, start, finish } => {
            let response = client.range(&db, start, finish).await?;
            if response.success {
                Ok(String::from_utf8_lossy(&response.body).into_owned())
            } else {
                Ok(format_response(&response))
            }
        }

        Commands::Latency { count, db } => {
            let update = Update::new(0, 0, true, true, 0.0, 0.0);
            let mut samples = Vec::with_capacity(count);
            let mut failed = 0;

            for _ in 0..count {
                let started = Instant::now();
                let response = client.insert(&update, &db).await?;
                samples.push(started.elapsed());
                if !response.success {
                    failed += 1;
                }
            }

            Ok(format_latency(&samples, failed))
        }

        Commands::Raw { command } => Ok(format_response(&client.execute(&command.join(" ")).await?)),
    }
}

/// Parses one row per non-blank line.
fn parse_rows(content: &str) -> Result<Vec<Update>, tectonic_protocol::ProtocolError> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect()
}

async fn switch_db(client: &Client, db: &str) -> Result<(), Box<dyn std::error::Error>> {
    let response = client.use_db(db).await?;
    if !response.success {
        return Err(format!(
            "cannot use {}: {}",
            db,
            String::from_utf8_lossy(&response.body)
        )
        .into());
    }
    Ok(())
}

/// Formats a raw response: status tag plus body text.
pub fn format_response(response: &Response) -> String {
    let status = if response.success {
        "OK".green()
    } else {
        "ERR".red()
    };
    let body = String::from_utf8_lossy(&response.body);
    let body = body.trim_end();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{} {}", status, body)
    }
}

fn format_latency(samples: &[Duration], failed: usize) -> String {
    if samples.is_empty() {
        return "No samples".yellow().to_string();
    }

    let total: Duration = samples.iter().sum();
    let avg = Duration::from_nanos((total.as_nanos() / samples.len() as u128) as u64);
    let min = samples.iter().min().copied().unwrap_or_default();
    let max = samples.iter().max().copied().unwrap_or_default();

    format!(
        "{} inserts ({} failed)\n  AVG: {:?}\n  MIN: {:?}\n  MAX: {:?}",
        samples.len(),
        failed,
        avg,
        min,
        max
    )
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
