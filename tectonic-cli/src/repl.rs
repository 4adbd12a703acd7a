//! Interactive REPL.
//!
//! Every line is sent to the server verbatim. Lines starting with `.` are
//! handled locally.

use crate::commands::format_response;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tectonic_client::{Client, ConnectionConfig, PollResult};

const HELP_TEXT: &str = r#"
Lines are sent to the server as-is, e.g.:
  PING | INFO | HELP | COUNT ALL
  CREATE <db> | USE <db>
  ADD <ts>, <seq>, <t|f>, <t|f>, <price>, <size>;
  GET <n> AS JSON | GET ALL AS JSON
  SUBSCRIBE <db> | UNSUBSCRIBE

Local commands:
  .help                         Show this help
  .poll                         Poll a subscribed session once
  .quit, quit, exit             Exit the REPL
"#;

/// What the REPL does with one input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Skip,
    Help,
    Poll,
    Quit,
    Unknown(&'a str),
    Send(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Skip,
        ".help" | ".h" => Input::Help,
        ".poll" | ".p" => Input::Poll,
        ".quit" | ".q" | "quit" | "exit" => Input::Quit,
        _ if line.starts_with('.') => Input::Unknown(line),
        _ => Input::Send(line),
    }
}

pub async fn run(client: &Client, config: &ConnectionConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "tectonic CLI".bold().cyan());
    println!("{} {}", "Connected to".green(), config.addr());

    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(rl_config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".tectonic_history"))
        .unwrap_or_else(|_| ".tectonic_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type '.help' for available commands.\n");

    loop {
        let prompt = if client.is_subscribed() {
            format!("{} ", "tectonic[sub]>".cyan())
        } else {
            format!("{} ", "tectonic>".cyan())
        };

        match rl.readline(&prompt) {
            Ok(line) => match classify(&line) {
                Input::Skip => continue,
                Input::Help => println!("{}", HELP_TEXT),
                Input::Quit => break,
                Input::Unknown(cmd) => {
                    println!("Unknown command: {}. Type '.help' for help.\n", cmd)
                }
                Input::Poll => match client.poll_event().await {
                    Ok(PollResult::NoData) => println!("{}\n", "NONE".dimmed()),
                    Ok(PollResult::Event(body)) => {
                        println!("{}\n", String::from_utf8_lossy(&body))
                    }
                    Ok(PollResult::Rejected(body)) => println!(
                        "{} {}\n",
                        "ERR".red(),
                        String::from_utf8_lossy(&body).trim_end()
                    ),
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                },
                Input::Send(text) => {
                    let result = if let Some(db) = text.strip_prefix("SUBSCRIBE ") {
                        client.subscribe(db.trim()).await
                    } else if text == "UNSUBSCRIBE" {
                        client.unsubscribe().await
                    } else {
                        client.execute(text).await
                    };
                    match result {
                        Ok(response) => println!("{}\n", format_response(&response)),
                        Err(e) => {
                            println!("{}: {}\n", "Error".red(), e);
                            if e.is_fatal() {
                                break;
                            }
                        }
                    }
                }
            },
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}
