//! Headless mode for the game maker.
//!
//! This module provides a simple text-based interface for running one
//! session without the HTTP service. It's designed for automated testing
//! and quick experiments from a terminal.

use game_maker_core::{HeadlessGame, StageAgents};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// A line of input.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Status,
    Save(Option<&'a str>),
    Help,
    Unknown,
    /// Anything that is not a command is said to the agent.
    Say(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let Some(rest) = line.strip_prefix('#') else {
            return Command::Say(line);
        };
        let parts: Vec<&str> = rest.split_whitespace().collect();
        match parts.first().copied() {
            Some("quit") | Some("exit") => Command::Quit,
            Some("status") => Command::Status,
            Some("save") => Command::Save(parts.get(1).copied()),
            Some("help") => Command::Help,
            _ => Command::Unknown,
        }
    }
}

fn print_commands() {
    println!("  #quit        - Exit");
    println!("  #save <path> - Save the finished game as HTML");
    println!("  #status      - Show the session phase and book");
    println!("  #help        - Show this help");
}

/// Run one session over stdin and stdout.
///
/// This provides a simple line-oriented protocol:
/// - Lines starting with `#` are commands (quit, status, save, help)
/// - All other lines are sent to the agent
/// - Agent replies are printed after an `[AGENT <phase>]` marker
pub async fn run_headless(agents: Arc<StageAgents>) -> anyhow::Result<()> {
    let game = HeadlessGame::new(agents).await;

    println!("=== Game Maker Headless Mode ===");
    println!("Session: {}", game.session_id());
    println!();
    println!("Commands:");
    print_commands();
    println!();
    println!("[AGENT identifying]");
    println!("{}", game.greeting());
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Command::Quit => {
                println!("Goodbye!");
                break;
            }
            Command::Status => match game.status().await {
                Ok(status) => {
                    println!("[STATUS]");
                    println!("  Phase: {}", status.phase);
                    match status.book_info {
                        Some(book) => println!("  Book: {} by {}", book.title, book.author),
                        None => println!("  Book: (not identified yet)"),
                    }
                    println!("  Turns: {}", status.conversation_count);
                }
                Err(e) => println!("[ERROR] {e}"),
            },
            Command::Save(Some(path)) => match game.save(path).await {
                Ok(()) => println!("[SAVED] Game saved to {path}"),
                Err(e) => println!("[ERROR] Save failed: {e}"),
            },
            Command::Save(None) => println!("[ERROR] Usage: #save <path>"),
            Command::Help => {
                println!("[HELP]");
                print_commands();
                println!("  (anything else is sent to the agent)");
            }
            Command::Unknown => println!("[ERROR] Unknown command. Type #help for help."),
            Command::Say(text) => {
                print!("[PROCESSING]");
                stdout.flush().ok();

                let result = game.send(text).await;
                print!("\r            \r");
                stdout.flush().ok();

                match result {
                    Ok(response) => {
                        println!("[AGENT {}]", response.phase);
                        for para in response.message.split("\n\n") {
                            println!("{para}");
                        }
                        println!();
                        if let Some(error) = response.error {
                            println!("[ERROR] {error}");
                        }
                        if response.is_complete {
                            println!("[COMPLETE] Type #save <path> to write the game.");
                        }
                    }
                    Err(e) => println!("[ERROR] {e}"),
                }
            }
        }
        stdout.flush().ok();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("#quit"), Command::Quit);
        assert_eq!(Command::parse("#exit"), Command::Quit);
        assert_eq!(Command::parse("#status"), Command::Status);
        assert_eq!(Command::parse("#save game.html"), Command::Save(Some("game.html")));
        assert_eq!(Command::parse("#save"), Command::Save(None));
        assert_eq!(Command::parse("#help"), Command::Help);
        assert_eq!(Command::parse("#dance"), Command::Unknown);
        assert_eq!(Command::parse("#"), Command::Unknown);
    }

    #[test]
    fn test_plain_lines_are_said() {
        assert_eq!(
            Command::parse("I read Charlotte's Web"),
            Command::Say("I read Charlotte's Web")
        );
    }
}
