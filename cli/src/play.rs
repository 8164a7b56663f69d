//! Interactive play loop.
//!
//! Lines starting with `/` go through chat handling (`/shell Rat`,
//! `/shell setup`); everything else is a panel or tool action.

use std::sync::Arc;

use shell_game::camera::Point;
use shell_game::command::{self, ChatCommand};
use shell_game::{ChatOutcome, ShellClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::error::CliError;
use crate::host::{RoomView, Terminal};

pub const HELP: &str = "\
commands:
  /shell NAME        start a ready check for tokens named NAME (GM)
  /shell setup       open the decoy tool (GM)
  ready | no         answer the open ready check
  begin              start the shuffle once everyone is ready (GM)
  select ID          pick the decoy source token
  place              place a decoy at the next click
  click X Y          click the scene at X,Y
  tokens             list tokens
  who                list participants
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Chat(String),
    Ready,
    No,
    Begin,
    Select(String),
    Place,
    Click(Point),
    Tokens,
    Who,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

#[must_use]
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line.starts_with('/') {
        return Input::Chat(line.to_owned());
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();
    match (verb, rest.as_slice()) {
        ("ready", []) => Input::Ready,
        ("no", []) => Input::No,
        ("begin", []) => Input::Begin,
        ("select", [id]) => Input::Select((*id).to_owned()),
        ("place", []) => Input::Place,
        ("click", [x, y]) => match (x.parse::<f64>(), y.parse::<f64>()) {
            (Ok(x), Ok(y)) => Input::Click(Point::new(x, y)),
            _ => Input::Unknown(line.to_owned()),
        },
        ("tokens", []) => Input::Tokens,
        ("who", []) => Input::Who,
        ("help" | "?", []) => Input::Help,
        ("quit" | "exit", []) => Input::Quit,
        _ => Input::Unknown(line.to_owned()),
    }
}

/// Read commands from stdin until `quit` or end of input.
///
/// # Errors
///
/// Returns an error if stdin cannot be read.
pub async fn repl(client: Arc<ShellClient>, terminal: Arc<Terminal>, view: Arc<RoomView>) -> Result<(), CliError> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Chat(content) => {
                if client.handle_chat(&content).await == ChatOutcome::Passthrough {
                    println!("(chat) {content}");
                } else if let Some(Ok(ChatCommand::Setup)) = command::parse(&content) {
                    print_candidates(&client);
                }
            }
            Input::Ready => client.mark_ready().await,
            Input::No => client.mark_no().await,
            Input::Begin => {
                // Countdown and shuffle take seconds; keep reading input.
                let client = client.clone();
                tokio::spawn(async move { client.begin().await });
            }
            Input::Select(id) => match client.select_decoy_source(&id) {
                Ok(()) => println!("selected {id}; type `place`, then `click X Y`"),
                Err(e) => client.host().report(&e),
            },
            Input::Place => {
                let client = client.clone();
                tokio::spawn(async move {
                    let _ = client.place_decoy().await;
                });
            }
            Input::Click(at) => {
                if terminal.click(at) == 0 {
                    println!("(nothing is waiting for a click)");
                }
            }
            Input::Tokens => {
                for t in view.tokens() {
                    println!("  {:<38} {:<20} ({:.0}, {:.0}) elev {:.0}", t.id, t.name, t.x, t.y, t.elevation);
                }
            }
            Input::Who => {
                for p in shell_game::host::Session::participants(view.as_ref()) {
                    let status = if p.active { "" } else { " (away)" };
                    println!("  {:<20} {:?}{status}", p.name, p.role);
                }
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Empty => {}
            Input::Unknown(text) => println!("unknown command: {text} (try `help`)"),
        }
    }
    info!("play: input closed");
    Ok(())
}

fn print_candidates(client: &ShellClient) {
    let Some(candidates) = client.setup_candidates() else {
        return;
    };
    if candidates.is_empty() {
        println!("(no tokens to copy)");
    }
    for c in candidates {
        println!("  {:<38} {:<20} {}", c.id, c.name, c.image);
    }
}
