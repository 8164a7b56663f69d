mod error;
mod host;
mod link;
mod play;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use frames::{Frame, SceneOp, Token};
use shell_game::settings::{EnvSettings, MapSettings, SettingsStore};
use shell_game::{Host, ShellClient, pump};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::error::CliError;
use crate::host::{RoomView, Terminal, WsRelay, WsScene, route_inbound};
use crate::link::Identity;

const SHELL_EVENT_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "shell-game", about = "Shell game client for the relay server")]
struct Cli {
    #[arg(long, env = "SHELL_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is up.
    Ping,
    /// Join a room and play interactively.
    Play(PlayArgs),
    /// Place a row of identical tokens (GM).
    Seed(SeedArgs),
    /// Print the room's tokens.
    Tokens(RoomArgs),
}

#[derive(Args, Debug, Clone)]
struct RoomArgs {
    #[arg(long, env = "SHELL_ROOM", default_value = "lobby")]
    room: String,

    /// Stable user id; defaults to a fresh one.
    #[arg(long, env = "SHELL_USER")]
    user: Option<String>,

    #[arg(long, env = "SHELL_NAME")]
    name: Option<String>,

    #[arg(long, default_value_t = false)]
    gm: bool,
}

impl RoomArgs {
    fn identity(&self) -> Identity {
        let user = self.user.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = self.name.clone().unwrap_or_else(|| user.clone());
        Identity { room: self.room.clone(), user, name, gm: self.gm }
    }
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[command(flatten)]
    room: RoomArgs,

    /// JSON object of shell settings; environment variables otherwise.
    #[arg(long)]
    settings: Option<String>,

    /// Grid cell size used to snap decoys.
    #[arg(long, default_value_t = 100.0)]
    grid: f64,

    /// Fix the shuffle's random seed.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct SeedArgs {
    #[command(flatten)]
    room: RoomArgs,

    /// Token name to place.
    #[arg(long = "token", default_value = "Rat")]
    token_name: String,

    #[arg(long, default_value_t = 3)]
    count: usize,

    #[arg(long, default_value_t = 200.0)]
    spacing: f64,

    #[arg(long)]
    image: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.url).await,
        Command::Play(args) => run_play(&cli.url, args).await,
        Command::Seed(args) => run_seed(&cli.url, args).await,
        Command::Tokens(args) => run_tokens(&cli.url, &args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            syscall: format!("HTTP {}", status.as_u16()),
            code: "E_HEALTH".to_owned(),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn run_play(base_url: &str, args: PlayArgs) -> Result<(), CliError> {
    let settings = load_settings(args.settings.as_deref())?;
    let url = link::ws_url(base_url, &args.room.identity())?;
    let conn = link::connect(&url).await?;

    let view = Arc::new(RoomView::new(conn.welcome));
    let terminal = Arc::new(Terminal::default());
    let host = Host {
        scene: Arc::new(WsScene::new(conn.link.clone(), view.clone(), args.grid)),
        session: view.clone(),
        notifier: terminal.clone(),
        panels: terminal.clone(),
        viewport: terminal.clone(),
        targeting: terminal.clone(),
        pointer: terminal.clone(),
        settings,
        scheduler: None,
    };

    let mut client = ShellClient::new(host, Arc::new(WsRelay::new(conn.link.clone())));
    if let Some(seed) = args.seed {
        client = client.with_shuffle_seed(seed);
    }
    let client = Arc::new(client);

    let (shell_tx, shell_rx) = mpsc::channel(SHELL_EVENT_CAPACITY);
    tokio::spawn(pump(client.clone(), shell_rx));
    tokio::spawn(route_inbound(conn.inbound, view.clone(), client.clone(), shell_tx));

    play::repl(client, terminal, view).await
}

async fn run_seed(base_url: &str, args: SeedArgs) -> Result<(), CliError> {
    if !args.room.gm {
        return Err(CliError::NotGm("seed tokens"));
    }
    let url = link::ws_url(base_url, &args.room.identity())?;
    let conn = link::connect(&url).await?;

    for i in 0..args.count {
        #[allow(clippy::cast_precision_loss)]
        let x = args.spacing * i as f64;
        let token = Token {
            id: Uuid::new_v4().to_string(),
            name: args.token_name.clone(),
            x,
            y: 0.0,
            elevation: 0.0,
            width: 100.0,
            height: 100.0,
            image: args.image.clone(),
            player_owned: false,
        };
        let id = token.id.clone();
        conn.link.request(Frame::scene(&SceneOp::TokenCreate { token })).await?;
        println!("created {id} {} at ({x:.0}, 0)", args.token_name);
    }
    Ok(())
}

async fn run_tokens(base_url: &str, args: &RoomArgs) -> Result<(), CliError> {
    let url = link::ws_url(base_url, &args.identity())?;
    let conn = link::connect(&url).await?;
    for t in &conn.welcome.tokens {
        println!("{:<38} {:<20} ({:.0}, {:.0}) elev {:.0}", t.id, t.name, t.x, t.y, t.elevation);
    }
    Ok(())
}

fn load_settings(path: Option<&str>) -> Result<Arc<dyn SettingsStore>, CliError> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(Arc::new(MapSettings::from_json(&json)?))
        }
        None => Ok(Arc::new(EnvSettings)),
    }
}
