use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpGatewayClient, InteractionController, NewGame, ReplayController};
use shared::{
    domain::{GameId, Mode},
    protocol::{Credentials, GameSummary},
};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

mod play;
mod render;

#[derive(Parser, Debug)]
#[command(about = "Play and replay chess games through the gateway")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:3000/")]
    gateway_url: Url,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the account, then log in.
    Signup,
    /// Show the account's hours and score.
    Whoami,
    /// Start a game (easy, advanced or pvp) and play it.
    New {
        #[arg(long, default_value = "easy")]
        mode: Mode,
    },
    /// List unfinished games.
    Resume,
    /// Continue an unfinished game.
    Play { session_id: i64 },
    /// List finished games.
    Replays,
    /// Step through a finished game.
    Replay { session_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let client = Arc::new(HttpGatewayClient::new(args.gateway_url)?);
    let credentials = Credentials {
        username: args.username,
        password: args.password,
    };

    if matches!(args.command, Command::Signup) && !client.signup(&credentials).await?.valid {
        bail!("signup refused for '{}'", credentials.username);
    }
    if !client.login(&credentials).await?.valid {
        bail!("login refused for '{}'", credentials.username);
    }
    debug!(gateway = %client.base_url(), username = %credentials.username, "logged in");

    let mut lines = play::stdin_lines();
    match args.command {
        Command::Signup => println!("account '{}' created", credentials.username),
        Command::Whoami => {
            let user = client.user().await?;
            if !user.valid {
                bail!("not logged in");
            }
            println!(
                "{}: {:.1} hours played, score {}",
                user.username.unwrap_or(credentials.username),
                user.total_hours.unwrap_or_default(),
                user.score.unwrap_or_default(),
            );
        }
        Command::New { mode } => match client.new_game(mode).await? {
            NewGame::Created(session_id) => {
                println!("game {session_id} started");
                let controller = InteractionController::new(client.clone(), session_id);
                play::play(controller, &mut lines).await?;
            }
            NewGame::Refused => bail!("the gateway refused to start a game"),
        },
        Command::Resume => print_games(&client.resume_list().await?.resume_list),
        Command::Play { session_id } => {
            let controller = InteractionController::new(client.clone(), GameId(session_id));
            play::play(controller, &mut lines).await?;
        }
        Command::Replays => print_games(&client.replay_list().await?.replay_list),
        Command::Replay { session_id } => {
            let controller = ReplayController::new(client.clone(), GameId(session_id));
            play::replay(controller, &mut lines).await?;
        }
    }

    client.logout().await?;
    Ok(())
}

fn print_games(games: &[GameSummary]) {
    if games.is_empty() {
        println!("no games");
        return;
    }
    for game in games {
        println!(
            "{:>6}  {:<8}  started {}  last move {}",
            game.session_id,
            game.mode.map(Mode::as_str).unwrap_or("?"),
            game.start_time.as_deref().unwrap_or("-"),
            game.last_update.as_deref().unwrap_or("-"),
        );
    }
}
