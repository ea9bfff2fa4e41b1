//! Line-driven loops over the interaction and replay controllers.

use std::sync::Arc;

use anyhow::Result;
use client_core::{
    ClientEvent, ControllerError, InteractionController, Outcome, ReplayController,
};
use shared::domain::{PromotionRole, Square};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Stdin},
    sync::broadcast,
    task::JoinHandle,
};

use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCommand {
    Click(Square),
    Promote(PromotionRole),
    Takeback,
    Reload,
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayCommand {
    Step(i64),
    Goto(u32),
    Takeback,
    Show,
    Help,
    Quit,
}

pub fn parse_play(line: &str) -> Result<PlayCommand, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(PlayCommand::Show);
    };
    match (head.to_ascii_lowercase().as_str(), words.next()) {
        ("promote" | "p", Some(role)) => role.parse().map(PlayCommand::Promote),
        ("takeback" | "undo" | "t", None) => Ok(PlayCommand::Takeback),
        ("reload" | "r", None) => Ok(PlayCommand::Reload),
        ("show" | "s", None) => Ok(PlayCommand::Show),
        ("help" | "?", None) => Ok(PlayCommand::Help),
        ("quit" | "exit" | "q", None) => Ok(PlayCommand::Quit),
        (_, None) => head
            .parse()
            .map(PlayCommand::Click)
            .map_err(|e| format!("{e}")),
        (other, Some(_)) => Err(format!("unknown command '{other}'")),
    }
}

pub fn parse_replay(line: &str) -> Result<ReplayCommand, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(ReplayCommand::Step(1));
    };
    match (head.to_ascii_lowercase().as_str(), words.next()) {
        ("next" | "n", None) => Ok(ReplayCommand::Step(1)),
        ("prev" | "p", None) => Ok(ReplayCommand::Step(-1)),
        ("step" | "+", Some(delta)) => delta
            .parse()
            .map(ReplayCommand::Step)
            .map_err(|_| format!("'{delta}' is not a step count")),
        ("goto" | "g", Some(step)) => step
            .parse()
            .map(ReplayCommand::Goto)
            .map_err(|_| format!("'{step}' is not a step number")),
        ("takeback" | "undo" | "t", None) => Ok(ReplayCommand::Takeback),
        ("show" | "s", None) => Ok(ReplayCommand::Show),
        ("help" | "?", None) => Ok(ReplayCommand::Help),
        ("quit" | "exit" | "q", None) => Ok(ReplayCommand::Quit),
        (other, _) => Err(format!("unknown command '{other}'")),
    }
}

const PLAY_HELP: &str = "\
  <square>        select a piece, then its destination (e.g. e2 then e4)
  promote <q|r|b|n>  promotion piece for the next move
  takeback        undo your last turn
  reload | show | help | quit";

const REPLAY_HELP: &str = "\
  next | prev     step forward or back (empty line = next)
  step <n>        move the cursor by n
  goto <n>        jump to step n
  show | help | quit";

fn print_events(mut events: broadcast::Receiver<ClientEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Check) => println!("check!"),
                Ok(ClientEvent::GameOver(status)) => println!("game over: {status}"),
                Ok(ClientEvent::MoveRejected { src, tar }) => {
                    println!("illegal move {src}{tar}")
                }
                Ok(ClientEvent::Redirect) => println!("this game is not available"),
                Ok(ClientEvent::Error(message)) => println!("error: {message}"),
                Ok(ClientEvent::StateRefreshed { .. } | ClientEvent::SelectionChanged(_)) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn show_game(controller: &InteractionController) {
    let Some(snapshot) = controller.snapshot().await else {
        println!("no game loaded");
        return;
    };
    let highlights = controller.highlights().await;
    match render::board(&snapshot.fen, &highlights) {
        Some(drawn) => print!("{drawn}"),
        None => println!("{}", snapshot.fen),
    }
    println!(
        "{} to move, {} ({} mode), promotion: {:?}",
        match snapshot.turn {
            shared::domain::Color::White => "white",
            shared::domain::Color::Black => "black",
        },
        snapshot.status,
        snapshot.mode,
        controller.pending_role().await,
    );
}

async fn show_replay(controller: &ReplayController) {
    let snapshot = controller.snapshot().await;
    let highlights = controller.highlights().await;
    println!("step {}", snapshot.step);
    if let Some(fen) = snapshot.fen {
        match render::board(&fen, &highlights) {
            Some(drawn) => print!("{drawn}"),
            None => println!("{fen}"),
        }
    }
}

type Lines = tokio::io::Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> Lines {
    BufReader::new(tokio::io::stdin()).lines()
}

pub async fn play(controller: Arc<InteractionController>, lines: &mut Lines) -> Result<()> {
    let printer = print_events(controller.subscribe_events());
    match controller.load().await {
        Ok(_) => show_game(&controller).await,
        Err(ControllerError::Unauthorized) => {
            printer.abort();
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }
    println!("{PLAY_HELP}");

    while let Some(line) = lines.next_line().await? {
        let command = match parse_play(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        let result = match command {
            PlayCommand::Click(square) => controller.select_square(square).await,
            PlayCommand::Promote(role) => {
                controller.set_promotion_role(role).await;
                continue;
            }
            PlayCommand::Takeback => controller.takeback().await,
            PlayCommand::Reload => controller.load().await,
            PlayCommand::Show => {
                show_game(&controller).await;
                continue;
            }
            PlayCommand::Help => {
                println!("{PLAY_HELP}");
                continue;
            }
            PlayCommand::Quit => break,
        };
        match result {
            Ok(Outcome::Selected { legal_moves, .. }) if legal_moves.is_empty() => {
                println!("no legal moves from there");
                show_game(&controller).await;
            }
            Ok(Outcome::Ignored) => println!("busy, try again"),
            Ok(_) => show_game(&controller).await,
            Err(ControllerError::Unauthorized) => break,
            Err(err) => println!("{err}"),
        }
    }

    controller.close().await;
    printer.abort();
    Ok(())
}

pub async fn replay(controller: Arc<ReplayController>, lines: &mut Lines) -> Result<()> {
    let printer = print_events(controller.subscribe_events());
    match controller.load_step(0).await {
        Ok(_) => show_replay(&controller).await,
        Err(ControllerError::Unauthorized) => {
            printer.abort();
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }
    println!("{REPLAY_HELP}");

    while let Some(line) = lines.next_line().await? {
        let command = match parse_replay(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        let result = match command {
            ReplayCommand::Step(delta) => controller.advance(delta).await,
            ReplayCommand::Goto(step) => controller.load_step(step).await,
            ReplayCommand::Takeback => controller.takeback().await,
            ReplayCommand::Show => {
                show_replay(&controller).await;
                continue;
            }
            ReplayCommand::Help => {
                println!("{REPLAY_HELP}");
                continue;
            }
            ReplayCommand::Quit => break,
        };
        match result {
            Ok(Outcome::RolledBack { step }) => {
                println!("no such step, staying at {step}");
                show_replay(&controller).await;
            }
            Ok(Outcome::Unchanged) => println!("already at the first step"),
            Ok(_) => show_replay(&controller).await,
            Err(ControllerError::Unauthorized) => break,
            Err(err) => println!("{err}"),
        }
    }

    controller.close().await;
    printer.abort();
    Ok(())
}
