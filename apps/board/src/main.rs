use std::{path::PathBuf, sync::Arc};

use alloy_primitives::{address, Address, U256};
use anyhow::{Context, Result};
use chain_integration::LiveGateway;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{BoardGateway, BoardSession, InMemoryGateway, SessionOptions, StubGateway};
use shared::{domain::BoardState, error::ErrorReport, protocol::abi_json};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinHandle,
};
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

use commands::{command_name, parse_command, UserCommand, HELP};
use config::load_settings;

const DEMO_SIGNER: Address = address!("00000000000000000000000000000000000de310");

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GatewayKind {
    /// Deployed contract over JSON-RPC.
    Live,
    /// Placeholder data, wallet disabled.
    Stub,
    /// In-process simulated contract.
    Memory,
}

#[derive(Parser, Debug)]
#[command(name = "board", about = "Terminal client for the on-chain message board")]
struct Args {
    #[arg(long, default_value = "board.toml")]
    config: PathBuf,
    #[arg(long, value_enum, default_value_t = GatewayKind::Live)]
    gateway: GatewayKind,
    #[arg(long)]
    rpc_url: Option<String>,
    #[arg(long)]
    contract: Option<String>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the contract interface descriptor as ABI JSON.
    Abi,
    /// Read the board once and print it as JSON.
    Show,
    /// Interactive session (default).
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(v) = args.rpc_url.clone() {
        settings.rpc_url = v;
    }
    if let Some(v) = args.contract.clone() {
        settings.contract_address = v;
    }
    if let Some(v) = args.poll_interval_ms {
        settings.poll_interval_ms = v;
    }
    debug!(?settings, gateway = ?args.gateway, "resolved settings");

    if let Some(Command::Abi) = args.command {
        println!("{}", abi_json()?);
        return Ok(());
    }

    let gateway: Arc<dyn BoardGateway> = match args.gateway {
        GatewayKind::Live => Arc::new(
            LiveGateway::new(settings.chain_config()?)
                .await
                .context("failed to start live gateway")?,
        ),
        GatewayKind::Stub => Arc::new(StubGateway),
        GatewayKind::Memory => Arc::new(
            InMemoryGateway::new()
                .with_board(BoardState::new(
                    "Hello from the in-memory board",
                    Address::ZERO,
                    U256::ZERO,
                ))
                .with_signer(DEMO_SIGNER),
        ),
    };

    let options = SessionOptions {
        poll_interval: settings.poll_interval(),
    };
    let session = BoardSession::mount(gateway, options).await;

    match args.command {
        Some(Command::Show) => show_once(session).await,
        _ => run_interactive(session).await,
    }
}

async fn show_once(session: BoardSession) -> Result<()> {
    let result = session.refresh().await;
    let output = match &result {
        Ok(_) => serde_json::to_string_pretty(&session.current())?,
        Err(err) => serde_json::to_string_pretty(&ErrorReport::from(err))?,
    };
    println!("{output}");
    session.unmount().await;
    result.map(|_| ()).map_err(Into::into)
}

async fn run_interactive(session: BoardSession) -> Result<()> {
    let session = Arc::new(session);
    println!("{}", render::render_header(&session.wallet()));
    println!("{HELP}");

    let renderer = tokio::spawn({
        let session = Arc::clone(&session);
        async move {
            let mut states = WatchStream::new(session.subscribe_state());
            while let Some(state) = states.next().await {
                println!("{}", render::render_board(&state, session.is_loaded()));
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let cmd = match parse_command(&line) {
            Ok(cmd) => cmd,
            Err(err) => {
                println!("{err}; {HELP}");
                continue;
            }
        };
        debug!(command = command_name(&cmd), "handling user command");

        match cmd {
            UserCommand::Quit => break,
            UserCommand::Help => println!("{HELP}"),
            UserCommand::Show => {
                println!("{}", render::render_board(&session.current(), session.is_loaded()))
            }
            UserCommand::Status => {
                println!("{}", render::render_header(&session.wallet()));
                println!("{}", render::render_status(&session.status()));
            }
            UserCommand::Connect => match session.connect_wallet().await {
                Ok(wallet) => println!("{}", render::render_header(&wallet)),
                Err(err) => println!("{}", render::render_error(&err)),
            },
            UserCommand::Post(text) => {
                // Submits run in the background so the prompt stays usable.
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    match session.submit(&text).await {
                        Ok(outcome) => {
                            info!(tx = %outcome.tx, "board message updated");
                            println!("{}", render::UPDATED_NOTICE);
                        }
                        Err(err) => println!("{}", render::render_error(&err)),
                    }
                });
            }
        }
    }

    if !shutdown(renderer, session).await {
        debug!("session still shared at exit; teardown left to drop");
    }
    Ok(())
}

/// Stops the renderer and unmounts the session. The aborted task must be
/// awaited so its clone of the session is released before unwrapping.
/// Returns whether the graceful unmount ran.
async fn shutdown(renderer: JoinHandle<()>, session: Arc<BoardSession>) -> bool {
    renderer.abort();
    let _ = renderer.await;
    match Arc::try_unwrap(session) {
        Ok(session) => {
            session.unmount().await;
            true
        }
        Err(_) => false,
    }
}
