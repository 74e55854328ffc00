//! Arena deathmatch host
//!
//! Runs a single match against the in-memory world. Commands are read from
//! stdin and match events are written to stdout, one JSON object per line.
//! Logs go to stderr.

use std::future::Future;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_deathmatch::arena::ArenaData;
use arena_deathmatch::config::Config;
use arena_deathmatch::game::{Environment, Match, MatchRunner, SimWorld};
use arena_deathmatch::protocol::{Command, MatchEvent};

// Single-threaded so every match mutation stays on the simulation thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    info!("Starting arena deathmatch host");

    let arena = ArenaData::load(&config.arena_path)
        .with_context(|| format!("loading arena from {}", config.arena_path.display()))?;
    info!(arena = %arena.id, spawns = arena.spawns.len(), doors = arena.doors.len(), "Arena loaded");

    let game = Match::open(config.game.clone(), arena, SimWorld::new(), Vec::new(), None)?;
    let (runner, handle) = MatchRunner::new(game);

    let writer = tokio::spawn(write_events(handle.subscribe()));
    let reader = tokio::spawn(read_commands(handle.command_tx.clone()));
    // The loop stops once stdin is exhausted and the reader drops its sender.
    drop(handle);

    if let Some(game) = drive(runner, shutdown_signal()).await {
        info!(phase = ?game.phase(), winners = game.winners().len(), "Match loop finished");
    }

    reader.abort();
    writer.await??;

    info!("Host shutdown complete");
    Ok(())
}

/// Run the match loop until it finishes or `shutdown` resolves.
/// Returns the match only when the loop finished on its own.
async fn drive<E: Environment>(
    runner: MatchRunner<E>,
    shutdown: impl Future<Output = ()>,
) -> Option<Match<E>> {
    tokio::select! {
        game = runner.run() => Some(game),
        _ = shutdown => None,
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Forward newline-delimited JSON commands from stdin to the match
async fn read_commands(commands: mpsc::Sender<Command>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Command>(line) {
            Ok(command) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!(error = %err, "Malformed command skipped"),
        }
    }

    info!("Command input closed");
    Ok(())
}

/// Write every broadcast match event to stdout as a JSON line
async fn write_events(mut events: broadcast::Receiver<MatchEvent>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();

    loop {
        match events.recv().await {
            Ok(event) => {
                let mut line = serde_json::to_vec(&event)?;
                line.push(b'\n');
                stdout.write_all(&line).await?;
                stdout.flush().await?;
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event output lagging"),
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}
