//! Masque engine console.
//!
//! Runs the session engine and reads commands from stdin, one per line:
//!
//! ```bash
//! masque-server --lobby-extension-secs 60 --ready-countdown-secs 10
//! > create-1 100 en classic
//! > join-1 200
//! > ready-1 100
//! ```
//!
//! Notifications and rejected commands are written to the log.

use std::time::Duration;

use clap::Parser;
use masque_core::SessionConfig;
use masque_server::{Engine, EngineConfig, Notification, parse_line};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Masque session engine
#[derive(Parser, Debug)]
#[command(name = "masque-server")]
#[command(about = "Session engine for the Masque hidden-identity party game")]
#[command(version)]
struct Args {
    /// Seconds each lobby change pushes the expiry deadline
    #[arg(long, default_value = "60")]
    lobby_extension_secs: u64,

    /// Seconds between full readiness and the first round
    #[arg(long, default_value = "10")]
    ready_countdown_secs: u64,

    /// Milliseconds between expiry sweeps
    #[arg(long, default_value = "1000")]
    sweep_interval_ms: u64,

    /// Language for sessions created without one
    #[arg(long, default_value = "en")]
    default_language: String,

    /// Maximum identity, question and answer length in characters
    #[arg(long, default_value = "32")]
    max_text_len: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            session: SessionConfig {
                lobby_extension: Duration::from_secs(self.lobby_extension_secs),
                ready_countdown: Duration::from_secs(self.ready_countdown_secs),
                max_identity_len: self.max_text_len,
                max_question_len: self.max_text_len,
                max_answer_len: self.max_text_len,
            },
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            default_language: self.default_language.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let (engine, mut notifications) = Engine::new(args.engine_config())?;
    tracing::info!(config = ?engine.driver().config(), "Masque engine starting");

    let sweeper = engine.spawn_sweeper();

    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            log_notification(&notification);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let parsed = match parse_line(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("rejected line {line:?}: {e}");
                continue;
            },
        };

        if let Err(e) = engine.submit(parsed.room_id, parsed.player_id, parsed.command) {
            tracing::warn!(
                room = parsed.room_id,
                player = parsed.player_id,
                key = e.message_key().unwrap_or("internal"),
                "command rejected: {e}"
            );
        }
    }

    tracing::info!("stdin closed, shutting down");
    sweeper.abort();

    Ok(())
}

fn log_notification(notification: &Notification) {
    let snapshot = notification.snapshot();
    match notification {
        Notification::Render { room_id, .. } => tracing::info!(
            room = room_id,
            status = ?snapshot.lobby_status,
            phase = ?snapshot.game_phase,
            players = snapshot.players.len(),
            ready = snapshot.ready_count,
            quit_votes = snapshot.quit_count,
            current = ?snapshot.current_player,
            "session updated"
        ),
        Notification::Closed { room_id, reason, .. } => tracing::info!(
            room = room_id,
            reason = reason.as_str(),
            players = snapshot.players.len(),
            "session closed"
        ),
    }
}
