//! Webchat presence host. Owns the process-wide membership registry.
//!
//! Loads configuration, initializes logging, builds the registry, and runs
//! the idle sweeper and membership event log until shutdown. Session glue
//! embeds [`MembershipRegistry`] through the `webchat-presence` crate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use webchat_core::config::AppConfig;
use webchat_core::error::AppError;
use webchat_presence::{MembershipEvent, MembershipRegistry, PresenceSweeper};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("WEBCHAT_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting webchat presence v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Membership registry ──────────────────────────────
    let default_room = config.presence.default_room()?;
    let registry = Arc::new(MembershipRegistry::from_config(&config.presence));
    tracing::info!("Membership registry ready (default room: '{}')", default_room);

    // ── Step 2: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 3: Membership event log ─────────────────────────────
    let events_handle = {
        let events = registry.subscribe();
        let cancel = shutdown_rx.clone();
        tokio::spawn(log_membership_events(events, cancel))
    };

    // ── Step 4: Idle sweeper ─────────────────────────────────────
    let sweeper_handle = match PresenceSweeper::from_config(Arc::clone(&registry), &config.presence)
    {
        Some(sweeper) => {
            let cancel = shutdown_rx.clone();
            Some(tokio::spawn(sweeper.run(cancel)))
        }
        None => {
            tracing::info!("Idle expiry disabled");
            None
        }
    };

    // ── Step 5: Wait for shutdown ────────────────────────────────
    shutdown_signal().await?;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = sweeper_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), events_handle).await;

    let stats = registry.stats();
    tracing::info!(
        rooms = stats.rooms,
        online = stats.online,
        connects = stats.metrics.connects,
        disconnects = stats.metrics.disconnects,
        expirations = stats.metrics.expirations,
        "Webchat presence shut down gracefully"
    );
    Ok(())
}

/// Log every membership change until shutdown
async fn log_membership_events(
    mut events: broadcast::Receiver<MembershipEvent>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    break;
                }
            }
            received = events.recv() => match received {
                Ok(MembershipEvent::Joined { nick, rooms, opened, .. }) => {
                    tracing::info!(
                        nick = %nick,
                        rooms = rooms.len(),
                        opened = opened.len(),
                        "Joined"
                    );
                }
                Ok(MembershipEvent::Left { nick, rooms, closed, reason, .. }) => {
                    tracing::info!(
                        nick = %nick,
                        rooms = rooms.len(),
                        closed = closed.len(),
                        reason = ?reason,
                        "Left"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Membership event log lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() -> Result<(), AppError> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| AppError::internal(format!("Failed to install Ctrl+C handler: {}", e)))
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).map_err(
                |e| AppError::internal(format!("Failed to install SIGTERM handler: {}", e)),
            )?;
        signal.recv().await;
        Ok::<(), AppError>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<(), AppError>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}
