mod config;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use argus_sdk::registrar::{HelixRegistrar, SubscriptionRegistrar};
use argus_sdk::{chat, eventsub};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::load_settings_files();
    let cli = config::Cli::parse();
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.show_logs, rust_log.as_deref()))
        .init();
    settings.log();

    let config = Arc::new(cli.into_connection_config()?);
    tracing::debug!(?config, "Starting argus");

    let registrar: Arc<dyn SubscriptionRegistrar> = Arc::new(HelixRegistrar::new(&config));
    let (event_tx, mut events) = mpsc::channel(256);

    let mut chat_task = tokio::spawn(chat::connect(config.clone(), event_tx.clone()));
    let mut eventsub_task = tokio::spawn(eventsub::connect(config.clone(), registrar, event_tx));
    let mut chat_running = true;
    let mut eventsub_running = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // Both feeds run until a signal arrives. A feed that drops stays down;
    // a feed that could not connect at all is fatal.
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(event) = events.recv() => output::print_event(&event, config.verbose),
            result = &mut chat_task, if chat_running => {
                chat_running = false;
                result.context("chat task panicked")??;
            }
            result = &mut eventsub_task, if eventsub_running => {
                eventsub_running = false;
                let termination = result.context("EventSub task panicked")??;
                tracing::debug!(?termination, "EventSub session ended");
            }
        }
    }

    println!("\nProgram terminated. Disconnecting...");
    chat_task.abort();
    eventsub_task.abort();
    Ok(())
}

/// `RUST_LOG` when set and valid; otherwise our crates at info, or debug
/// with `SHOW_LOGS`.
fn log_filter(show_logs: bool, rust_log: Option<&str>) -> EnvFilter {
    let level = if show_logs { "debug" } else { "info" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(format!("argus={level},argus_sdk={level}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
