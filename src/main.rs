//! corvid - a persistent IRC client core.
//!
//! One connection at a time, driven by a single cooperative control
//! loop. Dropped links are re-established here with exponential
//! backoff; orderly shutdown comes from Ctrl-C or the server telling
//! us to go away.

mod config;
mod conn;
mod error;
mod event;
mod events;
mod plugin;
mod scheduler;
mod state;
mod worker;

use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::conn::Connection;
use crate::plugin::PluginRegistry;

const BACKOFF_INITIAL: Duration = Duration::from_secs(2);
const BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Compiled-in plugins are queued here; the load phase runs once the
/// server accepts the session.
fn build_plugins() -> PluginRegistry {
    PluginRegistry::new()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        nick = %config.identity.nick,
        "Starting corvid"
    );

    let mut backoff = BACKOFF_INITIAL;
    loop {
        match Connection::connect(config.clone(), build_plugins()).await {
            Ok(mut conn) => {
                let interrupted = {
                    let run = conn.run();
                    tokio::pin!(run);
                    tokio::select! {
                        res = &mut run => {
                            match res {
                                Ok(true) => {
                                    // A full session ran; treat the next attempt as fresh.
                                    backoff = BACKOFF_INITIAL;
                                    info!("session ended");
                                }
                                Ok(false) => warn!("session ended before registration"),
                                Err(e) => error!(error = %e, "connection lost"),
                            }
                            false
                        }
                        _ = tokio::signal::ctrl_c() => true,
                    }
                };
                if interrupted {
                    info!("interrupt received");
                    conn.shutdown().await;
                    return Ok(());
                }
            }
            Err(e) => error!(error = %e, "connect failed"),
        }

        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
        let delay = backoff + jitter;
        info!(delay_secs = delay.as_secs_f64(), "reconnecting");
        tokio::time::sleep(delay).await;
        backoff = (backoff * 2).min(BACKOFF_MAX);
    }
}
