//! # vanish-server
//!
//! API server for the Vanish social network.
//!
//! This binary provides:
//! - **Serverless-style endpoints** (axum) for conversations, messages,
//!   invitations, notifications, and the social feed
//! - **Realtime fan-out** over topic-keyed broadcast channels
//!   (`messages:<id>`, `conversations:<id>`, `conversations`,
//!   `notifications-<user>`)
//! - **Bearer-token auth** against the sessions table
//! - **Per-IP rate limiting** to protect against abuse
//!
//! Expired messages and posts are never purged server-side; expiry is a
//! read-side filter in the clients.

mod api;
mod auth;
mod broadcast;
mod config;
mod conversations;
mod error;
mod messages;
mod notify;
mod rate_limit;
mod social;

#[cfg(test)]
mod test_support;

use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use vanish_store::Database;

use crate::api::AppState;
use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vanish_server=debug")),
        )
        .init();

    info!("Starting Vanish server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    let rate_limiter = RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst);

    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        hub: Broadcaster::new(),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle
    // >10 min).
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
        }
    });

    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
