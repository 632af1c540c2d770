//! Calibra · Confidence Calibration Trainer Backend
//!
//! - Diagnoses confidence vs. competence per skill question
//! - Axum HTTP + WebSocket API for assessment sessions
//! - On-demand training content (lesson or roleplay simulation) via a text-generation provider
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   ANTHROPIC_API_KEY     : provider credential; without it training requests fail fast
//!   ANTHROPIC_BASE_URL    : default "https://api.anthropic.com/v1"
//!   ANTHROPIC_MODEL       : default "claude-3-5-sonnet-20240620"
//!   PROVIDER_TIMEOUT_SECS : bounded wait per generation call (default 20)
//!   TRAINER_CONFIG_PATH   : path to TOML config (prompts, generation params, question bank)
//!   OUTCOME_LOG_PATH      : JSONL file receiving assessment outcomes
//!   SESSION_IDLE_SECS     : idle sessions are dropped after this long (default 3600)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod seeds;
mod diagnosis;
mod prompt;
mod anthropic;
mod normalize;
mod training;
mod session;
mod outcomes;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: question bank, sessions, provider client (built once), outcome sink.
  let state = Arc::new(AppState::new());
  state.clone().spawn_session_sweeper();

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "calibra_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "calibra_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "calibra_backend", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "calibra_backend", "Shutdown signal received");
}
