//! Binary entrypoint for the correlation engine service.
//!
//! Bind to 127.0.0.1 by default (internal only). The summarizer endpoint is
//! optional; without it incidents simply keep their rule-generated text.

use axum::{routing::get, routing::post, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

use correlation_engine::engine::CorrelationEngine;
use correlation_engine::enrich::HttpSummarizer;
use correlation_engine::postgres::{PgEventStore, PgIncidentStore};
use correlation_engine::state::AppState;
use correlation_engine::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
  let ai_engine_url =
    std::env::var("AI_ENGINE_URL").unwrap_or_else(|_| "http://localhost:8000".into());
  let port: u16 = std::env::var("PORT")
    .unwrap_or_else(|_| "5005".into())
    .parse()
    .expect("PORT must be a valid u16");

  let pool = sqlx::PgPool::connect(&database_url).await?;
  let config = Config::default();
  let summarizer = HttpSummarizer::new(
    ai_engine_url,
    Duration::from_secs(config.enrichment_timeout_seconds),
  );

  let engine = CorrelationEngine::new(
    Arc::new(PgEventStore::new(pool.clone())),
    Arc::new(PgIncidentStore::new(pool)),
    Arc::new(summarizer),
    config,
  );
  let state = Arc::new(AppState { engine });

  // Evict expired dedup claims in the background.
  let sweeper = Arc::clone(&state);
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(Duration::from_secs(60));
    loop {
      tick.tick().await;
      sweeper.engine.dedup().sweep(chrono::Utc::now());
    }
  });

  let app = Router::new()
    .route("/health", get(correlation_engine::handlers::health))
    .route("/api/v1/logs", post(correlation_engine::handlers::ingest))
    .layer(CorsLayer::permissive())
    .with_state(state);

  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  info!("correlation-engine listening on http://{}", addr);

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
