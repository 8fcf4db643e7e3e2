//! Security-telemetry correlation engine.
//!
//! Consumes discrete network/application events, applies sliding-window
//! detection rules (brute force, SQL injection, DDoS volume, prompt-injection
//! and honeytoken direct triggers), deduplicates incident creation per
//! rule-scoped claim key, and enriches confirmed incidents through an
//! external summarizer off the ingest path.

pub mod config;
pub mod dedup;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod handlers;
pub mod postgres;
pub mod rules;
pub mod state;
pub mod store;
pub mod types;

pub use config::Config;
pub use engine::CorrelationEngine;
pub use error::{EngineError, EnrichmentError, StoreError};
pub use types::{Event, Incident, IngestPayload};
