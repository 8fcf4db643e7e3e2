//! Shared state for the HTTP surface.

use crate::engine::CorrelationEngine;

pub struct AppState {
  pub engine: CorrelationEngine,
}
