//! Incident enrichment via the external summarizer service.
//!
//! Best-effort and strictly off the ingest path: one bounded attempt per
//! incident, no retries. The incident keeps its rule-generated description
//! unless a summary actually arrives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::EnrichmentError;
use crate::types::Event;

/// Successful summarizer output.
#[derive(Debug, Clone)]
pub struct Enrichment {
  pub summary: String,
  pub remediation_steps: Vec<String>,
}

/// Boundary to the external summarization service.
///
/// `Ok(None)` means the service had no enrichment to offer; errors cover
/// timeouts, transport failures and malformed responses. Neither is ever
/// fatal to ingestion.
#[async_trait]
pub trait Summarizer: Send + Sync {
  async fn summarize(
    &self,
    events: &[Event],
    incident_type: &str,
  ) -> Result<Option<Enrichment>, EnrichmentError>;
}

/// Summarizer that never offers enrichment. Used when no summarizer service
/// is configured.
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
  async fn summarize(
    &self,
    _events: &[Event],
    _incident_type: &str,
  ) -> Result<Option<Enrichment>, EnrichmentError> {
    Ok(None)
  }
}

// ---------------------------------------------------------------------------
// HTTP client (POST <base>/summarize)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRequest<'a> {
  logs: Vec<LogEntry<'a>>,
  incident_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogEntry<'a> {
  timestamp: String,
  event_type: &'a str,
  details: &'a Value,
}

/// Absent fields mean "no enrichment available".
#[derive(Deserialize)]
struct SummaryResponse {
  #[serde(default)]
  summary: Option<String>,
  #[serde(default)]
  remediation_steps: Option<Vec<String>>,
}

/// Summarizer backed by the AI engine's `POST /summarize` endpoint.
pub struct HttpSummarizer {
  client: reqwest::Client,
  base_url: String,
}

impl HttpSummarizer {
  /// `timeout` bounds the whole call, connect included.
  pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
    Self {
      client: reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new()),
      base_url: base_url.into(),
    }
  }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
  async fn summarize(
    &self,
    events: &[Event],
    incident_type: &str,
  ) -> Result<Option<Enrichment>, EnrichmentError> {
    let request = SummaryRequest {
      logs: events
        .iter()
        .map(|e| LogEntry {
          timestamp: e.timestamp.to_rfc3339(),
          event_type: e.event_type.as_str(),
          details: &e.details,
        })
        .collect(),
      incident_type,
    };

    let response: SummaryResponse = self
      .client
      .post(format!("{}/summarize", self.base_url))
      .json(&request)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(response.summary.map(|summary| Enrichment {
      summary,
      remediation_steps: response.remediation_steps.unwrap_or_default(),
    }))
  }
}
