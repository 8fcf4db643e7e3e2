//! Core types for the correlation engine (JSON contracts + internal models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// One inbound telemetry event. Unknown fields are silently ignored.
///
/// `sourceKey` and `eventType` are required; the engine rejects the payload
/// before persistence when either is missing or empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
  #[serde(default)]
  pub source_key: String,
  #[serde(default)]
  pub event_type: String,
  #[serde(default)]
  pub details: Option<Value>,
}

// ---------------------------------------------------------------------------
// Event type (open tag set; rules key off the known variants)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
  LoginFail,
  LoginSuccess,
  SqlQuery,
  HttpRequest,
  PromptInjectionAttempt,
  HoneytokenTriggered,
  Other(String),
}

impl EventType {
  pub fn parse(s: &str) -> Self {
    match s {
      "LOGIN_FAIL" => Self::LoginFail,
      "LOGIN_SUCCESS" => Self::LoginSuccess,
      "SQL_QUERY" => Self::SqlQuery,
      "HTTP_REQUEST" => Self::HttpRequest,
      "PROMPT_INJECTION_ATTEMPT" => Self::PromptInjectionAttempt,
      "HONEYTOKEN_TRIGGERED" => Self::HoneytokenTriggered,
      other => Self::Other(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::LoginFail => "LOGIN_FAIL",
      Self::LoginSuccess => "LOGIN_SUCCESS",
      Self::SqlQuery => "SQL_QUERY",
      Self::HttpRequest => "HTTP_REQUEST",
      Self::PromptInjectionAttempt => "PROMPT_INJECTION_ATTEMPT",
      Self::HoneytokenTriggered => "HONEYTOKEN_TRIGGERED",
      Self::Other(s) => s,
    }
  }
}

impl From<String> for EventType {
  fn from(s: String) -> Self {
    Self::parse(&s)
  }
}

impl From<EventType> for String {
  fn from(t: EventType) -> Self {
    t.as_str().to_string()
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
// Severity / decision enums
// ---------------------------------------------------------------------------

/// Totally ordered: LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

impl Severity {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "LOW",
      Self::Medium => "MEDIUM",
      Self::High => "HIGH",
      Self::Critical => "CRITICAL",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
  Allow,
  Flag,
  Block,
}

impl Decision {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Allow => "ALLOW",
      Self::Flag => "FLAG",
      Self::Block => "BLOCK",
    }
  }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Event fields before the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub source_key: String,
  pub event_type: EventType,
  pub details: Value,
}

/// Persisted event. Immutable once created; rules never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
  pub id: Uuid,
  pub source_key: String,
  pub event_type: EventType,
  pub details: Value,
  pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Transient incident candidate produced by a detection rule.
#[derive(Debug, Clone)]
pub struct IncidentDraft {
  pub title: String,
  pub description: String,
  pub severity: Severity,
  pub decision: Decision,
  pub mitre_technique: Option<String>,
  /// Category label the summarizer receives (e.g. "SQL Injection").
  pub category: String,
  /// Suppression scope for this draft. Rule-namespaced, so rules never
  /// suppress one another.
  pub dedup_key: String,
  /// Events cited as the basis for the incident. Never empty.
  pub evidence: Vec<Event>,
}

impl IncidentDraft {
  pub fn evidence_ids(&self) -> Vec<Uuid> {
    self.evidence.iter().map(|e| e.id).collect()
  }
}

/// Enrichment lifecycle. CREATED and ENRICHING are transient; the two
/// terminal states differ only in whether remediation steps were filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentState {
  Created,
  Enriching,
  Enriched,
  EnrichmentFailed,
}

impl EnrichmentState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Created => "CREATED",
      Self::Enriching => "ENRICHING",
      Self::Enriched => "ENRICHED",
      Self::EnrichmentFailed => "ENRICHMENT_FAILED",
    }
  }
}

/// Persisted incident. `description` starts as the rule-generated text and is
/// replaced only if enrichment succeeds; it is never left empty.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub severity: Severity,
  pub decision: Decision,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mitre_technique: Option<String>,
  pub remediation_steps: Vec<String>,
  pub evidence_ids: Vec<Uuid>,
  pub dedup_key: String,
  pub enrichment: EnrichmentState,
  pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// HTTP error body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
  pub message: String,
}

impl ErrorBody {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}
