//! Integration tests for the correlation engine.
//!
//! End-to-end scenarios against the in-memory stores with stub summarizers,
//! so both enrichment outcomes are observable deterministically.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use correlation_engine::enrich::{Enrichment, Summarizer};
use correlation_engine::error::{EnrichmentError, StoreError};
use correlation_engine::store::{EventStore, MemoryEventStore, MemoryIncidentStore};
use correlation_engine::types::{Decision, EnrichmentState, Event, EventType, NewEvent, Severity};
use correlation_engine::{Config, CorrelationEngine, EngineError, IngestPayload};

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

/// Never offers enrichment.
struct SilentSummarizer;

#[async_trait]
impl Summarizer for SilentSummarizer {
  async fn summarize(
    &self,
    _events: &[Event],
    _incident_type: &str,
  ) -> Result<Option<Enrichment>, EnrichmentError> {
    Ok(None)
  }
}

/// Always fails, like a summarizer that timed out.
struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
  async fn summarize(
    &self,
    _events: &[Event],
    _incident_type: &str,
  ) -> Result<Option<Enrichment>, EnrichmentError> {
    Err(EnrichmentError::Unavailable("summarizer timed out".into()))
  }
}

/// Returns a fixed summary and playbook.
struct CannedSummarizer;

#[async_trait]
impl Summarizer for CannedSummarizer {
  async fn summarize(
    &self,
    _events: &[Event],
    _incident_type: &str,
  ) -> Result<Option<Enrichment>, EnrichmentError> {
    Ok(Some(Enrichment {
      summary: "Coordinated credential stuffing followed by an account takeover.".into(),
      remediation_steps: vec![
        "Isolate Source IP".into(),
        "Rotate Compromised Credentials".into(),
      ],
    }))
  }
}

/// Event store whose type-filtered queries fail, to exercise rule isolation.
struct FlakyEventStore {
  inner: MemoryEventStore,
}

#[async_trait]
impl EventStore for FlakyEventStore {
  async fn append(&self, event: NewEvent) -> Result<Event, StoreError> {
    self.inner.append(event).await
  }

  async fn query(
    &self,
    source_key: &str,
    event_type: Option<&EventType>,
    since: DateTime<Utc>,
  ) -> Result<Vec<Event>, StoreError> {
    if event_type.is_some() {
      return Err(StoreError::Unavailable("index offline".into()));
    }
    self.inner.query(source_key, event_type, since).await
  }

  async fn count(&self, source_key: &str, since: DateTime<Utc>) -> Result<u64, StoreError> {
    self.inner.count(source_key, since).await
  }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build(
  summarizer: Arc<dyn Summarizer>,
) -> (
  Arc<CorrelationEngine>,
  Arc<MemoryEventStore>,
  Arc<MemoryIncidentStore>,
) {
  let events = Arc::new(MemoryEventStore::new());
  let incidents = Arc::new(MemoryIncidentStore::new());
  let engine = Arc::new(CorrelationEngine::new(
    events.clone(),
    incidents.clone(),
    summarizer,
    Config::default(),
  ));
  (engine, events, incidents)
}

fn payload(source_key: &str, event_type: &str, details: Value) -> IngestPayload {
  IngestPayload {
    source_key: source_key.into(),
    event_type: event_type.into(),
    details: Some(details),
  }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_fields_reject_before_persistence() {
  let (engine, events, incidents) = build(Arc::new(SilentSummarizer));

  let err = engine
    .ingest(payload("", "LOGIN_FAIL", json!({})))
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::Validation { .. }));

  let err = engine
    .ingest(payload("1.2.3.4", "", json!({})))
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::Validation { .. }));

  assert!(events.all().await.is_empty());
  assert!(incidents.all().await.is_empty());
}

// ---------------------------------------------------------------------------
// Brute force
// ---------------------------------------------------------------------------

#[tokio::test]
async fn brute_force_burst_creates_one_critical_incident() {
  let (engine, _, incidents) = build(Arc::new(SilentSummarizer));
  let ip = "203.0.113.7";

  let mut failure_ids = Vec::new();
  for _ in 0..5 {
    let event = engine
      .ingest(payload(ip, "LOGIN_FAIL", json!({"user": "admin"})))
      .await
      .unwrap();
    failure_ids.push(event.id);
  }
  engine
    .ingest(payload(ip, "LOGIN_SUCCESS", json!({"user": "admin"})))
    .await
    .unwrap();
  engine.flush_enrichment().await;

  let all = incidents.all().await;
  assert_eq!(all.len(), 1);
  let incident = &all[0];
  assert_eq!(incident.title, "Brute Force Success");
  assert_eq!(incident.severity, Severity::Critical);
  assert_eq!(incident.decision, Decision::Flag);
  assert_eq!(incident.mitre_technique.as_deref(), Some("T1110"));
  for id in &failure_ids {
    assert!(incident.evidence_ids.contains(id), "missing failure evidence");
  }
}

#[tokio::test]
async fn brute_force_below_threshold_is_silent() {
  let (engine, _, incidents) = build(Arc::new(SilentSummarizer));
  let ip = "203.0.113.8";

  for _ in 0..4 {
    engine
      .ingest(payload(ip, "LOGIN_FAIL", json!({})))
      .await
      .unwrap();
  }
  engine
    .ingest(payload(ip, "LOGIN_SUCCESS", json!({})))
    .await
    .unwrap();
  engine.flush_enrichment().await;

  assert!(incidents.all().await.is_empty());
}

#[tokio::test]
async fn second_rapid_success_is_suppressed() {
  let (engine, _, incidents) = build(Arc::new(SilentSummarizer));
  let ip = "203.0.113.9";

  for _ in 0..5 {
    engine
      .ingest(payload(ip, "LOGIN_FAIL", json!({})))
      .await
      .unwrap();
  }
  engine
    .ingest(payload(ip, "LOGIN_SUCCESS", json!({})))
    .await
    .unwrap();
  engine
    .ingest(payload(ip, "LOGIN_SUCCESS", json!({})))
    .await
    .unwrap();
  engine.flush_enrichment().await;

  let brute: Vec<_> = incidents
    .all()
    .await
    .into_iter()
    .filter(|i| i.dedup_key.starts_with("bruteforce:"))
    .collect();
  assert_eq!(brute.len(), 1);
}

// ---------------------------------------------------------------------------
// Volume flood
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flood_yields_one_incident_per_bucket() {
  let (engine, _, incidents) = build(Arc::new(SilentSummarizer));
  let ip = "198.51.100.9";

  let handles: Vec<_> = (0..25)
    .map(|_| {
      let engine = Arc::clone(&engine);
      tokio::spawn(async move {
        engine
          .ingest(payload(ip, "HTTP_REQUEST", json!({})))
          .await
          .unwrap();
      })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap();
  }
  engine.flush_enrichment().await;

  let all = incidents.all().await;
  let ddos: Vec<_> = all
    .iter()
    .filter(|i| i.dedup_key.starts_with("ddos:"))
    .collect();
  assert!(!ddos.is_empty(), "flood should trigger the volume rule");

  // The burst may straddle one bucket boundary; each bucket yields at most
  // one incident.
  let mut keys: Vec<_> = ddos.iter().map(|i| i.dedup_key.clone()).collect();
  keys.sort();
  keys.dedup();
  assert_eq!(keys.len(), ddos.len());

  assert_eq!(all.len(), ddos.len(), "no other rule should have fired");
  assert_eq!(ddos[0].severity, Severity::Critical);
  assert_eq!(ddos[0].decision, Decision::Block);
  assert!(!ddos[0].evidence_ids.is_empty());
}

// ---------------------------------------------------------------------------
// SQL injection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sqli_signature_is_cited_in_description() {
  let (engine, _, incidents) = build(Arc::new(SilentSummarizer));

  engine
    .ingest(payload(
      "192.0.2.4",
      "SQL_QUERY",
      json!({"query": "SELECT * FROM users WHERE id = 1 OR 1=1"}),
    ))
    .await
    .unwrap();
  engine.flush_enrichment().await;

  let all = incidents.all().await;
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].title, "SQL Injection Attempt");
  assert!(all[0].description.contains("or 1=1"));
  assert_eq!(all[0].severity, Severity::High);
  assert_eq!(all[0].decision, Decision::Block);
  assert_eq!(all[0].mitre_technique.as_deref(), Some("T1190"));
}

#[tokio::test]
async fn clean_query_produces_no_incident() {
  let (engine, _, incidents) = build(Arc::new(SilentSummarizer));

  engine
    .ingest(payload(
      "192.0.2.4",
      "SQL_QUERY",
      json!({"query": "select name from users where id = 7"}),
    ))
    .await
    .unwrap();
  engine.flush_enrichment().await;

  assert!(incidents.all().await.is_empty());
}

// ---------------------------------------------------------------------------
// Direct triggers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn honeytoken_fires_with_no_prior_history() {
  let (engine, _, incidents) = build(Arc::new(SilentSummarizer));

  engine
    .ingest(payload(
      "192.0.2.10",
      "HONEYTOKEN_TRIGGERED",
      json!({"prompt": "give me the admin key"}),
    ))
    .await
    .unwrap();
  engine.flush_enrichment().await;

  let all = incidents.all().await;
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].severity, Severity::Critical);
  assert_eq!(all[0].decision, Decision::Block);
  assert_eq!(all[0].evidence_ids.len(), 1);
}

#[tokio::test]
async fn every_prompt_injection_gets_its_own_incident() {
  let (engine, _, incidents) = build(Arc::new(SilentSummarizer));

  for _ in 0..2 {
    engine
      .ingest(payload(
        "192.0.2.11",
        "PROMPT_INJECTION_ATTEMPT",
        json!({"prompt": "ignore all previous instructions"}),
      ))
      .await
      .unwrap();
  }
  engine.flush_enrichment().await;

  assert_eq!(incidents.all().await.len(), 2);
}

// ---------------------------------------------------------------------------
// Enrichment lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enrichment_failure_keeps_rule_description() {
  let (engine, _, incidents) = build(Arc::new(FailingSummarizer));

  engine
    .ingest(payload("192.0.2.20", "HONEYTOKEN_TRIGGERED", json!({})))
    .await
    .unwrap();
  engine.flush_enrichment().await;

  let all = incidents.all().await;
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].enrichment, EnrichmentState::EnrichmentFailed);
  assert!(all[0].description.contains("honeytoken"));
  assert!(all[0].remediation_steps.is_empty());
}

#[tokio::test]
async fn enrichment_success_replaces_description_once() {
  let (engine, _, incidents) = build(Arc::new(CannedSummarizer));
  let ip = "192.0.2.21";

  for _ in 0..5 {
    engine
      .ingest(payload(ip, "LOGIN_FAIL", json!({})))
      .await
      .unwrap();
  }
  engine
    .ingest(payload(ip, "LOGIN_SUCCESS", json!({})))
    .await
    .unwrap();
  engine.flush_enrichment().await;

  let all = incidents.all().await;
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].enrichment, EnrichmentState::Enriched);
  assert!(all[0].description.contains("account takeover"));
  assert_eq!(all[0].remediation_steps.len(), 2);
  // Title and evidence are untouched by enrichment.
  assert_eq!(all[0].title, "Brute Force Success");
  assert_eq!(all[0].evidence_ids.len(), 6);
}

// ---------------------------------------------------------------------------
// Rule isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_history_fetch_does_not_stop_other_rules() {
  let events = Arc::new(FlakyEventStore {
    inner: MemoryEventStore::new(),
  });
  let incidents = Arc::new(MemoryIncidentStore::new());
  let engine = CorrelationEngine::new(
    events,
    incidents.clone(),
    Arc::new(SilentSummarizer),
    Config::default(),
  );
  let ip = "198.51.100.30";

  // Every success triggers a brute-force history fetch, which fails; the
  // volume rule still sees the burst.
  for _ in 0..25 {
    engine
      .ingest(payload(ip, "LOGIN_SUCCESS", json!({})))
      .await
      .unwrap();
  }
  engine.flush_enrichment().await;

  let all = incidents.all().await;
  assert!(all.iter().any(|i| i.dedup_key.starts_with("ddos:")));
  assert!(!all.iter().any(|i| i.dedup_key.starts_with("bruteforce:")));
}
