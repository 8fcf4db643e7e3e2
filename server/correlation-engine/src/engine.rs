//! Correlation engine: ingest orchestration, dedup claims, enrichment spawn.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::enrich::Summarizer;
use crate::error::{EngineError, StoreError};
use crate::rules;
use crate::store::{EventStore, IncidentStore};
use crate::types::{Event, EventType, IncidentDraft, IngestPayload, NewEvent};

/// The correlation engine. All dependencies are injected at construction;
/// there is no module-level state.
pub struct CorrelationEngine {
  events: Arc<dyn EventStore>,
  incidents: Arc<dyn IncidentStore>,
  summarizer: Arc<dyn Summarizer>,
  dedup: Deduplicator,
  config: Config,
  enrichment_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CorrelationEngine {
  pub fn new(
    events: Arc<dyn EventStore>,
    incidents: Arc<dyn IncidentStore>,
    summarizer: Arc<dyn Summarizer>,
    config: Config,
  ) -> Self {
    let dedup = Deduplicator::new(config.claim_retention());
    Self {
      events,
      incidents,
      summarizer,
      dedup,
      config,
      enrichment_tasks: Mutex::new(Vec::new()),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn dedup(&self) -> &Deduplicator {
    &self.dedup
  }

  /// Ingest one raw event.
  ///
  /// Validates, persists, evaluates the rules, and materializes at most one
  /// incident per successful claim. Incident-create failures after the event
  /// write are logged, not surfaced: the event write already succeeded.
  /// Enrichment never blocks this path.
  pub async fn ingest(&self, payload: IngestPayload) -> Result<Event, EngineError> {
    let new_event = validate(payload)?;
    let event = self.events.append(new_event).await?;

    for draft in self.evaluate_rules(&event).await {
      if !self.dedup.try_claim(&draft.dedup_key, event.timestamp) {
        debug!(dedup_key = %draft.dedup_key, "duplicate suppressed");
        continue;
      }
      match self.incidents.create(&draft).await {
        Ok(incident) => self.spawn_enrichment(incident.id, draft).await,
        Err(e) => error!(dedup_key = %draft.dedup_key, "incident create failed: {e}"),
      }
    }

    Ok(event)
  }

  /// Await all outstanding enrichment tasks. Lets callers observe terminal
  /// enrichment states without racing the detached tasks.
  pub async fn flush_enrichment(&self) {
    let handles: Vec<JoinHandle<()>> = self.enrichment_tasks.lock().await.drain(..).collect();
    for handle in handles {
      let _ = handle.await;
    }
  }

  /// Evaluate the four rules in fixed order: direct trigger, brute force,
  /// SQL injection, volume flood. A store failure during one rule's history
  /// fetch is logged and does not stop the others.
  async fn evaluate_rules(&self, event: &Event) -> Vec<IncidentDraft> {
    let mut drafts = Vec::new();

    if let Some(draft) = rules::direct_trigger(event) {
      drafts.push(draft);
    }

    match self.brute_force_check(event).await {
      Ok(Some(draft)) => drafts.push(draft),
      Ok(None) => {}
      Err(e) => {
        warn!(source_key = %event.source_key, "brute force history fetch failed: {e}");
      }
    }

    if let Some(draft) = rules::sql_injection(event) {
      drafts.push(draft);
    }

    match self.flood_check(event).await {
      Ok(Some(draft)) => drafts.push(draft),
      Ok(None) => {}
      Err(e) => {
        warn!(source_key = %event.source_key, "volume history fetch failed: {e}");
      }
    }

    drafts
  }

  async fn brute_force_check(&self, event: &Event) -> Result<Option<IncidentDraft>, StoreError> {
    if event.event_type != EventType::LoginSuccess {
      return Ok(None);
    }
    let since = event.timestamp - self.config.brute_force_window();
    let failures = self
      .events
      .query(&event.source_key, Some(&EventType::LoginFail), since)
      .await?;
    Ok(rules::brute_force(event, &failures, &self.config))
  }

  async fn flood_check(&self, event: &Event) -> Result<Option<IncidentDraft>, StoreError> {
    let since = event.timestamp - self.config.ddos_window();
    let count = self.events.count(&event.source_key, since).await?;
    if count < self.config.ddos_threshold {
      return Ok(None);
    }
    let recent = self.events.query(&event.source_key, None, since).await?;
    let start = recent.len().saturating_sub(self.config.ddos_evidence_cap);
    Ok(rules::volume_flood(event, count, &recent[start..], &self.config))
  }

  /// Fire-and-forget enrichment for a newly created incident. At most one
  /// attempt; any failure leaves the rule-generated description in place.
  async fn spawn_enrichment(&self, incident_id: Uuid, draft: IncidentDraft) {
    let incidents = Arc::clone(&self.incidents);
    let summarizer = Arc::clone(&self.summarizer);

    let handle = tokio::spawn(async move {
      if let Err(e) = incidents.begin_enrichment(incident_id).await {
        warn!(%incident_id, "begin enrichment failed: {e}");
        return;
      }

      let outcome = summarizer.summarize(&draft.evidence, &draft.category).await;
      let result = match outcome {
        Ok(Some(enrichment)) => {
          incidents
            .update_enrichment(incident_id, &enrichment.summary, &enrichment.remediation_steps)
            .await
        }
        Ok(None) => {
          debug!(%incident_id, "summarizer had no enrichment to offer");
          incidents.fail_enrichment(incident_id).await
        }
        Err(e) => {
          warn!(%incident_id, "summarizer call failed: {e}");
          incidents.fail_enrichment(incident_id).await
        }
      };
      if let Err(e) = result {
        warn!(%incident_id, "recording enrichment outcome failed: {e}");
      }
    });

    self.enrichment_tasks.lock().await.push(handle);
  }
}

/// Validate required ingest fields and build the store-ready event.
fn validate(payload: IngestPayload) -> Result<NewEvent, EngineError> {
  if payload.source_key.trim().is_empty() {
    return Err(EngineError::validation("sourceKey", "must not be empty"));
  }
  if payload.event_type.trim().is_empty() {
    return Err(EngineError::validation("eventType", "must not be empty"));
  }
  Ok(NewEvent {
    source_key: payload.source_key,
    event_type: EventType::parse(&payload.event_type),
    details: payload
      .details
      .unwrap_or_else(|| Value::Object(Default::default())),
  })
}
