//! Store adapter boundaries, plus in-memory implementations for tests and
//! demo wiring.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{EnrichmentState, Event, EventType, Incident, IncidentDraft, NewEvent};

/// Append/query boundary over persisted events.
#[async_trait]
pub trait EventStore: Send + Sync {
  /// Persist an event; the store assigns id and timestamp. Timestamps are
  /// non-decreasing in insertion order.
  async fn append(&self, event: NewEvent) -> Result<Event, StoreError>;

  /// Events for `source_key` at or after `since`, oldest first, optionally
  /// filtered by type.
  async fn query(
    &self,
    source_key: &str,
    event_type: Option<&EventType>,
    since: DateTime<Utc>,
  ) -> Result<Vec<Event>, StoreError>;

  /// Number of events (any type) for `source_key` at or after `since`.
  async fn count(&self, source_key: &str, since: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Create/enrich boundary over persisted incidents.
#[async_trait]
pub trait IncidentStore: Send + Sync {
  /// Materialize a claimed draft. The incident starts in CREATED with the
  /// rule-generated description and no remediation steps.
  async fn create(&self, draft: &IncidentDraft) -> Result<Incident, StoreError>;

  /// CREATED -> ENRICHING.
  async fn begin_enrichment(&self, id: Uuid) -> Result<(), StoreError>;

  /// ENRICHING -> ENRICHED; replaces the description, sets remediation steps.
  async fn update_enrichment(
    &self,
    id: Uuid,
    summary: &str,
    remediation_steps: &[String],
  ) -> Result<(), StoreError>;

  /// ENRICHING -> ENRICHMENT_FAILED; the rule-generated description stays.
  async fn fail_enrichment(&self, id: Uuid) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryEventStore {
  events: Mutex<Vec<Event>>,
}

impl MemoryEventStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn all(&self) -> Vec<Event> {
    self.events.lock().await.clone()
  }
}

#[async_trait]
impl EventStore for MemoryEventStore {
  async fn append(&self, event: NewEvent) -> Result<Event, StoreError> {
    // Timestamp assigned under the lock, so it agrees with insertion order.
    let mut events = self.events.lock().await;
    let stored = Event {
      id: Uuid::new_v4(),
      source_key: event.source_key,
      event_type: event.event_type,
      details: event.details,
      timestamp: Utc::now(),
    };
    events.push(stored.clone());
    Ok(stored)
  }

  async fn query(
    &self,
    source_key: &str,
    event_type: Option<&EventType>,
    since: DateTime<Utc>,
  ) -> Result<Vec<Event>, StoreError> {
    let events = self.events.lock().await;
    Ok(
      events
        .iter()
        .filter(|e| e.source_key == source_key && e.timestamp >= since)
        .filter(|e| event_type.map_or(true, |t| e.event_type == *t))
        .cloned()
        .collect(),
    )
  }

  async fn count(&self, source_key: &str, since: DateTime<Utc>) -> Result<u64, StoreError> {
    let events = self.events.lock().await;
    Ok(
      events
        .iter()
        .filter(|e| e.source_key == source_key && e.timestamp >= since)
        .count() as u64,
    )
  }
}

#[derive(Default)]
pub struct MemoryIncidentStore {
  incidents: Mutex<Vec<Incident>>,
}

impl MemoryIncidentStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn all(&self) -> Vec<Incident> {
    self.incidents.lock().await.clone()
  }

  async fn with_incident<F>(&self, id: Uuid, apply: F) -> Result<(), StoreError>
  where
    F: FnOnce(&mut Incident),
  {
    let mut incidents = self.incidents.lock().await;
    let incident = incidents
      .iter_mut()
      .find(|i| i.id == id)
      .ok_or(StoreError::NotFound(id))?;
    apply(incident);
    Ok(())
  }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
  async fn create(&self, draft: &IncidentDraft) -> Result<Incident, StoreError> {
    let incident = Incident {
      id: Uuid::new_v4(),
      title: draft.title.clone(),
      description: draft.description.clone(),
      severity: draft.severity,
      decision: draft.decision,
      mitre_technique: draft.mitre_technique.clone(),
      remediation_steps: Vec::new(),
      evidence_ids: draft.evidence_ids(),
      dedup_key: draft.dedup_key.clone(),
      enrichment: EnrichmentState::Created,
      created_at: Utc::now(),
    };
    self.incidents.lock().await.push(incident.clone());
    Ok(incident)
  }

  async fn begin_enrichment(&self, id: Uuid) -> Result<(), StoreError> {
    self
      .with_incident(id, |incident| {
        incident.enrichment = EnrichmentState::Enriching;
      })
      .await
  }

  async fn update_enrichment(
    &self,
    id: Uuid,
    summary: &str,
    remediation_steps: &[String],
  ) -> Result<(), StoreError> {
    self
      .with_incident(id, |incident| {
        incident.description = summary.to_string();
        incident.remediation_steps = remediation_steps.to_vec();
        incident.enrichment = EnrichmentState::Enriched;
      })
      .await
  }

  async fn fail_enrichment(&self, id: Uuid) -> Result<(), StoreError> {
    self
      .with_incident(id, |incident| {
        incident.enrichment = EnrichmentState::EnrichmentFailed;
      })
      .await
  }
}
