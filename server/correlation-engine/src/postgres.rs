//! Postgres-backed store adapters. Table definitions live in db/schema.sql.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{EventStore, IncidentStore};
use crate::types::{EnrichmentState, Event, EventType, Incident, IncidentDraft, NewEvent};

pub struct PgEventStore {
  pool: PgPool,
}

impl PgEventStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

fn row_to_event(row: PgRow) -> Result<Event, StoreError> {
  let event_type: String = row.try_get("event_type")?;
  Ok(Event {
    id: row.try_get("id")?,
    source_key: row.try_get("source_key")?,
    event_type: EventType::parse(&event_type),
    details: row.try_get("details")?,
    timestamp: row.try_get("created_at")?,
  })
}

#[async_trait]
impl EventStore for PgEventStore {
  async fn append(&self, event: NewEvent) -> Result<Event, StoreError> {
    let id = Uuid::new_v4();
    let row = sqlx::query(
      r#"
      INSERT INTO events (id, source_key, event_type, details)
      VALUES ($1, $2, $3, $4)
      RETURNING created_at
      "#,
    )
    .bind(id)
    .bind(&event.source_key)
    .bind(event.event_type.as_str())
    .bind(&event.details)
    .fetch_one(&self.pool)
    .await?;

    Ok(Event {
      id,
      source_key: event.source_key,
      event_type: event.event_type,
      details: event.details,
      timestamp: row.try_get("created_at")?,
    })
  }

  async fn query(
    &self,
    source_key: &str,
    event_type: Option<&EventType>,
    since: DateTime<Utc>,
  ) -> Result<Vec<Event>, StoreError> {
    let rows = match event_type {
      Some(event_type) => {
        sqlx::query(
          r#"
          SELECT id, source_key, event_type, details, created_at
          FROM events
          WHERE source_key = $1 AND created_at >= $2 AND event_type = $3
          ORDER BY created_at ASC
          "#,
        )
        .bind(source_key)
        .bind(since)
        .bind(event_type.as_str())
        .fetch_all(&self.pool)
        .await?
      }
      None => {
        sqlx::query(
          r#"
          SELECT id, source_key, event_type, details, created_at
          FROM events
          WHERE source_key = $1 AND created_at >= $2
          ORDER BY created_at ASC
          "#,
        )
        .bind(source_key)
        .bind(since)
        .fetch_all(&self.pool)
        .await?
      }
    };

    rows.into_iter().map(row_to_event).collect()
  }

  async fn count(&self, source_key: &str, since: DateTime<Utc>) -> Result<u64, StoreError> {
    let row = sqlx::query(
      "SELECT COUNT(*) AS n FROM events WHERE source_key = $1 AND created_at >= $2",
    )
    .bind(source_key)
    .bind(since)
    .fetch_one(&self.pool)
    .await?;

    let n: i64 = row.try_get("n")?;
    Ok(n as u64)
  }
}

pub struct PgIncidentStore {
  pool: PgPool,
}

impl PgIncidentStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn set_state(&self, id: Uuid, state: EnrichmentState) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE incidents SET enrichment_state = $2 WHERE id = $1")
      .bind(id)
      .bind(state.as_str())
      .execute(&self.pool)
      .await?;
    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(id));
    }
    Ok(())
  }
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
  async fn create(&self, draft: &IncidentDraft) -> Result<Incident, StoreError> {
    let id = Uuid::new_v4();
    let evidence_ids = draft.evidence_ids();

    let mut tx = self.pool.begin().await?;

    let row = sqlx::query(
      r#"
      INSERT INTO incidents
        (id, title, description, severity, decision, mitre_technique,
         remediation_steps, dedup_key, enrichment_state)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
      RETURNING created_at
      "#,
    )
    .bind(id)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.severity.as_str())
    .bind(draft.decision.as_str())
    .bind(draft.mitre_technique.as_deref())
    .bind(Vec::<String>::new())
    .bind(&draft.dedup_key)
    .bind(EnrichmentState::Created.as_str())
    .fetch_one(&mut *tx)
    .await?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    sqlx::query(
      r#"
      INSERT INTO incident_events (incident_id, event_id)
      SELECT $1, unnest($2::uuid[])
      "#,
    )
    .bind(id)
    .bind(&evidence_ids)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Incident {
      id,
      title: draft.title.clone(),
      description: draft.description.clone(),
      severity: draft.severity,
      decision: draft.decision,
      mitre_technique: draft.mitre_technique.clone(),
      remediation_steps: Vec::new(),
      evidence_ids,
      dedup_key: draft.dedup_key.clone(),
      enrichment: EnrichmentState::Created,
      created_at,
    })
  }

  async fn begin_enrichment(&self, id: Uuid) -> Result<(), StoreError> {
    self.set_state(id, EnrichmentState::Enriching).await
  }

  async fn update_enrichment(
    &self,
    id: Uuid,
    summary: &str,
    remediation_steps: &[String],
  ) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
      UPDATE incidents
      SET description = $2, remediation_steps = $3, enrichment_state = $4
      WHERE id = $1
      "#,
    )
    .bind(id)
    .bind(summary)
    .bind(remediation_steps.to_vec())
    .bind(EnrichmentState::Enriched.as_str())
    .execute(&self.pool)
    .await?;
    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(id));
    }
    Ok(())
  }

  async fn fail_enrichment(&self, id: Uuid) -> Result<(), StoreError> {
    self.set_state(id, EnrichmentState::EnrichmentFailed).await
  }
}
