//! Detection rules: pure functions over (new event, engine-fetched history).
//!
//! Each rule returns at most one incident draft. The engine fetches whatever
//! history a rule needs and runs the rules in a fixed order; dedup keys are
//! rule-namespaced, so ordering matters only for description readability.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::types::{Decision, Event, EventType, IncidentDraft, Severity};

/// Fixed SQL-injection signature set, matched case-insensitively against the
/// serialized details payload. First match is cited in the description.
pub const SQLI_SIGNATURES: [&str; 7] = [
  "union select",
  "or 1=1",
  "drop table",
  "--",
  ";--",
  "insert into",
  "xp_cmdshell",
];

/// Start-aligned bucket index for a window of `window_secs` seconds.
///
/// Co-occurring qualifying events in one window share a bucket and therefore
/// one dedup key.
pub fn window_bucket(ts: &DateTime<Utc>, window_secs: i64) -> i64 {
  ts.timestamp().div_euclid(window_secs)
}

/// Prompt-injection and honeytoken events map straight to an incident.
///
/// Keyed per event id: every occurrence is significant, and the claim only
/// guards against the same event being processed twice.
pub fn direct_trigger(event: &Event) -> Option<IncidentDraft> {
  let (title, description, severity, category, mitre) = match event.event_type {
    EventType::PromptInjectionAttempt => (
      "Prompt Injection Detected",
      "User attempted to bypass safety guardrails.".to_string(),
      Severity::High,
      "Prompt Injection",
      "T1059",
    ),
    EventType::HoneytokenTriggered => (
      "Honeytoken Leak Detected (Critical)",
      "The AI model outputted a secret honeytoken, indicating a successful prompt injection and data exfiltration attempt.".to_string(),
      Severity::Critical,
      "Data Exfiltration",
      "T1560",
    ),
    _ => return None,
  };

  Some(IncidentDraft {
    title: title.to_string(),
    description,
    severity,
    decision: Decision::Block,
    mitre_technique: Some(mitre.to_string()),
    category: category.to_string(),
    dedup_key: format!("{}:{}:{}", event.event_type, event.source_key, event.id),
    evidence: vec![event.clone()],
  })
}

/// A successful login preceded by enough failures from the same source.
///
/// `failures` is the LOGIN_FAIL history for the trailing window; the
/// triggering success joins it as evidence. Keyed by the window bucket of the
/// success, so a second rapid success cannot re-fire.
pub fn brute_force(event: &Event, failures: &[Event], config: &Config) -> Option<IncidentDraft> {
  if event.event_type != EventType::LoginSuccess {
    return None;
  }
  if failures.len() < config.brute_force_threshold {
    return None;
  }

  let bucket = window_bucket(&event.timestamp, config.brute_force_window().num_seconds());
  let mut evidence = failures.to_vec();
  evidence.push(event.clone());

  Some(IncidentDraft {
    title: "Brute Force Success".to_string(),
    description: format!(
      "Detected {} failed logins followed by a success from IP {}.",
      failures.len(),
      event.source_key
    ),
    severity: Severity::Critical,
    decision: Decision::Flag,
    mitre_technique: Some("T1110".to_string()),
    category: "Brute Force Success".to_string(),
    dedup_key: format!("bruteforce:{}:{}", event.source_key, bucket),
    evidence,
  })
}

/// Known SQL-injection signatures in the serialized details payload.
///
/// Keyed per event id: every matching request is its own incident candidate.
pub fn sql_injection(event: &Event) -> Option<IncidentDraft> {
  if event.event_type != EventType::SqlQuery && event.event_type != EventType::HttpRequest {
    return None;
  }

  let payload = event.details.to_string().to_ascii_lowercase();
  let signature = SQLI_SIGNATURES.iter().find(|sig| payload.contains(*sig))?;

  Some(IncidentDraft {
    title: "SQL Injection Attempt".to_string(),
    description: format!(
      "Detected SQL Injection pattern '{}' in request from {}.",
      signature, event.source_key
    ),
    severity: Severity::High,
    decision: Decision::Block,
    mitre_technique: Some("T1190".to_string()),
    category: "SQL Injection".to_string(),
    dedup_key: format!("sqli:{}:{}", event.source_key, event.id),
    evidence: vec![event.clone()],
  })
}

/// High event volume from a single source, any event type.
///
/// `window_count` is the store's count for the trailing window, including the
/// triggering event; `recent` is the capped evidence slice. Keyed by window
/// bucket: a burst yields exactly one incident, not one per qualifying event.
pub fn volume_flood(
  event: &Event,
  window_count: u64,
  recent: &[Event],
  config: &Config,
) -> Option<IncidentDraft> {
  if window_count < config.ddos_threshold {
    return None;
  }

  let bucket = window_bucket(&event.timestamp, config.ddos_window().num_seconds());
  let evidence = if recent.is_empty() {
    vec![event.clone()]
  } else {
    recent.to_vec()
  };

  Some(IncidentDraft {
    title: "DDoS Attack Detected".to_string(),
    description: format!(
      "High traffic volume detected from IP {}: {} requests in {}s.",
      event.source_key, window_count, config.ddos_window_seconds
    ),
    severity: Severity::Critical,
    decision: Decision::Block,
    mitre_technique: Some("T1498".to_string()),
    category: "DDoS Attack".to_string(),
    dedup_key: format!("ddos:{}:{}", event.source_key, bucket),
    evidence,
  })
}
