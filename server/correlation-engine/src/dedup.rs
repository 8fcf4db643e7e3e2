//! Incident deduplication: atomic claim map with bounded retention.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Converts "N qualifying events processed concurrently" into "exactly one
/// incident created" per claim key.
///
/// Claims expire after the retention window. An expired claim is reclaimed in
/// place by the next `try_claim`; `sweep` evicts the rest so the map stays
/// bounded. A key is never evicted before its window.
pub struct Deduplicator {
  claims: DashMap<String, DateTime<Utc>>,
  retention: Duration,
}

impl Deduplicator {
  pub fn new(retention: Duration) -> Self {
    Self {
      claims: DashMap::new(),
      retention,
    }
  }

  /// Claim `key` at `now`. Returns true exactly once per retention window.
  ///
  /// The entry holds its shard lock for the whole check-and-set, so two
  /// concurrent callers cannot both win.
  pub fn try_claim(&self, key: &str, now: DateTime<Utc>) -> bool {
    match self.claims.entry(key.to_string()) {
      Entry::Occupied(mut occupied) => {
        if now - *occupied.get() >= self.retention {
          occupied.insert(now);
          true
        } else {
          false
        }
      }
      Entry::Vacant(vacant) => {
        vacant.insert(now);
        true
      }
    }
  }

  /// Drop claims whose retention window has passed.
  pub fn sweep(&self, now: DateTime<Utc>) {
    self.claims.retain(|_, claimed_at| now - *claimed_at < self.retention);
  }

  pub fn len(&self) -> usize {
    self.claims.len()
  }

  pub fn is_empty(&self) -> bool {
    self.claims.is_empty()
  }
}
