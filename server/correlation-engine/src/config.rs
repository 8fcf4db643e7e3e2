//! Engine configuration with sane defaults.

use chrono::Duration;

/// Tunable thresholds for the detection rules and the summarizer call.
#[derive(Debug, Clone)]
pub struct Config {
  /// Trailing window for counting failed logins before a success, in minutes.
  pub brute_force_window_minutes: i64,
  /// Failed logins required to flag a successful login.
  pub brute_force_threshold: usize,
  /// Trailing window for the volume check, in seconds.
  pub ddos_window_seconds: i64,
  /// Events from one source within the window considered a flood.
  pub ddos_threshold: u64,
  /// Most recent window events linked as flood evidence.
  pub ddos_evidence_cap: usize,
  /// Upper bound on one summarizer call, in seconds.
  pub enrichment_timeout_seconds: u64,
}

impl Config {
  pub fn brute_force_window(&self) -> Duration {
    Duration::minutes(self.brute_force_window_minutes)
  }

  pub fn ddos_window(&self) -> Duration {
    Duration::seconds(self.ddos_window_seconds)
  }

  /// Claims are retained as long as the longest detection window, so a key
  /// can never be evicted before its window closes.
  pub fn claim_retention(&self) -> Duration {
    std::cmp::max(self.brute_force_window(), self.ddos_window())
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      brute_force_window_minutes: 15,
      brute_force_threshold: 5,
      ddos_window_seconds: 10,
      ddos_threshold: 20,
      ddos_evidence_cap: 10,
      enrichment_timeout_seconds: 5,
    }
  }
}
