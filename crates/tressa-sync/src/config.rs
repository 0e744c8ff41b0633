//! Staleness windows for each read hook.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// How long a cached value is served without a background refetch.
///
/// Deserializes from whole seconds, e.g. in TOML:
///
/// ```toml
/// [stale_times]
/// updates = 60
/// posts   = 600
/// ```
///
/// Missing fields keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StaleTimes {
  #[serde(deserialize_with = "seconds")]
  pub profile:        Duration,
  #[serde(deserialize_with = "seconds")]
  pub admin_stats:    Duration,
  #[serde(deserialize_with = "seconds")]
  pub recent_clients: Duration,
  #[serde(deserialize_with = "seconds")]
  pub client_stats:   Duration,
  #[serde(deserialize_with = "seconds")]
  pub updates:        Duration,
  #[serde(deserialize_with = "seconds")]
  pub posts:          Duration,
}

const MINUTE: Duration = Duration::from_secs(60);

impl Default for StaleTimes {
  fn default() -> Self {
    Self {
      profile:        10 * MINUTE,
      admin_stats:    10 * MINUTE,
      recent_clients: 10 * MINUTE,
      client_stats:   10 * MINUTE,
      updates:        2 * MINUTE,
      posts:          5 * MINUTE,
    }
  }
}

fn seconds<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
  u64::deserialize(d).map(Duration::from_secs)
}
