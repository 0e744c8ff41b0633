//! Structured cache keys and the registry of every key the portal uses.
//!
//! A [`QueryKey`] is an ordered list of typed segments. Keys are compared
//! segment by segment, so `["admin", "recent-clients", 5]` and
//! `["admin", "recent-clients", 10]` never collide, and both live under the
//! `["admin"]` namespace for prefix invalidation.

use std::fmt;

use uuid::Uuid;

/// One component of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
  Str(&'static str),
  Int(u64),
  Id(Uuid),
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Str(s) => f.write_str(s),
      Self::Int(n) => write!(f, "{n}"),
      Self::Id(id) => write!(f, "{id}"),
    }
  }
}

impl From<&'static str> for Segment {
  fn from(s: &'static str) -> Self { Self::Str(s) }
}

impl From<u64> for Segment {
  fn from(n: u64) -> Self { Self::Int(n) }
}

impl From<usize> for Segment {
  fn from(n: usize) -> Self { Self::Int(n as u64) }
}

impl From<Uuid> for Segment {
  fn from(id: Uuid) -> Self { Self::Id(id) }
}

/// Identity of a cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<Segment>);

impl QueryKey {
  pub fn root() -> Self { Self::default() }

  /// Extend the key with one more segment.
  pub fn with(mut self, segment: impl Into<Segment>) -> Self {
    self.0.push(segment.into());
    self
  }

  pub fn segments(&self) -> &[Segment] { &self.0 }

  /// True if every segment of `prefix` matches the start of `self`.
  /// Every key starts with itself and with [`QueryKey::root`].
  pub fn starts_with(&self, prefix: &QueryKey) -> bool { self.0.starts_with(&prefix.0) }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[")?;
    for (i, segment) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("/")?;
      }
      write!(f, "{segment}")?;
    }
    f.write_str("]")
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Admin dashboard keys.
pub mod admin {
  use super::QueryKey;

  pub fn all() -> QueryKey { QueryKey::root().with("admin") }

  pub fn stats() -> QueryKey { all().with("stats") }

  /// Parent of every `recent_clients(limit)` key.
  pub fn recent_clients_all() -> QueryKey { all().with("recent-clients") }

  pub fn recent_clients(limit: usize) -> QueryKey { recent_clients_all().with(limit) }

  pub fn client_stats() -> QueryKey { all().with("client-stats") }
}

/// Per-client keys, shared by the admin view of a client and the client's
/// own session.
pub mod client {
  use uuid::Uuid;

  use super::QueryKey;

  pub fn all(id: Uuid) -> QueryKey { QueryKey::root().with("client").with(id) }

  pub fn profile(id: Uuid) -> QueryKey { all(id).with("profile") }

  pub fn updates_all(id: Uuid) -> QueryKey { all(id).with("updates") }

  pub fn updates(id: Uuid, limit: usize) -> QueryKey { updates_all(id).with(limit) }
}

/// Public blog posts.
pub mod posts {
  use super::QueryKey;

  pub fn all() -> QueryKey { QueryKey::root().with("posts") }

  pub fn list(limit: usize) -> QueryKey { all().with("list").with(limit) }
}
