//! Response schemas for the dashboard and portal read endpoints.
//!
//! Field names are part of the wire contract consumed by the web front end,
//! which is why some are camelCase and some snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  client::{Client, Credentials},
  post::Post,
  update::ClientUpdate,
};

/// `GET /admin/stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
  pub clients_count: u64,
  pub posts_count:   u64,
  pub updates_count: u64,
}

/// One row of `GET /admin/recent-clients`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentClient {
  pub id:          Uuid,
  pub name:        String,
  pub avatar_url:  Option<String>,
  /// Creation time of the client's newest update, if any.
  #[serde(rename = "lastUpdate")]
  pub last_update: Option<DateTime<Utc>>,
}

/// `GET /admin/client-stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStatusCounts {
  pub total:              u64,
  /// Clients with an upcoming appointment.
  #[serde(rename = "comMarcacao")]
  pub with_appointment:   u64,
  #[serde(rename = "semMarcacao")]
  pub without_appointment: u64,
}

impl ClientStatusCounts {
  pub fn tally<'a>(clients: impl IntoIterator<Item = &'a Client>, now: DateTime<Utc>) -> Self {
    clients.into_iter().fold(Self::default(), |mut acc, c| {
      acc.total += 1;
      if c.status_at(now).is_upcoming() {
        acc.with_appointment += 1;
      } else {
        acc.without_appointment += 1;
      }
      acc
    })
  }
}

/// `GET /me/profile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
  pub id:         Uuid,
  pub name:       String,
  pub avatar_url: Option<String>,
}

impl From<&Client> for ProfileSummary {
  fn from(c: &Client) -> Self {
    Self {
      id:         c.id,
      name:       c.name.clone(),
      avatar_url: c.avatar_url.clone(),
    }
  }
}

/// `GET /me/updates` and `GET /admin/clients/{id}/updates`: the newest
/// `limit` updates plus the total number the client has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatesPage {
  pub updates: Vec<ClientUpdate>,
  pub count:   u64,
}

/// One row of `GET /posts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
  pub id:         Uuid,
  pub title:      String,
  pub content:    String,
  pub image_url:  Option<String>,
  pub created_at: DateTime<Utc>,
}

impl From<Post> for PostSummary {
  fn from(p: Post) -> Self {
    Self {
      id:         p.id,
      title:      p.title,
      content:    p.content,
      image_url:  p.image_url,
      created_at: p.created_at,
    }
  }
}

// ─── Action results ──────────────────────────────────────────────────────────

/// Result of the create-client action: `{ success, credentials }` or
/// `{ error }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreateClientOutcome {
  Created {
    success:     bool,
    credentials: Credentials,
  },
  Failed {
    error: String,
  },
}

/// Result of a delete action: `{ success }` or `{ error }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionOutcome {
  Done { success: bool },
  Failed { error: String },
}

impl ActionOutcome {
  pub fn ok() -> Self { Self::Done { success: true } }
}
