//! Client updates: timestamped notes the practitioner writes for one client,
//! with optional file attachments and the client's own engagement state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Category ────────────────────────────────────────────────────────────────

/// What an update is about. The snake_case name is stored in the database.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdateCategory {
  /// Progress of the hair or scalp condition.
  Evolution,
  /// Home-care routine instructions.
  Routine,
  Recommendation,
  Scheduling,
  #[default]
  Other,
}

impl UpdateCategory {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownCategory(s.to_owned()))
  }
}

// ─── Attachments ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
  Image,
  Document,
}

impl AttachmentKind {
  pub fn from_media_type(media_type: &str) -> Self {
    if media_type.starts_with("image/") {
      Self::Image
    } else {
      Self::Document
    }
  }
}

/// A file bound to exactly one update. The bytes live on disk; only metadata
/// is stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
  pub id:           Uuid,
  pub update_id:    Uuid,
  pub file_name:    String,
  pub media_type:   String,
  pub kind:         AttachmentKind,
  /// Path relative to the configured attachment directory.
  pub path:         String,
  /// SHA-256 hex digest of the file contents.
  pub content_hash: String,
  pub size_bytes:   u64,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::PortalStore::add_attachment`]. The caller has
/// already written the bytes to `path`.
#[derive(Debug, Clone)]
pub struct NewAttachment {
  pub update_id:    Uuid,
  pub file_name:    String,
  pub media_type:   String,
  pub path:         String,
  pub content_hash: String,
  pub size_bytes:   u64,
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientUpdate {
  pub id:          Uuid,
  pub client_id:   Uuid,
  pub category:    UpdateCategory,
  pub content:     String,
  pub created_at:  DateTime<Utc>,
  #[serde(default)]
  pub attachments: Vec<Attachment>,

  // Client-side engagement.
  pub read_at:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub liked:       bool,
  #[serde(default)]
  pub reactions:   Vec<String>,
}

impl ClientUpdate {
  pub fn is_read(&self) -> bool { self.read_at.is_some() }
}

/// Input to [`crate::store::PortalStore::create_update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUpdate {
  #[serde(default)]
  pub category: UpdateCategory,
  pub content:  String,
}

impl NewUpdate {
  pub fn validated(self) -> Result<Self> {
    if self.content.trim().is_empty() {
      return Err(Error::Invalid {
        field:  "content",
        reason: "must not be blank".into(),
      });
    }
    Ok(self)
  }
}

/// Longest reaction string accepted; enough for any emoji sequence.
pub const MAX_REACTION_LEN: usize = 32;

pub fn validate_reaction(emoji: &str) -> Result<&str> {
  let emoji = emoji.trim();
  if emoji.is_empty() || emoji.len() > MAX_REACTION_LEN {
    return Err(Error::Invalid {
      field:  "emoji",
      reason: format!("must be 1..={MAX_REACTION_LEN} bytes"),
    });
  }
  Ok(emoji)
}
