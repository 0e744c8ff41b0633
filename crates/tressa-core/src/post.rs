//! Blog posts authored by the practitioner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub id:         Uuid,
  pub title:      String,
  pub content:    String,
  pub image_url:  Option<String>,
  pub published:  bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
  pub title:     String,
  pub content:   String,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub published: bool,
}

impl NewPost {
  pub fn validated(self) -> Result<Self> {
    if self.title.trim().is_empty() {
      return Err(Error::Invalid {
        field:  "title",
        reason: "must not be blank".into(),
      });
    }
    Ok(self)
  }
}
