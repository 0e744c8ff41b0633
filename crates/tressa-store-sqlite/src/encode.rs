//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order matches chronological order. UUIDs are stored as
//! hyphenated lowercase strings; reaction lists as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use tressa_core::{
  appointment::Appointment,
  client::{AppointmentSummary, Client},
  post::Post,
  update::{Attachment, AttachmentKind, ClientUpdate, UpdateCategory},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Reactions ────────────────────────────────────────────────────────────────

pub fn encode_reactions(reactions: &[String]) -> Result<String> {
  Ok(serde_json::to_string(reactions)?)
}

pub fn decode_reactions(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Column lists ─────────────────────────────────────────────────────────────

pub const CLIENT_COLUMNS: &str = "id, name, email, phone, avatar_url, notes, created_at, \
   first_visit_date, last_appointment_date, next_appointment_date";

pub const UPDATE_COLUMNS: &str =
  "id, client_id, category, content, created_at, read_at, liked, reactions";

pub const ATTACHMENT_COLUMNS: &str =
  "id, update_id, file_name, media_type, path, content_hash, size_bytes, created_at";

pub const APPOINTMENT_COLUMNS: &str = "id, client_id, scheduled_at, kind, completed, notes";

pub const POST_COLUMNS: &str = "id, title, content, image_url, published, created_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `clients` row (see [`CLIENT_COLUMNS`]).
pub struct RawClient {
  pub id:                    String,
  pub name:                  String,
  pub email:                 String,
  pub phone:                 Option<String>,
  pub avatar_url:            Option<String>,
  pub notes:                 Option<String>,
  pub created_at:            String,
  pub first_visit_date:      Option<String>,
  pub last_appointment_date: Option<String>,
  pub next_appointment_date: Option<String>,
}

impl RawClient {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                    row.get(0)?,
      name:                  row.get(1)?,
      email:                 row.get(2)?,
      phone:                 row.get(3)?,
      avatar_url:            row.get(4)?,
      notes:                 row.get(5)?,
      created_at:            row.get(6)?,
      first_visit_date:      row.get(7)?,
      last_appointment_date: row.get(8)?,
      next_appointment_date: row.get(9)?,
    })
  }

  pub fn into_client(self) -> Result<Client> {
    Ok(Client {
      id:         decode_uuid(&self.id)?,
      name:       self.name,
      email:      self.email,
      phone:      self.phone,
      avatar_url: self.avatar_url,
      notes:      self.notes,
      created_at: decode_dt(&self.created_at)?,
      summary:    AppointmentSummary {
        first_visit_date:      decode_opt_dt(self.first_visit_date)?,
        last_appointment_date: decode_opt_dt(self.last_appointment_date)?,
        next_appointment_date: decode_opt_dt(self.next_appointment_date)?,
      },
    })
  }
}

/// Raw values from an `updates` row plus its attachment rows.
pub struct RawUpdate {
  pub id:          String,
  pub client_id:   String,
  pub category:    String,
  pub content:     String,
  pub created_at:  String,
  pub read_at:     Option<String>,
  pub liked:       bool,
  pub reactions:   String,
  pub attachments: Vec<RawAttachment>,
}

impl RawUpdate {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      client_id:   row.get(1)?,
      category:    row.get(2)?,
      content:     row.get(3)?,
      created_at:  row.get(4)?,
      read_at:     row.get(5)?,
      liked:       row.get(6)?,
      reactions:   row.get(7)?,
      attachments: Vec::new(),
    })
  }

  pub fn into_update(self) -> Result<ClientUpdate> {
    Ok(ClientUpdate {
      id:          decode_uuid(&self.id)?,
      client_id:   decode_uuid(&self.client_id)?,
      category:    UpdateCategory::parse(&self.category)?,
      content:     self.content,
      created_at:  decode_dt(&self.created_at)?,
      attachments: self
        .attachments
        .into_iter()
        .map(RawAttachment::into_attachment)
        .collect::<Result<_>>()?,
      read_at:     decode_opt_dt(self.read_at)?,
      liked:       self.liked,
      reactions:   decode_reactions(&self.reactions)?,
    })
  }
}

pub struct RawAttachment {
  pub id:           String,
  pub update_id:    String,
  pub file_name:    String,
  pub media_type:   String,
  pub path:         String,
  pub content_hash: String,
  pub size_bytes:   i64,
  pub created_at:   String,
}

impl RawAttachment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      update_id:    row.get(1)?,
      file_name:    row.get(2)?,
      media_type:   row.get(3)?,
      path:         row.get(4)?,
      content_hash: row.get(5)?,
      size_bytes:   row.get(6)?,
      created_at:   row.get(7)?,
    })
  }

  pub fn into_attachment(self) -> Result<Attachment> {
    Ok(Attachment {
      id:           decode_uuid(&self.id)?,
      update_id:    decode_uuid(&self.update_id)?,
      kind:         AttachmentKind::from_media_type(&self.media_type),
      file_name:    self.file_name,
      media_type:   self.media_type,
      path:         self.path,
      content_hash: self.content_hash,
      size_bytes:   u64::try_from(self.size_bytes).unwrap_or_default(),
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAppointment {
  pub id:           String,
  pub client_id:    String,
  pub scheduled_at: String,
  pub kind:         String,
  pub completed:    bool,
  pub notes:        Option<String>,
}

impl RawAppointment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      client_id:    row.get(1)?,
      scheduled_at: row.get(2)?,
      kind:         row.get(3)?,
      completed:    row.get(4)?,
      notes:        row.get(5)?,
    })
  }

  pub fn into_appointment(self) -> Result<Appointment> {
    Ok(Appointment {
      id:           decode_uuid(&self.id)?,
      client_id:    decode_uuid(&self.client_id)?,
      scheduled_at: decode_dt(&self.scheduled_at)?,
      kind:         self.kind,
      completed:    self.completed,
      notes:        self.notes,
    })
  }
}

pub struct RawPost {
  pub id:         String,
  pub title:      String,
  pub content:    String,
  pub image_url:  Option<String>,
  pub published:  bool,
  pub created_at: String,
}

impl RawPost {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      title:      row.get(1)?,
      content:    row.get(2)?,
      image_url:  row.get(3)?,
      published:  row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      id:         decode_uuid(&self.id)?,
      title:      self.title,
      content:    self.content,
      image_url:  self.image_url,
      published:  self.published,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
