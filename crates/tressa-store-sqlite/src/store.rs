//! [`SqliteStore`]: the SQLite implementation of [`PortalStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::debug;
use uuid::Uuid;

use tressa_core::{
  appointment::{Appointment, NewAppointment, summarize},
  client::{AppointmentSummary, Client, ClientPatch, NewClient},
  post::{NewPost, Post},
  store::PortalStore,
  update::{Attachment, AttachmentKind, ClientUpdate, NewAttachment, NewUpdate, validate_reaction},
  views::{AdminStats, RecentClient, UpdatesPage},
};

use crate::{
  Error, Result,
  encode::{
    APPOINTMENT_COLUMNS, ATTACHMENT_COLUMNS, CLIENT_COLUMNS, POST_COLUMNS, RawAppointment,
    RawAttachment, RawClient, RawPost, RawUpdate, UPDATE_COLUMNS, decode_dt, decode_reactions,
    decode_uuid, encode_dt, encode_reactions, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tressa store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Connection-thread helpers ───────────────────────────────────────────────
//
// These run inside `Connection::call` closures, so they speak
// `tokio_rusqlite::Result` and wrap domain errors in `Other`.

fn other(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

/// The current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

fn exists(conn: &Connection, table: &str, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?1"), params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn query_attachments(conn: &Connection, update_id: &str) -> rusqlite::Result<Vec<RawAttachment>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ATTACHMENT_COLUMNS} FROM attachments
     WHERE update_id = ?1 ORDER BY created_at, rowid"
  ))?;
  let rows = stmt.query_map(params![update_id], RawAttachment::from_row)?.collect();
  rows
}

/// Attachments owned by every update of `client_id`.
fn query_client_attachments(
  conn: &Connection,
  client_id: &str,
) -> rusqlite::Result<Vec<RawAttachment>> {
  let mut stmt = conn.prepare(
    "SELECT a.id, a.update_id, a.file_name, a.media_type, a.path,
            a.content_hash, a.size_bytes, a.created_at
     FROM attachments a
     JOIN updates u ON u.id = a.update_id
     WHERE u.client_id = ?1",
  )?;
  let rows = stmt.query_map(params![client_id], RawAttachment::from_row)?.collect();
  rows
}

fn query_update(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawUpdate>> {
  let raw = conn
    .query_row(
      &format!("SELECT {UPDATE_COLUMNS} FROM updates WHERE id = ?1"),
      params![id],
      RawUpdate::from_row,
    )
    .optional()?;
  match raw {
    Some(mut update) => {
      update.attachments = query_attachments(conn, id)?;
      Ok(Some(update))
    }
    None => Ok(None),
  }
}

/// Recompute the summary dates on `client_id` from its appointments.
fn refresh_summary(
  conn: &Connection,
  client_id: &str,
  now: DateTime<Utc>,
) -> tokio_rusqlite::Result<AppointmentSummary> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE client_id = ?1"
  ))?;
  let appointments = stmt
    .query_map(params![client_id], RawAppointment::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawAppointment::into_appointment)
    .collect::<Result<Vec<_>>>()
    .map_err(other)?;

  let summary = summarize(&appointments, now);
  conn.execute(
    "UPDATE clients
     SET first_visit_date = ?2, last_appointment_date = ?3, next_appointment_date = ?4
     WHERE id = ?1",
    params![
      client_id,
      summary.first_visit_date.map(encode_dt),
      summary.last_appointment_date.map(encode_dt),
      summary.next_appointment_date.map(encode_dt),
    ],
  )?;
  Ok(summary)
}

fn decode_attachments(raws: Vec<RawAttachment>) -> Result<Vec<Attachment>> {
  raws.into_iter().map(RawAttachment::into_attachment).collect()
}

// ─── PortalStore impl ────────────────────────────────────────────────────────

impl PortalStore for SqliteStore {
  type Error = Error;

  // ── Clients ───────────────────────────────────────────────────────────────

  async fn create_client(&self, input: NewClient, password_hash: String) -> Result<Client> {
    let input = input.normalized()?;
    let client = Client {
      id:         Uuid::new_v4(),
      name:       input.name,
      email:      input.email,
      phone:      input.phone,
      avatar_url: None,
      notes:      None,
      created_at: now(),
      summary:    AppointmentSummary::default(),
    };

    let id_str = encode_uuid(client.id);
    let at_str = encode_dt(client.created_at);
    let name   = client.name.clone();
    let email  = client.email.clone();
    let phone  = client.phone.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO clients (id, name, email, phone, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![id_str, name, email, phone, password_hash, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::from);

    match inserted {
      Ok(()) => {
        debug!(client_id = %client.id, "client row inserted");
        Ok(client)
      }
      Err(e) if e.is_unique_violation() => Err(Error::DuplicateEmail(client.email)),
      Err(e) => Err(e),
    }
  }

  async fn get_client(&self, id: Uuid) -> Result<Option<Client>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawClient> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
              params![id_str],
              RawClient::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawClient::into_client).transpose()
  }

  async fn client_login(&self, email: String) -> Result<Option<(Uuid, String)>> {
    let email = email.trim().to_lowercase();

    let row: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, password_hash FROM clients WHERE email = ?1",
              params![email],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|(id, hash)| Ok((decode_uuid(&id)?, hash)))
      .transpose()
  }

  async fn list_clients(&self) -> Result<Vec<Client>> {
    let raws: Vec<RawClient> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map([], RawClient::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClient::into_client).collect()
  }

  async fn update_client(&self, id: Uuid, patch: ClientPatch) -> Result<Option<Client>> {
    let name = match patch.name {
      Some(n) if n.trim().is_empty() => {
        return Err(Error::Core(tressa_core::Error::Invalid {
          field:  "name",
          reason: "must not be blank".into(),
        }));
      }
      name => name.map(|n| n.trim().to_owned()),
    };
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE clients SET
             name       = COALESCE(?2, name),
             phone      = COALESCE(?3, phone),
             avatar_url = COALESCE(?4, avatar_url),
             notes      = COALESCE(?5, notes)
           WHERE id = ?1",
          params![id_str, name, patch.phone, patch.avatar_url, patch.notes],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_client(id).await
  }

  async fn delete_client(&self, id: Uuid) -> Result<Option<Vec<Attachment>>> {
    let id_str = encode_uuid(id);

    let removed: Option<Vec<RawAttachment>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !exists(&tx, "clients", &id_str)? {
          return Ok(None);
        }
        let attachments = query_client_attachments(&tx, &id_str)?;
        // updates, attachments and appointments go with it via ON DELETE CASCADE.
        tx.execute("DELETE FROM clients WHERE id = ?1", params![id_str])?;
        tx.commit()?;
        Ok(Some(attachments))
      })
      .await?;

    removed.map(decode_attachments).transpose()
  }

  async fn recent_clients(&self, limit: usize) -> Result<Vec<RecentClient>> {
    let limit_val = limit as i64;

    type Row = (String, String, Option<String>, Option<String>);
    let rows: Vec<Row> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.id, c.name, c.avatar_url,
                  (SELECT MAX(u.created_at) FROM updates u WHERE u.client_id = c.id)
           FROM clients c
           ORDER BY c.created_at DESC, c.rowid DESC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(params![limit_val], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, name, avatar_url, last_update)| {
        Ok(RecentClient {
          id: decode_uuid(&id)?,
          name,
          avatar_url,
          last_update: last_update.as_deref().map(decode_dt).transpose()?,
        })
      })
      .collect()
  }

  async fn admin_stats(&self) -> Result<AdminStats> {
    let (clients, posts, updates): (i64, i64, i64) = self
      .conn
      .call(|conn| {
        let count = |table: &str| -> rusqlite::Result<i64> {
          conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        };
        Ok((count("clients")?, count("posts")?, count("updates")?))
      })
      .await?;

    Ok(AdminStats {
      clients_count: clients as u64,
      posts_count:   posts as u64,
      updates_count: updates as u64,
    })
  }

  // ── Updates ───────────────────────────────────────────────────────────────

  async fn create_update(&self, client_id: Uuid, input: NewUpdate) -> Result<ClientUpdate> {
    let input = input.validated()?;
    let update = ClientUpdate {
      id:          Uuid::new_v4(),
      client_id,
      category:    input.category,
      content:     input.content,
      created_at:  now(),
      attachments: Vec::new(),
      read_at:     None,
      liked:       false,
      reactions:   Vec::new(),
    };

    let id_str     = encode_uuid(update.id);
    let client_str = encode_uuid(client_id);
    let category   = update.category.to_string();
    let content    = update.content.clone();
    let at_str     = encode_dt(update.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        if !exists(conn, "clients", &client_str)? {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO updates (id, client_id, category, content, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, client_str, category, content, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::ClientNotFound(client_id));
    }
    Ok(update)
  }

  async fn get_update(&self, id: Uuid) -> Result<Option<ClientUpdate>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(query_update(conn, &id_str)?))
      .await?;
    raw.map(RawUpdate::into_update).transpose()
  }

  async fn list_updates(&self, client_id: Uuid, limit: usize) -> Result<UpdatesPage> {
    let client_str = encode_uuid(client_id);
    let limit_val  = limit as i64;

    let (raws, count): (Vec<RawUpdate>, i64) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {UPDATE_COLUMNS} FROM updates
           WHERE client_id = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"
        ))?;
        let mut rows = stmt
          .query_map(params![client_str, limit_val], RawUpdate::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        for row in &mut rows {
          row.attachments = query_attachments(conn, &row.id)?;
        }
        let count: i64 = conn.query_row(
          "SELECT COUNT(*) FROM updates WHERE client_id = ?1",
          params![client_str],
          |r| r.get(0),
        )?;
        Ok((rows, count))
      })
      .await?;

    Ok(UpdatesPage {
      updates: raws.into_iter().map(RawUpdate::into_update).collect::<Result<_>>()?,
      count:   count as u64,
    })
  }

  async fn delete_update(&self, id: Uuid) -> Result<Option<Vec<Attachment>>> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !exists(&tx, "updates", &id_str)? {
          return Ok(None);
        }
        let attachments = query_attachments(&tx, &id_str)?;
        tx.execute("DELETE FROM updates WHERE id = ?1", params![id_str])?;
        tx.commit()?;
        Ok(Some(attachments))
      })
      .await?;

    removed.map(decode_attachments).transpose()
  }

  async fn mark_update_read(&self, id: Uuid) -> Result<Option<ClientUpdate>> {
    let id_str = encode_uuid(id);
    let now    = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE updates SET read_at = COALESCE(read_at, ?2) WHERE id = ?1",
          params![id_str, now],
        )?;
        Ok(query_update(conn, &id_str)?)
      })
      .await?;
    raw.map(RawUpdate::into_update).transpose()
  }

  async fn set_update_liked(&self, id: Uuid, liked: bool) -> Result<Option<ClientUpdate>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute("UPDATE updates SET liked = ?2 WHERE id = ?1", params![id_str, liked])?;
        Ok(query_update(conn, &id_str)?)
      })
      .await?;
    raw.map(RawUpdate::into_update).transpose()
  }

  async fn add_reaction(&self, id: Uuid, emoji: String) -> Result<Option<ClientUpdate>> {
    let emoji  = validate_reaction(&emoji)?.to_owned();
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<String> = tx
          .query_row("SELECT reactions FROM updates WHERE id = ?1", params![id_str], |r| r.get(0))
          .optional()?;
        let Some(current) = current else {
          return Ok(None);
        };
        let mut reactions = decode_reactions(&current).map_err(other)?;
        if !reactions.contains(&emoji) {
          reactions.push(emoji);
          let encoded = encode_reactions(&reactions).map_err(other)?;
          tx.execute(
            "UPDATE updates SET reactions = ?2 WHERE id = ?1",
            params![id_str, encoded],
          )?;
        }
        let update = query_update(&tx, &id_str)?;
        tx.commit()?;
        Ok(update)
      })
      .await?;
    raw.map(RawUpdate::into_update).transpose()
  }

  // ── Attachments ───────────────────────────────────────────────────────────

  async fn add_attachment(&self, input: NewAttachment) -> Result<Attachment> {
    let attachment = Attachment {
      id:           Uuid::new_v4(),
      update_id:    input.update_id,
      kind:         AttachmentKind::from_media_type(&input.media_type),
      file_name:    input.file_name,
      media_type:   input.media_type,
      path:         input.path,
      content_hash: input.content_hash,
      size_bytes:   input.size_bytes,
      created_at:   now(),
    };

    let id_str     = encode_uuid(attachment.id);
    let update_str = encode_uuid(attachment.update_id);
    let file_name  = attachment.file_name.clone();
    let media_type = attachment.media_type.clone();
    let path       = attachment.path.clone();
    let hash       = attachment.content_hash.clone();
    let size       = attachment.size_bytes as i64;
    let at_str     = encode_dt(attachment.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        if !exists(conn, "updates", &update_str)? {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO attachments
             (id, update_id, file_name, media_type, path, content_hash, size_bytes, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![id_str, update_str, file_name, media_type, path, hash, size, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::UpdateNotFound(attachment.update_id));
    }
    Ok(attachment)
  }

  async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1"),
              params![id_str],
              RawAttachment::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawAttachment::into_attachment).transpose()
  }

  // ── Appointments ──────────────────────────────────────────────────────────

  async fn create_appointment(
    &self,
    client_id: Uuid,
    input: NewAppointment,
  ) -> Result<Appointment> {
    let input = input.validated()?;
    let appointment = Appointment {
      id:           Uuid::new_v4(),
      client_id,
      scheduled_at: input.scheduled_at,
      kind:         input.kind.trim().to_owned(),
      completed:    false,
      notes:        input.notes,
    };

    let id_str     = encode_uuid(appointment.id);
    let client_str = encode_uuid(client_id);
    let at_str     = encode_dt(appointment.scheduled_at);
    let kind       = appointment.kind.clone();
    let notes      = appointment.notes.clone();
    let now        = now();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !exists(&tx, "clients", &client_str)? {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO appointments (id, client_id, scheduled_at, kind, completed, notes)
           VALUES (?1, ?2, ?3, ?4, 0, ?5)",
          params![id_str, client_str, at_str, kind, notes],
        )?;
        refresh_summary(&tx, &client_str, now)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::ClientNotFound(client_id));
    }
    Ok(appointment)
  }

  async fn list_appointments(&self, client_id: Uuid) -> Result<Vec<Appointment>> {
    let client_str = encode_uuid(client_id);

    let raws: Vec<RawAppointment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {APPOINTMENT_COLUMNS} FROM appointments
           WHERE client_id = ?1 ORDER BY scheduled_at, rowid"
        ))?;
        let rows = stmt
          .query_map(params![client_str], RawAppointment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAppointment::into_appointment).collect()
  }

  async fn complete_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
    let id_str = encode_uuid(id);
    let now    = now();

    let raw: Option<RawAppointment> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE appointments SET completed = 1 WHERE id = ?1",
          params![id_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let raw = tx.query_row(
          &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
          params![id_str],
          RawAppointment::from_row,
        )?;
        refresh_summary(&tx, &raw.client_id, now)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawAppointment::into_appointment).transpose()
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn create_post(&self, input: NewPost) -> Result<Post> {
    let input = input.validated()?;
    let post = Post {
      id:         Uuid::new_v4(),
      title:      input.title.trim().to_owned(),
      content:    input.content,
      image_url:  input.image_url,
      published:  input.published,
      created_at: now(),
    };

    let id_str    = encode_uuid(post.id);
    let title     = post.title.clone();
    let content   = post.content.clone();
    let image_url = post.image_url.clone();
    let published = post.published;
    let at_str    = encode_dt(post.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (id, title, content, image_url, published, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![id_str, title, content, image_url, published, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(post)
  }

  async fn list_posts(&self, published_only: bool, limit: Option<usize>) -> Result<Vec<Post>> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val = limit.map_or(-1, |l| l as i64);

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {POST_COLUMNS} FROM posts
           WHERE (?1 = 0 OR published = 1)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(params![published_only, limit_val], RawPost::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn set_post_published(&self, id: Uuid, published: bool) -> Result<Option<Post>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        conn.execute("UPDATE posts SET published = ?2 WHERE id = ?1", params![id_str, published])?;
        Ok(
          conn
            .query_row(
              &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
              params![id_str],
              RawPost::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn delete_post(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM posts WHERE id = ?1", params![id_str])?))
      .await?;
    Ok(changed > 0)
  }
}
