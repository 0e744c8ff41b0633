//! The `PortalStore` trait.
//!
//! Implemented by storage backends (e.g. `tressa-store-sqlite`). The API
//! layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Classify,
  appointment::{Appointment, NewAppointment},
  client::{Client, ClientPatch, NewClient},
  post::{NewPost, Post},
  update::{Attachment, ClientUpdate, NewAttachment, NewUpdate},
  views::{AdminStats, RecentClient, UpdatesPage},
};

/// Abstraction over a Tressa storage backend.
///
/// Lookups by id return `Ok(None)` when the row does not exist; errors are
/// reserved for storage failures and constraint violations, and say which
/// they are through [`Classify`].
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait PortalStore: Send + Sync {
  type Error: Classify;

  // ── Clients ───────────────────────────────────────────────────────────

  /// Persist a new client with the given argon2 password hash.
  ///
  /// Fails if another client already uses the same email.
  fn create_client(
    &self,
    input: NewClient,
    password_hash: String,
  ) -> impl Future<Output = Result<Client, Self::Error>> + Send + '_;

  fn get_client(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// Look up a client's id and password hash by (lower-cased) email.
  fn client_login(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<(Uuid, String)>, Self::Error>> + Send + '_;

  /// All clients, newest first.
  fn list_clients(
    &self,
  ) -> impl Future<Output = Result<Vec<Client>, Self::Error>> + Send + '_;

  fn update_client(
    &self,
    id: Uuid,
    patch: ClientPatch,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// Delete a client and everything it owns. Returns the removed
  /// attachments so the caller can delete their blobs, or `None` if the
  /// client did not exist.
  fn delete_client(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Vec<Attachment>>, Self::Error>> + Send + '_;

  /// The `limit` newest clients with the time of their latest update.
  fn recent_clients(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RecentClient>, Self::Error>> + Send + '_;

  fn admin_stats(
    &self,
  ) -> impl Future<Output = Result<AdminStats, Self::Error>> + Send + '_;

  // ── Updates ───────────────────────────────────────────────────────────

  fn create_update(
    &self,
    client_id: Uuid,
    input: NewUpdate,
  ) -> impl Future<Output = Result<ClientUpdate, Self::Error>> + Send + '_;

  fn get_update(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ClientUpdate>, Self::Error>> + Send + '_;

  /// Newest `limit` updates for a client plus the client's total count.
  fn list_updates(
    &self,
    client_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<UpdatesPage, Self::Error>> + Send + '_;

  fn delete_update(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Vec<Attachment>>, Self::Error>> + Send + '_;

  /// Set `read_at` to now unless it is already set.
  fn mark_update_read(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ClientUpdate>, Self::Error>> + Send + '_;

  fn set_update_liked(
    &self,
    id: Uuid,
    liked: bool,
  ) -> impl Future<Output = Result<Option<ClientUpdate>, Self::Error>> + Send + '_;

  fn add_reaction(
    &self,
    id: Uuid,
    emoji: String,
  ) -> impl Future<Output = Result<Option<ClientUpdate>, Self::Error>> + Send + '_;

  // ── Attachments ───────────────────────────────────────────────────────

  fn add_attachment(
    &self,
    input: NewAttachment,
  ) -> impl Future<Output = Result<Attachment, Self::Error>> + Send + '_;

  fn get_attachment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Attachment>, Self::Error>> + Send + '_;

  // ── Appointments ──────────────────────────────────────────────────────

  /// Schedule an appointment and refresh the client's summary dates.
  fn create_appointment(
    &self,
    client_id: Uuid,
    input: NewAppointment,
  ) -> impl Future<Output = Result<Appointment, Self::Error>> + Send + '_;

  /// A client's appointments ordered by `scheduled_at`.
  fn list_appointments(
    &self,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Appointment>, Self::Error>> + Send + '_;

  /// Mark an appointment completed and refresh the client's summary dates.
  fn complete_appointment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Appointment>, Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  fn create_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Posts newest first, optionally restricted to published ones.
  fn list_posts(
    &self,
    published_only: bool,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  fn set_post_published(
    &self,
    id: Uuid,
    published: bool,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// Returns `false` if the post did not exist.
  fn delete_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
