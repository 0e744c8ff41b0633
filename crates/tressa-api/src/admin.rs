//! Handlers for the practitioner's `/admin` endpoints.
//!
//! Every handler takes the [`Admin`] extractor, so a client's credentials
//! get 403 and missing credentials get 401.

use axum::{
  Form, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use tressa_core::{
  appointment::{Appointment, NewAppointment},
  client::{ClientPatch, ClientWithStatus, Credentials, NewClient},
  post::{NewPost, Post},
  store::PortalStore,
  update::NewUpdate,
  views::{
    ActionOutcome, AdminStats, ClientStatusCounts, CreateClientOutcome, RecentClient,
    UpdatesPage,
  },
};

use crate::{
  AppState, DEFAULT_RECENT_CLIENTS, DEFAULT_UPDATES, LimitParams,
  attachments,
  auth::{self, Admin},
  error::ApiError,
};

fn not_found(what: &str, id: Uuid) -> ApiError { ApiError::NotFound(format!("{what} {id}")) }

// ─── Dashboard ───────────────────────────────────────────────────────────────

/// `GET /admin/stats`
pub async fn stats<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
) -> Result<Json<AdminStats>, ApiError> {
  let stats = state.store.admin_stats().await.map_err(ApiError::store)?;
  Ok(Json(stats))
}

/// `GET /admin/recent-clients[?limit=<n>]`
pub async fn recent_clients<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<RecentClient>>, ApiError> {
  let rows = state
    .store
    .recent_clients(params.resolve(DEFAULT_RECENT_CLIENTS))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}

/// `GET /admin/client-stats`
pub async fn client_stats<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
) -> Result<Json<ClientStatusCounts>, ApiError> {
  let clients = state.store.list_clients().await.map_err(ApiError::store)?;
  Ok(Json(ClientStatusCounts::tally(&clients, Utc::now())))
}

// ─── Clients ─────────────────────────────────────────────────────────────────

/// `GET /admin/clients`
pub async fn list_clients<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<ClientWithStatus>>, ApiError> {
  let now = Utc::now();
  let clients = state.store.list_clients().await.map_err(ApiError::store)?;
  Ok(Json(
    clients
      .into_iter()
      .map(|c| ClientWithStatus::at(c, now))
      .collect(),
  ))
}

/// `POST /admin/clients` (form: `name`, `email`, `phone?`)
///
/// Generates a password, stores only its hash, and returns the plain
/// credentials exactly once.
pub async fn create_client<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Form(input): Form<NewClient>,
) -> Result<impl IntoResponse, ApiError> {
  let input = input.normalized()?;
  let password = auth::generate_password();
  let hash = auth::hash_password(&password).map_err(|e| ApiError::Internal(e.to_string()))?;

  let client = state
    .store
    .create_client(input, hash)
    .await
    .map_err(ApiError::store)?;
  info!(client_id = %client.id, email = %client.email, "client provisioned");

  Ok((
    StatusCode::CREATED,
    Json(CreateClientOutcome::Created {
      success:     true,
      credentials: Credentials {
        email: client.email,
        password,
      },
    }),
  ))
}

/// `GET /admin/clients/{id}`
pub async fn get_client<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ClientWithStatus>, ApiError> {
  let client = state
    .store
    .get_client(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found("client", id))?;
  Ok(Json(ClientWithStatus::at(client, Utc::now())))
}

/// `PATCH /admin/clients/{id}`
pub async fn update_client<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(patch): Json<ClientPatch>,
) -> Result<Json<ClientWithStatus>, ApiError> {
  let client = state
    .store
    .update_client(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found("client", id))?;
  Ok(Json(ClientWithStatus::at(client, Utc::now())))
}

/// `DELETE /admin/clients/{id}`
///
/// Removes the client with its updates, appointments, and attachment files.
pub async fn delete_client<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ActionOutcome>, ApiError> {
  let removed = state
    .store
    .delete_client(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found("client", id))?;
  attachments::remove_blobs(&state.attachment_dir, &removed).await;
  info!(client_id = %id, attachments = removed.len(), "client deleted");
  Ok(Json(ActionOutcome::ok()))
}

// ─── Updates ─────────────────────────────────────────────────────────────────

/// `GET /admin/clients/{id}/updates[?limit=<n>]`
pub async fn list_updates<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<LimitParams>,
) -> Result<Json<UpdatesPage>, ApiError> {
  if state.store.get_client(id).await.map_err(ApiError::store)?.is_none() {
    return Err(not_found("client", id));
  }
  let page = state
    .store
    .list_updates(id, params.resolve(DEFAULT_UPDATES))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `POST /admin/clients/{id}/updates` with body `{"category":"routine","content":"…"}`
pub async fn create_update<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(input): Json<NewUpdate>,
) -> Result<impl IntoResponse, ApiError> {
  let update = state
    .store
    .create_update(id, input.validated()?)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(update)))
}

/// `DELETE /admin/updates/{id}`
pub async fn delete_update<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ActionOutcome>, ApiError> {
  let removed = state
    .store
    .delete_update(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found("update", id))?;
  attachments::remove_blobs(&state.attachment_dir, &removed).await;
  Ok(Json(ActionOutcome::ok()))
}

// ─── Appointments ────────────────────────────────────────────────────────────

/// `GET /admin/clients/{id}/appointments`
pub async fn list_appointments<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
  let list = state
    .store
    .list_appointments(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(list))
}

/// `POST /admin/clients/{id}/appointments`
pub async fn create_appointment<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(input): Json<NewAppointment>,
) -> Result<impl IntoResponse, ApiError> {
  let appointment = state
    .store
    .create_appointment(id, input.validated()?)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(appointment)))
}

/// `POST /admin/appointments/{id}/complete`
pub async fn complete_appointment<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
  let appointment = state
    .store
    .complete_appointment(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found("appointment", id))?;
  Ok(Json(appointment))
}

// ─── Posts ───────────────────────────────────────────────────────────────────

/// `GET /admin/posts`: drafts included.
pub async fn list_posts<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Post>>, ApiError> {
  let posts = state
    .store
    .list_posts(false, None)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(posts))
}

/// `POST /admin/posts`
pub async fn create_post<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Json(input): Json<NewPost>,
) -> Result<impl IntoResponse, ApiError> {
  let post = state
    .store
    .create_post(input.validated()?)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(post)))
}

/// `DELETE /admin/posts/{id}`
pub async fn delete_post<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ActionOutcome>, ApiError> {
  if !state.store.delete_post(id).await.map_err(ApiError::store)? {
    return Err(not_found("post", id));
  }
  Ok(Json(ActionOutcome::ok()))
}

#[derive(Debug, Deserialize)]
pub struct PublishBody {
  pub published: bool,
}

/// `POST /admin/posts/{id}/publish` with body `{"published":true}`
pub async fn publish_post<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<PublishBody>,
) -> Result<Json<Post>, ApiError> {
  let post = state
    .store
    .set_post_published(id, body.published)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found("post", id))?;
  Ok(Json(post))
}
