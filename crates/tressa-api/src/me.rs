//! Handlers for the signed-in client's `/me` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/me/profile` | `{ id, name, avatar_url }` |
//! | `GET`  | `/me/updates` | Optional `?limit=<n>`, default 5 |
//! | `POST` | `/me/updates/:id/read` | Idempotent |
//! | `POST` | `/me/updates/:id/like` | Body: `{"liked":true}` |
//! | `POST` | `/me/updates/:id/reactions` | Body: `{"emoji":"…"}` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use tressa_core::{
  store::PortalStore,
  update::{ClientUpdate, validate_reaction},
  views::{ProfileSummary, UpdatesPage},
};

use crate::{
  AppState, DEFAULT_UPDATES, LimitParams,
  auth::ClientSession,
  error::ApiError,
};

/// Fail unless update `id` exists and belongs to `client_id`.
async fn ensure_owned<S: PortalStore>(
  store: &S,
  client_id: Uuid,
  id: Uuid,
) -> Result<(), ApiError> {
  match store.get_update(id).await.map_err(ApiError::store)? {
    Some(u) if u.client_id == client_id => Ok(()),
    Some(_) => Err(ApiError::Forbidden),
    None => Err(ApiError::NotFound(format!("update {id}"))),
  }
}

fn gone(id: Uuid) -> ApiError { ApiError::NotFound(format!("update {id}")) }

/// `GET /me/profile`
pub async fn profile<S: PortalStore>(
  ClientSession(client_id): ClientSession,
  State(state): State<AppState<S>>,
) -> Result<Json<ProfileSummary>, ApiError> {
  let client = state
    .store
    .get_client(client_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("client {client_id}")))?;
  Ok(Json(ProfileSummary::from(&client)))
}

/// `GET /me/updates[?limit=<n>]`
pub async fn updates<S: PortalStore>(
  ClientSession(client_id): ClientSession,
  State(state): State<AppState<S>>,
  Query(params): Query<LimitParams>,
) -> Result<Json<UpdatesPage>, ApiError> {
  let page = state
    .store
    .list_updates(client_id, params.resolve(DEFAULT_UPDATES))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `POST /me/updates/{id}/read`
pub async fn mark_read<S: PortalStore>(
  ClientSession(client_id): ClientSession,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ClientUpdate>, ApiError> {
  ensure_owned(state.store.as_ref(), client_id, id).await?;
  let update = state
    .store
    .mark_update_read(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| gone(id))?;
  Ok(Json(update))
}

#[derive(Debug, Deserialize)]
pub struct LikeBody {
  pub liked: bool,
}

/// `POST /me/updates/{id}/like`
pub async fn set_liked<S: PortalStore>(
  ClientSession(client_id): ClientSession,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<LikeBody>,
) -> Result<Json<ClientUpdate>, ApiError> {
  ensure_owned(state.store.as_ref(), client_id, id).await?;
  let update = state
    .store
    .set_update_liked(id, body.liked)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| gone(id))?;
  Ok(Json(update))
}

#[derive(Debug, Deserialize)]
pub struct ReactionBody {
  pub emoji: String,
}

/// `POST /me/updates/{id}/reactions`
pub async fn add_reaction<S: PortalStore>(
  ClientSession(client_id): ClientSession,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ReactionBody>,
) -> Result<Json<ClientUpdate>, ApiError> {
  let emoji = validate_reaction(&body.emoji)?.to_owned();
  ensure_owned(state.store.as_ref(), client_id, id).await?;
  let update = state
    .store
    .add_reaction(id, emoji)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| gone(id))?;
  Ok(Json(update))
}
