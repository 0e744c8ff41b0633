//! Attachment upload, download, and blob cleanup.
//!
//! Bytes live under the configured attachment directory at
//! `<first two hex digits of sha256>/<random uuid>`; the database only holds
//! metadata. Blobs are deleted when their update or client is.

use std::{io, path::Path as FsPath};

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use tressa_core::{
  store::PortalStore,
  update::{Attachment, NewAttachment},
};

use crate::{
  AppState,
  auth::{Admin, Principal},
  error::ApiError,
};

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

// ─── Blobs ───────────────────────────────────────────────────────────────────

/// A blob written to disk, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
  /// Relative to the attachment directory.
  pub path:         String,
  pub content_hash: String,
}

/// Write `bytes` under `dir` and return where they went.
pub async fn write_blob(dir: &FsPath, bytes: &[u8]) -> io::Result<StoredBlob> {
  let content_hash = hex::encode(Sha256::digest(bytes));
  let shard = &content_hash[..2];
  let path = format!("{shard}/{}", Uuid::new_v4());

  tokio::fs::create_dir_all(dir.join(shard)).await?;
  tokio::fs::write(dir.join(&path), bytes).await?;
  Ok(StoredBlob { path, content_hash })
}

/// Delete the blobs behind `attachments`. Missing files are ignored; other
/// failures are logged and do not fail the request.
pub async fn remove_blobs(dir: &FsPath, attachments: &[Attachment]) {
  for a in attachments {
    match tokio::fs::remove_file(dir.join(&a.path)).await {
      Ok(()) => debug!(attachment_id = %a.id, "blob removed"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => warn!(attachment_id = %a.id, path = %a.path, error = %e, "blob removal failed"),
    }
  }
}

/// Keep the last path component and drop characters that cannot appear in
/// a `Content-Disposition` header.
pub fn sanitize_file_name(name: &str) -> String {
  let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
  let cleaned: String = base
    .chars()
    .filter(|c| !c.is_control() && *c != '"')
    .collect();
  let cleaned = cleaned.trim();
  if cleaned.is_empty() { "attachment".to_owned() } else { cleaned.to_owned() }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UploadParams {
  pub file_name: String,
}

/// `POST /admin/updates/{id}/attachments?file_name=<name>`: raw body,
/// media type from `Content-Type`.
pub async fn upload<S: PortalStore>(
  _: Admin,
  State(state): State<AppState<S>>,
  Path(update_id): Path<Uuid>,
  Query(params): Query<UploadParams>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  if body.is_empty() {
    return Err(ApiError::BadRequest("attachment body is empty".into()));
  }
  if state
    .store
    .get_update(update_id)
    .await
    .map_err(ApiError::store)?
    .is_none()
  {
    return Err(ApiError::NotFound(format!("update {update_id}")));
  }

  let media_type = headers
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .map(|v| v.split(';').next().unwrap_or(v).trim().to_owned())
    .filter(|v| !v.is_empty())
    .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_owned());

  let blob = write_blob(&state.attachment_dir, &body).await?;
  let attachment = state
    .store
    .add_attachment(NewAttachment {
      update_id,
      file_name: sanitize_file_name(&params.file_name),
      media_type,
      path: blob.path,
      content_hash: blob.content_hash,
      size_bytes: body.len() as u64,
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(attachment)))
}

/// `GET /attachments/{id}`: the admin, or the client owning the update.
pub async fn download<S: PortalStore>(
  principal: Principal,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
  let attachment = state
    .store
    .get_attachment(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("attachment {id}")))?;

  if let Principal::Client(client_id) = principal {
    let owner = state
      .store
      .get_update(attachment.update_id)
      .await
      .map_err(ApiError::store)?
      .map(|u| u.client_id);
    if owner != Some(client_id) {
      return Err(ApiError::Forbidden);
    }
  }

  let bytes = match tokio::fs::read(state.attachment_dir.join(&attachment.path)).await {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Err(ApiError::NotFound(format!("attachment {id} content")));
    }
    Err(e) => return Err(e.into()),
  };

  Ok((
    [
      (header::CONTENT_TYPE, attachment.media_type),
      (
        header::CONTENT_DISPOSITION,
        format!("inline; filename=\"{}\"", attachment.file_name),
      ),
    ],
    bytes,
  ))
}
