//! Public `/posts` endpoint.

use axum::{
  Json,
  extract::{Query, State},
};
use tressa_core::{store::PortalStore, views::PostSummary};

use crate::{AppState, DEFAULT_POSTS, LimitParams, error::ApiError};

/// `GET /posts[?limit=<n>]`: published posts, newest first. No auth.
pub async fn list<S: PortalStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<PostSummary>>, ApiError> {
  let posts = state
    .store
    .list_posts(true, Some(params.resolve(DEFAULT_POSTS)))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(posts.into_iter().map(PostSummary::from).collect()))
}
