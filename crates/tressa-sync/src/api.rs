//! The server endpoints the hooks fetch from, and an HTTP implementation.

use std::{future::Future, time::Duration};

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use tressa_core::{
  client::{Credentials, NewClient},
  update::ClientUpdate,
  views::{
    ActionOutcome, AdminStats, ClientStatusCounts, CreateClientOutcome, PostSummary,
    ProfileSummary, RecentClient, UpdatesPage,
  },
};

use crate::error::{Result, SyncError};

/// One method per portal endpoint the sync layer reads or writes.
///
/// Implementations must answer with fully parsed values; anything the
/// server sends that does not fit the schema is an error here, not later.
pub trait PortalApi: Send + Sync + 'static {
  // ── Admin ─────────────────────────────────────────────────────────────────

  fn admin_stats(&self) -> impl Future<Output = Result<AdminStats>> + Send;

  fn recent_clients(&self, limit: usize) -> impl Future<Output = Result<Vec<RecentClient>>> + Send;

  fn client_stats(&self) -> impl Future<Output = Result<ClientStatusCounts>> + Send;

  fn client_updates(
    &self,
    client_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<UpdatesPage>> + Send;

  /// Provision a client account. A refusal (e.g. duplicate email) is
  /// [`SyncError::Rejected`].
  fn create_client(&self, input: NewClient) -> impl Future<Output = Result<Credentials>> + Send;

  fn delete_client(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send;

  // ── Client session ────────────────────────────────────────────────────────

  fn profile(&self) -> impl Future<Output = Result<ProfileSummary>> + Send;

  fn my_updates(&self, limit: usize) -> impl Future<Output = Result<UpdatesPage>> + Send;

  fn mark_read(&self, update_id: Uuid) -> impl Future<Output = Result<ClientUpdate>> + Send;

  fn set_liked(
    &self,
    update_id: Uuid,
    liked: bool,
  ) -> impl Future<Output = Result<ClientUpdate>> + Send;

  fn add_reaction(
    &self,
    update_id: Uuid,
    emoji: String,
  ) -> impl Future<Output = Result<ClientUpdate>> + Send;

  // ── Public ────────────────────────────────────────────────────────────────

  fn posts(&self, limit: usize) -> impl Future<Output = Result<Vec<PostSummary>>> + Send;
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

/// Connection settings for the portal API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// [`PortalApi`] over the portal's JSON HTTP API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpPortalApi {
  client: Client,
  config: ApiConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

#[derive(Serialize)]
struct LikedBody {
  liked: bool,
}

#[derive(Serialize)]
struct ReactionBody {
  emoji: String,
}

impl HttpPortalApi {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// Send `req` and parse a 2xx body as `T`.
  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
    let resp = self.auth(req).send().await?;
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
      return Err(match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(ErrorBody { error }) => SyncError::Rejected(error),
        Err(_) => SyncError::Status(status),
      });
    }
    Ok(serde_json::from_slice(&body)?)
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, limit: Option<usize>) -> Result<T> {
    let mut req = self.client.get(self.url(path));
    if let Some(limit) = limit {
      req = req.query(&[("limit", limit)]);
    }
    self.send(req).await
  }
}

impl PortalApi for HttpPortalApi {
  /// `GET /api/admin/stats`
  async fn admin_stats(&self) -> Result<AdminStats> { self.get("/admin/stats", None).await }

  /// `GET /api/admin/recent-clients?limit=<n>`
  async fn recent_clients(&self, limit: usize) -> Result<Vec<RecentClient>> {
    self.get("/admin/recent-clients", Some(limit)).await
  }

  /// `GET /api/admin/client-stats`
  async fn client_stats(&self) -> Result<ClientStatusCounts> {
    self.get("/admin/client-stats", None).await
  }

  /// `GET /api/admin/clients/<id>/updates?limit=<n>`
  async fn client_updates(&self, client_id: Uuid, limit: usize) -> Result<UpdatesPage> {
    self
      .get(&format!("/admin/clients/{client_id}/updates"), Some(limit))
      .await
  }

  /// `POST /api/admin/clients` (form)
  async fn create_client(&self, input: NewClient) -> Result<Credentials> {
    let req = self.client.post(self.url("/admin/clients")).form(&input);
    let outcome: CreateClientOutcome = self.send(req).await?;
    match outcome {
      CreateClientOutcome::Created { credentials, .. } => Ok(credentials),
      CreateClientOutcome::Failed { error } => Err(SyncError::Rejected(error)),
    }
  }

  /// `DELETE /api/admin/clients/<id>`
  async fn delete_client(&self, id: Uuid) -> Result<()> {
    let req = self.client.delete(self.url(&format!("/admin/clients/{id}")));
    let outcome: ActionOutcome = self.send(req).await?;
    match outcome {
      ActionOutcome::Done { success: true } => Ok(()),
      ActionOutcome::Done { success: false } => Err(SyncError::Rejected("delete failed".into())),
      ActionOutcome::Failed { error } => Err(SyncError::Rejected(error)),
    }
  }

  /// `GET /api/me/profile`
  async fn profile(&self) -> Result<ProfileSummary> { self.get("/me/profile", None).await }

  /// `GET /api/me/updates?limit=<n>`
  async fn my_updates(&self, limit: usize) -> Result<UpdatesPage> {
    self.get("/me/updates", Some(limit)).await
  }

  /// `POST /api/me/updates/<id>/read`
  async fn mark_read(&self, update_id: Uuid) -> Result<ClientUpdate> {
    let req = self
      .client
      .post(self.url(&format!("/me/updates/{update_id}/read")));
    self.send(req).await
  }

  /// `POST /api/me/updates/<id>/like`
  async fn set_liked(&self, update_id: Uuid, liked: bool) -> Result<ClientUpdate> {
    let req = self
      .client
      .post(self.url(&format!("/me/updates/{update_id}/like")))
      .json(&LikedBody { liked });
    self.send(req).await
  }

  /// `POST /api/me/updates/<id>/reactions`
  async fn add_reaction(&self, update_id: Uuid, emoji: String) -> Result<ClientUpdate> {
    let req = self
      .client
      .post(self.url(&format!("/me/updates/{update_id}/reactions")))
      .json(&ReactionBody { emoji });
    self.send(req).await
  }

  /// `GET /api/posts?limit=<n>`
  async fn posts(&self, limit: usize) -> Result<Vec<PostSummary>> {
    self.get("/posts", Some(limit)).await
  }
}
