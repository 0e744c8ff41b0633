//! Router tests against an in-memory `SqliteStore`.

use std::{path::PathBuf, sync::Arc};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt as _;
use tressa_core::client::Credentials;
use tressa_store_sqlite::SqliteStore;

use crate::{AppState, api_router, auth::{AuthConfig, hash_password}};

const ADMIN_USER: &str = "practitioner";
const ADMIN_PASS: &str = "admin-secret";

struct Harness {
  state: AppState<SqliteStore>,
  blobs: TempDir,
}

async fn harness() -> Harness {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let blobs = tempfile::tempdir().unwrap();
  let state = AppState {
    store:          Arc::new(store),
    auth:           Arc::new(AuthConfig {
      admin_username:      ADMIN_USER.to_string(),
      admin_password_hash: hash_password(ADMIN_PASS).unwrap(),
    }),
    attachment_dir: Arc::new(PathBuf::from(blobs.path())),
  };
  Harness { state, blobs }
}

fn auth_header(user: &str, pass: &str) -> String {
  format!("Basic {}", B64.encode(format!("{user}:{pass}")))
}

fn admin_auth() -> String { auth_header(ADMIN_USER, ADMIN_PASS) }

fn client_auth(c: &Credentials) -> String { auth_header(&c.email, &c.password) }

async fn body_json(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

impl Harness {
  async fn send(
    &self,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    content_type: Option<&str>,
    body: Body,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    if let Some(ct) = content_type {
      builder = builder.header(header::CONTENT_TYPE, ct);
    }
    api_router(self.state.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap()
  }

  async fn json(&self, method: &str, uri: &str, auth: &str, body: Option<Value>) -> Response {
    match body {
      Some(v) => {
        self
          .send(method, uri, Some(auth), Some("application/json"), Body::from(v.to_string()))
          .await
      }
      None => self.send(method, uri, Some(auth), None, Body::empty()).await,
    }
  }

  async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> Response {
    self.json(method, uri, &admin_auth(), body).await
  }

  async fn create_client_form(&self, form: &str) -> Response {
    self
      .send(
        "POST",
        "/admin/clients",
        Some(&admin_auth()),
        Some("application/x-www-form-urlencoded"),
        Body::from(form.to_string()),
      )
      .await
  }

  /// Provision a client through the API and return its id and credentials.
  async fn provision(&self, name: &str, email: &str) -> (String, Credentials) {
    let resp = self
      .create_client_form(&format!("name={name}&email={email}"))
      .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let v = body_json(resp).await;
    let credentials: Credentials = serde_json::from_value(v["credentials"].clone()).unwrap();
    let profile = body_json(
      self
        .json("GET", "/me/profile", &client_auth(&credentials), None)
        .await,
    )
    .await;
    (profile["id"].as_str().unwrap().to_owned(), credentials)
  }

  async fn post_update(&self, client_id: &str, content: &str) -> String {
    let resp = self
      .admin(
        "POST",
        &format!("/admin/clients/{client_id}/updates"),
        Some(json!({ "category": "routine", "content": content })),
      )
      .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["id"].as_str().unwrap().to_owned()
  }
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_get_401_with_challenge() {
  let h = harness().await;
  let resp = h.send("GET", "/admin/stats", None, None, Body::empty()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  let challenge = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
  assert!(challenge.to_str().unwrap().starts_with("Basic"));
  assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn wrong_admin_password_is_401() {
  let h = harness().await;
  let resp = h
    .json("GET", "/admin/stats", &auth_header(ADMIN_USER, "nope"), None)
    .await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn clients_cannot_use_admin_routes_and_admin_has_no_session() {
  let h = harness().await;
  let (_, creds) = h.provision("Ana", "ana@example.pt").await;

  let resp = h.json("GET", "/admin/stats", &client_auth(&creds), None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let resp = h.admin("GET", "/me/profile", None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ── Provisioning ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn provisioned_credentials_log_in() {
  let h = harness().await;
  let resp = h
    .create_client_form("name=Ana+Sousa&email=Ana%40Example.pt&phone=")
    .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let v = body_json(resp).await;
  assert_eq!(v["success"], json!(true));
  assert_eq!(v["credentials"]["email"], json!("ana@example.pt"));

  let creds: Credentials = serde_json::from_value(v["credentials"].clone()).unwrap();
  let resp = h.json("GET", "/me/profile", &client_auth(&creds), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let profile = body_json(resp).await;
  assert_eq!(profile["name"], json!("Ana Sousa"));
  assert!(profile.get("avatar_url").is_some());
}

#[tokio::test]
async fn duplicate_email_is_409() {
  let h = harness().await;
  h.provision("Ana", "ana@example.pt").await;
  let resp = h.create_client_form("name=Other&email=ANA%40example.pt").await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn blank_name_is_400() {
  let h = harness().await;
  let resp = h.create_client_form("name=+&email=x%40example.pt").await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let v = body_json(resp).await;
  assert!(v["error"].as_str().unwrap().contains("name"));
}

// ── Dashboard ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dashboard_reflects_clients_and_appointments() {
  let h = harness().await;
  let (ana, _) = h.provision("Ana", "ana@example.pt").await;
  h.provision("Rita", "rita@example.pt").await;
  h.post_update(&ana, "Use the new shampoo twice a week").await;

  let resp = h
    .admin(
      "POST",
      &format!("/admin/clients/{ana}/appointments"),
      Some(json!({ "scheduled_at": Utc::now() + Duration::days(7), "kind": "treatment" })),
    )
    .await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let stats = body_json(h.admin("GET", "/admin/stats", None).await).await;
  assert_eq!(stats, json!({ "clientsCount": 2, "postsCount": 0, "updatesCount": 1 }));

  let counts = body_json(h.admin("GET", "/admin/client-stats", None).await).await;
  assert_eq!(counts, json!({ "total": 2, "comMarcacao": 1, "semMarcacao": 1 }));

  let recent = body_json(h.admin("GET", "/admin/recent-clients", None).await).await;
  let rows = recent.as_array().unwrap();
  assert_eq!(rows.len(), 2);
  let ana_row = rows.iter().find(|r| r["id"] == json!(ana)).unwrap();
  assert!(ana_row["lastUpdate"].is_string());

  let client = body_json(h.admin("GET", &format!("/admin/clients/{ana}"), None).await).await;
  assert_eq!(client["status"], json!("has_upcoming_appointment"));
}

#[tokio::test]
async fn limits_are_clamped() {
  let h = harness().await;
  h.provision("Ana", "ana@example.pt").await;
  h.provision("Rita", "rita@example.pt").await;

  let zero = body_json(h.admin("GET", "/admin/recent-clients?limit=0", None).await).await;
  assert_eq!(zero.as_array().unwrap().len(), 1);

  let huge = body_json(h.admin("GET", "/admin/recent-clients?limit=100000", None).await).await;
  assert_eq!(huge.as_array().unwrap().len(), 2);
}

// ── Client session ───────────────────────────────────────────────────────────

#[tokio::test]
async fn client_engages_with_own_updates() {
  let h = harness().await;
  let (ana, creds) = h.provision("Ana", "ana@example.pt").await;
  let auth = client_auth(&creds);
  let first = h.post_update(&ana, "first").await;
  h.post_update(&ana, "second").await;

  let page = body_json(h.json("GET", "/me/updates?limit=1", &auth, None).await).await;
  assert_eq!(page["count"], json!(2));
  assert_eq!(page["updates"].as_array().unwrap().len(), 1);

  let read = body_json(
    h.json("POST", &format!("/me/updates/{first}/read"), &auth, None)
      .await,
  )
  .await;
  assert!(read["read_at"].is_string());

  let liked = body_json(
    h.json(
      "POST",
      &format!("/me/updates/{first}/like"),
      &auth,
      Some(json!({ "liked": true })),
    )
    .await,
  )
  .await;
  assert_eq!(liked["liked"], json!(true));

  let reacted = body_json(
    h.json(
      "POST",
      &format!("/me/updates/{first}/reactions"),
      &auth,
      Some(json!({ "emoji": "💇" })),
    )
    .await,
  )
  .await;
  assert_eq!(reacted["reactions"], json!(["💇"]));
}

#[tokio::test]
async fn clients_cannot_touch_each_others_updates() {
  let h = harness().await;
  let (ana, _) = h.provision("Ana", "ana@example.pt").await;
  let (_, rita) = h.provision("Rita", "rita@example.pt").await;
  let update = h.post_update(&ana, "private note").await;

  let resp = h
    .json("POST", &format!("/me/updates/{update}/read"), &client_auth(&rita), None)
    .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let page = body_json(h.json("GET", "/me/updates", &client_auth(&rita), None).await).await;
  assert_eq!(page["count"], json!(0));
}

// ── Attachments ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn attachments_are_served_to_owner_and_removed_with_client() {
  let h = harness().await;
  let (ana, ana_creds) = h.provision("Ana", "ana@example.pt").await;
  let (_, rita_creds) = h.provision("Rita", "rita@example.pt").await;
  let update = h.post_update(&ana, "before and after").await;

  let resp = h
    .send(
      "POST",
      &format!("/admin/updates/{update}/attachments?file_name=scalp.jpg"),
      Some(&admin_auth()),
      Some("image/jpeg"),
      Body::from(&b"\xff\xd8\xffjpeg"[..]),
    )
    .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let attachment = body_json(resp).await;
  assert_eq!(attachment["kind"], json!("image"));
  let id = attachment["id"].as_str().unwrap().to_owned();
  let blob = h.blobs.path().join(attachment["path"].as_str().unwrap());
  assert!(blob.exists());

  let resp = h
    .json("GET", &format!("/attachments/{id}"), &client_auth(&ana_creds), None)
    .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  assert_eq!(&bytes[..], b"\xff\xd8\xffjpeg");

  let resp = h
    .json("GET", &format!("/attachments/{id}"), &client_auth(&rita_creds), None)
    .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let resp = h.admin("DELETE", &format!("/admin/clients/{ana}"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_json(resp).await, json!({ "success": true }));
  assert!(!blob.exists());

  let resp = h.admin("GET", &format!("/attachments/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_missing_client_is_404() {
  let h = harness().await;
  let resp = h
    .admin("DELETE", &format!("/admin/clients/{}", uuid::Uuid::new_v4()), None)
    .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Posts ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_published_posts_are_public() {
  let h = harness().await;
  h.admin(
    "POST",
    "/admin/posts",
    Some(json!({ "title": "Scalp care in winter", "content": "…", "published": true })),
  )
  .await;
  let draft = body_json(
    h.admin(
      "POST",
      "/admin/posts",
      Some(json!({ "title": "Draft", "content": "…" })),
    )
    .await,
  )
  .await;

  let public = body_json(h.send("GET", "/posts", None, None, Body::empty()).await).await;
  let titles: Vec<_> = public
    .as_array()
    .unwrap()
    .iter()
    .map(|p| p["title"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(titles, ["Scalp care in winter"]);
  assert!(public[0].get("published").is_none());

  let all = body_json(h.admin("GET", "/admin/posts", None).await).await;
  assert_eq!(all.as_array().unwrap().len(), 2);

  let id = draft["id"].as_str().unwrap();
  let resp = h
    .admin("POST", &format!("/admin/posts/{id}/publish"), Some(json!({ "published": true })))
    .await;
  assert_eq!(body_json(resp).await["published"], json!(true));
  let public = body_json(h.send("GET", "/posts", None, None, Body::empty()).await).await;
  assert_eq!(public.as_array().unwrap().len(), 2);
}
