//! HTTP Basic-auth extractors and credential helpers.
//!
//! The practitioner signs in with the username and argon2 hash from the
//! server config. Clients sign in with their email and the password they
//! were handed when their account was provisioned.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{
  Engine as _,
  engine::general_purpose::{STANDARD as B64, URL_SAFE_NO_PAD},
};
use rand_core::{OsRng, RngCore};
use tracing::debug;
use uuid::Uuid;

use tressa_core::store::PortalStore;

use crate::{AppState, error::ApiError};

/// Admin credentials accepted by this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub admin_username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub admin_password_hash: String,
}

/// Who made the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
  Admin,
  Client(Uuid),
}

/// Present in a handler means the request came from the admin.
pub struct Admin;

/// Present in a handler means the request came from this client.
pub struct ClientSession(pub Uuid);

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Random bytes in a generated client password.
const PASSWORD_BYTES: usize = 18;

/// A fresh random password, URL-safe base64 without padding.
pub fn generate_password() -> String {
  let mut buf = [0u8; PASSWORD_BYTES];
  OsRng.fill_bytes(&mut buf);
  URL_SAFE_NO_PAD.encode(buf)
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)?
      .to_string(),
  )
}

pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

/// Pull `(username, password)` out of a `Basic` authorization header.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

// ─── Extractors ──────────────────────────────────────────────────────────────

impl<S> FromRequestParts<AppState<S>> for Principal
where
  S: PortalStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let (username, password) = basic_credentials(&parts.headers)?;

    if username == state.auth.admin_username {
      return if verify_password(&password, &state.auth.admin_password_hash) {
        Ok(Principal::Admin)
      } else {
        Err(ApiError::Unauthorized)
      };
    }

    let login = state
      .store
      .client_login(username.trim().to_lowercase())
      .await
      .map_err(ApiError::store)?;
    match login {
      Some((id, hash)) if verify_password(&password, &hash) => Ok(Principal::Client(id)),
      _ => {
        debug!(%username, "rejected login");
        Err(ApiError::Unauthorized)
      }
    }
  }
}

impl<S> FromRequestParts<AppState<S>> for Admin
where
  S: PortalStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match Principal::from_request_parts(parts, state).await? {
      Principal::Admin => Ok(Admin),
      Principal::Client(_) => Err(ApiError::Forbidden),
    }
  }
}

impl<S> FromRequestParts<AppState<S>> for ClientSession
where
  S: PortalStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match Principal::from_request_parts(parts, state).await? {
      Principal::Client(id) => Ok(ClientSession(id)),
      Principal::Admin => Err(ApiError::Forbidden),
    }
  }
}
