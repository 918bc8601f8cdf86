//! HTTP Basic auth for the `/api` routes.
//!
//! Only the argon2 hash of the password is configured; the plaintext never
//! leaves the request.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header::AUTHORIZATION},
  middleware::Next,
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};

use crate::{AppState, error::ApiError};

/// The single account allowed to use the API.
#[derive(Clone, Debug)]
pub struct AuthConfig {
  pub username:      String,
  /// argon2 PHC string (`$argon2id$v=19$...`).
  pub password_hash: String,
}

impl AuthConfig {
  /// Whether `username`/`password` match this account. A malformed
  /// configured hash matches nothing.
  pub fn accepts(&self, username: &str, password: &str) -> bool {
    if username != self.username {
      return false;
    }
    PasswordHash::new(&self.password_hash).is_ok_and(|hash| {
      Argon2::default().verify_password(password.as_bytes(), &hash).is_ok()
    })
  }
}

/// `(username, password)` from an `Authorization: Basic ...` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
  let decoded = B64.decode(value.strip_prefix("Basic ")?).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (user, pass) = creds.split_once(':')?;
  Some((user.to_owned(), pass.to_owned()))
}

/// Check the request's Basic credentials against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  match basic_credentials(headers) {
    Some((user, pass)) if config.accepts(&user, &pass) => Ok(()),
    _ => Err(ApiError::Unauthorized),
  }
}

/// Route layer guarding `/api`. A state without [`AuthConfig`] lets every
/// request through.
pub async fn require_auth<S>(
  State(state): State<AppState<S>>,
  req: Request,
  next: Next,
) -> Result<Response, ApiError>
where
  S: Send + Sync + 'static,
{
  if let Some(auth) = &state.auth {
    verify_auth(req.headers(), auth)?;
  }
  Ok(next.run(req).await)
}
