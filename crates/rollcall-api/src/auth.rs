//! Bearer-token extractors and argon2 password handling.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use rand_core::OsRng;
use rollcall_core::{
  Error as CoreError, biometric::BiometricService, store::DocumentStore, token::Principal,
};

use crate::{AppState, error::ApiError};

// ─── Extractors ───────────────────────────────────────────────────────────────

/// The raw token from an `Authorization: Bearer` header, not yet verified.
pub struct BearerToken(pub String);

/// A caller whose token verified; carries the token's principal.
pub struct Authenticated(pub Principal);

/// Pull the bearer token out of `headers`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
  let value = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::MissingToken)?;

  let token = value
    .strip_prefix("Bearer ")
    .or_else(|| value.strip_prefix("bearer "))
    .map(str::trim)
    .ok_or(ApiError::MissingToken)?;

  if token.is_empty() {
    return Err(ApiError::MissingToken);
  }
  Ok(token)
}

impl<St> FromRequestParts<St> for BearerToken
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    Ok(BearerToken(bearer_token(&parts.headers)?.to_owned()))
  }
}

impl<S, B> FromRequestParts<AppState<S, B>> for Authenticated
where
  S: DocumentStore,
  B: BiometricService,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, B>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)?;
    let claims = state.tokens().verify(token).map_err(CoreError::from)?;
    Ok(Authenticated(claims.principal()))
  }
}

// ─── Passwords ────────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Hashing(e.to_string()))
}

/// Check `password` against a stored PHC string. A malformed hash never
/// verifies.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    tracing::warn!("stored password hash is not a valid PHC string");
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

#[cfg(test)]
mod tests {
  use axum::http::{HeaderValue, Request};

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  #[test]
  fn bearer_prefix_is_required() {
    assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
    assert!(matches!(bearer_token(&headers("Basic dXNlcg==")), Err(ApiError::MissingToken)));
    assert!(matches!(bearer_token(&headers("Bearer ")), Err(ApiError::MissingToken)));
    assert!(matches!(bearer_token(&HeaderMap::new()), Err(ApiError::MissingToken)));
  }

  #[tokio::test]
  async fn bearer_extractor_ignores_state() {
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Bearer t0k3n")
      .body(())
      .unwrap();
    let (mut parts, _) = req.into_parts();

    let BearerToken(token) = BearerToken::from_request_parts(&mut parts, &()).await.unwrap();
    assert_eq!(token, "t0k3n");
  }

  #[test]
  fn password_roundtrip() {
    let hash = hash_password("hunter2").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("hunter2", &hash));
    assert!(!verify_password("hunter3", &hash));
  }

  #[test]
  fn malformed_hash_never_verifies() {
    assert!(!verify_password("anything", "not-a-phc-string"));
  }
}
