//! Signed identity tokens.
//!
//! Tokens are JWTs signed with a shared HMAC secret. The secret and the
//! algorithm are configuration; the codec refuses asymmetric algorithms
//! because there is no key pair to load.

use chrono::{Duration, Utc};
pub use jsonwebtoken::Algorithm;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{AuthError, Error, Id, model::Role};

/// The authenticated caller: who they are and what role they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
  pub id:    Id,
  pub role:  Role,
  pub email: String,
}

/// The payload carried inside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub sub:   Id,
  pub role:  Role,
  pub email: String,
  pub iat:   i64,
  pub exp:   i64,
}

impl Claims {
  pub fn principal(&self) -> Principal {
    Principal { id: self.sub, role: self.role, email: self.email.clone() }
  }
}

pub struct TokenCodec {
  header:     Header,
  encoding:   EncodingKey,
  decoding:   DecodingKey,
  validation: Validation,
}

impl TokenCodec {
  /// Build a codec for `secret` signed with `algorithm`, which must be one of
  /// `HS256`, `HS384` or `HS512`.
  pub fn new(secret: &[u8], algorithm: Algorithm) -> Result<Self, Error> {
    if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
      return Err(Error::Config(format!(
        "token algorithm {algorithm:?} is not an HMAC algorithm"
      )));
    }
    if secret.is_empty() {
      return Err(Error::Config("token secret must not be empty".into()));
    }

    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    Ok(Self {
      header: Header::new(algorithm),
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      validation,
    })
  }

  /// Sign a token for `principal` that expires `ttl` from now.
  pub fn issue(&self, principal: &Principal, ttl: Duration) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
      sub:   principal.id,
      role:  principal.role,
      email: principal.email.clone(),
      iat:   now.timestamp(),
      exp:   (now + ttl).timestamp(),
    };
    jsonwebtoken::encode(&self.header, &claims, &self.encoding)
      .map_err(|e| AuthError::Signing(e.to_string()))
  }

  /// Check the signature and expiry of `token` and return its claims.
  pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
    jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
      .map(|data| data.claims)
      .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        _ => AuthError::Malformed,
      })
  }
}
