//! Error types for `rollcall-core`.

use thiserror::Error;

use crate::{Id, store::Collection};

/// The kind of entity a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Entity {
  User,
  Subject,
  Student,
  Record,
}

/// Reasons a bearer token is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
  #[error("token expired")]
  Expired,

  #[error("malformed token")]
  Malformed,

  #[error("invalid token signature")]
  InvalidSignature,

  #[error("failed to sign token: {0}")]
  Signing(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthenticated: {0}")]
  Auth(#[from] AuthError),

  #[error("forbidden")]
  Forbidden,

  #[error("{0} not found")]
  NotFound(Entity),

  #[error("{entity} already exists: {key}")]
  AlreadyExists { entity: Entity, key: String },

  #[error("face embedding already enrolled for student {0}")]
  EmbeddingAlreadySet(Id),

  #[error("biometric service unavailable: {0}")]
  BiometricUnavailable(String),

  #[error("biometric service could not encode the supplied image")]
  EncodingRejected,

  #[error("student has no enrolled face embedding")]
  NoEnrollmentEmbedding,

  #[error("invalid id: {0:?}")]
  InvalidId(String),

  #[error("configuration error: {0}")]
  Config(String),

  #[error("malformed {collection} document: {source}")]
  Decode {
    collection: Collection,
    #[source]
    source:     serde_json::Error,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error from a [`crate::store::DocumentStore`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Whether the caller may resubmit the same request unchanged. No failure
  /// leaves a partial record behind, so transport-level errors are safe to
  /// retry.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Store(_) | Self::BiometricUnavailable(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
