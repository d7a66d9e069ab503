//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use rollcall_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing bearer token")]
  MissingToken,

  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("password hashing failed: {0}")]
  Hashing(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::MissingToken | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Self::Core(e) => match e {
        CoreError::Auth(_) => StatusCode::UNAUTHORIZED,
        CoreError::Forbidden => StatusCode::FORBIDDEN,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::AlreadyExists { .. } | CoreError::EmbeddingAlreadySet(_) => {
          StatusCode::CONFLICT
        }
        CoreError::EncodingRejected | CoreError::NoEnrollmentEmbedding => {
          StatusCode::UNPROCESSABLE_ENTITY
        }
        CoreError::InvalidId(_) => StatusCode::BAD_REQUEST,
        CoreError::BiometricUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Config(_)
        | CoreError::Decode { .. }
        | CoreError::Serialization(_)
        | CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, %status, "request failed");
    } else {
      tracing::debug!(error = %self, %status, "request refused");
    }

    // Internal details stay in the log.
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
      "internal server error".to_owned()
    } else {
      self.to_string()
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer realm=\"rollcall\""));
    }
    res
  }
}
