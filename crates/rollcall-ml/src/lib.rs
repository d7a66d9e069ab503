//! HTTP client for the face embedding/matching service.
//!
//! Implements [`BiometricService`] against two JSON endpoints:
//!
//! | Method | Path      | Body                                   | Response |
//! |--------|-----------|----------------------------------------|----------|
//! | `POST` | `/encode` | `{"image": "<base64>"}`                | `{"success": bool, "embedding": [f32]}` |
//! | `POST` | `/match`  | `{"candidate": [f32], "reference": [f32]}` | `{"match": bool, "score": f32?}` |

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use rollcall_core::biometric::{BiometricService, FaceEncoding, FaceMatch};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Build(#[source] reqwest::Error),

  #[error("request to {path} failed: {source}")]
  Transport {
    path:   &'static str,
    #[source]
    source: reqwest::Error,
  },

  #[error("{path} returned {status}")]
  Status { path: &'static str, status: StatusCode },
}

/// Connection settings for the ML service.
#[derive(Debug, Clone)]
pub struct MlConfig {
  pub base_url: String,
  /// Per-request timeout enforced by the HTTP client.
  pub timeout:  Duration,
}

/// Async client for the ML service.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct MlClient {
  client:   Client,
  base_url: String,
}

#[derive(Serialize)]
struct EncodeBody {
  image: String,
}

#[derive(Serialize)]
struct MatchBody<'a> {
  candidate: &'a [f32],
  reference: &'a [f32],
}

impl MlClient {
  pub fn new(config: MlConfig) -> Result<Self, Error> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(Error::Build)?;
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
    })
  }

  async fn post<B, R>(&self, path: &'static str, body: &B) -> Result<R, Error>
  where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
  {
    let transport = |source| Error::Transport { path, source };

    let resp = self
      .client
      .post(format!("{}{path}", self.base_url))
      .json(body)
      .send()
      .await
      .map_err(|e| {
        tracing::warn!(path, error = %e, "ml service request failed");
        transport(e)
      })?;

    let status = resp.status();
    if !status.is_success() {
      tracing::warn!(path, %status, "ml service returned an error status");
      return Err(Error::Status { path, status });
    }
    resp.json().await.map_err(transport)
  }
}

impl BiometricService for MlClient {
  type Error = Error;

  async fn encode_face(&self, image: Bytes) -> Result<FaceEncoding, Error> {
    let body = EncodeBody { image: B64.encode(&image) };
    self.post("/encode", &body).await
  }

  async fn match_face(&self, candidate: &[f32], reference: &[f32]) -> Result<FaceMatch, Error> {
    self.post("/match", &MatchBody { candidate, reference }).await
  }
}

#[cfg(test)]
mod tests;
