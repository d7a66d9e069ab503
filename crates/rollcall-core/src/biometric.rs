//! The `BiometricService` trait: the two-operation contract of the external
//! face-matching service.

use std::future::Future;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Result of [`BiometricService::encode_face`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEncoding {
  /// `false` when no usable face was found in the image.
  pub success:   bool,
  #[serde(default)]
  pub embedding: Vec<f32>,
}

/// Result of [`BiometricService::match_face`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
  #[serde(rename = "match")]
  pub matched: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub score:   Option<f32>,
}

/// Abstraction over the remote embedding/matching service.
///
/// Both calls are remote and may be slow or fail. Implementations report
/// transport problems through `Self::Error`; a negative match is an ordinary
/// `Ok` value.
pub trait BiometricService: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Compute an embedding for the face in `image`.
  fn encode_face(
    &self,
    image: Bytes,
  ) -> impl Future<Output = Result<FaceEncoding, Self::Error>> + Send + '_;

  /// Compare a freshly captured embedding against the stored reference.
  fn match_face<'a>(
    &'a self,
    candidate: &'a [f32],
    reference: &'a [f32],
  ) -> impl Future<Output = Result<FaceMatch, Self::Error>> + Send + 'a;
}
