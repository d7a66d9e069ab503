//! Handler for `POST /attendance`.
//!
//! Body: `{"subject_id","student_id","session_id"}` plus exactly one of
//! `"image"` (base64) or `"embedding"` (`[f32]`). Responds `201` with the new
//! record, or `200` with the stored record when the session was already
//! recorded.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use rollcall_core::{
  Id,
  attendance::{AttendanceRequest, Attempt, Evidence},
  biometric::BiometricService,
  model::AttendanceRecord,
  store::DocumentStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::BearerToken, error::ApiError, students::decode_image};

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub subject_id: Id,
  pub student_id: Id,
  pub session_id: String,
  #[serde(default)]
  pub image:      Option<String>,
  #[serde(default)]
  pub embedding:  Option<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
  pub record:    AttendanceRecord,
  pub accepted:  bool,
  pub duplicate: bool,
}

impl From<Attempt> for SubmitResponse {
  fn from(attempt: Attempt) -> Self {
    Self { accepted: attempt.is_accepted(), duplicate: attempt.duplicate, record: attempt.record }
  }
}

impl SubmitBody {
  fn into_request(self) -> Result<AttendanceRequest, ApiError> {
    let session_id = self.session_id.trim().to_owned();
    if session_id.is_empty() {
      return Err(ApiError::BadRequest("session_id is required".into()));
    }
    let evidence = match (self.image, self.embedding) {
      (Some(image), None) => Evidence::Image(decode_image(&image)?),
      (None, Some(embedding)) if !embedding.is_empty() => Evidence::Embedding(embedding),
      _ => {
        return Err(ApiError::BadRequest(
          "exactly one of image or embedding is required".into(),
        ));
      }
    };
    Ok(AttendanceRequest {
      subject_id: self.subject_id,
      student_id: self.student_id,
      session_id,
      evidence,
    })
  }
}

/// `POST /attendance`
pub async fn submit<S, B>(
  State(state): State<AppState<S, B>>,
  BearerToken(token): BearerToken,
  Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let request = body.into_request()?;
  let attempt = state.service.submit(&token, request).await?;
  let status = if attempt.duplicate { StatusCode::OK } else { StatusCode::CREATED };
  Ok((status, Json(attempt.into())))
}
