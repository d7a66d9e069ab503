//! Handlers for the calling student's own profile.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/students/me/face` | Body: `{"image":"<base64>"}`; 204, 409 once enrolled |
//! | `GET`  | `/students/me/attendance` | Every record for the caller |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use bytes::Bytes;
use rollcall_core::{
  Entity, Error as CoreError, biometric::BiometricService, model::AttendanceRecord,
  store::DocumentStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// Decode a base64 image field into raw bytes.
pub(crate) fn decode_image(image: &str) -> Result<Bytes, ApiError> {
  let bytes = B64
    .decode(image.trim())
    .map_err(|e| ApiError::BadRequest(format!("image is not valid base64: {e}")))?;
  if bytes.is_empty() {
    return Err(ApiError::BadRequest("image is empty".into()));
  }
  Ok(Bytes::from(bytes))
}

#[derive(Debug, Deserialize)]
pub struct FaceBody {
  pub image: String,
}

/// `POST /students/me/face`
pub async fn enroll_face<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
  Json(body): Json<FaceBody>,
) -> Result<StatusCode, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let image = decode_image(&body.image)?;
  state.service.enroll_face(&principal, image).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /students/me/attendance`
pub async fn my_attendance<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let student = state
    .repos()
    .students
    .get_by_user(principal.id)
    .await?
    .ok_or(CoreError::NotFound(Entity::Student))?;
  let records = state.repos().attendance.list_for_student(student.id).await?;
  Ok(Json(records))
}
