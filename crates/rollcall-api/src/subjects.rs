//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | Subjects the caller teaches |
//! | `POST` | `/subjects` | Body: `{"name","code","professor_id"?}`; 201 |
//! | `GET`  | `/subjects/by-code/{code}` | 404 if not found |
//! | `GET`  | `/subjects/{id}` | 404 if not found |
//! | `POST` | `/subjects/{id}/professors` | Body: `{"professor_id"}`; 204 |
//! | `GET`  | `/subjects/{id}/students` | Enrolled students |
//! | `POST` | `/subjects/{id}/students` | Body: `{"student_id"}`; 204 |
//! | `GET`  | `/subjects/{id}/attendance` | Optional `?session_id=` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  Entity, Error as CoreError, Id,
  biometric::BiometricService,
  guard::{self, Operation, Scope},
  model::{AttendanceRecord, Role, Student, Subject},
  store::DocumentStore,
  token::Principal,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::Authenticated, error::ApiError};

/// Load a subject and check that `principal` may manage it.
async fn managed<S, B>(
  state: &AppState<S, B>,
  principal: &Principal,
  id: Id,
) -> Result<Subject, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  guard::require(principal, Operation::ManageSubject)?;
  let subject = state
    .repos()
    .subjects
    .get(id)
    .await?
    .ok_or(CoreError::NotFound(Entity::Subject))?;
  guard::authorize(principal, Scope::Subject(&subject))?;
  Ok(subject)
}

/// Resolve a user id that is about to be made a professor.
async fn professor<S, B>(state: &AppState<S, B>, id: Id) -> Result<Id, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let user = state
    .repos()
    .users
    .get(id)
    .await?
    .ok_or(CoreError::NotFound(Entity::User))?;
  if user.role == Role::Student {
    return Err(ApiError::BadRequest(format!("user {id} is not a professor")));
  }
  Ok(user.id)
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:         String,
  pub code:         String,
  /// Defaults to the caller. Only admins may name someone else.
  pub professor_id: Option<Id>,
}

/// `POST /subjects`
pub async fn create<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  guard::require(&principal, Operation::CreateSubject)?;

  let code = body.code.trim();
  if body.name.trim().is_empty() || code.is_empty() {
    return Err(ApiError::BadRequest("name and code are required".into()));
  }

  let professor_id = match body.professor_id {
    None => principal.id,
    Some(id) if id == principal.id => id,
    Some(id) if principal.role == Role::Admin => professor(&state, id).await?,
    Some(_) => return Err(CoreError::Forbidden.into()),
  };

  let subject = state
    .repos()
    .subjects
    .create(body.name.trim(), code, professor_id)
    .await?;
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Lookups ──────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  guard::require(&principal, Operation::ManageSubject)?;
  let subjects = state.repos().subjects.list_for_professor(principal.id).await?;
  Ok(Json(subjects))
}

/// `GET /subjects/by-code/{code}`
pub async fn get_by_code<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(_): Authenticated,
  Path(code): Path<String>,
) -> Result<Json<Subject>, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let subject = state
    .repos()
    .subjects
    .get_by_code(&code)
    .await?
    .ok_or(CoreError::NotFound(Entity::Subject))?;
  Ok(Json(subject))
}

/// `GET /subjects/{id}`
pub async fn get_one<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(_): Authenticated,
  Path(id): Path<Id>,
) -> Result<Json<Subject>, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let subject = state
    .repos()
    .subjects
    .get(id)
    .await?
    .ok_or(CoreError::NotFound(Entity::Subject))?;
  Ok(Json(subject))
}

// ─── Membership ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProfessorBody {
  pub professor_id: Id,
}

/// `POST /subjects/{id}/professors`
pub async fn add_professor<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<Id>,
  Json(body): Json<ProfessorBody>,
) -> Result<StatusCode, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let subject = managed(&state, &principal, id).await?;
  let professor_id = professor(&state, body.professor_id).await?;
  state.repos().subjects.add_professor(subject.id, professor_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// A roster entry; the embedding itself never leaves the server.
#[derive(Debug, Serialize, Deserialize)]
pub struct RosterEntry {
  pub id:       Id,
  pub user_id:  Id,
  pub has_face: bool,
}

impl From<Student> for RosterEntry {
  fn from(student: Student) -> Self {
    Self {
      id:       student.id,
      user_id:  student.user_id,
      has_face: student.face_embedding.is_some(),
    }
  }
}

/// `GET /subjects/{id}/students`
pub async fn roster<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<Id>,
) -> Result<Json<Vec<RosterEntry>>, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let subject = managed(&state, &principal, id).await?;
  let students = state.repos().students.list_enrolled(subject.id).await?;
  Ok(Json(students.into_iter().map(RosterEntry::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct StudentBody {
  pub student_id: Id,
}

/// `POST /subjects/{id}/students`
pub async fn enroll_student<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<Id>,
  Json(body): Json<StudentBody>,
) -> Result<StatusCode, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let subject = managed(&state, &principal, id).await?;
  state.repos().students.enroll(body.student_id, subject.id).await?;
  tracing::info!(subject = %subject.id, student = %body.student_id, "student enrolled");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Attendance ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AttendanceParams {
  pub session_id: Option<String>,
}

/// `GET /subjects/{id}/attendance[?session_id=<session>]`
pub async fn attendance<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<Id>,
  Query(params): Query<AttendanceParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let subject = managed(&state, &principal, id).await?;
  let records = state
    .repos()
    .attendance
    .list(subject.id, params.session_id.as_deref())
    .await?;
  Ok(Json(records))
}
