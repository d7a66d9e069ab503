//! Handlers for accounts: registration, login and role assignment.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/register` | Body: `{"name","email","password","role"}`; 201 |
//! | `POST` | `/auth/login` | Body: `{"email","password"}` |
//! | `PUT`  | `/users/{id}/role` | Admin only. Body: `{"role":"professor"}`; 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rollcall_core::{
  Error as CoreError, Id,
  biometric::BiometricService,
  guard::{self, Operation},
  model::{NewUser, Role, User},
  store::DocumentStore,
  token::Principal,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::{Authenticated, hash_password, verify_password},
  error::ApiError,
};

/// A user as returned by the API; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
  pub id:         Id,
  pub name:       String,
  pub email:      String,
  pub role:       Role,
  pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
  fn from(user: User) -> Self {
    Self {
      id:         user.id,
      name:       user.name,
      email:      user.email,
      role:       user.role,
      created_at: user.created_at,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
  pub token: String,
  pub user:  UserView,
}

fn issue<S, B>(state: &AppState<S, B>, user: User) -> Result<SessionResponse, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let principal = Principal { id: user.id, role: user.role, email: user.email.clone() };
  let token = state
    .tokens()
    .issue(&principal, state.token_ttl)
    .map_err(CoreError::from)?;
  Ok(SessionResponse { token, user: user.into() })
}

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub name:     String,
  pub email:    String,
  pub password: String,
  pub role:     Role,
}

/// `POST /auth/register`
pub async fn register<S, B>(
  State(state): State<AppState<S, B>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  if body.role == Role::Admin {
    return Err(ApiError::BadRequest("admin accounts cannot self-register".into()));
  }
  let email = body.email.trim().to_lowercase();
  if body.name.trim().is_empty() || email.is_empty() || body.password.is_empty() {
    return Err(ApiError::BadRequest("name, email and password are required".into()));
  }

  let user = state
    .repos()
    .users
    .create(NewUser {
      name:          body.name.trim().to_owned(),
      email,
      password_hash: hash_password(&body.password)?,
      role:          body.role,
    })
    .await?;

  if user.role == Role::Student {
    state.repos().students.create(user.id, None).await?;
  }
  tracing::info!(user = %user.id, role = %user.role, "user registered");

  Ok((StatusCode::CREATED, Json(issue(&state, user)?)))
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

/// `POST /auth/login`
pub async fn login<S, B>(
  State(state): State<AppState<S, B>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<SessionResponse>, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  let email = body.email.trim().to_lowercase();
  let user = state
    .repos()
    .users
    .get_by_email(&email)
    .await?
    .ok_or(ApiError::InvalidCredentials)?;

  if !verify_password(&body.password, &user.password_hash) {
    return Err(ApiError::InvalidCredentials);
  }
  Ok(Json(issue(&state, user)?))
}

// ─── Role assignment ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub role: Role,
}

/// `PUT /users/{id}/role`
///
/// Promoting a user to student also gives them a student profile, so they can
/// enroll a face and be added to subjects.
pub async fn set_role<S, B>(
  State(state): State<AppState<S, B>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<Id>,
  Json(body): Json<RoleBody>,
) -> Result<StatusCode, ApiError>
where
  S: DocumentStore,
  B: BiometricService,
{
  guard::require(&principal, Operation::AssignRole)?;

  let repos = state.repos();
  repos.users.set_role(id, body.role).await?;
  if body.role == Role::Student && repos.students.get_by_user(id).await?.is_none() {
    match repos.students.create(id, None).await {
      Ok(_) | Err(CoreError::AlreadyExists { .. }) => {}
      Err(e) => return Err(e.into()),
    }
  }
  tracing::info!(user = %id, role = %body.role, by = %principal.id, "role assigned");
  Ok(StatusCode::NO_CONTENT)
}
