//! JSON REST API for Rollcall.
//!
//! Exposes an axum [`Router`] backed by any [`DocumentStore`] and
//! [`BiometricService`]. TLS, request tracing and listener setup are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = rollcall_api::api_router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod attendance;
pub mod auth;
pub mod error;
pub mod students;
pub mod subjects;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use rollcall_core::{
  attendance::AttendanceService, biometric::BiometricService, repo::Repositories,
  store::DocumentStore, token::TokenCodec,
};

pub use error::ApiError;

/// Default lifetime, in minutes, of tokens issued at login and registration.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 12 * 60;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, B> {
  pub service:   Arc<AttendanceService<S, B>>,
  /// Lifetime of tokens issued by `/auth/*`.
  pub token_ttl: chrono::Duration,
}

impl<S, B> Clone for AppState<S, B> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), token_ttl: self.token_ttl }
  }
}

impl<S, B> AppState<S, B>
where
  S: DocumentStore,
  B: BiometricService,
{
  pub fn new(service: AttendanceService<S, B>) -> Self {
    Self {
      service:   Arc::new(service),
      token_ttl: chrono::Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
    }
  }

  pub fn with_token_ttl(mut self, ttl: chrono::Duration) -> Self {
    self.token_ttl = ttl;
    self
  }

  pub fn repos(&self) -> &Repositories<S> { self.service.repos() }

  pub fn tokens(&self) -> &TokenCodec { self.service.tokens() }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, B>(state: AppState<S, B>) -> Router<()>
where
  S: DocumentStore + 'static,
  B: BiometricService + 'static,
{
  Router::new()
    // Accounts
    .route("/auth/register", post(users::register::<S, B>))
    .route("/auth/login", post(users::login::<S, B>))
    .route("/users/{id}/role", put(users::set_role::<S, B>))
    // Subjects
    .route("/subjects", get(subjects::list::<S, B>).post(subjects::create::<S, B>))
    .route("/subjects/by-code/{code}", get(subjects::get_by_code::<S, B>))
    .route("/subjects/{id}", get(subjects::get_one::<S, B>))
    .route("/subjects/{id}/professors", post(subjects::add_professor::<S, B>))
    .route(
      "/subjects/{id}/students",
      get(subjects::roster::<S, B>).post(subjects::enroll_student::<S, B>),
    )
    .route("/subjects/{id}/attendance", get(subjects::attendance::<S, B>))
    // Students
    .route("/students/me/face", post(students::enroll_face::<S, B>))
    .route("/students/me/attendance", get(students::my_attendance::<S, B>))
    // Attendance
    .route("/attendance", post(attendance::submit::<S, B>))
    .with_state(state)
}
