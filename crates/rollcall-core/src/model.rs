//! Entity types persisted in the document store.
//!
//! Each entity maps one-to-one onto a document in its collection. The `_id`
//! field carries the [`Id`]; `created_at` is always stamped by the repository
//! layer and never accepted from callers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Id;

// ─── Roles ───────────────────────────────────────────────────────────────────

/// The role a user holds. Carried in token claims.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Student,
  Professor,
  Admin,
}

// ─── User ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  #[serde(rename = "_id")]
  pub id:            Id,
  pub name:          String,
  pub email:         String,
  /// PHC string produced by argon2.
  pub password_hash: String,
  pub role:          Role,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::repo::UsersRepo::create`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
}

// ─── Subject ─────────────────────────────────────────────────────────────────

/// A course owned by one or more professors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  #[serde(rename = "_id")]
  pub id:            Id,
  pub name:          String,
  /// Unique across all subjects, e.g. `"CS101"`.
  pub code:          String,
  pub professor_ids: BTreeSet<Id>,
  pub created_at:    DateTime<Utc>,
}

impl Subject {
  pub fn is_taught_by(&self, user_id: Id) -> bool {
    self.professor_ids.contains(&user_id)
  }
}

// ─── Student ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
  #[serde(rename = "_id")]
  pub id:                   Id,
  /// The [`User`] this student profile belongs to.
  pub user_id:              Id,
  #[serde(default)]
  pub enrolled_subject_ids: BTreeSet<Id>,
  /// Reference embedding for biometric comparison. Absent until enrolled;
  /// written at most once.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub face_embedding:       Option<Vec<f32>>,
  pub created_at:           DateTime<Utc>,
}

impl Student {
  pub fn is_enrolled_in(&self, subject_id: Id) -> bool {
    self.enrolled_subject_ids.contains(&subject_id)
  }
}

// ─── Attendance ──────────────────────────────────────────────────────────────

/// Outcome of a verified attendance attempt.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Decision {
  Present,
  Rejected,
}

/// An append-only attendance event. At most one exists per
/// `(student_id, subject_id, session_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  #[serde(rename = "_id")]
  pub id:         Id,
  pub subject_id: Id,
  pub student_id: Id,
  /// Opaque identifier of the class meeting, e.g. `"2024-03-01"`.
  pub session_id: String,
  /// When the attempt started.
  pub timestamp:  DateTime<Utc>,
  pub decision:   Decision,
  /// Similarity score reported by the matcher, if any.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub score:      Option<f32>,
  /// When the record was stored.
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::repo::AttendanceRepo::record`].
#[derive(Debug, Clone)]
pub struct NewAttendance {
  pub subject_id: Id,
  pub student_id: Id,
  pub session_id: String,
  pub timestamp:  DateTime<Utc>,
  pub decision:   Decision,
  pub score:      Option<f32>,
}
