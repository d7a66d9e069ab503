//! Repositories: narrow, typed contracts over a [`DocumentStore`].
//!
//! Lookups return `Ok(None)` for a missing document. Creates stamp `_id` and
//! `created_at` and return the full entity. Updates are single atomic
//! `update_one` calls; no repository ever rewrites a whole document.

mod attendance;
mod students;
mod subjects;
mod users;

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

pub use attendance::{AttendanceRepo, Recorded};
pub use students::StudentsRepo;
pub use subjects::SubjectsRepo;
pub use users::UsersRepo;

use crate::{
  Error, Result,
  store::{Collection, Document, DocumentStore},
};

/// All four repositories over one shared store.
pub struct Repositories<S> {
  pub users:      UsersRepo<S>,
  pub subjects:   SubjectsRepo<S>,
  pub students:   StudentsRepo<S>,
  pub attendance: AttendanceRepo<S>,
}

impl<S: DocumentStore> Repositories<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      users:      UsersRepo::new(store.clone()),
      subjects:   SubjectsRepo::new(store.clone()),
      students:   StudentsRepo::new(store.clone()),
      attendance: AttendanceRepo::new(store),
    }
  }
}

impl<S> Clone for Repositories<S> {
  fn clone(&self) -> Self {
    Self {
      users:      self.users.clone(),
      subjects:   self.subjects.clone(),
      students:   self.students.clone(),
      attendance: self.attendance.clone(),
    }
  }
}

// ─── Encoding helpers ────────────────────────────────────────────────────────

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
  match serde_json::to_value(value)? {
    serde_json::Value::Object(map) => Ok(map),
    other => Err(Error::Serialization(serde::ser::Error::custom(format!(
      "expected an object, got {other}"
    )))),
  }
}

fn from_document<T: DeserializeOwned>(collection: Collection, doc: Document) -> Result<T> {
  serde_json::from_value(serde_json::Value::Object(doc)).map_err(|source| {
    Error::Decode { collection, source }
  })
}

#[cfg(test)]
mod tests;
