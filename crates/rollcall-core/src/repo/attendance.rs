use std::sync::Arc;

use chrono::Utc;

use super::{from_document, to_document};
use crate::{
  Entity, Error, Id, Result,
  model::{AttendanceRecord, NewAttendance},
  store::{Collection, DocumentStore, Filter, InsertOutcome},
};

const COLLECTION: Collection = Collection::Attendance;

/// Result of [`AttendanceRepo::record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
  /// The record was written by this call.
  Created(AttendanceRecord),
  /// A record for the same session already existed and was left untouched.
  Existing(AttendanceRecord),
}

impl Recorded {
  pub fn record(&self) -> &AttendanceRecord {
    match self {
      Self::Created(r) | Self::Existing(r) => r,
    }
  }

  pub fn into_record(self) -> AttendanceRecord {
    match self {
      Self::Created(r) | Self::Existing(r) => r,
    }
  }

  pub fn is_duplicate(&self) -> bool { matches!(self, Self::Existing(_)) }
}

pub struct AttendanceRepo<S> {
  store: Arc<S>,
}

impl<S> Clone for AttendanceRepo<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

fn session_filter(student_id: Id, subject_id: Id, session_id: &str) -> Filter {
  Filter::new()
    .eq("student_id", student_id)
    .eq("subject_id", subject_id)
    .eq("session_id", session_id)
}

impl<S: DocumentStore> AttendanceRepo<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// The record for one student in one session, if any.
  pub async fn find_for_session(
    &self,
    student_id: Id,
    subject_id: Id,
    session_id: &str,
  ) -> Result<Option<AttendanceRecord>> {
    self
      .store
      .find_one(COLLECTION, &session_filter(student_id, subject_id, session_id))
      .await
      .map_err(Error::store)?
      .map(|d| from_document(COLLECTION, d))
      .transpose()
  }

  /// Insert a record unless one already exists for the same
  /// `(student_id, subject_id, session_id)`.
  ///
  /// Uniqueness is enforced by the store, so two concurrent calls for the
  /// same session produce exactly one `Created` and one `Existing`.
  pub async fn record(&self, input: NewAttendance) -> Result<Recorded> {
    let record = AttendanceRecord {
      id:         Id::new(),
      subject_id: input.subject_id,
      student_id: input.student_id,
      session_id: input.session_id,
      timestamp:  input.timestamp,
      decision:   input.decision,
      score:      input.score,
      created_at: Utc::now(),
    };

    let outcome = self
      .store
      .insert_one(COLLECTION, to_document(&record)?)
      .await
      .map_err(Error::store)?;

    match outcome {
      InsertOutcome::Inserted => Ok(Recorded::Created(record)),
      InsertOutcome::DuplicateKey => {
        let existing = self
          .find_for_session(record.student_id, record.subject_id, &record.session_id)
          .await?
          .ok_or(Error::NotFound(Entity::Record))?;
        Ok(Recorded::Existing(existing))
      }
    }
  }

  /// Records for a subject, optionally narrowed to one session.
  pub async fn list(
    &self,
    subject_id: Id,
    session_id: Option<&str>,
  ) -> Result<Vec<AttendanceRecord>> {
    let mut filter = Filter::new().eq("subject_id", subject_id);
    if let Some(session_id) = session_id {
      filter = filter.eq("session_id", session_id);
    }
    self.find_many(&filter).await
  }

  pub async fn list_for_student(&self, student_id: Id) -> Result<Vec<AttendanceRecord>> {
    self.find_many(&Filter::new().eq("student_id", student_id)).await
  }

  async fn find_many(&self, filter: &Filter) -> Result<Vec<AttendanceRecord>> {
    let docs = self.store.find(COLLECTION, filter).await.map_err(Error::store)?;
    docs.into_iter().map(|d| from_document(COLLECTION, d)).collect()
  }
}
