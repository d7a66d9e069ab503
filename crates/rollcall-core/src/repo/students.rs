use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;

use super::{from_document, to_document};
use crate::{
  Entity, Error, Id, Result,
  model::Student,
  store::{Collection, DocumentStore, Filter, InsertOutcome, Update},
};

const COLLECTION: Collection = Collection::Students;

pub struct StudentsRepo<S> {
  store: Arc<S>,
}

impl<S> Clone for StudentsRepo<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

impl<S: DocumentStore> StudentsRepo<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn get(&self, id: Id) -> Result<Option<Student>> {
    self.find_one(&Filter::by_id(id)).await
  }

  /// The student profile owned by `user_id`, if any.
  pub async fn get_by_user(&self, user_id: Id) -> Result<Option<Student>> {
    self.find_one(&Filter::new().eq("user_id", user_id)).await
  }

  /// Students enrolled in `subject_id`.
  pub async fn list_enrolled(&self, subject_id: Id) -> Result<Vec<Student>> {
    let filter = Filter::new().eq("enrolled_subject_ids", subject_id);
    let docs = self.store.find(COLLECTION, &filter).await.map_err(Error::store)?;
    docs.into_iter().map(|d| from_document(COLLECTION, d)).collect()
  }

  /// Create the student profile for `user_id`, optionally with its reference
  /// embedding already captured.
  pub async fn create(&self, user_id: Id, face_embedding: Option<Vec<f32>>) -> Result<Student> {
    let student = Student {
      id: Id::new(),
      user_id,
      enrolled_subject_ids: BTreeSet::new(),
      face_embedding,
      created_at: Utc::now(),
    };

    let outcome = self
      .store
      .insert_one(COLLECTION, to_document(&student)?)
      .await
      .map_err(Error::store)?;

    match outcome {
      InsertOutcome::Inserted => Ok(student),
      InsertOutcome::DuplicateKey => Err(Error::AlreadyExists {
        entity: Entity::Student,
        key:    user_id.to_string(),
      }),
    }
  }

  /// Enroll the student in a subject. Re-enrolling is a no-op.
  pub async fn enroll(&self, student_id: Id, subject_id: Id) -> Result<()> {
    let outcome = self
      .store
      .update_one(
        COLLECTION,
        &Filter::by_id(student_id),
        Update::add_to_set("enrolled_subject_ids", subject_id),
      )
      .await
      .map_err(Error::store)?;

    if outcome.matched == 0 {
      return Err(Error::NotFound(Entity::Student));
    }
    Ok(())
  }

  /// Store the reference embedding. The write is conditional on the field
  /// being absent, so it succeeds at most once per student.
  pub async fn set_face_embedding(&self, student_id: Id, embedding: Vec<f32>) -> Result<()> {
    let filter = Filter::by_id(student_id).exists("face_embedding", false);
    let outcome = self
      .store
      .update_one(
        COLLECTION,
        &filter,
        Update::set("face_embedding", serde_json::to_value(embedding)?),
      )
      .await
      .map_err(Error::store)?;

    if outcome.matched == 1 {
      return Ok(());
    }
    match self.get(student_id).await? {
      Some(_) => Err(Error::EmbeddingAlreadySet(student_id)),
      None => Err(Error::NotFound(Entity::Student)),
    }
  }

  async fn find_one(&self, filter: &Filter) -> Result<Option<Student>> {
    self
      .store
      .find_one(COLLECTION, filter)
      .await
      .map_err(Error::store)?
      .map(|d| from_document(COLLECTION, d))
      .transpose()
  }
}
