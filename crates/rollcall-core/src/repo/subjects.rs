use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;

use super::{from_document, to_document};
use crate::{
  Entity, Error, Id, Result,
  model::Subject,
  store::{Collection, DocumentStore, Filter, InsertOutcome, Update},
};

const COLLECTION: Collection = Collection::Subjects;

pub struct SubjectsRepo<S> {
  store: Arc<S>,
}

impl<S> Clone for SubjectsRepo<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

impl<S: DocumentStore> SubjectsRepo<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn get(&self, id: Id) -> Result<Option<Subject>> {
    self.find_one(&Filter::by_id(id)).await
  }

  /// Look a subject up by its unique code, e.g. `"CS101"`.
  pub async fn get_by_code(&self, code: &str) -> Result<Option<Subject>> {
    self.find_one(&Filter::new().eq("code", code)).await
  }

  /// Subjects whose `professor_ids` contain `professor_id`.
  pub async fn list_for_professor(&self, professor_id: Id) -> Result<Vec<Subject>> {
    let filter = Filter::new().eq("professor_ids", professor_id);
    let docs = self.store.find(COLLECTION, &filter).await.map_err(Error::store)?;
    docs.into_iter().map(|d| from_document(COLLECTION, d)).collect()
  }

  /// Create a subject taught by `professor_id`. Fails with
  /// [`Error::AlreadyExists`] if the code is taken.
  pub async fn create(&self, name: &str, code: &str, professor_id: Id) -> Result<Subject> {
    let subject = Subject {
      id:            Id::new(),
      name:          name.to_owned(),
      code:          code.to_owned(),
      professor_ids: BTreeSet::from([professor_id]),
      created_at:    Utc::now(),
    };

    let outcome = self
      .store
      .insert_one(COLLECTION, to_document(&subject)?)
      .await
      .map_err(Error::store)?;

    match outcome {
      InsertOutcome::Inserted => {
        tracing::debug!(subject = %subject.id, code, "created subject");
        Ok(subject)
      }
      InsertOutcome::DuplicateKey => Err(Error::AlreadyExists {
        entity: Entity::Subject,
        key:    code.to_owned(),
      }),
    }
  }

  /// Add `professor_id` to the subject's professors. Adding a professor who
  /// is already present is a no-op.
  pub async fn add_professor(&self, subject_id: Id, professor_id: Id) -> Result<()> {
    let outcome = self
      .store
      .update_one(
        COLLECTION,
        &Filter::by_id(subject_id),
        Update::add_to_set("professor_ids", professor_id),
      )
      .await
      .map_err(Error::store)?;

    if outcome.matched == 0 {
      return Err(Error::NotFound(Entity::Subject));
    }
    Ok(())
  }

  async fn find_one(&self, filter: &Filter) -> Result<Option<Subject>> {
    self
      .store
      .find_one(COLLECTION, filter)
      .await
      .map_err(Error::store)?
      .map(|d| from_document(COLLECTION, d))
      .transpose()
  }
}
