//! [`MemoryStore`]: an in-process [`DocumentStore`].
//!
//! Every operation runs under one mutex, which makes each call trivially
//! atomic. The store also keeps a journal of the write operations it has
//! received so tests can assert on exactly which mutations a repository
//! issued.

use std::{
  collections::HashMap,
  convert::Infallible,
  sync::{Mutex, MutexGuard},
};

use serde_json::Value;

use crate::store::{
  Collection, Document, DocumentStore, Filter, InsertOutcome, Update,
  UpdateOutcome,
};

/// A write received by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
  Insert { collection: Collection, doc: Document },
  Update { collection: Collection, filter: Filter, update: Update },
}

#[derive(Default)]
struct Inner {
  collections: HashMap<Collection, Vec<Document>>,
  journal:     Vec<Operation>,
}

#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // A panic while holding the lock cannot leave a half-applied write:
    // every mutation is a single push or field insert.
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Writes received so far, oldest first.
  pub fn operations(&self) -> Vec<Operation> { self.lock().journal.clone() }

  /// Number of documents currently stored in `collection`.
  pub fn count(&self, collection: Collection) -> usize {
    self.lock().collections.get(&collection).map_or(0, Vec::len)
  }
}

fn key_of<'d>(doc: &'d Document, fields: &[&str]) -> Option<Vec<&'d Value>> {
  fields.iter().map(|f| doc.get(*f)).collect()
}

fn collides(collection: Collection, existing: &Document, doc: &Document) -> bool {
  if existing.get("_id") == doc.get("_id") {
    return true;
  }
  collection.unique_keys().iter().any(|fields| {
    match (key_of(existing, fields), key_of(doc, fields)) {
      (Some(a), Some(b)) => a == b,
      _ => false,
    }
  })
}

impl DocumentStore for MemoryStore {
  type Error = Infallible;

  async fn find_one(
    &self,
    collection: Collection,
    filter: &Filter,
  ) -> Result<Option<Document>, Infallible> {
    let inner = self.lock();
    Ok(
      inner
        .collections
        .get(&collection)
        .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
        .cloned(),
    )
  }

  async fn find(
    &self,
    collection: Collection,
    filter: &Filter,
  ) -> Result<Vec<Document>, Infallible> {
    let inner = self.lock();
    Ok(
      inner
        .collections
        .get(&collection)
        .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
        .unwrap_or_default(),
    )
  }

  async fn insert_one(
    &self,
    collection: Collection,
    doc: Document,
  ) -> Result<InsertOutcome, Infallible> {
    let mut inner = self.lock();
    inner.journal.push(Operation::Insert { collection, doc: doc.clone() });

    let docs = inner.collections.entry(collection).or_default();
    if docs.iter().any(|existing| collides(collection, existing, &doc)) {
      return Ok(InsertOutcome::DuplicateKey);
    }
    docs.push(doc);
    Ok(InsertOutcome::Inserted)
  }

  async fn update_one(
    &self,
    collection: Collection,
    filter: &Filter,
    update: Update,
  ) -> Result<UpdateOutcome, Infallible> {
    let mut inner = self.lock();
    inner.journal.push(Operation::Update {
      collection,
      filter: filter.clone(),
      update: update.clone(),
    });

    let target = inner
      .collections
      .get_mut(&collection)
      .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)));

    Ok(match target {
      Some(doc) => UpdateOutcome {
        matched:  1,
        modified: u64::from(update.apply(doc)),
      },
      None => UpdateOutcome::default(),
    })
  }
}
