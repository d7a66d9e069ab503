//! The `DocumentStore` trait and the filter/update vocabulary it speaks.
//!
//! Repositories in [`crate::repo`] are the only callers. Backends implement
//! four primitive operations over schemaless JSON documents and must enforce
//! the unique keys declared by [`Collection::unique_keys`].

use std::future::Future;

use serde_json::Value;

/// A stored document: a JSON object whose `_id` field holds a hex [`Id`].
///
/// [`Id`]: crate::Id
pub type Document = serde_json::Map<String, Value>;

// ─── Collections ─────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Collection {
  Users,
  Students,
  Subjects,
  Attendance,
}

impl Collection {
  pub const ALL: [Collection; 4] = [
    Collection::Users,
    Collection::Students,
    Collection::Subjects,
    Collection::Attendance,
  ];

  /// Field tuples that must be unique across the collection, in addition to
  /// `_id`.
  pub fn unique_keys(self) -> &'static [&'static [&'static str]] {
    match self {
      Self::Users => &[&["email"]],
      Self::Students => &[&["user_id"]],
      Self::Subjects => &[&["code"]],
      Self::Attendance => &[&["student_id", "subject_id", "session_id"]],
    }
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
  /// The field equals the value, or the field is an array containing it.
  Eq(Value),
  /// The field is present (`true`) or absent (`false`).
  Exists(bool),
}

/// A conjunction of per-field conditions. The empty filter matches every
/// document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
  clauses: Vec<(String, Condition)>,
}

impl Filter {
  pub fn new() -> Self { Self::default() }

  pub fn by_id(id: crate::Id) -> Self { Self::new().eq("_id", id) }

  pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.clauses.push((field.into(), Condition::Eq(value.into())));
    self
  }

  pub fn exists(mut self, field: impl Into<String>, present: bool) -> Self {
    self.clauses.push((field.into(), Condition::Exists(present)));
    self
  }

  pub fn clauses(&self) -> &[(String, Condition)] { &self.clauses }

  /// Evaluate the filter against a document in memory.
  pub fn matches(&self, doc: &Document) -> bool {
    self.clauses.iter().all(|(field, cond)| match cond {
      Condition::Exists(present) => doc.contains_key(field) == *present,
      Condition::Eq(expected) => match doc.get(field) {
        Some(Value::Array(items)) if !expected.is_array() => {
          items.contains(expected)
        }
        Some(actual) => actual == expected,
        None => false,
      },
    })
  }
}

// ─── Updates ─────────────────────────────────────────────────────────────────

/// A single-field mutation applied atomically by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
  /// Overwrite (or create) one field.
  Set { field: String, value: Value },
  /// Append to an array field unless an equal element is already present.
  /// A missing field is treated as an empty array.
  AddToSet { field: String, value: Value },
}

impl Update {
  pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::Set { field: field.into(), value: value.into() }
  }

  pub fn add_to_set(field: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::AddToSet { field: field.into(), value: value.into() }
  }

  /// Apply the mutation to `doc`, returning whether anything changed.
  ///
  /// `AddToSet` on a field holding a non-array value replaces it with a
  /// one-element array.
  pub fn apply(&self, doc: &mut Document) -> bool {
    match self {
      Self::Set { field, value } => {
        if doc.get(field) == Some(value) {
          return false;
        }
        doc.insert(field.clone(), value.clone());
        true
      }
      Self::AddToSet { field, value } => match doc.get_mut(field) {
        Some(Value::Array(items)) => {
          if items.contains(value) {
            false
          } else {
            items.push(value.clone());
            true
          }
        }
        _ => {
          doc.insert(field.clone(), Value::Array(vec![value.clone()]));
          true
        }
      },
    }
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
  Inserted,
  /// A document with the same `_id` or unique key already exists; nothing
  /// was written.
  DuplicateKey,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
  pub matched:  u64,
  pub modified: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a document store backend.
///
/// Every method is a single atomic operation. In particular `update_one`
/// must never interleave with another write to the same document, and
/// `insert_one` must check unique keys and write in one step.
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Return the first document matching `filter`, or `None`.
  fn find_one<'a>(
    &'a self,
    collection: Collection,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// Return every document matching `filter`, in insertion order.
  fn find<'a>(
    &'a self,
    collection: Collection,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + 'a;

  /// Insert `doc`, which must carry an `_id`.
  fn insert_one(
    &self,
    collection: Collection,
    doc: Document,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// Apply `update` to the first document matching `filter`.
  fn update_one<'a>(
    &'a self,
    collection: Collection,
    filter: &'a Filter,
    update: Update,
  ) -> impl Future<Output = Result<UpdateOutcome, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc(v: Value) -> Document { v.as_object().cloned().unwrap() }

  #[test]
  fn eq_matches_scalars_and_array_members() {
    let d = doc(json!({ "code": "CS101", "professor_ids": ["a", "b"] }));
    assert!(Filter::new().eq("code", "CS101").matches(&d));
    assert!(!Filter::new().eq("code", "CS102").matches(&d));
    assert!(Filter::new().eq("professor_ids", "b").matches(&d));
    assert!(!Filter::new().eq("professor_ids", "c").matches(&d));
    assert!(!Filter::new().eq("missing", "x").matches(&d));
  }

  #[test]
  fn exists_checks_presence() {
    let d = doc(json!({ "user_id": "u" }));
    assert!(Filter::new().exists("face_embedding", false).matches(&d));
    assert!(!Filter::new().exists("face_embedding", true).matches(&d));
  }

  #[test]
  fn add_to_set_is_idempotent() {
    let mut d = doc(json!({ "professor_ids": ["a"] }));
    let update = Update::add_to_set("professor_ids", "b");
    assert!(update.apply(&mut d));
    assert!(!update.apply(&mut d));
    assert_eq!(d["professor_ids"], json!(["a", "b"]));
  }

  #[test]
  fn add_to_set_creates_missing_field() {
    let mut d = doc(json!({}));
    assert!(Update::add_to_set("enrolled_subject_ids", "s").apply(&mut d));
    assert_eq!(d["enrolled_subject_ids"], json!(["s"]));
  }

  #[test]
  fn set_reports_no_change_for_equal_value() {
    let mut d = doc(json!({ "role": "student" }));
    assert!(!Update::set("role", "student").apply(&mut d));
    assert!(Update::set("role", "admin").apply(&mut d));
    assert_eq!(d["role"], json!("admin"));
  }
}
