//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::Utc;
use rollcall_core::{
  Entity, Error as CoreError, Id,
  model::{Decision, NewAttendance, NewUser, Role},
  repo::Repositories,
  store::{Collection, Document, DocumentStore, Filter, InsertOutcome, Update},
};
use serde_json::json;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn repos() -> Repositories<SqliteStore> { Repositories::new(Arc::new(store().await)) }

fn doc(v: serde_json::Value) -> Document { v.as_object().cloned().unwrap() }

// ─── Raw documents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_roundtrip() {
  let s = store().await;
  let d = doc(json!({ "_id": "a1", "code": "CS101", "professor_ids": ["p1"] }));

  let outcome = s.insert_one(Collection::Subjects, d.clone()).await.unwrap();
  assert_eq!(outcome, InsertOutcome::Inserted);

  let found = s
    .find_one(Collection::Subjects, &Filter::new().eq("code", "CS101"))
    .await
    .unwrap();
  assert_eq!(found, Some(d));
}

#[tokio::test]
async fn find_one_missing_returns_none() {
  let s = store().await;
  let found = s
    .find_one(Collection::Subjects, &Filter::new().eq("code", "NOPE"))
    .await
    .unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn duplicate_id_and_unique_key_are_reported() {
  let s = store().await;
  s.insert_one(Collection::Users, doc(json!({ "_id": "u1", "email": "a@x" })))
    .await
    .unwrap();

  let same_id = s
    .insert_one(Collection::Users, doc(json!({ "_id": "u1", "email": "b@x" })))
    .await
    .unwrap();
  let same_email = s
    .insert_one(Collection::Users, doc(json!({ "_id": "u2", "email": "a@x" })))
    .await
    .unwrap();

  assert_eq!(same_id, InsertOutcome::DuplicateKey);
  assert_eq!(same_email, InsertOutcome::DuplicateKey);
  assert_eq!(s.find(Collection::Users, &Filter::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn insert_without_id_is_an_error() {
  let s = store().await;
  let err = s
    .insert_one(Collection::Users, doc(json!({ "email": "a@x" })))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::MissingId(Collection::Users)));
}

#[tokio::test]
async fn eq_matches_array_members() {
  let s = store().await;
  s.insert_one(Collection::Students, doc(json!({ "_id": "s1", "user_id": "u1", "enrolled_subject_ids": ["c1", "c2"] })))
    .await
    .unwrap();
  s.insert_one(Collection::Students, doc(json!({ "_id": "s2", "user_id": "u2", "enrolled_subject_ids": ["c2"] })))
    .await
    .unwrap();

  let c1 = s
    .find(Collection::Students, &Filter::new().eq("enrolled_subject_ids", "c1"))
    .await
    .unwrap();
  let c2 = s
    .find(Collection::Students, &Filter::new().eq("enrolled_subject_ids", "c2"))
    .await
    .unwrap();

  assert_eq!(c1.len(), 1);
  assert_eq!(c2.len(), 2);
  assert_eq!(c2[0]["_id"], json!("s1"));
}

#[tokio::test]
async fn add_to_set_does_not_duplicate() {
  let s = store().await;
  s.insert_one(Collection::Subjects, doc(json!({ "_id": "c1", "code": "M101", "professor_ids": ["p1"] })))
    .await
    .unwrap();

  let filter = Filter::new().eq("_id", "c1");
  let first = s
    .update_one(Collection::Subjects, &filter, Update::add_to_set("professor_ids", "p2"))
    .await
    .unwrap();
  let second = s
    .update_one(Collection::Subjects, &filter, Update::add_to_set("professor_ids", "p2"))
    .await
    .unwrap();

  assert_eq!((first.matched, first.modified), (1, 1));
  assert_eq!((second.matched, second.modified), (1, 0));

  let stored = s.find_one(Collection::Subjects, &filter).await.unwrap().unwrap();
  assert_eq!(stored["professor_ids"], json!(["p1", "p2"]));
}

#[tokio::test]
async fn conditional_set_respects_exists_filter() {
  let s = store().await;
  s.insert_one(Collection::Students, doc(json!({ "_id": "s1", "user_id": "u1" })))
    .await
    .unwrap();

  let filter = Filter::new().eq("_id", "s1").exists("face_embedding", false);
  let first = s
    .update_one(Collection::Students, &filter, Update::set("face_embedding", json!([0.5, 0.25])))
    .await
    .unwrap();
  let second = s
    .update_one(Collection::Students, &filter, Update::set("face_embedding", json!([1.0])))
    .await
    .unwrap();

  assert_eq!(first.matched, 1);
  assert_eq!(second.matched, 0);
}

// ─── Through the repositories ────────────────────────────────────────────────

#[tokio::test]
async fn subject_lifecycle() {
  let r = repos().await;
  let pid = Id::new();

  let subject = r.subjects.create("Math", "M101", pid).await.unwrap();
  assert!(subject.is_taught_by(pid));

  let other = Id::new();
  r.subjects.add_professor(subject.id, other).await.unwrap();
  r.subjects.add_professor(subject.id, other).await.unwrap();

  let stored = r.subjects.get_by_code("M101").await.unwrap().unwrap();
  assert_eq!(stored.id, subject.id);
  assert_eq!(stored.professor_ids.len(), 2);
  assert_eq!(stored.created_at, subject.created_at);

  let taught = r.subjects.list_for_professor(other).await.unwrap();
  assert_eq!(taught.len(), 1);

  let dup = r.subjects.create("Maths", "M101", pid).await.unwrap_err();
  assert!(matches!(dup, CoreError::AlreadyExists { entity: Entity::Subject, .. }));
}

#[tokio::test]
async fn user_role_change_persists() {
  let r = repos().await;
  let user = r
    .users
    .create(NewUser {
      name:          "Grace".into(),
      email:         "grace@example.com".into(),
      password_hash: "$argon2id$stub".into(),
      role:          Role::Student,
    })
    .await
    .unwrap();

  r.users.set_role(user.id, Role::Admin).await.unwrap();
  let stored = r.users.get(user.id).await.unwrap().unwrap();
  assert_eq!(stored.role, Role::Admin);
}

#[tokio::test]
async fn face_embedding_written_once() {
  let r = repos().await;
  let student = r.students.create(Id::new(), None).await.unwrap();

  r.students.set_face_embedding(student.id, vec![0.5, 0.25]).await.unwrap();
  let err = r.students.set_face_embedding(student.id, vec![1.0]).await.unwrap_err();
  assert!(matches!(err, CoreError::EmbeddingAlreadySet(_)));

  let stored = r.students.get(student.id).await.unwrap().unwrap();
  assert_eq!(stored.face_embedding, Some(vec![0.5, 0.25]));
}

#[tokio::test]
async fn one_attendance_record_per_session() {
  let r = repos().await;
  let (student, subject) = (Id::new(), Id::new());
  let input = NewAttendance {
    subject_id: subject,
    student_id: student,
    session_id: "2024-03-01".into(),
    timestamp:  Utc::now(),
    decision:   Decision::Present,
    score:      Some(0.9),
  };

  let first = r.attendance.record(input.clone()).await.unwrap();
  let second = r.attendance.record(input).await.unwrap();

  assert!(!first.is_duplicate());
  assert!(second.is_duplicate());
  assert_eq!(second.record().id, first.record().id);
  assert_eq!(r.attendance.list(subject, Some("2024-03-01")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_attendance_inserts_race_to_one_row() {
  let r = repos().await;
  let (student, subject) = (Id::new(), Id::new());

  let tasks = (0..8).map(|i| {
    let attendance = r.attendance.clone();
    tokio::spawn(async move {
      attendance
        .record(NewAttendance {
          subject_id: subject,
          student_id: student,
          session_id: "2024-03-01".into(),
          timestamp:  Utc::now(),
          decision:   if i % 2 == 0 { Decision::Present } else { Decision::Rejected },
          score:      None,
        })
        .await
    })
  });

  let mut created = 0;
  for task in tasks.collect::<Vec<_>>() {
    if !task.await.unwrap().unwrap().is_duplicate() {
      created += 1;
    }
  }

  assert_eq!(created, 1);
  assert_eq!(r.attendance.list_for_student(student).await.unwrap().len(), 1);
}
