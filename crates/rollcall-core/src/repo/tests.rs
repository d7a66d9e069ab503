//! Repository tests against [`MemoryStore`], asserting both the returned
//! entities and the exact mutations sent to the store.

use std::sync::Arc;

use chrono::Utc;

use super::*;
use crate::{
  Entity, Id,
  memory::{MemoryStore, Operation},
  model::{Decision, NewAttendance, NewUser, Role},
  store::{Filter, Update},
};

fn repos() -> (Arc<MemoryStore>, Repositories<MemoryStore>) {
  let store = Arc::new(MemoryStore::new());
  (store.clone(), Repositories::new(store))
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_subject_by_code() {
  let (_, r) = repos();
  let pid = Id::new();
  r.subjects.create("CS", "CS101", pid).await.unwrap();

  let found = r.subjects.get_by_code("CS101").await.unwrap().unwrap();
  assert_eq!(found.code, "CS101");
  assert_eq!(found.name, "CS");
}

#[tokio::test]
async fn get_subject_by_code_missing_returns_none() {
  let (_, r) = repos();
  assert!(r.subjects.get_by_code("CS101").await.unwrap().is_none());
}

#[tokio::test]
async fn create_subject_stamps_defaults() {
  let (store, r) = repos();
  let pid = Id::new();

  let subject = r.subjects.create("Math", "M101", pid).await.unwrap();
  assert_eq!(subject.name, "Math");
  assert_eq!(subject.code, "M101");
  assert!(subject.created_at <= Utc::now());
  assert_eq!(subject.professor_ids.iter().copied().collect::<Vec<_>>(), vec![pid]);

  let inserts = store
    .operations()
    .into_iter()
    .filter(|op| matches!(op, Operation::Insert { .. }))
    .count();
  assert_eq!(inserts, 1);

  let stored = r.subjects.get(subject.id).await.unwrap().unwrap();
  assert_eq!(stored.created_at, subject.created_at);
}

#[tokio::test]
async fn create_subject_with_taken_code_fails() {
  let (_, r) = repos();
  r.subjects.create("Math", "M101", Id::new()).await.unwrap();
  let err = r.subjects.create("Maths", "M101", Id::new()).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyExists { entity: Entity::Subject, .. }));
}

#[tokio::test]
async fn add_professor_issues_single_add_to_set() {
  let (store, r) = repos();
  let subject = r.subjects.create("Math", "M101", Id::new()).await.unwrap();
  let pid = Id::new();

  r.subjects.add_professor(subject.id, pid).await.unwrap();

  let last = store.operations().pop().unwrap();
  assert_eq!(last, Operation::Update {
    collection: crate::store::Collection::Subjects,
    filter:     Filter::by_id(subject.id),
    update:     Update::add_to_set("professor_ids", pid),
  });
}

#[tokio::test]
async fn add_professor_twice_keeps_one_entry() {
  let (_, r) = repos();
  let subject = r.subjects.create("Math", "M101", Id::new()).await.unwrap();
  let pid = Id::new();

  r.subjects.add_professor(subject.id, pid).await.unwrap();
  r.subjects.add_professor(subject.id, pid).await.unwrap();

  let stored = r.subjects.get(subject.id).await.unwrap().unwrap();
  assert_eq!(stored.professor_ids.len(), 2);
  assert!(stored.is_taught_by(pid));

  let taught = r.subjects.list_for_professor(pid).await.unwrap();
  assert_eq!(taught.len(), 1);
}

#[tokio::test]
async fn add_professor_to_missing_subject_is_not_found() {
  let (_, r) = repos();
  let err = r.subjects.add_professor(Id::new(), Id::new()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Subject)));
}

// ─── Users ───────────────────────────────────────────────────────────────────

fn new_user(email: &str, role: Role) -> NewUser {
  NewUser {
    name:          "Ada".into(),
    email:         email.into(),
    password_hash: "$argon2id$stub".into(),
    role,
  }
}

#[tokio::test]
async fn users_unique_by_email() {
  let (_, r) = repos();
  r.users.create(new_user("a@example.com", Role::Student)).await.unwrap();
  let err = r.users.create(new_user("a@example.com", Role::Professor)).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyExists { entity: Entity::User, .. }));
}

#[tokio::test]
async fn set_role_updates_only_role() {
  let (_, r) = repos();
  let user = r.users.create(new_user("a@example.com", Role::Student)).await.unwrap();

  r.users.set_role(user.id, Role::Professor).await.unwrap();

  let stored = r.users.get_by_email("a@example.com").await.unwrap().unwrap();
  assert_eq!(stored.role, Role::Professor);
  assert_eq!(stored.password_hash, user.password_hash);
}

// ─── Students ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn student_without_embedding_omits_field() {
  let (store, r) = repos();
  r.students.create(Id::new(), None).await.unwrap();

  let Some(Operation::Insert { doc, .. }) = store.operations().pop() else {
    panic!("expected an insert");
  };
  assert!(!doc.contains_key("face_embedding"));
}

#[tokio::test]
async fn face_embedding_is_set_once() {
  let (_, r) = repos();
  let student = r.students.create(Id::new(), None).await.unwrap();

  r.students.set_face_embedding(student.id, vec![0.5; 4]).await.unwrap();
  let err = r
    .students
    .set_face_embedding(student.id, vec![0.25; 4])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EmbeddingAlreadySet(id) if id == student.id));

  let stored = r.students.get(student.id).await.unwrap().unwrap();
  assert_eq!(stored.face_embedding, Some(vec![0.5; 4]));

  let missing = r.students.set_face_embedding(Id::new(), vec![0.5]).await.unwrap_err();
  assert!(matches!(missing, Error::NotFound(Entity::Student)));
}

#[tokio::test]
async fn enroll_is_idempotent_and_listable() {
  let (_, r) = repos();
  let student = r.students.create(Id::new(), None).await.unwrap();
  let subject_id = Id::new();

  r.students.enroll(student.id, subject_id).await.unwrap();
  r.students.enroll(student.id, subject_id).await.unwrap();

  let stored = r.students.get_by_user(student.user_id).await.unwrap().unwrap();
  assert_eq!(stored.enrolled_subject_ids.len(), 1);
  assert!(stored.is_enrolled_in(subject_id));

  let roster = r.students.list_enrolled(subject_id).await.unwrap();
  assert_eq!(roster.len(), 1);
}

// ─── Attendance ──────────────────────────────────────────────────────────────

fn attendance(student_id: Id, subject_id: Id, decision: Decision) -> NewAttendance {
  NewAttendance {
    subject_id,
    student_id,
    session_id: "2024-03-01".into(),
    timestamp: Utc::now(),
    decision,
    score: None,
  }
}

#[tokio::test]
async fn second_record_for_session_returns_first() {
  let (store, r) = repos();
  let (student, subject) = (Id::new(), Id::new());

  let first = r.attendance.record(attendance(student, subject, Decision::Present)).await.unwrap();
  let second = r
    .attendance
    .record(attendance(student, subject, Decision::Rejected))
    .await
    .unwrap();

  assert!(!first.is_duplicate());
  assert!(second.is_duplicate());
  assert_eq!(second.record(), first.record());
  assert_eq!(second.into_record().decision, Decision::Present);
  assert_eq!(store.count(crate::store::Collection::Attendance), 1);
}

#[tokio::test]
async fn list_attendance_by_session() {
  let (_, r) = repos();
  let subject = Id::new();
  let student = Id::new();

  r.attendance.record(attendance(student, subject, Decision::Present)).await.unwrap();
  let mut next = attendance(student, subject, Decision::Rejected);
  next.session_id = "2024-03-08".into();
  r.attendance.record(next).await.unwrap();

  assert_eq!(r.attendance.list(subject, None).await.unwrap().len(), 2);
  assert_eq!(r.attendance.list(subject, Some("2024-03-08")).await.unwrap().len(), 1);
  assert_eq!(r.attendance.list_for_student(student).await.unwrap().len(), 2);
  assert!(
    r.attendance
      .find_for_session(student, subject, "2024-03-15")
      .await
      .unwrap()
      .is_none()
  );
}
