//! Role-based authorization.
//!
//! Authorization happens in two stages:
//!
//! 1. [`permits`] is a pure role gate. Callers check it before touching the
//!    store, so a student asking to create a subject costs nothing.
//! 2. [`authorize`] checks ownership once the resource has been resolved,
//!    and always before any biometric call.
//!
//! | operation          | student | professor | admin |
//! |--------------------|---------|-----------|-------|
//! | `SubmitAttendance` | yes     | yes       | yes   |
//! | `CreateSubject`    | no      | yes       | yes   |
//! | `ManageSubject`    | no      | yes       | yes   |
//! | `EnrollFace`       | yes     | no        | yes   |
//! | `AssignRole`       | no      | no        | yes   |

use crate::{
  Error, Result,
  model::{Role, Student, Subject},
  token::Principal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  SubmitAttendance,
  CreateSubject,
  /// Add professors, enroll students, read session attendance.
  ManageSubject,
  EnrollFace,
  AssignRole,
}

/// A resolved resource the principal wants to act on.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
  /// Act on behalf of a specific student within a subject.
  StudentInSubject { student: &'a Student, subject: &'a Subject },
  /// Act on a subject as a whole.
  Subject(&'a Subject),
  /// Act on a student profile outside any subject.
  Student(&'a Student),
}

/// Stage one: does `role` allow `operation` at all?
pub fn permits(role: Role, operation: Operation) -> bool {
  match (role, operation) {
    (Role::Admin, _) => true,
    (_, Operation::SubmitAttendance) => true,
    (Role::Professor, Operation::CreateSubject | Operation::ManageSubject) => true,
    (Role::Student, Operation::EnrollFace) => true,
    _ => false,
  }
}

/// Stage one, as a `Result` for `?`.
pub fn require(principal: &Principal, operation: Operation) -> Result<()> {
  if permits(principal.role, operation) {
    Ok(())
  } else {
    tracing::debug!(
      principal = %principal.id,
      role = %principal.role,
      ?operation,
      "operation not permitted for role"
    );
    Err(Error::Forbidden)
  }
}

/// Stage two: is `principal` scoped to `scope`?
pub fn authorize(principal: &Principal, scope: Scope<'_>) -> Result<()> {
  let allowed = match (principal.role, scope) {
    (Role::Admin, _) => true,
    (Role::Student, Scope::StudentInSubject { student, .. } | Scope::Student(student)) => {
      student.user_id == principal.id
    }
    (Role::Student, Scope::Subject(_)) => false,
    (Role::Professor, Scope::StudentInSubject { subject, .. } | Scope::Subject(subject)) => {
      subject.is_taught_by(principal.id)
    }
    (Role::Professor, Scope::Student(_)) => false,
  };

  if allowed {
    Ok(())
  } else {
    tracing::debug!(principal = %principal.id, role = %principal.role, "out of scope");
    Err(Error::Forbidden)
  }
}
