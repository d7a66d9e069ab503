//! The verified-attendance pipeline.
//!
//! An attempt moves through
//! `Authenticating -> Resolving -> Encoding -> Matching -> Recording` and ends
//! either `Accepted` or `Rejected`, both of which persist a record, or fails
//! with an [`Error`] and persists nothing. The only write is a single
//! conditional insert, so an attempt cancelled or failed at any earlier stage
//! can be resubmitted unchanged.

use std::{future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::Utc;

use crate::{
  Entity, Error, Id, Result,
  biometric::BiometricService,
  guard::{self, Operation, Scope},
  model::{AttendanceRecord, Decision, NewAttendance},
  repo::{Recorded, Repositories},
  store::DocumentStore,
  token::{Principal, TokenCodec},
};

/// Default bound on each biometric call.
pub const DEFAULT_BIOMETRIC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
  Authenticating,
  Resolving,
  Encoding,
  Matching,
  Recording,
}

/// How the caller proves the student's presence.
#[derive(Debug, Clone)]
pub enum Evidence {
  /// A raw image, encoded remotely before matching.
  Image(Bytes),
  /// An embedding the caller already computed.
  Embedding(Vec<f32>),
}

#[derive(Debug, Clone)]
pub struct AttendanceRequest {
  pub subject_id: Id,
  pub student_id: Id,
  pub session_id: String,
  pub evidence:   Evidence,
}

/// A completed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
  pub record:    AttendanceRecord,
  /// `true` when the session was already recorded and `record` is the
  /// earlier result.
  pub duplicate: bool,
}

impl Attempt {
  pub fn is_accepted(&self) -> bool { self.record.decision == Decision::Present }
}

impl From<Recorded> for Attempt {
  fn from(recorded: Recorded) -> Self {
    let duplicate = recorded.is_duplicate();
    Self { record: recorded.into_record(), duplicate }
  }
}

pub struct AttendanceService<S, B> {
  repos:     Repositories<S>,
  tokens:    Arc<TokenCodec>,
  biometric: Arc<B>,
  timeout:   Duration,
}

impl<S, B> AttendanceService<S, B>
where
  S: DocumentStore,
  B: BiometricService,
{
  pub fn new(repos: Repositories<S>, tokens: Arc<TokenCodec>, biometric: Arc<B>) -> Self {
    Self { repos, tokens, biometric, timeout: DEFAULT_BIOMETRIC_TIMEOUT }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn repos(&self) -> &Repositories<S> { &self.repos }

  pub fn tokens(&self) -> &TokenCodec { &self.tokens }

  /// Run the full pipeline for a bearer token.
  pub async fn submit(&self, token: &str, request: AttendanceRequest) -> Result<Attempt> {
    let claims = self
      .tokens
      .verify(token)
      .map_err(|e| fail(Stage::Authenticating, e.into()))?;
    self.submit_as(&claims.principal(), request).await
  }

  /// Run the pipeline for an already authenticated principal.
  pub async fn submit_as(&self, principal: &Principal, request: AttendanceRequest) -> Result<Attempt> {
    let started = Utc::now();
    guard::require(principal, Operation::SubmitAttendance)
      .map_err(|e| fail(Stage::Authenticating, e))?;

    // ── Resolving ───────────────────────────────────────────────────────────
    tracing::debug!(stage = %Stage::Resolving, subject = %request.subject_id, student = %request.student_id);
    let subject = self
      .repos
      .subjects
      .get(request.subject_id)
      .await
      .and_then(|s| s.ok_or(Error::NotFound(Entity::Subject)))
      .map_err(|e| fail(Stage::Resolving, e))?;
    let student = self
      .repos
      .students
      .get(request.student_id)
      .await
      .and_then(|s| s.ok_or(Error::NotFound(Entity::Student)))
      .map_err(|e| fail(Stage::Resolving, e))?;

    guard::authorize(principal, Scope::StudentInSubject { student: &student, subject: &subject })
      .map_err(|e| fail(Stage::Resolving, e))?;
    if !student.is_enrolled_in(subject.id) {
      return Err(fail(Stage::Resolving, Error::Forbidden));
    }

    if let Some(existing) = self
      .repos
      .attendance
      .find_for_session(student.id, subject.id, &request.session_id)
      .await
      .map_err(|e| fail(Stage::Resolving, e))?
    {
      tracing::info!(record = %existing.id, "attendance already recorded for session");
      return Ok(Attempt { record: existing, duplicate: true });
    }

    // ── Encoding ────────────────────────────────────────────────────────────
    let candidate = match request.evidence {
      Evidence::Embedding(embedding) => embedding,
      Evidence::Image(image) => {
        tracing::debug!(stage = %Stage::Encoding, bytes = image.len());
        let encoding = self
          .remote(self.biometric.encode_face(image))
          .await
          .map_err(|e| fail(Stage::Encoding, e))?;
        if !encoding.success {
          return Err(fail(Stage::Encoding, Error::EncodingRejected));
        }
        encoding.embedding
      }
    };

    // ── Matching ────────────────────────────────────────────────────────────
    tracing::debug!(stage = %Stage::Matching);
    let reference = student
      .face_embedding
      .as_deref()
      .ok_or_else(|| fail(Stage::Matching, Error::NoEnrollmentEmbedding))?;
    let verdict = self
      .remote(self.biometric.match_face(&candidate, reference))
      .await
      .map_err(|e| fail(Stage::Matching, e))?;

    // ── Recording ───────────────────────────────────────────────────────────
    let decision = if verdict.matched { Decision::Present } else { Decision::Rejected };
    tracing::debug!(stage = %Stage::Recording, %decision);
    let recorded = self
      .repos
      .attendance
      .record(NewAttendance {
        subject_id: subject.id,
        student_id: student.id,
        session_id: request.session_id,
        timestamp:  started,
        decision,
        score:      verdict.score,
      })
      .await
      .map_err(|e| fail(Stage::Recording, e))?;

    let attempt = Attempt::from(recorded);
    tracing::info!(
      record = %attempt.record.id,
      decision = %attempt.record.decision,
      duplicate = attempt.duplicate,
      "attendance attempt complete"
    );
    Ok(attempt)
  }

  /// Encode `image` and store it as the caller's reference embedding.
  ///
  /// The embedding is written once; a second enrollment fails with
  /// [`Error::EmbeddingAlreadySet`] before the image is sent anywhere.
  pub async fn enroll_face(&self, principal: &Principal, image: Bytes) -> Result<()> {
    guard::require(principal, Operation::EnrollFace)?;
    let student = self
      .repos
      .students
      .get_by_user(principal.id)
      .await?
      .ok_or(Error::NotFound(Entity::Student))?;
    guard::authorize(principal, Scope::Student(&student))?;
    if student.face_embedding.is_some() {
      return Err(Error::EmbeddingAlreadySet(student.id));
    }

    let encoding = self.remote(self.biometric.encode_face(image)).await?;
    if !encoding.success {
      return Err(Error::EncodingRejected);
    }
    self.repos.students.set_face_embedding(student.id, encoding.embedding).await?;
    tracing::info!(student = %student.id, "face embedding enrolled");
    Ok(())
  }

  /// Await a biometric call under the configured timeout, folding transport
  /// failures and timeouts into [`Error::BiometricUnavailable`].
  async fn remote<T>(
    &self,
    call: impl Future<Output = Result<T, B::Error>>,
  ) -> Result<T> {
    match tokio::time::timeout(self.timeout, call).await {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(e)) => Err(Error::BiometricUnavailable(e.to_string())),
      Err(_) => Err(Error::BiometricUnavailable(format!(
        "no response within {:?}",
        self.timeout
      ))),
    }
  }
}

fn fail(stage: Stage, error: Error) -> Error {
  tracing::warn!(%stage, %error, retryable = error.is_retryable(), "attendance attempt failed");
  error
}
