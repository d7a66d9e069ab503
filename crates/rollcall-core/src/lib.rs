//! Core types and trait definitions for the Rollcall attendance backend.
//!
//! This crate is free of HTTP and database dependencies. Storage backends
//! implement [`store::DocumentStore`], ML adapters implement
//! [`biometric::BiometricService`], and the [`attendance::AttendanceService`]
//! orchestrates both.

// Native `async fn` in traits; the trait declarations spell out `Send`.
#![allow(async_fn_in_trait)]

pub mod attendance;
pub mod biometric;
pub mod error;
pub mod guard;
pub mod id;
pub mod memory;
pub mod model;
pub mod repo;
pub mod store;
pub mod token;

pub use error::{AuthError, Entity, Error, Result};
pub use id::Id;
