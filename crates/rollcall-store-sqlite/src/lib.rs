//! SQLite backend for the Rollcall document store.
//!
//! Each collection is a two-column table holding the document `_id` and its
//! JSON body. Unique keys are expression indexes over `json_extract`, so the
//! database itself rejects a second attendance record for the same session.
//! All access runs on [`tokio_rusqlite`]'s dedicated thread.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
