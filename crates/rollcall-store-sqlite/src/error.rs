//! Error type for `rollcall-store-sqlite`.

use rollcall_core::store::Collection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("document inserted into {0} has no string `_id`")]
  MissingId(Collection),

  #[error("unsupported filter value for field {field:?}: {value}")]
  UnsupportedFilter { field: String, value: serde_json::Value },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
