//! [`SqliteStore`]: the SQLite implementation of [`DocumentStore`].

use std::path::Path;

use rollcall_core::store::{
  Collection, Document, DocumentStore, Filter, InsertOutcome, Update, UpdateOutcome,
};
use rusqlite::{OptionalExtension as _, ffi, params_from_iter};

use crate::{
  Error, Result,
  encode::{WhereClause, compile_filter, decode_document, encode_document},
  schema,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let ddl = schema::ddl();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    tracing::debug!("sqlite schema initialised");
    Ok(())
  }

  /// Run a `SELECT body` over `collection` and decode every row.
  async fn select(
    &self,
    collection: Collection,
    filter: &Filter,
    limit: Option<u32>,
  ) -> Result<Vec<Document>> {
    let WhereClause { sql: where_sql, params } = compile_filter(filter)?;
    let limit_sql = limit.map(|n| format!("LIMIT {n}")).unwrap_or_default();
    let sql = format!(
      "SELECT body FROM {} {where_sql} ORDER BY rowid {limit_sql}",
      collection.as_ref()
    );

    let bodies: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params.iter()), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    bodies.iter().map(|b| decode_document(b)).collect()
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>> {
    Ok(self.select(collection, filter, Some(1)).await?.into_iter().next())
  }

  async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
    self.select(collection, filter, None).await
  }

  async fn insert_one(&self, collection: Collection, doc: Document) -> Result<InsertOutcome> {
    let id = doc
      .get("_id")
      .and_then(|v| v.as_str())
      .ok_or(Error::MissingId(collection))?
      .to_owned();
    let body = encode_document(&doc)?;
    let sql = format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", collection.as_ref());

    let outcome = self
      .conn
      .call(move |conn| match conn.execute(&sql, rusqlite::params![id, body]) {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(rusqlite::Error::SqliteFailure(e, _)) if is_key_violation(&e) => {
          Ok(InsertOutcome::DuplicateKey)
        }
        Err(e) => Err(e.into()),
      })
      .await?;

    if outcome == InsertOutcome::DuplicateKey {
      tracing::debug!(%collection, "insert rejected by unique key");
    }
    Ok(outcome)
  }

  async fn update_one(
    &self,
    collection: Collection,
    filter: &Filter,
    update: Update,
  ) -> Result<UpdateOutcome> {
    let WhereClause { sql: where_sql, params } = compile_filter(filter)?;
    let table = collection.as_ref();
    let select = format!("SELECT id, body FROM {table} {where_sql} ORDER BY rowid LIMIT 1");
    let write = format!("UPDATE {table} SET body = ?1 WHERE id = ?2");

    // Read, mutate and write inside one transaction on the connection thread,
    // so no other store call can interleave.
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let row: Option<(String, String)> = tx
          .query_row(&select, params_from_iter(params.iter()), |r| {
            Ok((r.get(0)?, r.get(1)?))
          })
          .optional()?;

        let Some((id, body)) = row else {
          return Ok(UpdateOutcome::default());
        };

        let mut doc = decode_document(&body).map_err(other)?;
        if !update.apply(&mut doc) {
          return Ok(UpdateOutcome { matched: 1, modified: 0 });
        }

        let body = encode_document(&doc).map_err(other)?;
        tx.execute(&write, rusqlite::params![body, id])?;
        tx.commit()?;
        Ok(UpdateOutcome { matched: 1, modified: 1 })
      })
      .await?;

    Ok(outcome)
  }
}

/// `UNIQUE` and `PRIMARY KEY` violations; other constraint failures are real
/// errors.
fn is_key_violation(e: &ffi::Error) -> bool {
  matches!(
    e.extended_code,
    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

fn other(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }
