//! SQL schema for the Rollcall SQLite store.
//!
//! Tables and unique indexes are derived from [`Collection::ALL`] and
//! [`Collection::unique_keys`], so the database enforces exactly the keys the
//! core declares. Executed once at connection startup; idempotent thanks to
//! `IF NOT EXISTS`.

use rollcall_core::store::Collection;

const PRELUDE: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Full schema DDL.
pub fn ddl() -> String {
  let mut sql = String::from(PRELUDE);

  for collection in Collection::ALL {
    let table = collection.as_ref();
    // Documents are JSON objects; `id` mirrors the body's `_id`.
    sql.push_str(&format!(
      "CREATE TABLE IF NOT EXISTS {table} (
    id    TEXT PRIMARY KEY,
    body  TEXT NOT NULL CHECK (json_valid(body))
);
"
    ));

    for fields in collection.unique_keys() {
      let name = format!("{table}_{}_key", fields.join("_"));
      let columns = fields
        .iter()
        .map(|f| format!("json_extract(body, '$.{f}')"))
        .collect::<Vec<_>>()
        .join(", ");
      sql.push_str(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON {table} ({columns});\n"
      ));
    }
  }

  sql.push_str("PRAGMA user_version = 1;\n");
  sql
}
