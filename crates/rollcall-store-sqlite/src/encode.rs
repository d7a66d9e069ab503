//! Translation between the core document vocabulary and SQL.
//!
//! Filters become `WHERE` clauses over the JSON body. Equality uses
//! `json_each`, which yields the value itself for a scalar field and the
//! elements for an array field, giving the same "equals or contains"
//! semantics as [`Filter::matches`].

use rollcall_core::store::{Condition, Document, Filter};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::{Error, Result};

/// A compiled `WHERE` clause and its positional parameters.
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
  pub sql:    String,
  pub params: Vec<SqlValue>,
}

/// Map a scalar JSON value onto the SQL value `json_each` reports for it.
fn scalar(field: &str, value: &Value) -> Result<SqlValue> {
  match value {
    Value::String(s) => Ok(SqlValue::Text(s.clone())),
    Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
    Value::Number(n) => match (n.as_i64(), n.as_f64()) {
      (Some(i), _) => Ok(SqlValue::Integer(i)),
      (None, Some(f)) => Ok(SqlValue::Real(f)),
      (None, None) => Err(Error::UnsupportedFilter {
        field: field.to_owned(),
        value: value.clone(),
      }),
    },
    _ => Err(Error::UnsupportedFilter { field: field.to_owned(), value: value.clone() }),
  }
}

pub fn compile_filter(filter: &Filter) -> Result<WhereClause> {
  let mut conds = Vec::new();
  let mut params = Vec::new();

  for (field, cond) in filter.clauses() {
    match cond {
      Condition::Eq(value) if field == "_id" => {
        params.push(scalar(field, value)?);
        conds.push(format!("id = ?{}", params.len()));
      }
      Condition::Eq(value) => {
        params.push(SqlValue::Text(format!("$.{field}")));
        let path = params.len();
        params.push(scalar(field, value)?);
        let val = params.len();
        conds.push(format!(
          "EXISTS (SELECT 1 FROM json_each(body, ?{path}) AS j WHERE j.value = ?{val})"
        ));
      }
      Condition::Exists(present) => {
        params.push(SqlValue::Text(format!("$.{field}")));
        let op = if *present { "IS NOT NULL" } else { "IS NULL" };
        conds.push(format!("json_type(body, ?{}) {op}", params.len()));
      }
    }
  }

  let sql = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  Ok(WhereClause { sql, params })
}

pub fn encode_document(doc: &Document) -> Result<String> { Ok(serde_json::to_string(doc)?) }

pub fn decode_document(body: &str) -> Result<Document> { Ok(serde_json::from_str(body)?) }
