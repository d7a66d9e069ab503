//! Opaque 12-byte identifiers.
//!
//! Layout: 4-byte big-endian Unix seconds, 5 bytes of per-process randomness,
//! and a 3-byte wrapping counter. Ids sort roughly by creation time and are
//! rendered as 24 lowercase hex characters.

use std::{
  fmt,
  str::FromStr,
  sync::{
    OnceLock,
    atomic::{AtomicU32, Ordering},
  },
};

use chrono::Utc;
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; 12]);

fn process_entropy() -> &'static [u8; 5] {
  static ENTROPY: OnceLock<[u8; 5]> = OnceLock::new();
  ENTROPY.get_or_init(|| {
    let mut buf = [0u8; 5];
    OsRng.fill_bytes(&mut buf);
    buf
  })
}

fn next_counter() -> u32 {
  static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
  COUNTER
    .get_or_init(|| AtomicU32::new(OsRng.next_u32()))
    .fetch_add(1, Ordering::Relaxed)
}

impl Id {
  /// Generate a fresh id.
  pub fn new() -> Self {
    let mut bytes = [0u8; 12];
    let secs = Utc::now().timestamp() as u32;
    bytes[..4].copy_from_slice(&secs.to_be_bytes());
    bytes[4..9].copy_from_slice(process_entropy());
    bytes[9..].copy_from_slice(&next_counter().to_be_bytes()[1..]);
    Self(bytes)
  }

  pub const fn from_bytes(bytes: [u8; 12]) -> Self { Self(bytes) }

  pub fn as_bytes(&self) -> &[u8; 12] { &self.0 }

  pub fn to_hex(&self) -> String { hex::encode(self.0) }
}

impl Default for Id {
  fn default() -> Self { Self::new() }
}

impl FromStr for Id {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut bytes = [0u8; 12];
    hex::decode_to_slice(s, &mut bytes)
      .map_err(|_| Error::InvalidId(s.to_owned()))?;
    Ok(Self(bytes))
  }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl fmt::Debug for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Id({})", self.to_hex())
  }
}

impl From<Id> for serde_json::Value {
  fn from(id: Id) -> Self { serde_json::Value::String(id.to_hex()) }
}

impl Serialize for Id {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_hex())
  }
}

impl<'de> Deserialize<'de> for Id {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hex_roundtrip() {
    let id: Id = "507f1f77bcf86cd799439011".parse().unwrap();
    assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
    assert_eq!(id.as_bytes()[0], 0x50);
  }

  #[test]
  fn rejects_wrong_length_and_non_hex() {
    assert!(matches!("507f".parse::<Id>(), Err(Error::InvalidId(_))));
    assert!("zz7f1f77bcf86cd799439011".parse::<Id>().is_err());
  }

  #[test]
  fn fresh_ids_are_distinct() {
    let a = Id::new();
    let b = Id::new();
    assert_ne!(a, b);
    // Same process, so the entropy bytes match.
    assert_eq!(a.as_bytes()[4..9], b.as_bytes()[4..9]);
  }

  #[test]
  fn serializes_as_hex_string() {
    let id: Id = "507f1f77bcf86cd799439011".parse().unwrap();
    let json = serde_json::to_value(id).unwrap();
    assert_eq!(json, serde_json::json!("507f1f77bcf86cd799439011"));
    let back: Id = serde_json::from_value(json).unwrap();
    assert_eq!(back, id);
  }
}
