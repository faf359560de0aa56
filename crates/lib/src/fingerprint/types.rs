use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::hash::{ContentHash, FileHashError, hash_bytes};

/// Content fingerprint of one file-collection property.
///
/// Maps each normalized path (relative to its declared root, `/`-separated)
/// to the digest of its content. Two fingerprints are equal iff every path and
/// digest match; the aggregate hash is derived from the sorted entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileFingerprint {
  entries: BTreeMap<String, ContentHash>,
}

impl FileFingerprint {
  /// A fingerprint with no entries.
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn from_entries(entries: impl IntoIterator<Item = (String, ContentHash)>) -> Self {
    Self {
      entries: entries.into_iter().collect(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn entries(&self) -> &BTreeMap<String, ContentHash> {
    &self.entries
  }

  /// Single digest over all entries, in path order.
  pub fn aggregate_hash(&self) -> ContentHash {
    let mut buf = String::new();
    for (path, digest) in &self.entries {
      buf.push_str(path);
      buf.push(':');
      buf.push_str(&digest.0);
      buf.push('\n');
    }
    hash_bytes(buf.as_bytes())
  }
}

/// Immutable, content-comparable snapshot of a non-file input value.
///
/// Numbers are kept in their canonical textual form so the snapshot stays
/// `Eq` and `Hash`. Maps are ordered by key, which makes equality independent
/// of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ValueSnapshot {
  Null,
  Bool(bool),
  Number(String),
  String(String),
  List(Vec<ValueSnapshot>),
  Map(BTreeMap<String, ValueSnapshot>),
}

impl ValueSnapshot {
  /// Snapshot any serializable value.
  pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
    Ok(Self::from_json(serde_json::to_value(value)?))
  }

  pub fn from_json(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Null => ValueSnapshot::Null,
      serde_json::Value::Bool(b) => ValueSnapshot::Bool(b),
      serde_json::Value::Number(n) => ValueSnapshot::Number(n.to_string()),
      serde_json::Value::String(s) => ValueSnapshot::String(s),
      serde_json::Value::Array(items) => ValueSnapshot::List(items.into_iter().map(Self::from_json).collect()),
      serde_json::Value::Object(map) => {
        ValueSnapshot::Map(map.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
      }
    }
  }
}

/// Errors raised while fingerprinting inputs or snapshotting outputs.
#[derive(Debug, Error)]
pub enum FingerprintError {
  #[error("failed to walk {path}: {message}")]
  Walk { path: PathBuf, message: String },

  #[error(transparent)]
  Read(#[from] FileHashError),

  #[error("failed to read symlink {path}: {source}")]
  ReadSymlink {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to snapshot value of input property '{property}': {source}")]
  Value {
    property: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to fingerprint input property '{property}': {source}")]
  Property {
    property: String,
    #[source]
    source: Box<FingerprintError>,
  },
}
