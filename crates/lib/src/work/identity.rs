use serde::{Deserialize, Serialize};

use crate::util::hash::{ObjectHash, object_hash};

/// Stable key naming a unit of work across invocations.
///
/// Identical identities must mean identical inputs and outputs; the history
/// store and the workspace lease are both keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Filesystem-safe key derived from the identity.
  pub fn key(&self) -> ObjectHash {
    object_hash(self.0.as_bytes())
  }
}

impl std::fmt::Display for Identity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for Identity {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}
