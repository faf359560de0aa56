//! Snapshots of output locations as they are on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::types::FingerprintError;
use crate::util::hash::{ContentHash, hash_file};

/// One location recorded in a [`FileSystemSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEntry {
  /// A declared root that did not exist.
  Missing { path: PathBuf },
  File { path: PathBuf, digest: ContentHash },
  Symlink { path: PathBuf, target: PathBuf },
  Directory { path: PathBuf },
}

impl SnapshotEntry {
  pub fn path(&self) -> &Path {
    match self {
      SnapshotEntry::Missing { path }
      | SnapshotEntry::File { path, .. }
      | SnapshotEntry::Symlink { path, .. }
      | SnapshotEntry::Directory { path } => path,
    }
  }
}

/// Recorded shape of one output property: its declared roots and every
/// location found beneath them, in pre-order with siblings sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemSnapshot {
  roots: Vec<PathBuf>,
  entries: Vec<SnapshotEntry>,
}

impl FileSystemSnapshot {
  pub fn empty() -> Self {
    Self::default()
  }

  /// Walk `roots` and record what is there now.
  ///
  /// Symlinks are recorded, never followed.
  pub fn capture(roots: &[PathBuf]) -> Result<Self, FingerprintError> {
    let mut entries = Vec::new();

    for root in roots {
      match fs::symlink_metadata(root) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
          entries.push(SnapshotEntry::Missing { path: root.clone() });
          continue;
        }
        Err(e) => {
          return Err(FingerprintError::Walk {
            path: root.clone(),
            message: e.to_string(),
          });
        }
      }

      for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| FingerprintError::Walk {
          path: root.clone(),
          message: e.to_string(),
        })?;
        let path = entry.path().to_path_buf();
        let file_type = entry.file_type();

        if file_type.is_dir() {
          entries.push(SnapshotEntry::Directory { path });
        } else if file_type.is_symlink() {
          let target = fs::read_link(&path).map_err(|source| FingerprintError::ReadSymlink {
            path: path.clone(),
            source,
          })?;
          entries.push(SnapshotEntry::Symlink { path, target });
        } else if file_type.is_file() {
          let digest = hash_file(&path)?;
          entries.push(SnapshotEntry::File { path, digest });
        }
      }
    }

    Ok(Self {
      roots: roots.to_vec(),
      entries,
    })
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  /// Root paths of this snapshot, used to announce output changes.
  pub fn root_paths(&self) -> Vec<PathBuf> {
    self.roots.clone()
  }

  pub fn entries(&self) -> &[SnapshotEntry] {
    &self.entries
  }

  /// True when nothing exists under any root.
  pub fn is_empty(&self) -> bool {
    self
      .entries
      .iter()
      .all(|e| matches!(e, SnapshotEntry::Missing { .. }))
  }
}
