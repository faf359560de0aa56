//! Cleanup of previously produced outputs.
//!
//! Outputs recorded by an earlier execution are deleted only when the build
//! owns them, and every deletion is announced to the output-change listener
//! first.
//!
//! # Submodules
//!
//! - [`ownership`] - Registry of output roots the build owns

pub mod ownership;

use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::fingerprint::{FileSystemSnapshot, SnapshotEntry};

pub use ownership::OutputOwnership;

#[derive(Debug, Error)]
pub enum CleanupError {
  #[error("failed to delete {path}: {source}")]
  Delete {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to inspect {path}: {source}")]
  Inspect {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Removes filesystem entries.
pub trait Deleter: Send + Sync {
  fn delete_file(&self, path: &Path) -> io::Result<()>;

  fn delete_empty_dir(&self, path: &Path) -> io::Result<()>;
}

/// Deletes straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDeleter;

impl Deleter for FsDeleter {
  fn delete_file(&self, path: &Path) -> io::Result<()> {
    fs::remove_file(path)
  }

  fn delete_empty_dir(&self, path: &Path) -> io::Result<()> {
    fs::remove_dir(path)
  }
}

/// Notified before outputs are modified on disk.
pub trait OutputChangeListener: Send + Sync {
  fn before_output_change(&self, affected_roots: &[PathBuf]);
}

/// Listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOutputChangeListener;

impl OutputChangeListener for NoopOutputChangeListener {
  fn before_output_change(&self, _affected_roots: &[PathBuf]) {}
}

/// Deletes the files of a recorded output snapshot, then any directories
/// left empty, deepest first.
///
/// Files are checked against `file_predicate` and directories against
/// `dir_predicate`; paths failing their predicate are left untouched. A
/// directory is only removed when it is empty.
pub struct OutputsCleaner<'a, F, D> {
  deleter: &'a dyn Deleter,
  file_predicate: F,
  dir_predicate: D,
  directories_to_clean: BinaryHeap<(usize, PathBuf)>,
  queued: HashSet<PathBuf>,
  did_work: bool,
}

impl<'a, F, D> OutputsCleaner<'a, F, D>
where
  F: Fn(&Path) -> bool,
  D: Fn(&Path) -> bool,
{
  pub fn new(deleter: &'a dyn Deleter, file_predicate: F, dir_predicate: D) -> Self {
    Self {
      deleter,
      file_predicate,
      dir_predicate,
      directories_to_clean: BinaryHeap::new(),
      queued: HashSet::new(),
      did_work: false,
    }
  }

  /// Whether any file or directory was deleted so far.
  pub fn did_work(&self) -> bool {
    self.did_work
  }

  pub fn cleanup_outputs(&mut self, snapshot: &FileSystemSnapshot) -> Result<(), CleanupError> {
    for entry in snapshot.entries() {
      match entry {
        SnapshotEntry::Missing { .. } => {}
        SnapshotEntry::Directory { path } => self.mark_directory(path),
        SnapshotEntry::File { path, .. } | SnapshotEntry::Symlink { path, .. } => self.cleanup_file(path)?,
      }
    }

    self.cleanup_directories()
  }

  fn cleanup_file(&mut self, path: &Path) -> Result<(), CleanupError> {
    if !(self.file_predicate)(path) {
      return Ok(());
    }

    match fs::symlink_metadata(path) {
      Ok(_) => {
        debug!(path = %path.display(), "deleting stale output file");
        self.deleter.delete_file(path).map_err(|source| CleanupError::Delete {
          path: path.to_path_buf(),
          source,
        })?;
        self.did_work = true;
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => {
        return Err(CleanupError::Inspect {
          path: path.to_path_buf(),
          source,
        });
      }
    }

    if let Some(parent) = path.parent() {
      self.mark_directory(parent);
    }
    Ok(())
  }

  fn mark_directory(&mut self, dir: &Path) {
    if !(self.dir_predicate)(dir) || self.queued.contains(dir) {
      return;
    }
    self.queued.insert(dir.to_path_buf());
    self.directories_to_clean.push((dir.components().count(), dir.to_path_buf()));
  }

  fn cleanup_directories(&mut self) -> Result<(), CleanupError> {
    while let Some((_, dir)) = self.directories_to_clean.pop() {
      self.queued.remove(&dir);
      if !is_empty_dir(&dir)? {
        continue;
      }

      debug!(path = %dir.display(), "deleting stale empty output directory");
      self.deleter.delete_empty_dir(&dir).map_err(|source| CleanupError::Delete {
        path: dir.clone(),
        source,
      })?;
      self.did_work = true;

      if let Some(parent) = dir.parent() {
        self.mark_directory(parent);
      }
    }

    Ok(())
  }
}

fn is_empty_dir(dir: &Path) -> Result<bool, CleanupError> {
  let inspect_err = |source| CleanupError::Inspect {
    path: dir.to_path_buf(),
    source,
  };

  match fs::symlink_metadata(dir) {
    Ok(meta) if meta.is_dir() => {}
    Ok(_) => return Ok(false),
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
    Err(e) => return Err(inspect_err(e)),
  }

  let mut entries = fs::read_dir(dir).map_err(inspect_err)?;
  Ok(entries.next().is_none())
}

/// Clean every recorded output property owned by the build.
///
/// Each property's root paths are announced to `listener` before anything
/// under them is deleted. Returns whether anything was deleted.
pub fn clean_previous_outputs(
  outputs: &BTreeMap<String, FileSystemSnapshot>,
  ownership: &OutputOwnership,
  deleter: &dyn Deleter,
  listener: &dyn OutputChangeListener,
) -> Result<bool, CleanupError> {
  let owned = |path: &Path| ownership.is_output_owned_by_build(path);
  let mut cleaner = OutputsCleaner::new(deleter, owned, owned);

  for (property, snapshot) in outputs {
    debug!(property = %property, roots = snapshot.roots().len(), "cleaning previous outputs");
    listener.before_output_change(&snapshot.root_paths());
    cleaner.cleanup_outputs(snapshot)?;
  }

  Ok(cleaner.did_work())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;
  use tempfile::tempdir;

  fn capture(root: &Path) -> FileSystemSnapshot {
    FileSystemSnapshot::capture(&[root.to_path_buf()]).unwrap()
  }

  #[test]
  fn deletes_owned_files_and_empty_directories() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    fs::create_dir_all(out.join("nested")).unwrap();
    fs::write(out.join("a.class"), "a").unwrap();
    fs::write(out.join("nested/b.class"), "b").unwrap();
    let snapshot = capture(&out);

    let ownership = OutputOwnership::new();
    ownership.register(&out);
    let owned = |p: &Path| ownership.is_output_owned_by_build(p);
    let mut cleaner = OutputsCleaner::new(&FsDeleter, owned, owned);
    cleaner.cleanup_outputs(&snapshot).unwrap();

    assert!(cleaner.did_work());
    assert!(!out.exists());
    assert!(temp.path().exists());
  }

  #[test]
  fn unowned_files_are_kept() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("a.class"), "a").unwrap();
    let snapshot = capture(&out);

    let ownership = OutputOwnership::new();
    let owned = |p: &Path| ownership.is_output_owned_by_build(p);
    let mut cleaner = OutputsCleaner::new(&FsDeleter, owned, owned);
    cleaner.cleanup_outputs(&snapshot).unwrap();

    assert!(!cleaner.did_work());
    assert!(out.join("a.class").exists());
  }

  #[test]
  fn directory_with_foreign_content_is_kept() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("a.class"), "a").unwrap();
    let snapshot = capture(&out);
    fs::write(out.join("added-later.txt"), "x").unwrap();

    let mut cleaner = OutputsCleaner::new(&FsDeleter, |_: &Path| true, |_: &Path| true);
    cleaner.cleanup_outputs(&snapshot).unwrap();

    assert!(cleaner.did_work());
    assert!(!out.join("a.class").exists());
    assert!(out.join("added-later.txt").exists());
  }

  #[test]
  fn already_deleted_outputs_are_not_work() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("a.class"), "a").unwrap();
    let snapshot = capture(&out);
    fs::remove_dir_all(&out).unwrap();

    let mut cleaner = OutputsCleaner::new(&FsDeleter, |_: &Path| true, |_: &Path| true);
    cleaner.cleanup_outputs(&snapshot).unwrap();

    assert!(!cleaner.did_work());
  }

  #[test]
  fn missing_roots_are_ignored() {
    let temp = tempdir().unwrap();
    let snapshot = capture(&temp.path().join("never-created"));

    let mut cleaner = OutputsCleaner::new(&FsDeleter, |_: &Path| true, |_: &Path| true);
    cleaner.cleanup_outputs(&snapshot).unwrap();
    assert!(!cleaner.did_work());
  }

  struct FailingDeleter;

  impl Deleter for FailingDeleter {
    fn delete_file(&self, _path: &Path) -> io::Result<()> {
      Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }

    fn delete_empty_dir(&self, _path: &Path) -> io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn delete_failure_aborts() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("a.class"), "a").unwrap();
    let snapshot = capture(&out);

    let mut cleaner = OutputsCleaner::new(&FailingDeleter, |_: &Path| true, |_: &Path| true);
    let err = cleaner.cleanup_outputs(&snapshot).unwrap_err();
    assert!(matches!(err, CleanupError::Delete { ref path, .. } if path == &out.join("a.class")));
  }

  #[derive(Default)]
  struct RecordingListener {
    events: Mutex<Vec<(Vec<PathBuf>, bool)>>,
  }

  impl OutputChangeListener for RecordingListener {
    fn before_output_change(&self, affected_roots: &[PathBuf]) {
      let still_there = affected_roots.iter().all(|p| p.exists());
      self.events.lock().unwrap().push((affected_roots.to_vec(), still_there));
    }
  }

  #[test]
  fn roots_are_announced_before_deletion() {
    let temp = tempdir().unwrap();
    let classes = temp.path().join("classes");
    let resources = temp.path().join("resources");
    for dir in [&classes, &resources] {
      fs::create_dir_all(dir).unwrap();
      fs::write(dir.join("f"), "x").unwrap();
    }
    let mut outputs = BTreeMap::new();
    outputs.insert("classes".to_string(), capture(&classes));
    outputs.insert("resources".to_string(), capture(&resources));

    let ownership = OutputOwnership::new();
    ownership.register(&classes);
    ownership.register(&resources);
    let listener = RecordingListener::default();

    let did_work = clean_previous_outputs(&outputs, &ownership, &FsDeleter, &listener).unwrap();

    assert!(did_work);
    let events = listener.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], (vec![classes.clone()], true));
    assert_eq!(events[1], (vec![resources.clone()], true));
    assert!(!classes.exists());
    assert!(!resources.exists());
  }
}
