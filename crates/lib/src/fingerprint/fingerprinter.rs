//! Fingerprinting of declared input properties.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use super::types::{FileFingerprint, FingerprintError, ValueSnapshot};
use crate::util::hash::{ContentHash, hash_bytes, hash_file};

/// How an input file property takes part in execution decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPropertyType {
  /// Any change forces a full, non-incremental execution.
  NonIncremental,
  /// Changes are reported to the work so it can process them incrementally.
  Incremental,
  /// Incremental, and the work is skipped when every primary input is empty.
  Primary,
}

impl InputPropertyType {
  pub fn is_incremental(self) -> bool {
    !matches!(self, InputPropertyType::NonIncremental)
  }

  pub fn is_skip_when_empty(self) -> bool {
    matches!(self, InputPropertyType::Primary)
  }
}

/// The file roots of an input file property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileValueSupplier {
  roots: Vec<PathBuf>,
}

impl FileValueSupplier {
  pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
    Self {
      roots: roots.into_iter().collect(),
    }
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }
}

/// Lazily produces the snapshot of a non-file input value.
pub struct ValueSupplier<'a> {
  supply: Box<dyn Fn() -> Result<ValueSnapshot, serde_json::Error> + 'a>,
}

impl<'a> ValueSupplier<'a> {
  pub fn of<T: Serialize + ?Sized>(value: &'a T) -> Self {
    Self {
      supply: Box::new(move || ValueSnapshot::of(value)),
    }
  }

  pub fn snapshot(&self) -> Result<ValueSnapshot, serde_json::Error> {
    (self.supply)()
  }
}

/// Receives the input properties a unit of work declares.
pub trait InputVisitor {
  fn visit_input_property(&mut self, _name: &str, _value: ValueSupplier<'_>) {}

  fn visit_input_file_property(&mut self, _name: &str, _kind: InputPropertyType, _value: FileValueSupplier) {}
}

/// Output of [`InputFingerprinter::fingerprint_input_properties`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FingerprintResult {
  pub value_snapshots: BTreeMap<String, ValueSnapshot>,
  pub file_fingerprints: BTreeMap<String, FileFingerprint>,
}

/// Merge two fingerprint maps; entries of `newer` win.
pub fn union(
  known: &BTreeMap<String, FileFingerprint>,
  newer: &BTreeMap<String, FileFingerprint>,
) -> BTreeMap<String, FileFingerprint> {
  let mut merged = known.clone();
  merged.extend(newer.iter().map(|(k, v)| (k.clone(), v.clone())));
  merged
}

/// Computes fingerprints and value snapshots for visited input properties.
#[derive(Debug, Clone, Copy)]
pub struct InputFingerprinter {
  ignored_names: &'static [&'static str],
}

impl Default for InputFingerprinter {
  fn default() -> Self {
    Self::new()
  }
}

impl InputFingerprinter {
  pub const fn new() -> Self {
    Self { ignored_names: &[] }
  }

  /// Skip files and directories with these names (e.g. `&[".DS_Store"]`).
  pub const fn ignoring(names: &'static [&'static str]) -> Self {
    Self { ignored_names: names }
  }

  /// Fingerprint whatever properties `visit` reports.
  ///
  /// Properties already present in `known_values` or `known_files` are not
  /// recomputed and are not part of the result. A value equal to its snapshot
  /// in `previous_values` reuses the previous snapshot.
  pub fn fingerprint_input_properties(
    &self,
    previous_values: &BTreeMap<String, ValueSnapshot>,
    known_values: &BTreeMap<String, ValueSnapshot>,
    known_files: &BTreeMap<String, FileFingerprint>,
    visit: impl FnOnce(&mut dyn InputVisitor),
  ) -> Result<FingerprintResult, FingerprintError> {
    let mut collector = Collector {
      fingerprinter: self,
      previous_values,
      known_values,
      known_files,
      result: FingerprintResult::default(),
      error: None,
    };

    visit(&mut collector);

    match collector.error {
      Some(err) => Err(err),
      None => Ok(collector.result),
    }
  }

  /// Fingerprint the files below `roots`.
  ///
  /// A missing root contributes nothing. A file root is keyed by its file
  /// name; files under a directory root are keyed relative to that root.
  /// With several roots each key is prefixed by its root's position, so
  /// equal relative paths under different roots stay distinct entries.
  pub fn fingerprint_files(&self, roots: &[PathBuf]) -> Result<FileFingerprint, FingerprintError> {
    let mut entries: Vec<(String, ContentHash)> = Vec::new();

    for (index, root) in roots.iter().enumerate() {
      match fs::symlink_metadata(root) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
        Err(e) => {
          return Err(FingerprintError::Walk {
            path: root.clone(),
            message: e.to_string(),
          });
        }
      }

      let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
          e.file_name()
            .to_str()
            .map(|name| !self.ignored_names.contains(&name))
            .unwrap_or(true)
        });

      for entry in walker {
        let entry = entry.map_err(|e| FingerprintError::Walk {
          path: root.clone(),
          message: e.to_string(),
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
          continue;
        }

        let key = match roots.len() {
          1 => normalized_path(root, entry.path()),
          _ => format!("{}/{}", index, normalized_path(root, entry.path())),
        };
        if file_type.is_symlink() {
          let target = fs::read_link(entry.path()).map_err(|source| FingerprintError::ReadSymlink {
            path: entry.path().to_path_buf(),
            source,
          })?;
          entries.push((key, hash_bytes(target.as_os_str().as_encoded_bytes())));
        } else if file_type.is_file() {
          entries.push((key, hash_file(entry.path())?));
        }
      }
    }

    Ok(FileFingerprint::from_entries(entries))
  }
}

fn normalized_path(root: &Path, path: &Path) -> String {
  let relative = match path.strip_prefix(root) {
    Ok(rel) if !rel.as_os_str().is_empty() => rel,
    _ => Path::new(path.file_name().unwrap_or(path.as_os_str())),
  };

  relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

struct Collector<'a> {
  fingerprinter: &'a InputFingerprinter,
  previous_values: &'a BTreeMap<String, ValueSnapshot>,
  known_values: &'a BTreeMap<String, ValueSnapshot>,
  known_files: &'a BTreeMap<String, FileFingerprint>,
  result: FingerprintResult,
  error: Option<FingerprintError>,
}

impl InputVisitor for Collector<'_> {
  fn visit_input_property(&mut self, name: &str, value: ValueSupplier<'_>) {
    if self.error.is_some() || self.known_values.contains_key(name) {
      return;
    }

    match value.snapshot() {
      Ok(snapshot) => {
        let snapshot = match self.previous_values.get(name) {
          Some(previous) if *previous == snapshot => previous.clone(),
          _ => snapshot,
        };
        self.result.value_snapshots.insert(name.to_string(), snapshot);
      }
      Err(source) => {
        self.error = Some(FingerprintError::Value {
          property: name.to_string(),
          source,
        });
      }
    }
  }

  fn visit_input_file_property(&mut self, name: &str, kind: InputPropertyType, value: FileValueSupplier) {
    if self.error.is_some() || self.known_files.contains_key(name) {
      return;
    }

    match self.fingerprinter.fingerprint_files(value.roots()) {
      Ok(fingerprint) => {
        debug!(property = name, ?kind, files = fingerprint.len(), "fingerprinted input files");
        self.result.file_fingerprints.insert(name.to_string(), fingerprint);
      }
      Err(e) => {
        self.error = Some(FingerprintError::Property {
          property: name.to_string(),
          source: Box::new(e),
        });
      }
    }
  }
}
