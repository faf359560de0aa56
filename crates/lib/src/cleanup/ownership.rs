use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

/// Output roots the build is known to own.
///
/// A path is owned when it is a registered root or lies beneath one. Only
/// owned paths are ever deleted by output cleanup.
#[derive(Debug, Default)]
pub struct OutputOwnership {
  roots: RwLock<Vec<PathBuf>>,
}

impl OutputOwnership {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_roots(roots: impl IntoIterator<Item = PathBuf>) -> Self {
    Self {
      roots: RwLock::new(roots.into_iter().collect()),
    }
  }

  pub fn register(&self, root: &Path) {
    let Ok(mut roots) = self.roots.write() else {
      return;
    };
    if !roots.iter().any(|r| r == root) {
      debug!(root = %root.display(), "registered build-owned output root");
      roots.push(root.to_path_buf());
    }
  }

  pub fn is_output_owned_by_build(&self, path: &Path) -> bool {
    self
      .roots
      .read()
      .map(|roots| roots.iter().any(|root| path.starts_with(root)))
      .unwrap_or(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn root_and_descendants_are_owned() {
    let ownership = OutputOwnership::new();
    ownership.register(Path::new("/work/build"));

    assert!(ownership.is_output_owned_by_build(Path::new("/work/build")));
    assert!(ownership.is_output_owned_by_build(Path::new("/work/build/classes/A.class")));
    assert!(!ownership.is_output_owned_by_build(Path::new("/work")));
    assert!(!ownership.is_output_owned_by_build(Path::new("/work/buildSrc/x")));
  }

  #[test]
  fn nothing_owned_by_default() {
    assert!(!OutputOwnership::new().is_output_owned_by_build(Path::new("/tmp/x")));
  }

  #[test]
  fn register_is_idempotent() {
    let ownership = OutputOwnership::with_roots([PathBuf::from("/a")]);
    ownership.register(Path::new("/a"));
    assert_eq!(ownership.roots.read().unwrap().len(), 1);
  }
}
