//! Per-event scratch directories.

use std::path::{Path, PathBuf};

use pipeline::{CommitSha, DispatchError};
use tempfile::TempDir;

/// A uniquely named, initially empty directory holding one event's checkout.
///
/// The directory is removed when the value is dropped, so every exit path of
/// a dispatch cleans up after itself. Concurrent events never share one.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Creates `gcb-pr-<short-sha>-XXXXXX` under `root`, creating `root`
    /// first if needed.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Workspace`] if either directory cannot be created.
    pub fn allocate(root: &Path, sha: &CommitSha) -> Result<Self, DispatchError> {
        std::fs::create_dir_all(root).map_err(|e| workspace_error(root.to_path_buf(), &e))?;

        let tag: String = sha
            .short()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let dir = tempfile::Builder::new()
            .prefix(&format!("gcb-pr-{tag}-"))
            .tempdir_in(root)
            .map_err(|e| workspace_error(root.to_path_buf(), &e))?;

        Ok(Self { dir })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the directory now, reporting failure instead of ignoring it.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Workspace`] if removal fails.
    pub fn close(self) -> Result<(), DispatchError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| workspace_error(path, &e))
    }
}

fn workspace_error(path: PathBuf, err: &std::io::Error) -> DispatchError {
    DispatchError::Workspace {
        path,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha() -> CommitSha {
        CommitSha::new("abc123def456").unwrap()
    }

    #[test]
    fn allocates_distinct_empty_directories_named_after_the_commit() {
        let root = tempfile::tempdir().unwrap();
        let first = ScratchWorkspace::allocate(root.path(), &sha()).unwrap();
        let second = ScratchWorkspace::allocate(root.path(), &sha()).unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(root.path()));
        let name = first.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("gcb-pr-abc123d-"), "{name}");
        assert_eq!(std::fs::read_dir(first.path()).unwrap().count(), 0);
    }

    #[test]
    fn creates_a_missing_root() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("nested").join("root");
        let scratch = ScratchWorkspace::allocate(&root, &sha()).unwrap();
        assert!(scratch.path().is_dir());
    }

    #[test]
    fn directory_is_removed_on_drop_and_on_close() {
        let root = tempfile::tempdir().unwrap();

        let dropped = ScratchWorkspace::allocate(root.path(), &sha()).unwrap();
        let dropped_path = dropped.path().to_path_buf();
        std::fs::write(dropped_path.join("cloudbuild.yaml"), "steps: []").unwrap();
        drop(dropped);
        assert!(!dropped_path.exists());

        let closed = ScratchWorkspace::allocate(root.path(), &sha()).unwrap();
        let closed_path = closed.path().to_path_buf();
        closed.close().unwrap();
        assert!(!closed_path.exists());
    }

    #[test]
    fn unusable_root_is_a_workspace_error() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let err = ScratchWorkspace::allocate(&file, &sha()).unwrap_err();
        assert_eq!(err.category(), pipeline::ErrorCategory::Workspace);
    }
}
