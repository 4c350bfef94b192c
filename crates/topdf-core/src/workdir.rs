//! Per-request working directory.
//!
//! Every request gets a fresh directory that is removed when the `WorkDir` is
//! dropped, on success and on every error path alike.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::error::{ConvertError, Result};

pub struct WorkDir {
    id: Uuid,
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh directory under the system temp location.
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Create a fresh directory under `parent`.
    pub fn new_in(parent: &Path) -> Result<Self> {
        Self::build(Some(parent))
    }

    fn build(parent: Option<&Path>) -> Result<Self> {
        let id = Uuid::new_v4();
        let prefix = format!("topdf-{}-", id.simple());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match parent {
            Some(p) => builder.tempdir_in(p),
            None => builder.tempdir(),
        }
        .map_err(ConvertError::Io)?;
        log::debug!("[{}] work dir {}", id, dir.path().display());
        Ok(Self { id, dir })
    }

    /// Request identifier used in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Store an uploaded document in the working directory.
    ///
    /// Only the final path component of `filename` is used.
    pub fn write_input(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| ConvertError::UnsupportedFormat(format!("invalid file name '{}'", filename)))?;
        let path = self.dir.path().join(name);
        std::fs::write(&path, data)?;
        Ok(path)
    }

    /// Copy an existing file into the working directory.
    pub fn import(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .ok_or_else(|| ConvertError::UnsupportedFormat(format!("invalid path {}", source.display())))?;
        let path = self.dir.path().join(name);
        std::fs::copy(source, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let wd = WorkDir::new().unwrap();
        let path = wd.path().to_path_buf();
        let file = wd.write_input("a.txt", b"hello").unwrap();
        assert!(file.exists());
        drop(wd);
        assert!(!path.exists());
    }

    #[test]
    fn test_write_input_strips_directories() {
        let wd = WorkDir::new().unwrap();
        let file = wd.write_input("../../etc/notes.md", b"# hi").unwrap();
        assert_eq!(file.parent().unwrap(), wd.path());
        assert_eq!(file.file_name().unwrap(), "notes.md");
    }

    #[test]
    fn test_distinct_directories() {
        let a = WorkDir::new().unwrap();
        let b = WorkDir::new().unwrap();
        assert_ne!(a.path(), b.path());
        assert_ne!(a.id(), b.id());
    }
}
