//! Output directory handling
//!
//! The output directory is wiped and recreated at the start of every run.
//! An advisory lock on a file next to it keeps two runs from sharing a
//! directory.

use fs2::FileExt;
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Exclusive claim on an output directory for the lifetime of a run
///
/// The lock file lives beside the directory, not inside it, so the
/// destructive recreate cannot remove it. The claim is an OS file lock held
/// through the open handle: it is released on drop and also when the
/// process dies, so a killed run never leaves the directory blocked. The
/// file itself is left in place.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
    file: File,
}

impl WorkspaceLock {
    /// Returns the lock file path for an output directory
    pub fn lock_path(dir: &Path) -> Result<PathBuf> {
        let name = dir.file_name().ok_or_else(|| PipelineError::InvalidInput {
            path: dir.to_path_buf(),
            reason: "output directory must have a name".to_string(),
        })?;
        let mut lock_name = std::ffi::OsString::from(".");
        lock_name.push(name);
        lock_name.push(".mri2mrs.lock");
        Ok(dir.with_file_name(lock_name))
    }

    /// Claims `dir`, failing if another run already holds it
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = Self::lock_path(dir)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { path, file }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(PipelineError::WorkspaceBusy {
                    dir: dir.to_path_buf(),
                    lock: path,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

/// Deletes `dir` if it exists and creates it empty
pub fn recreate(dir: &Path) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(PipelineError::InvalidInput {
                path: dir.to_path_buf(),
                reason: "output path exists and is not a directory".to_string(),
            });
        }
        warn!(
            "Output directory {} exists, deleting and recreating it",
            dir.display()
        );
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Makes `path` absolute against the current working directory
///
/// The path does not need to exist.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_is_sibling() {
        let lock = WorkspaceLock::lock_path(Path::new("/data/out/BIO_0002")).unwrap();
        assert_eq!(lock, PathBuf::from("/data/out/.BIO_0002.mri2mrs.lock"));
    }

    #[test]
    fn test_lock_path_needs_name() {
        assert!(WorkspaceLock::lock_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("out");

        let lock = WorkspaceLock::acquire(&dir).unwrap();
        assert!(lock.path().exists());
        assert!(!lock.path().starts_with(&dir));

        let err = WorkspaceLock::acquire(&dir).unwrap_err();
        assert!(matches!(err, PipelineError::WorkspaceBusy { .. }));

        drop(lock);
        assert!(WorkspaceLock::acquire(&dir).is_ok());
    }

    #[test]
    fn test_lock_file_left_by_killed_run() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("out");
        let stale = WorkspaceLock::lock_path(&dir).unwrap();
        fs::write(&stale, b"").unwrap();

        let lock = WorkspaceLock::acquire(&dir).unwrap();
        assert_eq!(lock.path(), stale);
    }

    #[test]
    fn test_recreate_clears_contents() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("out");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("stale.nii.gz"), b"old").unwrap();

        recreate(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_recreate_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("out");
        fs::write(&file, b"not a dir").unwrap();

        assert!(matches!(
            recreate(&file),
            Err(PipelineError::InvalidInput { .. })
        ));
        assert!(file.is_file());
    }

    #[test]
    fn test_absolute() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute(Path::new("out")).unwrap(), cwd.join("out"));
        assert_eq!(
            absolute(Path::new("/tmp/out")).unwrap(),
            PathBuf::from("/tmp/out")
        );
    }
}
