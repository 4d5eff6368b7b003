use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{ConvertError, Result};

/// Path of the run lock guarding a database file.
pub fn lock_path(db_path: &Path) -> PathBuf {
    let mut path = db_path.as_os_str().to_owned();
    path.push(".lock");
    PathBuf::from(path)
}

/// Acquire an exclusive lock so two converter processes cannot interleave
/// writes against the same database. Released when the File is dropped.
pub fn acquire_run_lock(db_path: &Path) -> Result<File> {
    let path = lock_path(db_path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;

    file.try_lock_exclusive()
        .map_err(|_| ConvertError::Locked(path.display().to_string()))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_and_release() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("site.db");

        let lock = acquire_run_lock(&db).unwrap();
        drop(lock);

        // Re-acquire after release succeeds.
        let _lock = acquire_run_lock(&db).unwrap();
    }

    #[test]
    fn second_holder_rejected() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("site.db");

        let _held = acquire_run_lock(&db).unwrap();
        let err = acquire_run_lock(&db).unwrap_err();
        assert_eq!(err.code(), "locked");
    }
}
