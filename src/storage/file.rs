use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ProgressStorage, StorageError};

/// One JSON file per key under a directory.
///
/// Writes go to a hidden temp file first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        source,
    }
}

impl ProgressStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| io_error(key, e))?;

        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, bytes).map_err(|e| io_error(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_error(key, e)
        })
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path().join("nested").join("rvp"));

        storage.write("rvp702_progress", b"{\"steps\":{}}").unwrap();

        let path = storage.path_for("rvp702_progress").unwrap();
        assert!(path.ends_with("rvp702_progress.json"));
        assert_eq!(fs::read(&path).unwrap(), b"{\"steps\":{}}");
        assert_eq!(
            storage.read("rvp702_progress").unwrap(),
            Some(b"{\"steps\":{}}".to_vec())
        );
    }

    #[test]
    fn read_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path());
        assert!(storage.read("rvp702_progress").unwrap().is_none());
    }

    #[test]
    fn overwrite_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path());
        storage.write("k", b"1").unwrap();
        storage.write("k", b"2").unwrap();

        assert_eq!(storage.read("k").unwrap(), Some(b"2".to_vec()));
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }

    #[test]
    fn remove_reports_existence() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path());
        storage.write("k", b"1").unwrap();
        assert!(storage.remove("k").unwrap());
        assert!(!storage.remove("k").unwrap());
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let storage = FileStorage::new("/tmp/unused");
        for key in ["", "../escape", ".hidden", "a/b"] {
            assert!(matches!(
                storage.read(key),
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn unreadable_directory_surfaces_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();
        let storage = FileStorage::new(&blocker);
        assert!(matches!(
            storage.write("k", b"1"),
            Err(StorageError::Io { .. })
        ));
    }
}
