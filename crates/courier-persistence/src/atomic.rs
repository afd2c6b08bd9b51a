//! Atomic file operations.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{PersistenceError, Result};

/// Writes bytes to `path` atomically.
///
/// The data goes to a temp file in the same directory first and is renamed
/// into place afterwards, so readers either see the old contents or the new
/// ones, never a partial write. The parent directory is created if missing.
///
/// # Errors
/// Returns an error if the directory, write, or rename fails.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| PersistenceError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Temp file must live in the target directory; rename across
    // filesystems is not atomic.
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

/// Serializes a value as pretty JSON and writes it atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

/// Reads a JSON file into a value.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}

/// Reads a JSON file, returning `None` when it does not exist.
pub fn read_json_optional<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        id: String,
        count: u32,
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.txt");

        atomic_write(&path, b"routing table v2").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "routing table v2");
    }

    #[test]
    fn write_replaces_existing_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.txt");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn write_creates_missing_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/deep.txt");

        atomic_write(&path, b"x").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn json_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record.json");
        let record = Record {
            id: "r-1".to_string(),
            count: 3,
        };

        atomic_write_json(&path, &record).unwrap();
        let loaded: Record = read_json(&path).unwrap();

        assert_eq!(loaded, record);
    }

    #[test]
    fn optional_read_absent_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");

        let loaded: Option<Record> = read_json_optional(&missing).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn read_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();

        let result: Result<Record> = read_json(&path);
        assert!(matches!(result, Err(PersistenceError::Serialize(_))));
    }
}
