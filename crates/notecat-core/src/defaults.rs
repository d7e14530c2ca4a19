//! Durable key-value storage for small opaque values (the saved folder grant).
//!
//! `FileDefaults` keeps entries in `defaults.toml`, byte values base64-encoded:
//!
//! ```toml
//! [entries]
//! FolderBookmark = "eyJ2ZXJzaW9uIjox..."
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::app_data;

pub const DEFAULTS_FILENAME: &str = "defaults.toml";

/// Process-wide durable storage keyed by fixed names.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DefaultsFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// TOML-backed store. The whole file is rewritten atomically on every change.
#[derive(Debug, Clone)]
pub struct FileDefaults {
    path: PathBuf,
}

impl FileDefaults {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the app data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let dir = app_data::app_data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self::new(dir.join(DEFAULTS_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<DefaultsFile, StoreError> {
        let s = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DefaultsFile::default()),
            Err(e) => return Err(StoreError::Read(self.path.clone(), e)),
        };
        toml::from_str(&s).map_err(|e| StoreError::Parse(self.path.clone(), e))
    }

    fn save(&self, file: &DefaultsFile) -> Result<(), StoreError> {
        let s = toml::to_string_pretty(file).map_err(StoreError::Serialize)?;
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Write(self.path.clone(), e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| StoreError::Write(self.path.clone(), e))?;
        tmp.write_all(s.as_bytes())
            .map_err(|e| StoreError::Write(self.path.clone(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Write(self.path.clone(), e.error))?;
        Ok(())
    }
}

impl KeyValueStore for FileDefaults {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let file = self.load()?;
        file.entries
            .get(key)
            .map(|v| {
                STANDARD
                    .decode(v)
                    .map_err(|e| StoreError::Decode(key.to_string(), e))
            })
            .transpose()
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut file = self.load()?;
        file.entries.insert(key.to_string(), STANDARD.encode(value));
        self.save(&file)?;
        tracing::debug!(key, path = %self.path.display(), "stored default");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut file = self.load()?;
        if file.entries.remove(key).is_some() {
            self.save(&file)?;
        }
        Ok(())
    }
}

/// In-process store. Clones of a `MemoryDefaults` do not share entries; share it behind `Rc`.
#[derive(Debug, Default)]
pub struct MemoryDefaults {
    entries: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryDefaults {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryDefaults {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::rc::Rc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("failed to serialize defaults: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("stored value for {0} is not valid base64: {1}")]
    Decode(String, base64::DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDefaults::new(dir.path().join(DEFAULTS_FILENAME));
        assert_eq!(store.get("FolderBookmark").unwrap(), None);
    }

    #[test]
    fn file_store_keeps_bytes_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULTS_FILENAME);
        FileDefaults::new(&path).set("FolderBookmark", &[0, 159, 146, 150]).unwrap();
        FileDefaults::new(&path).set("Other", b"x").unwrap();

        let store = FileDefaults::new(&path);
        assert_eq!(store.get("FolderBookmark").unwrap(), Some(vec![0, 159, 146, 150]));
        assert_eq!(store.get("Other").unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn remove_deletes_only_that_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDefaults::new(dir.path().join(DEFAULTS_FILENAME));
        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();
        store.remove("a").unwrap();
        store.remove("missing").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULTS_FILENAME);
        std::fs::write(&path, "entries = [[[").unwrap();
        let err = FileDefaults::new(&path).get("FolderBookmark").unwrap_err();
        assert!(matches!(err, StoreError::Parse(..)));
    }

    #[test]
    fn bad_base64_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULTS_FILENAME);
        std::fs::write(&path, "[entries]\nFolderBookmark = \"not base64!!\"\n").unwrap();
        let err = FileDefaults::new(&path).get("FolderBookmark").unwrap_err();
        assert!(matches!(err, StoreError::Decode(..)));
    }

    #[test]
    fn memory_store() {
        let store = MemoryDefaults::new();
        store.set("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
