use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::tally::IgnoreSet;
use crate::ScanResult;

pub const LAST_RESULT_KEY: &str = "last_result";
pub const IGNORE_LIST_KEY: &str = "ignored_domains";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode {key}: {message}")]
    Encode { key: String, message: String },
    #[error("failed to decode {key}: {message}")]
    Decode { key: String, message: String },
}

/// Ensure the state directory exists and is writable; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_state_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// String key/value persistence; the values are opaque serialized records.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError>;

    fn write(&self, key: &str, value: &str) -> Result<(), PersistError>;

    /// Directory shared with other processes using the same state, if any.
    fn lock_dir(&self) -> Option<&Path> {
        None
    }
}

/// One `{key}.ron` file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
    writer: AtomicFileWriter,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.clone()),
            dir,
        }
    }

    fn filename(key: &str) -> String {
        format!("{key}.ron")
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.dir.join(Self::filename(key))) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.writer.write(&Self::filename(key), value)?;
        Ok(())
    }

    fn lock_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to the two persisted records.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<dyn KeyValueStore>,
}

impl StateStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    pub fn load_last_result(&self) -> Result<Option<ScanResult>, PersistError> {
        let Some(text) = self.inner.read(LAST_RESULT_KEY)? else {
            return Ok(None);
        };
        decode::<Option<ScanResult>>(LAST_RESULT_KEY, &text)
    }

    pub fn save_last_result(&self, result: Option<&ScanResult>) -> Result<(), PersistError> {
        let text = encode(LAST_RESULT_KEY, &result)?;
        self.inner.write(LAST_RESULT_KEY, &text)
    }

    pub fn load_ignore_list(&self) -> Result<IgnoreSet, PersistError> {
        let Some(text) = self.inner.read(IGNORE_LIST_KEY)? else {
            return Ok(IgnoreSet::new());
        };
        decode::<IgnoreSet>(IGNORE_LIST_KEY, &text)
    }

    pub fn save_ignore_list(&self, ignore: &IgnoreSet) -> Result<(), PersistError> {
        let text = encode(IGNORE_LIST_KEY, ignore)?;
        self.inner.write(IGNORE_LIST_KEY, &text)
    }
}

fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<String, PersistError> {
    ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::new()).map_err(|err| {
        PersistError::Encode {
            key: key.to_string(),
            message: err.to_string(),
        }
    })
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, text: &str) -> Result<T, PersistError> {
    ron::from_str(text).map_err(|err| PersistError::Decode {
        key: key.to_string(),
        message: err.to_string(),
    })
}
