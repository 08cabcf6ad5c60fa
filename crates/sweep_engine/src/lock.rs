use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs2::FileExt;
use sweep_logging::{sweep_debug, sweep_warn};

use crate::OperationClass;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("a {0} is already running")]
    Busy(OperationClass),
    #[error("cannot lock {path}: {message}")]
    Unavailable { path: PathBuf, message: String },
}

/// One running operation per class; a second request is rejected, not queued.
///
/// With a lock directory, each held class also holds an exclusive advisory lock
/// on `{dir}/{class}.lock`, so engines in other processes sharing the directory
/// are rejected too.
#[derive(Debug, Clone, Default)]
pub struct OperationLock {
    held: Arc<Mutex<HashSet<OperationClass>>>,
    dir: Option<PathBuf>,
}

impl OperationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            held: Arc::default(),
            dir: Some(dir.into()),
        }
    }

    pub fn lock_path(&self, class: OperationClass) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{class}.lock")))
    }

    pub fn try_acquire(&self, class: OperationClass) -> Result<OperationGuard, LockError> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.contains(&class) {
            return Err(LockError::Busy(class));
        }
        let file = match self.lock_path(class) {
            Some(path) => Some(lock_file(&path, class)?),
            None => None,
        };
        held.insert(class);
        Ok(OperationGuard {
            held: Arc::clone(&self.held),
            class,
            _file: file,
        })
    }

    pub fn is_held(&self, class: OperationClass) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&class)
    }
}

fn lock_file(path: &Path, class: OperationClass) -> Result<File, LockError> {
    let unavailable = |err: io::Error| LockError::Unavailable {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(unavailable)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(unavailable)?;

    // Fully qualified: std::fs::File has an inherent try_lock_exclusive on newer toolchains.
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            sweep_debug!("Acquired {}", path.display());
            Ok(file)
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
            sweep_warn!("{} is held by another process", path.display());
            Err(LockError::Busy(class))
        }
        Err(err) => Err(unavailable(err)),
    }
}

/// Releases its class when dropped; closing the lock file releases the advisory lock.
#[derive(Debug)]
pub struct OperationGuard {
    held: Arc<Mutex<HashSet<OperationClass>>>,
    class: OperationClass,
    _file: Option<File>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.class);
    }
}
