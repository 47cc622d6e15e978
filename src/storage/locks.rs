//! Process-wide locks, one per storage path.
//!
//! A lock is created the first time its path is seen and kept for the rest of
//! the process. Locks only exclude threads of this process.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use seahash::SeaHasher;

use crate::error::{EncoderError, Result};

type PathLocks = HashMap<String, Arc<Mutex<()>>, BuildHasherDefault<SeaHasher>>;

lazy_static! {
    static ref LOCKS: Mutex<PathLocks> = Mutex::new(PathLocks::default());
}

pub fn lock_for(path: &str) -> Result<Arc<Mutex<()>>> {
    let mut locks = LOCKS.lock().map_err(|e| EncoderError::Lock(e.to_string()))?;
    Ok(Arc::clone(locks.entry(path.to_string()).or_default()))
}

/// Runs `f` while holding the lock of `path`. Not reentrant.
pub fn with_lock<T>(path: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let lock = lock_for(path)?;
    let _guard = lock.lock().map_err(|e| EncoderError::Lock(e.to_string()))?;
    f()
}
