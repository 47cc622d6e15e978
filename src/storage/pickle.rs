//! Pickled blob files: one `.pickle` file per value.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::bitemporal::{Cutoff, Pick, bitemporal_merge, bitemporal_read};
use crate::error::Result;
use crate::opaque;
use crate::registry::Registry;
use crate::storage::locks::with_lock;
use crate::storage::{Backend, read_cutoff, split_cutoff, stamp_unstamped};
use crate::value::Value;

pub const EXTENSION: &str = ".pickle";

#[derive(Clone)]
pub struct PickleBackend {
    registry: Arc<Registry>,
    root: Option<PathBuf>,
}

impl PickleBackend {
    /// Object elements and documents are pickled through `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry, root: None }
    }
    /// Relative paths are taken under `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn locate(&self, path: &str) -> PathBuf {
        let path = if path.ends_with(EXTENSION) {
            path.to_string()
        } else {
            format!("{}{}", path.trim_end_matches('/'), EXTENSION)
        };
        match &self.root {
            Some(root) if Path::new(&path).is_relative() => root.join(path),
            _ => PathBuf::from(path),
        }
    }

    // a file that does not unpickle reads as nothing
    fn load(&self, file: &Path) -> Option<Value> {
        let data = match fs::read(file) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "unable to read pickle file");
                return None;
            }
        };
        match opaque::unpickle(&self.registry, &data) {
            Value::Null => None,
            value => Some(value),
        }
    }
}

impl Backend for PickleBackend {
    fn write(&self, value: &Value, path: &str) -> Result<String> {
        let (path, asof) = split_cutoff(path)?;
        let file = self.locate(path);
        let key = file.to_string_lossy().to_string();
        with_lock(&key, || {
            let value = match value {
                Value::Table(table) => {
                    let table = stamp_unstamped(table, asof);
                    let old = if file.exists() { self.load(&file) } else { None };
                    match old {
                        Some(Value::Table(old)) if table.is_bitemporal() => {
                            Value::Table(bitemporal_merge(&old, &table, asof)?)
                        }
                        _ => Value::Table(table),
                    }
                }
                other => other.clone(),
            };
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file, opaque::pickle(&self.registry, &value)?)?;
            debug!(path = %key, "wrote pickle file");
            Ok(())
        })?;
        Ok(key)
    }

    fn read(&self, path: &str) -> Result<Option<Value>> {
        let Some((path, cutoff)) = read_cutoff(path) else {
            return Ok(None);
        };
        let file = self.locate(path);
        let key = file.to_string_lossy().to_string();
        let stored = with_lock(&key, || Ok(self.load(&file)))?;
        match stored {
            Some(Value::Table(table)) if cutoff.is_some() || table.is_bitemporal() => Ok(Some(Value::Table(
                bitemporal_read(&table, cutoff.map(Cutoff::At), Pick::Last)?,
            ))),
            other => Ok(other),
        }
    }
}
