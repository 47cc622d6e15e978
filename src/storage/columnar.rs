//! Table files: one JSON document per table, stored column by column.
//!
//! Bitemporal tables are merged with what the file already holds, so a file
//! accumulates versions and never loses history. A one-dimensional series is
//! stored with its column renamed to the reserved `_is_series` label.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bitemporal::{Cutoff, Pick, bitemporal_merge, bitemporal_read};
use crate::error::{EncoderError, Result};
use crate::storage::locks::with_lock;
use crate::storage::{Backend, read_cutoff, split_cutoff, stamp_unstamped};
use crate::table::{SERIES, Scalar, Table};
use crate::value::Value;

pub const EXTENSION: &str = ".table.json";
const SERIES_NAME: &str = "values";

#[derive(Serialize, Deserialize)]
struct TableFile {
    index_name: Option<String>,
    /// original label of a series column
    #[serde(default)]
    name: Option<String>,
    index: Vec<Scalar>,
    columns: Vec<(String, Vec<Scalar>)>,
}

impl TableFile {
    fn from_table(table: &Table) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(c, label)| {
                let cells = table.rows().iter().map(|row| row[c].clone()).collect::<Vec<_>>();
                (label.clone(), cells)
            })
            .collect();
        Self {
            index_name: table.index_name().map(str::to_string),
            name: None,
            index: table.index().to_vec(),
            columns,
        }
    }
    fn into_table(self) -> Result<(Table, Option<String>)> {
        let mut table = Table::from_columns(self.index, self.columns)?;
        table.set_index_name(self.index_name);
        Ok((table, self.name))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ColumnarBackend {
    root: Option<PathBuf>,
}

impl ColumnarBackend {
    pub fn new() -> Self {
        Self { root: None }
    }
    /// Relative paths are taken under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
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

    fn load(file: &Path) -> Result<(Table, Option<String>)> {
        let text = fs::read_to_string(file)?;
        serde_json::from_str::<TableFile>(&text)?.into_table()
    }

    /// The table as stored, before any bitemporal view is taken.
    fn load_quietly(file: &Path) -> Option<(Table, Option<String>)> {
        match Self::load(file) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "unable to read table file");
                None
            }
        }
    }
}

// series columns take the reserved label on disk
fn to_stored(table: &Table) -> (Table, Option<String>) {
    if !table.is_series() {
        return (table.clone(), None);
    }
    let mut stored = table.clone();
    let name = table.columns().first().cloned();
    stored.rename_column(0, SERIES);
    stored.set_series(false);
    (stored, name)
}

fn from_stored(mut table: Table, name: Option<String>) -> Table {
    if table.columns().len() == 1 && table.columns()[0] == SERIES {
        table.rename_column(0, name.as_deref().unwrap_or(SERIES_NAME));
        table.set_series(true);
    }
    table
}

impl Backend for ColumnarBackend {
    fn write(&self, value: &Value, path: &str) -> Result<String> {
        let (path, asof) = split_cutoff(path)?;
        let Value::Table(table) = value else {
            return Err(EncoderError::invalid(
                "ColumnarBackend::write",
                format!("only tables are stored in table files, got {:?}", value),
            ));
        };
        let file = self.locate(path);
        let key = file.to_string_lossy().to_string();
        let (mut stored, name) = to_stored(&stamp_unstamped(table, asof));
        with_lock(&key, || {
            if stored.is_bitemporal() && file.exists() {
                if let Some((old, _)) = Self::load_quietly(&file) {
                    stored = bitemporal_merge(&old, &stored, asof)?;
                }
            }
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut contents = TableFile::from_table(&stored);
            contents.name = name;
            fs::write(&file, serde_json::to_string(&contents)?)?;
            debug!(path = %key, rows = stored.len(), "wrote table file");
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
        let Some((table, name)) = with_lock(&key, || Ok(Self::load_quietly(&file)))? else {
            return Ok(None);
        };
        let table = if cutoff.is_some() || table.is_bitemporal() {
            bitemporal_read(&table, cutoff.map(Cutoff::At), Pick::Last)?
        } else {
            table
        };
        debug!(path = %key, rows = table.len(), "read table file");
        Ok(Some(Value::Table(from_stored(table, name))))
    }
}
