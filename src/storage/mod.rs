//! Where encoded values live: table files, pickled blobs and SQLite documents.
//!
//! A backend writes a value under a path and reads it back. Paths may carry an
//! `@cutoff` suffix (`prices@2024-01-31`, `prices@now`): reads return the
//! bitemporal view as of the cutoff, writes stamp an unstamped table with it.

pub mod columnar;
pub mod document;
pub mod locks;
pub mod path;
pub mod pickle;
pub mod sqlite;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::dates;
use crate::error::{EncoderError, Result};
use crate::table::Table;
use crate::value::Value;

pub trait Backend {
    /// Writes the value and returns the path it was written to.
    fn write(&self, value: &Value, path: &str) -> Result<String>;
    /// `None` when nothing readable is stored under the path.
    fn read(&self, path: &str) -> Result<Option<Value>>;
}

/// Splits `path@cutoff` into the path and the parsed cutoff.
pub fn split_cutoff(path: &str) -> Result<(&str, Option<NaiveDateTime>)> {
    match path.rsplit_once('@') {
        None => Ok((path, None)),
        Some((path, cutoff)) => {
            let cutoff = dates::parse_date(cutoff).ok_or_else(|| {
                EncoderError::invalid("split_cutoff", format!("'{}' is not a date", cutoff))
            })?;
            Ok((path, Some(cutoff)))
        }
    }
}

/// [`split_cutoff`] for reads: an unparseable cutoff is logged and reads nothing.
pub(crate) fn read_cutoff(path: &str) -> Option<(&str, Option<NaiveDateTime>)> {
    match split_cutoff(path) {
        Ok(split) => Some(split),
        Err(e) => {
            warn!(path, error = %e, "unreadable path");
            None
        }
    }
}

pub(crate) fn stamp_unstamped(table: &Table, asof: Option<NaiveDateTime>) -> Table {
    match asof {
        Some(asof) if !table.is_bitemporal() => table.stamp(asof),
        _ => table.clone(),
    }
}
