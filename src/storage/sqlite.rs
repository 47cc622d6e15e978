// used for persistence
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::bitemporal::{Cutoff, Pick, bitemporal_merge, bitemporal_read};
use crate::dates;
use crate::error::{EncoderError, Result};
use crate::json;
use crate::storage::locks::with_lock;
use crate::storage::{Backend, read_cutoff, split_cutoff, stamp_unstamped};
use crate::value::Value;

// ------------- SQLite documents -------------
/// Stores each value as the JSON text form under its path, one row per path.
pub struct SqliteBackend {
    connection: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }
    fn init(connection: Connection) -> Result<Self> {
        connection.execute_batch(
            "
            create table if not exists Document (
                Path text not null,
                Body text not null,
                Written text not null,
                constraint referenceable_Path primary key (
                    Path
                )
            );
            ",
        )?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn body(connection: &Connection, path: &str) -> Result<Option<String>> {
        Ok(connection
            .query_row("select Body from Document where Path = ?", params![path], |row| row.get(0))
            .optional()?)
    }

    fn stored(connection: &Connection, path: &str) -> Result<Option<Value>> {
        let Some(body) = Self::body(connection, path)? else {
            warn!(path, "nothing stored under path");
            return Ok(None);
        };
        match json::loads(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(path, error = %e, "unable to decode stored document");
                Ok(None)
            }
        }
    }
}

impl Backend for SqliteBackend {
    fn write(&self, value: &Value, path: &str) -> Result<String> {
        let (path, asof) = split_cutoff(path)?;
        with_lock(path, || {
            let connection = self.connection.lock().map_err(|e| EncoderError::Lock(e.to_string()))?;
            let value = match value {
                Value::Table(table) => {
                    let table = stamp_unstamped(table, asof);
                    let merged = match Self::body(&connection, path)? {
                        Some(body) if table.is_bitemporal() => match json::loads(&body) {
                            Ok(Value::Table(old)) => bitemporal_merge(&old, &table, asof)?,
                            _ => table,
                        },
                        _ => table,
                    };
                    Value::Table(merged)
                }
                other => other.clone(),
            };
            connection.execute(
                "
                insert into Document (Path, Body, Written) values (?1, ?2, ?3)
                on conflict (Path) do update set Body = excluded.Body, Written = excluded.Written
                ",
                params![path, json::dumps(&value)?, dates::format_iso(&dates::now())],
            )?;
            debug!(path, "wrote document");
            Ok(())
        })?;
        Ok(path.to_string())
    }

    fn read(&self, path: &str) -> Result<Option<Value>> {
        let Some((path, cutoff)) = read_cutoff(path) else {
            return Ok(None);
        };
        let stored = with_lock(path, || {
            let connection = self.connection.lock().map_err(|e| EncoderError::Lock(e.to_string()))?;
            Self::stored(&connection, path)
        })?;
        match stored {
            Some(Value::Table(table)) if cutoff.is_some() || table.is_bitemporal() => Ok(Some(Value::Table(
                bitemporal_read(&table, cutoff.map(Cutoff::At), Pick::Last)?,
            ))),
            other => Ok(other),
        }
    }
}
