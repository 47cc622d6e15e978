//! Spills the tables of a document to table files.
//!
//! Every table leaf is written under the document's root path and replaced by
//! a stub, `{"_obj": <read_table_file>, "path": ...}`. Decoding the document
//! later reads the tables back in.

use crate::dates;
use crate::error::Result;
use crate::opaque;
use crate::registry::READ_TABLE_FILE;
use crate::storage::columnar::{ColumnarBackend, EXTENSION};
use crate::storage::path::{check_path, root_path};
use crate::storage::{Backend, split_cutoff};
use crate::value::{Mapping, OBJ, Value};

pub const ROOT: &str = "root";

/// The root path template a document carries in its `root` field.
pub fn find_root(document: &Mapping) -> Option<&str> {
    document.get(ROOT).and_then(Value::as_str)
}

fn spill(value: &Value, path: &str, asof: Option<&str>, backend: &ColumnarBackend) -> Result<Value> {
    let path = path.strip_suffix(EXTENSION).unwrap_or(path).trim_end_matches('/');
    match value {
        Value::Table(_) => {
            let path = check_path(path)?;
            let target = match asof {
                Some(asof) => format!("{}@{}", path, asof),
                None => path.to_string(),
            };
            let written = backend.write(value, &target)?;
            Ok(Value::map([
                (OBJ, Value::Str(opaque::to_opaque(&Value::Function(READ_TABLE_FILE.to_string()))?)),
                ("path", Value::Str(written)),
            ]))
        }
        Value::Map(fields) => {
            let mut spilled = Mapping::with_capacity(fields.len());
            for (key, field) in fields {
                spilled.insert(key.clone(), spill(field, &format!("{}/{}", path, key), asof, backend)?);
            }
            Ok(Value::Map(spilled))
        }
        Value::List(items) | Value::Tuple(items) => {
            let spilled = items
                .iter()
                .enumerate()
                .map(|(i, item)| spill(item, &format!("{}/{}", path, i), asof, backend))
                .collect::<Result<Vec<_>>>()?;
            Ok(match value {
                Value::Tuple(_) => Value::Tuple(spilled),
                _ => Value::List(spilled),
            })
        }
        other => Ok(other.clone()),
    }
}

/// Writes the tables of `document` under its root. `root` is used when the
/// document names none; without either the document comes back as it is.
/// A root ending in `@asof` stamps every table written.
pub fn write_document(document: &Mapping, root: Option<&str>, backend: &ColumnarBackend) -> Result<Value> {
    let Some(template) = find_root(document).or(root) else {
        return Ok(Value::Map(document.clone()));
    };
    let (template, asof) = split_cutoff(template)?;
    let asof = asof.map(|t| dates::format_iso(&t));
    let path = root_path(document, template, None);
    spill(&Value::Map(document.clone()), &path, asof.as_deref(), backend)
}
