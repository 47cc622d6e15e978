//! The opaque string form.
//!
//! Values that have no plain structural encoding (function and type references,
//! byte blobs, numeric arrays inside JSON, pickled tables) are written as a
//! small JSON text tagged by `_type`, e.g.
//! `{"_type":"function","name":"table_from_bytes"}`. The decoder recognises the
//! form by its leading `{`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::array::{DType, NdArray};
use crate::error::{EncoderError, Result};
use crate::json;
use crate::registry::{self, Registry};
use crate::table::Table;
use crate::value::Value;

#[derive(Serialize, Deserialize)]
#[serde(tag = "_type", rename_all = "snake_case")]
enum Opaque {
    Function { name: String },
    Type { name: String },
    Bytes { b64: String },
    Ndarray { dtype: String, shape: Vec<usize>, b64: String },
    Pickle { b64: String },
}

/// Envelope of a pickled blob.
#[derive(Serialize, Deserialize)]
enum Pickled {
    Table(Table),
    /// Object arrays: the shape and the JSON form of every element, row-major.
    Objects { shape: Vec<usize>, items: Vec<String> },
    /// Any other value, in its JSON form.
    Document(String),
}

/// Pickles a value. Tables keep their exact cells, object array elements and
/// everything else go through the JSON form of `registry`.
pub fn pickle(registry: &Registry, value: &Value) -> Result<Vec<u8>> {
    let envelope = match value {
        Value::Table(table) => Pickled::Table(table.clone()),
        Value::Array(NdArray::Object(array)) => Pickled::Objects {
            shape: array.shape().to_vec(),
            items: array.iter().map(|v| json::dumps_with(registry, v)).collect::<Result<_>>()?,
        },
        other => Pickled::Document(json::dumps_with(registry, other)?),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

fn try_unpickle(registry: &Registry, data: &[u8]) -> Result<Value> {
    match serde_json::from_slice::<Pickled>(data)? {
        Pickled::Table(table) => {
            table.check_shape()?;
            Ok(Value::Table(table))
        }
        Pickled::Objects { shape, items } => {
            let count: usize = shape.iter().product();
            if count != items.len() {
                return Err(EncoderError::Shape(format!(
                    "{} pickled elements for shape {:?}",
                    items.len(),
                    shape
                )));
            }
            let elements = items
                .iter()
                .map(|s| json::loads_with(registry, s))
                .collect::<Result<Vec<_>>>()?;
            let array = ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&shape), elements)?;
            Ok(Value::Array(NdArray::Object(array)))
        }
        Pickled::Document(text) => json::loads_with(registry, &text),
    }
}

/// Unpickles a blob. Anything that does not come back with a sane shape is
/// logged and yields `Null`.
pub fn unpickle(registry: &Registry, data: &[u8]) -> Value {
    match try_unpickle(registry, data) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, bytes = data.len(), "could not unpickle blob");
            Value::Null
        }
    }
}

pub fn to_opaque_with(registry: &Registry, value: &Value) -> Result<String> {
    let opaque = match value {
        Value::Function(name) => Opaque::Function { name: name.clone() },
        Value::Type(name) => Opaque::Type { name: name.clone() },
        Value::Bytes(data) => Opaque::Bytes { b64: STANDARD.encode(data) },
        Value::Array(array) => match array.to_bytes() {
            Some(raw) => Opaque::Ndarray {
                dtype: array.dtype().code().to_string(),
                shape: array.shape().to_vec(),
                b64: STANDARD.encode(raw),
            },
            None => Opaque::Pickle { b64: STANDARD.encode(pickle(registry, value)?) },
        },
        Value::Table(_) => Opaque::Pickle { b64: STANDARD.encode(pickle(registry, value)?) },
        other => {
            return Err(EncoderError::invalid(
                "to_opaque",
                format!("{:?} has no opaque form", other),
            ));
        }
    };
    Ok(serde_json::to_string(&opaque)?)
}

/// [`to_opaque_with`] over the process-wide registry.
pub fn to_opaque(value: &Value) -> Result<String> {
    let registry = registry::global()?;
    to_opaque_with(&registry, value)
}

fn b64(text: &str) -> Result<Vec<u8>> {
    STANDARD.decode(text).map_err(|e| EncoderError::DataCorruption {
        message: format!("bad base64: {}", e),
    })
}

pub fn from_opaque_with(registry: &Registry, text: &str) -> Result<Value> {
    let value = match serde_json::from_str::<Opaque>(text)? {
        Opaque::Function { name } => Value::Function(name),
        Opaque::Type { name } => Value::Type(name),
        Opaque::Bytes { b64: data } => Value::Bytes(b64(&data)?),
        Opaque::Ndarray { dtype, shape, b64: data } => {
            let dtype = DType::from_code(&dtype).ok_or_else(|| EncoderError::DataCorruption {
                message: format!("unknown dtype '{}'", dtype),
            })?;
            match NdArray::from_bytes(&b64(&data)?, dtype, &shape) {
                Ok(array) => Value::Array(array),
                Err(e) => {
                    warn!(error = %e, "could not rebuild array from bytes");
                    Value::Null
                }
            }
        }
        Opaque::Pickle { b64: data } => unpickle(registry, &b64(&data)?),
    };
    Ok(value)
}

pub fn from_opaque(text: &str) -> Result<Value> {
    let registry = registry::global()?;
    from_opaque_with(&registry, text)
}

/// Decodes an opaque-looking string; text that is not in the opaque form
/// is handed back as a string.
pub fn decode_str(registry: &Registry, text: &str) -> Value {
    match from_opaque_with(registry, text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "string looked opaque but did not decode, keeping it as text");
            Value::Str(text.to_string())
        }
    }
}
