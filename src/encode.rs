//! Value → encoded form.
//!
//! The encoded form only uses null, booleans, numbers, strings, byte blobs,
//! date-times, sequences and string-keyed mappings. Anything else becomes a
//! mapping tagged with `_obj`, the opaque reference to whatever rebuilds it.

use crate::classify::{Kind, Rule, classify};
use crate::dates;
use crate::error::{EncoderError, Result};
use crate::opaque;
use crate::registry::{self, ARRAY_FROM_BYTES, PARTIAL, RECORDS, Registry, TABLE_FROM_BYTES};
use crate::value::{Mapping, OBJ, Value};


pub struct Encoder<'r> {
    registry: &'r Registry,
    unchanged_kinds: Vec<Kind>,
    unchanged_keys: Vec<String>,
}

impl<'r> Encoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            unchanged_kinds: Vec::new(),
            unchanged_keys: Vec::new(),
        }
    }
    /// Values of these kinds are passed through as they are.
    pub fn unchanged_kinds(mut self, kinds: &[Kind]) -> Self {
        self.unchanged_kinds = kinds.to_vec();
        self
    }
    /// Mapping fields with these names are kept verbatim.
    pub fn unchanged_keys<S: AsRef<str>>(mut self, keys: &[S]) -> Self {
        self.unchanged_keys = keys.iter().map(|k| k.as_ref().to_string()).collect();
        self
    }

    fn reference(&self, value: Value) -> Result<Value> {
        Ok(Value::Str(opaque::to_opaque_with(self.registry, &value)?))
    }

    fn fields(&self, fields: &Mapping) -> Result<Mapping> {
        let mut encoded = Mapping::with_capacity(fields.len() + 1);
        for (key, value) in fields {
            let value = if self.unchanged_keys.iter().any(|k| k == key) {
                value.clone()
            } else {
                self.encode(value)?
            };
            encoded.insert(key.clone(), value);
        }
        Ok(encoded)
    }

    pub fn encode(&self, value: &Value) -> Result<Value> {
        let rule = classify(value, self.registry, &self.unchanged_kinds);
        match (rule, value) {
            (Rule::Sequence, Value::List(items)) => {
                Ok(Value::List(items.iter().map(|v| self.encode(v)).collect::<Result<_>>()?))
            }
            (Rule::Sequence, Value::Tuple(items)) => {
                Ok(Value::Tuple(items.iter().map(|v| self.encode(v)).collect::<Result<_>>()?))
            }
            (Rule::CustomHook, Value::Object(object)) => {
                let hook = self
                    .registry
                    .encode_hook(&object.type_name)
                    .ok_or_else(|| EncoderError::Invariant(format!("hook for '{}' vanished", object.type_name)))?;
                hook(object)
            }
            (Rule::Bool | Rule::Int | Rule::Float, v) => Ok(v.clone()),
            (Rule::DateTime, Value::Date(d)) => Ok(Value::DateTime(dates::midnight(*d))),
            (Rule::DateTime, v) => Ok(v.clone()),
            (Rule::Enum, Value::Enum(member)) => self.encode(&member.value),
            (Rule::Passthrough | Rule::Unchanged, v) => Ok(v.clone()),
            (Rule::Records, Value::Records(records)) => {
                let mut encoded = self.fields(records.fields())?;
                if !encoded.contains_key(OBJ) {
                    encoded.insert(OBJ.to_string(), self.reference(Value::Type(RECORDS.to_string()))?);
                }
                let columns = records.columns().iter().map(|c| Value::Str(c.clone())).collect();
                encoded.insert("columns".to_string(), Value::List(columns));
                Ok(Value::Map(encoded))
            }
            (Rule::Mapping, Value::Map(fields)) => Ok(Value::Map(self.fields(fields)?)),
            (Rule::Mapping, Value::Object(object)) => {
                let mut encoded = self.fields(&object.state)?;
                if !encoded.contains_key(OBJ) {
                    encoded.insert(OBJ.to_string(), self.reference(Value::Type(object.type_name.clone()))?);
                }
                Ok(Value::Map(encoded))
            }
            (Rule::Table | Rule::ObjectArray, v) => Ok(Value::map([
                ("data", Value::Bytes(opaque::pickle(self.registry, v)?)),
                (OBJ, self.reference(Value::Function(TABLE_FROM_BYTES.to_string()))?),
            ])),
            (Rule::NumericArray, Value::Array(array)) => {
                let data = array
                    .to_bytes()
                    .ok_or_else(|| EncoderError::Invariant("numeric array without raw bytes".to_string()))?;
                let shape = array.shape().iter().map(|&d| Value::Int(d as i64)).collect();
                Ok(Value::map([
                    ("data", Value::Bytes(data)),
                    ("shape", Value::List(shape)),
                    ("dtype", Value::Str(array.dtype().code().to_string())),
                    (OBJ, self.reference(Value::Function(ARRAY_FROM_BYTES.to_string()))?),
                ]))
            }
            (Rule::Partial, Value::Partial(binding)) => Ok(Value::map([
                (OBJ, self.reference(Value::Function(PARTIAL.to_string()))?),
                ("func", self.reference(Value::Function(binding.func.clone()))?),
                ("args", self.encode(&Value::Tuple(binding.args.clone()))?),
                ("keywords", self.encode(&Value::Map(binding.keywords.clone()))?),
            ])),
            (Rule::Opaque, v) => self.reference(v.clone()),
            (rule, v) => Err(EncoderError::Invariant(format!("rule {:?} does not apply to {:?}", rule, v))),
        }
    }
}

/// Encodes with the process-wide registry.
pub fn encode(value: &Value) -> Result<Value> {
    let registry = registry::global()?;
    Encoder::new(&registry).encode(value)
}
