//! JSON text form of a value, aware of dates and arrays.
//!
//! Dates become `{"_obj": <datetime_from_iso>, "t": "<ISO>"}` and small numeric
//! arrays become nested lists under `array_from_nested`, so both stay readable
//! in stored documents. Everything without a JSON shape goes through the
//! encoder first.

use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::array::DType;
use crate::dates;
use crate::decode::{DateMode, Decoder};
use crate::encode::Encoder;
use crate::error::Result;
use crate::opaque;
use crate::registry::{self, ARRAY_FROM_NESTED, DATETIME_FROM_ISO, Registry};
use crate::value::{Mapping, OBJ, Value};

const MAX_NESTED_RANK: usize = 3;

fn function_tag(registry: &Registry, name: &str) -> Result<Json> {
    Ok(Json::String(opaque::to_opaque_with(registry, &Value::Function(name.to_string()))?))
}

fn jsonify(value: &Value, registry: &Registry) -> Result<Json> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        // NaN and the infinities have no JSON literal
        Value::Float(x) => Number::from_f64(*x).map_or(Json::Null, Json::Number),
        Value::Str(s) => Json::String(s.clone()),
        Value::Bytes(_) | Value::Table(_) => Json::String(opaque::to_opaque_with(registry, value)?),
        Value::DateTime(t) => tagged_date(registry, t)?,
        Value::Date(d) => tagged_date(registry, &dates::midnight(*d))?,
        Value::List(items) | Value::Tuple(items) => {
            Json::Array(items.iter().map(|v| jsonify(v, registry)).collect::<Result<_>>()?)
        }
        Value::Map(fields) => {
            let mut object = JsonMap::with_capacity(fields.len());
            for (key, value) in fields {
                object.insert(key.clone(), jsonify(value, registry)?);
            }
            Json::Object(object)
        }
        Value::Array(array) if array.ndim() == 0 => jsonify(&array.to_nested(), registry)?,
        Value::Array(array) if array.dtype() != DType::Object && array.ndim() <= MAX_NESTED_RANK => {
            let mut object = JsonMap::new();
            object.insert(OBJ.to_string(), function_tag(registry, ARRAY_FROM_NESTED)?);
            object.insert("object".to_string(), jsonify(&array.to_nested(), registry)?);
            object.insert("dtype".to_string(), Json::String(array.dtype().code().to_string()));
            let shape = array.shape().iter().map(|&d| Json::Number(d.into())).collect();
            object.insert("shape".to_string(), Json::Array(shape));
            Json::Object(object)
        }
        Value::Array(_) => Json::String(opaque::to_opaque_with(registry, value)?),
        Value::Enum(_)
        | Value::Object(_)
        | Value::Records(_)
        | Value::Partial(_)
        | Value::Function(_)
        | Value::Type(_) => jsonify(&Encoder::new(registry).encode(value)?, registry)?,
    };
    Ok(json)
}

fn tagged_date(registry: &Registry, t: &chrono::NaiveDateTime) -> Result<Json> {
    let mut object = JsonMap::new();
    object.insert(OBJ.to_string(), function_tag(registry, DATETIME_FROM_ISO)?);
    object.insert("t".to_string(), Json::String(dates::format_iso(t)));
    Ok(Json::Object(object))
}

fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s),
        Json::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        Json::Object(object) => Value::Map(
            object
                .into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<Mapping>(),
        ),
    }
}

pub fn dumps_with(registry: &Registry, value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&jsonify(value, registry)?)?)
}

pub fn loads_with(registry: &Registry, text: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(text)?;
    Decoder::new(registry).date_mode(DateMode::Iso).decode(from_json(json))
}

pub fn dumps(value: &Value) -> Result<String> {
    let registry = registry::global()?;
    dumps_with(&registry, value)
}

pub fn loads(text: &str) -> Result<Value> {
    let registry = registry::global()?;
    loads_with(&registry, text)
}
