//! Maps a value to the one rule the encoder applies to it.

use crate::array::NdArray;
use crate::registry::Registry;
use crate::value::Value;

/// The kind of a value, one per variant. Callers name kinds to keep them unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    DateTime,
    Date,
    Enum,
    List,
    Tuple,
    Map,
    Object,
    Records,
    Table,
    Array,
    Partial,
    Function,
    Type,
}

impl Kind {
    pub fn of(value: &Value) -> Kind {
        match value {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::Str,
            Value::Bytes(_) => Kind::Bytes,
            Value::DateTime(_) => Kind::DateTime,
            Value::Date(_) => Kind::Date,
            Value::Enum(_) => Kind::Enum,
            Value::List(_) => Kind::List,
            Value::Tuple(_) => Kind::Tuple,
            Value::Map(_) => Kind::Map,
            Value::Object(_) => Kind::Object,
            Value::Records(_) => Kind::Records,
            Value::Table(_) => Kind::Table,
            Value::Array(_) => Kind::Array,
            Value::Partial(_) => Kind::Partial,
            Value::Function(_) => Kind::Function,
            Value::Type(_) => Kind::Type,
        }
    }
}

/// Encoding rules, in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    Sequence,
    CustomHook,
    Bool,
    Int,
    Float,
    DateTime,
    Enum,
    Passthrough,
    Unchanged,
    Records,
    Mapping,
    Table,
    ObjectArray,
    NumericArray,
    Partial,
    Opaque,
}

/// First matching rule wins.
pub fn classify(value: &Value, registry: &Registry, unchanged: &[Kind]) -> Rule {
    match value {
        Value::List(_) | Value::Tuple(_) => Rule::Sequence,
        Value::Object(o) if registry.encode_hook(&o.type_name).is_some() => Rule::CustomHook,
        Value::Bool(_) => Rule::Bool,
        Value::Int(_) => Rule::Int,
        Value::Float(_) => Rule::Float,
        Value::DateTime(_) | Value::Date(_) => Rule::DateTime,
        Value::Enum(_) => Rule::Enum,
        Value::Null | Value::Str(_) | Value::Bytes(_) => Rule::Passthrough,
        v if unchanged.contains(&Kind::of(v)) => Rule::Unchanged,
        Value::Records(_) => Rule::Records,
        Value::Map(_) | Value::Object(_) => Rule::Mapping,
        Value::Table(_) => Rule::Table,
        Value::Array(NdArray::Object(_)) => Rule::ObjectArray,
        Value::Array(_) => Rule::NumericArray,
        Value::Partial(_) => Rule::Partial,
        Value::Function(_) | Value::Type(_) => Rule::Opaque,
    }
}
