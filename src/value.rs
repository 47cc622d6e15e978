// used for timestamps and calendar dates
use chrono::{NaiveDate, NaiveDateTime};
// ordered key -> value mappings, keys unique
use indexmap::IndexMap;

use crate::array::NdArray;
use crate::error::{EncoderError, Result};
use crate::registry::Registry;
use crate::table::{Scalar, Table};

/// Reserved key naming the reconstruction function or type of an encoded mapping.
pub const OBJ: &str = "_obj";

pub type Mapping = IndexMap<String, Value>;

// ------------- Value -------------
/// Any in-memory datum that can be persisted. Every kind has exactly one variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Enum(EnumMember),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// The generic, untyped mapping
    Map(Mapping),
    /// A mapping whose runtime type is a registered type
    Object(Object),
    Records(Records),
    Table(Table),
    Array(NdArray),
    Partial(PartialBinding),
    /// Reference to a registered function
    Function(String),
    /// Reference to a registered type
    Type(String),
}

impl Value {
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Value::Map(m) => Some(m),
            Value::Object(o) => Some(&o.state),
            _ => None,
        }
    }
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self { Value::Float(x) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_string()) }
}
impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s) }
}
impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self { Value::DateTime(t) }
}
impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self { Value::Date(d) }
}
impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self { Value::List(items) }
}
impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self { Value::Map(m) }
}
impl From<Table> for Value {
    fn from(t: Table) -> Self { Value::Table(t) }
}
impl From<NdArray> for Value {
    fn from(a: NdArray) -> Self { Value::Array(a) }
}
impl From<Object> for Value {
    fn from(o: Object) -> Self { Value::Object(o) }
}
impl From<Records> for Value {
    fn from(r: Records) -> Self { Value::Records(r) }
}
impl From<PartialBinding> for Value {
    fn from(p: PartialBinding) -> Self { Value::Partial(p) }
}
impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::Int(i),
            Scalar::Float(x) => Value::Float(x),
            Scalar::Str(s) => Value::Str(s),
            Scalar::DateTime(t) => Value::DateTime(t),
        }
    }
}
impl TryFrom<&Value> for Scalar {
    type Error = EncoderError;
    fn try_from(value: &Value) -> Result<Scalar> {
        match value {
            Value::Null => Ok(Scalar::Null),
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
            Value::Int(i) => Ok(Scalar::Int(*i)),
            Value::Float(x) => Ok(Scalar::Float(*x)),
            Value::Str(s) => Ok(Scalar::Str(s.clone())),
            Value::DateTime(t) => Ok(Scalar::DateTime(*t)),
            Value::Date(d) => Ok(Scalar::DateTime(d.and_time(chrono::NaiveTime::MIN))),
            other => Err(EncoderError::invalid("scalar", format!("{:?} is not a scalar", other))),
        }
    }
}

// ------------- Enumeration member -------------
#[derive(Clone, Debug, PartialEq)]
pub struct EnumMember {
    pub type_name: String,
    pub name: String,
    pub value: Box<Value>,
}

impl EnumMember {
    pub fn new(type_name: &str, name: &str, value: Value) -> Self {
        Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
            value: Box::new(value),
        }
    }
}

// ------------- Object -------------
/// A typed mapping: the name of a registered type plus its field state.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub type_name: String,
    pub state: Mapping,
}

impl Object {
    pub fn new<K: Into<String>>(type_name: &str, state: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            type_name: type_name.to_string(),
            state: state.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.state.get(field)
    }
}

// ------------- Records -------------
/// A table of records: named columns of equal length, kept in column order.
#[derive(Clone, Debug, PartialEq)]
pub struct Records {
    columns: Vec<String>,
    fields: Mapping,
}

impl Records {
    pub fn new<K: Into<String>>(columns: impl IntoIterator<Item = (K, Vec<Value>)>) -> Result<Self> {
        let fields: Mapping = columns
            .into_iter()
            .map(|(k, v)| (k.into(), Value::List(v)))
            .collect();
        Self::from_mapping(fields, None)
    }
    /// Non-sequence fields are broadcast to the common column length.
    pub fn from_mapping(fields: Mapping, order: Option<Vec<String>>) -> Result<Self> {
        let len = fields
            .values()
            .filter_map(|v| match v {
                Value::List(items) | Value::Tuple(items) => Some(items.len()),
                _ => None,
            })
            .max()
            .unwrap_or(1);
        let mut broadcast = Mapping::new();
        for (key, value) in fields {
            let column = match value {
                Value::List(items) | Value::Tuple(items) => {
                    if items.len() != len {
                        return Err(EncoderError::Shape(format!(
                            "records column '{}' has {} items, expected {}",
                            key,
                            items.len(),
                            len
                        )));
                    }
                    items
                }
                scalar => vec![scalar; len],
            };
            broadcast.insert(key, Value::List(column));
        }
        let columns = match order {
            Some(order) => {
                if order.len() != broadcast.len() || order.iter().any(|c| !broadcast.contains_key(c)) {
                    return Err(EncoderError::invalid(
                        "records",
                        format!("columns {:?} do not match fields", order),
                    ));
                }
                broadcast.sort_by(|a, _, b, _| {
                    let pa = order.iter().position(|c| c == a);
                    let pb = order.iter().position(|c| c == b);
                    pa.cmp(&pb)
                });
                order
            }
            None => broadcast.keys().cloned().collect(),
        };
        Ok(Self { columns, fields: broadcast })
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn fields(&self) -> &Mapping {
        &self.fields
    }
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        match self.fields.get(name) {
            Some(Value::List(items)) => Some(items),
            _ => None,
        }
    }
    pub fn len(&self) -> usize {
        self.columns
            .first()
            .and_then(|c| self.column(c))
            .map_or(0, |items| items.len())
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ------------- Partial-function binding -------------
/// A registered function together with bound positional and keyword arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialBinding {
    pub func: String,
    pub args: Vec<Value>,
    pub keywords: Mapping,
}

impl PartialBinding {
    pub fn new(func: &str, args: Vec<Value>, keywords: Mapping) -> Self {
        Self {
            func: func.to_string(),
            args,
            keywords,
        }
    }
    /// Calls the bound function: bound positionals first, then `args`; call
    /// keywords override bound ones.
    pub fn call(&self, registry: &Registry, args: &[Value], keywords: Mapping) -> Result<Value> {
        let mut all_args = self.args.clone();
        all_args.extend_from_slice(args);
        let mut all_keywords = self.keywords.clone();
        all_keywords.extend(keywords);
        registry.call_function(&self.func, &all_args, all_keywords)
    }
}
