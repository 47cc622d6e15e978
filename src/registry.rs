//! Reconstruction registry.
//!
//! Every `_obj` tag in an encoded document names either a function or a type.
//! The registry maps those names to the code that rebuilds the value. It is
//! filled with the built-in reconstructors at start-up and callers register
//! their own types and functions next to them.
//!
//! Reconstructors are called with keyword arguments only. A keyword that the
//! target does not declare is an [`EncoderError::UnexpectedKeyword`]; the
//! decoder uses that to drop stale fields left behind by older schema versions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use tracing::warn;

use crate::array::{DType, NdArray};
use crate::dates;
use crate::error::{EncoderError, Result};
use crate::opaque;
use crate::storage::Backend;
use crate::storage::columnar::ColumnarBackend;
use crate::value::{Mapping, Object, PartialBinding, Records, Value};

pub const TABLE_FROM_BYTES: &str = "table_from_bytes";
pub const ARRAY_FROM_BYTES: &str = "array_from_bytes";
pub const PARTIAL: &str = "partial";
pub const DATETIME_FROM_ISO: &str = "datetime_from_iso";
pub const ARRAY_FROM_NESTED: &str = "array_from_nested";
pub const READ_TABLE_FILE: &str = "read_table_file";
pub const RECORDS: &str = "records";

/// Called with the registry it was resolved from, the positional and the keyword arguments.
pub type Callable = Arc<dyn Fn(&Registry, &[Value], Mapping) -> Result<Value> + Send + Sync>;
pub type Constructor = Arc<dyn Fn(&str, Mapping) -> Result<Value> + Send + Sync>;
pub type EncodeHook = Arc<dyn Fn(&Object) -> Result<Value> + Send + Sync>;

/// Declared parameters of a reconstructor.
#[derive(Clone, Debug, PartialEq)]
pub enum Params {
    /// accepts any keyword
    Any,
    Named(Vec<String>),
}

impl Params {
    pub fn named(names: &[&str]) -> Self {
        Params::Named(names.iter().map(|n| n.to_string()).collect())
    }
    pub fn accepts(&self, keyword: &str) -> bool {
        match self {
            Params::Any => true,
            Params::Named(names) => names.iter().any(|n| n == keyword),
        }
    }
    /// Binds positional arguments to the declared names and checks the keywords.
    fn bind(&self, callable: &str, args: &[Value], mut keywords: Mapping) -> Result<(Vec<Value>, Mapping)> {
        let Params::Named(names) = self else {
            return Ok((args.to_vec(), keywords));
        };
        if args.len() > names.len() {
            return Err(EncoderError::invalid(
                callable,
                format!("takes {} positional arguments but {} were given", names.len(), args.len()),
            ));
        }
        if let Some(keyword) = keywords.keys().find(|k| !self.accepts(k)) {
            return Err(EncoderError::UnexpectedKeyword {
                callable: callable.to_string(),
                keyword: keyword.clone(),
            });
        }
        let mut bound = Mapping::new();
        for (name, arg) in names.iter().zip(args) {
            if keywords.contains_key(name) {
                return Err(EncoderError::invalid(
                    callable,
                    format!("got multiple values for argument '{}'", name),
                ));
            }
            bound.insert(name.clone(), arg.clone());
        }
        bound.extend(keywords.drain(..));
        Ok((Vec::new(), bound))
    }
}

// ------------- Entries -------------
#[derive(Clone)]
pub struct FunctionEntry {
    name: String,
    params: Params,
    call: Callable,
}

impl FunctionEntry {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn params(&self) -> &Params {
        &self.params
    }
    pub fn call(&self, registry: &Registry, args: &[Value], keywords: Mapping) -> Result<Value> {
        let (args, keywords) = self.params.bind(&self.name, args, keywords)?;
        (self.call)(registry, &args, keywords)
    }
}

#[derive(Clone)]
pub struct TypeEntry {
    name: String,
    params: Params,
    construct: Constructor,
    hook: Option<EncodeHook>,
}

impl TypeEntry {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn params(&self) -> &Params {
        &self.params
    }
    pub fn construct(&self, keywords: Mapping) -> Result<Value> {
        let (_, keywords) = self.params.bind(&self.name, &[], keywords)?;
        (self.construct)(&self.name, keywords)
    }
}

/// What an `_obj` tag resolved to.
pub enum Reconstructor<'r> {
    Function(&'r FunctionEntry),
    Type(&'r TypeEntry),
}

impl Reconstructor<'_> {
    pub fn name(&self) -> &str {
        match self {
            Reconstructor::Function(f) => f.name(),
            Reconstructor::Type(t) => t.name(),
        }
    }
    pub fn params(&self) -> &Params {
        match self {
            Reconstructor::Function(f) => f.params(),
            Reconstructor::Type(t) => t.params(),
        }
    }
    pub fn invoke(&self, registry: &Registry, keywords: Mapping) -> Result<Value> {
        match self {
            Reconstructor::Function(f) => f.call(registry, &[], keywords),
            Reconstructor::Type(t) => t.construct(keywords),
        }
    }
}

// ------------- Registry -------------
#[derive(Clone)]
pub struct Registry {
    functions: HashMap<String, FunctionEntry>,
    types: HashMap<String, TypeEntry>,
    legacy_lookup: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn required(callable: &str, keywords: &mut Mapping, argument: &str) -> Result<Value> {
    keywords
        .shift_remove(argument)
        .ok_or_else(|| EncoderError::MissingArgument {
            callable: callable.to_string(),
            argument: argument.to_string(),
        })
}

fn shape_of(callable: &str, value: &Value) -> Result<Vec<usize>> {
    match value {
        Value::List(dims) | Value::Tuple(dims) => dims
            .iter()
            .map(|d| match d {
                Value::Int(n) if *n >= 0 => Ok(*n as usize),
                other => Err(EncoderError::invalid(callable, format!("bad dimension {:?}", other))),
            })
            .collect(),
        Value::Int(n) if *n >= 0 => Ok(vec![*n as usize]),
        other => Err(EncoderError::invalid(callable, format!("bad shape {:?}", other))),
    }
}

fn dtype_of(callable: &str, value: &Value) -> Result<DType> {
    value
        .as_str()
        .and_then(DType::from_code)
        .ok_or_else(|| EncoderError::invalid(callable, format!("unknown dtype {:?}", value)))
}

fn table_from_bytes(registry: &Registry, _: &[Value], mut keywords: Mapping) -> Result<Value> {
    match required(TABLE_FROM_BYTES, &mut keywords, "data")? {
        Value::Bytes(data) => Ok(opaque::unpickle(registry, &data)),
        other => Err(EncoderError::invalid(TABLE_FROM_BYTES, format!("expected bytes, got {:?}", other))),
    }
}

fn array_from_bytes(registry: &Registry, _: &[Value], mut keywords: Mapping) -> Result<Value> {
    let data = required(ARRAY_FROM_BYTES, &mut keywords, "data")?;
    let dtype = dtype_of(ARRAY_FROM_BYTES, &required(ARRAY_FROM_BYTES, &mut keywords, "dtype")?)?;
    let shape = shape_of(ARRAY_FROM_BYTES, &required(ARRAY_FROM_BYTES, &mut keywords, "shape")?)?;
    let Value::Bytes(data) = data else {
        return Err(EncoderError::invalid(ARRAY_FROM_BYTES, "expected bytes for data"));
    };
    if dtype == DType::Object {
        return Ok(opaque::unpickle(registry, &data));
    }
    match NdArray::from_bytes(&data, dtype, &shape) {
        Ok(array) => Ok(Value::Array(array)),
        Err(e) => {
            warn!(error = %e, "could not rebuild array from bytes");
            Ok(Value::Null)
        }
    }
}

fn partial(_: &Registry, _: &[Value], mut keywords: Mapping) -> Result<Value> {
    let func = match required(PARTIAL, &mut keywords, "func")? {
        Value::Function(name) | Value::Str(name) => name,
        other => return Err(EncoderError::invalid(PARTIAL, format!("{:?} is not a function", other))),
    };
    let args = match keywords.shift_remove("args").unwrap_or(Value::List(Vec::new())) {
        Value::List(items) | Value::Tuple(items) => items,
        Value::Null => Vec::new(),
        other => return Err(EncoderError::invalid(PARTIAL, format!("bad args {:?}", other))),
    };
    let bound = match keywords.shift_remove("keywords").unwrap_or(Value::Null) {
        Value::Map(m) => m,
        Value::Null => Mapping::new(),
        other => return Err(EncoderError::invalid(PARTIAL, format!("bad keywords {:?}", other))),
    };
    Ok(Value::Partial(PartialBinding::new(&func, args, bound)))
}

fn datetime_from_iso(_: &Registry, _: &[Value], mut keywords: Mapping) -> Result<Value> {
    match required(DATETIME_FROM_ISO, &mut keywords, "t")? {
        t @ Value::DateTime(_) => Ok(t),
        Value::Date(d) => Ok(Value::DateTime(dates::midnight(d))),
        Value::Str(s) => dates::parse_date(&s)
            .map(Value::DateTime)
            .ok_or_else(|| EncoderError::invalid(DATETIME_FROM_ISO, format!("cannot parse '{}'", s))),
        other => Err(EncoderError::invalid(DATETIME_FROM_ISO, format!("{:?} is not a date", other))),
    }
}

fn array_from_nested(_: &Registry, _: &[Value], mut keywords: Mapping) -> Result<Value> {
    let object = required(ARRAY_FROM_NESTED, &mut keywords, "object")?;
    let dtype = match keywords.shift_remove("dtype") {
        None | Some(Value::Null) => None,
        Some(code) => Some(dtype_of(ARRAY_FROM_NESTED, &code)?),
    };
    let array = NdArray::from_nested(&object, dtype)?;
    // the nesting cannot show the dimensions after an empty one
    match keywords.shift_remove("shape") {
        None | Some(Value::Null) => Ok(Value::Array(array)),
        Some(shape) => Ok(Value::Array(array.reshape(&shape_of(ARRAY_FROM_NESTED, &shape)?)?)),
    }
}

fn read_table_file(_: &Registry, _: &[Value], mut keywords: Mapping) -> Result<Value> {
    match required(READ_TABLE_FILE, &mut keywords, "path")? {
        Value::Str(path) => Ok(ColumnarBackend::new().read(&path)?.unwrap_or(Value::Null)),
        other => Err(EncoderError::invalid(READ_TABLE_FILE, format!("bad path {:?}", other))),
    }
}

fn records(_: &str, mut keywords: Mapping) -> Result<Value> {
    let order = match keywords.shift_remove("columns") {
        Some(Value::List(items)) | Some(Value::Tuple(items)) => Some(
            items
                .into_iter()
                .map(|c| match c {
                    Value::Str(s) => Ok(s),
                    other => Err(EncoderError::invalid(RECORDS, format!("bad column {:?}", other))),
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        _ => None,
    };
    Ok(Value::Records(Records::from_mapping(keywords, order)?))
}

fn object(type_name: &str, keywords: Mapping) -> Result<Value> {
    Ok(Value::Object(Object {
        type_name: type_name.to_string(),
        state: keywords,
    }))
}

impl Registry {
    /// An empty registry, without even the built-in reconstructors.
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
            types: HashMap::new(),
            legacy_lookup: true,
        }
    }
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_function(TABLE_FROM_BYTES, &["data"], table_from_bytes);
        registry.register_function(ARRAY_FROM_BYTES, &["data", "dtype", "shape"], array_from_bytes);
        registry.register_function(PARTIAL, &["func", "args", "keywords"], partial);
        registry.register_function(DATETIME_FROM_ISO, &["t"], datetime_from_iso);
        registry.register_function(ARRAY_FROM_NESTED, &["object", "dtype", "shape"], array_from_nested);
        registry.register_function(READ_TABLE_FILE, &["path"], read_table_file);
        registry.register_type_with(RECORDS, Params::Any, records);
        registry
    }
    pub fn register_function<F>(&mut self, name: &str, params: &[&str], call: F)
    where
        F: Fn(&Registry, &[Value], Mapping) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert_function(name, Params::named(params), Arc::new(call));
    }
    /// A function that takes any positional and keyword arguments.
    pub fn register_variadic_function<F>(&mut self, name: &str, call: F)
    where
        F: Fn(&Registry, &[Value], Mapping) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert_function(name, Params::Any, Arc::new(call));
    }
    fn insert_function(&mut self, name: &str, params: Params, call: Callable) {
        self.functions.insert(
            name.to_string(),
            FunctionEntry {
                name: name.to_string(),
                params,
                call,
            },
        );
    }
    /// Registers a type whose values are plain [`Object`]s. `None` accepts any field.
    pub fn register_type(&mut self, name: &str, params: Option<&[&str]>) {
        let params = params.map_or(Params::Any, Params::named);
        self.register_type_with(name, params, object);
    }
    pub fn register_type_with<F>(&mut self, name: &str, params: Params, construct: F)
    where
        F: Fn(&str, Mapping) -> Result<Value> + Send + Sync + 'static,
    {
        let hook = self.types.get(name).and_then(|t| t.hook.clone());
        self.types.insert(
            name.to_string(),
            TypeEntry {
                name: name.to_string(),
                params,
                construct: Arc::new(construct),
                hook,
            },
        );
    }
    /// Lets objects of a registered type serialize themselves.
    pub fn set_encode_hook<F>(&mut self, type_name: &str, hook: F) -> Result<()>
    where
        F: Fn(&Object) -> Result<Value> + Send + Sync + 'static,
    {
        let entry = self.types.get_mut(type_name).ok_or_else(|| EncoderError::Unresolved {
            identifier: type_name.to_string(),
        })?;
        entry.hook = Some(Arc::new(hook));
        Ok(())
    }
    pub fn set_legacy_lookup(&mut self, enabled: bool) {
        self.legacy_lookup = enabled;
    }
    pub fn legacy_lookup(&self) -> bool {
        self.legacy_lookup
    }
    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name)
    }
    pub fn type_entry(&self, name: &str) -> Option<&TypeEntry> {
        self.types.get(name)
    }
    pub fn encode_hook(&self, type_name: &str) -> Option<&EncodeHook> {
        self.types.get(type_name).and_then(|t| t.hook.as_ref())
    }
    pub fn call_function(&self, name: &str, args: &[Value], keywords: Mapping) -> Result<Value> {
        let entry = self.resolve_function(name)?;
        entry.call(self, args, keywords)
    }

    fn resolve_function(&self, name: &str) -> Result<&FunctionEntry> {
        if let Some(entry) = self.functions.get(name) {
            return Ok(entry);
        }
        match self.trailing_lookup(name) {
            Some(Reconstructor::Function(f)) => Ok(f),
            _ => Err(EncoderError::Unresolved { identifier: name.to_string() }),
        }
    }

    /// Maps an `_obj` tag to its reconstructor.
    pub fn resolve(&self, reference: &Value) -> Result<Reconstructor<'_>> {
        match reference {
            Value::Function(name) => self.resolve_function(name).map(Reconstructor::Function),
            Value::Type(name) => match self.types.get(name) {
                Some(entry) => Ok(Reconstructor::Type(entry)),
                None => self.trailing_or_error(name),
            },
            Value::Str(text) => {
                let identifier = legacy_identifier(text).unwrap_or_else(|| text.trim().to_string());
                self.resolve_identifier(&identifier)
            }
            Value::Map(legacy) => match legacy.values().next() {
                Some(Value::Str(identifier)) => self.resolve_identifier(identifier),
                _ => Err(EncoderError::Unresolved { identifier: format!("{:?}", reference) }),
            },
            other => Err(EncoderError::Unresolved { identifier: format!("{:?}", other) }),
        }
    }

    fn resolve_identifier(&self, identifier: &str) -> Result<Reconstructor<'_>> {
        if let Some(entry) = self.types.get(identifier) {
            return Ok(Reconstructor::Type(entry));
        }
        if let Some(entry) = self.functions.get(identifier) {
            return Ok(Reconstructor::Function(entry));
        }
        self.trailing_or_error(identifier)
    }

    fn trailing_or_error(&self, identifier: &str) -> Result<Reconstructor<'_>> {
        self.trailing_lookup(identifier).ok_or_else(|| EncoderError::Unresolved {
            identifier: identifier.to_string(),
        })
    }

    // Last resort for identifiers written by older producers: match on the final
    // dotted component only. Types win over functions, and a tail shared by
    // several names of the same kind resolves to nothing.
    fn trailing_lookup(&self, identifier: &str) -> Option<Reconstructor<'_>> {
        if !self.legacy_lookup {
            return None;
        }
        let short = identifier.rsplit('.').next()?;
        let tail_matches = |name: &str| name.rsplit('.').next() == Some(short);
        let mut types: Vec<&TypeEntry> = self.types.values().filter(|t| tail_matches(&t.name)).collect();
        let mut functions: Vec<&FunctionEntry> =
            self.functions.values().filter(|f| tail_matches(&f.name)).collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        let candidates: Vec<&str> = if types.is_empty() {
            functions.iter().map(|f| f.name()).collect()
        } else {
            types.iter().map(|t| t.name()).collect()
        };
        if candidates.len() > 1 {
            warn!(identifier, ?candidates, "trailing name is ambiguous, not resolving");
            return None;
        }
        let found = match (types.first(), functions.first()) {
            (Some(&t), _) => Reconstructor::Type(t),
            (None, Some(&f)) => Reconstructor::Function(f),
            (None, None) => return None,
        };
        warn!(identifier, resolved = found.name(), "resolved reconstruction tag by its trailing name");
        Some(found)
    }
}

// `{"<kind>": "<dotted.name>"}` as written by older producers
fn legacy_identifier(text: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(text).ok()? {
        serde_json::Value::Object(map) => map.values().next()?.as_str().map(str::to_string),
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }
}

// ------------- Global registry -------------
lazy_static! {
    static ref GLOBAL: RwLock<Arc<Registry>> = RwLock::new(Arc::new(Registry::with_builtins()));
}

/// A snapshot of the process-wide registry used by the free `encode`/`decode`
/// functions. The lock is only held while the snapshot is taken, so
/// reconstructors may themselves decode.
pub fn global() -> Result<Arc<Registry>> {
    let guard = GLOBAL.read().map_err(|e| EncoderError::Lock(e.to_string()))?;
    Ok(Arc::clone(&guard))
}

/// Registers into the process-wide registry. Snapshots already handed out
/// keep their old contents.
pub fn configure_global<R>(configure: impl FnOnce(&mut Registry) -> R) -> Result<R> {
    let mut guard = GLOBAL.write().map_err(|e| EncoderError::Lock(e.to_string()))?;
    Ok(configure(Arc::make_mut(&mut guard)))
}
