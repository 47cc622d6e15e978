//! Bitemporal encoders – self-describing encoding of arbitrary values, with a
//! bitemporal model for tabular data.
//!
//! Values of any kind (scalars, dates, tables, n-dimensional arrays, partial
//! function bindings, typed objects) are encoded into a plain nested form of
//! mappings, sequences, primitives and byte blobs that a document store or a
//! JSON file can hold. Mappings that stand for something richer carry the
//! reserved `_obj` key naming the function or type that rebuilds them, so
//! `decode(encode(v)) == v`.
//!
//! ## Modules
//! * [`value`] – The closed [`value::Value`] enum and its composite kinds.
//! * [`table`] – Row-indexed tables of [`table::Scalar`] cells.
//! * [`array`] – Typed n-dimensional arrays and their raw byte layout.
//! * [`registry`] – Names → reconstruction functions and types.
//! * [`encode`] / [`decode`] – The round-trip engine.
//! * [`json`] – Date- and array-aware JSON text form.
//! * [`bitemporal`] – Reading a bitemporal table as of a cutoff, and detecting
//!   which rows of a new batch are real updates.
//! * [`storage`] – Table files, SQLite documents, path templating, per-path locks.
//!
//! ## Bitemporal tables
//! A table with an `_asof` column holds several versions of each row. Reading
//! it as of a cutoff keeps, per index key, the latest version known at that
//! time. Writing a new batch keeps only the rows that change what was known.
//!
//! ## Quick Start
//! ```
//! use bitemporal_encoders::{decode, encode, DateMode, Scalar, Table, Value};
//!
//! let table = Table::from_columns(
//!     vec![Scalar::Int(1), Scalar::Int(2)],
//!     vec![("a".to_string(), vec![Scalar::Float(0.5), Scalar::Float(1.5)])],
//! ).unwrap();
//! let value = Value::map([("key", Value::from("prices")), ("data", Value::Table(table))]);
//! let encoded = encode(&value).unwrap();
//! assert_eq!(decode(encoded, DateMode::Off).unwrap(), value);
//! ```

pub mod array;
pub mod bitemporal;
pub mod classify;
pub mod dates;
pub mod decode;
pub mod encode;
pub mod error;
pub mod json;
pub mod opaque;
pub mod registry;
pub mod settings;
pub mod storage;
pub mod table;
pub mod value;

pub use array::{DType, NdArray};
pub use bitemporal::{Cutoff, Pick, bitemporal_merge, bitemporal_read, bitemporal_updates};
pub use decode::{DateMode, Decoder, decode};
pub use encode::{Encoder, encode};
pub use error::{EncoderError, Result};
pub use json::{dumps, loads};
pub use registry::Registry;
pub use table::{Scalar, Table};
pub use value::{Mapping, Value};
