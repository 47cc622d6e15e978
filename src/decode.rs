//! Encoded form → value.

use regex::Regex;
use tracing::debug;

use crate::dates::{self, ISO, ISO_QUOTE};
use crate::error::{EncoderError, Result};
use crate::opaque;
use crate::registry::{self, Registry};
use crate::value::{Mapping, OBJ, Value};

/// How strings are tried as dates.
#[derive(Clone, Debug, Default)]
pub enum DateMode {
    /// strings stay strings
    #[default]
    Off,
    /// ISO-8601 text, also while still wrapped in JSON quotes
    Iso,
    /// text matching the pattern goes through the lenient date parser
    Matching(Regex),
}

pub struct Decoder<'r> {
    registry: &'r Registry,
    date_mode: DateMode,
}

impl<'r> Decoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            date_mode: DateMode::Off,
        }
    }
    pub fn date_mode(mut self, mode: DateMode) -> Self {
        self.date_mode = mode;
        self
    }

    fn string(&self, text: String) -> Result<Value> {
        if text.starts_with('{') {
            return match opaque::decode_str(self.registry, &text) {
                Value::Str(text) => Ok(Value::Str(text)),
                decoded => self.decode(decoded),
            };
        }
        if text == "null" {
            return Ok(Value::Null);
        }
        let parsed = match &self.date_mode {
            DateMode::Off => None,
            DateMode::Iso if ISO.is_match(&text) => dates::parse_iso(&text),
            DateMode::Iso if ISO_QUOTE.is_match(&text) => dates::parse_iso(text.trim_matches('"')),
            DateMode::Iso => None,
            DateMode::Matching(pattern) if pattern.is_match(&text) => dates::parse_date(&text),
            DateMode::Matching(_) => None,
        };
        Ok(parsed.map_or(Value::Str(text), Value::DateTime))
    }

    fn reconstruct(&self, tag: &Value, keywords: Mapping) -> Result<Value> {
        let target = self.registry.resolve(tag)?;
        match target.invoke(self.registry, keywords.clone()) {
            Err(EncoderError::UnexpectedKeyword { keyword, .. }) => {
                let params = target.params();
                let (kept, dropped): (Mapping, Mapping) =
                    keywords.into_iter().partition(|(k, _)| params.accepts(k));
                debug!(
                    reconstructor = target.name(),
                    %keyword,
                    dropped = ?dropped.keys().collect::<Vec<_>>(),
                    "retrying reconstruction without stale fields"
                );
                target.invoke(self.registry, kept)
            }
            result => result,
        }
    }

    pub fn decode(&self, value: Value) -> Result<Value> {
        match value {
            Value::Str(text) => self.string(text),
            Value::List(items) => Ok(Value::List(
                items.into_iter().map(|v| self.decode(v)).collect::<Result<_>>()?,
            )),
            Value::Tuple(items) => Ok(Value::Tuple(
                items.into_iter().map(|v| self.decode(v)).collect::<Result<_>>()?,
            )),
            Value::Map(fields) => {
                let mut decoded = Mapping::with_capacity(fields.len());
                for (key, value) in fields {
                    decoded.insert(key, self.decode(value)?);
                }
                match decoded.shift_remove(OBJ) {
                    Some(tag) => self.reconstruct(&tag, decoded),
                    None => Ok(Value::Map(decoded)),
                }
            }
            other => Ok(other),
        }
    }
}

/// Decodes with the process-wide registry.
pub fn decode(value: Value, mode: DateMode) -> Result<Value> {
    let registry = registry::global()?;
    Decoder::new(&registry).date_mode(mode).decode(value)
}

