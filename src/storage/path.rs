//! Storage paths templated from document fields.
//!
//! `%school/%pupil.name` or `%(school)/%(pupil.name)` are replaced by the
//! document's `school` and `pupil.name` values.

use crate::error::{EncoderError, Result};
use crate::value::{Mapping, Value};

const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";

fn leaves(prefix: &str, fields: &Mapping, out: &mut Vec<(String, String)>, fmt: &str) {
    for (key, value) in fields {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let text = match value {
            Value::Map(_) | Value::Object(_) => {
                if let Some(nested) = value.as_map() {
                    leaves(&path, nested, out, fmt);
                }
                continue;
            }
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(t) => t.format(fmt).to_string(),
            Value::Date(d) => d.format(fmt).to_string(),
            Value::Enum(member) => member.name.clone(),
            _ => continue,
        };
        out.push((path, text.replace(':', "")));
    }
}

/// Substitutes document fields into the template, longest field paths first.
/// Dates are written with `fmt`, `%Y%m%d` by default.
pub fn root_path(document: &Mapping, template: &str, fmt: Option<&str>) -> String {
    let mut fields = Vec::new();
    leaves("", document, &mut fields, fmt.unwrap_or(DEFAULT_DATE_FORMAT));
    fields.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| b.cmp(a)));
    let mut path = template.to_string();
    for (field, text) in fields {
        path = path
            .replace(&format!("%({})", field), &text)
            .replace(&format!("%{}", field), &text);
    }
    path
}

pub fn check_path(path: &str) -> Result<&str> {
    if path.contains('%') {
        return Err(EncoderError::UnresolvedPath(path.to_string()));
    }
    Ok(path)
}
