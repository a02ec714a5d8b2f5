//! Cache key derivation.
//!
//! A key is the whitespace-normalised query text followed by a canonical
//! (sorted-key) JSON rendering of the variables. Equal `(query, variables)`
//! pairs always produce equal keys.

use std::fmt::{self, Write as _};

use serde::Serialize;
use serde_json::Value;

use super::error::KeyError;

/// Deterministic cache key for one `(query, variables)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key from already-normalised parts.
    pub fn derive(query: &str, variables: &Value) -> Self {
        let mut key = normalize_query(query);
        key.push('|');
        write_canonical(&mut key, variables);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A query description plus its variables, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    query: String,
    variables: Value,
}

impl QueryRequest {
    /// Normalise the query text and serialise the variables.
    ///
    /// Variables must serialise to a JSON object (or to `null`, which is
    /// treated as no variables). Anything else is rejected before any
    /// network activity takes place.
    pub fn new<V>(query: &str, variables: &V) -> Result<Self, KeyError>
    where
        V: Serialize + ?Sized,
    {
        let variables = match serde_json::to_value(variables)? {
            Value::Null => Value::Object(Default::default()),
            value @ Value::Object(_) => value,
            other => {
                return Err(KeyError::new(format!(
                    "variables must serialize to an object, got {}",
                    json_type(&other)
                )));
            }
        };

        Ok(Self {
            query: normalize_query(query),
            variables,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn variables(&self) -> &Value {
        &self.variables
    }

    /// Name of the first operation in the document, if it declares one.
    pub fn operation_name(&self) -> Option<&str> {
        let rest = ["query", "mutation", "subscription"]
            .iter()
            .find_map(|keyword| self.query.strip_prefix(keyword))?;
        if rest.starts_with(is_name_char) {
            return None;
        }
        let rest = rest.trim_start();
        let end = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
        let name = &rest[..end];
        (!name.is_empty()).then_some(name)
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(&self.query, &self.variables)
    }
}

/// Collapse whitespace runs into single spaces and trim both ends.
pub fn normalize_query(query: &str) -> String {
    let mut normalized = String::with_capacity(query.len());
    for word in query.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(word);
    }
    normalized
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (index, (key, value)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String(key.clone()));
                write_canonical(out, value);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
