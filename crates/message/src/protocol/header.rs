//! Case-insensitive header multimap that remembers the original casing.
//!
//! Headers are bucketed by their lower-cased name. Inside a bucket every
//! distinct original casing keeps its own ordered list of values, so
//! `Accept` and `accept` set through separate calls live side by side while
//! lookups through either spelling see the values of both.
//!
//! ```text
//!   "accept" => { "Accept" => ["text/html"], "accept" => ["*/*"] }
//!   "host"   => { "Host"   => ["example.com"] }
//! ```

use http::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use serde_json::Value;

use crate::protocol::InvalidInput;

/// Ordered header store keyed by lower-cased name, then by original-case name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderStore {
    buckets: IndexMap<String, IndexMap<String, Vec<String>>>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any casing of `name` is present.
    pub fn has(&self, name: &str) -> bool {
        self.buckets.contains_key(&name.to_ascii_lowercase())
    }

    /// Returns the values of every casing-entry stored under `name`, in insertion order.
    ///
    /// An absent header yields an empty list.
    pub fn get(&self, name: &str) -> Vec<&str> {
        self.buckets
            .get(&name.to_ascii_lowercase())
            .map(|bucket| bucket.values().flatten().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the values of `name` joined with `,`; empty when the header is absent.
    pub fn get_line(&self, name: &str) -> String {
        self.get(name).join(",")
    }

    /// Iterates every casing-entry as `(original_name, values)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets.values().flat_map(|bucket| bucket.iter().map(|(name, values)| (name.as_str(), values.as_slice())))
    }

    /// Flattens the store into a map from original-case name to its values.
    pub fn to_map(&self) -> IndexMap<String, Vec<String>> {
        self.iter().map(|(name, values)| (name.to_owned(), values.to_vec())).collect()
    }

    /// Replaces the entry stored under the exact casing `name`.
    ///
    /// Sibling entries with another casing of the same header are kept.
    pub fn set(&mut self, name: &str, values: Vec<String>) {
        self.buckets.entry(name.to_ascii_lowercase()).or_default().insert(name.to_owned(), values);
    }

    /// Appends to the entry stored under the exact casing `name`, creating it if missing.
    pub fn append(&mut self, name: &str, values: Vec<String>) {
        self.buckets
            .entry(name.to_ascii_lowercase())
            .or_default()
            .entry(name.to_owned())
            .or_default()
            .extend(values);
    }

    /// Removes the entry stored under the exact casing `name`.
    ///
    /// Returns true if an entry was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        let Some(bucket) = self.buckets.get_mut(&lower) else {
            return false;
        };

        let removed = bucket.shift_remove(name).is_some();
        if bucket.is_empty() {
            self.buckets.shift_remove(&lower);
        }
        removed
    }

    /// Converts the store into an [`http::HeaderMap`], keeping value order per name.
    ///
    /// Fails when a name is not a valid header token or a value holds
    /// characters a header line can not carry.
    pub fn to_header_map(&self) -> Result<HeaderMap, InvalidInput> {
        let mut map = HeaderMap::with_capacity(self.len());
        for (name, values) in self.iter() {
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                return Err(InvalidInput::invalid_header_name(name));
            };
            for value in values {
                let Ok(header_value) = HeaderValue::from_str(value) else {
                    return Err(InvalidInput::invalid_header_value(value));
                };
                map.append(header_name.clone(), header_value);
            }
        }
        Ok(map)
    }

    /// Number of distinct logical (case-insensitive) header names.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Conversion into the value list of a header.
///
/// A header value is either a single string or a sequence of strings.
/// Loosely-typed JSON input is checked at runtime and rejected with
/// [`InvalidInput::InvalidHeaderValue`] when it has any other shape.
pub trait IntoHeaderValues {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput>;
}

impl IntoHeaderValues for &str {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        Ok(vec![self.to_owned()])
    }
}

impl IntoHeaderValues for String {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        Ok(vec![self])
    }
}

impl IntoHeaderValues for &String {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        Ok(vec![self.clone()])
    }
}

impl IntoHeaderValues for Vec<String> {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        Ok(self)
    }
}

impl IntoHeaderValues for Vec<&str> {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        Ok(self.into_iter().map(str::to_owned).collect())
    }
}

impl IntoHeaderValues for &[&str] {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        Ok(self.iter().map(|value| (*value).to_owned()).collect())
    }
}

impl<const N: usize> IntoHeaderValues for [&str; N] {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        Ok(self.iter().map(|value| (*value).to_owned()).collect())
    }
}

impl IntoHeaderValues for &Value {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        match self {
            Value::String(value) => Ok(vec![value.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(value) => Ok(value.clone()),
                    other => Err(InvalidInput::invalid_header_value(json_type_name(other))),
                })
                .collect(),
            other => Err(InvalidInput::invalid_header_value(json_type_name(other))),
        }
    }
}

impl IntoHeaderValues for Value {
    fn into_header_values(self) -> Result<Vec<String>, InvalidInput> {
        (&self).into_header_values()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn values(list: &[&str]) -> Vec<String> {
        list.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut store = HeaderStore::new();
        store.set("Accept", values(&["text/html"]));

        assert!(store.has("Accept"));
        assert!(store.has("accept"));
        assert!(store.has("ACCEPT"));
        assert_eq!(store.get_line("Accept"), "text/html");
        assert_eq!(store.get_line("accept"), "text/html");
        assert!(!store.has("Host"));
        assert!(store.get("Host").is_empty());
        assert_eq!(store.get_line("Host"), "");
    }

    #[test]
    fn casings_are_kept_apart_and_merged_on_read() {
        let mut store = HeaderStore::new();
        store.set("Accept", values(&["text/html"]));
        store.set("accept", values(&["*/*"]));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("ACCEPT"), vec!["text/html", "*/*"]);

        let map = store.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["Accept"], values(&["text/html"]));
        assert_eq!(map["accept"], values(&["*/*"]));
    }

    #[test]
    fn set_replaces_only_the_exact_casing() {
        let mut store = HeaderStore::new();
        store.set("Accept", values(&["text/html"]));
        store.set("accept", values(&["*/*"]));
        store.set("Accept", values(&["application/json"]));

        assert_eq!(store.get("accept"), vec!["application/json", "*/*"]);
    }

    #[test]
    fn append_extends_exact_casing_or_creates_sibling() {
        let mut store = HeaderStore::new();
        store.set("Accept", values(&["text/html"]));
        store.append("Accept", values(&["application/xhtml+xml"]));
        assert_eq!(store.get_line("Accept"), "text/html,application/xhtml+xml");

        store.append("ACCEPT", values(&["*/*"]));
        assert_eq!(store.get_line("accept"), "text/html,application/xhtml+xml,*/*");
        assert_eq!(store.to_map()["ACCEPT"], values(&["*/*"]));
    }

    #[test]
    fn remove_drops_exact_casing_and_empty_bucket() {
        let mut store = HeaderStore::new();
        store.set("Accept", values(&["text/html"]));
        store.set("accept", values(&["*/*"]));

        assert!(!store.remove("ACCEPT"));
        assert!(store.remove("Accept"));
        assert_eq!(store.get("Accept"), vec!["*/*"]);

        assert!(store.remove("accept"));
        assert!(!store.has("accept"));
        assert!(store.get("Accept").is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn into_header_map() {
        let mut store = HeaderStore::new();
        store.set("Accept", values(&["text/html"]));
        store.set("accept", values(&["*/*"]));
        store.set("Host", values(&["abc.com"]));

        let map = store.to_header_map().unwrap();
        let accept: Vec<_> = map.get_all(http::header::ACCEPT).iter().map(|v| v.to_str().unwrap()).collect();
        assert_eq!(accept, ["text/html", "*/*"]);
        assert_eq!(map.get(http::header::HOST).unwrap(), "abc.com");

        store.set("Bad Name", values(&["x"]));
        let err = store.to_header_map().unwrap_err();
        assert!(matches!(err, InvalidInput::InvalidHeaderName { ref name } if name == "Bad Name"));

        let mut store = HeaderStore::new();
        store.set("X-Line", values(&["a\r\nb"]));
        assert!(matches!(store.to_header_map(), Err(InvalidInput::InvalidHeaderValue { .. })));
    }

    #[test]
    fn header_values_from_json() {
        assert_eq!(json!("a").into_header_values().unwrap(), values(&["a"]));
        assert_eq!(json!(["a", "b"]).into_header_values().unwrap(), values(&["a", "b"]));

        let err = json!(12).into_header_values().unwrap_err();
        assert!(matches!(err, InvalidInput::InvalidHeaderValue { ref found } if found == "number"));

        assert!(json!(["a", null]).into_header_values().is_err());
        assert!(json!({"a": "b"}).into_header_values().is_err());
    }
}
