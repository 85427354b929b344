//! Navigation arguments decoded from the URL.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::utils::url::{build_query, parse_pairs};

/// Key/value data passed to a screen or overlay on activation.
///
/// Route arguments come from the query string and stay strings. Modal arguments
/// come from the fragment's `?` suffix and are JSON-decoded per value, falling
/// back to the raw string when a value is not valid JSON. Duplicate keys keep
/// the last value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NavArgs(BTreeMap<String, Value>);

impl NavArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route arguments from a query string.
    pub fn from_query(query: &str) -> Self {
        Self(
            parse_pairs(query)
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        )
    }

    /// Modal arguments from a fragment query suffix.
    pub fn from_modal_query(query: &str) -> Self {
        Self(
            parse_pairs(query)
                .into_iter()
                .map(|(key, raw)| {
                    let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                    (key, value)
                })
                .collect(),
        )
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Integer value, also accepting numeric strings from route queries.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Query string for route URLs: strings are written raw, other values as JSON.
    pub fn to_query(&self) -> String {
        let rendered: Vec<(&str, String)> = self
            .0
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key.as_str(), s.clone()),
                other => (key.as_str(), other.to_string()),
            })
            .collect();
        build_query(rendered.iter().map(|(k, v)| (*k, v.as_str())))
    }

    /// Query string for fragments: every value is JSON-encoded.
    pub fn to_modal_query(&self) -> String {
        let rendered: Vec<(&str, String)> = self
            .0
            .iter()
            .map(|(key, value)| (key.as_str(), value.to_string()))
            .collect();
        build_query(rendered.iter().map(|(k, v)| (*k, v.as_str())))
    }
}

impl From<BTreeMap<String, Value>> for NavArgs {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_args_stay_strings() {
        let args = NavArgs::from_query("?page=2&sort=name");
        assert_eq!(args.get("page"), Some(&json!("2")));
        assert_eq!(args.get_i64("page"), Some(2));
        assert_eq!(args.get_str("sort"), Some("name"));
    }

    #[test]
    fn test_last_key_wins() {
        let args = NavArgs::from_query("a=1&b=2&a=3");
        assert_eq!(args.len(), 2);
        assert_eq!(args.get_str("a"), Some("3"));
    }

    #[test]
    fn test_modal_args_are_json_decoded() {
        let args = NavArgs::from_modal_query("qty=2&gift=true&note=%22hi%22&raw=plain");
        assert_eq!(args.get("qty"), Some(&json!(2)));
        assert_eq!(args.get("gift"), Some(&json!(true)));
        assert_eq!(args.get("note"), Some(&json!("hi")));
        assert_eq!(args.get("raw"), Some(&json!("plain")));
    }

    #[test]
    fn test_to_query() {
        let args = NavArgs::new().with("q", "a b").with("page", 2);
        assert_eq!(args.to_query(), "page=2&q=a%20b");
        assert_eq!(args.to_modal_query(), "page=2&q=%22a%20b%22");
    }
}
