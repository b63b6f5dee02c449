//! Substitution request parsing

use crate::{FillError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Identifier → replacement value
///
/// Identifiers are unique; an empty value is valid and removes the
/// placeholder without drawing anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionRequest {
    values: BTreeMap<String, String>,
}

impl SubstitutionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a value
    pub fn insert(&mut self, identifier: impl Into<String>, value: impl Into<String>) {
        self.values.insert(identifier.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, identifier: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(identifier, value);
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.values.get(identifier).map(String::as_str)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.values.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Identifiers in sorted order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// (identifier, value) pairs in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a flat JSON object
    ///
    /// Strings are taken as is, numbers and booleans are rendered to text,
    /// `null` becomes the empty string. Nested arrays and objects are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| FillError::Request("expected a JSON object".to_string()))?;

        let mut request = Self::new();
        for (key, value) in object {
            let text = value_to_string(value).ok_or_else(|| {
                FillError::Request(format!("value of '{key}' must be a string, number, boolean or null"))
            })?;
            request.insert(key.clone(), text);
        }
        Ok(request)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubstitutionRequest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut request = Self::new();
        for (k, v) in iter {
            request.insert(k, v);
        }
        request
    }
}

/// Convert a scalar JSON value to replacement text
pub fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null => Some(String::new()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("hello")), Some("hello".to_string()));
        assert_eq!(value_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(value_to_string(&json!(true)), Some("true".to_string()));
        assert_eq!(value_to_string(&json!(null)), Some(String::new()));
        assert_eq!(value_to_string(&json!([1, 2])), None);
    }

    #[test]
    fn test_from_json() {
        let request =
            SubstitutionRequest::from_json(r#"{"no": "001/2025", "amount": 150, "vat": null}"#)
                .unwrap();
        assert_eq!(request.len(), 3);
        assert_eq!(request.get("no"), Some("001/2025"));
        assert_eq!(request.get("amount"), Some("150"));
        assert_eq!(request.get("vat"), Some(""));
        assert_eq!(request.get("missing"), None);
    }

    #[test]
    fn test_from_json_rejects_nested() {
        let err = SubstitutionRequest::from_json(r#"{"items": [1, 2]}"#).unwrap_err();
        assert!(matches!(err, FillError::Request(_)));
        let err = SubstitutionRequest::from_json(r#"["no"]"#).unwrap_err();
        assert!(matches!(err, FillError::Request(_)));
    }

    #[test]
    fn test_collect_and_builder() {
        let request: SubstitutionRequest = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(request.identifiers().collect::<Vec<_>>(), vec!["a", "b"]);

        let request = SubstitutionRequest::new().with("a", "x").with("a", "y");
        assert_eq!(request.len(), 1);
        assert_eq!(request.get("a"), Some("y"));
    }
}
