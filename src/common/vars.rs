//! Loosely-typed variable bag.
//!
//! Backs step outputs and the lead snapshot used for template rendering
//! and condition routing.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, converting it to JSON.
    pub fn set<T: Into<Value>>(
        &mut self,
        name: &str,
        value: T,
    ) {
        self.inner.insert(name.to_string(), value.into());
    }

    /// Builder style `set`.
    pub fn with<T: Into<Value>>(
        mut self,
        name: &str,
        value: T,
    ) -> Self {
        self.set(name, value);
        self
    }

    /// Get a value and deserialize it into `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Option<T> {
        self.inner.get(name).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a value as display text: strings as-is, null as blank, other JSON as its text form.
    pub fn get_text(
        &self,
        name: &str,
    ) -> Option<String> {
        self.inner.get(name).map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }
}

impl Deref for Vars {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Vars {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl From<Map<String, Value>> for Vars {
    fn from(inner: Map<String, Value>) -> Self {
        Self {
            inner,
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_vars_get_and_text() {
        let vars = Vars::new().with("count", 3).with("name", "Acme").with("missing", Value::Null).with("obj", json!({"a": 1}));

        assert_eq!(vars.get::<i64>("count"), Some(3));
        assert_eq!(vars.get_text("name").as_deref(), Some("Acme"));
        assert_eq!(vars.get_text("missing").as_deref(), Some(""));
        assert_eq!(vars.get_text("obj").as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(vars.get_text("nope"), None);
    }
}
