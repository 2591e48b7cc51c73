//! Method calls as they arrive from the channel
//!
//! A call is a method name plus a JSON argument payload. Most methods take
//! an object; the repository fetches take a plain list of URLs.

use serde_json::{Map, Value};

use crate::core::error::{BridgeError, Result};
use crate::extension::types::MediaKind;

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    fn object(&self) -> Result<&Map<String, Value>> {
        self.arguments
            .as_object()
            .ok_or_else(|| BridgeError::InvalidArguments("Arguments were null or invalid".to_string()))
    }

    fn get(&self, key: &str) -> Result<Option<&Value>> {
        Ok(self.object()?.get(key).filter(|v| !v.is_null()))
    }

    fn missing(&self, key: &str) -> BridgeError {
        BridgeError::InvalidArguments(format!("Missing required parameter '{}' for {}", key, self.method))
    }

    fn wrong_type(&self, key: &str, expected: &str) -> BridgeError {
        BridgeError::InvalidArguments(format!("Parameter '{}' for {} must be {}", key, self.method, expected))
    }

    pub fn required_str(&self, key: &str) -> Result<&str> {
        match self.get(key)? {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(self.wrong_type(key, "a string")),
            None => Err(self.missing(key)),
        }
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<&str>> {
        Ok(self.get(key)?.and_then(Value::as_str))
    }

    pub fn required_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.wrong_type(key, "a boolean")),
            None => Err(self.missing(key)),
        }
    }

    pub fn required_page(&self, key: &str) -> Result<u32> {
        match self.get(key)? {
            Some(value) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| self.wrong_type(key, "a non-negative integer")),
            None => Err(self.missing(key)),
        }
    }

    pub fn optional_index(&self, key: &str) -> Result<Option<usize>> {
        Ok(self
            .get(key)?
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok()))
    }

    pub fn required_object(&self, key: &str) -> Result<&Map<String, Value>> {
        match self.get(key)? {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(self.wrong_type(key, "an object")),
            None => Err(self.missing(key)),
        }
    }

    pub fn optional_value(&self, key: &str) -> Result<Option<&Value>> {
        self.get(key)
    }

    /// `sourceId`, rejected when empty
    pub fn source_id(&self) -> Result<&str> {
        non_empty(self.required_str("sourceId")?, "sourceId")
    }

    pub fn media_kind(&self) -> Result<MediaKind> {
        Ok(MediaKind::from_is_anime(self.required_bool("isAnime")?))
    }

    /// Argument list of strings; other elements are ignored
    pub fn string_list(&self) -> Vec<String> {
        match &self.arguments {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub fn non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if value.is_empty() {
        Err(BridgeError::EmptyIdentifier(format!("{} can't be empty", field)))
    } else {
        Ok(value)
    }
}
