//! Defines the configuration document pulled from S3, and the
//! augmentation applied to it before it's handed to the state
//! machine.

use crate::yaml;
pub use crate::yaml::ParseError;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

/// Failures when reading or augmenting a configuration document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The bytes aren't a YAML document made of plain data.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The document decoded fine, but doesn't have the expected
    /// shape.
    #[error("{0}")]
    Structure(String),
}

/// A parsed configuration document. The root is always a mapping,
/// and keys keep the order they had in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument(Map<String, Value>);

/// A short name for the kind of a JSON value, for error messages.
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Whether a value counts as true: anything except null, false, zero,
/// and empty strings, sequences or mappings.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl ConfigDocument {
    /// Decode a configuration document from the raw contents of a
    /// YAML file.
    #[instrument(skip(bytes), fields(size = bytes.len()))]
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ParseError::new(format!("document is not valid UTF-8: {}", e)))?;
        match yaml::decode(text.strip_prefix('\u{feff}').unwrap_or(text))? {
            Value::Object(map) => Ok(ConfigDocument(map)),
            other => Err(DocumentError::Structure(format!(
                "expected a mapping at the document root, found {}",
                kind(&other)
            ))),
        }
    }

    /// Copy the document-level `account` onto every entry in
    /// `stacksets`, and `terminate` too if it's present and truthy.
    /// The document is left untouched if it fails.
    pub fn augment_stacksets(&mut self) -> Result<(), DocumentError> {
        let account = self
            .0
            .get("account")
            .cloned()
            .ok_or_else(|| DocumentError::Structure(String::from("missing required key `account`")))?;
        let terminate = self.0.get("terminate").filter(|v| is_truthy(v)).cloned();
        let stacksets = match self.0.get_mut("stacksets") {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(DocumentError::Structure(format!(
                    "`stacksets` must be a sequence, found {}",
                    kind(other)
                )))
            }
            None => {
                return Err(DocumentError::Structure(String::from(
                    "missing required key `stacksets`",
                )))
            }
        };
        if let Some((index, entry)) = stacksets
            .iter()
            .enumerate()
            .find(|(_, entry)| !entry.is_object())
        {
            return Err(DocumentError::Structure(format!(
                "`stacksets[{}]` must be a mapping, found {}",
                index,
                kind(entry)
            )));
        }

        for fields in stacksets.iter_mut().filter_map(Value::as_object_mut) {
            fields.insert(String::from("account"), account.clone());
            if let Some(terminate) = &terminate {
                fields.insert(String::from("terminate"), terminate.clone());
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Encode the document as the compact JSON text used as execution
    /// input.
    pub fn to_input(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Encode the document as indented JSON, for logging.
    pub fn to_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }
}
