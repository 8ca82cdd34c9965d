//! Turn a parsed backup of any known shape into a flat key → value mapping.

use crate::error::{GateError, Result};
use crate::keys::LEGACY_ARRAY_BACKUP_KEY;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupShape {
    /// `{"version": .., "timestamp": .., "data": {..}}`
    Standard,
    /// A bare storage dump: `{"@key": value, ..}`
    FlatKeys,
    /// The oldest exports: a bare array, stored under a single key.
    LegacyArray,
}

impl BackupShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupShape::Standard => "standard",
            BackupShape::FlatKeys => "flat",
            BackupShape::LegacyArray => "legacy-array",
        }
    }
}

/// Flatten a parsed backup into storage keys.
pub fn normalize(value: Value) -> Result<(Map<String, Value>, BackupShape)> {
    match value {
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Object(data)) => Ok((data, BackupShape::Standard)),
            Some(other) => {
                // "data" was an ordinary key of a flat dump
                object.insert("data".to_string(), other);
                Ok((object, BackupShape::FlatKeys))
            }
            None => Ok((object, BackupShape::FlatKeys)),
        },
        Value::Array(items) => {
            let mut data = Map::new();
            data.insert(LEGACY_ARRAY_BACKUP_KEY.to_string(), Value::Array(items));
            Ok((data, BackupShape::LegacyArray))
        }
        other => Err(GateError::BackupFormat(format!(
            "expected an object or array, found {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render a value the way the storage adapter keeps it: strings raw,
/// everything else as JSON.
pub fn to_storage_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_document() {
        let doc = json!({"version": "1.0", "timestamp": "2024-01-01T00:00:00Z", "data": {"@a": 1}});
        let (data, shape) = normalize(doc).unwrap();
        assert_eq!(shape, BackupShape::Standard);
        assert_eq!(Value::Object(data), json!({"@a": 1}));
    }

    #[test]
    fn test_flat_dump() {
        let (data, shape) = normalize(json!({"@unit_number": "0400"})).unwrap();
        assert_eq!(shape, BackupShape::FlatKeys);
        assert_eq!(data["@unit_number"], "0400");
    }

    #[test]
    fn test_non_object_data_key_is_kept() {
        let (data, shape) = normalize(json!({"data": "x", "@b": 2})).unwrap();
        assert_eq!(shape, BackupShape::FlatKeys);
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_bare_array_is_wrapped() {
        let (data, shape) = normalize(json!([{"phone": "0411"}])).unwrap();
        assert_eq!(shape, BackupShape::LegacyArray);
        assert_eq!(data[LEGACY_ARRAY_BACKUP_KEY], json!([{"phone": "0411"}]));
    }

    #[test]
    fn test_scalars_are_rejected() {
        assert!(matches!(normalize(json!(42)), Err(GateError::BackupFormat(_))));
    }

    #[test]
    fn test_storage_string() {
        assert_eq!(to_storage_string(&json!("1234")), "1234");
        assert_eq!(to_storage_string(&json!({"a": [1]})), r#"{"a":[1]}"#);
    }
}
