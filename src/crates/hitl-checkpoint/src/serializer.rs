//! Serialization protocol for checkpoint columns

use crate::error::{CheckpointError, Result};
use serde::{Deserialize, Serialize};

/// Protocol for serializing and deserializing checkpoint data
///
/// Stores call this for every structured column they persist, so swapping the
/// implementation changes the on-disk encoding in one place.
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;

    /// Serialize to a UTF-8 string, for TEXT columns
    fn dumps_text<T: Serialize>(&self, value: &T) -> Result<String> {
        String::from_utf8(self.dumps(value)?)
            .map_err(|e| CheckpointError::Invalid(format!("serializer produced non UTF-8 output: {}", e)))
    }

    /// Deserialize from a TEXT column
    fn loads_text<T: for<'de> Deserialize<'de>>(&self, data: &str) -> Result<T> {
        self.loads(data.as_bytes())
    }
}

/// JSON-based serializer (default)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_json_text_roundtrip_keeps_floats() {
        let serializer = JsonSerializer::new();
        let value = json!({"price": 0.1 + 0.2, "nested": {"list": [1, "two", null]}});

        let text = serializer.dumps_text(&value).unwrap();
        let restored: Value = serializer.loads_text(&text).unwrap();

        assert_eq!(value, restored);
    }

    #[test]
    fn test_loads_rejects_garbage() {
        let serializer = JsonSerializer::new();
        let result: Result<Value> = serializer.loads_text("{not json");
        assert!(matches!(result, Err(CheckpointError::Serialization(_))));
    }
}
