//! The serializer plug-in contract and the `serde_json`-backed default adapter.
//!
//! The engine in `codec-core` never parses or emits bytes/text itself; it only ever
//! walks an already-decoded `serde_json::Value` tree. Getting bytes/text in and out of
//! that tree is this crate's entire job, kept deliberately small and swappable — a
//! caller who wants a different JSON parser, or a non-JSON wire format that still maps
//! onto the same `Value` shape, only needs to implement [`Serializer`].

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed {encoding} input: {message}")]
    Malformed { encoding: &'static str, message: String },

    #[error("no serializer registered under name {name:?}")]
    Unregistered { name: String },
}

/// Adapter between concrete bytes/text and the plain JSON tree the engine operates on:
/// an ordered map with string keys, an ordered array, and integer/float/boolean/
/// string/null leaves. Every method is a pure, stateless conversion.
pub trait Serializer: Send + Sync {
    /// Short name this adapter is registered under (e.g. `"json"`).
    fn encoding(&self) -> &'static str;

    fn from_str(&self, input: &str) -> Result<Value, SerializerError>;
    fn to_str(&self, value: &Value) -> Result<String, SerializerError>;

    fn from_bytes(&self, input: &[u8]) -> Result<Value, SerializerError>;
    fn to_bytes(&self, value: &Value) -> Result<Vec<u8>, SerializerError>;

    fn from_binary_stream(&self, reader: &mut dyn Read) -> Result<Value, SerializerError>;
    fn to_binary_stream(&self, value: &Value, writer: &mut dyn Write) -> Result<(), SerializerError>;

    fn from_text_stream(&self, reader: &mut dyn Read) -> Result<Value, SerializerError>;
    fn to_text_stream(&self, value: &Value, writer: &mut dyn Write) -> Result<(), SerializerError>;
}

/// The default adapter, backed directly by `serde_json`. Text and binary streams are
/// handled identically since JSON is itself a text format; the distinction only matters
/// to adapters for formats with a genuine binary encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn encoding(&self) -> &'static str {
        "json"
    }

    fn from_str(&self, input: &str) -> Result<Value, SerializerError> {
        serde_json::from_str(input).map_err(|e| malformed(e))
    }

    fn to_str(&self, value: &Value) -> Result<String, SerializerError> {
        serde_json::to_string(value).map_err(|e| malformed(e))
    }

    fn from_bytes(&self, input: &[u8]) -> Result<Value, SerializerError> {
        serde_json::from_slice(input).map_err(|e| malformed(e))
    }

    fn to_bytes(&self, value: &Value) -> Result<Vec<u8>, SerializerError> {
        serde_json::to_vec(value).map_err(|e| malformed(e))
    }

    fn from_binary_stream(&self, reader: &mut dyn Read) -> Result<Value, SerializerError> {
        serde_json::from_reader(reader).map_err(|e| malformed(e))
    }

    fn to_binary_stream(&self, value: &Value, writer: &mut dyn Write) -> Result<(), SerializerError> {
        serde_json::to_writer(writer, value).map_err(|e| malformed(e))
    }

    fn from_text_stream(&self, reader: &mut dyn Read) -> Result<Value, SerializerError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.from_str(&text)
    }

    fn to_text_stream(&self, value: &Value, writer: &mut dyn Write) -> Result<(), SerializerError> {
        let text = self.to_str(value)?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }
}

fn malformed(err: serde_json::Error) -> SerializerError {
    SerializerError::Malformed { encoding: "json", message: err.to_string() }
}

/// A name-keyed table of serializers, so `ExecuteOptions::serializer` can select one by
/// name (default `"default"`) the way the engine's `TypeRegistry` selects a handler
/// factory by `TypeKey`.
#[derive(Clone)]
pub struct SerializerRegistry {
    entries: HashMap<String, Arc<dyn Serializer>>,
}

impl SerializerRegistry {
    pub fn builder() -> SerializerRegistryBuilder {
        SerializerRegistryBuilder { entries: HashMap::new() }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Serializer>, SerializerError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| SerializerError::Unregistered { name: name.to_string() })
    }
}

pub struct SerializerRegistryBuilder {
    entries: HashMap<String, Arc<dyn Serializer>>,
}

impl SerializerRegistryBuilder {
    pub fn register(mut self, name: impl Into<String>, serializer: Arc<dyn Serializer>) -> Self {
        self.entries.insert(name.into(), serializer);
        self
    }

    pub fn build(self) -> SerializerRegistry {
        SerializerRegistry { entries: self.entries }
    }
}

/// A registry with only `"default"` registered, backed by [`JsonSerializer`].
pub fn default_serializer_registry() -> SerializerRegistry {
    SerializerRegistry::builder()
        .register("default", Arc::new(JsonSerializer))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_str() {
        let serializer = JsonSerializer;
        let value = serde_json::json!({"a": 1, "b": [true, null]});
        let text = serializer.to_str(&value).unwrap();
        let decoded = serializer.from_str(&text).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn roundtrips_through_binary_stream() {
        let serializer = JsonSerializer;
        let value = serde_json::json!({"name": "Ada"});
        let mut buffer = Vec::new();
        serializer.to_binary_stream(&value, &mut buffer).unwrap();
        let decoded = serializer.from_binary_stream(&mut buffer.as_slice()).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn malformed_input_reports_message() {
        let serializer = JsonSerializer;
        let err = serializer.from_str("{not json").unwrap_err();
        assert!(matches!(err, SerializerError::Malformed { .. }));
    }

    #[test]
    fn default_registry_resolves_by_name() {
        let registry = default_serializer_registry();
        let serializer = registry.get("default").unwrap();
        assert_eq!(serializer.encoding(), "json");
        assert!(matches!(registry.get("missing"), Err(SerializerError::Unregistered { .. })));
    }
}
