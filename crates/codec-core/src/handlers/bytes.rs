//! Bytes-like handler: same skeleton as [`crate::handlers::string`] but the
//! structured representation is a byte buffer and `Encoding` is mandatory
//! (default base64) rather than optional, since JSON has no native bytes type.

use std::sync::Arc;

use base64::Engine;
use serde_json::Value;

use crate::config::HandleConfig;
use crate::constraints::{Constraint, ConstraintId, Constraints, DataType, Encoding};
use crate::error::ProtocolError;
use crate::handler::{short_circuit, Handler, HandlerOutput};
use crate::handlers::length::{self, LengthBounds};
use crate::handlers::scalar::json_data_type;
use crate::issue::{Issue, IssueKind};
use crate::pointer::Pointer;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::types::TypeExpr;

fn encode(encoding: Encoding, bytes: &[u8]) -> String {
    match encoding {
        Encoding::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
        Encoding::Base16 => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        Encoding::Base32 => data_encoding::BASE32.encode(bytes),
        Encoding::Base32Hex => data_encoding::BASE32HEX.encode(bytes),
    }
}

fn decode(encoding: Encoding, text: &str) -> Result<Vec<u8>, ()> {
    match encoding {
        Encoding::Base64 => base64::engine::general_purpose::STANDARD.decode(text).map_err(|_| ()),
        Encoding::Base16 => {
            if text.len() % 2 != 0 {
                return Err(());
            }
            (0..text.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&text[i..i + 2], 16).map_err(|_| ()))
                .collect()
        }
        Encoding::Base32 => data_encoding::BASE32.decode(text.as_bytes()).map_err(|_| ()),
        Encoding::Base32Hex => data_encoding::BASE32HEX.decode(text.as_bytes()).map_err(|_| ()),
    }
}

/// JSON has no bytes leaf, so on the wire a byte buffer is always carried as an
/// encoded string; `target=struct`/`unstruct` represent it the same way here
/// since `serde_json::Value` has no bytes variant either (mirrors how
/// `codec-derive`-generated types declare a `Vec<u8>` field and rely on
/// `serde`'s usual string-ish representation for it).
pub struct BytesHandler {
    encoding: Encoding,
    length: LengthBounds,
}

impl BytesHandler {
    pub fn new(constraints: Constraints) -> BytesHandler {
        let encoding = match constraints.get(ConstraintId::Encoding) {
            Some(Constraint::Encoding(encoding)) => *encoding,
            _ => Encoding::Base64,
        };
        let length = length::consolidate(&constraints);
        BytesHandler { encoding, length }
    }
}

impl Handler for BytesHandler {
    fn build(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn handle(
        &self,
        value: &Value,
        pointer: &Pointer,
        included: bool,
        excluded: bool,
        _config: &HandleConfig,
    ) -> (HandlerOutput, Vec<Issue>) {
        if let Some(result) = short_circuit(included, excluded) {
            return result;
        }
        let Value::String(text) = value else {
            return (
                HandlerOutput::Empty,
                vec![Issue::new(
                    pointer.clone(),
                    IssueKind::JsonType { expected: DataType::String, actual: json_data_type(value) },
                )],
            );
        };
        let bytes = match decode(self.encoding, text) {
            Ok(bytes) => bytes,
            Err(()) => {
                return (
                    HandlerOutput::Empty,
                    vec![Issue::new(pointer.clone(), IssueKind::Decoding { encoding: self.encoding })],
                );
            }
        };
        let issues = length::check(&self.length, bytes.len(), pointer);
        if !issues.is_empty() {
            return (HandlerOutput::Empty, issues);
        }
        (HandlerOutput::Value(Value::String(encode(self.encoding, &bytes))), Vec::new())
    }
}

pub struct BytesFactory;

impl HandlerFactory for BytesFactory {
    fn build_handler(
        &self,
        _type_expr: &TypeExpr,
        constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        Ok(Arc::new(BytesHandler::new(constraints.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Shape;

    #[test]
    fn base64_roundtrip() {
        let handler = BytesHandler::new(Constraints::empty());
        let config = HandleConfig::for_test(Shape::Json, Shape::Json);
        let (out, issues) = handler.handle(&Value::from("aGk="), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::from("aGk=")));
    }

    #[test]
    fn malformed_base64_reports_decoding_issue() {
        let handler = BytesHandler::new(Constraints::empty());
        let config = HandleConfig::for_test(Shape::Json, Shape::Json);
        let (_, issues) = handler.handle(&Value::from("@@@"), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }
}
