//! The top-level facade: `execute`/`ExecuteOptions`, the thin driver that wires a
//! [`codec_json::Serializer`] in front of the `codec-core` engine.
//!
//! # Example
//!
//! ```ignore
//! use codec::{execute, ExecuteOptions, Input, Output};
//! use codec_json::default_serializer_registry;
//! use codec_core::default_registry;
//!
//! #[derive(codec_derive::Record, serde::Serialize, Default)]
//! struct Person {
//!     name: String,
//!     age: i64,
//! }
//!
//! let registry = default_registry();
//! let serializers = default_serializer_registry();
//! let options = ExecuteOptions { validate: true, ..ExecuteOptions::default() };
//! let input: Input<'_, Person> = Input::JsonStr(r#"{"name":"Ada","age":36}"#);
//! let out = execute(input, options, &registry, &serializers, None).unwrap();
//! let Output::Struct(person) = out else { panic!("expected a Struct output") };
//! assert_eq!(person.name, "Ada");
//! ```

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use codec_core::{
    default_registry, ExtrasMode, HandleConfig, HasTypeExpr, Issue, IssueKind, PatchMode, PatchStage, Patches, Path,
    Pointer, ProtocolError, Record, TypeExpr, TypeRegistry, ValidationError,
};
pub use codec_derive::Record as DeriveRecord;
pub use codec_json::{default_serializer_registry, JsonSerializer, Serializer, SerializerError, SerializerRegistry};

/// Every shape a value can enter or leave `execute` in. `Json`/`Unstruct`/`Struct` mirror
/// [`codec_core::Shape`]; the remaining four are wire-level representations that collapse
/// to `Json` once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    Struct,
    Unstruct,
    Json,
    JsonStr,
    JsonBytes,
    BinStream,
    TextStream,
}

fn core_shape(shape: WireShape) -> codec_core::Shape {
    match shape {
        WireShape::Struct => codec_core::Shape::Struct,
        WireShape::Unstruct => codec_core::Shape::Unstruct,
        WireShape::Json | WireShape::JsonStr | WireShape::JsonBytes | WireShape::BinStream | WireShape::TextStream => {
            codec_core::Shape::Json
        }
    }
}

/// One call's worth of input, tagged with the shape it arrives in.
pub enum Input<'a, T> {
    Struct(T),
    Unstruct(Value),
    Json(Value),
    JsonStr(&'a str),
    JsonBytes(&'a [u8]),
    BinStream(&'a mut dyn Read),
    TextStream(&'a mut dyn Read),
}

impl<T> Input<'_, T> {
    fn wire_shape(&self) -> WireShape {
        match self {
            Input::Struct(_) => WireShape::Struct,
            Input::Unstruct(_) => WireShape::Unstruct,
            Input::Json(_) => WireShape::Json,
            Input::JsonStr(_) => WireShape::JsonStr,
            Input::JsonBytes(_) => WireShape::JsonBytes,
            Input::BinStream(_) => WireShape::BinStream,
            Input::TextStream(_) => WireShape::TextStream,
        }
    }
}

/// One call's worth of output, tagged with the shape it was produced in. `Written`
/// carries the byte count handed to the caller's `output` writer (stream targets).
#[derive(Debug)]
pub enum Output<T> {
    Struct(T),
    Unstruct(Value),
    Json(Value),
    JsonStr(String),
    JsonBytes(Vec<u8>),
    Written(usize),
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Serializer(#[from] SerializerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("type_expr is required unless the input is a record instance")]
    TypeExprRequired,
    #[error("a writable `output` stream is required when the target shape is a stream")]
    OutputStreamRequired,
    #[error("constructor rejected input, missing required field(s): {0:?}")]
    MissingFields(Vec<String>),
    #[error("decoded value was not an object, cannot materialize a record")]
    NotAnObject,
}

/// Every recognized field of the codec driver call (SPEC_FULL §6).
pub struct ExecuteOptions {
    pub type_expr: Option<TypeExpr>,
    /// Pinned value required when `type_expr` resolves to a constant-carrier type.
    pub type_expr_value: Option<Value>,
    pub source: Option<WireShape>,
    pub target: Option<WireShape>,
    pub coerce: bool,
    pub validate: bool,
    pub convert: bool,
    pub include: Path,
    pub exclude: Path,
    pub exclude_none: bool,
    pub exclude_unset: bool,
    pub exclude_default: bool,
    pub extras_mode: ExtrasMode,
    pub patches: Patches,
    /// Opaque caller-supplied map, threaded through but never interpreted here.
    pub metadata: HashMap<String, Value>,
    /// Name of a registered serializer; `"default"` resolves to [`JsonSerializer`].
    pub serializer: String,
}

impl Default for ExecuteOptions {
    fn default() -> ExecuteOptions {
        ExecuteOptions {
            type_expr: None,
            type_expr_value: None,
            source: None,
            target: None,
            coerce: false,
            validate: false,
            convert: false,
            include: Path::everything(),
            exclude: Path::nothing(),
            exclude_none: false,
            exclude_unset: false,
            exclude_default: false,
            extras_mode: ExtrasMode::Forbid,
            patches: Patches::empty(),
            metadata: HashMap::new(),
            serializer: "default".to_string(),
        }
    }
}

/// Run the codec driver end to end (SPEC_FULL §4.14): infer what wasn't specified, take
/// the wire-to-wire fast path when neither `coerce` nor `validate` was requested,
/// otherwise decode, apply source patches, run the resolved handler, apply target
/// patches, and encode.
pub fn execute<T>(
    input: Input<'_, T>,
    options: ExecuteOptions,
    registry: &TypeRegistry,
    serializers: &SerializerRegistry,
    output: Option<&mut dyn Write>,
) -> Result<Output<T>, DriverError>
where
    T: Record + HasTypeExpr,
{
    if !options.coerce && !options.validate && !options.convert {
        return Err(ProtocolError::NoOperationRequested.into());
    }

    let source = options.source.unwrap_or_else(|| input.wire_shape());
    let target = options.target.unwrap_or(source);

    let raw = RawInput::from_input(input)?;

    if !options.coerce && !options.validate {
        if let RawInput::Bytes(bytes) = &raw {
            if is_wire_shape(target) {
                return emit_fast_path(bytes, target, output);
            }
        }
    }

    let setted = match &raw {
        RawInput::Struct(instance) => Some(instance.setted_names()),
        _ => None,
    };
    let mut value = raw.into_value(serializers.get(&options.serializer)?.as_ref())?;

    let type_expr = options
        .type_expr
        .clone()
        .or_else(|| matches!(source, WireShape::Struct).then(T::type_expr))
        .ok_or(DriverError::TypeExprRequired)?;

    value = options.patches.apply(PatchStage::Source, PatchMode::Value, &Pointer::root(), value);

    let (root_type, annotated_constraints) = type_expr.unwrap_annotated();
    let constraints = annotated_constraints.cloned().unwrap_or_default();

    let mut config = HandleConfig::new(core_shape(source), core_shape(target), registry.clone());
    config.coerce = options.coerce;
    config.validate = options.validate;
    config.convert = options.convert;
    config.include = options.include;
    config.exclude = options.exclude;
    config.exclude_none = options.exclude_none;
    config.exclude_unset = options.exclude_unset;
    config.exclude_default = options.exclude_default;
    config.extras_mode = options.extras_mode;
    config.patches = options.patches.clone();
    config.setted = setted;

    let handler = registry.get_handler(root_type, &constraints, options.type_expr_value.as_ref())?;
    handler.build()?;
    let (handled, issues) = handler.handle(&value, &Pointer::root(), true, false, &config);
    ValidationError::from_issues(issues)?;
    let mut result = handled.into_value().unwrap_or(Value::Null);
    result = options.patches.apply(PatchStage::Target, PatchMode::Value, &Pointer::root(), result);

    emit_result::<T>(result, target, serializers.get(&options.serializer)?.as_ref(), output)
}

fn is_wire_shape(shape: WireShape) -> bool {
    matches!(
        shape,
        WireShape::JsonStr | WireShape::JsonBytes | WireShape::BinStream | WireShape::TextStream
    )
}

enum RawInput<T> {
    Struct(T),
    Value(Value),
    Bytes(Vec<u8>),
}

impl<T> RawInput<T>
where
    T: Record,
{
    fn from_input(input: Input<'_, T>) -> Result<RawInput<T>, DriverError> {
        Ok(match input {
            Input::Struct(value) => RawInput::Struct(value),
            Input::Unstruct(value) | Input::Json(value) => RawInput::Value(value),
            Input::JsonStr(s) => RawInput::Bytes(s.as_bytes().to_vec()),
            Input::JsonBytes(b) => RawInput::Bytes(b.to_vec()),
            Input::BinStream(reader) | Input::TextStream(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                RawInput::Bytes(buf)
            }
        })
    }

    fn into_value(self, serializer: &dyn Serializer) -> Result<Value, DriverError> {
        Ok(match self {
            RawInput::Struct(value) => serde_json::to_value(&value).map_err(|e| SerializerError::Malformed {
                encoding: "json",
                message: e.to_string(),
            })?,
            RawInput::Value(value) => value,
            RawInput::Bytes(bytes) => serializer.from_bytes(&bytes)?,
        })
    }
}

fn emit_fast_path<T>(bytes: &[u8], target: WireShape, output: Option<&mut dyn Write>) -> Result<Output<T>, DriverError> {
    match target {
        WireShape::JsonStr => {
            let text = String::from_utf8(bytes.to_vec()).map_err(|e| SerializerError::Malformed {
                encoding: "json",
                message: e.to_string(),
            })?;
            Ok(Output::JsonStr(text))
        }
        WireShape::JsonBytes => Ok(Output::JsonBytes(bytes.to_vec())),
        WireShape::BinStream | WireShape::TextStream => {
            let writer = output.ok_or(DriverError::OutputStreamRequired)?;
            writer.write_all(bytes)?;
            Ok(Output::Written(bytes.len()))
        }
        WireShape::Struct | WireShape::Unstruct | WireShape::Json => unreachable!("is_wire_shape gates this arm"),
    }
}

fn emit_result<T>(
    value: Value,
    target: WireShape,
    serializer: &dyn Serializer,
    output: Option<&mut dyn Write>,
) -> Result<Output<T>, DriverError>
where
    T: Record,
{
    match target {
        WireShape::Struct => {
            let Value::Object(map) = value else { return Err(DriverError::NotAnObject) };
            let fields: HashMap<String, Value> = map.into_iter().collect();
            let instance = T::from_field_map(fields, HashMap::new()).map_err(DriverError::MissingFields)?;
            Ok(Output::Struct(instance))
        }
        WireShape::Unstruct => Ok(Output::Unstruct(value)),
        WireShape::Json => Ok(Output::Json(value)),
        WireShape::JsonStr => Ok(Output::JsonStr(serializer.to_str(&value)?)),
        WireShape::JsonBytes => Ok(Output::JsonBytes(serializer.to_bytes(&value)?)),
        WireShape::BinStream => {
            let writer = output.ok_or(DriverError::OutputStreamRequired)?;
            let bytes = serializer.to_bytes(&value)?;
            writer.write_all(&bytes)?;
            Ok(Output::Written(bytes.len()))
        }
        WireShape::TextStream => {
            let writer = output.ok_or(DriverError::OutputStreamRequired)?;
            let text = serializer.to_str(&value)?;
            writer.write_all(text.as_bytes())?;
            Ok(Output::Written(text.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec_core::{Constraints, FieldDescriptor, RecordSchema};
    use std::sync::OnceLock;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
    struct Person {
        name: String,
        age: i64,
    }

    impl Record for Person {
        fn record_schema() -> Arc<RecordSchema> {
            static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
            SCHEMA
                .get_or_init(|| {
                    Arc::new(RecordSchema {
                        name: "Person",
                        fields: vec![
                            FieldDescriptor {
                                name: "name",
                                alias: "name".to_string(),
                                type_expr: TypeExpr::String,
                                constraints: Constraints::empty(),
                                default: None,
                                has_default_factory: false,
                                is_computed: false,
                                is_cached: false,
                                kw_only: false,
                            },
                            FieldDescriptor {
                                name: "age",
                                alias: "age".to_string(),
                                type_expr: TypeExpr::Int,
                                constraints: Constraints::empty(),
                                default: Some(Value::from(0)),
                                has_default_factory: false,
                                is_computed: false,
                                is_cached: false,
                                kw_only: false,
                            },
                        ],
                        constraints: Constraints::empty(),
                        dependent_groups: Vec::new(),
                        disjoint_groups: Vec::new(),
                        allow_extras: false,
                    })
                })
                .clone()
        }
    }

    impl HasTypeExpr for Person {
        fn type_expr() -> TypeExpr {
            TypeExpr::Record(Person::record_schema())
        }
    }

    #[test]
    fn decodes_json_str_into_struct() {
        let registry = default_registry();
        let serializers = default_serializer_registry();
        let options = ExecuteOptions { validate: true, ..ExecuteOptions::default() };
        let input: Input<'_, Person> = Input::JsonStr(r#"{"name":"Ada","age":36}"#);
        let out = execute(input, options, &registry, &serializers, None).unwrap();
        let Output::Struct(person) = out else { panic!("expected Struct output") };
        assert_eq!(person, Person { name: "Ada".to_string(), age: 36 });
    }

    #[test]
    fn missing_required_field_reports_validation_error() {
        let registry = default_registry();
        let serializers = default_serializer_registry();
        let options = ExecuteOptions { validate: true, target: Some(WireShape::Json), ..ExecuteOptions::default() };
        let input: Input<'_, Person> = Input::JsonStr(r#"{"age":36}"#);
        let err = execute(input, options, &registry, &serializers, None).unwrap_err();
        assert!(matches!(err, DriverError::Validation(_)));
    }

    #[test]
    fn fast_path_skips_decoding_when_neither_coerce_nor_validate() {
        let registry = default_registry();
        let serializers = default_serializer_registry();
        let options = ExecuteOptions { convert: true, target: Some(WireShape::JsonBytes), ..ExecuteOptions::default() };
        let input: Input<'_, Person> = Input::JsonStr(r#"{"name":"Ada","age":36}"#);
        let out = execute(input, options, &registry, &serializers, None).unwrap();
        let Output::JsonBytes(bytes) = out else { panic!("expected JsonBytes output") };
        assert_eq!(bytes, br#"{"name":"Ada","age":36}"#);
    }

    /// Tracks which fields were actually assigned, the way a builder-constructed type
    /// would, so `setted_names` can be overridden to something other than "every field".
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
    struct Profile {
        name: String,
        age: i64,
        #[serde(skip)]
        setted: std::collections::HashSet<String>,
    }

    impl Record for Profile {
        fn record_schema() -> Arc<RecordSchema> {
            static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
            SCHEMA
                .get_or_init(|| {
                    Arc::new(RecordSchema {
                        name: "Profile",
                        fields: vec![
                            FieldDescriptor {
                                name: "name",
                                alias: "name".to_string(),
                                type_expr: TypeExpr::String,
                                constraints: Constraints::empty(),
                                default: None,
                                has_default_factory: false,
                                is_computed: false,
                                is_cached: false,
                                kw_only: false,
                            },
                            FieldDescriptor {
                                name: "age",
                                alias: "age".to_string(),
                                type_expr: TypeExpr::Int,
                                constraints: Constraints::empty(),
                                default: Some(Value::from(0)),
                                has_default_factory: false,
                                is_computed: false,
                                is_cached: false,
                                kw_only: false,
                            },
                        ],
                        constraints: Constraints::empty(),
                        dependent_groups: Vec::new(),
                        disjoint_groups: Vec::new(),
                        allow_extras: false,
                    })
                })
                .clone()
        }

        fn setted_names(&self) -> std::collections::HashSet<String> {
            self.setted.clone()
        }
    }

    impl HasTypeExpr for Profile {
        fn type_expr() -> TypeExpr {
            TypeExpr::Record(Profile::record_schema())
        }
    }

    #[test]
    fn exclude_unset_drops_defaulted_struct_fields_from_output() {
        let registry = default_registry();
        let serializers = default_serializer_registry();
        let profile = Profile { name: "Ada".to_string(), age: 0, setted: ["name".to_string()].into_iter().collect() };
        let options = ExecuteOptions {
            convert: true,
            target: Some(WireShape::Json),
            exclude_unset: true,
            ..ExecuteOptions::default()
        };
        let input: Input<'_, Profile> = Input::Struct(profile);
        let out = execute(input, options, &registry, &serializers, None).unwrap();
        let Output::Json(value) = out else { panic!("expected Json output") };
        let object = value.as_object().unwrap();
        assert!(object.contains_key("name"));
        assert!(!object.contains_key("age"), "age was not in setted_names and exclude_unset=true");
    }
}
