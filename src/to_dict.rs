//! A debug-only rendering of a [`DynamicMessage`] as a `serde_json::Value`.
//!
//! This has no bearing on the wire format: it exists for logging,
//! snapshot-testing, and ad hoc inspection, not as a serialization format
//! protobuf itself defines.

use alloc::string::ToString;
use core::fmt;

use serde_json::{Map, Number, Value as Json};

use crate::descriptor::{FrozenRegistry, Kind};
use crate::value::{MapKey, Value};
use crate::DynamicMessage;

/// Prints the same rendering [`to_dict`] produces, as compact JSON — enum
/// fields show their symbol where known rather than a bare number.
impl fmt::Display for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_dict(self))
    }
}

/// Renders every present field of `message` as a JSON object keyed by field
/// name. Fields that are unset are omitted entirely, mirroring
/// [`DynamicMessage::has`](crate::DynamicMessage::has). An enum field whose
/// number matches a declared symbol renders as that symbol's name; an
/// unrecognized (open-enum) number renders as a bare integer.
pub fn to_dict(message: &DynamicMessage) -> Json {
    let registry = message.descriptor().registry().clone();
    let mut object = Map::new();
    for field in message.descriptor().fields() {
        if let Some(value) = message.get(field.tag()) {
            object.insert(
                field.name().to_string(),
                value_to_json(value, field.kind(), &registry),
            );
        }
    }
    Json::Object(object)
}

fn value_to_json(value: &Value, kind: &Kind, registry: &FrozenRegistry) -> Json {
    match value {
        Value::Bool(v) => Json::Bool(*v),
        Value::I32(v) => Json::Number(Number::from(*v)),
        Value::I64(v) => Json::Number(Number::from(*v)),
        Value::U32(v) => Json::Number(Number::from(*v)),
        Value::U64(v) => Json::Number(Number::from(*v)),
        Value::F32(v) => Number::from_f64(f64::from(*v)).map(Json::Number).unwrap_or(Json::Null),
        Value::F64(v) => Number::from_f64(*v).map(Json::Number).unwrap_or(Json::Null),
        Value::String(v) => Json::String(v.clone()),
        Value::Bytes(v) => Json::String(hex_encode(v)),
        Value::EnumNumber(v) => match kind.as_enum().and_then(|key| registry.get_enum(key).get_value_name(*v).map(ToString::to_string)) {
            Some(name) => Json::String(name),
            None => Json::Number(Number::from(*v)),
        },
        Value::Message(message) => to_dict(message),
        Value::List(values) => {
            let element_kind = list_element_kind(kind);
            Json::Array(
                values
                    .iter()
                    .map(|v| value_to_json(v, element_kind, registry))
                    .collect(),
            )
        }
        Value::Map(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                object.insert(map_key_to_string(key), value_to_json(value, kind, registry));
            }
            Json::Object(object)
        }
    }
}

fn list_element_kind(kind: &Kind) -> &Kind {
    kind
}

fn map_key_to_string(key: &MapKey) -> alloc::string::String {
    match key {
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(v) => v.clone(),
    }
}

/// Bytes fields have no canonical JSON representation; rendering them as a
/// hex string keeps `to_dict` total without pulling in a base64 dependency
/// purely for debug output.
fn hex_encode(bytes: &[u8]) -> alloc::string::String {
    let mut out = alloc::string::String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&alloc::format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::descriptor::{FieldSpec, Registry};

    #[test]
    fn renders_set_fields_only() {
        let mut registry = Registry::new();
        let msg = registry.register_message("M").unwrap();
        registry
            .define_fields(
                msg,
                alloc::vec![
                    FieldSpec::new(1, "x", Kind::Int32),
                    FieldSpec::new(2, "name", Kind::String),
                ],
            )
            .unwrap();
        let descriptor = registry.freeze().unwrap().get_message(msg);
        let mut message = DynamicMessage::new(descriptor);
        message.set(1, Value::I32(42));

        let dict = to_dict(&message);
        assert_eq!(dict["x"], Json::Number(Number::from(42)));
        assert!(dict.get("name").is_none());
        assert_eq!(message.to_string(), r#"{"x":42}"#);
    }

    #[test]
    fn enum_field_renders_known_symbol_and_unknown_number() {
        let mut registry = Registry::new();
        let status = registry
            .register_enum("Status", [(0, "UNKNOWN"), (1, "OK")])
            .unwrap();
        let msg = registry.register_message("M").unwrap();
        registry
            .define_fields(msg, alloc::vec![FieldSpec::new(1, "status", Kind::Enum(status))])
            .unwrap();
        let descriptor = registry.freeze().unwrap().get_message(msg);

        let mut message = DynamicMessage::new(descriptor.clone());
        message.set(1, Value::EnumNumber(1));
        assert_eq!(to_dict(&message)["status"], Json::String("OK".to_string()));

        let mut message = DynamicMessage::new(descriptor);
        message.set(1, Value::EnumNumber(99));
        assert_eq!(to_dict(&message)["status"], Json::Number(Number::from(99)));
    }
}
