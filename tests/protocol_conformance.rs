//! End-to-end scenarios straight out of the wire-format scenario table:
//! byte-exact encodes, round-trips, and the cross-cutting invariants
//! (packed/unpacked tolerance, unknown-field preservation, required-field
//! enforcement, oneof exclusivity, recursive schemas, map semantics).

use protox_core::descriptor::{FieldSpec, Kind, MessageDescriptor, Registry};
use protox_core::{DynamicMessage, Message, Value};

fn simple_message() -> MessageDescriptor {
    let mut registry = Registry::new();
    let msg = registry.register_message("SimpleMessage").unwrap();
    registry
        .define_fields(msg, vec![FieldSpec::new(1, "x", Kind::Int32)])
        .unwrap();
    registry.freeze().unwrap().get_message(msg)
}

#[test]
fn scalar_field_encodes_to_reference_bytes() {
    let mut message = DynamicMessage::new(simple_message());
    message.set(1, Value::I32(1));
    assert_eq!(message.to_bytes().unwrap(), vec![0x08, 0x01]);

    let decoded = DynamicMessage::from_bytes(simple_message(), &[0x08, 0x01][..]).unwrap();
    assert_eq!(decoded.get(1), Some(&Value::I32(1)));
}

#[test]
fn default_applies_only_when_unset_and_has_is_false() {
    let mut registry = Registry::new();
    let msg = registry.register_message("SimpleMessage").unwrap();
    registry
        .define_fields(
            msg,
            vec![FieldSpec::new(1, "x", Kind::Int32).with_default(Value::I32(123))],
        )
        .unwrap();
    let descriptor = registry.freeze().unwrap().get_message(msg);

    let message = DynamicMessage::new(descriptor);
    assert!(!message.has(1));
    assert_eq!(message.get_or_default(1), Value::I32(123));
    assert!(message.to_bytes().unwrap().is_empty());
}

fn repeated_message() -> MessageDescriptor {
    let mut registry = Registry::new();
    let msg = registry.register_message("Repeated").unwrap();
    registry
        .define_fields(
            msg,
            vec![FieldSpec::new(1, "numbers", Kind::Int32).packed()],
        )
        .unwrap();
    registry.freeze().unwrap().get_message(msg)
}

#[test]
fn packed_repeated_scalar_encodes_to_reference_bytes() {
    let mut message = DynamicMessage::new(repeated_message());
    message.set(
        1,
        Value::List(vec![Value::I32(1), Value::I32(2), Value::I32(300)]),
    );
    assert_eq!(
        message.to_bytes().unwrap(),
        vec![0x0A, 0x04, 0x01, 0x02, 0xAC, 0x02]
    );
}

#[test]
fn packed_field_decodes_an_unpacked_stream_and_vice_versa() {
    // Same field declared packed, fed three unpacked (tag, varint) pairs.
    let unpacked = vec![0x08, 0x01, 0x08, 0x02, 0x08, 0xAC, 0x02];
    let decoded = DynamicMessage::from_bytes(repeated_message(), &unpacked[..]).unwrap();
    assert_eq!(
        decoded.get(1),
        Some(&Value::List(vec![
            Value::I32(1),
            Value::I32(2),
            Value::I32(300)
        ]))
    );

    let packed = vec![0x0A, 0x04, 0x01, 0x02, 0xAC, 0x02];
    let decoded = DynamicMessage::from_bytes(repeated_message(), &packed[..]).unwrap();
    assert_eq!(
        decoded.get(1),
        Some(&Value::List(vec![
            Value::I32(1),
            Value::I32(2),
            Value::I32(300)
        ]))
    );
}

#[test]
fn unpacked_declared_field_decodes_a_packed_stream() {
    let mut registry = Registry::new();
    let msg = registry.register_message("Unpacked").unwrap();
    registry
        .define_fields(msg, vec![FieldSpec::new(1, "numbers", Kind::Int32).repeated()])
        .unwrap();
    let descriptor = registry.freeze().unwrap().get_message(msg);

    let packed = vec![0x0A, 0x04, 0x01, 0x02, 0xAC, 0x02];
    let decoded = DynamicMessage::from_bytes(descriptor, &packed[..]).unwrap();
    assert_eq!(
        decoded.get(1),
        Some(&Value::List(vec![
            Value::I32(1),
            Value::I32(2),
            Value::I32(300)
        ]))
    );
}

fn user_with_phone_number() -> (MessageDescriptor, MessageDescriptor) {
    let mut registry = Registry::new();
    let phone_number = registry.register_message("PhoneNumber").unwrap();
    registry
        .define_fields(phone_number, vec![FieldSpec::new(1, "number", Kind::String)])
        .unwrap();

    let user = registry.register_message("User").unwrap();
    registry
        .define_fields(
            user,
            vec![FieldSpec::new(1, "phone", Kind::Message(phone_number))],
        )
        .unwrap();

    let frozen = registry.freeze().unwrap();
    (frozen.get_message(user), frozen.get_message(phone_number))
}

#[test]
fn nested_message_encodes_to_reference_bytes() {
    let (user_descriptor, phone_descriptor) = user_with_phone_number();
    let mut phone = DynamicMessage::new(phone_descriptor);
    phone.set(1, Value::String("555".into()));

    let mut user = DynamicMessage::new(user_descriptor);
    user.set(1, Value::Message(phone));

    assert_eq!(
        user.to_bytes().unwrap(),
        vec![0x0A, 0x05, 0x0A, 0x03, 0x35, 0x35, 0x35]
    );
}

fn response_with_status_oneof() -> MessageDescriptor {
    let mut registry = Registry::new();
    let msg = registry.register_message("Response").unwrap();
    registry
        .define_fields(
            msg,
            vec![
                FieldSpec::new(1, "result", Kind::String).in_oneof("status"),
                FieldSpec::new(2, "error", Kind::Int32).in_oneof("status"),
            ],
        )
        .unwrap();
    registry.freeze().unwrap().get_message(msg)
}

#[test]
fn oneof_member_set_last_wins_and_encodes_to_reference_bytes() {
    let mut message = DynamicMessage::new(response_with_status_oneof());
    message.set(1, Value::String("ok".into()));
    message.set(2, Value::I32(0));

    assert_eq!(message.which_oneof("status"), Some(2));
    assert_eq!(message.to_bytes().unwrap(), vec![0x10, 0x00]);
}

#[test]
fn oneof_exclusivity_is_enforced_on_decode_regardless_of_order() {
    // Both members of "status" present on the wire: result=1 "hi" (tag 1)
    // then error=1 (tag 2). The later-decoded member must win, clearing the
    // earlier one, even though the clearing happens mid-decode rather than
    // through `set`.
    let bytes = vec![0x0A, 0x02, 0x68, 0x69, 0x10, 0x01];
    let decoded = DynamicMessage::from_bytes(response_with_status_oneof(), &bytes[..]).unwrap();

    assert_eq!(decoded.which_oneof("status"), Some(2));
    assert!(!decoded.has(1));
    assert!(decoded.has(2));
    assert_eq!(decoded.to_bytes().unwrap(), vec![0x10, 0x01]);
}

fn map_message() -> MessageDescriptor {
    let mut registry = Registry::new();
    let msg = registry.register_message("Map").unwrap();
    let numbers = registry
        .map_field_spec(1, "numbers", "Map.NumbersEntry", Kind::Int32, Kind::String)
        .unwrap();
    registry.define_fields(msg, vec![numbers]).unwrap();
    registry.freeze().unwrap().get_message(msg)
}

#[test]
fn map_field_encodes_to_reference_bytes() {
    use protox_core::MapKey;
    use std::collections::BTreeMap;

    let mut entries = BTreeMap::new();
    entries.insert(MapKey::I32(1), Value::String("one".into()));

    let mut message = DynamicMessage::new(map_message());
    message.set(1, Value::Map(entries));

    assert_eq!(
        message.to_bytes().unwrap(),
        vec![0x0A, 0x07, 0x08, 0x01, 0x12, 0x03, 0x6F, 0x6E, 0x65]
    );
}

#[test]
fn map_field_last_duplicate_key_wins_on_decode() {
    // Two entries for key 1: "one" then "two"; the wire rule keeps the last.
    let bytes = vec![
        0x0A, 0x07, 0x08, 0x01, 0x12, 0x03, 0x6F, 0x6E, 0x65, // {1: "one"}
        0x0A, 0x07, 0x08, 0x01, 0x12, 0x03, 0x74, 0x77, 0x6F, // {1: "two"}
    ];
    let decoded = DynamicMessage::from_bytes(map_message(), &bytes[..]).unwrap();
    match decoded.get(1).unwrap() {
        Value::Map(entries) => {
            use protox_core::MapKey;
            assert_eq!(entries.len(), 1);
            assert_eq!(entries.get(&MapKey::I32(1)), Some(&Value::String("two".into())));
        }
        other => panic!("expected a map value, got {other:?}"),
    }
}

#[test]
fn map_entry_missing_value_decodes_as_scalar_zero_value() {
    // A map entry with only the key present (tag 1); the value slot is
    // never written on the wire and should come back as the empty string.
    let bytes = vec![0x0A, 0x02, 0x08, 0x01];
    let decoded = DynamicMessage::from_bytes(map_message(), &bytes[..]).unwrap();
    match decoded.get(1).unwrap() {
        Value::Map(entries) => {
            use protox_core::MapKey;
            assert_eq!(entries.get(&MapKey::I32(1)), Some(&Value::String(String::new())));
        }
        other => panic!("expected a map value, got {other:?}"),
    }
}

#[test]
fn recursive_tree_schema_round_trips_through_several_levels() {
    let mut registry = Registry::new();
    let tree = registry.register_message("Tree").unwrap();
    registry
        .define_fields(
            tree,
            vec![
                FieldSpec::new(1, "value", Kind::Int32),
                FieldSpec::new(2, "left", Kind::Message(tree)),
                FieldSpec::new(3, "right", Kind::Message(tree)),
            ],
        )
        .unwrap();
    let descriptor = registry.freeze().unwrap().get_message(tree);

    let mut leaf = DynamicMessage::new(descriptor.clone());
    leaf.set(1, Value::I32(3));

    let mut right = DynamicMessage::new(descriptor.clone());
    right.set(1, Value::I32(2));
    right.set(3, Value::Message(leaf));

    let mut root = DynamicMessage::new(descriptor.clone());
    root.set(1, Value::I32(1));
    root.set(2, Value::Message(right));

    let bytes = root.to_bytes().unwrap();
    let decoded = DynamicMessage::from_bytes(descriptor, &bytes[..]).unwrap();
    assert_eq!(decoded, root);

    let left_child = decoded.get(2).unwrap().as_message().unwrap();
    let grandchild = left_child.get(3).unwrap().as_message().unwrap();
    assert_eq!(grandchild.get(1), Some(&Value::I32(3)));
}

#[test]
fn unknown_fields_round_trip_byte_identical() {
    // A payload with a field tag the descriptor doesn't declare.
    let bytes = vec![0x08, 0x01, 0x18, 0x2A]; // tag 1 (known), tag 3 (unknown varint)
    let decoded = DynamicMessage::from_bytes(simple_message(), &bytes[..]).unwrap();
    assert!(!decoded.unknown_fields().is_empty());
    assert_eq!(decoded.to_bytes().unwrap(), bytes);
}

#[test]
fn encode_is_deterministic() {
    let mut message = DynamicMessage::new(repeated_message());
    message.set(1, Value::List(vec![Value::I32(7), Value::I32(8)]));
    let first = message.to_bytes().unwrap();
    let second = message.to_bytes().unwrap();
    assert_eq!(first, second);
}

#[test]
fn required_field_unset_fails_encode_and_decode() {
    let mut registry = Registry::new();
    let msg = registry.register_message("Required").unwrap();
    registry
        .define_fields(msg, vec![FieldSpec::new(1, "x", Kind::Int32).required()])
        .unwrap();
    let descriptor = registry.freeze().unwrap().get_message(msg);

    let message = DynamicMessage::new(descriptor.clone());
    assert!(message.to_bytes().is_err());

    // A payload missing the required field is rejected once the decode
    // completes and required-field presence is checked.
    assert!(DynamicMessage::from_bytes(descriptor, &[][..]).is_err());
}
