//! [`Value`], [`MapKey`], and [`DynamicMessage`]: the runtime
//! representation of a message whose layout is supplied by a
//! [`MessageDescriptor`] rather than known at compile time.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use ::bytes::{Buf, BufMut, Bytes};

use crate::descriptor::{FieldDescriptor, Kind, MessageDescriptor, MAP_ENTRY_KEY_NUMBER, MAP_ENTRY_VALUE_NUMBER};
use crate::encoding::{self, DecodeContext, WireType};
use crate::error::DecodeErrorKind;
use crate::unknown::UnknownFieldList;
use crate::{DecodeError, EncodeError, Message};

/// The value of a single field, oneof member, list element, or map entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Bytes),
    /// The raw numeric value of an enum field. Protobuf enums are open, so
    /// this is never required to be one of the enum's declared values.
    EnumNumber(i32),
    Message(DynamicMessage),
    List(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

impl Value {
    /// The zero value for a singular (non-list, non-map) field, used to
    /// seed a field slot before a merge or explicit `set`.
    ///
    /// Takes the owning [`FieldDescriptor`] rather than a bare [`Kind`]
    /// because a message-typed field's zero value is itself a
    /// [`DynamicMessage`] that needs a real descriptor, resolved through
    /// the field's parent registry.
    pub fn default_element(field: &FieldDescriptor) -> Value {
        match field.kind() {
            Kind::Double => Value::F64(0.0),
            Kind::Float => Value::F32(0.0),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Value::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Value::I64(0),
            Kind::Uint32 | Kind::Fixed32 => Value::U32(0),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(0),
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::String(String::new()),
            Kind::Bytes => Value::Bytes(Bytes::new()),
            Kind::Enum(_) => Value::EnumNumber(0),
            Kind::Message(key) => {
                let message_desc = field.parent_message().registry().get_message(*key);
                Value::Message(DynamicMessage::new(message_desc))
            }
        }
    }

    /// The container or zero value a field slot starts out as: an empty
    /// list or map for repeated/map fields, otherwise the kind's zero
    /// value.
    pub fn default_for_field(field: &FieldDescriptor) -> Value {
        if field.is_map() {
            Value::Map(BTreeMap::new())
        } else if field.is_list() {
            Value::List(Vec::new())
        } else {
            Value::default_element(field)
        }
    }

    fn matches_kind(&self, kind: &Kind) -> bool {
        matches!(
            (self, kind),
            (Value::Bool(_), Kind::Bool)
                | (Value::I32(_), Kind::Int32 | Kind::Sint32 | Kind::Sfixed32)
                | (Value::I64(_), Kind::Int64 | Kind::Sint64 | Kind::Sfixed64)
                | (Value::U32(_), Kind::Uint32 | Kind::Fixed32)
                | (Value::U64(_), Kind::Uint64 | Kind::Fixed64)
                | (Value::F32(_), Kind::Float)
                | (Value::F64(_), Kind::Double)
                | (Value::String(_), Kind::String)
                | (Value::Bytes(_), Kind::Bytes)
                | (Value::EnumNumber(_), Kind::Enum(_))
                | (Value::Message(_), Kind::Message(_))
        )
    }

    /// Whether this value is a legal value for `field`, accounting for
    /// cardinality (lists and maps carry their element/entry kind inside
    /// themselves, not in the outer `Value` variant).
    pub fn is_valid_for_field(&self, field: &FieldDescriptor) -> bool {
        match self {
            Value::List(values) => {
                field.is_list() && values.iter().all(|v| v.matches_kind(field.kind()))
            }
            // Map entry values are checked field-by-field as they're
            // merged/set through the entry message; here we only confirm
            // the field itself is declared as a map.
            Value::Map(_) => field.is_map(),
            _ => !field.is_list() && !field.is_map() && self.matches_kind(field.kind()),
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut DynamicMessage> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            Value::EnumNumber(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    fn encode_field(&self, field: &FieldDescriptor, buf: &mut impl BufMut) {
        let tag = field.tag();
        match (self, field.kind()) {
            (Value::Bool(value), Kind::Bool) => encoding::bool_::encode(tag, value, buf),
            (Value::I32(value), Kind::Int32) => encoding::int32::encode(tag, value, buf),
            (Value::I32(value), Kind::Sint32) => encoding::sint32::encode(tag, value, buf),
            (Value::I32(value), Kind::Sfixed32) => encoding::sfixed32::encode(tag, value, buf),
            (Value::I64(value), Kind::Int64) => encoding::int64::encode(tag, value, buf),
            (Value::I64(value), Kind::Sint64) => encoding::sint64::encode(tag, value, buf),
            (Value::I64(value), Kind::Sfixed64) => encoding::sfixed64::encode(tag, value, buf),
            (Value::U32(value), Kind::Uint32) => encoding::uint32::encode(tag, value, buf),
            (Value::U32(value), Kind::Fixed32) => encoding::fixed32::encode(tag, value, buf),
            (Value::U64(value), Kind::Uint64) => encoding::uint64::encode(tag, value, buf),
            (Value::U64(value), Kind::Fixed64) => encoding::fixed64::encode(tag, value, buf),
            (Value::F32(value), Kind::Float) => encoding::float::encode(tag, value, buf),
            (Value::F64(value), Kind::Double) => encoding::double::encode(tag, value, buf),
            (Value::String(value), Kind::String) => encoding::string::encode(tag, value, buf),
            (Value::Bytes(value), Kind::Bytes) => encoding::bytes::encode(tag, value, buf),
            (Value::EnumNumber(value), Kind::Enum(_)) => encoding::int32::encode(tag, value, buf),
            (Value::Message(message), Kind::Message(_)) => {
                encoding::message::encode(tag, message, buf)
            }
            (Value::List(values), _) if field.is_list() => {
                if field.is_packed() {
                    encode_packed_list(tag, values, field.kind(), buf);
                } else {
                    for value in values {
                        value.encode_field(field, buf);
                    }
                }
            }
            (Value::Map(entries), Kind::Message(entry_key)) if field.is_map() => {
                let entry_message = field.parent_message().registry().get_message(*entry_key);
                let key_field = entry_message.get_field(MAP_ENTRY_KEY_NUMBER).unwrap();
                let value_field = entry_message.get_field(MAP_ENTRY_VALUE_NUMBER).unwrap();

                for (key, value) in entries {
                    let key_value = key.to_value();
                    let len = key_value.encoded_len(&key_field) + value.encoded_len(&value_field);
                    encoding::encode_key(tag, WireType::LengthDelimited, buf);
                    encoding::encode_varint(len as u64, buf);
                    key_value.encode_field(&key_field, buf);
                    value.encode_field(&value_field, buf);
                }
            }
            _ => unreachable!("value/kind mismatch inside DynamicMessage"),
        }
    }

    fn merge_field(
        &mut self,
        field: &FieldDescriptor,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match (self, field.kind()) {
            (Value::Bool(value), Kind::Bool) => encoding::bool_::merge(wire_type, value, buf, ctx),
            (Value::I32(value), Kind::Int32) => encoding::int32::merge(wire_type, value, buf, ctx),
            (Value::I32(value), Kind::Sint32) => encoding::sint32::merge(wire_type, value, buf, ctx),
            (Value::I32(value), Kind::Sfixed32) => {
                encoding::sfixed32::merge(wire_type, value, buf, ctx)
            }
            (Value::I64(value), Kind::Int64) => encoding::int64::merge(wire_type, value, buf, ctx),
            (Value::I64(value), Kind::Sint64) => encoding::sint64::merge(wire_type, value, buf, ctx),
            (Value::I64(value), Kind::Sfixed64) => {
                encoding::sfixed64::merge(wire_type, value, buf, ctx)
            }
            (Value::U32(value), Kind::Uint32) => encoding::uint32::merge(wire_type, value, buf, ctx),
            (Value::U32(value), Kind::Fixed32) => {
                encoding::fixed32::merge(wire_type, value, buf, ctx)
            }
            (Value::U64(value), Kind::Uint64) => encoding::uint64::merge(wire_type, value, buf, ctx),
            (Value::U64(value), Kind::Fixed64) => {
                encoding::fixed64::merge(wire_type, value, buf, ctx)
            }
            (Value::F32(value), Kind::Float) => encoding::float::merge(wire_type, value, buf, ctx),
            (Value::F64(value), Kind::Double) => encoding::double::merge(wire_type, value, buf, ctx),
            (Value::String(value), Kind::String) => {
                encoding::string::merge(wire_type, value, buf, ctx)
            }
            (Value::Bytes(value), Kind::Bytes) => encoding::bytes::merge(wire_type, value, buf, ctx),
            (Value::EnumNumber(value), Kind::Enum(_)) => {
                encoding::int32::merge(wire_type, value, buf, ctx)
            }
            (Value::Message(message), Kind::Message(_)) => {
                encoding::message::merge(wire_type, message, buf, ctx)
            }
            // A repeated scalar/enum field tolerates both wire
            // representations on decode regardless of which one it
            // declares: a packed field may receive an unpacked stream
            // (falls through to the per-element branch below) and an
            // unpacked field may receive a packed one (this branch).
            // String/bytes/message elements are always length-delimited
            // per element and are never actually "packed".
            (Value::List(values), field_kind) if field.is_list() && is_packable_kind(field_kind) && wire_type == WireType::LengthDelimited => {
                let element_wire_type = packed_element_wire_type(field_kind);
                encoding::merge_loop(values, buf, ctx, |values, buf, ctx| {
                    let mut value = Value::default_element(field);
                    value.merge_field(field, element_wire_type, buf, ctx)?;
                    values.push(value);
                    Ok(())
                })
            }
            (Value::List(values), _) if field.is_list() => {
                let mut value = Value::default_element(field);
                value.merge_field(field, wire_type, buf, ctx)?;
                values.push(value);
                Ok(())
            }
            (Value::Map(entries), Kind::Message(entry_key)) if field.is_map() => {
                let entry_message = field.parent_message().registry().get_message(*entry_key);
                let key_field = entry_message.get_field(MAP_ENTRY_KEY_NUMBER).unwrap();
                let value_field = entry_message.get_field(MAP_ENTRY_VALUE_NUMBER).unwrap();

                let mut key = MapKey::default_for_kind(key_field.kind());
                let mut value = Value::default_for_field(&value_field);
                encoding::merge_loop(
                    &mut (&mut key, &mut value),
                    buf,
                    ctx,
                    |(key, value), buf, ctx| {
                        let (entry_tag, entry_wire_type) = encoding::decode_key(buf)?;
                        match entry_tag {
                            MAP_ENTRY_KEY_NUMBER => {
                                key.merge_field(&key_field, entry_wire_type, buf, ctx)
                            }
                            MAP_ENTRY_VALUE_NUMBER => {
                                value.merge_field(&value_field, entry_wire_type, buf, ctx)
                            }
                            _ => encoding::skip_field(entry_wire_type, entry_tag, buf, ctx),
                        }
                    },
                )?;
                entries.insert(key, value);
                Ok(())
            }
            _ => unreachable!("value/kind mismatch inside DynamicMessage"),
        }
    }

    fn encoded_len(&self, field: &FieldDescriptor) -> usize {
        let tag = field.tag();
        match (self, field.kind()) {
            (Value::Bool(value), Kind::Bool) => encoding::bool_::encoded_len(tag, value),
            (Value::I32(value), Kind::Int32) => encoding::int32::encoded_len(tag, value),
            (Value::I32(value), Kind::Sint32) => encoding::sint32::encoded_len(tag, value),
            (Value::I32(value), Kind::Sfixed32) => encoding::sfixed32::encoded_len(tag, value),
            (Value::I64(value), Kind::Int64) => encoding::int64::encoded_len(tag, value),
            (Value::I64(value), Kind::Sint64) => encoding::sint64::encoded_len(tag, value),
            (Value::I64(value), Kind::Sfixed64) => encoding::sfixed64::encoded_len(tag, value),
            (Value::U32(value), Kind::Uint32) => encoding::uint32::encoded_len(tag, value),
            (Value::U32(value), Kind::Fixed32) => encoding::fixed32::encoded_len(tag, value),
            (Value::U64(value), Kind::Uint64) => encoding::uint64::encoded_len(tag, value),
            (Value::U64(value), Kind::Fixed64) => encoding::fixed64::encoded_len(tag, value),
            (Value::F32(value), Kind::Float) => encoding::float::encoded_len(tag, value),
            (Value::F64(value), Kind::Double) => encoding::double::encoded_len(tag, value),
            (Value::String(value), Kind::String) => encoding::string::encoded_len(tag, value),
            (Value::Bytes(value), Kind::Bytes) => encoding::bytes::encoded_len(tag, value),
            (Value::EnumNumber(value), Kind::Enum(_)) => encoding::int32::encoded_len(tag, value),
            (Value::Message(message), Kind::Message(_)) => {
                encoding::message::encoded_len(tag, message)
            }
            (Value::List(values), _) if field.is_list() => {
                if field.is_packed() {
                    packed_list_encoded_len(tag, values, field.kind())
                } else {
                    values.iter().map(|value| value.encoded_len(field)).sum()
                }
            }
            (Value::Map(entries), Kind::Message(entry_key)) if field.is_map() => {
                let entry_message = field.parent_message().registry().get_message(*entry_key);
                let key_field = entry_message.get_field(MAP_ENTRY_KEY_NUMBER).unwrap();
                let value_field = entry_message.get_field(MAP_ENTRY_VALUE_NUMBER).unwrap();
                let key_len = encoding::key_len(tag);
                entries
                    .iter()
                    .map(|(key, value)| {
                        let key_value = key.to_value();
                        let len =
                            key_value.encoded_len(&key_field) + value.encoded_len(&value_field);
                        key_len + encoding::length_delimiter_len(len) + len
                    })
                    .sum()
            }
            _ => unreachable!("value/kind mismatch inside DynamicMessage"),
        }
    }
}

/// Whether `kind` can ever be encoded packed: every scalar and enum kind
/// except `string`/`bytes`/`message`, which are always one
/// length-delimited value per element.
fn is_packable_kind(kind: &Kind) -> bool {
    kind.is_scalar_numeric() || matches!(kind, Kind::Bool | Kind::Enum(_))
}

fn packed_element_wire_type(kind: &Kind) -> WireType {
    match kind {
        Kind::Double | Kind::Fixed64 | Kind::Sfixed64 => WireType::SixtyFourBit,
        Kind::Float | Kind::Fixed32 | Kind::Sfixed32 => WireType::ThirtyTwoBit,
        _ => WireType::Varint,
    }
}

fn encode_packed_list(tag: u32, values: &[Value], kind: &Kind, buf: &mut impl BufMut) {
    encoding::encode_key(tag, WireType::LengthDelimited, buf);
    let body_len: usize = values.iter().map(|v| packed_element_len(v, kind)).sum();
    encoding::encode_varint(body_len as u64, buf);
    for value in values {
        encode_packed_element(value, kind, buf);
    }
}

fn packed_list_encoded_len(tag: u32, values: &[Value], kind: &Kind) -> usize {
    let body_len: usize = values.iter().map(|v| packed_element_len(v, kind)).sum();
    encoding::key_len(tag) + encoding::length_delimiter_len(body_len) + body_len
}

fn packed_element_len(value: &Value, kind: &Kind) -> usize {
    match (value, kind) {
        (Value::I32(v), Kind::Int32) | (Value::I32(v), Kind::Sint32) => {
            encoding::encoded_len_varint(if matches!(kind, Kind::Sint32) {
                u64::from(encoding::encode_zigzag32(*v))
            } else {
                *v as u32 as u64
            })
        }
        (Value::I32(_), Kind::Sfixed32) | (Value::U32(_), Kind::Fixed32) | (Value::F32(_), _) => 4,
        (Value::I64(v), Kind::Int64) | (Value::I64(v), Kind::Sint64) => {
            encoding::encoded_len_varint(if matches!(kind, Kind::Sint64) {
                encoding::encode_zigzag64(*v)
            } else {
                *v as u64
            })
        }
        (Value::I64(_), Kind::Sfixed64) | (Value::U64(_), Kind::Fixed64) | (Value::F64(_), _) => 8,
        (Value::U32(v), Kind::Uint32) => encoding::encoded_len_varint(u64::from(*v)),
        (Value::U64(v), Kind::Uint64) => encoding::encoded_len_varint(*v),
        (Value::Bool(v), _) => encoding::encoded_len_varint(u64::from(*v)),
        (Value::EnumNumber(v), _) => encoding::encoded_len_varint(*v as u32 as u64),
        _ => unreachable!("invalid element for packed list"),
    }
}

fn encode_packed_element(value: &Value, kind: &Kind, buf: &mut impl BufMut) {
    match (value, kind) {
        (Value::I32(v), Kind::Int32) => encoding::encode_varint(*v as u32 as u64, buf),
        (Value::I32(v), Kind::Sint32) => {
            encoding::encode_varint(u64::from(encoding::encode_zigzag32(*v)), buf)
        }
        (Value::I32(v), Kind::Sfixed32) => buf.put_i32_le(*v),
        (Value::U32(v), Kind::Fixed32) => buf.put_u32_le(*v),
        (Value::U32(v), Kind::Uint32) => encoding::encode_varint(u64::from(*v), buf),
        (Value::F32(v), _) => buf.put_f32_le(*v),
        (Value::I64(v), Kind::Int64) => encoding::encode_varint(*v as u64, buf),
        (Value::I64(v), Kind::Sint64) => encoding::encode_varint(encoding::encode_zigzag64(*v), buf),
        (Value::I64(v), Kind::Sfixed64) => buf.put_i64_le(*v),
        (Value::U64(v), Kind::Fixed64) => buf.put_u64_le(*v),
        (Value::U64(v), Kind::Uint64) => encoding::encode_varint(*v, buf),
        (Value::F64(v), _) => buf.put_f64_le(*v),
        (Value::Bool(v), _) => encoding::encode_varint(u64::from(*v), buf),
        (Value::EnumNumber(v), _) => encoding::encode_varint(*v as u32 as u64, buf),
        _ => unreachable!("invalid element for packed list"),
    }
}

/// A map field's key: the subset of [`Value`] kinds protobuf allows as map
/// keys. Unlike `Value`, this implements `Ord` so it can key a `BTreeMap`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl MapKey {
    pub fn default_for_kind(kind: &Kind) -> MapKey {
        match kind {
            Kind::Bool => MapKey::Bool(false),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => MapKey::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => MapKey::I64(0),
            Kind::Uint32 | Kind::Fixed32 => MapKey::U32(0),
            Kind::Uint64 | Kind::Fixed64 => MapKey::U64(0),
            Kind::String => MapKey::String(String::new()),
            _ => panic!("invalid map key kind"),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(v) => Value::Bool(*v),
            MapKey::I32(v) => Value::I32(*v),
            MapKey::I64(v) => Value::I64(*v),
            MapKey::U32(v) => Value::U32(*v),
            MapKey::U64(v) => Value::U64(*v),
            MapKey::String(v) => Value::String(v.clone()),
        }
    }

    fn merge_field(
        &mut self,
        field: &FieldDescriptor,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        let mut value = self.to_value();
        value.merge_field(field, wire_type, buf, ctx)?;
        *self = match value {
            Value::Bool(v) => MapKey::Bool(v),
            Value::I32(v) => MapKey::I32(v),
            Value::I64(v) => MapKey::I64(v),
            Value::U32(v) => MapKey::U32(v),
            Value::U64(v) => MapKey::U64(v),
            Value::String(v) => MapKey::String(v),
            _ => unreachable!("invalid map key value"),
        };
        Ok(())
    }
}

/// A message value whose fields are driven by a [`MessageDescriptor`]
/// rather than a generated Rust struct.
///
/// Presence is tracked explicitly: a field is only present in
/// [`fields`](DynamicMessage) after [`set`](Self::set) is called or its tag
/// is read off the wire, and [`clear_field`](Self::clear_field) removes it
/// again. This applies uniformly to every field, independent of the
/// proto2/proto3 distinction such a field would carry in a real `.proto`
/// file.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicMessage {
    descriptor: MessageDescriptor,
    fields: BTreeMap<u32, Value>,
    unknown: UnknownFieldList,
}

impl DynamicMessage {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        DynamicMessage {
            descriptor,
            fields: BTreeMap::new(),
            unknown: UnknownFieldList::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    pub fn unknown_fields(&self) -> &UnknownFieldList {
        &self.unknown
    }

    pub fn has(&self, tag: u32) -> bool {
        self.fields.contains_key(&tag)
    }

    /// Name-keyed form of [`has`](Self::has), for callers working from field
    /// names rather than tags (debugging, `to_dict`, generated accessors).
    ///
    /// Panics if `name` does not name a field on this message's descriptor.
    pub fn has_by_name(&self, name: &str) -> bool {
        self.has(self.field_by_name(name).tag())
    }

    pub fn get(&self, tag: u32) -> Option<&Value> {
        self.fields.get(&tag)
    }

    /// Name-keyed form of [`get`](Self::get).
    ///
    /// Panics if `name` does not name a field on this message's descriptor.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.get(self.field_by_name(name).tag())
    }

    fn field_by_name(&self, name: &str) -> FieldDescriptor {
        self.descriptor()
            .get_field_by_name(name)
            .unwrap_or_else(|| panic!("no field named {name:?} on {}", self.descriptor().name()))
    }

    /// Returns the field's value, or its declared default (falling back to
    /// its kind's zero value) if unset. A oneof member's declared default,
    /// if any, is never applied here — callers should check
    /// [`which_oneof`](Self::which_oneof) first if that distinction
    /// matters.
    pub fn get_or_default(&self, tag: u32) -> Value {
        match self.fields.get(&tag) {
            Some(value) => value.clone(),
            None => {
                let field = self
                    .descriptor()
                    .get_field(tag)
                    .unwrap_or_else(|| panic!("no field with tag {tag} on {}", self.descriptor().name()));
                field
                    .default_value()
                    .cloned()
                    .unwrap_or_else(|| Value::default_for_field(&field))
            }
        }
    }

    /// Name-keyed form of [`get_or_default`](Self::get_or_default).
    ///
    /// Panics if `name` does not name a field on this message's descriptor.
    pub fn get_or_default_by_name(&self, name: &str) -> Value {
        self.get_or_default(self.field_by_name(name).tag())
    }

    /// Returns the tag of whichever field in `oneof` is currently set, if
    /// any — at most one ever is, by construction of [`set`](Self::set).
    pub fn which_oneof(&self, oneof_name: &str) -> Option<u32> {
        let oneof = self.descriptor().get_oneof_by_name(oneof_name)?;
        oneof.fields().find(|field| self.has(field.tag())).map(|f| f.tag())
    }

    /// Sets field `tag` to `value`, clearing any other member of the same
    /// oneof.
    ///
    /// Panics if `tag` does not name a field on this message's descriptor,
    /// or if `value`'s shape does not match the field's kind and
    /// cardinality — a programming error in the caller, not a data error.
    pub fn set(&mut self, tag: u32, value: Value) {
        let field = self
            .descriptor()
            .get_field(tag)
            .unwrap_or_else(|| panic!("no field with tag {tag} on {}", self.descriptor().name()));
        assert!(
            value.is_valid_for_field(&field),
            "value does not match the kind of field {:?}",
            field.name()
        );
        if let Some(oneof) = field.containing_oneof() {
            let other_tags: Vec<u32> = oneof
                .fields()
                .map(|f| f.tag())
                .filter(|&t| t != tag)
                .collect();
            for other_tag in other_tags {
                self.fields.remove(&other_tag);
            }
        }
        self.fields.insert(tag, value);
    }

    /// Name-keyed form of [`set`](Self::set).
    ///
    /// Panics if `name` does not name a field on this message's descriptor,
    /// under the same conditions `set` does.
    pub fn set_by_name(&mut self, name: &str, value: Value) {
        self.set(self.field_by_name(name).tag(), value);
    }

    pub fn clear_field(&mut self, tag: u32) {
        self.fields.remove(&tag);
    }

    /// Name-keyed form of [`clear_field`](Self::clear_field).
    ///
    /// Panics if `name` does not name a field on this message's descriptor.
    pub fn clear_field_by_name(&mut self, name: &str) {
        self.clear_field(self.field_by_name(name).tag());
    }

    /// The name of the first `required` field found unset, recursively
    /// checking into any set message-typed fields, or `None` if every
    /// required field is present.
    ///
    /// Returns an owned `String` rather than `&str`: each `field` here is a
    /// [`FieldDescriptor`] handle owned by the loop, not a borrow of
    /// `self`, so its name can't be returned by reference.
    fn first_missing_required(&self) -> Option<String> {
        for field in self.descriptor().fields() {
            if field.is_required() && !self.has(field.tag()) {
                return Some(field.name().to_string());
            }
        }
        for value in self.fields.values() {
            let found = match value {
                Value::Message(message) => message.first_missing_required(),
                Value::List(values) => values
                    .iter()
                    .filter_map(Value::as_message)
                    .find_map(DynamicMessage::first_missing_required),
                Value::Map(entries) => entries
                    .values()
                    .filter_map(Value::as_message)
                    .find_map(DynamicMessage::first_missing_required),
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Checks every `required` field (proto2) is present, recursively into
    /// any set message-typed fields.
    pub fn check_required(&self) -> Result<(), EncodeError> {
        match self.first_missing_required() {
            Some(field) => Err(EncodeError::MissingRequired {
                field: field.into(),
            }),
            None => Ok(()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        self.check_required()?;
        self.encode_to_vec()
    }

    /// Decodes `bytes` into a fresh value of `descriptor`, then checks that
    /// every `required` (proto2) field ended up present.
    pub fn from_bytes(descriptor: MessageDescriptor, bytes: impl Buf) -> Result<Self, DecodeError> {
        let mut message = DynamicMessage::new(descriptor);
        message.merge(bytes)?;
        if let Some(field) = message.first_missing_required() {
            return Err(DecodeErrorKind::MissingRequired {
                field: field.into(),
            }
            .into());
        }
        Ok(message)
    }
}

impl Message for DynamicMessage {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        for (&tag, value) in &self.fields {
            let field = self
                .descriptor()
                .get_field(tag)
                .expect("field present without a matching descriptor entry");
            value.encode_field(&field, buf);
        }
        self.unknown.encode_raw(buf);
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match self.descriptor().get_field(tag) {
            Some(field) => {
                // A newly-decoded oneof member clears any previously-set
                // member of the same group, regardless of decode order.
                if let Some(oneof) = field.containing_oneof() {
                    let other_tags: Vec<u32> = oneof
                        .fields()
                        .map(|f| f.tag())
                        .filter(|&t| t != tag)
                        .collect();
                    for other_tag in other_tags {
                        self.fields.remove(&other_tag);
                    }
                }
                let value = self
                    .fields
                    .entry(tag)
                    .or_insert_with(|| Value::default_for_field(&field));
                value.merge_field(&field, wire_type, buf, ctx)
            }
            None => self.unknown.push(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        for (&tag, value) in &self.fields {
            let field = self.descriptor().get_field(tag).expect("missing field descriptor");
            len += value.encoded_len(&field);
        }
        len + self.unknown.encoded_len()
    }

    fn clear(&mut self) {
        self.fields.clear();
        self.unknown.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::descriptor::{FieldSpec, Registry};

    fn simple_message_descriptor() -> MessageDescriptor {
        let mut registry = Registry::new();
        let msg = registry.register_message("SimpleMessage").unwrap();
        registry
            .define_fields(msg, alloc::vec![FieldSpec::new(1, "x", Kind::Int32)])
            .unwrap();
        registry.freeze().unwrap().get_message(msg)
    }

    #[test]
    fn encodes_scalar_field() {
        let descriptor = simple_message_descriptor();
        let mut message = DynamicMessage::new(descriptor);
        message.set(1, Value::I32(1));
        assert_eq!(message.to_bytes().unwrap(), vec![0x08, 0x01]);
    }

    #[test]
    fn unset_field_encodes_empty_and_has_is_false() {
        let descriptor = simple_message_descriptor();
        let message = DynamicMessage::new(descriptor);
        assert!(!message.has(1));
        assert!(message.to_bytes().unwrap().is_empty());
    }

    #[test]
    fn oneof_exclusivity() {
        let mut registry = Registry::new();
        let msg = registry.register_message("Response").unwrap();
        registry
            .define_fields(
                msg,
                alloc::vec![
                    FieldSpec::new(1, "result", Kind::String).in_oneof("outcome"),
                    FieldSpec::new(2, "error", Kind::Int32).in_oneof("outcome"),
                ],
            )
            .unwrap();
        let descriptor = registry.freeze().unwrap().get_message(msg);
        let mut message = DynamicMessage::new(descriptor);
        message.set(1, Value::String("ok".into()));
        message.set(2, Value::I32(0));
        assert!(!message.has(1));
        assert!(message.has(2));
        assert_eq!(message.to_bytes().unwrap(), vec![0x10, 0x00]);
    }

    #[test]
    fn name_keyed_accessors_match_their_tag_keyed_counterparts() {
        let descriptor = simple_message_descriptor();
        let mut message = DynamicMessage::new(descriptor);

        assert!(!message.has_by_name("x"));
        message.set_by_name("x", Value::I32(7));
        assert!(message.has(1));
        assert!(message.has_by_name("x"));
        assert_eq!(message.get_by_name("x"), message.get(1));
        assert_eq!(message.get_or_default_by_name("x"), Value::I32(7));

        message.clear_field_by_name("x");
        assert!(!message.has(1));
    }
}
