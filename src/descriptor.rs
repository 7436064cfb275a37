//! Schema construction and reflection: [`Registry`] is the imperative
//! builder used to declare message, field, enum, and oneof descriptors at
//! runtime; [`MessageDescriptor`], [`FieldDescriptor`], [`EnumDescriptor`],
//! [`EnumValueDescriptor`], and [`OneofDescriptor`] are cheap, cloneable
//! handles into a frozen registry, in the spirit of `prost-reflect`'s
//! `FileDescriptor`/`MessageDescriptor` pair but built by hand instead of
//! from a parsed `FileDescriptorSet`.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::error::DescriptorError;
use crate::value::Value;

pub(crate) const MAP_ENTRY_KEY_NUMBER: u32 = 1;
pub(crate) const MAP_ENTRY_VALUE_NUMBER: u32 = 2;

const RESERVED_TAG_RANGE: core::ops::RangeInclusive<u32> = 19000..=19999;
const MAX_TAG: u32 = (1 << 29) - 1;

/// Opaque handle to a message descriptor, stable across the registration
/// and freeze phases. Can be used before [`Registry::define_fields`] is
/// called for that message, which is what makes recursive and mutually
/// referential message schemas possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageKey(usize);

/// Opaque handle to an enum descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumKey(usize);

/// The type of a field's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Message(MessageKey),
    Enum(EnumKey),
}

impl Kind {
    pub fn as_message(&self) -> Option<MessageKey> {
        match self {
            Kind::Message(key) => Some(*key),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<EnumKey> {
        match self {
            Kind::Enum(key) => Some(*key),
            _ => None,
        }
    }

    pub fn is_scalar_numeric(&self) -> bool {
        matches!(
            self,
            Kind::Double
                | Kind::Float
                | Kind::Int32
                | Kind::Int64
                | Kind::Uint32
                | Kind::Uint64
                | Kind::Sint32
                | Kind::Sint64
                | Kind::Fixed32
                | Kind::Fixed64
                | Kind::Sfixed32
                | Kind::Sfixed64
        )
    }

    /// Whether this kind may be used as a map key: the integral kinds,
    /// `bool`, and `string` — never floats, bytes, messages, or enums.
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            Kind::Int32
                | Kind::Int64
                | Kind::Uint32
                | Kind::Uint64
                | Kind::Sint32
                | Kind::Sint64
                | Kind::Fixed32
                | Kind::Fixed64
                | Kind::Sfixed32
                | Kind::Sfixed64
                | Kind::Bool
                | Kind::String
        )
    }
}

/// The repetition behavior of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// The field appears zero or one times.
    Singular,
    /// The field appears zero or more times, encoded as one tag/value pair
    /// per element.
    Repeated,
    /// The field appears zero or more times, encoded as a single
    /// length-delimited run of concatenated element bodies. Only valid for
    /// numeric and bool kinds. Decoding always tolerates the unpacked form
    /// too, regardless of which form a given field declares.
    PackedRepeated,
}

#[derive(Debug, Clone)]
struct FieldInfo {
    tag: u32,
    name: String,
    kind: Kind,
    cardinality: Cardinality,
    oneof_index: Option<usize>,
    required: bool,
    default: Option<Value>,
}

#[derive(Debug, Clone)]
struct OneofInfo {
    name: String,
    fields: Vec<u32>,
}

#[derive(Debug, Clone)]
struct MessageInfo {
    name: String,
    defined: bool,
    /// Set only by `define_fields`, the one-shot batch form. `add_field`
    /// checks this (not `defined`, which it also sets as it builds a
    /// message up incrementally) to reject a call made after the field
    /// table was already sealed in one atomic batch.
    sealed: bool,
    is_map_entry: bool,
    fields: Vec<FieldInfo>,
    tag_index: BTreeMap<u32, usize>,
    name_index: BTreeMap<String, usize>,
    oneofs: Vec<OneofInfo>,
    oneof_index: BTreeMap<String, usize>,
}

impl MessageInfo {
    fn new(name: String) -> Self {
        MessageInfo {
            name,
            defined: false,
            sealed: false,
            is_map_entry: false,
            fields: Vec::new(),
            tag_index: BTreeMap::new(),
            name_index: BTreeMap::new(),
            oneofs: Vec::new(),
            oneof_index: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct EnumInfo {
    name: String,
    values: BTreeMap<i32, String>,
    value_names: BTreeMap<String, i32>,
}

/// Builder for a set of message and enum descriptors.
///
/// Construction is two-phase so that recursive and mutually referential
/// message schemas can be expressed: call [`register_message`][Self::register_message]
/// to obtain a [`MessageKey`] for every message up front (fields may
/// reference any key, including ones not yet defined), then supply each
/// message's fields either in one batch via
/// [`define_fields`][Self::define_fields] or incrementally via
/// [`add_field`][Self::add_field], then [`freeze`][Self::freeze].
#[derive(Debug, Default)]
pub struct Registry {
    messages: Vec<MessageInfo>,
    enums: Vec<EnumInfo>,
    message_names: BTreeMap<String, MessageKey>,
    enum_names: BTreeMap<String, EnumKey>,
    frozen: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unfrozen(&self) -> Result<(), DescriptorError> {
        if self.frozen {
            Err(DescriptorError::SchemaFrozen)
        } else {
            Ok(())
        }
    }

    /// Reserves a [`MessageKey`] for a message named `name`. The message has
    /// no fields until [`define_fields`](Self::define_fields) is called.
    pub fn register_message(&mut self, name: impl Into<String>) -> Result<MessageKey, DescriptorError> {
        self.check_unfrozen()?;
        let name = name.into();
        if self.message_names.contains_key(&name) || self.enum_names.contains_key(&name) {
            return Err(DescriptorError::NameConflict {
                message: "<registry>".to_string(),
                name,
            });
        }
        let key = MessageKey(self.messages.len());
        self.message_names.insert(name.clone(), key);
        self.messages.push(MessageInfo::new(name));
        Ok(key)
    }

    /// Registers a complete enum in one call; enums have no deferred phase
    /// since nothing can recursively reference an enum before it exists.
    pub fn register_enum<I, S>(&mut self, name: impl Into<String>, values: I) -> Result<EnumKey, DescriptorError>
    where
        I: IntoIterator<Item = (i32, S)>,
        S: Into<String>,
    {
        self.check_unfrozen()?;
        let name = name.into();
        if self.message_names.contains_key(&name) || self.enum_names.contains_key(&name) {
            return Err(DescriptorError::NameConflict {
                message: "<registry>".to_string(),
                name,
            });
        }
        let mut info = EnumInfo {
            name: name.clone(),
            values: BTreeMap::new(),
            value_names: BTreeMap::new(),
        };
        for (number, value_name) in values {
            let value_name = value_name.into();
            if info.value_names.contains_key(&value_name) {
                return Err(DescriptorError::NameConflict {
                    message: name,
                    name: value_name,
                });
            }
            info.value_names.insert(value_name.clone(), number);
            info.values.insert(number, value_name);
        }
        let key = EnumKey(self.enums.len());
        self.enum_names.insert(name, key);
        self.enums.push(info);
        Ok(key)
    }

    fn check_tag(message_name: &str, tag: u32) -> Result<(), DescriptorError> {
        if tag < 1 || tag > MAX_TAG || RESERVED_TAG_RANGE.contains(&tag) {
            return Err(DescriptorError::InvalidTag {
                message: message_name.to_string(),
                tag,
            });
        }
        Ok(())
    }

    /// Defines every field of the message referenced by `key`, in one
    /// atomic call — the batch counterpart to [`add_field`](Self::add_field)
    /// for the deferred-construction case recursive/mutually-referential
    /// schemas need.
    ///
    /// This may be called exactly once per message; calling it a second
    /// time, or calling it after [`add_field`](Self::add_field) has already
    /// added fields to the same message, returns
    /// [`DescriptorError::AlreadyDefined`] rather than replacing or
    /// appending to the field table that was already set. On failure
    /// partway through `fields`, the message's field table is left
    /// untouched (no partial field table is ever visible).
    pub fn define_fields(
        &mut self,
        key: MessageKey,
        fields: Vec<FieldSpec>,
    ) -> Result<(), DescriptorError> {
        self.check_unfrozen()?;
        if self.messages[key.0].defined {
            return Err(DescriptorError::AlreadyDefined {
                message: self.messages[key.0].name.clone(),
            });
        }
        let message_name = self.messages[key.0].name.clone();
        let mut info = MessageInfo::new(message_name.clone());

        for spec in fields {
            Self::validate_new_field(&message_name, &info.tag_index, &info.name_index, spec.tag, &spec.name)?;
            self.check_kind_registered(&spec.kind)?;

            let oneof_index = match &spec.oneof {
                Some(oneof) => {
                    if spec.cardinality != Cardinality::Singular || spec.required {
                        return Err(DescriptorError::InvalidOneofMember {
                            oneof: oneof.clone(),
                            field: spec.name,
                        });
                    }
                    Some(Self::resolve_oneof(&mut info.oneofs, &mut info.oneof_index, oneof))
                }
                None => None,
            };

            let field_index = info.fields.len();
            info.tag_index.insert(spec.tag, field_index);
            info.name_index.insert(spec.name.clone(), field_index);
            if let Some(idx) = oneof_index {
                info.oneofs[idx].fields.push(spec.tag);
            }

            info.fields.push(FieldInfo {
                tag: spec.tag,
                name: spec.name,
                kind: spec.kind,
                cardinality: spec.cardinality,
                oneof_index,
                required: spec.required,
                default: spec.default,
            });
        }

        info.defined = true;
        info.sealed = true;
        self.messages[key.0] = info;
        Ok(())
    }

    /// Adds a single field to the message referenced by `key` — the
    /// incremental counterpart to [`define_fields`](Self::define_fields),
    /// for callers (chiefly the code generator) that emit one field
    /// declaration at a time rather than a whole field table in one call.
    ///
    /// `field.tag`/`.name`/`.kind`/`.cardinality` name the field itself;
    /// `field.oneof`/`.required`/`.default` are the per-field options
    /// spec.md §6 groups under `options` (its `message_type`/`key_kind`/
    /// `value_kind`/`enum_type`/`packed` options have no separate field
    /// here, since `Kind::Message`/`Kind::Enum` already carry the target
    /// handle and `Cardinality::PackedRepeated` already selects packing).
    /// May be called any number of times for the same message; each
    /// field becomes visible immediately. Returns
    /// [`DescriptorError::AlreadyDefined`] if `define_fields` already
    /// completed this message's field table.
    pub fn add_field(&mut self, key: MessageKey, field: FieldSpec) -> Result<(), DescriptorError> {
        self.check_unfrozen()?;
        let message_name = self.messages[key.0].name.clone();
        if self.messages[key.0].sealed {
            return Err(DescriptorError::AlreadyDefined {
                message: message_name,
            });
        }

        Self::validate_new_field(
            &message_name,
            &self.messages[key.0].tag_index,
            &self.messages[key.0].name_index,
            field.tag,
            &field.name,
        )?;
        self.check_kind_registered(&field.kind)?;

        let oneof_index = match &field.oneof {
            Some(oneof) => {
                if field.cardinality != Cardinality::Singular || field.required {
                    return Err(DescriptorError::InvalidOneofMember {
                        oneof: oneof.clone(),
                        field: field.name,
                    });
                }
                Some(Self::resolve_oneof(
                    &mut self.messages[key.0].oneofs,
                    &mut self.messages[key.0].oneof_index,
                    oneof,
                ))
            }
            None => None,
        };

        let message = &mut self.messages[key.0];
        let field_index = message.fields.len();
        message.tag_index.insert(field.tag, field_index);
        message.name_index.insert(field.name.clone(), field_index);
        if let Some(idx) = oneof_index {
            message.oneofs[idx].fields.push(field.tag);
        }
        message.fields.push(FieldInfo {
            tag: field.tag,
            name: field.name,
            kind: field.kind,
            cardinality: field.cardinality,
            oneof_index,
            required: field.required,
            default: field.default,
        });
        message.defined = true;
        Ok(())
    }

    /// Checks a candidate field's tag and name against a message's current
    /// index tables, shared by [`define_fields`](Self::define_fields) (which
    /// validates into a not-yet-installed table) and
    /// [`add_field`](Self::add_field) (which validates against the
    /// already-installed one).
    fn validate_new_field(
        message_name: &str,
        tag_index: &BTreeMap<u32, usize>,
        name_index: &BTreeMap<String, usize>,
        tag: u32,
        name: &str,
    ) -> Result<(), DescriptorError> {
        Self::check_tag(message_name, tag)?;
        if tag_index.contains_key(&tag) {
            return Err(DescriptorError::TagConflict {
                message: message_name.to_string(),
                tag,
            });
        }
        if name_index.contains_key(name) {
            return Err(DescriptorError::NameConflict {
                message: message_name.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_kind_registered(&self, kind: &Kind) -> Result<(), DescriptorError> {
        match *kind {
            Kind::Message(target) if target.0 >= self.messages.len() => Err(DescriptorError::UnknownType {
                name: "<message>".to_string(),
            }),
            Kind::Enum(target) if target.0 >= self.enums.len() => Err(DescriptorError::UnknownType {
                name: "<enum>".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Resolves `name` to an existing oneof's index within `oneofs`, or
    /// declares a new one and returns its index.
    fn resolve_oneof(oneofs: &mut Vec<OneofInfo>, oneof_index: &mut BTreeMap<String, usize>, name: &str) -> usize {
        if let Some(&idx) = oneof_index.get(name) {
            idx
        } else {
            let idx = oneofs.len();
            oneofs.push(OneofInfo {
                name: name.to_string(),
                fields: Vec::new(),
            });
            oneof_index.insert(name.to_string(), idx);
            idx
        }
    }

    /// Declares a `map<key_kind, value_kind>` field, registering the
    /// synthetic two-field entry message protobuf itself uses on the wire
    /// (`key` at tag 1, `value` at tag 2) and returning a field spec whose
    /// cardinality is [`Cardinality::Repeated`] over that entry message —
    /// exactly the representation a real `.proto` map compiles to.
    pub fn map_field_spec(
        &mut self,
        tag: u32,
        name: impl Into<String>,
        entry_name: impl Into<String>,
        key_kind: Kind,
        value_kind: Kind,
    ) -> Result<FieldSpec, DescriptorError> {
        self.check_unfrozen()?;
        let name = name.into();
        if !key_kind.is_valid_map_key() {
            return Err(DescriptorError::InvalidMapKey { field: name });
        }

        let entry_key = self.register_message(entry_name)?;
        self.define_fields(
            entry_key,
            alloc::vec![
                FieldSpec::new(MAP_ENTRY_KEY_NUMBER, "key", key_kind),
                FieldSpec::new(MAP_ENTRY_VALUE_NUMBER, "value", value_kind),
            ],
        )?;
        self.messages[entry_key.0].is_map_entry = true;

        Ok(FieldSpec {
            tag,
            name,
            kind: Kind::Message(entry_key),
            cardinality: Cardinality::Repeated,
            oneof: None,
            required: false,
            default: None,
        })
    }

    /// Validates every message has been defined and freezes the registry,
    /// returning a cheaply cloneable handle set.
    pub fn freeze(mut self) -> Result<FrozenRegistry, DescriptorError> {
        for message in &self.messages {
            if !message.defined {
                return Err(DescriptorError::SchemaIncomplete {
                    message: message.name.clone(),
                });
            }
        }
        self.frozen = true;
        Ok(FrozenRegistry {
            inner: Arc::new(self),
        })
    }
}

/// A field to be added to a message via [`Registry::define_fields`] (a
/// whole table at once) or [`Registry::add_field`] (one field at a time).
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub tag: u32,
    pub name: String,
    pub kind: Kind,
    pub cardinality: Cardinality,
    pub oneof: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(tag: u32, name: impl Into<String>, kind: Kind) -> Self {
        FieldSpec {
            tag,
            name: name.into(),
            kind,
            cardinality: Cardinality::Singular,
            oneof: None,
            required: false,
            default: None,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    pub fn packed(mut self) -> Self {
        self.cardinality = Cardinality::PackedRepeated;
        self
    }

    pub fn in_oneof(mut self, oneof: impl Into<String>) -> Self {
        self.oneof = Some(oneof.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A frozen, immutable, reference-counted set of message and enum
/// descriptors. Cheap to clone; every [`MessageDescriptor`] and
/// [`EnumDescriptor`] handed out shares this same allocation.
#[derive(Clone)]
pub struct FrozenRegistry {
    inner: Arc<Registry>,
}

impl fmt::Debug for FrozenRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenRegistry")
            .field("messages", &self.inner.messages.len())
            .field("enums", &self.inner.enums.len())
            .finish()
    }
}

impl PartialEq for FrozenRegistry {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for FrozenRegistry {}

impl FrozenRegistry {
    pub fn get_message_by_name(&self, name: &str) -> Option<MessageDescriptor> {
        self.inner.message_names.get(name).map(|&key| MessageDescriptor {
            registry: self.clone(),
            key,
        })
    }

    pub fn get_message(&self, key: MessageKey) -> MessageDescriptor {
        debug_assert!(key.0 < self.inner.messages.len());
        MessageDescriptor {
            registry: self.clone(),
            key,
        }
    }

    pub fn get_enum_by_name(&self, name: &str) -> Option<EnumDescriptor> {
        self.inner.enum_names.get(name).map(|&key| EnumDescriptor {
            registry: self.clone(),
            key,
        })
    }

    pub fn get_enum(&self, key: EnumKey) -> EnumDescriptor {
        debug_assert!(key.0 < self.inner.enums.len());
        EnumDescriptor {
            registry: self.clone(),
            key,
        }
    }
}

/// A handle to a defined message's schema.
#[derive(Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    registry: FrozenRegistry,
    key: MessageKey,
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDescriptor")
            .field("name", &self.name())
            .finish()
    }
}

impl MessageDescriptor {
    fn info(&self) -> &MessageInfo {
        &self.registry.inner.messages[self.key.0]
    }

    pub fn key(&self) -> MessageKey {
        self.key
    }

    pub fn registry(&self) -> &FrozenRegistry {
        &self.registry
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    /// Whether this is the synthetic entry message type generated for a
    /// `map<K, V>` field.
    pub fn is_map_entry(&self) -> bool {
        self.info().is_map_entry
    }

    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        (0..self.info().fields.len()).map(move |index| FieldDescriptor {
            message: self.clone(),
            index,
        })
    }

    pub fn get_field(&self, tag: u32) -> Option<FieldDescriptor> {
        self.info().tag_index.get(&tag).map(|&index| FieldDescriptor {
            message: self.clone(),
            index,
        })
    }

    pub fn get_field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.info().name_index.get(name).map(|&index| FieldDescriptor {
            message: self.clone(),
            index,
        })
    }

    pub fn oneofs(&self) -> impl ExactSizeIterator<Item = OneofDescriptor> + '_ {
        (0..self.info().oneofs.len()).map(move |index| OneofDescriptor {
            message: self.clone(),
            index,
        })
    }

    pub fn get_oneof_by_name(&self, name: &str) -> Option<OneofDescriptor> {
        self.info()
            .oneof_index
            .get(name)
            .map(|&index| OneofDescriptor {
                message: self.clone(),
                index,
            })
    }
}

/// A handle to one field of a [`MessageDescriptor`].
#[derive(Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    message: MessageDescriptor,
    index: usize,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name())
            .field("tag", &self.tag())
            .finish()
    }
}

impl FieldDescriptor {
    fn info(&self) -> &FieldInfo {
        &self.message.info().fields[self.index]
    }

    pub fn parent_message(&self) -> &MessageDescriptor {
        &self.message
    }

    pub fn tag(&self) -> u32 {
        self.info().tag
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn kind(&self) -> &Kind {
        &self.info().kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.info().cardinality
    }

    pub fn is_required(&self) -> bool {
        self.info().required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.info().default.as_ref()
    }

    /// Whether this field is a `repeated` scalar or message field that is
    /// not the entry type of a map.
    pub fn is_list(&self) -> bool {
        self.cardinality() != Cardinality::Singular && !self.is_map()
    }

    /// Whether this field's values are packed into a single length-delimited
    /// run on the wire by default.
    pub fn is_packed(&self) -> bool {
        self.cardinality() == Cardinality::PackedRepeated
    }

    /// Whether this field is a `map<K, V>`: repeated over a message kind
    /// whose descriptor is a map entry.
    pub fn is_map(&self) -> bool {
        self.cardinality() == Cardinality::Repeated
            && match &self.info().kind {
                Kind::Message(target) => self.message.registry.get_message(*target).is_map_entry(),
                _ => false,
            }
    }

    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        self.info().oneof_index.map(|index| OneofDescriptor {
            message: self.message.clone(),
            index,
        })
    }

    /// The enum schema this field's values are drawn from, or `None` if
    /// this field isn't `Kind::Enum`.
    pub fn enum_descriptor(&self) -> Option<EnumDescriptor> {
        match self.info().kind {
            Kind::Enum(target) => Some(self.message.registry.get_enum(target)),
            _ => None,
        }
    }
}

/// A handle to one `oneof` declaration of a [`MessageDescriptor`].
#[derive(Clone, PartialEq, Eq)]
pub struct OneofDescriptor {
    message: MessageDescriptor,
    index: usize,
}

impl OneofDescriptor {
    fn info(&self) -> &OneofInfo {
        &self.message.info().oneofs[self.index]
    }

    pub fn parent_message(&self) -> &MessageDescriptor {
        &self.message
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.info()
            .fields
            .iter()
            .filter_map(move |&tag| self.message.get_field(tag))
    }
}

/// A handle to an enum's schema.
#[derive(Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    registry: FrozenRegistry,
    key: EnumKey,
}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumDescriptor")
            .field("name", &self.name())
            .finish()
    }
}

impl EnumDescriptor {
    fn info(&self) -> &EnumInfo {
        &self.registry.inner.enums[self.key.0]
    }

    pub fn key(&self) -> EnumKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    /// Looks up the symbolic name of a number, or `None` if `number` is not
    /// one of the enum's declared values — protobuf enums are open, so an
    /// unrecognized number is not an error, just unnamed.
    pub fn get_value_name(&self, number: i32) -> Option<&str> {
        self.info().values.get(&number).map(String::as_str)
    }

    pub fn get_value_by_name(&self, name: &str) -> Option<i32> {
        self.info().value_names.get(name).copied()
    }

    pub fn values(&self) -> impl Iterator<Item = (i32, &str)> {
        self.info().values.iter().map(|(&n, name)| (n, name.as_str()))
    }

    /// The number of the first declared value, used as the implicit
    /// default for an unset proto3 enum field.
    pub fn default_value(&self) -> i32 {
        self.info()
            .values
            .keys()
            .next()
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recursive_message_schema() {
        let mut registry = Registry::new();
        let tree = registry.register_message("Tree").unwrap();
        registry
            .define_fields(
                tree,
                alloc::vec![
                    FieldSpec::new(1, "value", Kind::Int32),
                    FieldSpec::new(2, "left", Kind::Message(tree)),
                    FieldSpec::new(3, "right", Kind::Message(tree)),
                ],
            )
            .unwrap();
        let frozen = registry.freeze().unwrap();
        let tree = frozen.get_message_by_name("Tree").unwrap();
        assert_eq!(tree.fields().len(), 3);
        let left = tree.get_field(2).unwrap();
        assert_eq!(left.kind().as_message(), Some(tree.key()));
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let mut registry = Registry::new();
        let msg = registry.register_message("M").unwrap();
        let err = registry
            .define_fields(
                msg,
                alloc::vec![
                    FieldSpec::new(1, "a", Kind::Int32),
                    FieldSpec::new(1, "b", Kind::Int32),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, DescriptorError::TagConflict { .. }));
    }

    #[test]
    fn reserved_tag_range_is_rejected() {
        let mut registry = Registry::new();
        let msg = registry.register_message("M").unwrap();
        let err = registry
            .define_fields(msg, alloc::vec![FieldSpec::new(19000, "a", Kind::Int32)])
            .unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidTag { tag: 19000, .. }));
    }

    #[test]
    fn map_field_registers_entry_message() {
        let mut registry = Registry::new();
        let msg = registry.register_message("M").unwrap();
        let map_field = registry
            .map_field_spec(1, "numbers", "M.NumbersEntry", Kind::Int32, Kind::String)
            .unwrap();
        registry.define_fields(msg, alloc::vec![map_field]).unwrap();
        let frozen = registry.freeze().unwrap();
        let field = frozen
            .get_message_by_name("M")
            .unwrap()
            .get_field(1)
            .unwrap();
        assert!(field.is_map());
    }

    #[test]
    fn invalid_map_key_is_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .map_field_spec(1, "bad", "M.BadEntry", Kind::Bytes, Kind::String)
            .unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidMapKey { .. }));
    }

    #[test]
    fn define_fields_twice_is_rejected() {
        let mut registry = Registry::new();
        let msg = registry.register_message("M").unwrap();
        registry
            .define_fields(msg, alloc::vec![FieldSpec::new(1, "a", Kind::Int32)])
            .unwrap();
        let err = registry
            .define_fields(msg, alloc::vec![FieldSpec::new(1, "b", Kind::Int32)])
            .unwrap_err();
        assert!(matches!(err, DescriptorError::AlreadyDefined { .. }));

        // The first field table survives the rejected second call.
        let frozen = registry.freeze().unwrap();
        let field = frozen.get_message_by_name("M").unwrap().get_field(1).unwrap();
        assert_eq!(field.name(), "a");
    }

    #[test]
    fn add_field_builds_up_a_message_incrementally() {
        let mut registry = Registry::new();
        let msg = registry.register_message("M").unwrap();
        registry.add_field(msg, FieldSpec::new(1, "x", Kind::Int32)).unwrap();
        registry
            .add_field(msg, FieldSpec::new(2, "name", Kind::String))
            .unwrap();
        let frozen = registry.freeze().unwrap();
        let message = frozen.get_message_by_name("M").unwrap();
        assert_eq!(message.fields().len(), 2);
        assert_eq!(message.get_field(2).unwrap().name(), "name");
    }

    #[test]
    fn add_field_after_define_fields_is_rejected() {
        let mut registry = Registry::new();
        let msg = registry.register_message("M").unwrap();
        registry
            .define_fields(msg, alloc::vec![FieldSpec::new(1, "a", Kind::Int32)])
            .unwrap();
        let err = registry
            .add_field(msg, FieldSpec::new(2, "b", Kind::Int32))
            .unwrap_err();
        assert!(matches!(err, DescriptorError::AlreadyDefined { .. }));
    }

    #[test]
    fn freeze_rejects_a_message_never_given_fields() {
        let mut registry = Registry::new();
        registry.register_message("Forgotten").unwrap();
        let err = registry.freeze().unwrap_err();
        assert!(matches!(err, DescriptorError::SchemaIncomplete { .. }));
    }
}
