//! Protobuf encoding, decoding, and schema-construction errors.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

pub use decode_error_kind::DecodeErrorKind;

/// A Protobuf message decoding error.
///
/// `DecodeError` indicates that the input buffer does not contain a valid
/// Protobuf message for the descriptor driving the decode. The error
/// details should be considered 'best effort': in general it is not
/// possible to exactly pinpoint why data is malformed.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodeError {
    inner: Box<Inner>,
}

#[derive(Clone, PartialEq, Eq)]
struct Inner {
    kind: DecodeErrorKind,
    path: ErrorPath,
}

impl DecodeError {
    /// Get details about the decode error.
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.inner.kind
    }

    /// Get the location where the error occurred as a logical path.
    ///
    /// The error path represents the stack of message fields being
    /// decoded as the error occurred, from the root message down to the
    /// nested field where the failure actually happened.
    pub fn path(&self) -> &ErrorPath {
        &self.inner.path
    }

    /// Push a segment onto the error path.
    ///
    /// Called by the codec as a decode error unwinds out of a nested
    /// message, so the final error carries a full field path.
    pub(crate) fn push_path(&mut self, segment: ErrorPathSegment) {
        self.inner.path.segments.push(segment);
    }
}

/// Logical path to the location of an error using Protobuf message/field names.
///
/// An empty path represents an error that happened "at the root" message.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ErrorPath {
    segments: Vec<ErrorPathSegment>,
}

impl ErrorPath {
    /// Create a new empty error path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate the path's segments, root first.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorPathSegment> {
        self.segments.iter()
    }
}

/// A segment identifying a specific Protobuf message field by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPathSegment {
    message: String,
    field: String,
}

impl ErrorPathSegment {
    pub(crate) fn new(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: field.into(),
        }
    }

    /// The protobuf message name this segment refers to.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The field name within [`message`](Self::message) this segment refers to.
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeError")
            .field("kind", &self.inner.kind)
            .field("path", &self.inner.path)
            .finish()
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode Protobuf message: {}", self.inner.kind)?;
        for segment in self.path().iter() {
            write!(f, ": {}.{}", segment.message(), segment.field())?;
        }
        Ok(())
    }
}

impl From<DecodeErrorKind> for DecodeError {
    fn from(kind: DecodeErrorKind) -> Self {
        DecodeError {
            inner: Box::new(Inner {
                kind,
                path: ErrorPath::new(),
            }),
        }
    }
}

pub mod decode_error_kind {
    use super::*;
    use crate::encoding::WireType;

    /// A 'best effort' root cause for a [`DecodeError`].
    ///
    /// Named after the error kinds in the protobuf core specification
    /// rather than after Rust type names, so callers can match on the
    /// taxonomy without caring how a given variant is represented.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum DecodeErrorKind {
        /// The varint continuation bit was still set after 10 bytes, or
        /// the buffer ran out mid-varint.
        InvalidVarint,
        /// A fixed32/fixed64 field, or a length-delimited payload, ran
        /// past the end of the buffer.
        BufferUnderflow,
        /// A length-delimited submessage did not consume exactly its
        /// declared length.
        DelimitedLengthExceeded,
        /// The wire type on the tag did not match any wire type the
        /// field descriptor accepts (including the packed/unpacked
        /// tolerance rule).
        UnexpectedWireType {
            /// Wire type found on the wire.
            actual: WireType,
            /// Wire type expected for the field.
            expected: WireType,
        },
        /// A group-encoded field (wire type 3 or 4) was encountered;
        /// groups are not supported.
        GroupUnsupported,
        /// A string field's bytes were not valid UTF-8.
        InvalidUtf8,
        /// A key's numeric field number was 0, or exceeded `u32::MAX`.
        InvalidTag,
        /// A required (proto2) field was unset after decoding completed.
        MissingRequired {
            /// Name of the field that was required but unset.
            field: String,
        },
        /// The recursion limit was reached while decoding nested messages.
        #[cfg(not(feature = "no-recursion-limit"))]
        RecursionLimitReached,
    }

    impl fmt::Display for DecodeErrorKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::InvalidVarint => f.write_str("invalid varint"),
                Self::BufferUnderflow => f.write_str("buffer underflow"),
                Self::DelimitedLengthExceeded => f.write_str("delimited length exceeded"),
                Self::UnexpectedWireType { actual, expected } => write!(
                    f,
                    "invalid wire type: {actual:?} (expected {expected:?})"
                ),
                Self::GroupUnsupported => f.write_str("group wire type is not supported"),
                Self::InvalidUtf8 => f.write_str("invalid string value: data is not UTF-8 encoded"),
                Self::InvalidTag => f.write_str("invalid tag value"),
                Self::MissingRequired { field } => {
                    write!(f, "missing required field: {field}")
                }
                #[cfg(not(feature = "no-recursion-limit"))]
                Self::RecursionLimitReached => f.write_str("recursion limit reached"),
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(feature = "std")]
impl From<DecodeError> for std::io::Error {
    fn from(error: DecodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())
    }
}

/// A Protobuf message encoding error.
///
/// Encoding is infallible except for two cases: the destination buffer has
/// insufficient capacity, or a required (proto2) field is unset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// The destination buffer did not have enough remaining capacity.
    InsufficientCapacity {
        /// Capacity required to encode the message.
        required: usize,
        /// Capacity actually remaining in the buffer.
        remaining: usize,
    },
    /// A required (proto2) field was unset at encode time.
    MissingRequired {
        /// Name of the field that was required but unset.
        field: String,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientCapacity {
                required,
                remaining,
            } => write!(
                f,
                "failed to encode Protobuf message; insufficient buffer capacity \
                 (required: {required}, remaining: {remaining})"
            ),
            Self::MissingRequired { field } => {
                write!(f, "failed to encode Protobuf message; missing required field: {field}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

/// An error produced while constructing a schema (message/enum descriptors)
/// via the [`Registry`](crate::descriptor::Registry) builder API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    /// A field tag was outside `1..=2^29-1`, or inside the reserved range
    /// `19000..=19999`.
    InvalidTag {
        /// The message the field was being added to.
        message: String,
        /// The offending tag.
        tag: u32,
    },
    /// Two fields in the same message declared the same tag.
    TagConflict {
        /// The message the conflicting fields belong to.
        message: String,
        /// The conflicting tag.
        tag: u32,
    },
    /// Two fields (or a field and another member) in the same message
    /// declared the same name.
    NameConflict {
        /// The message the conflicting fields belong to.
        message: String,
        /// The conflicting name.
        name: String,
    },
    /// A oneof group contained a field that is itself repeated, a map, or
    /// (in proto2) required.
    InvalidOneofMember {
        /// The oneof group.
        oneof: String,
        /// The field that cannot join a oneof.
        field: String,
    },
    /// A map field's key kind was not one of the kinds permitted by the
    /// protobuf spec (integers, bool, string).
    InvalidMapKey {
        /// The map field.
        field: String,
    },
    /// A field, enum, or message name was referenced but never registered.
    UnknownType {
        /// The name that could not be resolved.
        name: String,
    },
    /// A message was registered via `register_message` but never completed
    /// with a matching `define_fields` call before the registry was frozen.
    SchemaIncomplete {
        /// The message left without a field table.
        message: String,
    },
    /// `define_fields` was called a second time for the same message.
    AlreadyDefined {
        /// The message whose field table is already set.
        message: String,
    },
    /// A registration call was made after [`Registry::freeze`](crate::descriptor::Registry::freeze).
    SchemaFrozen,
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTag { message, tag } => {
                write!(f, "{message}: invalid field tag {tag}")
            }
            Self::TagConflict { message, tag } => {
                write!(f, "{message}: tag {tag} is already in use")
            }
            Self::NameConflict { message, name } => {
                write!(f, "{message}: name {name:?} is already in use")
            }
            Self::InvalidOneofMember { oneof, field } => {
                write!(f, "oneof {oneof:?}: field {field:?} cannot be a oneof member")
            }
            Self::InvalidMapKey { field } => {
                write!(f, "{field}: invalid map key kind")
            }
            Self::UnknownType { name } => write!(f, "unknown type: {name:?}"),
            Self::SchemaIncomplete { message } => {
                write!(f, "{message}: registered but never given a field table")
            }
            Self::AlreadyDefined { message } => {
                write!(f, "{message}: define_fields was already called for this message")
            }
            Self::SchemaFrozen => f.write_str("schema registry is frozen"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DescriptorError {}
