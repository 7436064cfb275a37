//! Wire-level encode/decode primitives for each scalar kind.
//!
//! These functions operate directly on `bytes::Buf`/`bytes::BufMut` and
//! know nothing about the schema or dynamic message layered on top in
//! [`crate::value`] — they are the leaf layer the rest of the crate is
//! built from, mirroring the split `prost` itself uses between its
//! `encoding` module and the `Message` trait.

use alloc::string::String;
use alloc::vec::Vec;
use core::str;

use ::bytes::{Buf, BufMut, Bytes};

use crate::error::DecodeErrorKind;
use crate::{DecodeError, Message};

pub mod varint;
pub use varint::{
    decode_varint, decode_zigzag32, decode_zigzag64, encode_varint, encode_zigzag32,
    encode_zigzag64, encoded_len_varint,
};

pub mod length_delimiter;
pub use length_delimiter::{
    decode_length_delimiter, encode_length_delimiter, length_delimiter_len,
};

pub mod wire_type;
pub use wire_type::{check_wire_type, WireType};

/// Additional information threaded through every decode/merge call.
///
/// Cloned by value; use [`enter_recursion`](DecodeContext::enter_recursion)
/// before decoding into a nested message.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "no-recursion-limit", derive(Default))]
pub struct DecodeContext {
    #[cfg(not(feature = "no-recursion-limit"))]
    recurse_count: u32,
}

#[cfg(not(feature = "no-recursion-limit"))]
impl Default for DecodeContext {
    #[inline]
    fn default() -> DecodeContext {
        DecodeContext {
            recurse_count: crate::RECURSION_LIMIT,
        }
    }
}

impl DecodeContext {
    #[cfg(not(feature = "no-recursion-limit"))]
    #[inline]
    pub(crate) fn enter_recursion(&self) -> DecodeContext {
        DecodeContext {
            recurse_count: self.recurse_count - 1,
        }
    }

    #[cfg(feature = "no-recursion-limit")]
    #[inline]
    pub(crate) fn enter_recursion(&self) -> DecodeContext {
        DecodeContext {}
    }

    #[cfg(not(feature = "no-recursion-limit"))]
    #[inline]
    pub(crate) fn limit_reached(&self) -> Result<(), DecodeError> {
        if self.recurse_count == 0 {
            Err(DecodeErrorKind::RecursionLimitReached.into())
        } else {
            Ok(())
        }
    }

    #[cfg(feature = "no-recursion-limit")]
    #[inline]
    pub(crate) fn limit_reached(&self) -> Result<(), DecodeError> {
        Ok(())
    }
}

pub const MIN_TAG: u32 = 1;
pub const MAX_TAG: u32 = (1 << 29) - 1;

/// Encodes a Protobuf field key: a wire type designator and a field tag.
#[inline]
pub fn encode_key(tag: u32, wire_type: WireType, buf: &mut impl BufMut) {
    debug_assert!((MIN_TAG..=MAX_TAG).contains(&tag));
    let key = (tag << 3) | wire_type as u32;
    encode_varint(u64::from(key), buf);
}

/// Decodes a Protobuf field key into a tag and wire type.
#[inline]
pub fn decode_key(buf: &mut impl Buf) -> Result<(u32, WireType), DecodeError> {
    let key = decode_varint(buf)?;
    if key > u64::from(u32::MAX) {
        return Err(DecodeErrorKind::InvalidTag.into());
    }
    let wire_type = WireType::try_from(key & 0x07)?;
    let tag = key as u32 >> 3;

    if tag < MIN_TAG {
        return Err(DecodeErrorKind::InvalidTag.into());
    }

    Ok((tag, wire_type))
}

/// The encoded width of a field key with the given tag, between 1 and 5
/// bytes inclusive.
#[inline]
pub fn key_len(tag: u32) -> usize {
    encoded_len_varint(u64::from(tag << 3))
}

/// Reads a varint length prefix, then repeatedly invokes `merge` until
/// exactly that many bytes have been consumed.
pub fn merge_loop<T, M, B>(
    value: &mut T,
    buf: &mut B,
    ctx: DecodeContext,
    mut merge: M,
) -> Result<(), DecodeError>
where
    M: FnMut(&mut T, &mut B, DecodeContext) -> Result<(), DecodeError>,
    B: Buf,
{
    let len = decode_varint(buf)?;
    let remaining = buf.remaining();
    if len > remaining as u64 {
        return Err(DecodeErrorKind::BufferUnderflow.into());
    }

    let limit = remaining - len as usize;
    while buf.remaining() > limit {
        merge(value, buf, ctx.clone())?;
    }

    if buf.remaining() != limit {
        return Err(DecodeErrorKind::DelimitedLengthExceeded.into());
    }
    Ok(())
}

/// Skips a single field's value, honoring nested length-delimited and
/// (historically) group payloads. Used for unrecognized tags when no
/// unknown-field side channel is in use, and internally while skipping
/// fields that belong to another oneof member.
pub fn skip_field(
    wire_type: WireType,
    _tag: u32,
    buf: &mut impl Buf,
    ctx: DecodeContext,
) -> Result<(), DecodeError> {
    ctx.limit_reached()?;
    let len = match wire_type {
        WireType::Varint => decode_varint(buf).map(|_| 0)?,
        WireType::ThirtyTwoBit => 4,
        WireType::SixtyFourBit => 8,
        WireType::LengthDelimited => decode_varint(buf)?,
        WireType::StartGroup | WireType::EndGroup => {
            return Err(DecodeErrorKind::GroupUnsupported.into())
        }
    };

    if len > buf.remaining() as u64 {
        return Err(DecodeErrorKind::BufferUnderflow.into());
    }

    buf.advance(len as usize);
    Ok(())
}

macro_rules! varint_scalar {
    ($ty:ty, $proto_ty:ident, to_uint64($to_uint64_value:ident) $to_uint64:expr, from_uint64($from_uint64_value:ident) $from_uint64:expr) => {
        pub mod $proto_ty {
            use super::*;

            pub fn encode(tag: u32, $to_uint64_value: &$ty, buf: &mut impl BufMut) {
                encode_key(tag, WireType::Varint, buf);
                encode_varint($to_uint64, buf);
            }

            pub fn merge(
                wire_type: WireType,
                value: &mut $ty,
                buf: &mut impl Buf,
                _ctx: DecodeContext,
            ) -> Result<(), DecodeError> {
                check_wire_type(WireType::Varint, wire_type)?;
                let $from_uint64_value = decode_varint(buf)?;
                *value = $from_uint64;
                Ok(())
            }

            #[inline]
            pub fn encoded_len(tag: u32, $to_uint64_value: &$ty) -> usize {
                key_len(tag) + encoded_len_varint($to_uint64)
            }
        }
    };
}

varint_scalar!(bool, bool_, to_uint64(value) u64::from(*value), from_uint64(value) value != 0);
varint_scalar!(i32, int32, to_uint64(value) (*value as u32 as u64), from_uint64(value) value as u32 as i32);
varint_scalar!(i64, int64, to_uint64(value) (*value as u64), from_uint64(value) value as i64);
varint_scalar!(u32, uint32, to_uint64(value) u64::from(*value), from_uint64(value) value as u32);
varint_scalar!(u64, uint64, to_uint64(value) *value, from_uint64(value) value);
varint_scalar!(i32, sint32,
    to_uint64(value) u64::from(encode_zigzag32(*value)),
    from_uint64(value) decode_zigzag32(value as u32));
varint_scalar!(i64, sint64,
    to_uint64(value) encode_zigzag64(*value),
    from_uint64(value) decode_zigzag64(value));

macro_rules! fixed_scalar {
    ($ty:ty, $width:expr, $wire_type:expr, $proto_ty:ident, $put:ident, $get:ident) => {
        pub mod $proto_ty {
            use super::*;

            pub fn encode(tag: u32, value: &$ty, buf: &mut impl BufMut) {
                encode_key(tag, $wire_type, buf);
                buf.$put(*value);
            }

            pub fn merge(
                wire_type: WireType,
                value: &mut $ty,
                buf: &mut impl Buf,
                _ctx: DecodeContext,
            ) -> Result<(), DecodeError> {
                check_wire_type($wire_type, wire_type)?;
                if buf.remaining() < $width {
                    return Err(DecodeErrorKind::BufferUnderflow.into());
                }
                *value = buf.$get();
                Ok(())
            }

            #[inline]
            pub fn encoded_len(tag: u32, _value: &$ty) -> usize {
                key_len(tag) + $width
            }
        }
    };
}

fixed_scalar!(u32, 4, WireType::ThirtyTwoBit, fixed32, put_u32_le, get_u32_le);
fixed_scalar!(i32, 4, WireType::ThirtyTwoBit, sfixed32, put_i32_le, get_i32_le);
fixed_scalar!(f32, 4, WireType::ThirtyTwoBit, float, put_f32_le, get_f32_le);
fixed_scalar!(u64, 8, WireType::SixtyFourBit, fixed64, put_u64_le, get_u64_le);
fixed_scalar!(i64, 8, WireType::SixtyFourBit, sfixed64, put_i64_le, get_i64_le);
fixed_scalar!(f64, 8, WireType::SixtyFourBit, double, put_f64_le, get_f64_le);

pub mod string {
    use super::*;

    pub fn encode(tag: u32, value: &str, buf: &mut impl BufMut) {
        encode_key(tag, WireType::LengthDelimited, buf);
        encode_varint(value.len() as u64, buf);
        buf.put_slice(value.as_bytes());
    }

    pub fn merge(
        wire_type: WireType,
        value: &mut String,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        check_wire_type(WireType::LengthDelimited, wire_type)?;
        let mut bytes = Vec::new();
        self::bytes::merge_vec(wire_type, &mut bytes, buf, ctx)?;
        match String::from_utf8(bytes) {
            Ok(s) => {
                *value = s;
                Ok(())
            }
            Err(_) => Err(DecodeErrorKind::InvalidUtf8.into()),
        }
    }

    #[inline]
    pub fn encoded_len(tag: u32, value: &str) -> usize {
        key_len(tag) + encoded_len_varint(value.len() as u64) + value.len()
    }
}

pub mod bytes {
    use super::*;

    pub fn encode(tag: u32, value: &[u8], buf: &mut impl BufMut) {
        encode_key(tag, WireType::LengthDelimited, buf);
        encode_varint(value.len() as u64, buf);
        buf.put_slice(value);
    }

    /// Decode straight into a `Bytes`, zero-copy when the source buffer
    /// supports it.
    pub fn merge(
        wire_type: WireType,
        value: &mut Bytes,
        buf: &mut impl Buf,
        _ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        check_wire_type(WireType::LengthDelimited, wire_type)?;
        let len = decode_varint(buf)?;
        if len > buf.remaining() as u64 {
            return Err(DecodeErrorKind::BufferUnderflow.into());
        }
        *value = buf.copy_to_bytes(len as usize);
        Ok(())
    }

    pub(super) fn merge_vec(
        wire_type: WireType,
        value: &mut Vec<u8>,
        buf: &mut impl Buf,
        _ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        check_wire_type(WireType::LengthDelimited, wire_type)?;
        let len = decode_varint(buf)?;
        if len > buf.remaining() as u64 {
            return Err(DecodeErrorKind::BufferUnderflow.into());
        }
        value.clear();
        value.reserve(len as usize);
        value.put(buf.take(len as usize));
        Ok(())
    }

    #[inline]
    pub fn encoded_len(tag: u32, value: &[u8]) -> usize {
        key_len(tag) + encoded_len_varint(value.len() as u64) + value.len()
    }
}

/// Nested-message encode/decode, generic over anything implementing
/// [`Message`]. Used by the dynamic message for singular and repeated
/// message-typed fields, and by map entries.
pub mod message {
    use super::*;

    pub fn encode<M>(tag: u32, msg: &M, buf: &mut impl BufMut)
    where
        M: Message,
    {
        encode_key(tag, WireType::LengthDelimited, buf);
        encode_varint(msg.encoded_len() as u64, buf);
        msg.encode_raw(buf);
    }

    pub fn merge<M, B>(
        wire_type: WireType,
        msg: &mut M,
        buf: &mut B,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError>
    where
        M: Message,
        B: Buf,
    {
        check_wire_type(WireType::LengthDelimited, wire_type)?;
        ctx.limit_reached()?;
        merge_loop(
            msg,
            buf,
            ctx.enter_recursion(),
            |msg: &mut M, buf: &mut B, ctx| {
                let (tag, wire_type) = decode_key(buf)?;
                msg.merge_field(tag, wire_type, buf, ctx)
            },
        )
    }

    #[inline]
    pub fn encoded_len<M>(tag: u32, msg: &M) -> usize
    where
        M: Message,
    {
        let len = msg.encoded_len();
        key_len(tag) + encoded_len_varint(len as u64) + len
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_roundtrip() {
        for tag in [1u32, 2, 15, 16, 2047, 2048, MAX_TAG] {
            for wire_type in [
                WireType::Varint,
                WireType::SixtyFourBit,
                WireType::LengthDelimited,
                WireType::ThirtyTwoBit,
            ] {
                let mut buf = Vec::new();
                encode_key(tag, wire_type, &mut buf);
                assert_eq!(buf.len(), key_len(tag));
                let mut slice = buf.as_slice();
                let (decoded_tag, decoded_wire_type) = decode_key(&mut slice).unwrap();
                assert_eq!(decoded_tag, tag);
                assert_eq!(decoded_wire_type, wire_type);
            }
        }
    }

    #[test]
    fn group_wire_type_is_rejected() {
        let mut buf = Vec::new();
        encode_key(1, WireType::StartGroup, &mut buf);
        let mut slice = buf.as_slice();
        let (tag, wire_type) = decode_key(&mut slice).unwrap();
        assert_eq!(tag, 1);
        let err = skip_field(wire_type, tag, &mut slice, DecodeContext::default()).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::GroupUnsupported);
    }

    #[test]
    fn int32_matches_reference_bytes() {
        // SimpleMessage{x: int32 @ tag 1} with x=1 encodes to 08 01.
        let mut buf = Vec::new();
        int32::encode(1, &1i32, &mut buf);
        assert_eq!(buf, vec![0x08, 0x01]);
    }
}
