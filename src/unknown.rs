//! A side channel preserving fields a [`MessageDescriptor`](crate::descriptor::MessageDescriptor)
//! does not recognize, so that decoding and then re-encoding a message is
//! lossless even across schema versions.

use alloc::vec::Vec;

use ::bytes::{Buf, BufMut};

use crate::encoding::{
    decode_key, decode_varint, encode_key, encode_varint, encoded_len_varint, key_len, WireType,
};
use crate::error::DecodeErrorKind;
use crate::DecodeError;

/// A single field value that a message descriptor did not recognize by tag.
///
/// Group payloads are never represented here: a group wire type is always
/// rejected with [`DecodeErrorKind::GroupUnsupported`] before it would reach
/// the unknown-field list.
#[derive(Clone, Debug, PartialEq)]
pub enum UnknownField {
    Varint(u64),
    SixtyFourBit([u8; 8]),
    LengthDelimited(Vec<u8>),
    ThirtyTwoBit([u8; 4]),
}

impl UnknownField {
    fn wire_type(&self) -> WireType {
        match self {
            UnknownField::Varint(_) => WireType::Varint,
            UnknownField::SixtyFourBit(_) => WireType::SixtyFourBit,
            UnknownField::LengthDelimited(_) => WireType::LengthDelimited,
            UnknownField::ThirtyTwoBit(_) => WireType::ThirtyTwoBit,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            UnknownField::Varint(value) => encoded_len_varint(*value),
            UnknownField::SixtyFourBit(_) => 8,
            UnknownField::LengthDelimited(value) => {
                encoded_len_varint(value.len() as u64) + value.len()
            }
            UnknownField::ThirtyTwoBit(_) => 4,
        }
    }

    fn encode(&self, buf: &mut impl BufMut) {
        match self {
            UnknownField::Varint(value) => encode_varint(*value, buf),
            UnknownField::SixtyFourBit(value) => buf.put_slice(value),
            UnknownField::LengthDelimited(value) => {
                encode_varint(value.len() as u64, buf);
                buf.put_slice(value);
            }
            UnknownField::ThirtyTwoBit(value) => buf.put_slice(value),
        }
    }

    fn decode(wire_type: WireType, buf: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(match wire_type {
            WireType::Varint => UnknownField::Varint(decode_varint(buf)?),
            WireType::SixtyFourBit => {
                if buf.remaining() < 8 {
                    return Err(DecodeErrorKind::BufferUnderflow.into());
                }
                let mut bytes = [0u8; 8];
                buf.copy_to_slice(&mut bytes);
                UnknownField::SixtyFourBit(bytes)
            }
            WireType::ThirtyTwoBit => {
                if buf.remaining() < 4 {
                    return Err(DecodeErrorKind::BufferUnderflow.into());
                }
                let mut bytes = [0u8; 4];
                buf.copy_to_slice(&mut bytes);
                UnknownField::ThirtyTwoBit(bytes)
            }
            WireType::LengthDelimited => {
                let len = decode_varint(buf)?;
                if len > buf.remaining() as u64 {
                    return Err(DecodeErrorKind::BufferUnderflow.into());
                }
                UnknownField::LengthDelimited(buf.copy_to_bytes(len as usize).to_vec())
            }
            WireType::StartGroup | WireType::EndGroup => {
                return Err(DecodeErrorKind::GroupUnsupported.into())
            }
        })
    }
}

/// The unrecognized fields carried by a [`DynamicMessage`](crate::value::DynamicMessage),
/// keyed by tag in the order they were first encountered, preserving
/// duplicates in original wire order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnknownFieldList {
    fields: Vec<(u32, UnknownField)>,
}

impl UnknownFieldList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &UnknownField)> {
        self.fields.iter().map(|(tag, field)| (*tag, field))
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub(crate) fn push(&mut self, tag: u32, wire_type: WireType, buf: &mut impl Buf) -> Result<(), DecodeError> {
        let field = UnknownField::decode(wire_type, buf)?;
        self.fields.push((tag, field));
        Ok(())
    }

    pub(crate) fn encoded_len(&self) -> usize {
        self.fields
            .iter()
            .map(|(tag, field)| key_len(*tag) + field.encoded_len())
            .sum()
    }

    pub(crate) fn encode_raw(&self, buf: &mut impl BufMut) {
        for (tag, field) in &self.fields {
            encode_key(*tag, field.wire_type(), buf);
            field.encode(buf);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut list = UnknownFieldList::new();
        let mut varint_payload: &[u8] = &[0x96, 0x01];
        list.push(7, WireType::Varint, &mut varint_payload).unwrap();
        let mut len_payload: &[u8] = &[0x61, 0x62];
        list.push(9, WireType::LengthDelimited, &mut len_payload).unwrap();

        let mut buf = Vec::new();
        list.encode_raw(&mut buf);
        assert_eq!(buf.len(), list.encoded_len());

        let mut slice = buf.as_slice();
        let mut decoded = UnknownFieldList::new();
        while !slice.is_empty() {
            let (tag, wire_type) = decode_key(&mut slice).unwrap();
            decoded.push(tag, wire_type, &mut slice).unwrap();
        }
        assert_eq!(decoded, list);
    }

    #[test]
    fn group_is_rejected() {
        let mut list = UnknownFieldList::new();
        let mut buf: &[u8] = &[];
        let err = list.push(1, WireType::StartGroup, &mut buf).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::GroupUnsupported);
    }
}
