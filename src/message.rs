//! The [`Message`] trait: the encode/decode contract every Protobuf message
//! value satisfies, whether it's a [`DynamicMessage`](crate::value::DynamicMessage)
//! or a synthetic map-entry message.

use alloc::boxed::Box;
use alloc::vec::Vec;

use ::bytes::{Buf, BufMut};

use crate::encoding::{DecodeContext, WireType};
use crate::{DecodeError, EncodeError};

/// A Protobuf message: something that can encode itself to the wire format
/// and merge wire-format bytes into itself.
///
/// Mirrors the split between the raw, infallible `_raw` methods (which
/// assume the destination buffer has enough capacity and the source buffer
/// is well-formed up to the point of the call) and the public, checked
/// `encode`/`decode`/`merge` entry points.
pub trait Message: Send + Sync {
    /// Encodes every set field to the buffer, without a length prefix.
    #[doc(hidden)]
    fn encode_raw(&self, buf: &mut impl BufMut)
    where
        Self: Sized;

    /// Decodes a single field and merges it into `self`.
    ///
    /// `tag` and `wire_type` have already been read off the wire; `buf` is
    /// positioned immediately after the key.
    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized;

    /// The number of bytes [`encode_raw`](Self::encode_raw) would write.
    fn encoded_len(&self) -> usize;

    /// Clears every field back to its default/unset state.
    fn clear(&mut self);

    /// Encodes the message to a newly allocated buffer.
    fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError>
    where
        Self: Sized,
    {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Encodes the message to `buf`, which must have at least
    /// [`encoded_len`](Self::encoded_len) bytes of remaining capacity.
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), EncodeError>
    where
        Self: Sized,
    {
        let required = self.encoded_len();
        let remaining = buf.remaining_mut();
        if required > remaining {
            return Err(EncodeError::InsufficientCapacity {
                required,
                remaining,
            });
        }
        self.encode_raw(buf);
        Ok(())
    }

    /// Encodes the message with a leading length delimiter.
    fn encode_length_delimited(&self, buf: &mut impl BufMut) -> Result<(), EncodeError>
    where
        Self: Sized,
    {
        let len = self.encoded_len();
        let required = crate::encoding::length_delimiter_len(len) + len;
        let remaining = buf.remaining_mut();
        if required > remaining {
            return Err(EncodeError::InsufficientCapacity {
                required,
                remaining,
            });
        }
        crate::encoding::encode_varint(len as u64, buf);
        self.encode_raw(buf);
        Ok(())
    }

    /// Decodes an instance of the message from `buf`.
    fn decode(mut buf: impl Buf) -> Result<Self, DecodeError>
    where
        Self: Default + Sized,
    {
        let mut message = Self::default();
        Self::merge(&mut message, &mut buf)?;
        Ok(message)
    }

    /// Decodes a length-delimited instance of the message from `buf`.
    fn decode_length_delimited(mut buf: impl Buf) -> Result<Self, DecodeError>
    where
        Self: Default + Sized,
    {
        let mut message = Self::default();
        Self::merge_length_delimited(&mut message, &mut buf)?;
        Ok(message)
    }

    /// Decodes an instance of the message into `self`, replacing the fields
    /// it touches and leaving the rest alone, like `FieldMask`-style merges.
    fn merge(&mut self, mut buf: impl Buf) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        let ctx = DecodeContext::default();
        while buf.has_remaining() {
            let (tag, wire_type) = crate::encoding::decode_key(&mut buf)?;
            self.merge_field(tag, wire_type, &mut buf, ctx.clone())?;
        }
        Ok(())
    }

    /// Decodes a length-delimited instance of the message into `self`.
    fn merge_length_delimited(&mut self, mut buf: impl Buf) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        crate::encoding::message::merge(
            WireType::LengthDelimited,
            self,
            &mut buf,
            DecodeContext::default(),
        )
    }
}

impl<M> Message for Box<M>
where
    M: Message,
{
    fn encode_raw(&self, buf: &mut impl BufMut) {
        (**self).encode_raw(buf)
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        (**self).merge_field(tag, wire_type, buf, ctx)
    }

    fn encoded_len(&self) -> usize {
        (**self).encoded_len()
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const _MESSAGE_IS_OBJECT_SAFE: Option<&dyn Message> = None;
}
