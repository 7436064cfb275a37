use bytes::{Buf, BufMut};

use crate::encoding::varint::{decode_varint, encode_varint, encoded_len_varint};
use crate::error::DecodeErrorKind;
use crate::{DecodeError, EncodeError};

/// Encodes a length delimiter to the buffer.
///
/// An error is returned if the buffer does not have sufficient remaining
/// capacity to hold the delimiter.
pub fn encode_length_delimiter(length: usize, buf: &mut impl BufMut) -> Result<(), EncodeError> {
    let length = length as u64;
    let required = encoded_len_varint(length);
    let remaining = buf.remaining_mut();
    if required > remaining {
        return Err(EncodeError::InsufficientCapacity {
            required,
            remaining,
        });
    }
    encode_varint(length, buf);
    Ok(())
}

/// Returns the encoded length of a length delimiter. The result is between
/// 1 and 10, inclusive.
pub fn length_delimiter_len(length: usize) -> usize {
    encoded_len_varint(length as u64)
}

/// Decodes a length delimiter from the buffer, independently of the
/// message body it prefixes.
pub fn decode_length_delimiter(mut buf: impl Buf) -> Result<usize, DecodeError> {
    let length = decode_varint(&mut buf)?;
    if length > usize::MAX as u64 {
        return Err(DecodeErrorKind::InvalidVarint.into());
    }
    Ok(length as usize)
}
