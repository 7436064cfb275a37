use crate::error::DecodeErrorKind;
use crate::DecodeError;

/// The on-wire shape of an encoded Protobuf field.
///
/// The integer value matches the low 3 bits of the field key, exactly as
/// transmitted on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    SixtyFourBit = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    ThirtyTwoBit = 5,
}

impl TryFrom<u64> for WireType {
    type Error = DecodeError;

    #[inline]
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::SixtyFourBit),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::ThirtyTwoBit),
            _ => Err(DecodeErrorKind::InvalidTag.into()),
        }
    }
}

/// Checks that the expected wire type matches the actual wire type on the
/// wire, or returns an error result.
#[inline]
pub fn check_wire_type(expected: WireType, actual: WireType) -> Result<(), DecodeError> {
    if expected != actual {
        return Err(DecodeErrorKind::UnexpectedWireType { actual, expected }.into());
    }
    Ok(())
}
