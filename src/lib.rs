#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

// Re-export the alloc crate for use within the rest of the crate and by
// downstream code built against `no_std`.
#[doc(hidden)]
pub extern crate alloc;

pub use bytes;

mod error;
mod message;
mod unknown;
mod value;

#[doc(hidden)]
pub mod encoding;

pub mod descriptor;

#[cfg(feature = "serde-json")]
pub mod to_dict;

pub use crate::encoding::length_delimiter::{
    decode_length_delimiter, encode_length_delimiter, length_delimiter_len,
};
pub use crate::error::{DecodeError, DescriptorError, EncodeError};
pub use crate::message::Message;
pub use crate::unknown::{UnknownField, UnknownFieldList};
pub use crate::value::{DynamicMessage, MapKey, Value};

// See `encoding::DecodeContext` for more info.
// 100 is the default recursion limit in the C++ implementation.
#[cfg(not(feature = "no-recursion-limit"))]
const RECURSION_LIMIT: u32 = 100;
