// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Primitive (de)serialization: big-endian fixed-width integers and
//! base-128 varints, the building blocks every record and header uses.

use std::io::{Read, Write};
use varint_rs::{VarintReader, VarintWriter};

/// Error during serialization.
#[derive(Debug)]
pub enum EncodeError {
    /// I/O error.
    Io(std::io::Error),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EncodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
            }
        )
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
        }
    }
}

/// Error during deserialization.
#[derive(Debug)]
pub enum DecodeError {
    /// I/O error (including unexpected EOF).
    Io(std::io::Error),

    /// The bytes do not form a valid instance of the target type.
    Invalid(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "DecodeError::Io({e})"),
            Self::Invalid(msg) => write!(f, "DecodeError::Invalid({msg})"),
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

/// Trait to serialize stuff.
pub trait Encode {
    /// Serializes into writer.
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError>;

    /// Serializes into vector.
    fn encode_into_vec(&self) -> Vec<u8> {
        let mut v = vec![];
        self.encode_into(&mut v).expect("cannot fail");
        v
    }
}

/// Trait to deserialize stuff.
pub trait Decode {
    /// Deserializes from reader.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

/// Reads a base-128 little-endian varint (the reftable wire encoding for
/// record-level framing: shared/suffix/extra lengths, restart counts, ...).
pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64, DecodeError> {
    Ok(reader.read_u64_varint()?)
}

/// Writes a base-128 little-endian varint.
pub fn write_varint<W: Write>(writer: &mut W, value: u64) -> Result<(), EncodeError> {
    writer.write_u64_varint(value)?;
    Ok(())
}

/// Reads a big-endian unsigned integer of `width` bytes (1..=8).
pub fn read_be_uint<R: Read>(reader: &mut R, width: usize) -> Result<u64, DecodeError> {
    debug_assert!((1..=8).contains(&width));
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf[8 - width..])?;
    Ok(u64::from_be_bytes(buf))
}

/// Writes the low `width` bytes of `value`, big-endian.
pub fn write_be_uint<W: Write>(
    writer: &mut W,
    value: u64,
    width: usize,
) -> Result<(), EncodeError> {
    debug_assert!((1..=8).contains(&width));
    let buf = value.to_be_bytes();
    writer.write_all(&buf[8 - width..])?;
    Ok(())
}
