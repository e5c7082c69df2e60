// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{DecodeError, EncodeError};
use std::path::PathBuf;

/// Represents errors that can occur while reading or writing reftables.
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    Io(std::io::Error),

    /// The requested file does not exist.
    NotExist(PathBuf),

    /// The bytes do not form a well-formed reftable (bad magic, truncated
    /// block, checksum mismatch, ...).
    Format(String),

    /// Serialization failed.
    Encode(EncodeError),

    /// Deserialization failed.
    Decode(DecodeError),

    /// The caller violated an API contract (out-of-order keys, an
    /// `update_index` outside the table's configured range, writing a ref
    /// after a log, ...).
    Api(String),

    /// A block or section grew past what the configured block size or
    /// length fields can address.
    OutOfSpace,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::NotExist(path) => write!(f, "no such file: {}", path.display()),
            Self::Format(msg) => write!(f, "malformed reftable: {msg}"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::Api(msg) => write!(f, "invalid use: {msg}"),
            Self::OutOfSpace => write!(f, "value does not fit within configured limits"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::NotExist(_) | Self::Format(_) | Self::Api(_) | Self::OutOfSpace => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::NotFound {
            Self::NotExist(PathBuf::new())
        } else {
            Self::Io(value)
        }
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
