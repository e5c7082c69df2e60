// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The block layer: restart-array prefix compression over a stream of
//! opaque `(key, value-type, value)` triples. It knows nothing about what a
//! ref, log, obj or index record actually *means* — that's `crate::record`.

mod iter;
mod reader;
mod writer;

pub use iter::BlockIter;
pub use reader::BlockReader;
pub use writer::BlockWriter;

/// How many bytes a restart-array offset occupies on disk.
pub(crate) const RESTART_OFFSET_WIDTH: usize = 3;

/// The fixed footprint of the trailing restart count.
pub(crate) const RESTART_COUNT_WIDTH: usize = 2;

/// Which section a block belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlockType {
    /// Ref records.
    Ref,

    /// Reverse object-id index records.
    Obj,

    /// Reflog records.
    Log,

    /// Index records pointing at child blocks.
    Index,
}

impl BlockType {
    #[must_use]
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Ref => b'r',
            Self::Obj => b'o',
            Self::Log => b'l',
            Self::Index => b'i',
        }
    }

    pub(crate) fn from_tag(tag: u8) -> crate::Result<Self> {
        match tag {
            b'r' => Ok(Self::Ref),
            b'o' => Ok(Self::Obj),
            b'l' => Ok(Self::Log),
            b'i' => Ok(Self::Index),
            other => Err(crate::Error::Format(format!(
                "unknown block type tag {other:?}"
            ))),
        }
    }

    /// Only log blocks are zlib-compressed on disk.
    #[must_use]
    pub(crate) fn is_compressible(self) -> bool {
        matches!(self, Self::Log)
    }
}

/// One decoded block record, before the record layer interprets `value`
/// according to `kind`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawEntry {
    pub key: Vec<u8>,
    pub value_type: u8,
    pub value: Vec<u8>,
}
