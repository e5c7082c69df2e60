// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The four record shapes a reftable can hold, and the abstract interface
//! they share. The block layer (`crate::block`) treats every record as an
//! opaque `(key, value_type, value)` triple; this module is where that
//! triple gets meaning.

mod index;
mod log;
mod obj;
mod refs;

pub use index::IndexRecord;
pub use log::LogRecord;
pub(crate) use log::log_seek_key;
pub use obj::ObjRecord;
pub(crate) use refs::ref_matches_oid;
pub use refs::{RefRecord, RefValue};

use crate::block::BlockType;

/// Which of the four record shapes a record is.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RecordKind {
    Ref,
    Log,
    Obj,
    Index,
}

impl From<RecordKind> for BlockType {
    fn from(value: RecordKind) -> Self {
        match value {
            RecordKind::Ref => Self::Ref,
            RecordKind::Log => Self::Log,
            RecordKind::Obj => Self::Obj,
            RecordKind::Index => Self::Index,
        }
    }
}

/// Context a record needs to (de)serialize its value: the table's object-id
/// width and the `update_index` baseline ref records delta against.
#[derive(Copy, Clone, Debug)]
pub struct RecordCtx {
    pub hash_size: usize,
    pub min_update_index: u64,
}

/// The interface every record kind presents to the block writer/reader.
#[enum_dispatch::enum_dispatch]
pub trait Record {
    /// The bytes records in this section are ordered and sought by.
    fn key(&self) -> &[u8];

    /// The 4-bit value-type tag stored alongside the record in its block.
    fn value_type(&self) -> u8;

    /// Whether this record represents a removal (a ref tombstone).
    fn is_deletion(&self) -> bool {
        false
    }

    /// Serializes the value payload (everything but the key and
    /// value-type, which the block layer frames itself).
    fn encode_value(&self, ctx: &RecordCtx) -> Vec<u8>;
}

/// A record of any of the four kinds, for code that must stay generic over
/// which section it's writing (e.g. index-block construction, which wraps
/// whichever section it descends).
#[enum_dispatch::enum_dispatch(Record)]
pub enum AnyRecord {
    Ref(RefRecord),
    Log(LogRecord),
    Obj(ObjRecord),
    Index(IndexRecord),
}
