// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Record, RecordCtx};
use crate::coding::{read_varint, write_varint};
use std::io::Cursor;

/// Reverse index from an object-id prefix to the byte offsets of ref blocks
/// that contain a ref pointing at it.
///
/// An empty `offsets` list is not "no matches" (such a prefix simply isn't
/// written); it is the too-many-collisions fallback sentinel, and the
/// reader falls back to a linear `refs_for` scan when it sees one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjRecord {
    pub hash_prefix: Vec<u8>,
    pub offsets: Vec<u64>,
}

impl Record for ObjRecord {
    fn key(&self) -> &[u8] {
        &self.hash_prefix
    }

    fn value_type(&self) -> u8 {
        0
    }

    fn encode_value(&self, _ctx: &RecordCtx) -> Vec<u8> {
        if self.offsets.is_empty() {
            return Vec::new();
        }

        let mut buf = Vec::new();
        write_varint(&mut buf, self.offsets.len() as u64).expect("vec write cannot fail");

        let mut prev = 0u64;
        for (i, &offset) in self.offsets.iter().enumerate() {
            let delta = if i == 0 { offset } else { offset - prev };
            write_varint(&mut buf, delta).expect("vec write cannot fail");
            prev = offset;
        }

        buf
    }
}

impl ObjRecord {
    pub fn decode(key: &[u8], _value_type: u8, value: &[u8], _ctx: &RecordCtx) -> crate::Result<Self> {
        if value.is_empty() {
            return Ok(Self {
                hash_prefix: key.to_vec(),
                offsets: Vec::new(),
            });
        }

        let mut cursor = Cursor::new(value);
        let count = read_varint(&mut cursor)? as usize;

        let mut offsets = Vec::with_capacity(count);
        let mut prev = 0u64;
        for i in 0..count {
            let delta = read_varint(&mut cursor)?;
            let offset = if i == 0 { delta } else { prev + delta };
            offsets.push(offset);
            prev = offset;
        }

        Ok(Self {
            hash_prefix: key.to_vec(),
            offsets,
        })
    }

    /// Whether this is the too-many-collisions sentinel.
    #[must_use]
    pub fn is_fallback_sentinel(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn ctx() -> RecordCtx {
        RecordCtx {
            hash_size: 20,
            min_update_index: 0,
        }
    }

    #[test]
    fn round_trips_offsets() {
        let rec = ObjRecord {
            hash_prefix: vec![0xde, 0xad, 0xbe, 0xef],
            offsets: vec![100, 250, 9_000],
        };
        let ctx = ctx();
        let encoded = rec.encode_value(&ctx);
        let decoded = ObjRecord::decode(&rec.hash_prefix, 0, &encoded, &ctx).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn empty_offsets_round_trip_as_sentinel() {
        let rec = ObjRecord {
            hash_prefix: vec![0xab, 0xcd],
            offsets: Vec::new(),
        };
        let ctx = ctx();
        let encoded = rec.encode_value(&ctx);
        assert!(encoded.is_empty());
        let decoded = ObjRecord::decode(&rec.hash_prefix, 0, &encoded, &ctx).unwrap();
        assert!(decoded.is_fallback_sentinel());
    }
}
