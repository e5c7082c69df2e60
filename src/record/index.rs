// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Record, RecordCtx};
use crate::coding::{read_varint, write_varint};
use std::io::Cursor;

/// One entry of a per-section index: the largest key reachable through
/// `offset`, enabling O(log N) descent instead of a linear block scan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexRecord {
    pub last_key: Vec<u8>,
    pub offset: u64,
}

impl Record for IndexRecord {
    fn key(&self) -> &[u8] {
        &self.last_key
    }

    fn value_type(&self) -> u8 {
        0
    }

    fn encode_value(&self, _ctx: &RecordCtx) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, self.offset).expect("vec write cannot fail");
        buf
    }
}

impl IndexRecord {
    pub fn decode(key: &[u8], _value_type: u8, value: &[u8], _ctx: &RecordCtx) -> crate::Result<Self> {
        let mut cursor = Cursor::new(value);
        let offset = read_varint(&mut cursor)?;
        Ok(Self {
            last_key: key.to_vec(),
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn round_trips() {
        let rec = IndexRecord {
            last_key: b"refs/heads/zzz".to_vec(),
            offset: 123_456,
        };
        let ctx = RecordCtx {
            hash_size: 20,
            min_update_index: 0,
        };
        let encoded = rec.encode_value(&ctx);
        let decoded = IndexRecord::decode(&rec.last_key, 0, &encoded, &ctx).unwrap();
        assert_eq!(decoded, rec);
    }
}
