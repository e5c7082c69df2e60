// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{BlockReader, RawEntry};
use crate::binary_search::partition_point;
use crate::coding::read_varint;
use std::io::Cursor;

/// Walks a block's entries in key order, rebuilding each key from the
/// previous one via the restart/prefix-compression scheme.
pub struct BlockIter {
    reader: BlockReader,
    pos: usize,
    last_key: Vec<u8>,
    pending: Option<RawEntry>,
}

fn decode_at(body: &[u8], pos: usize, last_key: &[u8]) -> crate::Result<(RawEntry, usize)> {
    let mut cursor = Cursor::new(&body[pos..]);
    let shared = read_varint(&mut cursor)? as usize;
    let suffix_len = read_varint(&mut cursor)? as usize;
    let value_type = read_varint(&mut cursor)? as u8;
    let value_len = read_varint(&mut cursor)? as usize;
    let header_len = cursor.position() as usize;

    if shared > last_key.len() {
        return Err(crate::Error::Format(
            "block entry shared-prefix length exceeds previous key".into(),
        ));
    }

    let suffix_start = pos + header_len;
    let value_start = suffix_start + suffix_len;
    let next_pos = value_start + value_len;

    if next_pos > body.len() {
        return Err(crate::Error::Format("block entry runs past body end".into()));
    }

    let mut key = Vec::with_capacity(shared + suffix_len);
    key.extend_from_slice(&last_key[..shared]);
    key.extend_from_slice(&body[suffix_start..value_start]);

    let value = body[value_start..next_pos].to_vec();

    Ok((
        RawEntry {
            key,
            value_type,
            value,
        },
        next_pos,
    ))
}

impl BlockIter {
    #[must_use]
    pub fn new(reader: BlockReader) -> Self {
        Self {
            reader,
            pos: 0,
            last_key: Vec::new(),
            pending: None,
        }
    }

    /// Returns the wrapped block, e.g. to inspect its `kind()` or
    /// `full_block_size()` while advancing to the next one.
    #[must_use]
    pub fn block(&self) -> &BlockReader {
        &self.reader
    }

    /// Decodes and returns the next entry, or `None` at block end.
    pub fn next(&mut self) -> crate::Result<Option<RawEntry>> {
        if let Some(entry) = self.pending.take() {
            self.last_key = entry.key.clone();
            return Ok(Some(entry));
        }

        let body = self.reader.body();
        if self.pos >= body.len() {
            return Ok(None);
        }

        let (entry, next_pos) = decode_at(body, self.pos, &self.last_key)?;
        self.pos = next_pos;
        self.last_key = entry.key.clone();

        Ok(Some(entry))
    }

    /// Positions the iterator so the next `next()` call yields the first
    /// entry whose key is `>= want`, or `false` if no such entry exists in
    /// this block (the iterator is left exhausted).
    pub fn seek(&mut self, want: &[u8]) -> crate::Result<bool> {
        let restarts = self.reader.restarts();
        let body = self.reader.body();

        // Restart entries always encode their full key (shared == 0), so
        // they can be decoded without any running `last_key`.
        let idx = partition_point(restarts, |&offset| {
            match decode_at(body, offset as usize, &[]) {
                Ok((entry, _)) => entry.key.as_slice() <= want,
                Err(_) => false,
            }
        });

        let start_restart = idx.saturating_sub(1);
        let start_offset = restarts.get(start_restart).copied().unwrap_or(0) as usize;

        self.pos = start_offset;
        self.last_key.clear();
        self.pending = None;

        while let Some(entry) = self.next()? {
            if entry.key.as_slice() >= want {
                self.pending = Some(entry);
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockType, BlockWriter};
    use test_log::test;

    fn build(keys: &[&[u8]]) -> BlockReader {
        let mut writer = BlockWriter::new(BlockType::Ref, 4_096, 2);
        for (i, key) in keys.iter().enumerate() {
            writer.add(key, 1, format!("v{i}").as_bytes()).unwrap();
        }
        let mut out = Vec::new();
        writer.finish(&mut out).unwrap();
        BlockReader::parse(&out).unwrap()
    }

    #[test]
    fn seek_finds_exact_and_successor() {
        let mut iter = BlockIter::new(build(&[b"a", b"c", b"e", b"g", b"i"]));
        assert!(iter.seek(b"e").unwrap());
        assert_eq!(iter.next().unwrap().unwrap().key, b"e");

        let mut iter = BlockIter::new(build(&[b"a", b"c", b"e", b"g", b"i"]));
        assert!(iter.seek(b"d").unwrap());
        assert_eq!(iter.next().unwrap().unwrap().key, b"e");

        let mut iter = BlockIter::new(build(&[b"a", b"c", b"e", b"g", b"i"]));
        assert!(!iter.seek(b"z").unwrap());
    }
}
