// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{BlockType, RESTART_COUNT_WIDTH, RESTART_OFFSET_WIDTH};
use crate::coding::{write_be_uint, write_varint};
use std::io::Write;

/// Plain header: `tag(1) | total_block_len(3, BE)`.
const PLAIN_HEADER_LEN: usize = 4;

/// Compressed (log) header: `tag(1) | on_disk_len(3, BE) | logical_len(3, BE)`.
const COMPRESSED_HEADER_LEN: usize = 7;

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn encode_entry(buf: &mut Vec<u8>, shared: usize, value_type: u8, suffix: &[u8], value: &[u8]) {
    write_varint(buf, shared as u64).expect("vec write cannot fail");
    write_varint(buf, suffix.len() as u64).expect("vec write cannot fail");
    write_varint(buf, u64::from(value_type)).expect("vec write cannot fail");
    write_varint(buf, value.len() as u64).expect("vec write cannot fail");
    buf.extend_from_slice(suffix);
    buf.extend_from_slice(value);
}

/// Accumulates `(key, value_type, value)` triples into one restart-indexed
/// block, flushing them prefix-compressed against the previous key.
pub struct BlockWriter {
    kind: BlockType,
    block_size: usize,
    restart_interval: u16,
    body: Vec<u8>,
    restarts: Vec<u32>,
    since_restart: u16,
    last_key: Vec<u8>,
    first_key: Option<Vec<u8>>,
}

impl BlockWriter {
    #[must_use]
    pub fn new(kind: BlockType, block_size: u32, restart_interval: u16) -> Self {
        Self {
            kind,
            block_size: block_size as usize,
            restart_interval,
            body: Vec::new(),
            restarts: Vec::new(),
            since_restart: 0,
            last_key: Vec::new(),
            first_key: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    #[must_use]
    pub fn first_key(&self) -> Option<&[u8]> {
        self.first_key.as_deref()
    }

    #[must_use]
    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }

    fn header_len(&self) -> usize {
        if self.kind.is_compressible() {
            COMPRESSED_HEADER_LEN
        } else {
            PLAIN_HEADER_LEN
        }
    }

    /// Worst-case on-disk size if this block were finished right now, plus
    /// one more restart entry (conservative: assumes the next add forces a
    /// restart).
    fn projected_size(&self, extra_body: usize, extra_restart: bool) -> usize {
        let restart_count = self.restarts.len() + usize::from(extra_restart);
        self.header_len()
            + self.body.len()
            + extra_body
            + restart_count * RESTART_OFFSET_WIDTH
            + RESTART_COUNT_WIDTH
    }

    /// Tries to append one record. Returns `Ok(false)` without mutating
    /// `self` if it would overflow the configured block size (the caller
    /// should finish this block and start a fresh one for the record).
    pub fn add(&mut self, key: &[u8], value_type: u8, value: &[u8]) -> crate::Result<bool> {
        let forced_restart = self.since_restart == 0 || self.since_restart >= self.restart_interval;
        let shared = if forced_restart {
            0
        } else {
            common_prefix_len(&self.last_key, key)
        };
        let suffix = &key[shared..];

        let mut candidate = Vec::with_capacity(suffix.len() + value.len() + 16);
        encode_entry(&mut candidate, shared, value_type, suffix, value);

        if !self.is_empty()
            && self.projected_size(candidate.len(), forced_restart) > self.block_size
        {
            return Ok(false);
        }

        if forced_restart {
            self.restarts.push(self.body.len() as u32);
            self.since_restart = 0;
        }

        if self.first_key.is_none() {
            self.first_key = Some(key.to_vec());
        }

        self.body.extend_from_slice(&candidate);
        self.last_key = key.to_vec();
        self.since_restart += 1;

        Ok(true)
    }

    /// Serializes the block, compressing the body for log blocks.
    pub fn finish(self, out: &mut Vec<u8>) -> crate::Result<()> {
        let mut restart_bytes = Vec::with_capacity(self.restarts.len() * RESTART_OFFSET_WIDTH + 2);
        for offset in &self.restarts {
            write_be_uint(&mut restart_bytes, u64::from(*offset), RESTART_OFFSET_WIDTH)?;
        }
        write_be_uint(&mut restart_bytes, self.restarts.len() as u64, RESTART_COUNT_WIDTH)?;

        if self.kind.is_compressible() {
            let logical_len = self.body.len();

            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&self.body)?;
            let compressed = encoder.finish()?;

            let on_disk_len = COMPRESSED_HEADER_LEN + compressed.len() + restart_bytes.len();

            out.push(self.kind.tag());
            write_be_uint(out, on_disk_len as u64, 3)?;
            write_be_uint(out, logical_len as u64, 3)?;
            out.extend_from_slice(&compressed);
            out.extend_from_slice(&restart_bytes);
        } else {
            let total_len = PLAIN_HEADER_LEN + self.body.len() + restart_bytes.len();

            out.push(self.kind.tag());
            write_be_uint(out, total_len as u64, 3)?;
            out.extend_from_slice(&self.body);
            out.extend_from_slice(&restart_bytes);
        }

        Ok(())
    }
}
