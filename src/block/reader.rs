// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{BlockType, RESTART_COUNT_WIDTH, RESTART_OFFSET_WIDTH};
use crate::coding::read_be_uint;
use std::io::{Cursor, Read};

const PLAIN_HEADER_LEN: usize = 4;
const COMPRESSED_HEADER_LEN: usize = 7;

/// A parsed block: decompressed body bytes plus its restart array. Does not
/// know what the entries *mean* — see `crate::record`.
pub struct BlockReader {
    kind: BlockType,
    body: Vec<u8>,
    restarts: Vec<u32>,
    full_block_size: usize,
}

impl BlockReader {
    /// Parses a block starting at `raw[0]`. `raw` may be longer than the
    /// block (e.g. a fixed-size read from the block source); only the
    /// prefix described by the on-disk length field is consumed.
    pub fn parse(raw: &[u8]) -> crate::Result<Self> {
        if raw.is_empty() {
            return Err(crate::Error::Format("empty block".into()));
        }

        let kind = BlockType::from_tag(raw[0])?;

        if kind.is_compressible() {
            if raw.len() < COMPRESSED_HEADER_LEN {
                return Err(crate::Error::Format("truncated log block header".into()));
            }

            let mut cursor = Cursor::new(&raw[1..4]);
            let on_disk_len = read_be_uint(&mut cursor, 3)? as usize;
            let mut cursor = Cursor::new(&raw[4..7]);
            let logical_len = read_be_uint(&mut cursor, 3)? as usize;

            if raw.len() < on_disk_len {
                return Err(crate::Error::Format("truncated log block body".into()));
            }

            let remainder = &raw[COMPRESSED_HEADER_LEN..on_disk_len];
            let (restarts, tail_len) = parse_restarts(remainder)?;
            let compressed = &remainder[..remainder.len() - tail_len];

            let mut body = Vec::with_capacity(logical_len);
            let mut decoder = flate2::read::ZlibDecoder::new(compressed);
            decoder.read_to_end(&mut body)?;

            if body.len() != logical_len {
                return Err(crate::Error::Format(
                    "decompressed log block size mismatch".into(),
                ));
            }

            Ok(Self {
                kind,
                body,
                restarts,
                full_block_size: on_disk_len,
            })
        } else {
            if raw.len() < PLAIN_HEADER_LEN {
                return Err(crate::Error::Format("truncated block header".into()));
            }

            let mut cursor = Cursor::new(&raw[1..4]);
            let total_len = read_be_uint(&mut cursor, 3)? as usize;

            if raw.len() < total_len {
                return Err(crate::Error::Format("truncated block body".into()));
            }

            let remainder = &raw[PLAIN_HEADER_LEN..total_len];
            let (restarts, tail_len) = parse_restarts(remainder)?;
            let body = remainder[..remainder.len() - tail_len].to_vec();

            Ok(Self {
                kind,
                body,
                restarts,
                full_block_size: total_len,
            })
        }
    }

    #[must_use]
    pub fn kind(&self) -> BlockType {
        self.kind
    }

    #[must_use]
    pub(crate) fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub(crate) fn restarts(&self) -> &[u32] {
        &self.restarts
    }

    /// Total bytes this block occupies on disk (after decompression
    /// bookkeeping); the next block starts right after this many bytes.
    #[must_use]
    pub fn full_block_size(&self) -> usize {
        self.full_block_size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

fn parse_restarts(remainder: &[u8]) -> crate::Result<(Vec<u32>, usize)> {
    if remainder.len() < RESTART_COUNT_WIDTH {
        return Err(crate::Error::Format("block missing restart count".into()));
    }

    let count_off = remainder.len() - RESTART_COUNT_WIDTH;
    let mut cursor = Cursor::new(&remainder[count_off..]);
    let count = read_be_uint(&mut cursor, RESTART_COUNT_WIDTH)? as usize;

    let restarts_len = count * RESTART_OFFSET_WIDTH;
    let tail_len = restarts_len + RESTART_COUNT_WIDTH;

    if remainder.len() < tail_len {
        return Err(crate::Error::Format("block restart array truncated".into()));
    }

    let restarts_off = count_off - restarts_len;
    let mut restarts = Vec::with_capacity(count);
    for i in 0..count {
        let start = restarts_off + i * RESTART_OFFSET_WIDTH;
        let mut cursor = Cursor::new(&remainder[start..start + RESTART_OFFSET_WIDTH]);
        restarts.push(read_be_uint(&mut cursor, RESTART_OFFSET_WIDTH)? as u32);
    }

    Ok((restarts, tail_len))
}
