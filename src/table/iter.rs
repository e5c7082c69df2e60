// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::reader::Reader;
use crate::block::{BlockIter, RawEntry};
use crate::record::{LogRecord, RecordCtx, RefRecord};

/// Walks one section's data blocks in key order, crossing block boundaries
/// transparently. Knows nothing about what a record decodes to.
pub(crate) struct SectionCursor<'a> {
    reader: &'a Reader,
    section_end: u64,
    next_block_offset: Option<u64>,
    current: Option<BlockIter>,
}

impl<'a> SectionCursor<'a> {
    pub(crate) fn empty(reader: &'a Reader) -> Self {
        Self {
            reader,
            section_end: 0,
            next_block_offset: None,
            current: None,
        }
    }

    pub(crate) fn at(reader: &'a Reader, start_offset: u64, section_end: u64) -> crate::Result<Self> {
        if start_offset >= section_end {
            return Ok(Self::empty(reader));
        }

        let block = reader.load_block(start_offset)?;
        let full_len = block.full_block_size() as u64;
        let next = if start_offset + full_len < section_end {
            Some(start_offset + full_len)
        } else {
            None
        };

        Ok(Self {
            reader,
            section_end,
            next_block_offset: next,
            current: Some(BlockIter::new(block)),
        })
    }

    fn advance_block(&mut self) -> crate::Result<bool> {
        let Some(offset) = self.next_block_offset else {
            self.current = None;
            return Ok(false);
        };

        let block = self.reader.load_block(offset)?;
        let full_len = block.full_block_size() as u64;
        self.next_block_offset = if offset + full_len < self.section_end {
            Some(offset + full_len)
        } else {
            None
        };
        self.current = Some(BlockIter::new(block));
        Ok(true)
    }

    pub(crate) fn next_raw(&mut self) -> crate::Result<Option<RawEntry>> {
        loop {
            if let Some(iter) = &mut self.current {
                if let Some(entry) = iter.next()? {
                    return Ok(Some(entry));
                }
            } else {
                return Ok(None);
            }

            if !self.advance_block()? {
                return Ok(None);
            }
        }
    }

    /// Positions the cursor so the next `next_raw()` call yields the first
    /// entry with key `>= target`, starting from wherever it currently is
    /// (the caller is expected to have already descended any index to land
    /// near the right block).
    pub(crate) fn seek_to(&mut self, target: &[u8]) -> crate::Result<()> {
        if let Some(iter) = &mut self.current {
            if iter.seek(target)? {
                return Ok(());
            }
        }

        loop {
            if !self.advance_block()? {
                return Ok(());
            }
            if let Some(iter) = &mut self.current {
                if iter.seek(target)? {
                    return Ok(());
                }
            }
        }
    }

    /// Seeks to `target` and returns the first matching entry, if any.
    pub(crate) fn seek_raw(&mut self, target: &[u8]) -> crate::Result<Option<RawEntry>> {
        self.seek_to(target)?;
        self.next_raw()
    }
}

/// Iterates ref records across a whole section.
pub struct RefIter<'a> {
    cursor: SectionCursor<'a>,
    ctx: RecordCtx,
}

impl<'a> RefIter<'a> {
    pub(crate) fn new(cursor: SectionCursor<'a>, ctx: RecordCtx) -> Self {
        Self { cursor, ctx }
    }

    /// Decodes and returns the next ref record, or `None` at section end.
    pub fn next(&mut self) -> crate::Result<Option<RefRecord>> {
        match self.cursor.next_raw()? {
            Some(entry) => Ok(Some(RefRecord::decode(&entry.key, entry.value_type, &entry.value, &self.ctx)?)),
            None => Ok(None),
        }
    }

    /// Skips ahead so the next `next()` call yields the first record with
    /// key `>= target`.
    pub(crate) fn seek(&mut self, target: &[u8]) -> crate::Result<()> {
        self.cursor.seek_to(target)
    }
}

/// Iterates reflog records across a whole section.
pub struct LogIter<'a> {
    cursor: SectionCursor<'a>,
    ctx: RecordCtx,
}

impl<'a> LogIter<'a> {
    pub(crate) fn new(cursor: SectionCursor<'a>, ctx: RecordCtx) -> Self {
        Self { cursor, ctx }
    }

    /// Decodes and returns the next log record, or `None` at section end.
    pub fn next(&mut self) -> crate::Result<Option<LogRecord>> {
        match self.cursor.next_raw()? {
            Some(entry) => Ok(Some(LogRecord::decode(&entry.key, entry.value_type, &entry.value, &self.ctx)?)),
            None => Ok(None),
        }
    }

    /// Skips ahead so the next `next()` call yields the first record with
    /// key `>= target`.
    pub(crate) fn seek(&mut self, target: &[u8]) -> crate::Result<()> {
        self.cursor.seek_to(target)
    }
}
