// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::footer::Footer;
use super::header::Header;
use super::iter::{LogIter, RefIter, SectionCursor};
use crate::block::{BlockIter, BlockReader, BlockType};
use crate::config::FormatVersion;
use crate::hash_id::HashId;
use crate::record::{ref_matches_oid, IndexRecord, ObjRecord, RecordCtx, RefRecord, RefValue};
use crate::source::{BlockSource, Buffer};
use std::io::Cursor;

/// `[start, end)` on disk, plus the offset of that section's index (0 if the
/// section has at most one data block and needs none).
#[derive(Copy, Clone)]
pub(crate) struct SectionBounds {
    pub(crate) start: u64,
    pub(crate) end: u64,
    pub(crate) index_offset: u64,
}

/// Reads a single reftable: header/footer parsing, point lookups by ref
/// name, reflog entry, or object-id, and section-wide iteration.
pub struct Reader {
    source: Box<dyn BlockSource>,
    size: u64,
    header: Header,
    footer: Footer,
    ctx: RecordCtx,
}

impl Reader {
    /// Opens a table from any [`BlockSource`], parsing and verifying its
    /// header and footer.
    pub fn new(source: impl BlockSource + 'static) -> crate::Result<Self> {
        let size = source.size()?;

        // A version-2 header is 28 bytes; 24 covers version 1. Reading the
        // larger amount up front and letting `Header::decode_from` consume
        // only what the version byte calls for avoids a second read.
        let probe_len = std::cmp::min(28, size) as usize;
        if probe_len < 24 {
            return Err(crate::Error::Format("file too small to hold a reftable header".into()));
        }
        let probe = source.read_block(0, probe_len)?;
        let header = Header::decode_from(&mut Cursor::new(&probe[..]))?;
        source.return_block(probe);

        let footer_len = Footer::size(header.version) as u64;
        if size < footer_len {
            return Err(crate::Error::Format("file too small to hold a reftable footer".into()));
        }
        let footer_buf = source.read_block(size - footer_len, footer_len as usize)?;
        let footer = Footer::parse(&footer_buf, &header)?;
        source.return_block(footer_buf);

        let hash_id = if matches!(header.version, FormatVersion::V2) {
            header.hash_id
        } else {
            HashId::Sha1
        };

        Ok(Self {
            source: Box::new(source),
            size,
            ctx: RecordCtx {
                hash_size: hash_id.size(),
                min_update_index: header.min_update_index,
            },
            header,
            footer,
        })
    }

    #[must_use]
    pub fn min_update_index(&self) -> u64 {
        self.header.min_update_index
    }

    #[must_use]
    pub fn max_update_index(&self) -> u64 {
        self.header.max_update_index
    }

    #[must_use]
    pub fn hash_id(&self) -> HashId {
        if matches!(self.header.version, FormatVersion::V2) {
            self.header.hash_id
        } else {
            HashId::Sha1
        }
    }

    fn footer_start(&self) -> u64 {
        self.size - Footer::size(self.header.version) as u64
    }

    fn ref_bounds(&self) -> SectionBounds {
        let start = Header::size(self.header.version) as u64;
        let end = if self.footer.obj_offset != 0 {
            self.footer.obj_offset
        } else if self.footer.log_offset != 0 {
            self.footer.log_offset
        } else {
            self.footer_start()
        };
        SectionBounds {
            start,
            end,
            index_offset: self.footer.ref_index_offset,
        }
    }

    fn obj_bounds(&self) -> Option<SectionBounds> {
        if self.footer.obj_offset == 0 {
            return None;
        }
        let end = if self.footer.log_offset != 0 {
            self.footer.log_offset
        } else {
            self.footer_start()
        };
        Some(SectionBounds {
            start: self.footer.obj_offset,
            end,
            index_offset: self.footer.obj_index_offset,
        })
    }

    fn log_bounds(&self) -> Option<SectionBounds> {
        if self.footer.log_offset == 0 {
            return None;
        }
        Some(SectionBounds {
            start: self.footer.log_offset,
            end: self.footer_start(),
            index_offset: self.footer.log_index_offset,
        })
    }

    pub(crate) fn read_block_bytes(&self, offset: u64) -> crate::Result<Buffer> {
        let remaining = self.size.saturating_sub(offset);
        let len = std::cmp::min(u64::from(self.header.block_size), remaining) as usize;
        self.source.read_block(offset, len)
    }

    pub(crate) fn load_block(&self, offset: u64) -> crate::Result<BlockReader> {
        let buf = self.read_block_bytes(offset)?;
        let parsed = BlockReader::parse(&buf)?;
        self.source.return_block(buf);
        Ok(parsed)
    }

    pub(crate) fn ctx(&self) -> RecordCtx {
        self.ctx
    }

    /// Follows a section's index (if any), descending until it reaches a
    /// data block, returning its offset. `Ok(None)` means `target` is past
    /// every key the index covers.
    fn find_data_block(&self, index_offset: u64, target: &[u8]) -> crate::Result<Option<u64>> {
        let mut offset = index_offset;
        loop {
            let block = self.load_block(offset)?;
            if block.kind() != BlockType::Index {
                return Ok(Some(offset));
            }

            let mut iter = BlockIter::new(block);
            if !iter.seek(target)? {
                return Ok(None);
            }
            let entry = iter.next()?.expect("seek() guarantees a pending entry");
            let child = IndexRecord::decode(&entry.key, entry.value_type, &entry.value, &self.ctx)?;
            offset = child.offset;
        }
    }

    fn cursor_for(&self, bounds: SectionBounds, target: Option<&[u8]>) -> crate::Result<SectionCursor<'_>> {
        if bounds.start >= bounds.end {
            return Ok(SectionCursor::empty(self));
        }

        let start = match (bounds.index_offset, target) {
            (0, _) => bounds.start,
            (idx, Some(target)) => match self.find_data_block(idx, target)? {
                Some(offset) => offset,
                None => return Ok(SectionCursor::empty(self)),
            },
            (_, None) => bounds.start,
        };

        SectionCursor::at(self, start, bounds.end)
    }

    /// Looks up the current (highest `update_index`) record for `ref_name`.
    pub fn seek_ref(&self, ref_name: &[u8]) -> crate::Result<Option<RefRecord>> {
        let mut cursor = self.cursor_for(self.ref_bounds(), Some(ref_name))?;
        match cursor.seek_raw(ref_name)? {
            Some(entry) if entry.key == ref_name => {
                Ok(Some(RefRecord::decode(&entry.key, entry.value_type, &entry.value, &self.ctx)?))
            }
            _ => Ok(None),
        }
    }

    /// Iterates every ref record in the table, in key order.
    pub fn iter_refs(&self) -> crate::Result<RefIter<'_>> {
        Ok(RefIter::new(self.cursor_for(self.ref_bounds(), None)?, self.ctx))
    }

    /// A ref iterator descended (via the section index, when present)
    /// toward `target`, for merging point queries across a stack of tables.
    pub(crate) fn iter_refs_seek(&self, target: &[u8]) -> crate::Result<RefIter<'_>> {
        let mut iter = RefIter::new(self.cursor_for(self.ref_bounds(), Some(target))?, self.ctx);
        iter.seek(target)?;
        Ok(iter)
    }

    /// The most recent reflog entry for `ref_name`, if any.
    pub fn seek_log(&self, ref_name: &[u8]) -> crate::Result<Option<crate::record::LogRecord>> {
        self.seek_log_at(ref_name, u64::MAX)
    }

    /// The reflog entry for `ref_name` in effect as of `at_update_index`
    /// (the newest entry with `update_index <= at_update_index`).
    pub fn seek_log_at(
        &self,
        ref_name: &[u8],
        at_update_index: u64,
    ) -> crate::Result<Option<crate::record::LogRecord>> {
        let Some(bounds) = self.log_bounds() else {
            return Ok(None);
        };
        let target = crate::record::log_seek_key(ref_name, at_update_index);
        let mut cursor = self.cursor_for(bounds, Some(&target))?;
        match cursor.seek_raw(&target)? {
            Some(entry) => {
                let record = crate::record::LogRecord::decode(&entry.key, entry.value_type, &entry.value, &self.ctx)?;
                if record.ref_name == ref_name {
                    Ok(Some(record))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Iterates every reflog entry in the table, in key order (newest first
    /// within each ref).
    pub fn iter_logs(&self) -> crate::Result<LogIter<'_>> {
        let bounds = self.log_bounds().unwrap_or(SectionBounds {
            start: 0,
            end: 0,
            index_offset: 0,
        });
        Ok(LogIter::new(self.cursor_for(bounds, None)?, self.ctx))
    }

    /// A log iterator descended toward `target` (a raw log-section key, see
    /// [`crate::record::LogRecord`]'s key scheme), for merging point
    /// queries across a stack of tables.
    pub(crate) fn iter_logs_seek(&self, target: &[u8]) -> crate::Result<LogIter<'_>> {
        let bounds = self.log_bounds().unwrap_or(SectionBounds {
            start: 0,
            end: 0,
            index_offset: 0,
        });
        let mut iter = LogIter::new(self.cursor_for(bounds, Some(target))?, self.ctx);
        iter.seek(target)?;
        Ok(iter)
    }

    /// All refs currently bound to `oid`, using the obj reverse-index when
    /// present and falling back to a full scan of the ref section
    /// otherwise (absent index, or a too-many-collisions sentinel).
    pub fn refs_for(&self, oid: &[u8]) -> crate::Result<Vec<RefRecord>> {
        if let Some(bounds) = self.obj_bounds() {
            let prefix_len = self.footer.object_id_len as usize;
            if oid.len() >= prefix_len {
                let prefix = &oid[..prefix_len];
                let mut cursor = self.cursor_for(bounds, Some(prefix))?;
                if let Some(entry) = cursor.seek_raw(prefix)? {
                    if entry.key == prefix {
                        let rec = ObjRecord::decode(&entry.key, entry.value_type, &entry.value, &self.ctx)?;
                        if !rec.is_fallback_sentinel() {
                            return self.refs_via_obj_offsets(&rec, oid);
                        }
                    }
                }
            }
        }

        self.refs_for_linear(oid)
    }

    fn refs_via_obj_offsets(&self, rec: &ObjRecord, oid: &[u8]) -> crate::Result<Vec<RefRecord>> {
        let mut out = Vec::new();
        let ref_end = self.ref_bounds().end;
        for &offset in &rec.offsets {
            let block = self.load_block(offset)?;
            let mut iter = BlockIter::new(block);
            while let Some(entry) = iter.next()? {
                let record = RefRecord::decode(&entry.key, entry.value_type, &entry.value, &self.ctx)?;
                if ref_matches_oid(&record, oid) {
                    out.push(record);
                }
            }
            let _ = ref_end;
        }
        Ok(out)
    }

    fn refs_for_linear(&self, oid: &[u8]) -> crate::Result<Vec<RefRecord>> {
        let mut out = Vec::new();
        let mut iter = self.iter_refs()?;
        while let Some(record) = iter.next()? {
            if ref_matches_oid(&record, oid) {
                out.push(record);
            }
        }
        Ok(out)
    }
}
