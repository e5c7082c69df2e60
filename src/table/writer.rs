// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::footer::Footer;
use super::header::Header;
use crate::block::{BlockType, BlockWriter};
use crate::config::{Config, FormatVersion};
use crate::hash_id::HashId;
use crate::record::{IndexRecord, ObjRecord, Record, RecordCtx, RefRecord, RefValue};
use std::collections::BTreeMap;
use std::io::Write;

/// Accumulates one section's data blocks, flushing full ones and recording
/// `(last_key, offset)` for every block it writes — the raw material of
/// that section's index.
struct SectionBuilder {
    kind: BlockType,
    block_size: u32,
    restart_interval: u16,
    writer: BlockWriter,
    index_entries: Vec<IndexRecord>,
    block_start: Option<u64>,
    first_offset: Option<u64>,
    last_key: Option<Vec<u8>>,
}

impl SectionBuilder {
    fn new(kind: BlockType, block_size: u32, restart_interval: u16) -> Self {
        Self {
            kind,
            block_size,
            restart_interval,
            writer: BlockWriter::new(kind, block_size, restart_interval),
            index_entries: Vec::new(),
            block_start: None,
            first_offset: None,
            last_key: None,
        }
    }

    fn add<W: Write>(
        &mut self,
        sink: &mut W,
        pos: &mut u64,
        key: &[u8],
        value_type: u8,
        value: &[u8],
    ) -> crate::Result<()> {
        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                return Err(crate::Error::Api(
                    "records must be written in strictly increasing key order".into(),
                ));
            }
        }

        if self.block_start.is_none() {
            self.block_start = Some(*pos);
            self.first_offset.get_or_insert(*pos);
        }

        if !self.writer.add(key, value_type, value)? {
            self.flush_block(sink, pos)?;
            self.block_start = Some(*pos);

            if !self.writer.add(key, value_type, value)? {
                return Err(crate::Error::Api(
                    "record is too large to fit in an empty block".into(),
                ));
            }
        }

        self.last_key = Some(key.to_vec());
        Ok(())
    }

    fn flush_block<W: Write>(&mut self, sink: &mut W, pos: &mut u64) -> crate::Result<()> {
        if self.writer.is_empty() {
            return Ok(());
        }

        let last_key = self.writer.last_key().to_vec();
        let block_start = self.block_start.take().expect("block was written to");

        let fresh = BlockWriter::new(self.kind, self.block_size, self.restart_interval);
        let full = std::mem::replace(&mut self.writer, fresh);

        let mut out = Vec::new();
        full.finish(&mut out)?;
        sink.write_all(&out)?;
        *pos += out.len() as u64;

        self.index_entries.push(IndexRecord {
            last_key,
            offset: block_start,
        });

        Ok(())
    }

    fn finish<W: Write>(mut self, sink: &mut W, pos: &mut u64) -> crate::Result<(u64, Vec<IndexRecord>)> {
        self.flush_block(sink, pos)?;
        Ok((self.first_offset.unwrap_or(0), self.index_entries))
    }
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum WriterState {
    Ref,
    Log,
    Done,
}

/// Assembles one reftable file: ref section, then obj section, then log
/// section, each with an optional index, then the footer.
pub struct Writer<W: Write> {
    sink: W,
    pos: u64,
    config: Config,
    header: Header,
    ctx: RecordCtx,
    state: WriterState,

    ref_section: SectionBuilder,
    log_section: SectionBuilder,
    obj_map: BTreeMap<Vec<u8>, Vec<u64>>,

    ref_index_offset: u64,
    obj_offset: u64,
    obj_index_offset: u64,
}

impl<W: Write> Writer<W> {
    /// Writes the header and returns a writer ready for `add_ref` calls.
    pub fn new(mut sink: W, config: Config) -> crate::Result<Self> {
        if matches!(config.version, FormatVersion::V1) && matches!(config.hash_id, HashId::Sha256) {
            return Err(crate::Error::Api(
                "version 1 tables imply sha1; use version 2 for sha256".into(),
            ));
        }

        let header = Header {
            version: config.version,
            block_size: config.block_size,
            min_update_index: config.min_update_index,
            max_update_index: config.max_update_index,
            hash_id: config.hash_id,
        };

        let mut buf = Vec::new();
        header.encode_into(&mut buf)?;
        sink.write_all(&buf)?;
        let pos = buf.len() as u64;

        let ctx = RecordCtx {
            hash_size: config.hash_id.size(),
            min_update_index: config.min_update_index,
        };

        Ok(Self {
            ref_section: SectionBuilder::new(BlockType::Ref, config.block_size, config.restart_interval),
            log_section: SectionBuilder::new(BlockType::Log, config.block_size, config.restart_interval),
            obj_map: BTreeMap::new(),
            sink,
            pos,
            header,
            ctx,
            state: WriterState::Ref,
            config,
            ref_index_offset: 0,
            obj_offset: 0,
            obj_index_offset: 0,
        })
    }

    /// Appends a ref record. Records must arrive in strictly increasing
    /// `ref_name` order, and all log records must be added afterwards.
    pub fn add_ref(&mut self, record: &RefRecord) -> crate::Result<()> {
        if self.state != WriterState::Ref {
            return Err(crate::Error::Api(
                "all ref records must be written before the first log record".into(),
            ));
        }

        if record.update_index < self.config.min_update_index
            || record.update_index > self.config.max_update_index
        {
            return Err(crate::Error::Api(format!(
                "ref update_index {} is outside this table's configured range",
                record.update_index
            )));
        }

        let key = record.key().to_vec();
        let value_type = record.value_type();
        let value = record.encode_value(&self.ctx);
        self.ref_section
            .add(&mut self.sink, &mut self.pos, &key, value_type, &value)?;

        match &record.value {
            RefValue::Value(oid) => self.note_obj(oid)?,
            RefValue::ValuePeeled { target, .. } => self.note_obj(target)?,
            RefValue::Deletion | RefValue::Symref(_) => {}
        }

        Ok(())
    }

    fn note_obj(&mut self, oid: &[u8]) -> crate::Result<()> {
        if oid.len() < self.ctx.hash_size {
            return Err(crate::Error::Api("object-id shorter than table hash size".into()));
        }

        let prefix = oid[..self.ctx.hash_size].to_vec();
        let offset = self
            .ref_section
            .block_start
            .expect("note_obj called right after adding to an open ref block");

        let offsets = self.obj_map.entry(prefix).or_default();
        if offsets.last() != Some(&offset) {
            offsets.push(offset);
        }

        Ok(())
    }

    /// Appends a log record. The first call closes the ref (and derived
    /// obj) sections; after that, only log records may be added.
    pub fn add_log(&mut self, record: &LogRecord) -> crate::Result<()> {
        if self.state == WriterState::Ref {
            self.close_ref_and_obj_sections()?;
        }

        if self.state != WriterState::Log {
            return Err(crate::Error::Api("writer has already been finished".into()));
        }

        let message = normalize_log_message(&record.message, self.config.exact_log_message)?;
        let record = record.with_message(message);

        let key = record.key().to_vec();
        let value_type = record.value_type();
        let value = record.encode_value(&self.ctx);
        self.log_section
            .add(&mut self.sink, &mut self.pos, &key, value_type, &value)?;

        Ok(())
    }

    fn close_ref_and_obj_sections(&mut self) -> crate::Result<()> {
        let ref_section = std::mem::replace(
            &mut self.ref_section,
            SectionBuilder::new(BlockType::Ref, self.config.block_size, self.config.restart_interval),
        );
        let (_, ref_index_entries) = ref_section.finish(&mut self.sink, &mut self.pos)?;
        self.ref_index_offset = self.write_index(ref_index_entries)?;

        let obj_map = std::mem::take(&mut self.obj_map);

        // The footer packs object_id_len into the low 5 bits of the obj
        // offset field, so it can only ever hold 0..=31. This only matters
        // once there's an obj section to address; a table with no
        // object-id-valued refs never writes one.
        if !obj_map.is_empty() && self.ctx.hash_size > 0x1F {
            return Err(crate::Error::OutOfSpace);
        }

        let obj_offset = if obj_map.is_empty() { 0 } else { self.pos };

        let mut obj_section =
            SectionBuilder::new(BlockType::Obj, self.config.block_size, self.config.restart_interval);
        for (hash_prefix, offsets) in obj_map {
            let rec = ObjRecord { hash_prefix, offsets };
            let value_type = rec.value_type();
            let value = rec.encode_value(&self.ctx);
            obj_section.add(&mut self.sink, &mut self.pos, rec.key(), value_type, &value)?;
        }
        let (_, obj_index_entries) = obj_section.finish(&mut self.sink, &mut self.pos)?;

        self.obj_offset = obj_offset;
        self.obj_index_offset = self.write_index(obj_index_entries)?;

        self.state = WriterState::Log;
        Ok(())
    }

    /// Writes one or more levels of index blocks over `entries` until a
    /// single block covers the level below, returning that block's offset
    /// (or 0 if `entries` has 0 or 1 members — no index is needed).
    fn write_index(&mut self, mut entries: Vec<IndexRecord>) -> crate::Result<u64> {
        if entries.len() <= 1 {
            return Ok(0);
        }

        loop {
            let mut section =
                SectionBuilder::new(BlockType::Index, self.config.block_size, self.config.restart_interval);

            for entry in &entries {
                let value_type = entry.value_type();
                let value = entry.encode_value(&self.ctx);
                section.add(&mut self.sink, &mut self.pos, entry.key(), value_type, &value)?;
            }

            let (first_offset, next_level) = section.finish(&mut self.sink, &mut self.pos)?;

            if next_level.len() <= 1 {
                return Ok(first_offset);
            }
            entries = next_level;
        }
    }

    /// Finalizes the log (and, if not already done, ref/obj) sections and
    /// writes the footer, returning the underlying sink.
    pub fn finish(mut self) -> crate::Result<W> {
        if self.state == WriterState::Ref {
            self.close_ref_and_obj_sections()?;
        }

        let log_section = std::mem::replace(
            &mut self.log_section,
            SectionBuilder::new(BlockType::Log, self.config.block_size, self.config.restart_interval),
        );
        let (log_offset, log_index_entries) = log_section.finish(&mut self.sink, &mut self.pos)?;
        let log_index_offset = self.write_index(log_index_entries)?;

        let footer = Footer {
            header: self.header,
            ref_index_offset: self.ref_index_offset,
            obj_offset: self.obj_offset,
            object_id_len: self.ctx.hash_size as u8,
            obj_index_offset: self.obj_index_offset,
            log_offset,
            log_index_offset,
        };
        let footer_bytes = footer.encode_into_vec()?;
        self.sink.write_all(&footer_bytes)?;
        self.sink.flush()?;

        self.state = WriterState::Done;
        Ok(self.sink)
    }
}

impl Writer<std::fs::File> {
    /// Creates a table at `path` and returns a writer for it.
    pub fn create(path: impl AsRef<std::path::Path>, config: Config) -> crate::Result<Self> {
        let file = std::fs::File::create(path)?;
        Self::new(file, config)
    }

    /// Finalizes the table and fsyncs it, so no partial file is ever
    /// observable once this returns.
    pub fn finish_synced(self) -> crate::Result<()> {
        let file = self.finish()?;
        file.sync_all()?;
        Ok(())
    }
}

use crate::record::LogRecord;

fn ends_with_exactly_one_newline(message: &str) -> bool {
    message.ends_with('\n') && !message.ends_with("\n\n")
}

/// Returns `message` unchanged if it already ends in exactly one trailing
/// newline. Otherwise, either rejects it (`exact`) or normalizes it by
/// trimming any trailing newlines and appending a single one.
fn normalize_log_message(message: &str, exact: bool) -> crate::Result<String> {
    if ends_with_exactly_one_newline(message) {
        return Ok(message.to_string());
    }

    if exact {
        return Err(crate::Error::Api(
            "log message must end in exactly one trailing newline".into(),
        ));
    }

    let mut normalized = message.trim_end_matches('\n').to_string();
    normalized.push('\n');
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use test_log::test;

    #[test]
    fn writes_header_and_minimal_footer() -> crate::Result<()> {
        let config = Config::new(1, 1);
        let writer = Writer::new(Vec::new(), config)?;
        let bytes = writer.finish()?;

        assert_eq!(&bytes[..4], b"REFT");
        assert!(bytes.len() >= Header::size(FormatVersion::V1) + Footer::size(FormatVersion::V1));

        Ok(())
    }

    #[test]
    fn rejects_out_of_order_refs() -> crate::Result<()> {
        let config = Config::new(1, 1);
        let mut writer = Writer::new(Vec::new(), config)?;

        writer.add_ref(&RefRecord {
            ref_name: b"refs/heads/b".to_vec(),
            update_index: 1,
            value: RefValue::Value(vec![1; 20]),
        })?;

        let err = writer.add_ref(&RefRecord {
            ref_name: b"refs/heads/a".to_vec(),
            update_index: 1,
            value: RefValue::Value(vec![2; 20]),
        });
        assert!(matches!(err, Err(crate::Error::Api(_))));

        Ok(())
    }

    #[test]
    fn rejects_sha256_with_version_1() {
        let config = Config::new(1, 1).hash_id(HashId::Sha256);
        let err = Writer::new(Vec::new(), config);
        assert!(matches!(err, Err(crate::Error::Api(_))));
    }

    #[test]
    fn rejects_sha256_obj_index_as_out_of_space() -> crate::Result<()> {
        let config = Config::new(1, 1).version(FormatVersion::V2).hash_id(HashId::Sha256);
        let mut writer = Writer::new(Vec::new(), config)?;

        writer.add_ref(&RefRecord {
            ref_name: b"refs/heads/main".to_vec(),
            update_index: 1,
            value: RefValue::Value(vec![0xaa; 32]),
        })?;

        let err = writer.finish();
        assert!(matches!(err, Err(crate::Error::OutOfSpace)));

        Ok(())
    }

    #[test]
    fn sha256_table_without_object_ids_is_unaffected() -> crate::Result<()> {
        let config = Config::new(1, 1).version(FormatVersion::V2).hash_id(HashId::Sha256);
        let mut writer = Writer::new(Vec::new(), config)?;

        writer.add_ref(&RefRecord {
            ref_name: b"refs/heads/main".to_vec(),
            update_index: 1,
            value: RefValue::Symref("refs/heads/trunk".into()),
        })?;

        let bytes = writer.finish()?;
        assert_eq!(&bytes[..4], b"REFT");

        Ok(())
    }

    #[test]
    fn add_log_normalizes_a_missing_trailing_newline_by_default() -> crate::Result<()> {
        let config = Config::new(1, 1);
        let mut writer = Writer::new(Vec::new(), config)?;

        writer.add_log(&LogRecord::new(
            b"refs/heads/main".to_vec(),
            1,
            vec![0; 20],
            vec![1; 20],
            "A".into(),
            "a@x".into(),
            0,
            0,
            "no newline here".into(),
        ))?;

        let bytes = writer.finish()?;
        let reader = crate::table::Reader::new(crate::source::MemoryBlockSource::new(bytes))?;
        let log = reader.seek_log(b"refs/heads/main")?.expect("present");
        assert_eq!(log.message, "no newline here\n");

        Ok(())
    }

    #[test]
    fn add_log_rejects_a_missing_trailing_newline_when_exact() -> crate::Result<()> {
        let config = Config::new(1, 1).exact_log_message(true);
        let mut writer = Writer::new(Vec::new(), config)?;

        let err = writer.add_log(&LogRecord::new(
            b"refs/heads/main".to_vec(),
            1,
            vec![0; 20],
            vec![1; 20],
            "A".into(),
            "a@x".into(),
            0,
            0,
            "no newline here".into(),
        ));
        assert!(matches!(err, Err(crate::Error::Api(_))));

        Ok(())
    }

    #[test]
    fn rejects_ref_after_log() -> crate::Result<()> {
        let config = Config::new(1, 2);
        let mut writer = Writer::new(Vec::new(), config)?;

        writer.add_log(&LogRecord::new(
            b"refs/heads/main".to_vec(),
            1,
            vec![0; 20],
            vec![1; 20],
            "A".into(),
            "a@x".into(),
            0,
            0,
            "m\n".into(),
        ))?;

        let err = writer.add_ref(&RefRecord {
            ref_name: b"refs/heads/z".to_vec(),
            update_index: 2,
            value: RefValue::Value(vec![1; 20]),
        });
        assert!(matches!(err, Err(crate::Error::Api(_))));

        Ok(())
    }
}
