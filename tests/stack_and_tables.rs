// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use reftable::config::Config;
use reftable::record::{LogRecord, RefRecord, RefValue};
use reftable::source::{BlockSource, Buffer, MemoryBlockSource};
use reftable::table::{Reader, Writer};
use reftable::Stack;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use test_log::test;

/// Wraps a [`MemoryBlockSource`] and counts `read_block` calls, so indexed
/// seeks can be checked against a logarithmic read budget. The counter is
/// shared via `Arc` so it stays observable after the source is moved into a
/// [`Reader`].
struct CountingSource {
    inner: MemoryBlockSource,
    reads: Arc<AtomicUsize>,
}

impl CountingSource {
    fn new(data: Vec<u8>, reads: Arc<AtomicUsize>) -> Self {
        Self {
            inner: MemoryBlockSource::new(data),
            reads,
        }
    }
}

impl BlockSource for CountingSource {
    fn size(&self) -> reftable::Result<u64> {
        self.inner.size()
    }

    fn read_block(&self, offset: u64, len: usize) -> reftable::Result<Buffer> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.inner.read_block(offset, len)
    }
}

#[test]
fn writes_and_reads_back_refs_in_order() -> reftable::Result<()> {
    let config = Config::new(1, 1);
    let mut writer = Writer::new(Vec::new(), config)?;

    writer.add_ref(&RefRecord {
        ref_name: b"refs/heads/main".to_vec(),
        update_index: 1,
        value: RefValue::Value(vec![0xaa; 20]),
    })?;
    writer.add_ref(&RefRecord {
        ref_name: b"refs/tags/v1".to_vec(),
        update_index: 1,
        value: RefValue::ValuePeeled {
            target: vec![0xbb; 20],
            peeled: vec![0xcc; 20],
        },
    })?;

    let bytes = writer.finish()?;
    let reader = Reader::new(MemoryBlockSource::new(bytes))?;

    let mut iter = reader.iter_refs()?;
    let first = iter.next()?.expect("first record");
    assert_eq!(first.ref_name, b"refs/heads/main");
    assert_eq!(first.value, RefValue::Value(vec![0xaa; 20]));

    let second = iter.next()?.expect("second record");
    assert_eq!(second.ref_name, b"refs/tags/v1");
    assert_eq!(
        second.value,
        RefValue::ValuePeeled {
            target: vec![0xbb; 20],
            peeled: vec![0xcc; 20],
        }
    );

    assert!(iter.next()?.is_none());

    Ok(())
}

#[test]
fn merged_stack_can_surface_or_suppress_a_deletion() -> reftable::Result<()> {
    let mut w0 = Writer::new(Vec::new(), Config::new(1, 1))?;
    w0.add_ref(&RefRecord {
        ref_name: b"refs/heads/x".to_vec(),
        update_index: 1,
        value: RefValue::Value(vec![0xaa; 20]),
    })?;
    let t0 = w0.finish()?;

    let mut w1 = Writer::new(Vec::new(), Config::new(2, 2))?;
    w1.add_ref(&RefRecord {
        ref_name: b"refs/heads/x".to_vec(),
        update_index: 2,
        value: RefValue::Deletion,
    })?;
    let t1 = w1.finish()?;

    let surfaced = Stack::new(vec![
        Reader::new(MemoryBlockSource::new(t0.clone()))?,
        Reader::new(MemoryBlockSource::new(t1.clone()))?,
    ]);
    let found = surfaced.seek_ref(b"refs/heads/x")?.expect("tombstone surfaced");
    assert!(found.is_deletion());

    let hidden = Stack::new(vec![
        Reader::new(MemoryBlockSource::new(t0))?,
        Reader::new(MemoryBlockSource::new(t1))?,
    ])
    .suppress_deletions(true);
    assert!(hidden.seek_ref(b"refs/heads/x")?.is_none());

    Ok(())
}

#[test]
fn indexed_seek_over_many_refs_uses_far_fewer_reads_than_a_full_scan() -> reftable::Result<()> {
    let total = 10_000u64;
    let config = Config::new(1, 1).block_size(1_024);
    let mut writer = Writer::new(Vec::new(), config)?;

    for i in 0..total {
        writer.add_ref(&RefRecord {
            ref_name: format!("refs/heads/{i:06}").into_bytes(),
            update_index: 1,
            value: RefValue::Value(vec![(i % 256) as u8; 20]),
        })?;
    }

    let bytes = writer.finish()?;
    let reads = Arc::new(AtomicUsize::new(0));
    let reader = Reader::new(CountingSource::new(bytes, reads.clone()))?;

    let before = reads.load(Ordering::Relaxed);
    let target = format!("refs/heads/{:06}", total / 2 + 1);
    let found = reader.seek_ref(target.as_bytes())?.expect("present");
    assert_eq!(found.ref_name, target.as_bytes());
    let seek_reads = reads.load(Ordering::Relaxed) - before;

    // With ~1 KiB blocks and ~20-byte keys, the ref section spans on the
    // order of hundreds of blocks; an indexed descent should need a small
    // constant number of block reads, nowhere near a linear scan.
    assert!(
        seek_reads < 20,
        "expected a logarithmic number of reads, got {seek_reads}"
    );

    Ok(())
}

#[test]
fn corrupted_footer_crc_is_rejected() -> reftable::Result<()> {
    let config = Config::new(1, 1);
    let mut writer = Writer::new(Vec::new(), config)?;
    writer.add_ref(&RefRecord {
        ref_name: b"refs/heads/main".to_vec(),
        update_index: 1,
        value: RefValue::Value(vec![0xaa; 20]),
    })?;

    let mut bytes = writer.finish()?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    assert!(Reader::new(MemoryBlockSource::new(bytes)).is_err());

    Ok(())
}

#[test]
fn seek_log_at_returns_the_entry_in_effect_at_that_update_index() -> reftable::Result<()> {
    let config = Config::new(1, 50);
    let mut writer = Writer::new(Vec::new(), config)?;

    writer.add_ref(&RefRecord {
        ref_name: b"refs/heads/main".to_vec(),
        update_index: 1,
        value: RefValue::Value(vec![0xaa; 20]),
    })?;

    for i in 1..=50u64 {
        writer.add_log(&LogRecord::new(
            b"refs/heads/main".to_vec(),
            i,
            vec![0; 20],
            vec![i as u8; 20],
            "Author".into(),
            "a@example.com".into(),
            1_700_000_000 + i,
            0,
            format!("update {i}\n"),
        ))?;
    }

    let bytes = writer.finish()?;
    let reader = Reader::new(MemoryBlockSource::new(bytes))?;

    let newest = reader.seek_log(b"refs/heads/main")?.expect("present");
    assert_eq!(newest.update_index, 50);

    let at_25 = reader.seek_log_at(b"refs/heads/main", 25)?.expect("present");
    assert_eq!(at_25.update_index, 25);

    Ok(())
}

#[test]
fn obj_index_resolves_refs_by_object_id() -> reftable::Result<()> {
    let config = Config::new(1, 1);
    let mut writer = Writer::new(Vec::new(), config)?;

    writer.add_ref(&RefRecord {
        ref_name: b"refs/heads/main".to_vec(),
        update_index: 1,
        value: RefValue::Value(vec![0xaa; 20]),
    })?;
    writer.add_ref(&RefRecord {
        ref_name: b"refs/heads/other".to_vec(),
        update_index: 1,
        value: RefValue::Value(vec![0xbb; 20]),
    })?;

    let bytes = writer.finish()?;
    let reader = Reader::new(MemoryBlockSource::new(bytes))?;

    let matches = reader.refs_for(&[0xaa; 20])?;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].ref_name, b"refs/heads/main");

    assert!(reader.refs_for(&[0xff; 20])?.is_empty());

    Ok(())
}
