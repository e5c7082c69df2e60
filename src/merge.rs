// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! k-way merge across a stack of tables, newest-table-wins shadowing, and
//! the [`Stack`] convenience wrapper built on top of it.

use crate::record::{ref_matches_oid, Record};
use crate::table::{LogIter, Reader, RefIter};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, BTreeSet};

/// A single table's sub-iterator, abstracted over which record kind it
/// yields so [`MergedReader`] can drive ref and log merges identically.
trait SubSource<T> {
    fn next(&mut self) -> crate::Result<Option<T>>;
}

impl SubSource<crate::record::RefRecord> for RefIter<'_> {
    fn next(&mut self) -> crate::Result<Option<crate::record::RefRecord>> {
        RefIter::next(self)
    }
}

impl SubSource<crate::record::LogRecord> for LogIter<'_> {
    fn next(&mut self) -> crate::Result<Option<crate::record::LogRecord>> {
        LogIter::next(self)
    }
}

struct HeapEntry<T> {
    stack_index: usize,
    record: T,
}

impl<T: Record> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.record.key() == other.record.key() && self.stack_index == other.stack_index
    }
}

impl<T: Record> Eq for HeapEntry<T> {}

impl<T: Record> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Record> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Primary: key ascending. Tie: the *newer* table (higher
        // stack_index) sorts as "smaller", so it pops first out of the
        // min-heap and shadows the older duplicate.
        self.record
            .key()
            .cmp(other.record.key())
            .then_with(|| other.stack_index.cmp(&self.stack_index))
    }
}

/// Merges a stack of per-table iterators (oldest table first) into one
/// key-ordered stream, where a key present in more than one table resolves
/// to the newest table's record.
pub struct MergedReader<'a, T> {
    subs: Vec<Box<dyn SubSource<T> + 'a>>,
    heap: BinaryHeap<Reverse<HeapEntry<T>>>,
    suppress_deletions: bool,
}

impl<'a, T: Record> MergedReader<'a, T> {
    /// Builds a merged reader over `subs`, ordered oldest table (index 0)
    /// to newest. If `suppress_deletions` is set, tombstones that win the
    /// shadowing race are hidden instead of surfaced.
    pub fn new(subs: Vec<Box<dyn SubSource<T> + 'a>>, suppress_deletions: bool) -> crate::Result<Self> {
        let mut this = Self {
            subs,
            heap: BinaryHeap::new(),
            suppress_deletions,
        };

        for index in 0..this.subs.len() {
            this.pull(index)?;
        }

        Ok(this)
    }

    fn pull(&mut self, stack_index: usize) -> crate::Result<()> {
        if let Some(record) = self.subs[stack_index].next()? {
            self.heap.push(Reverse(HeapEntry { stack_index, record }));
        }
        Ok(())
    }

    /// Returns the next surviving record in key order, or `None` once every
    /// sub-iterator is exhausted.
    pub fn next(&mut self) -> crate::Result<Option<T>> {
        loop {
            let Some(Reverse(winner)) = self.heap.pop() else {
                return Ok(None);
            };

            let winning_key = winner.record.key().to_vec();
            self.pull(winner.stack_index)?;

            while let Some(Reverse(top)) = self.heap.peek() {
                if top.record.key() <= winning_key.as_slice() {
                    let Reverse(shadowed) = self.heap.pop().expect("peeked Some");
                    self.pull(shadowed.stack_index)?;
                } else {
                    break;
                }
            }

            if self.suppress_deletions && winner.record.is_deletion() {
                continue;
            }

            return Ok(Some(winner.record));
        }
    }
}

/// An ordered sequence of reftables covering disjoint, contiguous
/// update-index ranges, exposing the same point-query surface as a single
/// [`Reader`] by merging one sub-iterator per table per call.
pub struct Stack {
    readers: Vec<Reader>,
    suppress_deletions: bool,
}

impl Stack {
    /// Wraps `readers`, ordered oldest table first.
    #[must_use]
    pub fn new(readers: Vec<Reader>) -> Self {
        Self {
            readers,
            suppress_deletions: false,
        }
    }

    /// When set, a deletion that wins the shadowing race across the stack
    /// is hidden rather than returned. Defaults to `false`.
    #[must_use]
    pub fn suppress_deletions(mut self, suppress: bool) -> Self {
        self.suppress_deletions = suppress;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// The current record for `ref_name`, across the whole stack.
    pub fn seek_ref(&self, ref_name: &[u8]) -> crate::Result<Option<crate::record::RefRecord>> {
        let mut subs: Vec<Box<dyn SubSource<crate::record::RefRecord> + '_>> = Vec::with_capacity(self.readers.len());
        for reader in &self.readers {
            subs.push(Box::new(reader.iter_refs_seek(ref_name)?));
        }

        let mut merged = MergedReader::new(subs, self.suppress_deletions)?;
        match merged.next()? {
            Some(record) if record.ref_name == ref_name => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    /// The most recent reflog entry for `ref_name`, across the whole stack.
    pub fn seek_log(&self, ref_name: &[u8]) -> crate::Result<Option<crate::record::LogRecord>> {
        self.seek_log_at(ref_name, u64::MAX)
    }

    /// The reflog entry for `ref_name` in effect as of `at_update_index`,
    /// across the whole stack.
    pub fn seek_log_at(
        &self,
        ref_name: &[u8],
        at_update_index: u64,
    ) -> crate::Result<Option<crate::record::LogRecord>> {
        let target = crate::record::log_seek_key(ref_name, at_update_index);

        let mut subs: Vec<Box<dyn SubSource<crate::record::LogRecord> + '_>> = Vec::with_capacity(self.readers.len());
        for reader in &self.readers {
            subs.push(Box::new(reader.iter_logs_seek(&target)?));
        }

        let mut merged = MergedReader::new(subs, false)?;
        match merged.next()? {
            Some(record) if record.ref_name == ref_name => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    /// All refs currently bound to `oid`, across the whole stack. Collects
    /// candidate ref names from every table's own `refs_for`, then resolves
    /// each through [`Stack::seek_ref`] so a newer table's redefinition (or
    /// deletion) of the same name correctly shadows an older match.
    pub fn refs_for(&self, oid: &[u8]) -> crate::Result<Vec<crate::record::RefRecord>> {
        let mut candidate_names: BTreeSet<Vec<u8>> = BTreeSet::new();
        for reader in &self.readers {
            for record in reader.refs_for(oid)? {
                candidate_names.insert(record.ref_name);
            }
        }

        let mut out = Vec::new();
        for name in candidate_names {
            if let Some(record) = self.seek_ref(&name)? {
                if ref_matches_oid(&record, oid) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::record::RefValue;
    use crate::source::MemoryBlockSource;
    use crate::table::Writer;
    use test_log::test;

    fn table_with(entries: &[(&[u8], u64, RefValue)]) -> crate::Result<Vec<u8>> {
        let config = Config::new(1, 10);
        let mut writer = Writer::new(Vec::new(), config)?;
        for (name, update_index, value) in entries {
            writer.add_ref(&crate::record::RefRecord {
                ref_name: name.to_vec(),
                update_index: *update_index,
                value: value.clone(),
            })?;
        }
        writer.finish()
    }

    #[test]
    fn newest_table_shadows_older_one() -> crate::Result<()> {
        let t0 = table_with(&[(b"refs/heads/x", 1, RefValue::Value(vec![0xaa; 20]))])?;
        let t1 = table_with(&[(b"refs/heads/x", 2, RefValue::Value(vec![0xbb; 20]))])?;

        let stack = Stack::new(vec![Reader::new(MemoryBlockSource::new(t0))?, Reader::new(MemoryBlockSource::new(t1))?]);

        let found = stack.seek_ref(b"refs/heads/x")?.expect("present");
        assert_eq!(found.value, RefValue::Value(vec![0xbb; 20]));
        assert_eq!(found.update_index, 2);

        Ok(())
    }

    #[test]
    fn deletion_can_be_surfaced_or_suppressed() -> crate::Result<()> {
        let t0 = table_with(&[(b"refs/heads/x", 1, RefValue::Value(vec![0xaa; 20]))])?;
        let t1 = table_with(&[(b"refs/heads/x", 2, RefValue::Deletion)])?;

        let surfaced = Stack::new(vec![Reader::new(MemoryBlockSource::new(t0.clone()))?, Reader::new(MemoryBlockSource::new(t1.clone()))?]);
        let found = surfaced.seek_ref(b"refs/heads/x")?.expect("tombstone surfaced");
        assert!(found.is_deletion());

        let hidden = Stack::new(vec![Reader::new(MemoryBlockSource::new(t0))?, Reader::new(MemoryBlockSource::new(t1))?])
            .suppress_deletions(true);
        assert!(hidden.seek_ref(b"refs/heads/x")?.is_none());

        Ok(())
    }

    #[test]
    fn finds_refs_across_stack_by_object_id() -> crate::Result<()> {
        let t0 = table_with(&[(b"refs/heads/a", 1, RefValue::Value(vec![0x11; 20]))])?;
        let t1 = table_with(&[(b"refs/heads/b", 2, RefValue::Value(vec![0x22; 20]))])?;

        let stack = Stack::new(vec![Reader::new(MemoryBlockSource::new(t0))?, Reader::new(MemoryBlockSource::new(t1))?]);

        let matches = stack.refs_for(&[0x11; 20])?;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].ref_name, b"refs/heads/a");

        Ok(())
    }
}
