// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{BlockSource, Buffer};
use crate::Slice;

/// An in-memory [`BlockSource`], mainly for tests and for tables held
/// entirely in memory between construction and first flush.
pub struct MemoryBlockSource {
    data: Slice,
}

impl MemoryBlockSource {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl BlockSource for MemoryBlockSource {
    fn size(&self) -> crate::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_block(&self, offset: u64, len: usize) -> crate::Result<Buffer> {
        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past end of in-memory table",
            )));
        }
        Ok(Buffer::new(self.data.slice(start..end)))
    }
}
