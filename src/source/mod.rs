// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Abstract random-read byte sources a table reader pulls blocks from.

mod file;
mod memory;

pub use file::FileBlockSource;
pub use memory::MemoryBlockSource;

use crate::Slice;

/// An owned, borrowed-and-returned block buffer.
///
/// Every successful [`BlockSource::read_block`] must be matched by exactly
/// one [`BlockSource::return_block`]; returning is idempotent against an
/// already-cleared buffer.
#[derive(Clone, Debug)]
pub struct Buffer(Slice);

impl Buffer {
    #[must_use]
    pub(crate) fn new(slice: Slice) -> Self {
        Self(slice)
    }
}

impl std::ops::Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Random-read capability a single-table reader is built on.
///
/// Implementations must not assume memory-mapping; reads may malloc-and-copy.
pub trait BlockSource: Send + Sync {
    /// Total size of the backing byte stream.
    fn size(&self) -> crate::Result<u64>;

    /// Reads exactly `len` bytes starting at `offset`. Callers must clip
    /// `offset + len` to `size()`; reading past the end is an error.
    fn read_block(&self, offset: u64, len: usize) -> crate::Result<Buffer>;

    /// Releases a buffer previously returned by `read_block`. The default
    /// implementation does nothing, which is correct (and idempotent) for
    /// sources that don't pool buffers.
    fn return_block(&self, _buf: Buffer) {}

    /// Releases any resources held by this source.
    fn close(&self) {}
}
