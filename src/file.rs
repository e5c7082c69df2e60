// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Positioned, cursor-independent file reads.

use crate::Slice;

/// The 4-byte magic every reftable file starts with.
pub const MAGIC_BYTES: [u8; 4] = [b'R', b'E', b'F', b'T'];

/// Reads `size` bytes at `offset` from `file` using `pread`, without
/// disturbing the file's cursor.
#[cfg(unix)]
pub fn read_exact(file: &std::fs::File, offset: u64, size: usize) -> std::io::Result<Slice> {
    use std::os::unix::fs::FileExt;

    // SAFETY: filled in full by `read_exact_at` below, or the call errors
    // out and the partially-initialized buffer is discarded.
    #[expect(unsafe_code, reason = "see safety")]
    let mut builder = unsafe { Slice::builder_unzeroed(size) };

    file.read_exact_at(&mut builder, offset)?;

    #[expect(unsafe_code, reason = "see safety")]
    Ok(unsafe { builder.freeze() }.into())
}

/// Reads `size` bytes at `offset` from `file`, without disturbing the
/// file's cursor (non-unix fallback via a cloned file descriptor).
#[cfg(not(unix))]
pub fn read_exact(file: &std::fs::File, offset: u64, size: usize) -> std::io::Result<Slice> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;

    #[expect(unsafe_code, reason = "see safety")]
    let mut builder = unsafe { Slice::builder_unzeroed(size) };

    file.read_exact(&mut builder)?;

    #[expect(unsafe_code, reason = "see safety")]
    Ok(unsafe { builder.freeze() }.into())
}
