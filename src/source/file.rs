// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{BlockSource, Buffer};
use crate::file;
use std::path::{Path, PathBuf};

/// A [`BlockSource`] backed by an open file, read via `pread` (or, on
/// non-unix targets, a cloned file descriptor).
pub struct FileBlockSource {
    file: std::fs::File,
    path: PathBuf,
}

impl FileBlockSource {
    /// Opens `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                crate::Error::NotExist(path.clone())
            } else {
                crate::Error::Io(e)
            }
        })?;
        Ok(Self { file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockSource for FileBlockSource {
    fn size(&self) -> crate::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_block(&self, offset: u64, len: usize) -> crate::Result<Buffer> {
        let slice = file::read_exact(&self.file, offset, len)?;
        Ok(Buffer::new(slice))
    }
}
