// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Table writer configuration.

use crate::hash_id::HashId;

/// On-disk format version. Version 1 implies SHA-1 object-ids and omits the
/// hash id field from the header/footer; version 2 writes it explicitly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FormatVersion {
    /// Original format, SHA-1 only.
    V1,

    /// Adds an explicit hash id, allowing SHA-256 object-ids.
    V2,
}

impl From<FormatVersion> for u8 {
    fn from(val: FormatVersion) -> Self {
        match val {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }
}

impl TryFrom<u8> for FormatVersion {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            _ => Err(()),
        }
    }
}

/// Table writer configuration builder.
#[derive(Clone, Debug)]
pub struct Config {
    /// On-disk format version.
    pub(crate) version: FormatVersion,

    /// Target size of a block, in bytes. Must fit in 24 bits.
    pub(crate) block_size: u32,

    /// Number of records between restart-array entries.
    pub(crate) restart_interval: u16,

    /// Hash function the table's object-ids are expressed in.
    pub(crate) hash_id: HashId,

    /// Lower bound (inclusive) of `update_index` values this table may hold.
    pub(crate) min_update_index: u64,

    /// Upper bound (inclusive) of `update_index` values this table may hold.
    pub(crate) max_update_index: u64,

    /// If set, the merged reader hides deletions instead of surfacing them.
    pub(crate) suppress_deletions: bool,

    /// If set, log messages must already end in exactly one trailing
    /// newline; the writer rejects anything else instead of normalizing it.
    pub(crate) exact_log_message: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: FormatVersion::V1,
            block_size: /* 4 KiB */ 4_096,
            restart_interval: 16,
            hash_id: HashId::Sha1,
            min_update_index: 0,
            max_update_index: 0,
            suppress_deletions: false,
            exact_log_message: false,
        }
    }
}

impl Config {
    /// Initializes a new config for a table covering `[min, max]` update
    /// indexes.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    #[must_use]
    pub fn new(min_update_index: u64, max_update_index: u64) -> Self {
        assert!(min_update_index <= max_update_index);

        Self {
            min_update_index,
            max_update_index,
            ..Default::default()
        }
    }

    /// Sets the on-disk format version.
    ///
    /// Defaults to version 1. Requesting [`HashId::Sha256`] together with
    /// version 1 is rejected at write time (see [`crate::Error::Api`]),
    /// rather than silently upgrading the version.
    #[must_use]
    pub fn version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    /// Sets the target block size.
    ///
    /// Defaults to 4 KiB.
    ///
    /// # Panics
    ///
    /// Panics if the block size can't hold a header and footer, or exceeds
    /// the 24-bit block-length field (16 MiB - 1).
    #[must_use]
    pub fn block_size(mut self, block_size: u32) -> Self {
        assert!(block_size >= 92, "block must fit header and footer");
        assert!(block_size <= 0x00FF_FFFF, "block size exceeds 24 bits");

        self.block_size = block_size;
        self
    }

    /// Sets the restart interval: how many records may separate one
    /// full-key "restart" entry from the next.
    ///
    /// Defaults to 16.
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    #[must_use]
    pub fn restart_interval(mut self, n: u16) -> Self {
        assert!(n > 0);

        self.restart_interval = n;
        self
    }

    /// Sets the hash function object-ids in this table are expressed in.
    ///
    /// Defaults to SHA-1.
    #[must_use]
    pub fn hash_id(mut self, hash_id: HashId) -> Self {
        self.hash_id = hash_id;
        self
    }

    /// When set, the merged reader hides deletion (tombstone) records
    /// instead of surfacing them to the caller.
    ///
    /// Defaults to `false` (deletions are surfaced, as is needed to compact
    /// a stack correctly).
    #[must_use]
    pub fn suppress_deletions(mut self, suppress: bool) -> Self {
        self.suppress_deletions = suppress;
        self
    }

    /// When set, the table writer rejects log messages that don't already
    /// end in exactly one trailing newline, instead of appending one.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn exact_log_message(mut self, exact: bool) -> Self {
        self.exact_log_message = exact;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::new(1, 10);
        assert_eq!(config.min_update_index, 1);
        assert_eq!(config.max_update_index, 10);
        assert_eq!(config.block_size, 4_096);
        assert_eq!(config.restart_interval, 16);
    }

    #[test]
    #[should_panic]
    fn rejects_inverted_range() {
        Config::new(10, 1);
    }

    #[test]
    fn format_version_round_trips() {
        for v in [FormatVersion::V1, FormatVersion::V2] {
            assert_eq!(FormatVersion::try_from(u8::from(v)), Ok(v));
        }
    }
}
