// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The hash algorithm a reftable's object-ids are expressed in. Version 1
//! files imply SHA-1 and carry no explicit tag; version 2 files write one of
//! the two identifiers below into the header/footer.

const SHA1_ID: u32 = 0x7368_6131;
const SHA256_ID: u32 = 0x7332_3536;

/// Which hash function produced the object-ids stored in a table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HashId {
    /// SHA-1, 20-byte object-ids. Implied by version 1 files.
    Sha1,

    /// SHA-256, 32-byte object-ids. Requires version 2.
    Sha256,
}

impl HashId {
    /// Size in bytes of an object-id under this hash function.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// The 4-byte tag written into a version-2 header/footer.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Sha1 => SHA1_ID,
            Self::Sha256 => SHA256_ID,
        }
    }

    /// Parses a hash id tag read from a version-2 header.
    pub fn from_u32(value: u32) -> crate::Result<Self> {
        match value {
            SHA1_ID => Ok(Self::Sha1),
            SHA256_ID => Ok(Self::Sha256),
            other => Err(crate::Error::Format(format!(
                "unknown hash id 0x{other:08x}"
            ))),
        }
    }
}

impl Default for HashId {
    fn default() -> Self {
        Self::Sha1
    }
}
