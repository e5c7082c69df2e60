// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{read_be_uint, write_be_uint};
use crate::config::FormatVersion;
use crate::file::MAGIC_BYTES;
use crate::hash_id::HashId;
use std::io::{Read, Write};

/// `"REFT" | version(1) | block_size(3, BE) | min_update_index(8, BE) |
/// max_update_index(8, BE) | [hash_id(4, BE), v2 only]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub version: FormatVersion,
    pub block_size: u32,
    pub min_update_index: u64,
    pub max_update_index: u64,
    pub hash_id: HashId,
}

impl Header {
    #[must_use]
    pub fn size(version: FormatVersion) -> usize {
        match version {
            FormatVersion::V1 => 24,
            FormatVersion::V2 => 28,
        }
    }

    pub fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        writer.write_all(&MAGIC_BYTES)?;
        writer.write_all(&[u8::from(self.version)])?;
        write_be_uint(writer, u64::from(self.block_size), 3)?;
        write_be_uint(writer, self.min_update_index, 8)?;
        write_be_uint(writer, self.max_update_index, 8)?;

        if matches!(self.version, FormatVersion::V2) {
            write_be_uint(writer, u64::from(self.hash_id.as_u32()), 4)?;
        }

        Ok(())
    }

    pub fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_BYTES {
            return Err(crate::Error::Format(format!(
                "bad magic bytes {magic:?}, expected {MAGIC_BYTES:?}"
            )));
        }

        let mut version_byte = [0u8; 1];
        reader.read_exact(&mut version_byte)?;
        let version = crate::config::FormatVersion::try_from(version_byte[0])
            .map_err(|()| crate::Error::Format(format!("unsupported version {}", version_byte[0])))?;

        let block_size = read_be_uint(reader, 3)? as u32;
        let min_update_index = read_be_uint(reader, 8)?;
        let max_update_index = read_be_uint(reader, 8)?;

        let hash_id = if matches!(version, FormatVersion::V2) {
            HashId::from_u32(read_be_uint(reader, 4)? as u32)?
        } else {
            HashId::Sha1
        };

        Ok(Self {
            version,
            block_size,
            min_update_index,
            max_update_index,
            hash_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn round_trips_v1() {
        let header = Header {
            version: FormatVersion::V1,
            block_size: 4_096,
            min_update_index: 1,
            max_update_index: 100,
            hash_id: HashId::Sha1,
        };
        let mut buf = Vec::new();
        header.encode_into(&mut buf).unwrap();
        assert_eq!(buf.len(), Header::size(FormatVersion::V1));

        let decoded = Header::decode_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn round_trips_v2_with_hash_id() {
        let header = Header {
            version: FormatVersion::V2,
            block_size: 8_192,
            min_update_index: 1,
            max_update_index: 100,
            hash_id: HashId::Sha256,
        };
        let mut buf = Vec::new();
        header.encode_into(&mut buf).unwrap();
        assert_eq!(buf.len(), Header::size(FormatVersion::V2));

        let decoded = Header::decode_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, header);
    }

    use std::io::Cursor;

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![b'X', b'X', b'X', b'X'];
        buf.extend_from_slice(&[1, 0, 0, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(Header::decode_from(&mut Cursor::new(&buf)).is_err());
    }
}
