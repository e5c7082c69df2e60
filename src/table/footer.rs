// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::header::Header;
use crate::checksum::{Checksum, ChecksummedWriter};
use crate::coding::{read_be_uint, write_be_uint};
use crate::config::FormatVersion;
use std::io::Cursor;

const CRC_WIDTH: usize = 4;
const FIELD_WIDTH: usize = 8;

/// Repeats the header (as a truncation/corruption check), then the section
/// offsets, then a CRC-32 over everything preceding it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Footer {
    pub header: Header,
    pub ref_index_offset: u64,
    pub obj_offset: u64,
    pub object_id_len: u8,
    pub obj_index_offset: u64,
    pub log_offset: u64,
    pub log_index_offset: u64,
}

impl Footer {
    #[must_use]
    pub fn size(version: FormatVersion) -> usize {
        Header::size(version) + 5 * FIELD_WIDTH + CRC_WIDTH
    }

    pub fn encode_into_vec(&self) -> crate::Result<Vec<u8>> {
        let mut writer = ChecksummedWriter::new(Vec::with_capacity(Self::size(self.header.version)));

        self.header.encode_into(&mut writer)?;

        write_be_uint(&mut writer, self.ref_index_offset, FIELD_WIDTH)?;

        let packed_obj = (self.obj_offset << 5) | u64::from(self.object_id_len & 0x1F);
        write_be_uint(&mut writer, packed_obj, FIELD_WIDTH)?;

        write_be_uint(&mut writer, self.obj_index_offset, FIELD_WIDTH)?;
        write_be_uint(&mut writer, self.log_offset, FIELD_WIDTH)?;
        write_be_uint(&mut writer, self.log_index_offset, FIELD_WIDTH)?;

        let crc = writer.checksum();
        let mut buf = writer.into_inner();
        write_be_uint(&mut buf, u64::from(crc.into_u32()), CRC_WIDTH)?;

        Ok(buf)
    }

    /// Parses a footer from its exact byte span and verifies its CRC and
    /// that its embedded header matches `file_header` (the header read from
    /// offset 0 of the file), detecting truncation/corruption.
    pub fn parse(bytes: &[u8], file_header: &Header) -> crate::Result<Self> {
        let version = file_header.version;
        let expected_len = Self::size(version);
        if bytes.len() != expected_len {
            return Err(crate::Error::Format(format!(
                "footer has wrong length {} (expected {expected_len})",
                bytes.len()
            )));
        }

        let crc_off = bytes.len() - CRC_WIDTH;
        let stored_crc = Checksum::from_raw(
            read_be_uint(&mut Cursor::new(&bytes[crc_off..]), CRC_WIDTH)? as u32,
        );
        let computed_crc = Checksum::of(&bytes[..crc_off]);
        computed_crc.check(stored_crc)?;

        let header = Header::decode_from(&mut Cursor::new(bytes))?;
        if header != *file_header {
            return Err(crate::Error::Format(
                "footer header does not match file header".into(),
            ));
        }

        let mut cursor = Cursor::new(&bytes[Header::size(version)..crc_off]);
        let ref_index_offset = read_be_uint(&mut cursor, FIELD_WIDTH)?;
        let packed_obj = read_be_uint(&mut cursor, FIELD_WIDTH)?;
        let obj_offset = packed_obj >> 5;
        let object_id_len = (packed_obj & 0x1F) as u8;
        let obj_index_offset = read_be_uint(&mut cursor, FIELD_WIDTH)?;
        let log_offset = read_be_uint(&mut cursor, FIELD_WIDTH)?;
        let log_index_offset = read_be_uint(&mut cursor, FIELD_WIDTH)?;

        Ok(Self {
            header,
            ref_index_offset,
            obj_offset,
            object_id_len,
            obj_index_offset,
            log_offset,
            log_index_offset,
        })
    }
}
