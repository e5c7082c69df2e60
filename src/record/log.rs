// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Record, RecordCtx};
use crate::coding::{read_varint, write_varint};
use std::io::Cursor;

fn build_key(ref_name: &[u8], update_index: u64) -> Vec<u8> {
    // ref_name || 0x00 || BE(!update_index): inverting the update index
    // means a larger update index sorts *lower*, so iterating a ref's logs
    // in key order yields the newest entry first.
    let mut key = Vec::with_capacity(ref_name.len() + 9);
    key.extend_from_slice(ref_name);
    key.push(0);
    key.extend_from_slice(&(!update_index).to_be_bytes());
    key
}

/// The key a reader seeks to find the newest log entry for `ref_name` with
/// `update_index <= at_update_index`.
pub(crate) fn log_seek_key(ref_name: &[u8], at_update_index: u64) -> Vec<u8> {
    build_key(ref_name, at_update_index)
}

fn split_key(key: &[u8]) -> crate::Result<(&[u8], u64)> {
    if key.len() < 9 {
        return Err(crate::Error::Format("log record key too short".into()));
    }
    let split = key.len() - 9;
    if key[split] != 0 {
        return Err(crate::Error::Format(
            "log record key missing NUL separator".into(),
        ));
    }
    let ref_name = &key[..split];
    let mut be = [0u8; 8];
    be.copy_from_slice(&key[split + 1..]);
    let update_index = !u64::from_be_bytes(be);
    Ok((ref_name, update_index))
}

/// One reflog entry for a ref: `(ref_name, update_index, old_id, new_id,
/// name, email, time_seconds, tz_minutes, message)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogRecord {
    pub ref_name: Vec<u8>,
    pub update_index: u64,
    pub old_id: Vec<u8>,
    pub new_id: Vec<u8>,
    pub name: String,
    pub email: String,
    pub time_seconds: u64,
    pub tz_minutes: i16,
    pub message: String,
    key: Vec<u8>,
}

impl LogRecord {
    #[must_use]
    pub fn new(
        ref_name: Vec<u8>,
        update_index: u64,
        old_id: Vec<u8>,
        new_id: Vec<u8>,
        name: String,
        email: String,
        time_seconds: u64,
        tz_minutes: i16,
        message: String,
    ) -> Self {
        let key = build_key(&ref_name, update_index);
        Self {
            ref_name,
            update_index,
            old_id,
            new_id,
            name,
            email,
            time_seconds,
            tz_minutes,
            message,
            key,
        }
    }

    /// Returns a copy of this record with `message` substituted. The key is
    /// derived only from `ref_name` and `update_index`, so it carries over
    /// unchanged.
    #[must_use]
    pub(crate) fn with_message(&self, message: String) -> Self {
        Self {
            message,
            ..self.clone()
        }
    }
}

impl Record for LogRecord {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value_type(&self) -> u8 {
        0
    }

    fn encode_value(&self, _ctx: &RecordCtx) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.old_id);
        buf.extend_from_slice(&self.new_id);

        write_varint(&mut buf, self.name.len() as u64).expect("vec write cannot fail");
        buf.extend_from_slice(self.name.as_bytes());

        write_varint(&mut buf, self.email.len() as u64).expect("vec write cannot fail");
        buf.extend_from_slice(self.email.as_bytes());

        write_varint(&mut buf, self.time_seconds).expect("vec write cannot fail");
        buf.extend_from_slice(&self.tz_minutes.to_be_bytes());

        write_varint(&mut buf, self.message.len() as u64).expect("vec write cannot fail");
        buf.extend_from_slice(self.message.as_bytes());

        buf
    }
}

impl LogRecord {
    pub fn decode(key: &[u8], _value_type: u8, value: &[u8], ctx: &RecordCtx) -> crate::Result<Self> {
        let (ref_name, update_index) = split_key(key)?;

        let hash_size = ctx.hash_size;
        if value.len() < hash_size * 2 {
            return Err(crate::Error::Format("log record value truncated".into()));
        }
        let old_id = value[..hash_size].to_vec();
        let new_id = value[hash_size..hash_size * 2].to_vec();

        let mut cursor = Cursor::new(&value[hash_size * 2..]);

        let name_len = read_varint(&mut cursor)? as usize;
        let name = read_string(&mut cursor, name_len)?;

        let email_len = read_varint(&mut cursor)? as usize;
        let email = read_string(&mut cursor, email_len)?;

        let time_seconds = read_varint(&mut cursor)?;

        let mut tz_buf = [0u8; 2];
        std::io::Read::read_exact(&mut cursor, &mut tz_buf)?;
        let tz_minutes = i16::from_be_bytes(tz_buf);

        let message_len = read_varint(&mut cursor)? as usize;
        let message = read_string(&mut cursor, message_len)?;

        Ok(Self::new(
            ref_name.to_vec(),
            update_index,
            old_id,
            new_id,
            name,
            email,
            time_seconds,
            tz_minutes,
            message,
        ))
    }
}

fn read_string(cursor: &mut Cursor<&[u8]>, len: usize) -> crate::Result<String> {
    let start = cursor.position() as usize;
    let slice = cursor.get_ref();
    let bytes = slice
        .get(start..start + len)
        .ok_or_else(|| crate::Error::Format("log record string runs past end".into()))?;
    cursor.set_position((start + len) as u64);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| crate::Error::Format("log record string is not utf-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn ctx() -> RecordCtx {
        RecordCtx {
            hash_size: 20,
            min_update_index: 0,
        }
    }

    #[test]
    fn round_trips() {
        let rec = LogRecord::new(
            b"refs/heads/main".to_vec(),
            42,
            vec![0; 20],
            vec![1; 20],
            "Author".into(),
            "author@example.com".into(),
            1_700_000_000,
            -420,
            "commit: message\n".into(),
        );
        let ctx = ctx();
        let encoded = rec.encode_value(&ctx);
        let decoded = LogRecord::decode(rec.key(), rec.value_type(), &encoded, &ctx).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn newer_update_index_sorts_first() {
        let a = LogRecord::new(
            b"refs/heads/main".to_vec(),
            1,
            vec![0; 20],
            vec![1; 20],
            "A".into(),
            "a@x".into(),
            0,
            0,
            "m\n".into(),
        );
        let b = LogRecord::new(
            b"refs/heads/main".to_vec(),
            2,
            vec![0; 20],
            vec![1; 20],
            "A".into(),
            "a@x".into(),
            0,
            0,
            "m\n".into(),
        );
        assert!(b.key() < a.key());
    }
}
