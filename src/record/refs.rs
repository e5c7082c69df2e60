// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Record, RecordCtx};
use crate::coding::{read_varint, write_varint};
use std::io::Cursor;

const VALUE_TYPE_DELETION: u8 = 0;
const VALUE_TYPE_VALUE: u8 = 1;
const VALUE_TYPE_PEELED: u8 = 2;
const VALUE_TYPE_SYMREF: u8 = 3;

/// What a ref record's value slot holds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RefValue {
    /// A tombstone: the ref no longer exists as of `update_index`.
    Deletion,

    /// A direct binding to an object-id.
    Value(Vec<u8>),

    /// An annotated tag, stored with the peeled (dereferenced) object-id.
    ValuePeeled { target: Vec<u8>, peeled: Vec<u8> },

    /// A symbolic ref pointing at another ref by name.
    Symref(String),
}

/// `(ref_name, update_index, value)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RefRecord {
    pub ref_name: Vec<u8>,
    pub update_index: u64,
    pub value: RefValue,
}

impl Record for RefRecord {
    fn key(&self) -> &[u8] {
        &self.ref_name
    }

    fn value_type(&self) -> u8 {
        match &self.value {
            RefValue::Deletion => VALUE_TYPE_DELETION,
            RefValue::Value(_) => VALUE_TYPE_VALUE,
            RefValue::ValuePeeled { .. } => VALUE_TYPE_PEELED,
            RefValue::Symref(_) => VALUE_TYPE_SYMREF,
        }
    }

    fn is_deletion(&self) -> bool {
        matches!(self.value, RefValue::Deletion)
    }

    fn encode_value(&self, ctx: &RecordCtx) -> Vec<u8> {
        let mut buf = Vec::new();
        let delta = self.update_index.saturating_sub(ctx.min_update_index);
        write_varint(&mut buf, delta).expect("vec write cannot fail");

        match &self.value {
            RefValue::Deletion => {}
            RefValue::Value(oid) => buf.extend_from_slice(oid),
            RefValue::ValuePeeled { target, peeled } => {
                buf.extend_from_slice(target);
                buf.extend_from_slice(peeled);
            }
            RefValue::Symref(target) => {
                write_varint(&mut buf, target.len() as u64).expect("vec write cannot fail");
                buf.extend_from_slice(target.as_bytes());
            }
        }

        buf
    }
}

impl RefRecord {
    pub fn decode(
        key: &[u8],
        value_type: u8,
        value: &[u8],
        ctx: &RecordCtx,
    ) -> crate::Result<Self> {
        let mut cursor = Cursor::new(value);
        let delta = read_varint(&mut cursor)?;
        let update_index = ctx.min_update_index + delta;

        let consumed = cursor.position() as usize;
        let rest = &value[consumed..];

        let value = match value_type {
            VALUE_TYPE_DELETION => RefValue::Deletion,
            VALUE_TYPE_VALUE => {
                if rest.len() != ctx.hash_size {
                    return Err(crate::Error::Format(
                        "ref record value has wrong object-id length".into(),
                    ));
                }
                RefValue::Value(rest.to_vec())
            }
            VALUE_TYPE_PEELED => {
                if rest.len() != ctx.hash_size * 2 {
                    return Err(crate::Error::Format(
                        "peeled ref record has wrong object-id length".into(),
                    ));
                }
                RefValue::ValuePeeled {
                    target: rest[..ctx.hash_size].to_vec(),
                    peeled: rest[ctx.hash_size..].to_vec(),
                }
            }
            VALUE_TYPE_SYMREF => {
                let mut cursor = Cursor::new(rest);
                let len = read_varint(&mut cursor)? as usize;
                let consumed = cursor.position() as usize;
                let bytes = rest.get(consumed..consumed + len).ok_or_else(|| {
                    crate::Error::Format("symref target runs past record end".into())
                })?;
                let target = String::from_utf8(bytes.to_vec())
                    .map_err(|_| crate::Error::Format("symref target is not utf-8".into()))?;
                RefValue::Symref(target)
            }
            other => {
                return Err(crate::Error::Format(format!(
                    "unknown ref value type {other}"
                )))
            }
        };

        Ok(Self {
            ref_name: key.to_vec(),
            update_index,
            value,
        })
    }
}

/// Whether `record`'s value is (or peels to) `oid`. Deletions and symrefs
/// never match, since they carry no object-id.
#[must_use]
pub(crate) fn ref_matches_oid(record: &RefRecord, oid: &[u8]) -> bool {
    match &record.value {
        RefValue::Value(target) => target == oid,
        RefValue::ValuePeeled { target, peeled } => target == oid || peeled == oid,
        RefValue::Deletion | RefValue::Symref(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn ctx() -> RecordCtx {
        RecordCtx {
            hash_size: 20,
            min_update_index: 5,
        }
    }

    #[test]
    fn round_trips_value() {
        let rec = RefRecord {
            ref_name: b"refs/heads/main".to_vec(),
            update_index: 9,
            value: RefValue::Value(vec![0xab; 20]),
        };
        let ctx = ctx();
        let encoded = rec.encode_value(&ctx);
        let decoded = RefRecord::decode(&rec.ref_name, rec.value_type(), &encoded, &ctx).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn round_trips_peeled() {
        let rec = RefRecord {
            ref_name: b"refs/tags/v1".to_vec(),
            update_index: 6,
            value: RefValue::ValuePeeled {
                target: vec![1; 20],
                peeled: vec![2; 20],
            },
        };
        let ctx = ctx();
        let encoded = rec.encode_value(&ctx);
        let decoded = RefRecord::decode(&rec.ref_name, rec.value_type(), &encoded, &ctx).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn round_trips_symref() {
        let rec = RefRecord {
            ref_name: b"HEAD".to_vec(),
            update_index: 5,
            value: RefValue::Symref("refs/heads/main".to_string()),
        };
        let ctx = ctx();
        let encoded = rec.encode_value(&ctx);
        let decoded = RefRecord::decode(&rec.ref_name, rec.value_type(), &encoded, &ctx).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn round_trips_deletion() {
        let rec = RefRecord {
            ref_name: b"refs/heads/gone".to_vec(),
            update_index: 7,
            value: RefValue::Deletion,
        };
        let ctx = ctx();
        assert!(rec.is_deletion());
        let encoded = rec.encode_value(&ctx);
        let decoded = RefRecord::decode(&rec.ref_name, rec.value_type(), &encoded, &ctx).unwrap();
        assert_eq!(decoded, rec);
    }
}
