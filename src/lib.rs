// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A block-structured, append-only reftable implementation.
//!
//! ##### About
//!
//! A **reftable** stores a sorted, potentially large set of references
//! (name → object-id bindings), their peeled values, and a reflog, in a
//! single immutable file. A reference database is a **stack** of reftables
//! covering disjoint `update_index` ranges; readers present a unified
//! sorted view of the whole stack via a k-way merge that lets the newest
//! table shadow older ones.
//!
//! This crate implements the format itself: the block layer, the four
//! record shapes, single-table reading and writing, and the merged reader
//! over a stack. It does not implement a ref-store API, lock-file
//! orchestration, or a compaction policy for the surrounding stack manager
//! — those are collaborators built on top of this engine.
//!
//! # Example usage
//!
//! ```
//! use reftable::config::Config;
//! use reftable::record::{RefRecord, RefValue};
//! use reftable::table::{Reader, Writer};
//! use reftable::source::MemoryBlockSource;
//!
//! let config = Config::new(1, 1);
//! let mut writer = Writer::new(Vec::new(), config)?;
//!
//! writer.add_ref(&RefRecord {
//!     ref_name: b"refs/heads/main".to_vec(),
//!     update_index: 1,
//!     value: RefValue::Value(vec![0xab; 20]),
//! })?;
//!
//! let bytes = writer.finish()?;
//!
//! let reader = Reader::new(MemoryBlockSource::new(bytes))?;
//! let found = reader.seek_ref(b"refs/heads/main")?.expect("present");
//! assert_eq!(found.value, RefValue::Value(vec![0xab; 20]));
//! #
//! # Ok::<(), reftable::Error>(())
//! ```

#![doc(html_logo_url = "https://raw.githubusercontent.com/fjall-rs/reftable/main/logo.png")]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/fjall-rs/reftable/main/logo.png")]
#![deny(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

pub mod binary_search;
pub mod block;
pub mod checksum;
pub mod coding;
pub mod config;
mod error;
pub mod file;
pub mod hash_id;
pub mod merge;
pub mod record;
mod slice;
pub mod source;
pub mod table;

pub use error::{Error, Result};
pub use merge::{MergedReader, Stack};
pub use slice::Slice;
pub use table::{Reader, Writer};
