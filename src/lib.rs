//! Offline InnoDB table reader.
//!
//! The `innodb-rowreader` crate (library name `ibdrow`) reads a table's
//! `.ibd` file straight from disk, without a running server, and turns the
//! clustered and secondary B+trees back into logical rows. The caller
//! supplies the table definition, either as JSON or by letting the crate
//! derive it from the tablespace's own SDI (MySQL 8.0+).
//!
//! # CLI Reference
//!
//! ```text
//! cargo install innodb-rowreader
//! ```
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `ibdrow pages` | List every page with its FIL header and decoded kind |
//! | `ibdrow page`  | Decode a single page and summarize its contents |
//! | `ibdrow rows`  | Print the rows stored on one leaf page |
//! | `ibdrow get`   | Primary-key point lookup |
//! | `ibdrow range` | Forward or reverse primary-key range scan |
//! | `ibdrow index` | Secondary-key range scan with clustered resolution |
//! | `ibdrow sdi`   | Dump SDI JSON or the table definition derived from it |
//!
//! All subcommands accept `--color <auto|always|never>`, `--output <file>`,
//! `--tz <offset|zone>`, `--verify-checksums`
//! and `-v` (debug logging to stderr).
//!
//! # Library API
//!
//! ```no_run
//! use ibdrow::query::reader::{ReaderConfig, TableReader};
//! use ibdrow::query::compare::RangeOp;
//! use ibdrow::schema::TableDef;
//! use ibdrow::innodb::field_decode::FieldValue;
//!
//! let def: TableDef = serde_json::from_str(&std::fs::read_to_string("t.json").unwrap()).unwrap();
//! let mut reader = TableReader::new("t.ibd", def, ReaderConfig::default());
//! reader.open().unwrap();
//!
//! if let Some(row) = reader.query_by_primary_key(&[FieldValue::Int(42)]).unwrap() {
//!     println!("{}", serde_json::to_string(&row).unwrap());
//! }
//!
//! let rows = reader
//!     .range_query_by_primary_key(
//!         Some(&[FieldValue::Int(10)]),
//!         RangeOp::Gte,
//!         Some(&[FieldValue::Int(20)]),
//!         RangeOp::Lt,
//!         None,
//!         None,
//!     )
//!     .unwrap();
//! for row in rows {
//!     println!("{:?}", row.unwrap().values());
//! }
//! reader.close();
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`innodb::cursor`] | Bounds-checked big-endian byte cursor |
//! | [`innodb::tablespace`] | File access, page loading, bulk enumeration |
//! | [`innodb::page`] | FIL header/trailer and the per-kind [`Page`](innodb::page::Page) decoder |
//! | [`innodb::index`] | INDEX page header, FSEG headers, page directory |
//! | [`innodb::record`] | Compact record walk and row/node-pointer decoding |
//! | [`innodb::field_decode`] | Column codecs producing [`FieldValue`](innodb::field_decode::FieldValue) |
//! | [`innodb::lob`] | Externally stored column reassembly |
//! | [`innodb::sdi`] | SDI record extraction |
//! | [`innodb::checksum`] | CRC-32C and legacy InnoDB checksums |
//! | [`schema`] | Table definitions, key metadata, charsets |
//! | [`query`] | Key comparison, B+tree descent, iterators, the reader facade |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | Builds the `ibdrow` binary (clap, colored, indicatif, tracing-subscriber). |

#[cfg(feature = "cli")]
pub mod cli;
pub mod innodb;
pub mod query;
pub mod schema;
pub mod util;

use thiserror::Error;

/// Errors returned by `ibdrow` operations.
///
/// The enum is `Clone` so a failed lookup can be handed to every caller
/// waiting on the same cache slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdbError {
    /// An I/O error occurred (file open, read, seek, or write failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// The bytes on disk are structurally inconsistent.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid argument was supplied (bad key, unknown index, bad option).
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The page type tag is outside the set of pages this crate decodes.
    #[error("Unsupported page type {tag} on page {page}")]
    UnsupportedPageType { page: u32, tag: u16 },

    /// An explicit page number lies past the end of the file.
    #[error("Page {page} out of range (tablespace has {count} pages)")]
    PageOutOfRange { page: u64, count: u64 },

    /// A read ran past the end of a buffer.
    #[error("Read of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    /// Stored and calculated checksums disagree (only with verification on).
    #[error("Checksum mismatch on page {page}: stored 0x{stored:08X}, calculated 0x{calculated:08X}")]
    Checksum {
        page: u64,
        stored: u32,
        calculated: u32,
    },

    /// The reader was used outside its open/close lifecycle.
    #[error("Invalid reader state: {0}")]
    State(String),
}
