//! InnoDB binary format parsing.
//!
//! Types and functions for reading the on-disk structures of an InnoDB
//! tablespace: page headers and trailers, the typed page bodies, compact
//! index records, column encodings, overflow (BLOB) chains, checksums and
//! the embedded SDI dictionary.
//!
//! Start with [`tablespace::Tablespace`] to open a `.ibd` file, then use
//! [`page::Page::decode`] to inspect individual pages.

pub mod checksum;
pub mod constants;
pub mod cursor;
pub mod field_decode;
pub mod fsp;
pub mod index;
pub mod lob;
pub mod page;
pub mod page_types;
pub mod record;
pub mod sdi;
pub mod tablespace;
