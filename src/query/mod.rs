//! Row queries over the clustered and secondary B+trees.
//!
//! [`reader::TableReader`] is the entry point. The lower layers are public
//! for tools that need them directly:
//!
//! - [`compare`]: key ordering, search-key coercion and range operators
//! - [`btree`]: root-to-leaf descent and lazy leaf cursors
//! - [`catalog`]: index root discovery from INDEX page headers
//! - [`cache`]: single-flight memoization for point lookups

pub mod btree;
pub mod cache;
pub mod catalog;
pub mod compare;
pub mod reader;
