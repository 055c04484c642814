//! Shared utilities.

pub mod hex;
