use std::io::Write;

use crate::cli::{open_reader, print_rows, ParsedBounds, TableOptions};
use crate::query::reader::KeySelector;
use crate::IdbError;

/// Options for the index subcommand.
pub struct IndexOptions {
    pub table: TableOptions,
    /// Key name, or a position among the secondary keys.
    pub index: String,
    pub gt: Option<String>,
    pub gte: Option<String>,
    pub lt: Option<String>,
    pub lte: Option<String>,
    pub reverse: bool,
    pub columns: Vec<String>,
    pub limit: Option<usize>,
    pub root_page: Option<u32>,
    pub json: bool,
}

/// Stream rows in secondary key order between the given bounds.
///
/// When the requested columns are all stored in the secondary index the
/// clustered index is never read; otherwise each row costs one primary-key
/// lookup, which is reported at debug level.
pub fn execute(opts: &IndexOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let mut reader = open_reader(&opts.table)?;
    let bounds = ParsedBounds::parse(
        opts.gt.as_deref(),
        opts.gte.as_deref(),
        opts.lt.as_deref(),
        opts.lte.as_deref(),
    )?;
    let selector = match opts.index.parse::<usize>() {
        Ok(n) => KeySelector::Ordinal(n),
        Err(_) => KeySelector::Name(&opts.index),
    };
    let columns: Vec<&str> = opts.columns.iter().map(String::as_str).collect();
    let projection = (!columns.is_empty()).then_some(columns.as_slice());

    let count = {
        let rows = if opts.reverse {
            reader.reverse_query_by_secondary_key(
                selector,
                bounds.lower.as_deref(),
                bounds.lower_op,
                bounds.upper.as_deref(),
                bounds.upper_op,
                None,
                projection,
                opts.root_page,
            )?
        } else {
            reader.query_by_secondary_key(
                selector,
                bounds.lower.as_deref(),
                bounds.lower_op,
                bounds.upper.as_deref(),
                bounds.upper_op,
                None,
                projection,
                opts.root_page,
            )?
        };
        print_rows(writer, rows, opts.json, opts.limit)?
    };
    tracing::debug!(
        rows = count,
        clustered_lookups = reader.stats().clustered_lookups(),
        "index scan finished"
    );
    reader.close();
    Ok(())
}
