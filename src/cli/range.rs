use std::io::Write;

use crate::cli::{open_reader, print_rows, ParsedBounds, TableOptions};
use crate::IdbError;

/// Options for the range subcommand.
pub struct RangeOptions {
    pub table: TableOptions,
    pub gt: Option<String>,
    pub gte: Option<String>,
    pub lt: Option<String>,
    pub lte: Option<String>,
    pub reverse: bool,
    pub columns: Vec<String>,
    pub limit: Option<usize>,
    pub json: bool,
}

/// Stream rows in primary key order (or reverse order) between the given
/// bounds. Rows are read one leaf page at a time, so `--limit` stops the
/// scan early.
pub fn execute(opts: &RangeOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let mut reader = open_reader(&opts.table)?;
    let bounds = ParsedBounds::parse(
        opts.gt.as_deref(),
        opts.gte.as_deref(),
        opts.lt.as_deref(),
        opts.lte.as_deref(),
    )?;
    let columns: Vec<&str> = opts.columns.iter().map(String::as_str).collect();
    let projection = (!columns.is_empty()).then_some(columns.as_slice());

    let count = {
        let rows = if opts.reverse {
            reader.reverse_range_query_by_primary_key(
                bounds.lower.as_deref(),
                bounds.lower_op,
                bounds.upper.as_deref(),
                bounds.upper_op,
                None,
                projection,
            )?
        } else {
            reader.range_query_by_primary_key(
                bounds.lower.as_deref(),
                bounds.lower_op,
                bounds.upper.as_deref(),
                bounds.upper_op,
                None,
                projection,
            )?
        };
        print_rows(writer, rows, opts.json, opts.limit)?
    };
    tracing::debug!(rows = count, "range finished");
    reader.close();
    Ok(())
}
