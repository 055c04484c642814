use std::io::Write;

use crate::cli::{open_reader, print_rows, TableOptions};
use crate::IdbError;

/// Options for the rows subcommand.
pub struct RowsOptions {
    pub table: TableOptions,
    pub page: u32,
    pub json: bool,
}

/// Print the rows stored on one clustered-index leaf page, in page order.
pub fn execute(opts: &RowsOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let mut reader = open_reader(&opts.table)?;
    let rows = reader.query_by_page_number(opts.page)?;
    print_rows(writer, rows.into_iter().map(Ok), opts.json, None)?;
    reader.close();
    Ok(())
}
