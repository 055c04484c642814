use std::io::Write;

use colored::Colorize;

use crate::cli::{open_reader, parse_key_values, wprintln, TableOptions};
use crate::IdbError;

/// Options for the get subcommand.
pub struct GetOptions {
    pub table: TableOptions,
    /// Comma separated primary key values.
    pub key: String,
    pub json: bool,
}

/// Look up a single row by its full primary key.
///
/// A missing row is not an error: JSON output prints `null`, text output a
/// short notice.
pub fn execute(opts: &GetOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let mut reader = open_reader(&opts.table)?;
    let key = parse_key_values(&opts.key)?;
    let row = reader.query_by_primary_key(&key)?;

    if opts.json {
        let json = serde_json::to_string_pretty(&row)
            .map_err(|e| IdbError::Parse(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
    } else {
        match &row {
            Some(row) => {
                let width = row.columns().iter().map(|c| c.len()).max().unwrap_or(0);
                for (name, value) in row.columns().iter().zip(row.values()) {
                    let shown = if value.is_null() {
                        "NULL".dimmed().to_string()
                    } else {
                        value.to_string()
                    };
                    wprintln!(writer, "{:>width$}: {}", name.bold(), shown, width = width)?;
                }
                wprintln!(writer, "(leaf page {})", row.page_number())?;
            }
            None => wprintln!(writer, "No row with key ({})", opts.key)?,
        }
    }
    reader.close();
    Ok(())
}
