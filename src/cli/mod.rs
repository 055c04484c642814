//! CLI subcommand implementations for the `ibdrow` binary.
//!
//! Argument parsing uses clap derive macros, with the top-level [`app::Cli`]
//! struct and [`app::Commands`] enum defined in [`app`] and shared between
//! `main.rs` and `build.rs` (for man page generation) via `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct holding
//! the parsed arguments and a `pub fn execute(opts, writer) -> Result<(), IdbError>`
//! entry point. The `writer: &mut dyn Write` parameter allows output to be
//! captured in tests or redirected to a file via the global `--output` flag.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `ibdrow pages` | [`pages`] | One line per page: type, links, LSN, index id and level |
//! | `ibdrow page` | [`page`] | Decode a single page, optionally with a hex dump |
//! | `ibdrow rows` | [`rows`] | Rows stored on one clustered leaf page |
//! | `ibdrow get` | [`get`] | Primary-key point lookup |
//! | `ibdrow range` | [`range`] | Forward or reverse primary-key range |
//! | `ibdrow index` | [`index`] | Secondary-key range resolved through the clustered index |
//! | `ibdrow sdi` | [`sdi`] | Dump SDI records or the table definition derived from them |
//!
//! Row commands need a table definition: a JSON file (`--table`) or the
//! tablespace's own SDI (`--sdi`). Key values on the command line are comma
//! separated; `NULL` is the SQL null and `0x…` is a binary literal.

use std::io::Write;

use indicatif::{ProgressBar, ProgressStyle};

use crate::innodb::field_decode::FieldValue;
use crate::innodb::sdi::read_sdi;
use crate::innodb::tablespace::Tablespace;
use crate::query::compare::RangeOp;
use crate::query::reader::{ReaderConfig, Row, TableReader};
use crate::schema::sdi::table_def_from_sdi;
use crate::schema::TableDef;
use crate::util::hex::parse_hex;
use crate::IdbError;

pub mod app;
pub mod get;
pub mod index;
pub mod page;
pub mod pages;
pub mod range;
pub mod rows;
pub mod sdi;

/// Write a line to the given writer, converting io::Error to IdbError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to IdbError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;

/// Settings every row command shares.
#[derive(Debug, Clone)]
pub struct TableOptions {
    pub file: String,
    /// JSON table definition; `None` means derive it from the SDI.
    pub table: Option<String>,
    pub config: ReaderConfig,
}

/// Load the table definition from a JSON file, or from the table SDI
/// record of the tablespace when no file is given.
pub fn load_table_def(file: &str, table: Option<&str>) -> Result<TableDef, IdbError> {
    match table {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| IdbError::Io(format!("Cannot read {}: {}", path, e)))?;
            serde_json::from_str(&json)
                .map_err(|e| IdbError::Argument(format!("Invalid table definition {}: {}", path, e)))
        }
        None => {
            let ts = Tablespace::open(file)?;
            let record = read_sdi(&ts)?
                .into_iter()
                .find(|r| r.sdi_type == 1)
                .ok_or_else(|| {
                    IdbError::Argument(format!(
                        "{} has no table SDI record; pass --table instead",
                        file
                    ))
                })?;
            table_def_from_sdi(&record.data)
        }
    }
}

/// Build and open a reader for the options' file and definition.
pub fn open_reader(opts: &TableOptions) -> Result<TableReader, IdbError> {
    let def = load_table_def(&opts.file, opts.table.as_deref())?;
    let mut reader = TableReader::new(&opts.file, def, opts.config.clone());
    reader.open()?;
    Ok(reader)
}

/// Split a comma separated key into values the reader coerces per column.
pub fn parse_key_values(s: &str) -> Result<Vec<FieldValue>, IdbError> {
    s.split(',')
        .map(str::trim)
        .map(|part| {
            if part.eq_ignore_ascii_case("null") {
                Ok(FieldValue::Null)
            } else if part.starts_with("0x") || part.starts_with("0X") {
                parse_hex(part).map(FieldValue::Bytes)
            } else {
                Ok(FieldValue::Str(part.to_string()))
            }
        })
        .collect()
}

/// Parsed lower and upper bounds of a range command.
pub struct ParsedBounds {
    pub lower: Option<Vec<FieldValue>>,
    pub lower_op: RangeOp,
    pub upper: Option<Vec<FieldValue>>,
    pub upper_op: RangeOp,
}

impl ParsedBounds {
    pub fn parse(
        gt: Option<&str>,
        gte: Option<&str>,
        lt: Option<&str>,
        lte: Option<&str>,
    ) -> Result<Self, IdbError> {
        let (lower, lower_op) = match (gt, gte) {
            (Some(_), Some(_)) => {
                return Err(IdbError::Argument("--gt and --gte are exclusive".to_string()))
            }
            (Some(v), None) => (Some(parse_key_values(v)?), RangeOp::Gt),
            (None, Some(v)) => (Some(parse_key_values(v)?), RangeOp::Gte),
            (None, None) => (None, RangeOp::Gte),
        };
        let (upper, upper_op) = match (lt, lte) {
            (Some(_), Some(_)) => {
                return Err(IdbError::Argument("--lt and --lte are exclusive".to_string()))
            }
            (Some(v), None) => (Some(parse_key_values(v)?), RangeOp::Lt),
            (None, Some(v)) => (Some(parse_key_values(v)?), RangeOp::Lte),
            (None, None) => (None, RangeOp::Lte),
        };
        Ok(ParsedBounds {
            lower,
            lower_op,
            upper,
            upper_op,
        })
    }
}

/// Stream rows to the writer as a JSON array or as tab separated text with a
/// header line. Stops after `limit` rows.
pub fn print_rows<I>(
    writer: &mut dyn Write,
    rows: I,
    json: bool,
    limit: Option<usize>,
) -> Result<usize, IdbError>
where
    I: Iterator<Item = Result<Row, IdbError>>,
{
    use colored::Colorize;

    let mut count = 0;
    let mut header_written = false;
    if json {
        wprint!(writer, "[")?;
    }
    for row in rows.take(limit.unwrap_or(usize::MAX)) {
        let row = row?;
        if json {
            let text = serde_json::to_string(&row)
                .map_err(|e| IdbError::Parse(format!("JSON serialization error: {}", e)))?;
            let sep = if count == 0 { "\n  " } else { ",\n  " };
            wprint!(writer, "{}{}", sep, text)?;
        } else {
            if !header_written {
                wprintln!(writer, "{}", row.columns().join("\t").bold())?;
                header_written = true;
            }
            let cells: Vec<String> = row
                .values()
                .iter()
                .map(|v| {
                    if v.is_null() {
                        "NULL".dimmed().to_string()
                    } else {
                        v.to_string()
                    }
                })
                .collect();
            if row.is_deleted() {
                wprintln!(writer, "{}\t{}", cells.join("\t"), "(deleted)".red())?;
            } else {
                wprintln!(writer, "{}", cells.join("\t"))?;
            }
        }
        count += 1;
    }
    if json {
        if count > 0 {
            wprintln!(writer)?;
        }
        wprintln!(writer, "]")?;
    } else {
        wprintln!(writer)?;
        let label = if count == 1 { "row" } else { "rows" };
        wprintln!(writer, "{} {}", count, label)?;
    }
    Ok(count)
}

/// Create a styled progress bar for iterating over pages.
pub fn create_progress_bar(count: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(count);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}})",
            unit
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}
