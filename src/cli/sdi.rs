use std::io::Write;

use colored::Colorize;

use crate::cli::wprintln;
use crate::innodb::sdi::{self, read_sdi};
use crate::innodb::tablespace::Tablespace;
use crate::schema::sdi::table_def_from_sdi;
use crate::IdbError;

pub struct SdiOptions {
    pub file: String,
    pub table_def: bool,
    pub pretty: bool,
    pub verify_checksums: bool,
}

/// Print every SDI record of a tablespace, or with `--table-def` the table
/// definition derived from the table record in the JSON form `--table`
/// accepts.
pub fn execute(opts: &SdiOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let mut ts = Tablespace::open(&opts.file)?;
    ts.set_verify_checksums(opts.verify_checksums);

    let records = read_sdi(&ts)?;
    if records.is_empty() {
        wprintln!(writer, "No SDI records found in {}.", opts.file)?;
        wprintln!(writer, "SDI is only available in MySQL 8.0+ tablespaces.")?;
        return Ok(());
    }

    if opts.table_def {
        let rec = records
            .iter()
            .find(|r| r.sdi_type == 1)
            .ok_or_else(|| IdbError::Argument(format!("{} has no table SDI record", opts.file)))?;
        let def = table_def_from_sdi(&rec.data)?;
        let json = serde_json::to_string_pretty(&def)
            .map_err(|e| IdbError::Parse(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
        return Ok(());
    }

    for rec in &records {
        wprintln!(
            writer,
            "{}",
            format!(
                "=== SDI Record: type={} ({}), id={}",
                rec.sdi_type,
                sdi::sdi_type_name(rec.sdi_type),
                rec.sdi_id
            )
            .bold()
        )?;
        wprintln!(
            writer,
            "Compressed: {} bytes, Uncompressed: {} bytes",
            rec.compressed_len,
            rec.uncompressed_len
        )?;
        if opts.pretty {
            match serde_json::from_str::<serde_json::Value>(&rec.data) {
                Ok(json) => {
                    let text = serde_json::to_string_pretty(&json)
                        .map_err(|e| IdbError::Parse(format!("JSON serialization error: {}", e)))?;
                    wprintln!(writer, "{}", text)?;
                }
                Err(_) => wprintln!(writer, "{}", rec.data)?,
            }
        } else {
            wprintln!(writer, "{}", rec.data)?;
        }
        wprintln!(writer)?;
    }
    wprintln!(writer, "Total SDI records: {}", records.len())?;
    Ok(())
}
