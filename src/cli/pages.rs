use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{create_progress_bar, wprintln};
use crate::innodb::page::{FilHeader, Page};
use crate::innodb::tablespace::Tablespace;
use crate::IdbError;

/// Options for the pages subcommand.
pub struct PagesOptions {
    pub file: String,
    pub headers_only: bool,
    pub verify_checksums: bool,
    pub json: bool,
}

/// One line of the listing.
#[derive(Serialize)]
struct PageLine {
    page_number: u32,
    page_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prev_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page: Option<u32>,
    lsn: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    index_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    level: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<u16>,
}

impl PageLine {
    fn from_header(fil: &FilHeader) -> Self {
        PageLine {
            page_number: fil.page_number,
            page_type: fil.type_name(),
            prev_page: fil.prev(),
            next_page: fil.next(),
            lsn: fil.lsn,
            index_id: None,
            level: None,
            records: None,
        }
    }

    fn from_page(page: &Page) -> Self {
        let mut line = PageLine::from_header(&page.fil);
        if let Some(idx) = page.as_index() {
            line.index_id = Some(idx.index_id());
            line.level = Some(idx.level());
            line.records = Some(idx.n_recs());
        }
        line
    }
}

/// List every page of a tablespace.
///
/// By default each page is fully decoded, which stops at the first page
/// whose type the decoder does not support. `--headers-only` reads just the
/// FIL headers and therefore lists every page regardless of type.
pub fn execute(opts: &PagesOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let mut ts = Tablespace::open(&opts.file)?;
    ts.set_verify_checksums(opts.verify_checksums);

    let lines: Vec<PageLine> = if opts.headers_only {
        ts.read_all_page_headers()?
            .iter()
            .map(PageLine::from_header)
            .collect()
    } else {
        let pb = create_progress_bar(ts.page_count(), "pages");
        let mut lines = Vec::with_capacity(ts.page_count() as usize);
        for page_num in 0..ts.page_count() {
            pb.inc(1);
            match ts.decode_page(page_num) {
                Ok(page) => lines.push(PageLine::from_page(&page)),
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e);
                }
            }
        }
        pb.finish_and_clear();
        lines
    };

    if opts.json {
        let json = serde_json::to_string_pretty(&lines)
            .map_err(|e| IdbError::Parse(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
        return Ok(());
    }

    wprintln!(
        writer,
        "Pages in {} ({} pages):",
        opts.file,
        ts.page_count()
    )?;
    wprintln!(
        writer,
        "{}",
        format!(
            "{:>8}  {:<12} {:>10} {:>10} {:>14}  {}",
            "page", "type", "prev", "next", "lsn", "index"
        )
        .bold()
    )?;
    for line in &lines {
        let link = |p: Option<u32>| p.map_or_else(|| "-".to_string(), |n| n.to_string());
        let index = match (line.index_id, line.level, line.records) {
            (Some(id), Some(level), Some(n)) => {
                format!("id={} level={} records={}", id, level, n)
            }
            _ => String::new(),
        };
        let type_name = if line.index_id.is_some() {
            format!("{:<12}", line.page_type).green().to_string()
        } else {
            format!("{:<12}", line.page_type)
        };
        wprintln!(
            writer,
            "{:>8}  {} {:>10} {:>10} {:>14}  {}",
            line.page_number,
            type_name,
            link(line.prev_page),
            link(line.next_page),
            line.lsn,
            index
        )?;
    }

    let summary = summarize(&lines);
    wprintln!(writer)?;
    wprintln!(writer, "{}", "Page Type Summary".bold())?;
    for (name, count) in summary {
        let label = if count == 1 { "page" } else { "pages" };
        wprintln!(writer, "  {:20} {:>6} {}", name, count, label)?;
    }
    Ok(())
}

/// Page counts per type, most frequent first.
fn summarize(lines: &[PageLine]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for line in lines {
        match counts.iter_mut().find(|(name, _)| *name == line.page_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((line.page_type.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}
