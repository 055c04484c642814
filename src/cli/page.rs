use std::io::Write;

use colored::Colorize;

use crate::cli::wprintln;
use crate::innodb::page::{Page, PageBody};
use crate::innodb::tablespace::Tablespace;
use crate::util::hex::hex_dump;
use crate::IdbError;

/// Options for the page subcommand.
pub struct PageOptions {
    pub file: String,
    pub page: u64,
    pub hex: bool,
    pub verify_checksums: bool,
    pub json: bool,
}

/// Decode one page and print its header and kind-specific contents.
pub fn execute(opts: &PageOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let mut ts = Tablespace::open(&opts.file)?;
    ts.set_verify_checksums(opts.verify_checksums);
    let page = ts.decode_page(opts.page)?;

    if opts.json {
        let json = serde_json::to_string_pretty(&page)
            .map_err(|e| IdbError::Parse(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
        return Ok(());
    }

    print_header(writer, &page)?;
    wprintln!(writer)?;
    print_body(writer, &page.body)?;

    if opts.hex {
        let raw = ts.read_page(opts.page)?;
        wprintln!(writer)?;
        wprintln!(writer, "{}", "Raw bytes".bold())?;
        wprintln!(writer, "{}", hex_dump(&raw, opts.page * raw.len() as u64))?;
    }
    Ok(())
}

fn print_header(writer: &mut dyn Write, page: &Page) -> Result<(), IdbError> {
    let fil = &page.fil;
    let link = |p: Option<u32>| p.map_or_else(|| "None".to_string(), |n| n.to_string());
    wprintln!(
        writer,
        "{}",
        format!("Page {} ({})", fil.page_number, page.page_type().description()).bold()
    )?;
    wprintln!(writer, "  Type:      {}", page.page_type())?;
    wprintln!(writer, "  Checksum:  0x{:08x}", fil.checksum)?;
    wprintln!(writer, "  Space ID:  {}", fil.space_id)?;
    wprintln!(writer, "  Prev page: {}", link(fil.prev()))?;
    wprintln!(writer, "  Next page: {}", link(fil.next()))?;
    wprintln!(writer, "  LSN:       {}", fil.lsn)?;
    let lsn_ok = (fil.lsn & 0xFFFF_FFFF) as u32 == page.trailer.lsn_low32;
    let status = if lsn_ok {
        "consistent".green()
    } else {
        "MISMATCH".red()
    };
    wprintln!(
        writer,
        "  Trailer:   checksum 0x{:08x}, lsn low32 {} ({})",
        page.trailer.checksum,
        page.trailer.lsn_low32,
        status
    )?;
    Ok(())
}

fn print_body(writer: &mut dyn Write, body: &PageBody) -> Result<(), IdbError> {
    match body {
        PageBody::Allocated => wprintln!(writer, "Freshly allocated page, no contents.")?,
        PageBody::FspHdr { header, extents } => {
            wprintln!(writer, "{}", "FSP Header".bold())?;
            wprintln!(writer, "  Space ID:        {}", header.space_id)?;
            wprintln!(writer, "  Size (pages):    {}", header.size)?;
            wprintln!(writer, "  Free limit:      {}", header.free_limit)?;
            wprintln!(writer, "  Flags:           0x{:08x}", header.flags)?;
            wprintln!(writer, "  Frag pages used: {}", header.frag_n_used)?;
            wprintln!(writer, "  Next segment ID: {}", header.next_seg_id)?;
            print_extents(writer, extents)?;
        }
        PageBody::Xdes { extents } => print_extents(writer, extents)?,
        PageBody::IbufBitmap(bitmap) => {
            wprintln!(writer, "{}", "Insert Buffer Bitmap".bold())?;
            wprintln!(
                writer,
                "  Pages with buffered changes: {}",
                bitmap.buffered_count()
            )?;
        }
        PageBody::Inode(inode) => {
            wprintln!(writer, "{}", "File Segment Inodes".bold())?;
            for e in &inode.entries {
                wprintln!(
                    writer,
                    "  seg {:>6}  frag pages {:>2}  extents free/not-full/full {}/{}/{}",
                    e.segment_id,
                    e.frag_pages.len(),
                    e.free_extents,
                    e.not_full_extents,
                    e.full_extents
                )?;
            }
        }
        PageBody::Index(idx) | PageBody::Sdi(idx) => {
            let h = &idx.header;
            let kind = if matches!(body, PageBody::Sdi(_)) {
                "SDI Index Header"
            } else {
                "Index Header"
            };
            wprintln!(writer, "{}", kind.bold())?;
            wprintln!(writer, "  Index ID:   {}", h.index_id)?;
            wprintln!(
                writer,
                "  Level:      {}{}",
                h.level,
                if h.is_leaf() { " (leaf)" } else { "" }
            )?;
            wprintln!(writer, "  Records:    {}", h.n_recs)?;
            wprintln!(writer, "  Heap size:  {}", h.n_heap())?;
            wprintln!(writer, "  Heap top:   {}", h.heap_top)?;
            wprintln!(writer, "  Garbage:    {}", h.garbage)?;
            wprintln!(writer, "  Direction:  {} ({})", h.direction_name(), h.n_direction)?;
            wprintln!(writer, "  Max trx ID: {}", h.max_trx_id)?;
            let slots: Vec<String> = idx.dir_slots.iter().map(|s| s.to_string()).collect();
            wprintln!(writer, "  Directory:  [{}]", slots.join(", "))?;
        }
        PageBody::Blob(blob) => {
            wprintln!(writer, "{}", "BLOB Page".bold())?;
            wprintln!(writer, "  Part length: {}", blob.header.part_len)?;
            let next = blob.header.next_page_no;
            if next == crate::innodb::constants::FIL_NULL {
                wprintln!(writer, "  Next page:   None")?;
            } else {
                wprintln!(writer, "  Next page:   {}", next)?;
            }
        }
    }
    Ok(())
}

fn print_extents(
    writer: &mut dyn Write,
    extents: &[crate::innodb::fsp::XdesEntry],
) -> Result<(), IdbError> {
    wprintln!(writer, "{}", "Extent Descriptors".bold())?;
    for (i, e) in extents.iter().enumerate() {
        wprintln!(
            writer,
            "  #{:<3} {:<10} segment {:>6}  free pages {:>2}",
            i,
            format!("{:?}", e.state),
            e.segment_id,
            e.free_pages()
        )?;
    }
    Ok(())
}
