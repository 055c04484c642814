//! Serialized Dictionary Information (SDI) extraction.
//!
//! MySQL 8.0+ tablespaces carry their own data dictionary entry as zlib
//! compressed JSON in a small B+tree of SDI pages (page type 17853). Page 0
//! records the root of that tree right after its extent descriptor array.
//!
//! Each SDI leaf record is laid out like a clustered index record:
//!
//! ```text
//! [length entry][5-byte header] origin:
//!   type (4) | id (8) | DB_TRX_ID (6) | DB_ROLL_PTR (7)
//!   uncompressed_len (4) | compressed_len (4) | zlib data (variable, may be external)
//! ```

use std::io::Read;

use flate2::read::ZlibDecoder;
use serde::Serialize;
use tracing::debug;

use crate::innodb::constants::*;
use crate::innodb::cursor::ByteCursor;
use crate::innodb::index::IndexHeader;
use crate::innodb::lob::read_external;
use crate::innodb::page::FilHeader;
use crate::innodb::page_types::PageType;
use crate::innodb::record::{walk_records, RecordType};
use crate::innodb::tablespace::{PageSource, Tablespace};
use crate::IdbError;

/// An extracted SDI record.
#[derive(Debug, Clone, Serialize)]
pub struct SdiRecord {
    /// SDI type (1 = table, 2 = tablespace).
    pub sdi_type: u32,
    pub sdi_id: u64,
    pub uncompressed_len: u32,
    pub compressed_len: u32,
    /// Decompressed JSON document.
    #[serde(skip)]
    pub data: String,
}

const SDI_KEY_LEN: usize = 12; // type + id
const SDI_UNCOMP_LEN_OFFSET: usize = SDI_KEY_LEN + DATA_TRX_ID_LEN + DATA_ROLL_PTR_LEN; // 25
const SDI_COMP_LEN_OFFSET: usize = SDI_UNCOMP_LEN_OFFSET + 4; // 29
const SDI_DATA_OFFSET: usize = SDI_COMP_LEN_OFFSET + 4; // 33

/// SDI version marker and root page follow the extent descriptors on page 0.
const SDI_HEADER_OFFSET: usize = XDES_ARR_OFFSET + XDES_PER_PAGE * XDES_SIZE; // 10390
const SDI_VERSION: u32 = 1;

pub fn sdi_type_name(sdi_type: u32) -> &'static str {
    match sdi_type {
        1 => "Table",
        2 => "Tablespace",
        _ => "Unknown",
    }
}

/// Check if a page is an SDI page.
pub fn is_sdi_page(page_data: &[u8]) -> bool {
    FilHeader::parse(page_data).is_some_and(|h| h.kind() == Some(PageType::Sdi))
}

/// Extract the SDI records of one SDI leaf page.
///
/// Non-leaf SDI pages yield nothing. Data stored off-page is reassembled
/// from `source`.
pub fn extract_sdi_from_page<S: PageSource + ?Sized>(
    page_data: &[u8],
    source: &S,
) -> Result<Vec<SdiRecord>, IdbError> {
    if !is_sdi_page(page_data) {
        return Err(IdbError::Parse("not an SDI page".to_string()));
    }
    if !IndexHeader::parse(page_data)?.is_leaf() {
        return Ok(Vec::new());
    }

    walk_records(page_data)?
        .iter()
        .filter(|rec| rec.header.rec_type == RecordType::Ordinary && !rec.header.deleted)
        .map(|rec| parse_sdi_record(page_data, rec.offset, source))
        .collect()
}

fn parse_sdi_record<S: PageSource + ?Sized>(
    page_data: &[u8],
    origin: usize,
    source: &S,
) -> Result<SdiRecord, IdbError> {
    let c = ByteCursor::new(page_data);
    let sdi_type = c.u32_at(origin)?;
    let sdi_id = c.u64_at(origin + 4)?;
    let uncompressed_len = c.u32_at(origin + SDI_UNCOMP_LEN_OFFSET)?;
    let compressed_len = c.u32_at(origin + SDI_COMP_LEN_OFFSET)?;

    // The data column is the only variable-length field and is never NULL,
    // so its length entry sits right before the record header.
    let len_pos = origin - REC_N_NEW_EXTRA_BYTES - 1;
    let b1 = c.u8_at(len_pos)?;
    let (local_len, external) = if b1 & VARLEN_TWO_BYTE_FLAG != 0 {
        let b2 = c.u8_at(len_pos - 1)?;
        ((((b1 & 0x3F) as usize) << 8) | b2 as usize, b1 & VARLEN_EXTERN_FLAG != 0)
    } else {
        (b1 as usize, false)
    };
    let local = c.bytes_at(origin + SDI_DATA_OFFSET, local_len)?;
    let compressed = if external {
        read_external(source, local)?
    } else {
        local.to_vec()
    };
    if compressed.len() != compressed_len as usize {
        return Err(IdbError::Parse(format!(
            "SDI record {}:{} holds {} compressed bytes, header says {}",
            sdi_type,
            sdi_id,
            compressed.len(),
            compressed_len
        )));
    }

    let data = decompress_sdi_data(&compressed)?;
    if data.len() != uncompressed_len as usize {
        debug!(
            sdi_id,
            expected = uncompressed_len,
            actual = data.len(),
            "SDI length differs from header"
        );
    }
    Ok(SdiRecord {
        sdi_type,
        sdi_id,
        uncompressed_len,
        compressed_len,
        data,
    })
}

fn decompress_sdi_data(compressed: &[u8]) -> Result<String, IdbError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .map_err(|e| IdbError::Parse(format!("SDI data does not inflate: {}", e)))?;
    Ok(out)
}

/// Read the SDI root page number from page 0.
///
/// Returns `None` when the version marker is missing or the page number is
/// outside the tablespace.
pub fn read_sdi_root_page(page0: &[u8], page_count: u64) -> Option<u32> {
    let c = ByteCursor::new(page0);
    if c.u32_at(SDI_HEADER_OFFSET).ok()? != SDI_VERSION {
        return None;
    }
    let root = c.u32_at(SDI_HEADER_OFFSET + 4).ok()?;
    (root != 0 && (root as u64) < page_count).then_some(root)
}

/// Find the SDI leaf pages of a tablespace, in chain order.
///
/// Descends from the root recorded on page 0 to the leftmost leaf and follows
/// the next links. Without a usable root every SDI leaf page found by a scan
/// is returned instead.
pub fn find_sdi_pages(ts: &Tablespace) -> Result<Vec<u32>, IdbError> {
    let page0 = ts.read_page(0)?;
    if let Some(root) = read_sdi_root_page(&page0, ts.page_count()) {
        if let Some(leftmost) = leftmost_sdi_leaf(ts, root)? {
            let mut pages = vec![leftmost];
            let mut next = ts.read_page_header(leftmost as u64)?.next();
            while let Some(n) = next {
                if pages.contains(&n) || pages.len() as u64 > ts.page_count() {
                    return Err(IdbError::Parse(format!(
                        "SDI leaf chain loops at page {}",
                        n
                    )));
                }
                pages.push(n);
                next = ts.read_page_header(n as u64)?.next();
            }
            return Ok(pages);
        }
    }

    debug!("SDI root not found on page 0, scanning");
    let mut pages = Vec::new();
    ts.for_each_page(|n, data| {
        if is_sdi_page(data) && IndexHeader::parse(data)?.is_leaf() {
            pages.push(n as u32);
        }
        Ok(())
    })?;
    Ok(pages)
}

fn leftmost_sdi_leaf(ts: &Tablespace, root: u32) -> Result<Option<u32>, IdbError> {
    let mut page_no = root;
    for _ in 0..=ts.page_count() {
        let data = ts.read_page(page_no as u64)?;
        if !is_sdi_page(&data) {
            return Ok(None);
        }
        if IndexHeader::parse(&data)?.is_leaf() {
            return Ok(Some(page_no));
        }
        // SDI node pointers: 12-byte key, then the child page number
        let first = walk_records(&data)?
            .into_iter()
            .next()
            .ok_or_else(|| IdbError::Parse(format!("SDI node page {} is empty", page_no)))?;
        page_no = ByteCursor::new(&data).u32_at(first.offset + SDI_KEY_LEN)?;
    }
    Err(IdbError::Parse("SDI tree deeper than the tablespace".to_string()))
}

/// Extract every SDI record of a tablespace.
pub fn read_sdi(ts: &Tablespace) -> Result<Vec<SdiRecord>, IdbError> {
    let mut records = Vec::new();
    for page_no in find_sdi_pages(ts)? {
        let data = ts.read_page(page_no as u64)?;
        records.extend(extract_sdi_from_page(&data, ts)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    #[test]
    fn test_sdi_type_name() {
        assert_eq!(sdi_type_name(1), "Table");
        assert_eq!(sdi_type_name(2), "Tablespace");
        assert_eq!(sdi_type_name(99), "Unknown");
    }

    #[test]
    fn test_decompress_sdi_data() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let original = r#"{"dd_object_type": "Table", "dd_object": {"name": "test"}}"#;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(decompress_sdi_data(&compressed).unwrap(), original);
        assert!(decompress_sdi_data(b"not zlib").is_err());
    }

    #[test]
    fn test_is_sdi_page() {
        let page = vec![0u8; 256];
        assert!(!is_sdi_page(&page));

        let mut page = vec![0u8; 256];
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], 17853);
        assert!(is_sdi_page(&page));
    }

    #[test]
    fn test_sdi_header_offset() {
        assert_eq!(SDI_HEADER_OFFSET, 10390);
    }

    #[test]
    fn test_read_sdi_root_page() {
        let mut page0 = vec![0u8; SIZE_PAGE];
        BigEndian::write_u32(&mut page0[SDI_HEADER_OFFSET..], 1);
        BigEndian::write_u32(&mut page0[SDI_HEADER_OFFSET + 4..], 3);
        assert_eq!(read_sdi_root_page(&page0, 100), Some(3));

        BigEndian::write_u32(&mut page0[SDI_HEADER_OFFSET..], 0);
        assert_eq!(read_sdi_root_page(&page0, 100), None);

        BigEndian::write_u32(&mut page0[SDI_HEADER_OFFSET..], 1);
        BigEndian::write_u32(&mut page0[SDI_HEADER_OFFSET + 4..], 200);
        assert_eq!(read_sdi_root_page(&page0, 100), None);
    }
}
