//! Externally stored (overflow) column values.
//!
//! When a column value does not fit on its INDEX page, the record keeps a
//! local prefix followed by a 20-byte [`ExternRef`] and the rest of the value
//! lives on a chain of BLOB pages (page type 10). Each BLOB page carries an
//! 8-byte [`BlobPageHeader`] with the number of payload bytes on that page and
//! the next page in the chain.

use serde::Serialize;
use tracing::debug;

use crate::innodb::constants::*;
use crate::innodb::cursor::ByteCursor;
use crate::innodb::page::FilHeader;
use crate::innodb::page_types::PageType;
use crate::innodb::tablespace::PageSource;
use crate::IdbError;

/// Parsed old-style BLOB page header.
#[derive(Debug, Clone, Serialize)]
pub struct BlobPageHeader {
    /// Number of data bytes stored on this page.
    pub part_len: u32,
    /// Page number of the next BLOB page (FIL_NULL if last).
    pub next_page_no: u32,
}

impl BlobPageHeader {
    /// Parse a BLOB page header from a full page buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibdrow::innodb::lob::BlobPageHeader;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0u8; 48];
    /// BigEndian::write_u32(&mut page[38..], 16000);
    /// BigEndian::write_u32(&mut page[42..], 7);
    ///
    /// let hdr = BlobPageHeader::parse(&page).unwrap();
    /// assert_eq!(hdr.part_len, 16000);
    /// assert_eq!(hdr.next_page_no, 7);
    /// assert!(hdr.has_next());
    ///
    /// BigEndian::write_u32(&mut page[42..], 0xFFFFFFFF);
    /// assert!(!BlobPageHeader::parse(&page).unwrap().has_next());
    /// ```
    pub fn parse(page_data: &[u8]) -> Result<Self, IdbError> {
        let c = ByteCursor::new(page_data);
        Ok(BlobPageHeader {
            part_len: c.u32_at(FIL_PAGE_DATA + BTR_BLOB_HDR_PART_LEN)?,
            next_page_no: c.u32_at(FIL_PAGE_DATA + BTR_BLOB_HDR_NEXT_PAGE_NO)?,
        })
    }

    /// Returns true if there is a next page in the chain.
    pub fn has_next(&self) -> bool {
        self.next_page_no != FIL_NULL
    }
}

/// A decoded BLOB page: header plus the payload bytes it carries.
#[derive(Debug, Clone, Serialize)]
pub struct BlobPage {
    pub header: BlobPageHeader,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl BlobPage {
    pub fn parse(page_data: &[u8]) -> Result<Self, IdbError> {
        let header = BlobPageHeader::parse(page_data)?;
        let start = FIL_PAGE_DATA + BTR_BLOB_HDR_SIZE;
        let max = FIL_PAGE_DATA_END.saturating_sub(start);
        if header.part_len as usize > max {
            return Err(IdbError::Parse(format!(
                "BLOB page claims {} payload bytes, at most {} fit",
                header.part_len, max
            )));
        }
        let payload = ByteCursor::new(page_data)
            .bytes_at(start, header.part_len as usize)?
            .to_vec();
        Ok(BlobPage { header, payload })
    }
}

/// The 20-byte reference that ends an externally stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExternRef {
    pub space_id: u32,
    pub page_no: u32,
    pub offset: u32,
    /// Bytes stored off-page (low 32 bits of the 8-byte length).
    pub length: u32,
}

impl ExternRef {
    pub fn parse(data: &[u8]) -> Result<Self, IdbError> {
        let c = ByteCursor::new(data);
        c.bytes_at(0, BTR_EXTERN_FIELD_REF_SIZE)?;
        let raw_len = c.u64_at(BTR_EXTERN_LEN)?;
        Ok(ExternRef {
            space_id: c.u32_at(BTR_EXTERN_SPACE_ID)?,
            page_no: c.u32_at(BTR_EXTERN_PAGE_NO)?,
            offset: c.u32_at(BTR_EXTERN_OFFSET)?,
            length: (raw_len & 0xFFFF_FFFF) as u32,
        })
    }
}

/// Reassemble an externally stored value.
///
/// `field` is the on-page portion: the local prefix followed by the 20-byte
/// reference. The chain is followed until the reference's length is
/// satisfied; a chain that ends early or passes through a non-BLOB page is a
/// parse error.
pub fn read_external<S: PageSource + ?Sized>(source: &S, field: &[u8]) -> Result<Vec<u8>, IdbError> {
    if field.len() < BTR_EXTERN_FIELD_REF_SIZE {
        return Err(IdbError::Parse(format!(
            "externally stored field is {} bytes, shorter than its {}-byte reference",
            field.len(),
            BTR_EXTERN_FIELD_REF_SIZE
        )));
    }
    let (prefix, ref_bytes) = field.split_at(field.len() - BTR_EXTERN_FIELD_REF_SIZE);
    let ext = ExternRef::parse(ref_bytes)?;

    let mut out = Vec::with_capacity(prefix.len() + ext.length as usize);
    out.extend_from_slice(prefix);

    let mut remaining = ext.length as usize;
    let mut page_no = ext.page_no;
    let mut hops = 0u32;
    while remaining > 0 {
        if page_no == FIL_NULL {
            return Err(IdbError::Parse(format!(
                "BLOB chain ended with {} of {} bytes missing",
                remaining, ext.length
            )));
        }
        hops += 1;
        if hops as u64 > source.page_count() {
            return Err(IdbError::Parse(format!(
                "BLOB chain starting at page {} loops",
                ext.page_no
            )));
        }

        let data = source.load_page(page_no)?;
        let fil = FilHeader::parse(&data)
            .ok_or_else(|| IdbError::Parse(format!("BLOB page {} too short", page_no)))?;
        if fil.kind() != Some(PageType::Blob) {
            return Err(IdbError::Parse(format!(
                "BLOB chain reached page {} of type {}",
                page_no,
                fil.type_name()
            )));
        }
        let blob = BlobPage::parse(&data)?;
        let take = remaining.min(blob.payload.len());
        out.extend_from_slice(&blob.payload[..take]);
        remaining -= take;
        debug!(page = page_no, bytes = take, remaining, "followed BLOB page");

        if remaining > 0 && blob.payload.is_empty() {
            return Err(IdbError::Parse(format!(
                "BLOB page {} carries no payload",
                page_no
            )));
        }
        page_no = blob.header.next_page_no;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};
    use std::collections::HashMap;

    struct MemPages(HashMap<u32, Vec<u8>>);

    impl PageSource for MemPages {
        fn load_page(&self, page_no: u32) -> Result<Vec<u8>, IdbError> {
            self.0
                .get(&page_no)
                .cloned()
                .ok_or(IdbError::PageOutOfRange {
                    page: page_no as u64,
                    count: 16,
                })
        }

        fn page_count(&self) -> u64 {
            16
        }
    }

    fn blob_page(page_no: u32, payload: &[u8], next: u32) -> Vec<u8> {
        let mut page = vec![0u8; SIZE_PAGE];
        BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], page_no);
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], 10);
        BigEndian::write_u32(&mut page[FIL_PAGE_DATA..], payload.len() as u32);
        BigEndian::write_u32(&mut page[FIL_PAGE_DATA + 4..], next);
        let start = FIL_PAGE_DATA + BTR_BLOB_HDR_SIZE;
        page[start..start + payload.len()].copy_from_slice(payload);
        page
    }

    fn field(prefix: &[u8], first_page: u32, len: u32) -> Vec<u8> {
        let mut f = prefix.to_vec();
        let mut r = [0u8; 20];
        BigEndian::write_u32(&mut r[0..], 1);
        BigEndian::write_u32(&mut r[4..], first_page);
        BigEndian::write_u32(&mut r[8..], FIL_PAGE_DATA as u32);
        BigEndian::write_u64(&mut r[12..], len as u64);
        f.extend_from_slice(&r);
        f
    }

    #[test]
    fn test_two_page_chain() {
        let mut pages = HashMap::new();
        pages.insert(5, blob_page(5, b"hello ", 6));
        pages.insert(6, blob_page(6, b"world", FIL_NULL));
        let src = MemPages(pages);

        let value = read_external(&src, &field(b"say: ", 5, 11)).unwrap();
        assert_eq!(value, b"say: hello world");
    }

    #[test]
    fn test_truncated_chain_fails() {
        let mut pages = HashMap::new();
        pages.insert(5, blob_page(5, b"short", FIL_NULL));
        let src = MemPages(pages);
        assert!(matches!(
            read_external(&src, &field(b"", 5, 50)),
            Err(IdbError::Parse(_))
        ));
    }

    #[test]
    fn test_non_blob_page_fails() {
        let mut pages = HashMap::new();
        let mut page = blob_page(5, b"abc", FIL_NULL);
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], 17855);
        pages.insert(5, page);
        let src = MemPages(pages);
        assert!(read_external(&src, &field(b"", 5, 3)).is_err());
    }

    #[test]
    fn test_self_loop_detected() {
        let mut pages = HashMap::new();
        pages.insert(5, blob_page(5, b"ab", 5));
        let src = MemPages(pages);
        assert!(read_external(&src, &field(b"", 5, 1000)).is_err());
    }

    #[test]
    fn test_short_reference_fails() {
        let src = MemPages(HashMap::new());
        assert!(read_external(&src, &[0u8; 10]).is_err());
    }
}
