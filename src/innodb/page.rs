//! InnoDB page header, trailer and per-kind page decoding.
//!
//! Every InnoDB page begins with a 38-byte FIL header ([`FilHeader`]) containing
//! the checksum, page number, prev/next pointers, LSN, page type, flush LSN, and
//! space ID. The last 8 bytes form the FIL trailer ([`FilTrailer`]) with the
//! old-style checksum and low 32 bits of the LSN.
//!
//! [`Page::decode`] reads both and dispatches on the page type tag to the
//! matching [`PageBody`] variant. The set of kinds is closed; an unknown tag
//! is an [`IdbError::UnsupportedPageType`].

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::cursor::ByteCursor;
use crate::innodb::fsp::{parse_xdes_entries, FspHeader, IbufBitmap, InodePage, XdesEntry};
use crate::innodb::index::IndexPage;
use crate::innodb::lob::BlobPage;
use crate::innodb::page_types::{tag_name, PageType};
use crate::IdbError;

/// Parsed FIL header (38 bytes, present at the start of every InnoDB page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilHeader {
    /// Checksum (or space id in older formats). Bytes 0-3.
    pub checksum: u32,
    /// Page number within the tablespace. Bytes 4-7.
    pub page_number: u32,
    /// Previous page in the doubly-linked list. Bytes 8-11.
    /// FIL_NULL (0xFFFFFFFF) if not used.
    pub prev_page: u32,
    /// Next page in the doubly-linked list. Bytes 12-15.
    /// FIL_NULL (0xFFFFFFFF) if not used.
    pub next_page: u32,
    /// LSN of newest modification to this page. Bytes 16-23.
    pub lsn: u64,
    /// Raw page type tag. Bytes 24-25.
    pub page_type: u16,
    /// Flush LSN (only meaningful for page 0 of system tablespace). Bytes 26-33.
    pub flush_lsn: u64,
    /// Space ID this page belongs to. Bytes 34-37.
    pub space_id: u32,
}

impl FilHeader {
    /// Parse a FIL header from a byte slice of at least 38 bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < SIZE_FIL_HEAD {
            return None;
        }

        Some(FilHeader {
            checksum: BigEndian::read_u32(&data[FIL_PAGE_SPACE_OR_CHKSUM..]),
            page_number: BigEndian::read_u32(&data[FIL_PAGE_OFFSET..]),
            prev_page: BigEndian::read_u32(&data[FIL_PAGE_PREV..]),
            next_page: BigEndian::read_u32(&data[FIL_PAGE_NEXT..]),
            lsn: BigEndian::read_u64(&data[FIL_PAGE_LSN..]),
            page_type: BigEndian::read_u16(&data[FIL_PAGE_TYPE..]),
            flush_lsn: BigEndian::read_u64(&data[FIL_PAGE_FILE_FLUSH_LSN..]),
            space_id: BigEndian::read_u32(&data[FIL_PAGE_SPACE_ID..]),
        })
    }

    /// Supported page kind, or `None` for tags outside the decoder set.
    pub fn kind(&self) -> Option<PageType> {
        PageType::from_u16(self.page_type)
    }

    /// Display name of the page type, including unsupported tags.
    pub fn type_name(&self) -> String {
        tag_name(self.page_type)
    }

    /// Returns true if prev_page points at a sibling.
    pub fn has_prev(&self) -> bool {
        self.prev_page != FIL_NULL
    }

    /// Returns true if next_page points at a sibling.
    pub fn has_next(&self) -> bool {
        self.next_page != FIL_NULL
    }

    pub fn prev(&self) -> Option<u32> {
        self.has_prev().then_some(self.prev_page)
    }

    pub fn next(&self) -> Option<u32> {
        self.has_next().then_some(self.next_page)
    }
}

/// Parsed FIL trailer (8 bytes, present at the end of every InnoDB page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilTrailer {
    /// Old-style checksum. Bytes 0-3 of trailer.
    pub checksum: u32,
    /// Low 32 bits of the LSN. Bytes 4-7 of trailer.
    pub lsn_low32: u32,
}

impl FilTrailer {
    /// Parse a FIL trailer from the last 8 bytes of `data`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < SIZE_FIL_TRAILER {
            return None;
        }
        let t = &data[data.len() - SIZE_FIL_TRAILER..];
        Some(FilTrailer {
            checksum: BigEndian::read_u32(&t[0..]),
            lsn_low32: BigEndian::read_u32(&t[4..]),
        })
    }
}

/// Kind-specific contents of a decoded page.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "body")]
pub enum PageBody {
    Allocated,
    FspHdr {
        header: FspHeader,
        extents: Vec<XdesEntry>,
    },
    Xdes {
        extents: Vec<XdesEntry>,
    },
    IbufBitmap(IbufBitmap),
    Inode(InodePage),
    Index(IndexPage),
    Sdi(IndexPage),
    Blob(BlobPage),
}

/// A fully decoded page.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub fil: FilHeader,
    pub trailer: FilTrailer,
    pub body: PageBody,
}

impl Page {
    /// Decode a full page buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibdrow::innodb::page::{Page, PageBody};
    /// use ibdrow::innodb::constants::*;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0u8; SIZE_PAGE];
    /// BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], 4);
    /// BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], FIL_NULL);
    /// BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], FIL_NULL);
    ///
    /// let decoded = Page::decode(&page).unwrap();
    /// assert_eq!(decoded.fil.page_number, 4);
    /// assert!(matches!(decoded.body, PageBody::Allocated));
    ///
    /// // Undo log pages are not decoded
    /// BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], 2);
    /// assert!(Page::decode(&page).is_err());
    /// ```
    pub fn decode(data: &[u8]) -> Result<Self, IdbError> {
        if data.len() != SIZE_PAGE {
            return Err(IdbError::Parse(format!(
                "page buffer is {} bytes, expected {}",
                data.len(),
                SIZE_PAGE
            )));
        }
        let fil = FilHeader::parse(data)
            .ok_or_else(|| IdbError::Parse("page too short for FIL header".to_string()))?;
        let trailer = FilTrailer::parse(data)
            .ok_or_else(|| IdbError::Parse("page too short for FIL trailer".to_string()))?;

        let kind = fil.kind().ok_or(IdbError::UnsupportedPageType {
            page: fil.page_number,
            tag: fil.page_type,
        })?;

        let body = match kind {
            PageType::Allocated => PageBody::Allocated,
            PageType::FspHdr => PageBody::FspHdr {
                header: FspHeader::parse(data)?,
                extents: parse_xdes_entries(data)?,
            },
            PageType::Xdes => PageBody::Xdes {
                extents: parse_xdes_entries(data)?,
            },
            PageType::IbufBitmap => PageBody::IbufBitmap(IbufBitmap::parse(data)?),
            PageType::Inode => PageBody::Inode(InodePage::parse(data)?),
            PageType::Index => PageBody::Index(IndexPage::parse(data)?),
            PageType::Sdi => PageBody::Sdi(IndexPage::parse(data)?),
            PageType::Blob => PageBody::Blob(BlobPage::parse(data)?),
        };

        Ok(Page { fil, trailer, body })
    }

    pub fn page_type(&self) -> PageType {
        match &self.body {
            PageBody::Allocated => PageType::Allocated,
            PageBody::FspHdr { .. } => PageType::FspHdr,
            PageBody::Xdes { .. } => PageType::Xdes,
            PageBody::IbufBitmap(_) => PageType::IbufBitmap,
            PageBody::Inode(_) => PageType::Inode,
            PageBody::Index(_) => PageType::Index,
            PageBody::Sdi(_) => PageType::Sdi,
            PageBody::Blob(_) => PageType::Blob,
        }
    }

    /// B+tree node structures for INDEX and SDI pages.
    pub fn as_index(&self) -> Option<&IndexPage> {
        match &self.body {
            PageBody::Index(idx) | PageBody::Sdi(idx) => Some(idx),
            _ => None,
        }
    }
}

/// Decode the FIL header and require an INDEX page, returning its structures.
///
/// Used by the query engine, which must never treat another page kind as a
/// tree node.
pub fn expect_index_page(data: &[u8], page_no: u32) -> Result<(FilHeader, IndexPage), IdbError> {
    let fil = FilHeader::parse(data)
        .ok_or_else(|| IdbError::Parse(format!("page {} too short for FIL header", page_no)))?;
    match fil.kind() {
        Some(PageType::Index) => {}
        Some(other) => {
            return Err(IdbError::Parse(format!(
                "page {} is a {} page, expected INDEX",
                page_no, other
            )))
        }
        None => {
            return Err(IdbError::UnsupportedPageType {
                page: page_no,
                tag: fil.page_type,
            })
        }
    }
    let index = IndexPage::parse(data)?;
    Ok((fil, index))
}

/// Read just the 38-byte header from the start of a buffer.
pub fn parse_header_bytes(data: &[u8]) -> Result<FilHeader, IdbError> {
    let c = ByteCursor::new(data);
    c.bytes_at(0, SIZE_FIL_HEAD)?;
    FilHeader::parse(data)
        .ok_or_else(|| IdbError::Parse("buffer too short for FIL header".to_string()))
}
