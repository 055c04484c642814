//! INDEX page internal structure parsing.
//!
//! INDEX pages (page type 17855 / `FIL_PAGE_INDEX`) are the B+Tree nodes that
//! store table data and secondary index entries. Each INDEX page contains a
//! 36-byte [`IndexHeader`] at `FIL_PAGE_DATA` (byte 38), followed by two
//! 10-byte FSEG inode pointers ([`FsegHeader`]) for the leaf and non-leaf
//! segments, the infimum/supremum system records, the user record heap and,
//! growing down from the trailer, the page directory.
//!
//! [`IndexPage::parse`] decodes the fixed structures; walking the record
//! list is left to [`crate::innodb::record`].

use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::cursor::ByteCursor;
use crate::IdbError;

/// Parsed INDEX page header (36 bytes, at FIL_PAGE_DATA offset within an INDEX page).
#[derive(Debug, Clone, Serialize)]
pub struct IndexHeader {
    /// Number of directory slots in the page directory.
    pub n_dir_slots: u16,
    /// Pointer to record heap top.
    pub heap_top: u16,
    /// Number of records in the heap. Bit 15 is the compact format flag.
    pub n_heap_raw: u16,
    /// Pointer to start of free record list (0 if none).
    pub free: u16,
    /// Number of bytes in deleted records (garbage).
    pub garbage: u16,
    /// Pointer to the last inserted record (0 if reset).
    pub last_insert: u16,
    /// Last insert direction.
    pub direction: u16,
    /// Number of consecutive inserts in the same direction.
    pub n_direction: u16,
    /// Number of user records on the page.
    pub n_recs: u16,
    /// Highest trx id that may have modified a record (secondary indexes only).
    pub max_trx_id: u64,
    /// Level in the B+Tree (0 = leaf).
    pub level: u16,
    /// Index ID where the page belongs.
    pub index_id: u64,
}

impl IndexHeader {
    /// Parse an INDEX page header from a full page buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibdrow::innodb::index::IndexHeader;
    /// use ibdrow::innodb::constants::*;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0u8; 256];
    /// let base = FIL_PAGE_DATA;
    /// BigEndian::write_u16(&mut page[base + PAGE_N_DIR_SLOTS..], 4);
    /// BigEndian::write_u16(&mut page[base + PAGE_N_HEAP..], 0x8003); // compact + 3 records
    /// BigEndian::write_u16(&mut page[base + PAGE_N_RECS..], 1);
    /// BigEndian::write_u64(&mut page[base + PAGE_INDEX_ID..], 100);
    ///
    /// let hdr = IndexHeader::parse(&page).unwrap();
    /// assert_eq!(hdr.n_dir_slots, 4);
    /// assert!(hdr.is_compact());
    /// assert_eq!(hdr.n_heap(), 3);
    /// assert!(hdr.is_leaf());
    /// assert_eq!(hdr.index_id, 100);
    /// ```
    pub fn parse(page_data: &[u8]) -> Result<Self, IdbError> {
        let c = ByteCursor::new(page_data);
        let base = PAGE_HEADER;
        Ok(IndexHeader {
            n_dir_slots: c.u16_at(base + PAGE_N_DIR_SLOTS)?,
            heap_top: c.u16_at(base + PAGE_HEAP_TOP)?,
            n_heap_raw: c.u16_at(base + PAGE_N_HEAP)?,
            free: c.u16_at(base + PAGE_FREE)?,
            garbage: c.u16_at(base + PAGE_GARBAGE)?,
            last_insert: c.u16_at(base + PAGE_LAST_INSERT)?,
            direction: c.u16_at(base + PAGE_DIRECTION)?,
            n_direction: c.u16_at(base + PAGE_N_DIRECTION)?,
            n_recs: c.u16_at(base + PAGE_N_RECS)?,
            max_trx_id: c.u64_at(base + PAGE_MAX_TRX_ID)?,
            level: c.u16_at(base + PAGE_LEVEL)?,
            index_id: c.u64_at(base + PAGE_INDEX_ID)?,
        })
    }

    /// Returns the actual number of records in the heap (masking out the compact flag).
    pub fn n_heap(&self) -> u16 {
        self.n_heap_raw & 0x7FFF
    }

    /// Returns true if this page uses the new compact row format.
    pub fn is_compact(&self) -> bool {
        (self.n_heap_raw & 0x8000) != 0
    }

    pub fn direction_name(&self) -> &'static str {
        match self.direction {
            PAGE_LEFT => "Left",
            PAGE_RIGHT => "Right",
            PAGE_SAME_REC => "Same Record",
            PAGE_SAME_PAGE => "Same Page",
            PAGE_NO_DIRECTION => "No Direction",
            _ => "Unknown",
        }
    }

    /// Returns true if this is a leaf-level page.
    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }
}

/// FSEG (File Segment) header pointer (10 bytes each).
///
/// There are two FSEG headers per INDEX page: one for the leaf segment
/// and one for the non-leaf (internal) segment. Only the root page of an
/// index fills them in.
#[derive(Debug, Clone, Serialize)]
pub struct FsegHeader {
    /// Space ID of the inode.
    pub space_id: u32,
    /// Page number of the inode.
    pub page_no: u32,
    /// Byte offset of the inode within the page.
    pub offset: u16,
}

impl FsegHeader {
    /// Parse an FSEG header at an absolute offset of the page buffer.
    pub fn parse_at(page_data: &[u8], offset: usize) -> Result<Self, IdbError> {
        let c = ByteCursor::new(page_data);
        Ok(FsegHeader {
            space_id: c.u32_at(offset)?,
            page_no: c.u32_at(offset + 4)?,
            offset: c.u16_at(offset + 8)?,
        })
    }

    /// Leaf FSEG header, at FIL_PAGE_DATA + 36.
    pub fn parse_leaf(page_data: &[u8]) -> Result<Self, IdbError> {
        Self::parse_at(page_data, PAGE_HEADER + PAGE_BTR_SEG_LEAF)
    }

    /// Non-leaf FSEG header, at FIL_PAGE_DATA + 46.
    pub fn parse_internal(page_data: &[u8]) -> Result<Self, IdbError> {
        Self::parse_at(page_data, PAGE_HEADER + PAGE_BTR_SEG_TOP)
    }

    /// True when the header points at an inode (root pages only).
    pub fn is_set(&self) -> bool {
        self.page_no != 0 && self.page_no != FIL_NULL
    }
}

/// Decoded INDEX page structures (everything except the record list).
#[derive(Debug, Clone, Serialize)]
pub struct IndexPage {
    pub header: IndexHeader,
    pub leaf_segment: FsegHeader,
    pub top_segment: FsegHeader,
    /// Page directory slots, first slot (owning the infimum) first.
    pub dir_slots: Vec<u16>,
}

impl IndexPage {
    /// Parse the INDEX header, segment headers and page directory.
    ///
    /// Fails on redundant (old-style) pages and when the infimum/supremum
    /// markers are not where the compact format puts them.
    pub fn parse(page_data: &[u8]) -> Result<Self, IdbError> {
        let header = IndexHeader::parse(page_data)?;
        if !header.is_compact() {
            return Err(IdbError::Parse(
                "INDEX page uses the redundant row format; only compact pages are supported"
                    .to_string(),
            ));
        }

        let c = ByteCursor::new(page_data);
        if c.bytes_at(PAGE_NEW_INFIMUM, 7)? != b"infimum" {
            return Err(IdbError::Parse(
                "INDEX page is missing the infimum record".to_string(),
            ));
        }
        if c.bytes_at(PAGE_NEW_SUPREMUM, 8)? != b"supremum" {
            return Err(IdbError::Parse(
                "INDEX page is missing the supremum record".to_string(),
            ));
        }

        let n_slots = header.n_dir_slots as usize;
        let dir_end = page_data.len().min(PAGE_DIR);
        if n_slots * PAGE_DIR_SLOT_SIZE > dir_end.saturating_sub(PAGE_NEW_SUPREMUM_END) {
            return Err(IdbError::Parse(format!(
                "INDEX page directory of {} slots does not fit in the page",
                n_slots
            )));
        }
        let mut dir_slots = Vec::with_capacity(n_slots);
        for i in 0..n_slots {
            dir_slots.push(c.u16_at(dir_end - (i + 1) * PAGE_DIR_SLOT_SIZE)?);
        }

        Ok(IndexPage {
            leaf_segment: FsegHeader::parse_leaf(page_data)?,
            top_segment: FsegHeader::parse_internal(page_data)?,
            header,
            dir_slots,
        })
    }

    pub fn level(&self) -> u16 {
        self.header.level
    }

    pub fn is_leaf(&self) -> bool {
        self.header.is_leaf()
    }

    pub fn index_id(&self) -> u64 {
        self.header.index_id
    }

    pub fn n_recs(&self) -> u16 {
        self.header.n_recs
    }
}
