//! Space management pages: FSP header, extent descriptors, insert buffer
//! bitmap and file segment inodes.
//!
//! None of these pages hold rows, but a reader still decodes them so that
//! every page in the file maps to a typed structure and so that bulk page
//! listings can show allocation state.

use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::cursor::ByteCursor;
use crate::IdbError;

/// Parsed FSP header (from page 0 of a tablespace, starts at FIL_PAGE_DATA).
#[derive(Debug, Clone, Serialize)]
pub struct FspHeader {
    /// Space ID.
    pub space_id: u32,
    /// Size of the tablespace in pages.
    pub size: u32,
    /// Minimum page number not yet initialized.
    pub free_limit: u32,
    /// Space flags (page size, compression, encryption bits).
    pub flags: u32,
    /// Number of used pages in the FSP_FREE_FRAG list.
    pub frag_n_used: u32,
    /// Next unused segment id.
    pub next_seg_id: u64,
}

impl FspHeader {
    pub fn parse(page_data: &[u8]) -> Result<Self, IdbError> {
        let c = ByteCursor::new(page_data);
        let base = FIL_PAGE_DATA;
        Ok(FspHeader {
            space_id: c.u32_at(base + FSP_SPACE_ID)?,
            size: c.u32_at(base + FSP_SIZE)?,
            free_limit: c.u32_at(base + FSP_FREE_LIMIT)?,
            flags: c.u32_at(base + FSP_SPACE_FLAGS)?,
            frag_n_used: c.u32_at(base + FSP_FRAG_N_USED)?,
            next_seg_id: c.u64_at(base + FSP_SEG_ID)?,
        })
    }
}

/// Extent state stored in an XDES entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum XdesState {
    NotInited,
    Free,
    FreeFrag,
    FullFrag,
    Fseg,
    FsegFrag,
    Other(u32),
}

impl XdesState {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => XdesState::NotInited,
            1 => XdesState::Free,
            2 => XdesState::FreeFrag,
            3 => XdesState::FullFrag,
            4 => XdesState::Fseg,
            5 => XdesState::FsegFrag,
            n => XdesState::Other(n),
        }
    }
}

/// One extent descriptor (40 bytes) covering 64 pages.
#[derive(Debug, Clone, Serialize)]
pub struct XdesEntry {
    /// Owning segment id (0 when the extent is not in a segment).
    pub segment_id: u64,
    pub state: XdesState,
    /// Two bits per page: bit 0 = free, bit 1 = clean (unused).
    #[serde(skip)]
    pub bitmap: [u8; 16],
}

impl XdesEntry {
    fn parse(c: &ByteCursor<'_>, offset: usize) -> Result<Self, IdbError> {
        let mut bitmap = [0u8; 16];
        bitmap.copy_from_slice(c.bytes_at(offset + XDES_BITMAP, 16)?);
        Ok(XdesEntry {
            segment_id: c.u64_at(offset + XDES_ID)?,
            state: XdesState::from_u32(c.u32_at(offset + XDES_STATE)?),
            bitmap,
        })
    }

    /// True if page `i` (0..64) of this extent is free.
    pub fn is_page_free(&self, i: usize) -> bool {
        if i >= PAGES_PER_EXTENT {
            return false;
        }
        let bit = i * 2;
        self.bitmap[bit / 8] & (1 << (bit % 8)) != 0
    }

    pub fn free_pages(&self) -> usize {
        (0..PAGES_PER_EXTENT).filter(|&i| self.is_page_free(i)).count()
    }
}

/// Extent descriptors stored on an FSP_HDR or XDES page.
///
/// Entries still in the `NotInited` state are skipped.
pub fn parse_xdes_entries(page_data: &[u8]) -> Result<Vec<XdesEntry>, IdbError> {
    let c = ByteCursor::new(page_data);
    let mut out = Vec::new();
    for i in 0..XDES_PER_PAGE {
        let off = XDES_ARR_OFFSET + i * XDES_SIZE;
        if off + XDES_SIZE > FIL_PAGE_DATA_END {
            break;
        }
        let entry = XdesEntry::parse(&c, off)?;
        if entry.state == XdesState::NotInited {
            continue;
        }
        out.push(entry);
    }
    Ok(out)
}

/// Insert buffer bitmap page: 4 bits of state per page.
#[derive(Debug, Clone, Serialize)]
pub struct IbufBitmap {
    #[serde(skip)]
    bits: Vec<u8>,
}

impl IbufBitmap {
    pub fn parse(page_data: &[u8]) -> Result<Self, IdbError> {
        let c = ByteCursor::new(page_data);
        let len = SIZE_PAGE * IBUF_BITS_PER_PAGE / 8;
        let len = len.min(FIL_PAGE_DATA_END - IBUF_BITMAP);
        Ok(IbufBitmap {
            bits: c.bytes_at(IBUF_BITMAP, len)?.to_vec(),
        })
    }

    /// The 4-bit entry for the page at `offset` within the bitmap's range.
    ///
    /// Bits 0-1 hold the free-space class, bit 2 the buffered flag and
    /// bit 3 the ibuf flag.
    pub fn entry(&self, offset: usize) -> Option<u8> {
        let byte = self.bits.get(offset / 2)?;
        Some(if offset % 2 == 0 { byte & 0x0F } else { byte >> 4 })
    }

    pub fn free_space_class(&self, offset: usize) -> Option<u8> {
        self.entry(offset).map(|e| e & 0x03)
    }

    /// Number of pages with buffered changes pending.
    pub fn buffered_count(&self) -> usize {
        (0..self.bits.len() * 2)
            .filter(|&i| self.entry(i).is_some_and(|e| e & 0x04 != 0))
            .count()
    }
}

/// A file segment inode (192 bytes).
#[derive(Debug, Clone, Serialize)]
pub struct InodeEntry {
    pub segment_id: u64,
    pub not_full_n_used: u32,
    pub free_extents: u32,
    pub not_full_extents: u32,
    pub full_extents: u32,
    /// Individually allocated pages (FIL_NULL slots removed).
    pub frag_pages: Vec<u32>,
}

/// Inode page: list node plus up to 85 inode slots.
#[derive(Debug, Clone, Serialize)]
pub struct InodePage {
    pub prev_page: u32,
    pub next_page: u32,
    /// Slots with a non-zero segment id.
    pub entries: Vec<InodeEntry>,
}

impl InodePage {
    pub fn parse(page_data: &[u8]) -> Result<Self, IdbError> {
        let c = ByteCursor::new(page_data);
        // list node: prev (page 4, offset 2), next (page 4, offset 2)
        let prev_page = c.u32_at(FSEG_INODE_PAGE_NODE)?;
        let next_page = c.u32_at(FSEG_INODE_PAGE_NODE + 6)?;

        let mut entries = Vec::new();
        for i in 0..FSEG_INODES_PER_PAGE {
            let off = FSEG_ARR_OFFSET + i * FSEG_INODE_SIZE;
            if off + FSEG_INODE_SIZE > FIL_PAGE_DATA_END {
                break;
            }
            let segment_id = c.u64_at(off + FSEG_ID)?;
            if segment_id == 0 {
                continue;
            }
            let magic = c.u32_at(off + FSEG_MAGIC_N)?;
            if magic != FSEG_MAGIC_N_VALUE {
                return Err(IdbError::Parse(format!(
                    "inode slot {} has bad magic {} (expected {})",
                    i, magic, FSEG_MAGIC_N_VALUE
                )));
            }
            let mut frag_pages = Vec::new();
            for s in 0..FSEG_FRAG_SLOTS {
                let p = c.u32_at(off + FSEG_FRAG_ARR + s * 4)?;
                if p != FIL_NULL {
                    frag_pages.push(p);
                }
            }
            entries.push(InodeEntry {
                segment_id,
                not_full_n_used: c.u32_at(off + FSEG_NOT_FULL_N_USED)?,
                free_extents: c.u32_at(off + FSEG_FREE + FLST_LEN)?,
                not_full_extents: c.u32_at(off + FSEG_NOT_FULL + FLST_LEN)?,
                full_extents: c.u32_at(off + FSEG_FULL + FLST_LEN)?,
                frag_pages,
            });
        }

        Ok(InodePage {
            prev_page,
            next_page,
            entries,
        })
    }
}
