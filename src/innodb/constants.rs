/// InnoDB page and file structure constants.
///
/// Offsets follow the MySQL/InnoDB headers:
/// - fil0fil.h (FIL header/trailer)
/// - page0page.h (index page header)
/// - fsp0fsp.h (FSP header, extent descriptors, inodes)
/// - rem0rec.h (compact record header)
// Page size (the reader only handles uncompressed 16K tablespaces)
pub const SIZE_PAGE: usize = 16384;
pub const SIZE_PAGE_U64: u64 = SIZE_PAGE as u64;

// FIL Header (38 bytes total)
pub const SIZE_FIL_HEAD: usize = 38;
pub const FIL_PAGE_SPACE_OR_CHKSUM: usize = 0; // 4 bytes - checksum or space id
pub const FIL_PAGE_OFFSET: usize = 4; // 4 bytes - page number
pub const FIL_PAGE_PREV: usize = 8; // 4 bytes - previous page
pub const FIL_PAGE_NEXT: usize = 12; // 4 bytes - next page
pub const FIL_PAGE_LSN: usize = 16; // 8 bytes - LSN of newest modification
pub const FIL_PAGE_TYPE: usize = 24; // 2 bytes - page type
pub const FIL_PAGE_FILE_FLUSH_LSN: usize = 26; // 8 bytes - flush LSN
pub const FIL_PAGE_SPACE_ID: usize = 34; // 4 bytes - space id

// FIL Trailer (8 bytes total, at SIZE_PAGE - SIZE_FIL_TRAILER)
pub const SIZE_FIL_TRAILER: usize = 8;

// Start of page data (immediately after FIL header)
pub const FIL_PAGE_DATA: usize = 38;
pub const FIL_PAGE_DATA_END: usize = SIZE_PAGE - SIZE_FIL_TRAILER;

// FSP Header (112 bytes, starts at FIL_PAGE_DATA on page 0)
pub const FSP_HEADER_SIZE: usize = 112;
pub const FSP_SPACE_ID: usize = 0; // 4 bytes - space id
pub const FSP_SIZE: usize = 8; // 4 bytes - tablespace size in pages
pub const FSP_FREE_LIMIT: usize = 12; // 4 bytes - minimum page not yet initialized
pub const FSP_SPACE_FLAGS: usize = 16; // 4 bytes - flags
pub const FSP_FRAG_N_USED: usize = 20; // 4 bytes - used pages in FSP_FREE_FRAG
pub const FSP_SEG_ID: usize = 72; // 8 bytes - next unused segment id

// Extent descriptors (XDES), on FSP_HDR and XDES pages
pub const XDES_ARR_OFFSET: usize = FIL_PAGE_DATA + FSP_HEADER_SIZE; // 150
pub const XDES_SIZE: usize = 40; // 8 id + 12 list node + 4 state + 16 bitmap
pub const XDES_ID: usize = 0; // 8 bytes - owning segment id
pub const XDES_STATE: usize = 20; // 4 bytes - extent state
pub const XDES_BITMAP: usize = 24; // 16 bytes - 2 bits per page
pub const XDES_PER_PAGE: usize = 256;
pub const PAGES_PER_EXTENT: usize = 64;

// Insert buffer bitmap: 4 bits per page, starting at FIL_PAGE_DATA
pub const IBUF_BITMAP: usize = FIL_PAGE_DATA;
pub const IBUF_BITS_PER_PAGE: usize = 4;

// File segment inode page
pub const FSEG_INODE_PAGE_NODE: usize = FIL_PAGE_DATA; // 12 bytes - list node
pub const FSEG_ARR_OFFSET: usize = FIL_PAGE_DATA + 12; // 50
pub const FSEG_INODE_SIZE: usize = 192;
pub const FSEG_INODES_PER_PAGE: usize = 85;
pub const FSEG_ID: usize = 0; // 8 bytes - segment id
pub const FSEG_NOT_FULL_N_USED: usize = 8; // 4 bytes
pub const FSEG_FREE: usize = 12; // 16 bytes - list base
pub const FSEG_NOT_FULL: usize = 28; // 16 bytes - list base
pub const FSEG_FULL: usize = 44; // 16 bytes - list base
pub const FSEG_MAGIC_N: usize = 60; // 4 bytes
pub const FSEG_FRAG_ARR: usize = 64; // 32 x 4 bytes
pub const FSEG_FRAG_SLOTS: usize = 32;
pub const FSEG_MAGIC_N_VALUE: u32 = 97937874;
pub const FLST_LEN: usize = 0; // 4 bytes of a list base node

// Index page header (starts at FIL_PAGE_DATA = offset 38)
pub const PAGE_HEADER: usize = FIL_PAGE_DATA;
pub const PAGE_N_DIR_SLOTS: usize = 0; // 2 bytes - number of directory slots
pub const PAGE_HEAP_TOP: usize = 2; // 2 bytes - pointer to record heap top
pub const PAGE_N_HEAP: usize = 4; // 2 bytes - heap records (bit 15 = compact flag)
pub const PAGE_FREE: usize = 6; // 2 bytes - start of free record list
pub const PAGE_GARBAGE: usize = 8; // 2 bytes - bytes in deleted records
pub const PAGE_LAST_INSERT: usize = 10; // 2 bytes - last inserted record
pub const PAGE_DIRECTION: usize = 12; // 2 bytes - last insert direction
pub const PAGE_N_DIRECTION: usize = 14; // 2 bytes - consecutive same-direction inserts
pub const PAGE_N_RECS: usize = 16; // 2 bytes - number of user records
pub const PAGE_MAX_TRX_ID: usize = 18; // 8 bytes - max trx id (secondary indexes only)
pub const PAGE_LEVEL: usize = 26; // 2 bytes - level in B+tree (0 = leaf)
pub const PAGE_INDEX_ID: usize = 28; // 8 bytes - index id
pub const PAGE_HEADER_PRIV_END: usize = 36;
pub const PAGE_BTR_SEG_LEAF: usize = 36; // 10 bytes - leaf segment header
pub const PAGE_BTR_SEG_TOP: usize = 46; // 10 bytes - non-leaf segment header

// FSEG header (space id, page no, byte offset of the inode)
pub const FSEG_HEADER_SIZE: usize = 10;

// Compact record extra bytes
pub const REC_N_NEW_EXTRA_BYTES: usize = 5;
pub const REC_NEW_INFO_BITS: usize = 5; // offset back from origin
pub const REC_NEW_HEAP_NO: usize = 4; // offset back from origin, 13 bits + 3 bits status
pub const REC_NEXT: usize = 2; // offset back from origin, signed relative offset
pub const REC_INFO_DELETED_FLAG: u8 = 0x20;
pub const REC_INFO_MIN_REC_FLAG: u8 = 0x10;
pub const REC_N_OWNED_MASK: u8 = 0x0F;
pub const REC_HEAP_NO_SHIFT: u16 = 3;
pub const REC_STATUS_MASK: u16 = 0x07;

// System records on compact pages
pub const PAGE_DATA: usize = PAGE_HEADER + PAGE_HEADER_PRIV_END + 2 * FSEG_HEADER_SIZE; // 94
pub const PAGE_NEW_INFIMUM: usize = PAGE_DATA + REC_N_NEW_EXTRA_BYTES; // 99
pub const PAGE_NEW_SUPREMUM: usize = PAGE_DATA + 2 * REC_N_NEW_EXTRA_BYTES + 8; // 112
pub const PAGE_NEW_SUPREMUM_END: usize = PAGE_NEW_SUPREMUM + 8; // 120

// Page directory (grows down from the trailer)
pub const PAGE_DIR: usize = FIL_PAGE_DATA_END;
pub const PAGE_DIR_SLOT_SIZE: usize = 2;

// Hidden system columns
pub const DATA_ROW_ID_LEN: usize = 6;
pub const DATA_TRX_ID_LEN: usize = 6;
pub const DATA_ROLL_PTR_LEN: usize = 7;
pub const NODE_PTR_CHILD_LEN: usize = 4;

// Externally stored columns
pub const BTR_EXTERN_FIELD_REF_SIZE: usize = 20;
pub const BTR_EXTERN_SPACE_ID: usize = 0; // 4 bytes
pub const BTR_EXTERN_PAGE_NO: usize = 4; // 4 bytes
pub const BTR_EXTERN_OFFSET: usize = 8; // 4 bytes
pub const BTR_EXTERN_LEN: usize = 12; // 8 bytes, low 32 bits used
pub const BTR_BLOB_HDR_PART_LEN: usize = 0; // 4 bytes, relative to FIL_PAGE_DATA
pub const BTR_BLOB_HDR_NEXT_PAGE_NO: usize = 4; // 4 bytes
pub const BTR_BLOB_HDR_SIZE: usize = 8;

// Variable-length table flags
pub const VARLEN_TWO_BYTE_FLAG: u8 = 0x80;
pub const VARLEN_EXTERN_FLAG: u8 = 0x40;

// Special page number values
pub const FIL_NULL: u32 = 0xFFFFFFFF;

// Checksum constants
pub const UT_HASH_RANDOM_MASK: u32 = 1463735687;
pub const UT_HASH_RANDOM_MASK2: u32 = 1653893711;

// Insert direction values
pub const PAGE_LEFT: u16 = 1;
pub const PAGE_RIGHT: u16 = 2;
pub const PAGE_SAME_REC: u16 = 3;
pub const PAGE_SAME_PAGE: u16 = 4;
pub const PAGE_NO_DIRECTION: u16 = 5;
