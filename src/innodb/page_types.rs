//! InnoDB page type definitions.
//!
//! Maps the 2-byte page type field (bytes 24-25 of the FIL header) to a
//! [`PageType`]. The set is closed: it covers exactly the page kinds a
//! row reader meets in an uncompressed, unencrypted `.ibd` file. A tag
//! outside this set is rejected rather than guessed at, because decoding a
//! page with the wrong layout would silently produce garbage rows.
//!
//! Values are from `fil0fil.h` in MySQL source.

use serde::Serialize;
use std::fmt;

/// Page kinds the reader decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PageType {
    /// Freshly allocated, type field not initialized (FIL_PAGE_TYPE_ALLOCATED = 0)
    Allocated,
    /// File segment inode (FIL_PAGE_INODE = 3)
    Inode,
    /// Insert buffer bitmap (FIL_PAGE_IBUF_BITMAP = 5)
    IbufBitmap,
    /// File space header, page 0 of each tablespace (FIL_PAGE_TYPE_FSP_HDR = 8)
    FspHdr,
    /// Extent descriptor (FIL_PAGE_TYPE_XDES = 9)
    Xdes,
    /// Uncompressed BLOB page (FIL_PAGE_TYPE_BLOB = 10)
    Blob,
    /// SDI index page (FIL_PAGE_SDI = 17853, MySQL 8.0+)
    Sdi,
    /// B+Tree index page for table and index data (FIL_PAGE_INDEX = 17855)
    Index,
}

impl PageType {
    /// Every supported kind, in tag order.
    pub const ALL: [PageType; 8] = [
        PageType::Allocated,
        PageType::Inode,
        PageType::IbufBitmap,
        PageType::FspHdr,
        PageType::Xdes,
        PageType::Blob,
        PageType::Sdi,
        PageType::Index,
    ];

    /// Map a FIL page-type tag to a supported kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibdrow::innodb::page_types::PageType;
    ///
    /// assert_eq!(PageType::from_u16(17855), Some(PageType::Index));
    /// assert_eq!(PageType::from_u16(8), Some(PageType::FspHdr));
    ///
    /// // Undo log pages (2) are outside the supported set
    /// assert_eq!(PageType::from_u16(2), None);
    /// ```
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(PageType::Allocated),
            3 => Some(PageType::Inode),
            5 => Some(PageType::IbufBitmap),
            8 => Some(PageType::FspHdr),
            9 => Some(PageType::Xdes),
            10 => Some(PageType::Blob),
            17853 => Some(PageType::Sdi),
            17855 => Some(PageType::Index),
            _ => None,
        }
    }

    /// Returns the raw u16 value of this page type.
    pub fn as_u16(self) -> u16 {
        match self {
            PageType::Allocated => 0,
            PageType::Inode => 3,
            PageType::IbufBitmap => 5,
            PageType::FspHdr => 8,
            PageType::Xdes => 9,
            PageType::Blob => 10,
            PageType::Sdi => 17853,
            PageType::Index => 17855,
        }
    }

    /// Returns (name, description) for this page type.
    fn metadata(self) -> (&'static str, &'static str) {
        match self {
            PageType::Allocated => ("ALLOCATED", "Freshly allocated"),
            PageType::Inode => ("INODE", "File segment inode"),
            PageType::IbufBitmap => ("IBUF_BITMAP", "Insert buffer bitmap"),
            PageType::FspHdr => ("FSP_HDR", "File space header"),
            PageType::Xdes => ("XDES", "Extent descriptor"),
            PageType::Blob => ("BLOB", "Uncompressed BLOB"),
            PageType::Sdi => ("SDI", "Serialized dictionary information"),
            PageType::Index => ("INDEX", "B+Tree index"),
        }
    }

    /// MySQL source name without the `FIL_PAGE_` prefix.
    pub fn name(self) -> &'static str {
        self.metadata().0
    }

    pub fn description(self) -> &'static str {
        self.metadata().1
    }

    /// True for pages laid out as B+tree nodes (INDEX and SDI).
    pub fn is_btree(self) -> bool {
        matches!(self, PageType::Index | PageType::Sdi)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Display name for a raw tag, including unsupported ones.
pub fn tag_name(tag: u16) -> String {
    match PageType::from_u16(tag) {
        Some(pt) => pt.name().to_string(),
        None => format!("UNSUPPORTED({})", tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_from_u16() {
        assert_eq!(PageType::from_u16(0), Some(PageType::Allocated));
        assert_eq!(PageType::from_u16(3), Some(PageType::Inode));
        assert_eq!(PageType::from_u16(5), Some(PageType::IbufBitmap));
        assert_eq!(PageType::from_u16(8), Some(PageType::FspHdr));
        assert_eq!(PageType::from_u16(9), Some(PageType::Xdes));
        assert_eq!(PageType::from_u16(10), Some(PageType::Blob));
        assert_eq!(PageType::from_u16(17853), Some(PageType::Sdi));
        assert_eq!(PageType::from_u16(17855), Some(PageType::Index));
    }

    #[test]
    fn test_unsupported_tags_rejected() {
        for tag in [1u16, 2, 4, 6, 7, 11, 14, 15, 18, 22, 17854, 34354, 9999] {
            assert_eq!(PageType::from_u16(tag), None, "tag {}", tag);
        }
    }

    #[test]
    fn test_page_type_roundtrip() {
        for pt in PageType::ALL {
            assert_eq!(PageType::from_u16(pt.as_u16()), Some(pt));
        }
    }

    #[test]
    fn test_page_type_display() {
        assert_eq!(format!("{}", PageType::Index), "INDEX");
        assert_eq!(format!("{}", PageType::FspHdr), "FSP_HDR");
        assert_eq!(tag_name(2), "UNSUPPORTED(2)");
        assert_eq!(tag_name(10), "BLOB");
    }

    #[test]
    fn test_btree_kinds() {
        assert!(PageType::Index.is_btree());
        assert!(PageType::Sdi.is_btree());
        assert!(!PageType::Blob.is_btree());
    }
}
