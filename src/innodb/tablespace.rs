//! InnoDB tablespace file I/O.
//!
//! Provides [`Tablespace`], the storage accessor for `.ibd` files. Page `n`
//! lives at byte offset `n * 16384`; the page count is the file size divided
//! by the page size, so a trailing partial page is ignored. Reads go through a
//! mutex-guarded `Read + Seek` handle, which lets one `Tablespace` be shared
//! by concurrent readers (`&self` everywhere).
//!
//! The FSP header from page 0 is parsed and cached when page 0 is an FSP_HDR
//! page, giving access to the space ID and tablespace size.
//!
//! [`PageSource`] is the narrow interface the record codec and query engine
//! consume, so tests can substitute an in-memory page map.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::innodb::checksum::verify_page;
use crate::innodb::constants::*;
use crate::innodb::fsp::FspHeader;
use crate::innodb::page::{FilHeader, Page};
use crate::innodb::page_types::PageType;
use crate::IdbError;

/// Supertrait combining `Read + Seek` for type-erased readers.
pub(crate) trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Anything that can hand out whole 16 KiB pages by number.
pub trait PageSource {
    /// Load page `page_no`, failing with [`IdbError::PageOutOfRange`] past the end.
    fn load_page(&self, page_no: u32) -> Result<Vec<u8>, IdbError>;

    /// Number of whole pages available.
    fn page_count(&self) -> u64;
}

/// An open InnoDB tablespace file (.ibd) or in-memory tablespace image.
pub struct Tablespace {
    reader: Mutex<Box<dyn ReadSeek>>,
    path: Option<PathBuf>,
    file_size: u64,
    page_count: u64,
    fsp_header: Option<FspHeader>,
    verify_checksums: bool,
}

impl std::fmt::Debug for Tablespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tablespace")
            .field("path", &self.path)
            .field("file_size", &self.file_size)
            .field("page_count", &self.page_count)
            .finish()
    }
}

impl Tablespace {
    /// Open a tablespace file.
    ///
    /// Fails with [`IdbError::Io`] when the file is absent or unreadable and
    /// with [`IdbError::Parse`] when it is smaller than one page.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IdbError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| IdbError::Io(format!("Cannot open {}: {}", path.display(), e)))?;

        let file_size = file
            .metadata()
            .map_err(|e| IdbError::Io(format!("Cannot stat {}: {}", path.display(), e)))?
            .len();

        let mut ts = Self::init(Box::new(file), file_size)?;
        ts.path = Some(path.to_path_buf());
        debug!(path = %path.display(), pages = ts.page_count, "opened tablespace");
        Ok(ts)
    }

    /// Create a tablespace from an in-memory image.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibdrow::innodb::tablespace::Tablespace;
    ///
    /// let image = vec![0u8; 16384 * 3];
    /// let ts = Tablespace::from_bytes(image).unwrap();
    /// assert_eq!(ts.page_count(), 3);
    /// ```
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, IdbError> {
        let file_size = data.len() as u64;
        Self::init(Box::new(Cursor::new(data)), file_size)
    }

    fn init(mut reader: Box<dyn ReadSeek>, file_size: u64) -> Result<Self, IdbError> {
        if file_size < SIZE_PAGE_U64 {
            return Err(IdbError::Parse(format!(
                "File too small to be a valid tablespace: {} bytes",
                file_size
            )));
        }

        let mut buf = vec![0u8; SIZE_PAGE];
        reader
            .read_exact(&mut buf)
            .map_err(|e| IdbError::Io(format!("Cannot read page 0: {}", e)))?;

        let fsp_header = match FilHeader::parse(&buf).and_then(|h| h.kind()) {
            Some(PageType::FspHdr) => FspHeader::parse(&buf).ok(),
            _ => None,
        };

        Ok(Tablespace {
            reader: Mutex::new(reader),
            path: None,
            file_size,
            page_count: file_size / SIZE_PAGE_U64,
            fsp_header,
            verify_checksums: false,
        })
    }

    /// Turn best-effort checksum verification on or off for page loads.
    pub fn set_verify_checksums(&mut self, on: bool) {
        self.verify_checksums = on;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the total number of whole pages in the file.
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Returns the file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the FSP header from page 0, if page 0 is an FSP_HDR page.
    pub fn fsp_header(&self) -> Option<&FspHeader> {
        self.fsp_header.as_ref()
    }

    fn check_range(&self, page_num: u64) -> Result<(), IdbError> {
        if page_num >= self.page_count {
            return Err(IdbError::PageOutOfRange {
                page: page_num,
                count: self.page_count,
            });
        }
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8], what: &str) -> Result<(), IdbError> {
        let mut reader = self.reader.lock();
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| IdbError::Io(format!("Cannot seek to {}: {}", what, e)))?;
        reader
            .read_exact(buf)
            .map_err(|e| IdbError::Io(format!("Cannot read {}: {}", what, e)))
    }

    /// Read a single page by page number into a newly allocated buffer.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ibdrow::innodb::tablespace::Tablespace;
    /// use ibdrow::innodb::page::FilHeader;
    ///
    /// let ts = Tablespace::open("table.ibd").unwrap();
    /// let page_data = ts.read_page(0).unwrap();
    /// let header = FilHeader::parse(&page_data).unwrap();
    /// println!("Page 0 type: {}", header.type_name());
    /// ```
    pub fn read_page(&self, page_num: u64) -> Result<Vec<u8>, IdbError> {
        self.check_range(page_num)?;
        let mut buf = vec![0u8; SIZE_PAGE];
        self.read_at(
            page_num * SIZE_PAGE_U64,
            &mut buf,
            &format!("page {}", page_num),
        )?;
        if self.verify_checksums {
            verify_page(&buf, page_num)?;
        }
        Ok(buf)
    }

    /// Read only the 38-byte FIL header of a page.
    pub fn read_page_header(&self, page_num: u64) -> Result<FilHeader, IdbError> {
        self.check_range(page_num)?;
        let mut buf = [0u8; SIZE_FIL_HEAD];
        self.read_at(
            page_num * SIZE_PAGE_U64,
            &mut buf,
            &format!("header of page {}", page_num),
        )?;
        FilHeader::parse(&buf)
            .ok_or_else(|| IdbError::Parse(format!("page {} header unreadable", page_num)))
    }

    /// Read and decode a page into its typed form.
    pub fn decode_page(&self, page_num: u64) -> Result<Page, IdbError> {
        Page::decode(&self.read_page(page_num)?)
    }

    /// FIL headers of every page, in page order.
    pub fn read_all_page_headers(&self) -> Result<Vec<FilHeader>, IdbError> {
        (0..self.page_count)
            .map(|n| self.read_page_header(n))
            .collect()
    }

    /// Iterate over all pages, calling the callback with (page_number, page_data).
    ///
    /// ```no_run
    /// use ibdrow::innodb::tablespace::Tablespace;
    /// use ibdrow::innodb::page::FilHeader;
    ///
    /// let ts = Tablespace::open("table.ibd").unwrap();
    /// ts.for_each_page(|page_num, page_data| {
    ///     if let Some(header) = FilHeader::parse(page_data) {
    ///         println!("Page {}: type={}, LSN={}", page_num, header.type_name(), header.lsn);
    ///     }
    ///     Ok(())
    /// }).unwrap();
    /// ```
    pub fn for_each_page<F>(&self, mut callback: F) -> Result<(), IdbError>
    where
        F: FnMut(u64, &[u8]) -> Result<(), IdbError>,
    {
        for page_num in 0..self.page_count {
            let page = self.read_page(page_num)?;
            callback(page_num, &page)?;
        }
        Ok(())
    }
}

impl PageSource for Tablespace {
    fn load_page(&self, page_no: u32) -> Result<Vec<u8>, IdbError> {
        let data = self.read_page(page_no as u64)?;
        if let Some(h) = FilHeader::parse(&data) {
            if h.page_number != page_no && h.page_type != 0 {
                warn!(
                    requested = page_no,
                    stored = h.page_number,
                    "page header carries a different page number"
                );
            }
        }
        Ok(data)
    }

    fn page_count(&self) -> u64 {
        self.page_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn finish_page(page: &mut [u8], lsn: u64) {
        BigEndian::write_u64(&mut page[FIL_PAGE_LSN..], lsn);
        BigEndian::write_u32(&mut page[SIZE_PAGE - 4..], lsn as u32);
        let crc1 = crc32c::crc32c(&page[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN]);
        let crc = crc1 ^ crc32c::crc32c(&page[FIL_PAGE_DATA..FIL_PAGE_DATA_END]);
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], crc);
    }

    fn build_fsp_page(space_id: u32, total_pages: u32) -> Vec<u8> {
        let mut page = vec![0u8; SIZE_PAGE];
        BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], FIL_NULL);
        BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], FIL_NULL);
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], 8);
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], space_id);
        let fsp = FIL_PAGE_DATA;
        BigEndian::write_u32(&mut page[fsp + FSP_SPACE_ID..], space_id);
        BigEndian::write_u32(&mut page[fsp + FSP_SIZE..], total_pages);
        finish_page(&mut page, 1000);
        page
    }

    fn build_allocated_page(page_num: u32, lsn: u64) -> Vec<u8> {
        let mut page = vec![0u8; SIZE_PAGE];
        BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], page_num);
        BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], FIL_NULL);
        BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], FIL_NULL);
        finish_page(&mut page, lsn);
        page
    }

    fn write_pages(pages: &[Vec<u8>]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().expect("create temp file");
        for page in pages {
            tmp.write_all(page).expect("write page");
        }
        tmp.flush().expect("flush");
        tmp
    }

    #[test]
    fn test_open_counts_pages_and_reads_fsp() {
        let tmp = write_pages(&[build_fsp_page(7, 2), build_allocated_page(1, 2000)]);
        let ts = Tablespace::open(tmp.path()).unwrap();
        assert_eq!(ts.page_count(), 2);
        assert_eq!(ts.fsp_header().unwrap().space_id, 7);
        assert_eq!(ts.path(), Some(tmp.path()));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            Tablespace::open("/nonexistent/definitely/missing.ibd"),
            Err(IdbError::Io(_))
        ));
    }

    #[test]
    fn test_open_rejects_too_small_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 10]).unwrap();
        tmp.flush().unwrap();
        assert!(Tablespace::open(tmp.path()).is_err());
    }

    #[test]
    fn test_partial_trailing_page_ignored() {
        let mut image = build_fsp_page(1, 1);
        image.extend_from_slice(&[0u8; 100]);
        let ts = Tablespace::from_bytes(image).unwrap();
        assert_eq!(ts.page_count(), 1);
    }

    #[test]
    fn test_read_page_returns_correct_data() {
        let tmp = write_pages(&[build_fsp_page(5, 2), build_allocated_page(1, 9999)]);
        let ts = Tablespace::open(tmp.path()).unwrap();
        let data = ts.read_page(1).unwrap();
        let hdr = FilHeader::parse(&data).unwrap();
        assert_eq!(hdr.page_number, 1);
        assert_eq!(hdr.lsn, 9999);
    }

    #[test]
    fn test_read_page_out_of_range() {
        let ts = Tablespace::from_bytes(build_fsp_page(1, 1)).unwrap();
        assert!(matches!(
            ts.read_page(5),
            Err(IdbError::PageOutOfRange { page: 5, count: 1 })
        ));
        assert!(ts.load_page(1).is_err());
    }

    #[test]
    fn test_read_page_header_only() {
        let tmp = write_pages(&[build_fsp_page(5, 2), build_allocated_page(1, 42)]);
        let ts = Tablespace::open(tmp.path()).unwrap();
        let headers = ts.read_all_page_headers().unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].kind(), Some(PageType::FspHdr));
        assert_eq!(headers[1].lsn, 42);
    }

    #[test]
    fn test_for_each_page_visits_all() {
        let tmp = write_pages(&[build_fsp_page(1, 2), build_allocated_page(1, 10)]);
        let ts = Tablespace::open(tmp.path()).unwrap();
        let mut seen = Vec::new();
        ts.for_each_page(|n, data| {
            seen.push((n, FilHeader::parse(data).unwrap().page_number));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_checksum_verification() {
        let mut bad = build_allocated_page(1, 10);
        bad[500] ^= 0xFF;
        let mut ts =
            Tablespace::from_bytes([build_fsp_page(1, 2), bad].concat()).unwrap();
        assert!(ts.read_page(1).is_ok());
        ts.set_verify_checksums(true);
        assert!(ts.read_page(0).is_ok());
        assert!(matches!(ts.read_page(1), Err(IdbError::Checksum { page: 1, .. })));
    }

    #[test]
    fn test_shared_across_threads() {
        let pages: Vec<Vec<u8>> = std::iter::once(build_fsp_page(1, 8))
            .chain((1..8).map(|n| build_allocated_page(n, n as u64 * 10)))
            .collect();
        let ts = std::sync::Arc::new(Tablespace::from_bytes(pages.concat()).unwrap());
        let handles: Vec<_> = (1..8u32)
            .map(|n| {
                let ts = ts.clone();
                std::thread::spawn(move || ts.read_page_header(n as u64).unwrap().lsn)
            })
            .collect();
        let lsns: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(lsns, (1..8u64).map(|n| n * 10).collect::<Vec<_>>());
    }
}
