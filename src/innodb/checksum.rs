//! Best-effort page checksum verification.
//!
//! The reader never requires valid checksums; a recovery tool has to be able
//! to read pages a server would reject. When
//! [`ReaderConfig::verify_checksums`](crate::query::reader::ReaderConfig) is on,
//! every loaded page goes through [`verify_page`], which accepts CRC-32C,
//! the legacy InnoDB fold, the `none` magic and all-zero pages.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use tracing::warn;

use crate::innodb::constants::*;
use crate::IdbError;

/// Stored checksum when `innodb_checksum_algorithm=none`.
const BUF_NO_CHECKSUM_MAGIC: u32 = 0xDEADBEEF;

/// Checksum algorithms used by InnoDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChecksumAlgorithm {
    /// CRC-32C (MySQL 5.7.7+ default)
    Crc32c,
    /// Legacy InnoDB checksum (buf_calc_page_new_checksum)
    InnoDB,
    /// No checksum (magic value or empty page)
    None,
}

/// Result of a checksum validation.
#[derive(Debug, Clone, Serialize)]
pub struct ChecksumResult {
    pub algorithm: ChecksumAlgorithm,
    pub valid: bool,
    pub stored_checksum: u32,
    pub calculated_checksum: u32,
}

/// Validate a page's checksum against every algorithm the reader knows.
pub fn validate_checksum(page_data: &[u8]) -> ChecksumResult {
    if page_data.len() < SIZE_PAGE {
        return ChecksumResult {
            algorithm: ChecksumAlgorithm::None,
            valid: false,
            stored_checksum: 0,
            calculated_checksum: 0,
        };
    }

    let stored_checksum = BigEndian::read_u32(&page_data[FIL_PAGE_SPACE_OR_CHKSUM..]);
    if stored_checksum == BUF_NO_CHECKSUM_MAGIC {
        return ChecksumResult {
            algorithm: ChecksumAlgorithm::None,
            valid: true,
            stored_checksum,
            calculated_checksum: BUF_NO_CHECKSUM_MAGIC,
        };
    }

    if stored_checksum == 0 && page_data[..SIZE_PAGE].iter().all(|&b| b == 0) {
        return ChecksumResult {
            algorithm: ChecksumAlgorithm::None,
            valid: true,
            stored_checksum: 0,
            calculated_checksum: 0,
        };
    }

    let crc = calculate_crc32c(page_data);
    if stored_checksum == crc {
        return ChecksumResult {
            algorithm: ChecksumAlgorithm::Crc32c,
            valid: true,
            stored_checksum,
            calculated_checksum: crc,
        };
    }

    let legacy = calculate_innodb_checksum(page_data);
    if stored_checksum == legacy {
        return ChecksumResult {
            algorithm: ChecksumAlgorithm::InnoDB,
            valid: true,
            stored_checksum,
            calculated_checksum: legacy,
        };
    }

    ChecksumResult {
        algorithm: ChecksumAlgorithm::Crc32c,
        valid: false,
        stored_checksum,
        calculated_checksum: crc,
    }
}

/// Verify a loaded page, turning a mismatch into [`IdbError::Checksum`].
pub fn verify_page(page_data: &[u8], page_no: u64) -> Result<ChecksumAlgorithm, IdbError> {
    let result = validate_checksum(page_data);
    if !result.valid {
        return Err(IdbError::Checksum {
            page: page_no,
            stored: result.stored_checksum,
            calculated: result.calculated_checksum,
        });
    }
    if !validate_lsn(page_data) {
        warn!(page = page_no, "header LSN does not match trailer LSN");
    }
    Ok(result.algorithm)
}

/// CRC-32C of bytes 4..26 XOR CRC-32C of bytes 38..(page_size - 8).
///
/// The stored checksum, the flush LSN/space id pair and the trailer are
/// excluded because the server writes them outside the buffer pool.
pub fn calculate_crc32c(page_data: &[u8]) -> u32 {
    let head = crc32c::crc32c(&page_data[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN]);
    let body = crc32c::crc32c(&page_data[FIL_PAGE_DATA..FIL_PAGE_DATA_END]);
    head ^ body
}

#[inline]
fn ut_fold_ulint_pair(n1: u64, n2: u64) -> u64 {
    let mask2 = UT_HASH_RANDOM_MASK2 as u64;
    let mask = UT_HASH_RANDOM_MASK as u64;
    ((((n1 ^ n2 ^ mask2) << 8).wrapping_add(n1)) ^ mask).wrapping_add(n2)
}

/// ut_fold_binary: 4-byte words in 8-byte strides, then a tail where any
/// leftover beyond 4 bytes is folded byte by byte before the final word.
fn ut_fold_binary(data: &[u8]) -> u64 {
    let aligned = data.len() & !7;
    let mut fold = data[..aligned]
        .chunks_exact(4)
        .fold(0u64, |acc, w| ut_fold_ulint_pair(acc, BigEndian::read_u32(w) as u64));

    let tail = &data[aligned..];
    let (bytes, word) = if tail.len() >= 4 {
        tail.split_at(tail.len() - 4)
    } else {
        (tail, &tail[tail.len()..])
    };
    for &b in bytes {
        fold = ut_fold_ulint_pair(fold, b as u64);
    }
    if word.len() == 4 {
        fold = ut_fold_ulint_pair(fold, BigEndian::read_u32(word) as u64);
    }
    fold
}

/// Legacy InnoDB checksum, masked to 32 bits.
pub fn calculate_innodb_checksum(page_data: &[u8]) -> u32 {
    let fold1 = ut_fold_binary(&page_data[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN]);
    let fold2 = ut_fold_binary(&page_data[FIL_PAGE_DATA..FIL_PAGE_DATA_END]);
    fold1.wrapping_add(fold2) as u32
}

/// The low 32 bits of the header LSN should match the trailer LSN field.
pub fn validate_lsn(page_data: &[u8]) -> bool {
    if page_data.len() < SIZE_PAGE {
        return false;
    }
    let header_lsn_low32 = BigEndian::read_u64(&page_data[FIL_PAGE_LSN..]) as u32;
    let trailer_lsn_low32 = BigEndian::read_u32(&page_data[FIL_PAGE_DATA_END + 4..]);
    header_lsn_low32 == trailer_lsn_low32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_page_is_valid() {
        let page = vec![0u8; SIZE_PAGE];
        let result = validate_checksum(&page);
        assert!(result.valid);
        assert_eq!(result.algorithm, ChecksumAlgorithm::None);
    }

    #[test]
    fn test_no_checksum_magic() {
        let mut page = vec![0u8; SIZE_PAGE];
        BigEndian::write_u32(&mut page[0..], BUF_NO_CHECKSUM_MAGIC);
        let result = validate_checksum(&page);
        assert!(result.valid);
        assert_eq!(result.algorithm, ChecksumAlgorithm::None);
    }

    #[test]
    fn test_crc32c_roundtrip() {
        let mut page = vec![0u8; SIZE_PAGE];
        BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], 7);
        page[200] = 0xAB;
        let crc = calculate_crc32c(&page);
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], crc);
        assert_eq!(verify_page(&page, 7).unwrap(), ChecksumAlgorithm::Crc32c);
    }

    #[test]
    fn test_legacy_checksum_accepted() {
        let mut page = vec![0u8; SIZE_PAGE];
        page[500] = 0x11;
        let legacy = calculate_innodb_checksum(&page);
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], legacy);
        let result = validate_checksum(&page);
        assert!(result.valid);
        assert_eq!(result.algorithm, ChecksumAlgorithm::InnoDB);
    }

    #[test]
    fn test_mismatch_is_error() {
        let mut page = vec![0u8; SIZE_PAGE];
        page[300] = 1;
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], 0x1234);
        match verify_page(&page, 3) {
            Err(IdbError::Checksum { page, stored, .. }) => {
                assert_eq!(page, 3);
                assert_eq!(stored, 0x1234);
            }
            other => panic!("expected checksum error, got {:?}", other),
        }
    }

    #[test]
    fn test_fold_tail_lengths() {
        // Folding must consume every tail length without panicking
        for len in 0..16 {
            let data: Vec<u8> = (0..len as u8).collect();
            let _ = ut_fold_binary(&data);
        }
    }

    #[test]
    fn test_lsn_validation() {
        let mut page = vec![0u8; SIZE_PAGE];
        BigEndian::write_u64(&mut page[FIL_PAGE_LSN..], 0x12345678);
        BigEndian::write_u32(&mut page[SIZE_PAGE - 4..], 0x12345678);
        assert!(validate_lsn(&page));
        BigEndian::write_u32(&mut page[SIZE_PAGE - 4..], 0xAAAAAAAA);
        assert!(!validate_lsn(&page));
    }
}
