//! Bounds-checked byte cursor over a page buffer.
//!
//! Every InnoDB multi-byte integer is big-endian; FLOAT and DOUBLE columns
//! are the exception and are stored little-endian. [`ByteCursor`] supports
//! both absolute reads (`u16_at`) and sequential reads that advance the
//! position (`read_u16`), plus the backward walks the record header and
//! variable-length table need.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::IdbError;

/// A read-only cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    /// Cursor positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        ByteCursor { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move to an absolute offset.
    pub fn seek(&mut self, pos: usize) -> Result<(), IdbError> {
        if pos > self.data.len() {
            return Err(self.out_of_bounds(pos, 0));
        }
        self.pos = pos;
        Ok(())
    }

    /// Move forward by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), IdbError> {
        let target = self
            .pos
            .checked_add(n)
            .ok_or_else(|| self.out_of_bounds(self.pos, n))?;
        self.seek(target)
    }

    /// Move backward by `n` bytes.
    pub fn back(&mut self, n: usize) -> Result<(), IdbError> {
        let target = self
            .pos
            .checked_sub(n)
            .ok_or_else(|| self.out_of_bounds(self.pos, n))?;
        self.pos = target;
        Ok(())
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> IdbError {
        IdbError::OutOfBounds {
            offset,
            len,
            size: self.data.len(),
        }
    }

    /// Borrow `len` bytes at an absolute offset.
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8], IdbError> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| self.out_of_bounds(offset, len))?;
        if end > self.data.len() {
            return Err(self.out_of_bounds(offset, len));
        }
        Ok(&self.data[offset..end])
    }

    /// Borrow `len` bytes at the current position and advance.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], IdbError> {
        let out = self.bytes_at(self.pos, len)?;
        self.pos += len;
        Ok(out)
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8, IdbError> {
        Ok(self.bytes_at(offset, 1)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16, IdbError> {
        Ok(BigEndian::read_u16(self.bytes_at(offset, 2)?))
    }

    pub fn i16_at(&self, offset: usize) -> Result<i16, IdbError> {
        Ok(BigEndian::read_i16(self.bytes_at(offset, 2)?))
    }

    pub fn u24_at(&self, offset: usize) -> Result<u32, IdbError> {
        Ok(BigEndian::read_u24(self.bytes_at(offset, 3)?))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, IdbError> {
        Ok(BigEndian::read_u32(self.bytes_at(offset, 4)?))
    }

    pub fn u48_at(&self, offset: usize) -> Result<u64, IdbError> {
        Ok(BigEndian::read_u48(self.bytes_at(offset, 6)?))
    }

    pub fn u56_at(&self, offset: usize) -> Result<u64, IdbError> {
        Ok(BigEndian::read_uint(self.bytes_at(offset, 7)?, 7))
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64, IdbError> {
        Ok(BigEndian::read_u64(self.bytes_at(offset, 8)?))
    }

    /// Big-endian unsigned integer of `width` bytes (1..=8).
    pub fn uint_at(&self, offset: usize, width: usize) -> Result<u64, IdbError> {
        if width == 0 || width > 8 {
            return Err(IdbError::Argument(format!(
                "integer width {} not in 1..=8",
                width
            )));
        }
        Ok(BigEndian::read_uint(self.bytes_at(offset, width)?, width))
    }

    pub fn read_u8(&mut self) -> Result<u8, IdbError> {
        let v = self.u8_at(self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, IdbError> {
        let v = self.u16_at(self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, IdbError> {
        let v = self.u32_at(self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64, IdbError> {
        let v = self.u64_at(self.pos)?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_uint(&mut self, width: usize) -> Result<u64, IdbError> {
        let v = self.uint_at(self.pos, width)?;
        self.pos += width;
        Ok(v)
    }

    pub fn read_f32_le(&mut self) -> Result<f32, IdbError> {
        let v = LittleEndian::read_f32(self.read_bytes(4)?);
        Ok(v)
    }

    pub fn read_f64_le(&mut self) -> Result<f64, IdbError> {
        let v = LittleEndian::read_f64(self.read_bytes(8)?);
        Ok(v)
    }

    /// Read the byte just before the current position and step back onto it.
    ///
    /// Null bitmaps and variable-length tables are laid out backward from
    /// the record origin, so this is the natural way to consume them.
    pub fn read_u8_backward(&mut self) -> Result<u8, IdbError> {
        self.back(1)?;
        self.u8_at(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let c = ByteCursor::new(&data);
        assert_eq!(c.u8_at(0).unwrap(), 0x01);
        assert_eq!(c.u16_at(0).unwrap(), 0x0102);
        assert_eq!(c.u24_at(0).unwrap(), 0x010203);
        assert_eq!(c.u32_at(0).unwrap(), 0x01020304);
        assert_eq!(c.u48_at(0).unwrap(), 0x010203040506);
        assert_eq!(c.u56_at(0).unwrap(), 0x01020304050607);
        assert_eq!(c.u64_at(0).unwrap(), 0x0102030405060708);
        assert_eq!(c.uint_at(5, 3).unwrap(), 0x060708);
    }

    #[test]
    fn test_sequential_reads_advance() {
        let data = [0x00, 0x10, 0xAA, 0xBB, 0xCC, 0xDD];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_u16().unwrap(), 0x0010);
        assert_eq!(c.position(), 2);
        assert_eq!(c.read_u32().unwrap(), 0xAABBCCDD);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn test_signed_relative_offset() {
        let data = [0xFF, 0xF0];
        let c = ByteCursor::new(&data);
        assert_eq!(c.i16_at(0).unwrap(), -16);
    }

    #[test]
    fn test_little_endian_floats() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.25f64).to_le_bytes());
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_f32_le().unwrap(), 1.5);
        assert_eq!(c.read_f64_le().unwrap(), -2.25);
    }

    #[test]
    fn test_backward_reads() {
        let data = [0x11, 0x22, 0x33];
        let mut c = ByteCursor::at(&data, 3);
        assert_eq!(c.read_u8_backward().unwrap(), 0x33);
        assert_eq!(c.read_u8_backward().unwrap(), 0x22);
        assert_eq!(c.position(), 1);
    }

    #[test]
    fn test_out_of_bounds() {
        let data = [0u8; 4];
        let mut c = ByteCursor::new(&data);
        assert!(matches!(
            c.u32_at(1),
            Err(IdbError::OutOfBounds {
                offset: 1,
                len: 4,
                size: 4
            })
        ));
        assert!(c.back(1).is_err());
        assert!(c.seek(5).is_err());
        c.seek(4).unwrap();
        assert!(c.read_u8().is_err());
    }

    #[test]
    fn test_uint_width_validation() {
        let data = [0u8; 16];
        let c = ByteCursor::new(&data);
        assert!(c.uint_at(0, 0).is_err());
        assert!(c.uint_at(0, 9).is_err());
    }
}
