//! Column value codecs.
//!
//! Decodes the bytes of one record field into a [`FieldValue`], driven by the
//! column's declared [`ColumnType`]. InnoDB's storage encodings:
//!
//! | SQL Type | InnoDB encoding | Decoder |
//! |----------|----------------|---------|
//! | TINYINT–BIGINT | Big-endian, high bit XOR'd when signed | [`decode_int`] |
//! | FLOAT / DOUBLE | Raw IEEE 754, little-endian | [`decode_float`], [`decode_double`] |
//! | DECIMAL | Base-10⁹ groups, sign in the high bit of byte 0 | [`decode_decimal`] |
//! | DATE | 3-byte packed year/month/day | [`decode_date`] |
//! | DATETIME | 5 + fsp bytes packed bit-field | [`decode_datetime`] |
//! | TIMESTAMP | 4 + fsp bytes epoch seconds | [`decode_timestamp`] |
//! | TIME | 3 + fsp bytes packed bit-field | [`decode_time`] |
//! | YEAR | 1 byte + 1900 | [`decode_year`] |
//! | CHAR/VARCHAR/TEXT | Charset-encoded bytes | [`decode_string`] |
//! | BINARY/VARBINARY/BLOB/JSON | Raw bytes | |
//! | ENUM | 1-2 byte index into the member list | [`decode_enum`] |
//! | SET | 1-8 byte bitmask over the member list | [`decode_set`] |
//! | BIT | Big-endian bit string | [`decode_bit`] |

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::schema::{Column, ColumnType};
use crate::util::hex::bytes_literal;
use crate::IdbError;

/// A decoded column value.
///
/// The variant is fully determined by the column's declared type; NULL is
/// its own variant for every type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    /// Signed integer (TINYINT, SMALLINT, MEDIUMINT, INT, BIGINT).
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    Float(f32),
    Double(f64),
    /// Exact decimal in canonical base-10 form, e.g. `-12.50`.
    Decimal(String),
    /// `YYYY-MM-DD`
    Date(String),
    /// `YYYY-MM-DD HH:MM:SS[.ffffff]`
    DateTime(String),
    /// `[-]HH:MM:SS[.ffffff]`
    Time(String),
    /// Rendered in the reader's configured time zone.
    Timestamp(String),
    Year(u16),
    Str(String),
    Bytes(Vec<u8>),
    Enum(String),
    Set(Vec<String>),
    /// Bit string, most significant bit first.
    Bit(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Int(v) => Some(v),
            FieldValue::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            FieldValue::UInt(v) => Some(v),
            FieldValue::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Textual payload of the string-like variants.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Decimal(s)
            | FieldValue::Date(s)
            | FieldValue::DateTime(s)
            | FieldValue::Time(s)
            | FieldValue::Timestamp(s)
            | FieldValue::Str(s)
            | FieldValue::Enum(s)
            | FieldValue::Bit(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Int(_) => "int",
            FieldValue::UInt(_) => "uint",
            FieldValue::Float(_) => "float",
            FieldValue::Double(_) => "double",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::Date(_) => "date",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Time(_) => "time",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Year(_) => "year",
            FieldValue::Str(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Enum(_) => "enum",
            FieldValue::Set(_) => "set",
            FieldValue::Bit(_) => "bit",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("NULL"),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::UInt(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::Year(v) => write!(f, "{:04}", v),
            FieldValue::Bytes(b) => f.write_str(&bytes_literal(b)),
            FieldValue::Set(members) => f.write_str(&members.join(",")),
            FieldValue::Bit(bits) => write!(f, "b'{}'", bits),
            other => f.write_str(other.as_str().unwrap_or_default()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Int(v) => serializer.serialize_i64(*v),
            FieldValue::UInt(v) => serializer.serialize_u64(*v),
            FieldValue::Float(v) => serializer.serialize_f32(*v),
            FieldValue::Double(v) => serializer.serialize_f64(*v),
            FieldValue::Year(v) => serializer.serialize_u16(*v),
            FieldValue::Bytes(b) => serializer.serialize_str(&bytes_literal(b)),
            FieldValue::Set(members) => {
                let mut seq = serializer.serialize_seq(Some(members.len()))?;
                for m in members {
                    seq.serialize_element(m)?;
                }
                seq.end()
            }
            other => serializer.serialize_str(other.as_str().unwrap_or_default()),
        }
    }
}

/// Settings that affect how values render.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext {
    /// Zone TIMESTAMP values are rendered in.
    pub time_zone: FixedOffset,
}

impl Default for DecodeContext {
    fn default() -> Self {
        DecodeContext {
            time_zone: utc(),
        }
    }
}

pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}

/// Decode one field of `col`.
///
/// `data` is the complete value (overflow pages already appended). For
/// prefix key fields it is the stored prefix.
pub fn decode_column(data: &[u8], col: &Column, ctx: &DecodeContext) -> Result<FieldValue, IdbError> {
    let t = col.column_type;
    let expect = |n: usize| -> Result<(), IdbError> {
        if data.len() != n {
            return Err(IdbError::Parse(format!(
                "column '{}' ({:?}) expects {} bytes, record holds {}",
                col.name,
                t,
                n,
                data.len()
            )));
        }
        Ok(())
    };

    match t {
        ColumnType::TinyInt
        | ColumnType::SmallInt
        | ColumnType::MediumInt
        | ColumnType::Int
        | ColumnType::BigInt => {
            expect(t.int_width().unwrap_or(0))?;
            decode_int(data, col.unsigned)
        }
        ColumnType::Float => {
            expect(4)?;
            decode_float(data)
        }
        ColumnType::Double => {
            expect(8)?;
            decode_double(data)
        }
        ColumnType::Decimal => {
            expect(decimal_storage_len(col.precision, col.scale))?;
            decode_decimal(data, col.precision, col.scale).map(FieldValue::Decimal)
        }
        ColumnType::Date => {
            expect(3)?;
            decode_date(data)
        }
        ColumnType::DateTime => {
            expect(5 + fsp_storage_bytes(col.fsp))?;
            decode_datetime(data, col.fsp)
        }
        ColumnType::Timestamp => {
            expect(4 + fsp_storage_bytes(col.fsp))?;
            decode_timestamp(data, col.fsp, ctx.time_zone)
        }
        ColumnType::Time => {
            expect(3 + fsp_storage_bytes(col.fsp))?;
            decode_time(data, col.fsp)
        }
        ColumnType::Year => {
            expect(1)?;
            decode_year(data)
        }
        ColumnType::Char
        | ColumnType::VarChar
        | ColumnType::TinyText
        | ColumnType::Text
        | ColumnType::MediumText
        | ColumnType::LongText => decode_string(data, col),
        ColumnType::Binary
        | ColumnType::VarBinary
        | ColumnType::TinyBlob
        | ColumnType::Blob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob
        | ColumnType::Json => Ok(FieldValue::Bytes(data.to_vec())),
        ColumnType::Enum => decode_enum(data, &col.members),
        ColumnType::Set => decode_set(data, &col.members),
        ColumnType::Bit => decode_bit(data, col.length),
    }
}

/// Decode a big-endian integer of `data.len()` bytes.
///
/// Signed values are stored with the high bit XOR'd so that memcmp order
/// matches numeric order; after undoing the XOR the value is sign-extended
/// from its stored width (which matters for the 3-byte MEDIUMINT).
///
/// # Examples
///
/// ```
/// use ibdrow::innodb::field_decode::{decode_int, FieldValue};
///
/// assert_eq!(decode_int(&[0x80, 0x00, 0x00, 0x2A], false).unwrap(), FieldValue::Int(42));
/// assert_eq!(decode_int(&[0x7F, 0xFF, 0xFF], false).unwrap(), FieldValue::Int(-1));
/// assert_eq!(decode_int(&[0xFF], true).unwrap(), FieldValue::UInt(255));
/// ```
pub fn decode_int(data: &[u8], unsigned: bool) -> Result<FieldValue, IdbError> {
    let width = data.len();
    if !(1..=8).contains(&width) {
        return Err(IdbError::Parse(format!("integer field of {} bytes", width)));
    }
    let raw = BigEndian::read_uint(data, width);
    if unsigned {
        return Ok(FieldValue::UInt(raw));
    }
    let bits = (width * 8) as u32;
    let flipped = raw ^ (1u64 << (bits - 1));
    let shift = 64 - bits;
    Ok(FieldValue::Int(((flipped << shift) as i64) >> shift))
}

/// Inverse of [`decode_int`] for signed values.
pub fn encode_int(value: i64, width: usize) -> Vec<u8> {
    let bits = (width * 8) as u32;
    let mut v = (value as u64) ^ (1u64 << (bits - 1));
    if bits < 64 {
        v &= (1u64 << bits) - 1;
    }
    v.to_be_bytes()[8 - width..].to_vec()
}

pub fn decode_float(data: &[u8]) -> Result<FieldValue, IdbError> {
    let bytes: [u8; 4] = data
        .try_into()
        .map_err(|_| IdbError::Parse(format!("FLOAT field of {} bytes", data.len())))?;
    Ok(FieldValue::Float(f32::from_le_bytes(bytes)))
}

pub fn decode_double(data: &[u8]) -> Result<FieldValue, IdbError> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| IdbError::Parse(format!("DOUBLE field of {} bytes", data.len())))?;
    Ok(FieldValue::Double(f64::from_le_bytes(bytes)))
}

/// Bytes needed for a leftover group of 0-9 decimal digits.
const DIG2BYTES: [usize; 10] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];
const DIGITS_PER_GROUP: u32 = 9;
const GROUP_BYTES: usize = 4;

/// Storage size of DECIMAL(precision, scale).
///
/// # Examples
///
/// ```
/// use ibdrow::innodb::field_decode::decimal_storage_len;
///
/// assert_eq!(decimal_storage_len(10, 2), 5);
/// assert_eq!(decimal_storage_len(18, 9), 8);
/// assert_eq!(decimal_storage_len(65, 30), 30);
/// ```
pub fn decimal_storage_len(precision: u32, scale: u32) -> usize {
    let intg = precision.saturating_sub(scale);
    let (intg0, intg0x) = (intg / DIGITS_PER_GROUP, intg % DIGITS_PER_GROUP);
    let (frac0, frac0x) = (scale / DIGITS_PER_GROUP, scale % DIGITS_PER_GROUP);
    intg0 as usize * GROUP_BYTES
        + DIG2BYTES[intg0x as usize]
        + frac0 as usize * GROUP_BYTES
        + DIG2BYTES[frac0x as usize]
}

/// Decode a packed DECIMAL(precision, scale) into its canonical string.
///
/// Positive values have the high bit of byte 0 set; negative values are
/// additionally stored with every byte complemented.
pub fn decode_decimal(data: &[u8], precision: u32, scale: u32) -> Result<String, IdbError> {
    let size = decimal_storage_len(precision, scale);
    if data.len() != size || size == 0 {
        return Err(IdbError::Parse(format!(
            "DECIMAL({},{}) needs {} bytes, got {}",
            precision,
            scale,
            size,
            data.len()
        )));
    }

    let mut buf = data.to_vec();
    let negative = buf[0] & 0x80 == 0;
    buf[0] ^= 0x80;
    if negative {
        buf.iter_mut().for_each(|b| *b ^= 0xFF);
    }

    let intg = precision - scale;
    let (intg0, intg0x) = ((intg / DIGITS_PER_GROUP) as usize, (intg % DIGITS_PER_GROUP) as usize);
    let (frac0, frac0x) = ((scale / DIGITS_PER_GROUP) as usize, (scale % DIGITS_PER_GROUP) as usize);

    let mut pos = 0;
    let mut take = |n: usize| -> Result<u64, IdbError> {
        let v = if n == 0 { 0 } else { BigEndian::read_uint(&buf[pos..pos + n], n) };
        pos += n;
        Ok(v)
    };
    let check = |v: u64, digits: usize| -> Result<u64, IdbError> {
        if v >= 10u64.pow(digits as u32) {
            return Err(IdbError::Parse(format!(
                "DECIMAL group value {} exceeds {} digits",
                v, digits
            )));
        }
        Ok(v)
    };

    let mut int_digits = String::new();
    if intg0x > 0 {
        let v = check(take(DIG2BYTES[intg0x])?, intg0x)?;
        int_digits.push_str(&format!("{:0width$}", v, width = intg0x));
    }
    for _ in 0..intg0 {
        let v = check(take(GROUP_BYTES)?, 9)?;
        int_digits.push_str(&format!("{:09}", v));
    }
    let mut frac_digits = String::new();
    for _ in 0..frac0 {
        let v = check(take(GROUP_BYTES)?, 9)?;
        frac_digits.push_str(&format!("{:09}", v));
    }
    if frac0x > 0 {
        let v = check(take(DIG2BYTES[frac0x])?, frac0x)?;
        frac_digits.push_str(&format!("{:0width$}", v, width = frac0x));
    }

    let int_part = int_digits.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let is_zero = int_part == "0" && frac_digits.bytes().all(|b| b == b'0');

    let mut out = String::new();
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(int_part);
    if scale > 0 {
        out.push('.');
        out.push_str(&frac_digits);
    }
    Ok(out)
}

/// Pack a base-10 string as DECIMAL(precision, scale); the exact inverse of
/// [`decode_decimal`]. Fractions shorter than `scale` are zero-padded.
///
/// # Examples
///
/// ```
/// use ibdrow::innodb::field_decode::{decode_decimal, encode_decimal};
///
/// let packed = encode_decimal("-1234.5", 10, 2).unwrap();
/// assert_eq!(decode_decimal(&packed, 10, 2).unwrap(), "-1234.50");
/// ```
pub fn encode_decimal(value: &str, precision: u32, scale: u32) -> Result<Vec<u8>, IdbError> {
    let bad = || IdbError::Argument(format!("'{}' is not a DECIMAL({},{})", value, precision, scale));
    if scale > precision {
        return Err(bad());
    }
    let s = value.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int_str, frac_str) = s.split_once('.').unwrap_or((s, ""));
    if int_str.is_empty() && frac_str.is_empty() {
        return Err(bad());
    }
    if !int_str.bytes().chain(frac_str.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let int_str = int_str.trim_start_matches('0');
    let intg = (precision - scale) as usize;
    if int_str.len() > intg || frac_str.len() > scale as usize {
        return Err(bad());
    }

    let int_digits = format!("{:0>width$}", int_str, width = intg);
    let frac_digits = format!("{:0<width$}", frac_str, width = scale as usize);

    let (intg0x, fracx) = (intg % 9, scale as usize % 9);
    let mut out = Vec::with_capacity(decimal_storage_len(precision, scale));
    let mut push = |digits: &str| {
        let n = if digits.len() == 9 { GROUP_BYTES } else { DIG2BYTES[digits.len()] };
        let v: u64 = digits.parse().unwrap_or(0);
        out.extend_from_slice(&v.to_be_bytes()[8 - n..]);
    };
    if intg0x > 0 {
        push(&int_digits[..intg0x]);
    }
    for chunk in int_digits.as_bytes()[intg0x..].chunks(9) {
        push(std::str::from_utf8(chunk).map_err(|_| bad())?);
    }
    let full = frac_digits.len() - fracx;
    for chunk in frac_digits.as_bytes()[..full].chunks(9) {
        push(std::str::from_utf8(chunk).map_err(|_| bad())?);
    }
    if fracx > 0 {
        push(&frac_digits[full..]);
    }

    let is_zero = int_digits.bytes().chain(frac_digits.bytes()).all(|b| b == b'0');
    if negative && !is_zero {
        out.iter_mut().for_each(|b| *b ^= 0xFF);
    }
    if let Some(first) = out.first_mut() {
        *first ^= 0x80;
    }
    Ok(out)
}

/// Number of fractional-second bytes for a given precision.
pub fn fsp_storage_bytes(fsp: u8) -> usize {
    (fsp as usize).div_ceil(2)
}

/// Storage bytes of a SET with `members` members.
///
/// This is the server's pack length, one bit per member rounded up to
/// 1, 2, 3, 4 or 8 bytes. Sets of more than 8 members therefore take more
/// than the single byte a "1 byte up to 255 members" rule would give.
pub fn set_storage_len(members: usize) -> usize {
    match members.div_ceil(8) {
        n @ 0..=4 => n.max(1),
        _ => 8,
    }
}

/// Fractional seconds scaled to microseconds.
fn read_fraction(data: &[u8], fsp: u8) -> u64 {
    let n = fsp_storage_bytes(fsp);
    if n == 0 || data.len() < n {
        return 0;
    }
    let frac = BigEndian::read_uint(data, n);
    match n {
        1 => frac * 10_000,
        2 => frac * 100,
        _ => frac,
    }
}

fn format_fraction(micros: u64, fsp: u8) -> String {
    if fsp == 0 {
        return String::new();
    }
    let digits = format!("{:06}", micros.min(999_999));
    format!(".{}", &digits[..fsp as usize])
}

/// Decode a 3-byte DATE: `year*16*32 + month*32 + day`, high bit XOR'd.
pub fn decode_date(data: &[u8]) -> Result<FieldValue, IdbError> {
    if data.len() != 3 {
        return Err(IdbError::Parse(format!("DATE field of {} bytes", data.len())));
    }
    let val = BigEndian::read_u24(data) ^ 0x80_0000;
    let day = val & 0x1F;
    let month = (val >> 5) & 0x0F;
    let year = val >> 9;
    Ok(FieldValue::Date(format!("{:04}-{:02}-{:02}", year, month, day)))
}

/// Decode a DATETIME(fsp).
///
/// The first 5 bytes hold, big-endian with the high bit XOR'd:
/// `sign(1) | year*13+month(17) | day(5) | hour(5) | minute(6) | second(6)`.
///
/// # Examples
///
/// ```
/// use ibdrow::innodb::field_decode::{decode_datetime, FieldValue};
///
/// let v = decode_datetime(&[0x99, 0xA4, 0x44, 0xAE, 0xFB], 0).unwrap();
/// assert_eq!(v, FieldValue::DateTime("2019-10-02 10:59:59".to_string()));
/// ```
pub fn decode_datetime(data: &[u8], fsp: u8) -> Result<FieldValue, IdbError> {
    if data.len() != 5 + fsp_storage_bytes(fsp) {
        return Err(IdbError::Parse(format!(
            "DATETIME({}) field of {} bytes",
            fsp,
            data.len()
        )));
    }
    let val = BigEndian::read_uint(&data[..5], 5) ^ (1u64 << 39);

    let second = val & 0x3F;
    let minute = (val >> 6) & 0x3F;
    let hour = (val >> 12) & 0x1F;
    let day = (val >> 17) & 0x1F;
    let year_month = (val >> 22) & 0x1FFFF;
    let year = year_month / 13;
    let month = year_month % 13;

    Ok(FieldValue::DateTime(format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}{}",
        year,
        month,
        day,
        hour,
        minute,
        second,
        format_fraction(read_fraction(&data[5..], fsp), fsp)
    )))
}

/// Pack a DATETIME(0) value.
pub fn encode_datetime(year: u32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Vec<u8> {
    let ym = (year * 13 + month) as u64;
    let val = (ym << 22)
        | ((day as u64) << 17)
        | ((hour as u64) << 12)
        | ((minute as u64) << 6)
        | second as u64;
    (val | (1u64 << 39)).to_be_bytes()[3..].to_vec()
}

/// Offset added to a TIME's packed integer part.
const TIMEF_INT_OFS: i64 = 0x80_0000;
/// Offset for the 6-byte TIME(5)/TIME(6) form.
const TIMEF_OFS: i64 = 0x8000_0000_0000;

/// Decode a TIME(fsp): 3 bytes minus 0x800000, plus fractional bytes.
pub fn decode_time(data: &[u8], fsp: u8) -> Result<FieldValue, IdbError> {
    let nfrac = fsp_storage_bytes(fsp);
    if data.len() != 3 + nfrac {
        return Err(IdbError::Parse(format!("TIME({}) field of {} bytes", fsp, data.len())));
    }

    // packed = (hms << 24) + microseconds, signed
    let packed: i64 = match nfrac {
        0 => (BigEndian::read_u24(data) as i64 - TIMEF_INT_OFS) << 24,
        1 | 2 => {
            let mut intpart = BigEndian::read_u24(data) as i64 - TIMEF_INT_OFS;
            let mut frac = BigEndian::read_uint(&data[3..], nfrac) as i64;
            let unit = 1i64 << (8 * nfrac);
            if intpart < 0 && frac != 0 {
                intpart += 1;
                frac -= unit;
            }
            let scale = if nfrac == 1 { 10_000 } else { 100 };
            (intpart << 24) + frac * scale
        }
        _ => BigEndian::read_uint(data, 6) as i64 - TIMEF_OFS,
    };

    let negative = packed < 0;
    let packed = packed.unsigned_abs();
    let hms = packed >> 24;
    let micros = packed & 0xFF_FFFF;
    let hour = (hms >> 12) & 0x3FF;
    let minute = (hms >> 6) & 0x3F;
    let second = hms & 0x3F;

    Ok(FieldValue::Time(format!(
        "{}{:02}:{:02}:{:02}{}",
        if negative { "-" } else { "" },
        hour,
        minute,
        second,
        format_fraction(micros, fsp)
    )))
}

/// Decode a TIMESTAMP(fsp): big-endian epoch seconds plus fraction.
///
/// Zero is the "zero date" and renders without a time zone.
pub fn decode_timestamp(data: &[u8], fsp: u8, tz: FixedOffset) -> Result<FieldValue, IdbError> {
    if data.len() != 4 + fsp_storage_bytes(fsp) {
        return Err(IdbError::Parse(format!(
            "TIMESTAMP({}) field of {} bytes",
            fsp,
            data.len()
        )));
    }
    let secs = BigEndian::read_u32(data) as i64;
    let frac = format_fraction(read_fraction(&data[4..], fsp), fsp);
    if secs == 0 {
        return Ok(FieldValue::Timestamp(format!("0000-00-00 00:00:00{}", frac)));
    }
    let dt = DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| IdbError::Parse(format!("TIMESTAMP {} out of range", secs)))?
        .with_timezone(&tz);
    Ok(FieldValue::Timestamp(format!(
        "{}{}",
        dt.format("%Y-%m-%d %H:%M:%S"),
        frac
    )))
}

pub fn decode_year(data: &[u8]) -> Result<FieldValue, IdbError> {
    match data {
        [0] => Ok(FieldValue::Year(0)),
        [v] => Ok(FieldValue::Year(1900 + *v as u16)),
        _ => Err(IdbError::Parse(format!("YEAR field of {} bytes", data.len()))),
    }
}

/// Decode character data through the column's charset.
///
/// Fixed CHAR under a single-byte charset keeps its space padding; CHAR
/// stored as variable length (multi-byte charsets) is trimmed.
pub fn decode_string(data: &[u8], col: &Column) -> Result<FieldValue, IdbError> {
    let text = col.resolved_charset().decode(data)?;
    if col.column_type == ColumnType::Char && col.multibyte_char_as_varlen {
        return Ok(FieldValue::Str(text.trim_end_matches(' ').to_string()));
    }
    Ok(FieldValue::Str(text))
}

/// ENUM: 1-based index into `members` (0 is the empty error value).
pub fn decode_enum(data: &[u8], members: &[String]) -> Result<FieldValue, IdbError> {
    let width = if members.len() <= 255 { 1 } else { 2 };
    if data.len() != width {
        return Err(IdbError::Parse(format!(
            "ENUM with {} members needs {} bytes, got {}",
            members.len(),
            width,
            data.len()
        )));
    }
    let idx = BigEndian::read_uint(data, width) as usize;
    if idx == 0 {
        return Ok(FieldValue::Enum(String::new()));
    }
    members
        .get(idx - 1)
        .map(|m| FieldValue::Enum(m.clone()))
        .ok_or_else(|| {
            IdbError::Parse(format!(
                "ENUM index {} exceeds {} members",
                idx,
                members.len()
            ))
        })
}

/// SET: bit `i` of the big-endian mask selects member `i`.
pub fn decode_set(data: &[u8], members: &[String]) -> Result<FieldValue, IdbError> {
    let width = set_storage_len(members.len());
    if data.len() != width {
        return Err(IdbError::Parse(format!(
            "SET with {} members needs {} bytes, got {}",
            members.len(),
            width,
            data.len()
        )));
    }
    let mask = BigEndian::read_uint(data, width);
    if members.len() < 64 && mask >> members.len() != 0 {
        return Err(IdbError::Parse(format!(
            "SET mask 0x{:x} has bits beyond {} members",
            mask,
            members.len()
        )));
    }
    Ok(FieldValue::Set(
        members
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1u64 << i) != 0)
            .map(|(_, m)| m.clone())
            .collect(),
    ))
}

/// BIT(n): the stored bytes read as one big-endian number (the byte order
/// is reversed relative to a little-endian read) rendered as `n` bits.
pub fn decode_bit(data: &[u8], bits: u32) -> Result<FieldValue, IdbError> {
    let width = (bits as usize).div_ceil(8);
    if data.len() != width || width == 0 || width > 8 {
        return Err(IdbError::Parse(format!(
            "BIT({}) field of {} bytes",
            bits,
            data.len()
        )));
    }
    let mut le = data.to_vec();
    le.reverse();
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(&le);
    let value = u64::from_le_bytes(buf);
    Ok(FieldValue::Bit(format!("{:0width$b}", value, width = bits as usize)))
}
