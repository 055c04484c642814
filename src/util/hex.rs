//! Hex formatting for binary column values and record dumps.

use std::fmt::Write;

use crate::IdbError;

/// Format bytes as a compact lowercase hex string (e.g., "4a2f00ff").
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Format bytes as a `0x`-prefixed literal, the form binary values take in
/// JSON and text output.
pub fn bytes_literal(data: &[u8]) -> String {
    format!("0x{}", to_hex(data))
}

/// Parse a hex string, with or without a `0x` prefix.
///
/// # Examples
///
/// ```
/// use ibdrow::util::hex::parse_hex;
///
/// assert_eq!(parse_hex("0xdead").unwrap(), vec![0xde, 0xad]);
/// assert_eq!(parse_hex("00FF").unwrap(), vec![0x00, 0xff]);
/// assert!(parse_hex("abc").is_err());
/// ```
pub fn parse_hex(s: &str) -> Result<Vec<u8>, IdbError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.len() % 2 != 0 {
        return Err(IdbError::Argument(format!("odd number of hex digits in '{}'", s)));
    }
    digits
        .as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|p| u8::from_str_radix(p, 16).ok())
                .ok_or_else(|| IdbError::Argument(format!("invalid hex in '{}'", s)))
        })
        .collect()
}

/// Hex dump with offset column and ASCII sidebar, 16 bytes per line:
///
/// ```text
/// 00000000  xx xx xx xx xx xx xx xx  xx xx xx xx xx xx xx xx  |................|
/// ```
pub fn hex_dump(data: &[u8], base_offset: u64) -> String {
    data.chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("{:08x}  ", base_offset + (i * 16) as u64);
            for j in 0..16 {
                if j == 8 {
                    line.push(' ');
                }
                match chunk.get(j) {
                    Some(b) => {
                        let _ = write!(line, "{:02x} ", b);
                    }
                    None => line.push_str("   "),
                }
            }
            let ascii: String = chunk
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            let _ = write!(line, " |{:<16}|", ascii);
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x4a, 0x2f, 0x00, 0xff]), "4a2f00ff");
        assert_eq!(to_hex(&[]), "");
        assert_eq!(bytes_literal(&[0x01]), "0x01");
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("zz").is_err());
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_hex_dump_full_line() {
        let data: Vec<u8> = (0..16).collect();
        let output = hex_dump(&data, 0);
        assert!(output.starts_with("00000000  "));
        assert!(output.contains("00 01 02 03 04 05 06 07  08 09 0a 0b 0c 0d 0e 0f"));
    }

    #[test]
    fn test_hex_dump_partial_line() {
        let output = hex_dump(b"Hello", 0x100);
        assert!(output.starts_with("00000100  "));
        assert!(output.contains("48 65 6c 6c 6f"));
        assert!(output.contains("|Hello           |"));
    }

    #[test]
    fn test_hex_dump_nonprintable() {
        let output = hex_dump(&[0x00, 0x01, 0x7f, 0x80, 0xff], 0);
        assert!(output.contains("|....."));
    }
}
