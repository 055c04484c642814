//! Character set and collation lookup tables.
//!
//! Everything here is a pure function of a name or id. The reader only needs
//! three facts about a charset: how many bytes a character may take (which
//! decides whether CHAR is stored fixed or variable length), how to turn
//! stored bytes into a `String`, and whether a collation compares
//! case-sensitively.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::IdbError;

/// Character sets the column codec can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    Binary,
    Ascii,
    Latin1,
    Utf8mb3,
    Utf8mb4,
    Ucs2,
    Utf16,
    Utf32,
}

impl Charset {
    /// Look up a charset by its MySQL name. `utf8` is the 3-byte alias.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibdrow::schema::charset::Charset;
    ///
    /// assert_eq!(Charset::from_name("utf8"), Some(Charset::Utf8mb3));
    /// assert_eq!(Charset::from_name("UTF8MB4"), Some(Charset::Utf8mb4));
    /// assert_eq!(Charset::from_name("koi8r"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "binary" => Some(Charset::Binary),
            "ascii" => Some(Charset::Ascii),
            "latin1" => Some(Charset::Latin1),
            "utf8" | "utf8mb3" => Some(Charset::Utf8mb3),
            "utf8mb4" => Some(Charset::Utf8mb4),
            "ucs2" => Some(Charset::Ucs2),
            "utf16" => Some(Charset::Utf16),
            "utf32" => Some(Charset::Utf32),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Charset::Binary => "binary",
            Charset::Ascii => "ascii",
            Charset::Latin1 => "latin1",
            Charset::Utf8mb3 => "utf8mb3",
            Charset::Utf8mb4 => "utf8mb4",
            Charset::Ucs2 => "ucs2",
            Charset::Utf16 => "utf16",
            Charset::Utf32 => "utf32",
        }
    }

    /// Minimum bytes per character.
    pub fn min_bytes(self) -> u32 {
        match self {
            Charset::Ucs2 | Charset::Utf16 => 2,
            Charset::Utf32 => 4,
            _ => 1,
        }
    }

    /// Maximum bytes per character.
    pub fn max_bytes(self) -> u32 {
        match self {
            Charset::Binary | Charset::Ascii | Charset::Latin1 => 1,
            Charset::Ucs2 => 2,
            Charset::Utf8mb3 => 3,
            Charset::Utf8mb4 | Charset::Utf16 | Charset::Utf32 => 4,
        }
    }

    /// True when characters vary in width, which makes InnoDB store CHAR(n)
    /// as a variable-length field.
    pub fn is_variable_width(self) -> bool {
        self.min_bytes() != self.max_bytes()
    }

    /// Collation used when a column names a charset but no collation.
    pub fn default_collation(self) -> &'static str {
        match self {
            Charset::Binary => "binary",
            Charset::Ascii => "ascii_general_ci",
            Charset::Latin1 => "latin1_swedish_ci",
            Charset::Utf8mb3 => "utf8mb3_general_ci",
            Charset::Utf8mb4 => "utf8mb4_0900_ai_ci",
            Charset::Ucs2 => "ucs2_general_ci",
            Charset::Utf16 => "utf16_general_ci",
            Charset::Utf32 => "utf32_general_ci",
        }
    }

    /// Decode stored bytes into a string.
    ///
    /// Latin-1 maps each byte to the code point of the same value. The
    /// multi-byte encodings reject malformed input.
    pub fn decode(self, bytes: &[u8]) -> Result<String, IdbError> {
        match self {
            Charset::Binary | Charset::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Charset::Ascii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(IdbError::Parse(format!(
                        "byte 0x{:02x} at {} is not ASCII",
                        bytes[pos], pos
                    )));
                }
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
            Charset::Utf8mb3 | Charset::Utf8mb4 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| IdbError::Parse(format!("invalid {} data: {}", self.name(), e))),
            Charset::Ucs2 | Charset::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(IdbError::Parse(format!(
                        "{} value has odd length {}",
                        self.name(),
                        bytes.len()
                    )));
                }
                let units = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]));
                char::decode_utf16(units)
                    .collect::<Result<String, _>>()
                    .map_err(|e| IdbError::Parse(format!("invalid {} data: {}", self.name(), e)))
            }
            Charset::Utf32 => {
                if bytes.len() % 4 != 0 {
                    return Err(IdbError::Parse(format!(
                        "utf32 value has length {} (not a multiple of 4)",
                        bytes.len()
                    )));
                }
                bytes
                    .chunks_exact(4)
                    .map(|c| {
                        let cp = u32::from_be_bytes([c[0], c[1], c[2], c[3]]);
                        char::from_u32(cp).ok_or_else(|| {
                            IdbError::Parse(format!("invalid utf32 code point 0x{:x}", cp))
                        })
                    })
                    .collect()
            }
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Charset implied by a collation name (the part before the first `_`).
///
/// # Examples
///
/// ```
/// use ibdrow::schema::charset::{charset_for_collation, Charset};
///
/// assert_eq!(charset_for_collation("utf8mb4_0900_ai_ci"), Some(Charset::Utf8mb4));
/// assert_eq!(charset_for_collation("latin1_bin"), Some(Charset::Latin1));
/// assert_eq!(charset_for_collation("binary"), Some(Charset::Binary));
/// ```
pub fn charset_for_collation(collation: &str) -> Option<Charset> {
    let prefix = collation.split('_').next().unwrap_or(collation);
    Charset::from_name(prefix)
}

/// Whether a collation compares case-sensitively.
///
/// `_bin` and `_cs` collations and the `binary` pseudo-collation do; every
/// other collation folds case.
pub fn is_case_sensitive(collation: &str) -> bool {
    let c = collation.to_ascii_lowercase();
    c == "binary" || c.ends_with("_bin") || c.ends_with("_cs")
}

/// Map common MySQL collation IDs to collation names.
///
/// Only covers the most widely-used collations. Returns None for unknown IDs.
///
/// # Examples
///
/// ```
/// use ibdrow::schema::charset::collation_name;
///
/// assert_eq!(collation_name(255), Some("utf8mb4_0900_ai_ci"));
/// assert_eq!(collation_name(63), Some("binary"));
/// assert_eq!(collation_name(45), Some("utf8mb4_general_ci"));
/// assert_eq!(collation_name(99999), None);
/// ```
pub fn collation_name(id: u64) -> Option<&'static str> {
    match id {
        8 => Some("latin1_swedish_ci"),
        11 => Some("ascii_general_ci"),
        33 => Some("utf8mb3_general_ci"),
        35 => Some("ucs2_general_ci"),
        45 => Some("utf8mb4_general_ci"),
        46 => Some("utf8mb4_bin"),
        47 => Some("latin1_bin"),
        48 => Some("latin1_general_ci"),
        49 => Some("latin1_general_cs"),
        54 => Some("utf16_general_ci"),
        60 => Some("utf32_general_ci"),
        63 => Some("binary"),
        65 => Some("ascii_bin"),
        83 => Some("utf8mb3_bin"),
        90 => Some("ucs2_bin"),
        192 => Some("utf8mb3_unicode_ci"),
        224 => Some("utf8mb4_unicode_ci"),
        255 => Some("utf8mb4_0900_ai_ci"),
        278 => Some("utf8mb4_0900_as_cs"),
        309 => Some("utf8mb4_0900_bin"),
        _ => None,
    }
}
