//! Table definitions.
//!
//! A [`TableDef`] is the externally supplied description of a table: its
//! columns in declaration order, the primary key and any secondary keys.
//! It is built once through [`TableDef::new`] (or deserialized from JSON,
//! which goes through the same validation) and never changes afterwards;
//! the reader shares it behind an `Arc`.
//!
//! Building a definition resolves each string column's charset and
//! collation against the table defaults and derives the storage facts the
//! record codec needs: fixed width, whether the field is variable length,
//! whether its length prefix may take two bytes.
//!
//! ```
//! use ibdrow::schema::{Column, ColumnType, KeyMeta, RawTableDef, TableDef};
//!
//! let def = TableDef::new(RawTableDef {
//!     name: "t".to_string(),
//!     columns: vec![
//!         Column::new("id", ColumnType::Int),
//!         Column::new("name", ColumnType::VarChar).length(64).nullable(),
//!     ],
//!     primary_key: Some(KeyMeta::primary(&["id"])),
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! assert!(def.has_primary_key());
//! assert!(def.column("name").unwrap().is_variable_length);
//! ```

pub mod charset;
pub mod sdi;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::innodb::field_decode::{decimal_storage_len, fsp_storage_bytes, set_storage_len};
use crate::IdbError;
use charset::{charset_for_collation, is_case_sensitive, Charset};

/// Column data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Date,
    DateTime,
    Timestamp,
    Time,
    Year,
    Char,
    VarChar,
    Binary,
    VarBinary,
    TinyText,
    Text,
    MediumText,
    LongText,
    TinyBlob,
    Blob,
    MediumBlob,
    LongBlob,
    Json,
    Enum,
    Set,
    Bit,
}

impl ColumnType {
    /// Width in bytes of an integer type.
    pub fn int_width(self) -> Option<usize> {
        match self {
            ColumnType::TinyInt => Some(1),
            ColumnType::SmallInt => Some(2),
            ColumnType::MediumInt => Some(3),
            ColumnType::Int => Some(4),
            ColumnType::BigInt => Some(8),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self.int_width().is_some()
    }

    /// TEXT, BLOB and JSON: always "big" and eligible for off-page storage.
    pub fn is_lob(self) -> bool {
        matches!(
            self,
            ColumnType::TinyText
                | ColumnType::Text
                | ColumnType::MediumText
                | ColumnType::LongText
                | ColumnType::TinyBlob
                | ColumnType::Blob
                | ColumnType::MediumBlob
                | ColumnType::LongBlob
                | ColumnType::Json
        )
    }

    /// Character data decoded through a charset.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            ColumnType::Char
                | ColumnType::VarChar
                | ColumnType::TinyText
                | ColumnType::Text
                | ColumnType::MediumText
                | ColumnType::LongText
        )
    }

    /// Byte strings returned as-is.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            ColumnType::Binary
                | ColumnType::VarBinary
                | ColumnType::TinyBlob
                | ColumnType::Blob
                | ColumnType::MediumBlob
                | ColumnType::LongBlob
                | ColumnType::Json
        )
    }

    fn lob_max_bytes(self) -> u32 {
        match self {
            ColumnType::TinyText | ColumnType::TinyBlob => 255,
            ColumnType::Text | ColumnType::Blob => 65_535,
            ColumnType::MediumText | ColumnType::MediumBlob => 16_777_215,
            _ => u32::MAX,
        }
    }
}

/// One column of a table.
///
/// The fields after `members` are derived by [`TableDef::new`] and are not
/// part of the JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unsigned: bool,
    /// Characters for CHAR/VARCHAR, bytes for BINARY/VARBINARY, bits for BIT.
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub precision: u32,
    #[serde(default)]
    pub scale: u32,
    /// Fractional seconds precision (0-6) for TIME, DATETIME, TIMESTAMP.
    #[serde(default)]
    pub fsp: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<Charset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// ENUM/SET members in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,

    #[serde(skip)]
    pub ordinal: usize,
    #[serde(skip)]
    pub is_variable_length: bool,
    /// CHAR stored as a variable-length field because the charset is
    /// variable width.
    #[serde(skip)]
    pub multibyte_char_as_varlen: bool,
    /// Largest number of bytes the column can occupy.
    #[serde(skip)]
    pub max_byte_len: u32,
    #[serde(skip)]
    pub case_sensitive: bool,
}

impl Column {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Column {
            name: name.to_string(),
            column_type,
            nullable: false,
            unsigned: false,
            length: 0,
            precision: 0,
            scale: 0,
            fsp: 0,
            charset: None,
            collation: None,
            members: Vec::new(),
            ordinal: 0,
            is_variable_length: false,
            multibyte_char_as_varlen: false,
            max_byte_len: 0,
            case_sensitive: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn decimal(mut self, precision: u32, scale: u32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn fsp(mut self, fsp: u8) -> Self {
        self.fsp = fsp;
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = Some(charset);
        self
    }

    pub fn collation(mut self, collation: &str) -> Self {
        self.collation = Some(collation.to_string());
        self
    }

    pub fn members(mut self, members: &[&str]) -> Self {
        self.members = members.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Resolved charset (binary for non-text columns).
    pub fn resolved_charset(&self) -> Charset {
        self.charset.unwrap_or(Charset::Binary)
    }

    /// Stored width when the column is fixed length.
    pub fn fixed_len(&self) -> Option<usize> {
        if self.is_variable_length {
            return None;
        }
        let n = match self.column_type {
            ColumnType::Float => 4,
            ColumnType::Double => 8,
            ColumnType::Decimal => decimal_storage_len(self.precision, self.scale),
            ColumnType::Date => 3,
            ColumnType::Time => 3 + fsp_storage_bytes(self.fsp),
            ColumnType::DateTime => 5 + fsp_storage_bytes(self.fsp),
            ColumnType::Timestamp => 4 + fsp_storage_bytes(self.fsp),
            ColumnType::Year => 1,
            ColumnType::Char => (self.length * self.resolved_charset().max_bytes()) as usize,
            ColumnType::Binary => self.length as usize,
            ColumnType::Enum => {
                if self.members.len() <= 255 {
                    1
                } else {
                    2
                }
            }
            ColumnType::Set => set_storage_len(self.members.len()),
            ColumnType::Bit => (self.length as usize).div_ceil(8),
            t => t.int_width()?,
        };
        Some(n)
    }

    /// True when a variable-length prefix for this column may take two
    /// bytes.
    pub fn is_big(&self) -> bool {
        self.max_byte_len > 255 || self.column_type.is_lob()
    }

    fn derive(&mut self, ordinal: usize, table_charset: Charset, table_collation: &str) -> Result<(), IdbError> {
        self.ordinal = ordinal;
        let t = self.column_type;
        let name = self.name.clone();
        let bad = |msg: String| IdbError::Argument(format!("column '{}': {}", name, msg));

        match t {
            ColumnType::Decimal => {
                if self.precision == 0 || self.precision > 65 || self.scale > self.precision || self.scale > 30 {
                    return Err(bad(format!(
                        "invalid DECIMAL({},{})",
                        self.precision, self.scale
                    )));
                }
            }
            ColumnType::Time | ColumnType::DateTime | ColumnType::Timestamp => {
                if self.fsp > 6 {
                    return Err(bad(format!("fractional precision {} exceeds 6", self.fsp)));
                }
            }
            ColumnType::Enum if self.members.is_empty() || self.members.len() > 65_535 => {
                return Err(bad(format!("ENUM needs 1..=65535 members, has {}", self.members.len())));
            }
            ColumnType::Set if self.members.is_empty() || self.members.len() > 64 => {
                return Err(bad(format!("SET needs 1..=64 members, has {}", self.members.len())));
            }
            ColumnType::Bit if self.length == 0 || self.length > 64 => {
                return Err(bad(format!("BIT({}) out of range", self.length)));
            }
            ColumnType::Char | ColumnType::Binary if self.length > 255 => {
                return Err(bad(format!("length {} exceeds 255", self.length)));
            }
            _ => {}
        }

        if t.is_text() {
            let charset = match (self.charset, self.collation.as_deref()) {
                (Some(c), _) => c,
                (None, Some(coll)) => charset_for_collation(coll)
                    .ok_or_else(|| bad(format!("unknown collation '{}'", coll)))?,
                (None, None) => table_charset,
            };
            let collation = match self.collation.take() {
                Some(c) => c,
                None if charset == table_charset => table_collation.to_string(),
                None => charset.default_collation().to_string(),
            };
            self.case_sensitive = is_case_sensitive(&collation);
            self.charset = Some(charset);
            self.collation = Some(collation);
        } else if t.is_binary() {
            self.charset = Some(Charset::Binary);
            self.collation = Some("binary".to_string());
            self.case_sensitive = true;
        }

        let charset = self.resolved_charset();
        self.multibyte_char_as_varlen = t == ColumnType::Char && charset.is_variable_width();
        self.is_variable_length = matches!(t, ColumnType::VarChar | ColumnType::VarBinary)
            || t.is_lob()
            || self.multibyte_char_as_varlen;

        self.max_byte_len = match t {
            ColumnType::Char | ColumnType::VarChar => self.length.saturating_mul(charset.max_bytes()),
            ColumnType::VarBinary => self.length,
            _ if t.is_lob() => t.lob_max_bytes(),
            _ => self.fixed_len().unwrap_or(0) as u32,
        };
        Ok(())
    }
}

/// Index kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Primary,
    Unique,
    #[default]
    Index,
    Fulltext,
}

/// One key column with an optional prefix length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "KeyPartInput")]
pub struct KeyPart {
    pub column: String,
    /// Prefix length in characters (bytes for binary columns).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_len: Option<u32>,

    #[serde(skip)]
    pub ordinal: usize,
    /// Whether this key field is stored with a length prefix.
    #[serde(skip)]
    pub is_variable_length: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyPartInput {
    Name(String),
    Full {
        column: String,
        #[serde(default)]
        prefix_len: Option<u32>,
    },
}

impl From<KeyPartInput> for KeyPart {
    fn from(input: KeyPartInput) -> Self {
        match input {
            KeyPartInput::Name(column) => KeyPart::new(&column),
            KeyPartInput::Full { column, prefix_len } => KeyPart {
                prefix_len,
                ..KeyPart::new(&column)
            },
        }
    }
}

impl KeyPart {
    pub fn new(column: &str) -> Self {
        KeyPart {
            column: column.to_string(),
            prefix_len: None,
            ordinal: 0,
            is_variable_length: false,
        }
    }

    pub fn prefix(column: &str, len: u32) -> Self {
        KeyPart {
            prefix_len: Some(len),
            ..KeyPart::new(column)
        }
    }

    /// Maximum stored bytes of a prefix part.
    pub fn prefix_bytes(&self, col: &Column) -> Option<usize> {
        let len = self.prefix_len?;
        let unit = if col.column_type.is_text() {
            col.resolved_charset().max_bytes()
        } else {
            1
        };
        Some((len * unit) as usize)
    }
}

/// Key metadata: a named, ordered list of key parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: KeyKind,
    pub parts: Vec<KeyPart>,
    /// Authoritative root page, when known (from SDI or the caller).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_page: Option<u32>,
}

impl KeyMeta {
    pub fn primary(columns: &[&str]) -> Self {
        KeyMeta {
            name: "PRIMARY".to_string(),
            kind: KeyKind::Primary,
            parts: columns.iter().map(|c| KeyPart::new(c)).collect(),
            root_page: None,
        }
    }

    pub fn index(name: &str, columns: &[&str]) -> Self {
        KeyMeta {
            name: name.to_string(),
            kind: KeyKind::Index,
            parts: columns.iter().map(|c| KeyPart::new(c)).collect(),
            root_page: None,
        }
    }

    pub fn unique(name: &str, columns: &[&str]) -> Self {
        KeyMeta {
            kind: KeyKind::Unique,
            ..KeyMeta::index(name, columns)
        }
    }

    pub fn with_parts(name: &str, kind: KeyKind, parts: Vec<KeyPart>) -> Self {
        KeyMeta {
            name: name.to_string(),
            kind,
            parts,
            root_page: None,
        }
    }

    pub fn with_root_page(mut self, page: u32) -> Self {
        self.root_page = Some(page);
        self
    }

    pub fn ordinals(&self) -> impl Iterator<Item = usize> + '_ {
        self.parts.iter().map(|p| p.ordinal)
    }
}

/// Input form of a [`TableDef`]; what JSON deserializes into before
/// validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTableDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub charset: Option<Charset>,
    #[serde(default)]
    pub collation: Option<String>,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_key: Option<KeyMeta>,
    #[serde(default)]
    pub secondary_keys: Vec<KeyMeta>,
    /// Root page of the clustered index, when known.
    #[serde(default)]
    pub clustered_root: Option<u32>,
}

/// A validated, immutable table definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawTableDef")]
pub struct TableDef {
    name: String,
    charset: Charset,
    collation: String,
    columns: Vec<Column>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_key: Option<KeyMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    secondary_keys: Vec<KeyMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clustered_root: Option<u32>,
}

impl TryFrom<RawTableDef> for TableDef {
    type Error = IdbError;

    fn try_from(raw: RawTableDef) -> Result<Self, Self::Error> {
        TableDef::new(raw)
    }
}

impl TableDef {
    /// Validate a raw definition and derive per-column storage facts.
    pub fn new(raw: RawTableDef) -> Result<Self, IdbError> {
        if raw.columns.is_empty() {
            return Err(IdbError::Argument(format!(
                "table '{}' has no columns",
                raw.name
            )));
        }

        let charset = match (raw.charset, raw.collation.as_deref()) {
            (Some(c), _) => c,
            (None, Some(coll)) => charset_for_collation(coll).ok_or_else(|| {
                IdbError::Argument(format!("unknown table collation '{}'", coll))
            })?,
            (None, None) => Charset::Utf8mb4,
        };
        let collation = raw
            .collation
            .unwrap_or_else(|| charset.default_collation().to_string());

        let mut columns = raw.columns;
        for (i, col) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&col.name))
            {
                return Err(IdbError::Argument(format!(
                    "duplicate column '{}'",
                    col.name
                )));
            }
        }

        let mut primary_key = raw.primary_key;
        if let Some(pk) = primary_key.as_mut() {
            pk.kind = KeyKind::Primary;
            if pk.name.is_empty() {
                pk.name = "PRIMARY".to_string();
            }
            if pk.parts.iter().any(|p| p.prefix_len.is_some()) {
                return Err(IdbError::Argument(
                    "primary key parts cannot be prefixes".to_string(),
                ));
            }
            for part in &pk.parts {
                let col = columns
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(&part.column))
                    .ok_or_else(|| {
                        IdbError::Argument(format!("primary key column '{}' not found", part.column))
                    })?;
                if col.nullable {
                    debug!(column = %col.name, "primary key column forced NOT NULL");
                    col.nullable = false;
                }
            }
        }

        for (i, col) in columns.iter_mut().enumerate() {
            col.derive(i, charset, &collation)?;
        }

        if let Some(pk) = primary_key.as_mut() {
            bind_parts(pk, &columns)?;
        }
        let mut secondary_keys = raw.secondary_keys;
        for (i, key) in secondary_keys.iter_mut().enumerate() {
            if key.kind == KeyKind::Primary {
                return Err(IdbError::Argument(format!(
                    "secondary key '{}' is declared PRIMARY",
                    key.name
                )));
            }
            if key.name.is_empty() {
                key.name = format!("key{}", i);
            }
            bind_parts(key, &columns)?;
        }

        let clustered_root = raw
            .clustered_root
            .or_else(|| primary_key.as_ref().and_then(|pk| pk.root_page));

        Ok(TableDef {
            name: raw.name,
            charset,
            collation,
            columns,
            primary_key,
            secondary_keys,
            clustered_root,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn collation(&self) -> &str {
        &self.collation
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.column(name).map(|c| c.ordinal)
    }

    pub fn primary_key(&self) -> Option<&KeyMeta> {
        self.primary_key.as_ref()
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key.is_some()
    }

    pub fn secondary_keys(&self) -> &[KeyMeta] {
        &self.secondary_keys
    }

    /// Clustered index root recorded in the definition (from SDI or the
    /// primary key's `root_page`).
    pub fn clustered_root(&self) -> Option<u32> {
        self.clustered_root
    }

    /// True if the column at `ordinal` is part of the primary key.
    pub fn is_pk_column(&self, ordinal: usize) -> bool {
        self.primary_key
            .as_ref()
            .is_some_and(|pk| pk.ordinals().any(|o| o == ordinal))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

fn bind_parts(key: &mut KeyMeta, columns: &[Column]) -> Result<(), IdbError> {
    if key.parts.is_empty() && key.kind != KeyKind::Fulltext {
        return Err(IdbError::Argument(format!("key '{}' has no columns", key.name)));
    }
    for part in &mut key.parts {
        let col = columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&part.column))
            .ok_or_else(|| {
                IdbError::Argument(format!(
                    "key '{}' references unknown column '{}'",
                    key.name, part.column
                ))
            })?;
        if let Some(len) = part.prefix_len {
            let t = col.column_type;
            if !(t.is_text() || t.is_binary()) || len == 0 {
                return Err(IdbError::Argument(format!(
                    "key '{}': prefix length {} not allowed on column '{}'",
                    key.name, len, col.name
                )));
            }
        }
        part.ordinal = col.ordinal;
        part.is_variable_length = col.is_variable_length;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableDef {
        TableDef::new(RawTableDef {
            name: "t".to_string(),
            columns: vec![
                Column::new("id", ColumnType::Int),
                Column::new("a", ColumnType::BigInt).nullable(),
                Column::new("b", ColumnType::VarChar).length(64).nullable(),
                Column::new("c", ColumnType::VarChar).length(1024).nullable(),
                Column::new("code", ColumnType::Char).length(4).charset(Charset::Latin1),
                Column::new("title", ColumnType::Char).length(4),
            ],
            primary_key: Some(KeyMeta::primary(&["id"])),
            secondary_keys: vec![KeyMeta::index("idx_b", &["b"])],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_derived_flags() {
        let def = sample();
        let b = def.column("b").unwrap();
        assert!(b.is_variable_length);
        assert!(b.is_big()); // 64 chars * 4 bytes
        let c = def.column("c").unwrap();
        assert!(c.is_big());
        let code = def.column("code").unwrap();
        assert!(!code.is_variable_length);
        assert_eq!(code.fixed_len(), Some(4));
        let title = def.column("title").unwrap();
        assert!(title.multibyte_char_as_varlen);
        assert!(title.is_variable_length);
        assert_eq!(title.collation.as_deref(), Some("utf8mb4_0900_ai_ci"));
    }

    #[test]
    fn test_key_binding() {
        let def = sample();
        let pk = def.primary_key().unwrap();
        assert_eq!(pk.parts[0].ordinal, 0);
        let sk = &def.secondary_keys()[0];
        assert_eq!(sk.parts[0].ordinal, 2);
        assert!(sk.parts[0].is_variable_length);
        assert!(def.is_pk_column(0));
        assert!(!def.is_pk_column(1));
    }

    #[test]
    fn test_unknown_key_column() {
        let err = TableDef::new(RawTableDef {
            columns: vec![Column::new("id", ColumnType::Int)],
            primary_key: Some(KeyMeta::primary(&["nope"])),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, IdbError::Argument(_)));
    }

    #[test]
    fn test_duplicate_column() {
        assert!(TableDef::new(RawTableDef {
            columns: vec![
                Column::new("id", ColumnType::Int),
                Column::new("ID", ColumnType::Int),
            ],
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_bad_decimal() {
        assert!(TableDef::new(RawTableDef {
            columns: vec![Column::new("d", ColumnType::Decimal).decimal(10, 12)],
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_nullable_pk_forced_not_null() {
        let def = TableDef::new(RawTableDef {
            columns: vec![Column::new("id", ColumnType::Int).nullable()],
            primary_key: Some(KeyMeta::primary(&["id"])),
            ..Default::default()
        })
        .unwrap();
        assert!(!def.columns()[0].nullable);
    }

    #[test]
    fn test_json_form() {
        let json = r#"{
            "name": "t",
            "charset": "latin1",
            "columns": [
                {"name": "id", "type": "int", "unsigned": true},
                {"name": "s", "type": "varchar", "length": 300, "nullable": true},
                {"name": "e", "type": "enum", "members": ["x", "y"]}
            ],
            "primary_key": {"parts": ["id"]},
            "secondary_keys": [
                {"name": "k_s", "parts": [{"column": "s", "prefix_len": 10}]}
            ]
        }"#;
        let def: TableDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.charset(), Charset::Latin1);
        assert_eq!(def.collation(), "latin1_swedish_ci");
        assert_eq!(def.primary_key().unwrap().name, "PRIMARY");
        assert_eq!(def.secondary_keys()[0].parts[0].prefix_len, Some(10));
        assert!(def.column("s").unwrap().is_big());
        assert_eq!(def.column("e").unwrap().fixed_len(), Some(1));

        // Serialized form reads back to the same definition
        let back: TableDef = serde_json::from_str(&serde_json::to_string(&def).unwrap()).unwrap();
        assert_eq!(back.column_names(), def.column_names());
    }

    #[test]
    fn test_json_validation_runs() {
        let json = r#"{"columns": [{"name": "b", "type": "bit", "length": 0}]}"#;
        assert!(serde_json::from_str::<TableDef>(json).is_err());
    }
}
