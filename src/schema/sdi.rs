//! Table definitions derived from SDI metadata.
//!
//! MySQL 8.0+ stores each table's data dictionary entry as JSON inside the
//! tablespace (see [`crate::innodb::sdi`] for extraction). This module
//! deserializes the parts of that JSON the reader needs and converts them to
//! a [`TableDef`], including each index's root page from its
//! `se_private_data` string.

use serde::Deserialize;
use tracing::{debug, warn};

use super::charset::{charset_for_collation, collation_name, Charset};
use super::{Column, ColumnType, KeyKind, KeyMeta, KeyPart, RawTableDef, TableDef};
use crate::IdbError;

/// Element length meaning "whole column".
const FULL_LENGTH: u64 = 4_294_967_295;

/// Column `hidden` value for engine columns (DB_TRX_ID, DB_ROLL_PTR, DB_ROW_ID).
const HIDDEN_SE: u64 = 2;
/// Column `hidden` value for columns backing functional indexes.
const HIDDEN_SQL: u64 = 3;

/// Top-level SDI envelope wrapping a dd_object.
#[derive(Debug, Deserialize)]
pub struct SdiEnvelope {
    #[serde(default)]
    pub mysqld_version_id: u64,
    /// Object type: "Table" or "Tablespace".
    #[serde(default)]
    pub dd_object_type: String,
    #[serde(default)]
    pub dd_object: DdTable,
}

/// Data dictionary table definition.
#[derive(Debug, Default, Deserialize)]
pub struct DdTable {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schema_ref: String,
    /// Default collation ID.
    #[serde(default)]
    pub collation_id: u64,
    #[serde(default)]
    pub columns: Vec<DdColumn>,
    #[serde(default)]
    pub indexes: Vec<DdIndex>,
}

/// Data dictionary column definition.
#[derive(Debug, Default, Deserialize)]
pub struct DdColumn {
    #[serde(default)]
    pub name: String,
    /// dd::enum_column_types code.
    #[serde(rename = "type", default)]
    pub dd_type: u64,
    /// SQL type string, e.g. "varchar(255)" or "int unsigned".
    #[serde(default)]
    pub column_type_utf8: String,
    /// 1 = visible, 2 = engine hidden, 3 = SQL hidden, 4 = user invisible.
    #[serde(default)]
    pub hidden: u64,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unsigned: bool,
    #[serde(default)]
    pub is_virtual: bool,
    /// Length in bytes.
    #[serde(default)]
    pub char_length: u64,
    #[serde(default)]
    pub numeric_precision: u64,
    #[serde(default)]
    pub numeric_scale: u64,
    #[serde(default)]
    pub datetime_precision: u64,
    #[serde(default)]
    pub collation_id: u64,
}

/// Data dictionary index definition.
#[derive(Debug, Default, Deserialize)]
pub struct DdIndex {
    #[serde(default)]
    pub name: String,
    /// 1=PRIMARY, 2=UNIQUE, 3=MULTIPLE, 4=FULLTEXT, 5=SPATIAL.
    #[serde(rename = "type", default)]
    pub index_type: u64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub elements: Vec<DdIndexElement>,
    /// Engine attributes, e.g. `id=146;root=4;space_id=2;`.
    #[serde(default)]
    pub se_private_data: String,
}

/// Data dictionary index element (column reference).
#[derive(Debug, Default, Deserialize)]
pub struct DdIndexElement {
    /// 0-based index into the columns array.
    #[serde(default)]
    pub column_opx: u64,
    /// Prefix length in bytes (4294967295 = full column).
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub hidden: bool,
}

/// Look up `key` in a `k=v;k=v;` attribute string.
///
/// # Examples
///
/// ```
/// use ibdrow::schema::sdi::private_data_value;
///
/// assert_eq!(private_data_value("id=146;root=4;space_id=2;", "root"), Some("4"));
/// assert_eq!(private_data_value("id=146;", "root"), None);
/// ```
pub fn private_data_value<'a>(data: &'a str, key: &str) -> Option<&'a str> {
    data.split(';')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
}

fn root_page(index: &DdIndex) -> Option<u32> {
    private_data_value(&index.se_private_data, "root").and_then(|v| v.parse().ok())
}

/// Split `name(args) modifiers` into its parts.
fn split_type(s: &str) -> (String, Vec<String>, bool) {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let (base, rest) = match lower.find('(') {
        Some(open) => (&lower[..open], &s[open..]),
        None => match lower.find(' ') {
            Some(sp) => (&lower[..sp], &s[sp..]),
            None => (lower.as_str(), ""),
        },
    };
    let mut args = Vec::new();
    let mut tail = rest;
    if rest.starts_with('(') {
        if let Some(close) = find_closing_paren(rest) {
            args = split_args(&rest[1..close]);
            tail = &rest[close + 1..];
        }
    }
    let unsigned = tail.to_ascii_lowercase().contains("unsigned");
    (base.trim().to_string(), args, unsigned)
}

fn find_closing_paren(s: &str) -> Option<usize> {
    // A doubled '' toggles twice, so escapes need no special case.
    let mut in_quote = false;
    for (i, ch) in s.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            ')' if !in_quote => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split an argument list, honoring single-quoted strings with `''` escapes.
fn split_args(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars().peekable();
    let mut in_quote = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                chars.next();
                cur.push('\'');
            }
            '\'' => in_quote = !in_quote,
            ',' if !in_quote => out.push(std::mem::take(&mut cur)),
            c if in_quote || !c.is_whitespace() => cur.push(c),
            _ => {}
        }
    }
    if !cur.is_empty() || !out.is_empty() {
        out.push(cur);
    }
    out
}

fn type_from_name(base: &str) -> Option<ColumnType> {
    let t = match base {
        "tinyint" | "bool" | "boolean" => ColumnType::TinyInt,
        "smallint" => ColumnType::SmallInt,
        "mediumint" => ColumnType::MediumInt,
        "int" | "integer" => ColumnType::Int,
        "bigint" => ColumnType::BigInt,
        "float" => ColumnType::Float,
        "double" | "real" => ColumnType::Double,
        "decimal" | "numeric" => ColumnType::Decimal,
        "date" => ColumnType::Date,
        "datetime" => ColumnType::DateTime,
        "timestamp" => ColumnType::Timestamp,
        "time" => ColumnType::Time,
        "year" => ColumnType::Year,
        "char" => ColumnType::Char,
        "varchar" => ColumnType::VarChar,
        "binary" => ColumnType::Binary,
        "varbinary" => ColumnType::VarBinary,
        "tinytext" => ColumnType::TinyText,
        "text" => ColumnType::Text,
        "mediumtext" => ColumnType::MediumText,
        "longtext" => ColumnType::LongText,
        "tinyblob" => ColumnType::TinyBlob,
        "blob" => ColumnType::Blob,
        "mediumblob" => ColumnType::MediumBlob,
        "longblob" => ColumnType::LongBlob,
        "json" => ColumnType::Json,
        "enum" => ColumnType::Enum,
        "set" => ColumnType::Set,
        "bit" => ColumnType::Bit,
        _ => return None,
    };
    Some(t)
}

/// Fallback mapping from the dd::enum_column_types code.
fn type_from_dd_code(col: &DdColumn) -> Option<ColumnType> {
    let binary = col.collation_id == 63;
    let t = match col.dd_type {
        2 => ColumnType::TinyInt,
        3 => ColumnType::SmallInt,
        4 => ColumnType::Int,
        5 => ColumnType::Float,
        6 => ColumnType::Double,
        9 => ColumnType::BigInt,
        10 => ColumnType::MediumInt,
        11 | 15 => ColumnType::Date,
        12 | 20 => ColumnType::Time,
        13 | 19 => ColumnType::DateTime,
        8 | 18 => ColumnType::Timestamp,
        14 => ColumnType::Year,
        16 | 28 if binary => ColumnType::VarBinary,
        16 | 28 => ColumnType::VarChar,
        17 => ColumnType::Bit,
        1 | 21 => ColumnType::Decimal,
        22 => ColumnType::Enum,
        23 => ColumnType::Set,
        24 if binary => ColumnType::TinyBlob,
        24 => ColumnType::TinyText,
        25 if binary => ColumnType::MediumBlob,
        25 => ColumnType::MediumText,
        26 if binary => ColumnType::LongBlob,
        26 => ColumnType::LongText,
        27 if binary => ColumnType::Blob,
        27 => ColumnType::Text,
        29 if binary => ColumnType::Binary,
        29 => ColumnType::Char,
        31 => ColumnType::Json,
        _ => return None,
    };
    Some(t)
}

fn convert_column(dd: &DdColumn, table_charset: Charset) -> Result<Column, IdbError> {
    let (base, args, unsigned_kw) = split_type(&dd.column_type_utf8);
    let column_type = type_from_name(&base)
        .or_else(|| type_from_dd_code(dd))
        .ok_or_else(|| {
            IdbError::Parse(format!(
                "column '{}' has unsupported type '{}' (dd type {})",
                dd.name, dd.column_type_utf8, dd.dd_type
            ))
        })?;

    let mut col = Column::new(&dd.name, column_type);
    col.nullable = dd.is_nullable;
    col.unsigned = dd.is_unsigned || unsigned_kw;

    let collation = collation_name(dd.collation_id);
    let charset = collation.and_then(charset_for_collation);
    if column_type.is_text() {
        col.charset = charset;
        col.collation = collation.map(str::to_string);
    }
    let first_arg = args.first().and_then(|a| a.parse::<u32>().ok());

    match column_type {
        ColumnType::Char | ColumnType::VarChar => {
            let mb = charset.unwrap_or(table_charset).max_bytes() as u64;
            col.length = first_arg.unwrap_or((dd.char_length / mb.max(1)) as u32);
        }
        ColumnType::Binary | ColumnType::VarBinary => {
            col.length = first_arg.unwrap_or(dd.char_length as u32);
        }
        ColumnType::Bit => {
            col.length = first_arg.unwrap_or(dd.numeric_precision as u32).max(1);
        }
        ColumnType::Decimal => {
            col.precision = first_arg.unwrap_or(dd.numeric_precision as u32);
            col.scale = args
                .get(1)
                .and_then(|a| a.parse().ok())
                .unwrap_or(dd.numeric_scale as u32);
        }
        ColumnType::Time | ColumnType::DateTime | ColumnType::Timestamp => {
            col.fsp = first_arg.unwrap_or(dd.datetime_precision as u32) as u8;
        }
        ColumnType::Enum | ColumnType::Set => {
            col.members = args;
        }
        _ => {}
    }
    Ok(col)
}

/// Convert a `Table` SDI JSON document into a [`TableDef`].
///
/// Engine-hidden and virtual columns are dropped. Each index's root page is
/// taken from its `se_private_data`; a hidden clustered index (tables
/// without a primary key) still contributes the clustered root.
pub fn table_def_from_sdi(json: &str) -> Result<TableDef, IdbError> {
    let envelope: SdiEnvelope = serde_json::from_str(json)
        .map_err(|e| IdbError::Parse(format!("Failed to parse SDI JSON: {}", e)))?;
    if !envelope.dd_object_type.is_empty() && envelope.dd_object_type != "Table" {
        return Err(IdbError::Argument(format!(
            "SDI object is a {}, not a Table",
            envelope.dd_object_type
        )));
    }
    let dd = envelope.dd_object;

    let table_collation = collation_name(dd.collation_id);
    let table_charset = table_collation
        .and_then(charset_for_collation)
        .unwrap_or(Charset::Utf8mb4);

    // Map column_opx -> retained column name.
    let mut names: Vec<Option<String>> = Vec::with_capacity(dd.columns.len());
    let mut columns = Vec::new();
    for c in &dd.columns {
        if c.hidden == HIDDEN_SE || c.hidden == HIDDEN_SQL || c.is_virtual {
            names.push(None);
            continue;
        }
        columns.push(convert_column(c, table_charset)?);
        names.push(Some(c.name.clone()));
    }

    let mut primary_key = None;
    let mut secondary_keys = Vec::new();
    let mut clustered_root = None;

    for idx in &dd.indexes {
        let root = root_page(idx);
        if idx.index_type == 1 && idx.hidden {
            // GEN_CLUST_INDEX
            clustered_root = root;
            continue;
        }
        if idx.hidden {
            debug!(index = %idx.name, "skipping hidden index");
            continue;
        }
        let kind = match idx.index_type {
            1 => KeyKind::Primary,
            2 => KeyKind::Unique,
            3 => KeyKind::Index,
            4 => KeyKind::Fulltext,
            other => {
                warn!(index = %idx.name, index_type = other, "skipping unsupported index type");
                continue;
            }
        };

        let mut parts = Vec::new();
        for el in idx.elements.iter().filter(|e| !e.hidden) {
            let name = names
                .get(el.column_opx as usize)
                .and_then(|n| n.as_deref())
                .ok_or_else(|| {
                    IdbError::Parse(format!(
                        "index '{}' references column #{} which is not stored",
                        idx.name, el.column_opx
                    ))
                })?;
            let col = columns
                .iter()
                .find(|c: &&Column| c.name == name)
                .ok_or_else(|| IdbError::Parse(format!("column '{}' vanished", name)))?;
            parts.push(key_part_for(col, el.length, table_charset));
        }

        let mut key = KeyMeta::with_parts(&idx.name, kind, parts);
        key.root_page = root;
        if kind == KeyKind::Primary {
            clustered_root = root;
            primary_key = Some(key);
        } else {
            secondary_keys.push(key);
        }
    }

    TableDef::new(RawTableDef {
        name: dd.name,
        charset: Some(table_charset),
        collation: table_collation.map(str::to_string),
        columns,
        primary_key,
        secondary_keys,
        clustered_root,
    })
}

/// Element lengths are in bytes; prefixes are kept in characters.
fn key_part_for(col: &Column, length: u64, table_charset: Charset) -> KeyPart {
    let t = col.column_type;
    if length == FULL_LENGTH || !(t.is_text() || t.is_binary()) {
        return KeyPart::new(&col.name);
    }
    let mb = if t.is_text() {
        col.charset.unwrap_or(table_charset).max_bytes() as u64
    } else {
        1
    };
    let full = match t {
        ColumnType::Char | ColumnType::VarChar | ColumnType::Binary | ColumnType::VarBinary => {
            Some(col.length as u64 * mb)
        }
        _ => None,
    };
    match full {
        Some(full) if length >= full => KeyPart::new(&col.name),
        _ => KeyPart::prefix(&col.name, (length / mb).max(1) as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDI: &str = r#"{
      "mysqld_version_id": 80032,
      "dd_object_type": "Table",
      "dd_object": {
        "name": "orders",
        "schema_ref": "shop",
        "collation_id": 255,
        "columns": [
          {"name": "id", "type": 4, "column_type_utf8": "int unsigned", "hidden": 1,
           "is_unsigned": true},
          {"name": "status", "type": 22, "column_type_utf8": "enum('new','it''s done')",
           "hidden": 1, "collation_id": 255},
          {"name": "note", "type": 16, "column_type_utf8": "varchar(100)", "hidden": 1,
           "is_nullable": true, "char_length": 400, "collation_id": 46},
          {"name": "body", "type": 27, "column_type_utf8": "text", "hidden": 1,
           "is_nullable": true, "collation_id": 255},
          {"name": "amount", "type": 21, "column_type_utf8": "decimal(10,2)", "hidden": 1},
          {"name": "DB_TRX_ID", "type": 10, "hidden": 2},
          {"name": "DB_ROLL_PTR", "type": 9, "hidden": 2}
        ],
        "indexes": [
          {"name": "PRIMARY", "type": 1, "hidden": false,
           "se_private_data": "id=150;root=4;space_id=3;table_id=1066;trx_id=9;",
           "elements": [
             {"column_opx": 0, "length": 4, "hidden": false},
             {"column_opx": 5, "length": 4294967295, "hidden": true},
             {"column_opx": 6, "length": 4294967295, "hidden": true}
           ]},
          {"name": "k_note", "type": 3, "hidden": false,
           "se_private_data": "id=151;root=5;space_id=3;",
           "elements": [
             {"column_opx": 2, "length": 400, "hidden": false},
             {"column_opx": 0, "length": 4294967295, "hidden": true}
           ]},
          {"name": "k_body", "type": 3, "hidden": false,
           "se_private_data": "id=152;root=6;",
           "elements": [{"column_opx": 3, "length": 40, "hidden": false}]}
        ]
      }
    }"#;

    #[test]
    fn test_columns_and_types() {
        let def = table_def_from_sdi(SDI).unwrap();
        assert_eq!(def.name(), "orders");
        assert_eq!(def.column_names(), vec!["id", "status", "note", "body", "amount"]);
        let id = def.column("id").unwrap();
        assert!(id.unsigned);
        let status = def.column("status").unwrap();
        assert_eq!(status.members, vec!["new", "it's done"]);
        let note = def.column("note").unwrap();
        assert_eq!(note.length, 100);
        assert!(note.case_sensitive);
        let amount = def.column("amount").unwrap();
        assert_eq!((amount.precision, amount.scale), (10, 2));
    }

    #[test]
    fn test_keys_and_roots() {
        let def = table_def_from_sdi(SDI).unwrap();
        let pk = def.primary_key().unwrap();
        assert_eq!(pk.parts.len(), 1);
        assert_eq!(pk.root_page, Some(4));
        assert_eq!(def.clustered_root(), Some(4));

        let keys = def.secondary_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].root_page, Some(5));
        assert_eq!(keys[0].parts[0].prefix_len, None);
        assert_eq!(keys[1].parts[0].prefix_len, Some(10));
    }

    #[test]
    fn test_hidden_clustered_index() {
        let json = r#"{
          "dd_object_type": "Table",
          "dd_object": {
            "name": "heap", "collation_id": 8,
            "columns": [
              {"name": "v", "type": 4, "column_type_utf8": "int", "hidden": 1},
              {"name": "DB_ROW_ID", "type": 10, "hidden": 2}
            ],
            "indexes": [
              {"name": "GEN_CLUST_INDEX", "type": 1, "hidden": true,
               "se_private_data": "id=7;root=3;",
               "elements": [{"column_opx": 1, "length": 4294967295, "hidden": false}]}
            ]
          }
        }"#;
        let def = table_def_from_sdi(json).unwrap();
        assert!(!def.has_primary_key());
        assert_eq!(def.clustered_root(), Some(3));
        assert_eq!(def.charset(), Charset::Latin1);
    }

    #[test]
    fn test_split_type() {
        let (base, args, unsigned) = split_type("decimal(10,2) unsigned zerofill");
        assert_eq!(base, "decimal");
        assert_eq!(args, vec!["10", "2"]);
        assert!(unsigned);
        let (base, args, _) = split_type("set('a,b','c')");
        assert_eq!(base, "set");
        assert_eq!(args, vec!["a,b", "c"]);
    }

    #[test]
    fn test_rejects_tablespace_object() {
        let json = r#"{"dd_object_type": "Tablespace", "dd_object": {}}"#;
        assert!(table_def_from_sdi(json).is_err());
    }
}
