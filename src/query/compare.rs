//! Key comparison and user key coercion.
//!
//! Records are ordered by their index key, compared column by column in key
//! order with the first difference deciding. A search key may bind fewer
//! columns than the index has; comparison then stops after the bound prefix,
//! so every record sharing that prefix compares equal.
//!
//! String columns follow the column collation: `_bin`, `_cs` and binary
//! collations compare exactly, everything else folds case. Non-binary
//! strings ignore trailing spaces (PAD SPACE).

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::innodb::field_decode::{decode_decimal, encode_decimal, FieldValue};
use crate::schema::charset::Charset;
use crate::schema::{Column, ColumnType, KeyKind, KeyMeta, TableDef};
use crate::IdbError;

/// One bound component: a value, or a sentinel below/above every value.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Min,
    Value(FieldValue),
    Max,
}

impl From<FieldValue> for KeyValue {
    fn from(v: FieldValue) -> Self {
        KeyValue::Value(v)
    }
}

/// Range bound operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    pub fn is_lower(self) -> bool {
        matches!(self, RangeOp::Gt | RangeOp::Gte)
    }

    pub fn is_inclusive(self) -> bool {
        matches!(self, RangeOp::Gte | RangeOp::Lte)
    }

    /// Whether a record comparing `ord` against the bound satisfies it.
    pub fn admits(self, ord: Ordering) -> bool {
        match self {
            RangeOp::Gt => ord == Ordering::Greater,
            RangeOp::Gte => ord != Ordering::Less,
            RangeOp::Lt => ord == Ordering::Less,
            RangeOp::Lte => ord != Ordering::Greater,
        }
    }
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RangeOp::Gt => ">",
            RangeOp::Gte => ">=",
            RangeOp::Lt => "<",
            RangeOp::Lte => "<=",
        })
    }
}

/// One key column, with the prefix length (characters for text, bytes for
/// binary) when only a prefix is indexed.
#[derive(Debug, Clone)]
pub struct KeyColumn {
    pub column: Column,
    pub prefix_len: Option<u32>,
}

/// The ordered search key of one index.
///
/// For a secondary index this is the key parts followed by the primary key
/// columns not already present in full (or DB_ROW_ID), matching the leading
/// fields of its records.
#[derive(Debug, Clone)]
pub struct KeySchema {
    parts: Vec<KeyColumn>,
    /// Leading parts a caller may bind.
    user_parts: usize,
}

impl KeySchema {
    /// Search key of the clustered index.
    pub fn clustered(def: &TableDef) -> Self {
        let parts: Vec<KeyColumn> = match def.primary_key() {
            Some(pk) => pk
                .ordinals()
                .map(|o| KeyColumn {
                    column: def.columns()[o].clone(),
                    prefix_len: None,
                })
                .collect(),
            None => vec![row_id_column()],
        };
        let user_parts = parts.len();
        KeySchema { parts, user_parts }
    }

    /// Search key of a secondary index.
    pub fn secondary(def: &TableDef, key: &KeyMeta) -> Result<Self, IdbError> {
        if key.kind == KeyKind::Fulltext {
            return Err(IdbError::Argument(format!(
                "key '{}' is a FULLTEXT index and cannot be scanned",
                key.name
            )));
        }
        let mut parts: Vec<KeyColumn> = key
            .parts
            .iter()
            .map(|p| KeyColumn {
                column: def.columns()[p.ordinal].clone(),
                prefix_len: p.prefix_len,
            })
            .collect();
        let user_parts = parts.len();
        match def.primary_key() {
            Some(pk) => {
                for ordinal in pk.ordinals() {
                    let present = key
                        .parts
                        .iter()
                        .any(|p| p.ordinal == ordinal && p.prefix_len.is_none());
                    if !present {
                        parts.push(KeyColumn {
                            column: def.columns()[ordinal].clone(),
                            prefix_len: None,
                        });
                    }
                }
            }
            None => parts.push(row_id_column()),
        }
        Ok(KeySchema { parts, user_parts })
    }

    pub fn parts(&self) -> &[KeyColumn] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn user_parts(&self) -> usize {
        self.user_parts
    }

    /// True when some bindable part indexes only a prefix.
    pub fn has_prefix_parts(&self) -> bool {
        self.parts[..self.user_parts]
            .iter()
            .any(|p| p.prefix_len.is_some())
    }

    /// Validate arity and coerce user values to the key column types.
    ///
    /// Between one and [`user_parts`](Self::user_parts) values are accepted.
    /// Values bound to prefix parts are truncated to the prefix.
    pub fn coerce(&self, values: &[FieldValue]) -> Result<Vec<FieldValue>, IdbError> {
        self.coerce_with(values, true)
    }

    /// Like [`coerce`](Self::coerce) but keeps values bound to prefix parts
    /// whole, for re-checking full column values.
    pub fn coerce_full(&self, values: &[FieldValue]) -> Result<Vec<FieldValue>, IdbError> {
        self.coerce_with(values, false)
    }

    /// Coerce a range bound for scanning the index itself.
    ///
    /// When a prefix part actually shortens its value, the stored entries
    /// equal to the truncated value may still satisfy a strict bound on
    /// the full value, and later parts no longer order those entries. The
    /// key is then cut after that part and `Gt`/`Lt` relax to `Gte`/`Lte`;
    /// the exact bound has to be re-checked against full column values.
    pub fn coerce_bound(
        &self,
        values: &[FieldValue],
        op: RangeOp,
    ) -> Result<(Vec<FieldValue>, RangeOp), IdbError> {
        let full = self.coerce_with(values, false)?;
        let mut key = Vec::with_capacity(full.len());
        for (value, part) in full.into_iter().zip(&self.parts) {
            let Some(len) = part.prefix_len else {
                key.push(value);
                continue;
            };
            let truncated = truncate_prefix(value.clone(), len as usize);
            if truncated == value {
                key.push(value);
                continue;
            }
            key.push(truncated);
            let relaxed = match op {
                RangeOp::Gt => RangeOp::Gte,
                RangeOp::Lt => RangeOp::Lte,
                inclusive => inclusive,
            };
            return Ok((key, relaxed));
        }
        Ok((key, op))
    }

    fn coerce_with(&self, values: &[FieldValue], truncate: bool) -> Result<Vec<FieldValue>, IdbError> {
        if values.is_empty() || values.len() > self.user_parts {
            return Err(IdbError::Argument(format!(
                "key takes 1 to {} values, got {}",
                self.user_parts,
                values.len()
            )));
        }
        values
            .iter()
            .zip(&self.parts)
            .map(|(v, part)| {
                let coerced = coerce_value(v, &part.column)?;
                Ok(match (truncate, part.prefix_len) {
                    (true, Some(len)) => truncate_prefix(coerced, len as usize),
                    _ => coerced,
                })
            })
            .collect()
    }

    /// Compare a record key against a (possibly partial) search key.
    pub fn compare(&self, record: &[FieldValue], target: &[KeyValue]) -> Ordering {
        compare_keys(record, target, &self.parts)
    }
}

fn row_id_column() -> KeyColumn {
    KeyColumn {
        column: Column::new("DB_ROW_ID", ColumnType::BigInt).unsigned(),
        prefix_len: None,
    }
}

/// Composite compare of a record key against a search key.
///
/// Only the first `target.len()` columns take part. `Min`/`Max` sort below
/// and above every record value.
pub fn compare_keys(record: &[FieldValue], target: &[KeyValue], parts: &[KeyColumn]) -> Ordering {
    for ((t, r), part) in target.iter().zip(record).zip(parts) {
        let ord = match t {
            KeyValue::Min => Ordering::Greater,
            KeyValue::Max => Ordering::Less,
            KeyValue::Value(v) => compare_values(r, v, &part.column),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Compare two values of `col`. NULL sorts first.
pub fn compare_values(a: &FieldValue, b: &FieldValue, col: &Column) -> Ordering {
    use FieldValue::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Int(x), Int(y)) => x.cmp(y),
        (UInt(x), UInt(y)) => x.cmp(y),
        (Int(x), UInt(y)) => (*x as i128).cmp(&(*y as i128)),
        (UInt(x), Int(y)) => (*x as i128).cmp(&(*y as i128)),
        (Float(x), Float(y)) => x.total_cmp(y),
        (Double(x), Double(y)) => x.total_cmp(y),
        (Decimal(x), Decimal(y)) => compare_decimal(x, y),
        (Time(x), Time(y)) => time_micros(x).cmp(&time_micros(y)),
        (Date(x), Date(y)) | (DateTime(x), DateTime(y)) | (Timestamp(x), Timestamp(y)) => x.cmp(y),
        (Year(x), Year(y)) => x.cmp(y),
        (Str(x), Str(y)) => compare_text(x, y, col),
        (Bytes(x), Bytes(y)) => x.cmp(y),
        (Enum(x), Enum(y)) => member_index(x, &col.members).cmp(&member_index(y, &col.members)),
        (Set(x), Set(y)) => set_mask(x, &col.members).cmp(&set_mask(y, &col.members)),
        (Bit(x), Bit(y)) => bit_value(x).cmp(&bit_value(y)),
        _ => a.kind_name().cmp(b.kind_name()).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn compare_text(a: &str, b: &str, col: &Column) -> Ordering {
    let binary = col.resolved_charset() == Charset::Binary;
    let (a, b) = if binary {
        (a, b)
    } else {
        (a.trim_end_matches(' '), b.trim_end_matches(' '))
    };
    if col.case_sensitive {
        a.cmp(b)
    } else {
        a.chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase))
    }
}

/// Numeric comparison of two canonical decimal strings.
fn compare_decimal(a: &str, b: &str) -> Ordering {
    let (neg_a, int_a, frac_a) = split_decimal(a);
    let (neg_b, int_b, frac_b) = split_decimal(b);
    let zero_a = int_a.is_empty() && frac_a.is_empty();
    let zero_b = int_b.is_empty() && frac_b.is_empty();
    let neg_a = neg_a && !zero_a;
    let neg_b = neg_b && !zero_b;
    if neg_a != neg_b {
        return if neg_a { Ordering::Less } else { Ordering::Greater };
    }
    let magnitude = int_a
        .len()
        .cmp(&int_b.len())
        .then_with(|| int_a.cmp(int_b))
        .then_with(|| frac_a.cmp(frac_b));
    if neg_a {
        magnitude.reverse()
    } else {
        magnitude
    }
}

/// Sign, integer digits without leading zeros, fraction digits without
/// trailing zeros.
fn split_decimal(s: &str) -> (bool, &str, &str) {
    let s = s.trim();
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    (neg, int.trim_start_matches('0'), frac.trim_end_matches('0'))
}

/// `[-]H:MM:SS[.ffffff]` as signed microseconds.
fn time_micros(s: &str) -> i64 {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (hms, frac) = body.split_once('.').unwrap_or((body, ""));
    let mut secs = 0i64;
    for part in hms.split(':') {
        secs = secs * 60 + part.parse::<i64>().unwrap_or(0);
    }
    let micros = format!("{:0<6}", frac)
        .get(..6)
        .and_then(|f| f.parse::<i64>().ok())
        .unwrap_or(0);
    let total = secs * 1_000_000 + micros;
    if neg {
        -total
    } else {
        total
    }
}

fn member_index(name: &str, members: &[String]) -> usize {
    members
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map_or(0, |i| i + 1)
}

fn set_mask(selected: &[String], members: &[String]) -> u64 {
    selected
        .iter()
        .map(|s| member_index(s, members))
        .filter(|&i| i > 0)
        .fold(0u64, |mask, i| mask | (1u64 << (i - 1)))
}

fn bit_value(bits: &str) -> u64 {
    u64::from_str_radix(bits, 2).unwrap_or(0)
}

fn truncate_prefix(value: FieldValue, len: usize) -> FieldValue {
    match value {
        FieldValue::Str(s) => FieldValue::Str(s.chars().take(len).collect()),
        FieldValue::Bytes(mut b) => {
            b.truncate(len);
            FieldValue::Bytes(b)
        }
        other => other,
    }
}

/// Coerce a caller-supplied value to the representation the codec produces
/// for `col`, so it compares like a decoded value.
pub fn coerce_value(value: &FieldValue, col: &Column) -> Result<FieldValue, IdbError> {
    let bad = || {
        IdbError::Argument(format!(
            "value {} ({}) does not fit column '{}' ({:?})",
            value,
            value.kind_name(),
            col.name,
            col.column_type
        ))
    };
    if value.is_null() {
        return if col.nullable {
            Ok(FieldValue::Null)
        } else {
            Err(IdbError::Argument(format!(
                "column '{}' is NOT NULL and cannot match NULL",
                col.name
            )))
        };
    }
    let text = value.to_string();

    let t = col.column_type;
    match t {
        _ if t.is_integer() => coerce_integer(value, col).ok_or_else(bad),
        ColumnType::Float => match value {
            FieldValue::Float(f) => Ok(FieldValue::Float(*f)),
            _ => text.parse::<f32>().map(FieldValue::Float).map_err(|_| bad()),
        },
        ColumnType::Double => match value {
            FieldValue::Double(f) => Ok(FieldValue::Double(*f)),
            FieldValue::Float(f) => Ok(FieldValue::Double(*f as f64)),
            _ => text.parse::<f64>().map(FieldValue::Double).map_err(|_| bad()),
        },
        ColumnType::Decimal => {
            let packed = encode_decimal(&text, col.precision, col.scale).map_err(|_| bad())?;
            decode_decimal(&packed, col.precision, col.scale).map(FieldValue::Decimal)
        }
        ColumnType::Date => {
            if is_zero_date(&text) {
                return Ok(FieldValue::Date("0000-00-00".to_string()));
            }
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(|d| FieldValue::Date(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| bad())
        }
        ColumnType::DateTime | ColumnType::Timestamp => {
            let normalized = normalize_datetime(&text, col.fsp).ok_or_else(bad)?;
            Ok(if t == ColumnType::DateTime {
                FieldValue::DateTime(normalized)
            } else {
                FieldValue::Timestamp(normalized)
            })
        }
        ColumnType::Time => normalize_time(&text, col.fsp).map(FieldValue::Time).ok_or_else(bad),
        ColumnType::Year => {
            let y: u16 = match value {
                FieldValue::Year(y) => *y,
                _ => text.parse().map_err(|_| bad())?,
            };
            if y == 0 || (1901..=2155).contains(&y) {
                Ok(FieldValue::Year(y))
            } else {
                Err(bad())
            }
        }
        _ if t.is_text() => match value {
            FieldValue::Bytes(b) => col.resolved_charset().decode(b).map(FieldValue::Str),
            _ => Ok(FieldValue::Str(text)),
        },
        _ if t.is_binary() => match value {
            FieldValue::Bytes(b) => Ok(FieldValue::Bytes(b.clone())),
            FieldValue::Str(s) => Ok(FieldValue::Bytes(s.as_bytes().to_vec())),
            _ => Err(bad()),
        },
        ColumnType::Enum => {
            let idx = match value {
                FieldValue::Int(_) | FieldValue::UInt(_) => value.as_u64().ok_or_else(bad)? as usize,
                _ => member_index(&text, &col.members),
            };
            match idx {
                0 if text.is_empty() => Ok(FieldValue::Enum(String::new())),
                0 => Err(bad()),
                i => col
                    .members
                    .get(i - 1)
                    .map(|m| FieldValue::Enum(m.clone()))
                    .ok_or_else(bad),
            }
        }
        ColumnType::Set => {
            let names: Vec<String> = match value {
                FieldValue::Set(v) => v.clone(),
                _ if text.is_empty() => Vec::new(),
                _ => text.split(',').map(|s| s.trim().to_string()).collect(),
            };
            if names.iter().any(|n| member_index(n, &col.members) == 0) {
                return Err(bad());
            }
            let mask = set_mask(&names, &col.members);
            Ok(FieldValue::Set(
                col.members
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1u64 << i) != 0)
                    .map(|(_, m)| m.clone())
                    .collect(),
            ))
        }
        ColumnType::Bit => {
            let v = match value {
                FieldValue::Bit(b) => u64::from_str_radix(b, 2).map_err(|_| bad())?,
                _ => value.as_u64().ok_or_else(bad)?,
            };
            if col.length < 64 && v >> col.length != 0 {
                return Err(bad());
            }
            Ok(FieldValue::Bit(format!("{:0width$b}", v, width = col.length as usize)))
        }
        _ => Err(bad()),
    }
}

fn coerce_integer(value: &FieldValue, col: &Column) -> Option<FieldValue> {
    let n: i128 = match value {
        FieldValue::Int(v) => *v as i128,
        FieldValue::UInt(v) => *v as i128,
        FieldValue::Year(v) => *v as i128,
        FieldValue::Str(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let bits = col.column_type.int_width()? as u32 * 8;
    if col.unsigned {
        let max = if bits == 64 { u64::MAX as i128 } else { (1i128 << bits) - 1 };
        (0..=max).contains(&n).then(|| FieldValue::UInt(n as u64))
    } else {
        let max = (1i128 << (bits - 1)) - 1;
        (-max - 1..=max).contains(&n).then(|| FieldValue::Int(n as i64))
    }
}

fn is_zero_date(s: &str) -> bool {
    s.starts_with("0000-00-00")
}

fn normalize_datetime(s: &str, fsp: u8) -> Option<String> {
    let s = s.trim().replacen('T', " ", 1);
    let (base, frac) = if is_zero_date(&s) {
        let (base, frac) = s.split_once('.').unwrap_or((s.as_str(), ""));
        let base = if base.len() == 10 {
            format!("{} 00:00:00", base)
        } else {
            base.to_string()
        };
        (base, frac.to_string())
    } else {
        let dt = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        let frac = s.split_once('.').map(|(_, f)| f.to_string()).unwrap_or_default();
        (dt.format("%Y-%m-%d %H:%M:%S").to_string(), frac)
    };
    Some(format!("{}{}", base, fraction_digits(&frac, fsp)?))
}

fn normalize_time(s: &str, fsp: u8) -> Option<String> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (hms, frac) = body.split_once('.').unwrap_or((body, ""));
    let parts: Vec<u32> = hms
        .split(':')
        .map(|p| p.parse().ok())
        .collect::<Option<Vec<_>>>()?;
    let [h, m, sec] = parts[..] else {
        return None;
    };
    if h > 838 || m > 59 || sec > 59 {
        return None;
    }
    Some(format!(
        "{}{:02}:{:02}:{:02}{}",
        if neg { "-" } else { "" },
        h,
        m,
        sec,
        fraction_digits(frac, fsp)?
    ))
}

/// Fraction digits padded or truncated to `fsp`, with the leading dot.
fn fraction_digits(frac: &str, fsp: u8) -> Option<String> {
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if fsp == 0 {
        return Some(String::new());
    }
    let padded = format!("{:0<6}", frac);
    Some(format!(".{}", &padded[..fsp as usize]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{KeyPart, RawTableDef};

    fn derived(column: Column) -> Column {
        let def = TableDef::new(RawTableDef {
            columns: vec![column],
            ..Default::default()
        })
        .unwrap();
        def.columns()[0].clone()
    }

    fn col(t: ColumnType) -> Column {
        derived(Column::new("c", t).length(8).members(&["a", "b", "c"]))
    }

    fn str_col(collation: &str) -> Column {
        derived(Column::new("s", ColumnType::VarChar).length(20).collation(collation))
    }

    #[test]
    fn test_sentinels_bound_everything() {
        let schema = KeySchema {
            parts: vec![KeyColumn { column: col(ColumnType::Int), prefix_len: None }],
            user_parts: 1,
        };
        let rec = [FieldValue::Int(i64::MIN)];
        assert_eq!(schema.compare(&rec, &[KeyValue::Min]), Ordering::Greater);
        assert_eq!(schema.compare(&rec, &[KeyValue::Max]), Ordering::Less);
    }

    #[test]
    fn test_prefix_compare_stops_after_bound_columns() {
        let parts = vec![
            KeyColumn { column: col(ColumnType::Int), prefix_len: None },
            KeyColumn { column: col(ColumnType::Int), prefix_len: None },
        ];
        let rec = [FieldValue::Int(5), FieldValue::Int(99)];
        assert_eq!(
            compare_keys(&rec, &[KeyValue::Value(FieldValue::Int(5))], &parts),
            Ordering::Equal
        );
        assert_eq!(
            compare_keys(
                &rec,
                &[FieldValue::Int(5).into(), FieldValue::Int(100).into()],
                &parts
            ),
            Ordering::Less
        );
        assert_eq!(
            compare_keys(&rec, &[FieldValue::Int(4).into(), FieldValue::Int(1000).into()], &parts),
            Ordering::Greater
        );
    }

    #[test]
    fn test_collation_case_and_padding() {
        let ci = str_col("utf8mb4_0900_ai_ci");
        let bin = str_col("utf8mb4_bin");
        let a = FieldValue::Str("Apple ".to_string());
        let b = FieldValue::Str("apple".to_string());
        assert_eq!(compare_values(&a, &b, &ci), Ordering::Equal);
        assert_eq!(compare_values(&a, &b, &bin), Ordering::Less);
        assert_eq!(
            compare_values(&FieldValue::Str("ab ".into()), &FieldValue::Str("ab".into()), &bin),
            Ordering::Equal
        );
    }

    #[test]
    fn test_numeric_orders() {
        let d = col(ColumnType::Int);
        assert_eq!(compare_decimal("-1.50", "-1.5"), Ordering::Equal);
        assert_eq!(compare_decimal("-2.0", "-1.99"), Ordering::Less);
        assert_eq!(compare_decimal("10.0", "9.999"), Ordering::Greater);
        assert_eq!(compare_decimal("-0.00", "0"), Ordering::Equal);
        assert_eq!(
            compare_values(&FieldValue::Double(-0.5), &FieldValue::Double(0.25), &d),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&FieldValue::Time("-01:00:00".into()), &FieldValue::Time("00:30:00".into()), &d),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&FieldValue::Time("100:00:00".into()), &FieldValue::Time("99:59:59".into()), &d),
            Ordering::Greater
        );
        assert_eq!(compare_values(&FieldValue::Null, &FieldValue::Int(0), &d), Ordering::Less);
    }

    #[test]
    fn test_enum_and_set_compare_by_position() {
        let e = col(ColumnType::Enum);
        assert_eq!(
            compare_values(&FieldValue::Enum("c".into()), &FieldValue::Enum("b".into()), &e),
            Ordering::Greater
        );
        let s = col(ColumnType::Set);
        assert_eq!(
            compare_values(
                &FieldValue::Set(vec!["c".into()]),
                &FieldValue::Set(vec!["a".into(), "b".into()]),
                &s
            ),
            Ordering::Greater
        );
    }

    #[test]
    fn test_coerce_integers() {
        let c = col(ColumnType::TinyInt);
        assert_eq!(coerce_value(&FieldValue::UInt(5), &c).unwrap(), FieldValue::Int(5));
        assert_eq!(coerce_value(&FieldValue::Str("-128".into()), &c).unwrap(), FieldValue::Int(-128));
        assert!(coerce_value(&FieldValue::Int(128), &c).is_err());
        assert!(coerce_value(&FieldValue::Str("x".into()), &c).is_err());
        assert!(coerce_value(&FieldValue::Null, &c).is_err());
    }

    #[test]
    fn test_coerce_temporal_and_members() {
        let mut dt = col(ColumnType::DateTime);
        dt.fsp = 3;
        assert_eq!(
            coerce_value(&FieldValue::Str("2024-02-29T10:00:01.5".into()), &dt).unwrap(),
            FieldValue::DateTime("2024-02-29 10:00:01.500".into())
        );
        assert!(coerce_value(&FieldValue::Str("2023-02-29".into()), &dt).is_err());

        let e = col(ColumnType::Enum);
        assert_eq!(coerce_value(&FieldValue::Str("B".into()), &e).unwrap(), FieldValue::Enum("b".into()));
        assert_eq!(coerce_value(&FieldValue::Int(3), &e).unwrap(), FieldValue::Enum("c".into()));
        assert!(coerce_value(&FieldValue::Str("z".into()), &e).is_err());

        let s = col(ColumnType::Set);
        assert_eq!(
            coerce_value(&FieldValue::Str("c,a".into()), &s).unwrap(),
            FieldValue::Set(vec!["a".into(), "c".into()])
        );
    }

    #[test]
    fn test_coerce_decimal_canonicalizes() {
        let d = derived(Column::new("d", ColumnType::Decimal).decimal(6, 2));
        assert_eq!(
            coerce_value(&FieldValue::Str("-3.5".into()), &d).unwrap(),
            FieldValue::Decimal("-3.50".into())
        );
    }

    #[test]
    fn test_secondary_schema_arity_and_prefix() {
        let def = TableDef::new(RawTableDef {
            columns: vec![
                Column::new("id", ColumnType::Int),
                Column::new("name", ColumnType::VarChar).length(40),
            ],
            primary_key: Some(KeyMeta::primary(&["id"])),
            secondary_keys: vec![KeyMeta::with_parts("k", KeyKind::Index, vec![KeyPart::prefix("name", 3)])],
            ..Default::default()
        })
        .unwrap();
        let schema = KeySchema::secondary(&def, &def.secondary_keys()[0]).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.user_parts(), 1);
        assert!(schema.has_prefix_parts());
        assert_eq!(
            schema.coerce(&[FieldValue::Str("abcdef".into())]).unwrap(),
            vec![FieldValue::Str("abc".into())]
        );
        assert_eq!(
            schema.coerce_full(&[FieldValue::Str("abcdef".into())]).unwrap(),
            vec![FieldValue::Str("abcdef".into())]
        );
        assert!(schema.coerce(&[FieldValue::Str("a".into()), FieldValue::Int(1)]).is_err());
        assert!(schema.coerce(&[]).is_err());
    }

    #[test]
    fn test_coerce_bound_relaxes_truncated_strict_ops() {
        let def = TableDef::new(RawTableDef {
            columns: vec![
                Column::new("id", ColumnType::Int),
                Column::new("name", ColumnType::VarChar).length(40),
                Column::new("grp", ColumnType::Int),
            ],
            primary_key: Some(KeyMeta::primary(&["id"])),
            secondary_keys: vec![KeyMeta::with_parts(
                "k",
                KeyKind::Index,
                vec![KeyPart::prefix("name", 3), KeyPart::new("grp")],
            )],
            ..Default::default()
        })
        .unwrap();
        let schema = KeySchema::secondary(&def, &def.secondary_keys()[0]).unwrap();
        let s = |v: &str| FieldValue::Str(v.to_string());

        let (key, op) = schema.coerce_bound(&[s("abcdef")], RangeOp::Gt).unwrap();
        assert_eq!(key, vec![s("abc")]);
        assert_eq!(op, RangeOp::Gte);
        let (_, op) = schema.coerce_bound(&[s("abcdef")], RangeOp::Lt).unwrap();
        assert_eq!(op, RangeOp::Lte);

        // Parts after a shortened prefix no longer order the entries.
        let (key, op) = schema
            .coerce_bound(&[s("abcdef"), FieldValue::Int(5)], RangeOp::Gt)
            .unwrap();
        assert_eq!(key, vec![s("abc")]);
        assert_eq!(op, RangeOp::Gte);

        // A value that fits the prefix keeps its operator and later parts.
        let (key, op) = schema
            .coerce_bound(&[s("ab"), FieldValue::Int(5)], RangeOp::Gt)
            .unwrap();
        assert_eq!(key, vec![s("ab"), FieldValue::Int(5)]);
        assert_eq!(op, RangeOp::Gt);
    }

    #[test]
    fn test_range_op_admits() {
        assert!(RangeOp::Gte.admits(Ordering::Equal));
        assert!(!RangeOp::Gt.admits(Ordering::Equal));
        assert!(RangeOp::Lt.admits(Ordering::Less));
        assert!(!RangeOp::Lte.admits(Ordering::Greater));
        assert!(RangeOp::Gt.is_lower());
        assert_eq!(RangeOp::Lte.to_string(), "<=");
    }
}
