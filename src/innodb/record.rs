//! Compact-format record parsing.
//!
//! User records on an INDEX page form a singly linked list that starts at the
//! infimum (origin 99) and ends at the supremum (origin 112). Each record has
//! a 5-byte header immediately before its origin. Before that, growing
//! toward lower addresses, come the null bitmap and then the variable-length
//! table. Field data starts at the origin and runs forward in index field
//! order.
//!
//! The field order depends on the index (see [`IndexLayout`]):
//!
//! | Index | Leaf record | Node pointer |
//! |-------|-------------|--------------|
//! | Clustered with PK | PK, DB_TRX_ID, DB_ROLL_PTR, other columns | PK, child page |
//! | Clustered without PK | DB_ROW_ID, DB_TRX_ID, DB_ROLL_PTR, all columns | DB_ROW_ID, child page |
//! | Secondary | key parts, PK columns (or DB_ROW_ID) | the same, child page |

use serde::Serialize;
use tracing::debug;

use crate::innodb::constants::*;
use crate::innodb::cursor::ByteCursor;
use crate::innodb::field_decode::{decode_column, DecodeContext, FieldValue};
use crate::innodb::lob::read_external;
use crate::innodb::tablespace::PageSource;
use crate::schema::{Column, KeyKind, KeyMeta, TableDef};
use crate::IdbError;

/// Record type from the 3-bit status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordType {
    /// User record on a leaf page.
    Ordinary,
    /// Node pointer on a non-leaf page.
    NodePtr,
    Infimum,
    Supremum,
}

impl RecordType {
    /// Map the low 3 bits of the status field. Values 4..7 are not record
    /// types.
    pub fn from_u8(val: u8) -> Option<Self> {
        match val & 0x07 {
            0 => Some(RecordType::Ordinary),
            1 => Some(RecordType::NodePtr),
            2 => Some(RecordType::Infimum),
            3 => Some(RecordType::Supremum),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordType::Ordinary => "REC_STATUS_ORDINARY",
            RecordType::NodePtr => "REC_STATUS_NODE_PTR",
            RecordType::Infimum => "REC_STATUS_INFIMUM",
            RecordType::Supremum => "REC_STATUS_SUPREMUM",
        }
    }
}

/// The 5-byte header in front of every compact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordHeader {
    /// Records owned by this record's directory slot (0 if not a slot owner).
    pub n_owned: u8,
    pub deleted: bool,
    /// Set on the leftmost node pointer of each non-leaf level.
    pub min_rec: bool,
    pub heap_no: u16,
    pub rec_type: RecordType,
    /// Offset of the next record's origin relative to this one.
    pub next_offset: i16,
}

impl RecordHeader {
    /// Parse a header from its 5 bytes.
    ///
    /// ```text
    /// byte 0      [unused:2][deleted:1][min_rec:1][n_owned:4]
    /// bytes 1-2   [heap_no:13][status:3]
    /// bytes 3-4   next record offset (signed)
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use ibdrow::innodb::record::{RecordHeader, RecordType};
    ///
    /// let hdr = RecordHeader::parse(&[0x21, 0x00, 0x29, 0xFF, 0xE0]).unwrap();
    /// assert!(hdr.deleted);
    /// assert_eq!(hdr.n_owned, 1);
    /// assert_eq!(hdr.heap_no, 5);
    /// assert_eq!(hdr.rec_type, RecordType::NodePtr);
    /// assert_eq!(hdr.next_offset, -32);
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self, IdbError> {
        let c = ByteCursor::new(data);
        let info = c.u8_at(0)?;
        let status = c.u16_at(1)?;
        let rec_type = RecordType::from_u8((status & REC_STATUS_MASK) as u8).ok_or_else(|| {
            IdbError::Parse(format!("invalid record status {}", status & REC_STATUS_MASK))
        })?;
        Ok(RecordHeader {
            n_owned: info & REC_N_OWNED_MASK,
            deleted: info & REC_INFO_DELETED_FLAG != 0,
            min_rec: info & REC_INFO_MIN_REC_FLAG != 0,
            heap_no: status >> REC_HEAP_NO_SHIFT,
            rec_type,
            next_offset: c.i16_at(3)?,
        })
    }

    /// Parse the header of the record whose origin is at `origin`.
    pub fn at(page: &[u8], origin: usize) -> Result<Self, IdbError> {
        let start = origin.checked_sub(REC_N_NEW_EXTRA_BYTES).ok_or_else(|| {
            IdbError::Parse(format!("record origin {} leaves no room for a header", origin))
        })?;
        let c = ByteCursor::new(page);
        Self::parse(c.bytes_at(start, REC_N_NEW_EXTRA_BYTES)?)
    }
}

/// A user record's position on a page, with its header.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RecordInfo {
    /// Absolute offset of the record origin within the page.
    pub offset: usize,
    pub header: RecordHeader,
}

/// Walk the user records of a compact INDEX page in key order.
///
/// Follows next-record offsets from the infimum to the supremum. Offsets that
/// leave the record area, a chain that stops short of the supremum, and a
/// chain longer than the page could possibly hold (a loop) are parse errors.
pub fn walk_records(page: &[u8]) -> Result<Vec<RecordInfo>, IdbError> {
    let infimum = RecordHeader::at(page, PAGE_NEW_INFIMUM)?;
    if infimum.rec_type != RecordType::Infimum {
        return Err(IdbError::Parse(format!(
            "record at infimum position has status {}",
            infimum.rec_type.name()
        )));
    }

    let limit = page.len().min(PAGE_DIR);
    let max_records = limit / REC_N_NEW_EXTRA_BYTES;
    let mut records = Vec::new();
    let mut origin = PAGE_NEW_INFIMUM;
    let mut next = infimum.next_offset;

    loop {
        if next == 0 {
            return Err(IdbError::Parse(format!(
                "record chain ends at offset {} before reaching the supremum",
                origin
            )));
        }
        let target = origin as i64 + next as i64;
        if target < PAGE_NEW_SUPREMUM as i64 || target >= limit as i64 {
            return Err(IdbError::Parse(format!(
                "record at offset {} points outside the record area (to {})",
                origin, target
            )));
        }
        let target = target as usize;
        let header = RecordHeader::at(page, target)?;
        match header.rec_type {
            RecordType::Supremum if target == PAGE_NEW_SUPREMUM => break,
            RecordType::Supremum | RecordType::Infimum => {
                return Err(IdbError::Parse(format!(
                    "system record {} found at offset {}",
                    header.rec_type.name(),
                    target
                )));
            }
            _ => {}
        }
        if records.len() >= max_records {
            return Err(IdbError::Parse(
                "record chain loops back on itself".to_string(),
            ));
        }
        records.push(RecordInfo {
            offset: target,
            header,
        });
        origin = target;
        next = header.next_offset;
    }

    Ok(records)
}

/// What a physical field in an index record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A table column, possibly a prefix of `prefix` bytes.
    Column {
        ordinal: usize,
        prefix: Option<usize>,
    },
    RowId,
    TrxId,
    RollPtr,
    /// 4-byte child page number of a node pointer.
    ChildPage,
}

/// One physical field of an index record.
#[derive(Debug, Clone)]
pub struct IndexField {
    pub kind: FieldKind,
    pub nullable: bool,
    /// Stored width when fixed; `None` when the field has a length entry.
    pub fixed_len: Option<usize>,
    /// The length entry may take two bytes.
    pub big: bool,
}

impl IndexField {
    fn system(kind: FieldKind, len: usize) -> Self {
        IndexField {
            kind,
            nullable: false,
            fixed_len: Some(len),
            big: false,
        }
    }

    fn column(col: &Column, prefix: Option<usize>) -> Self {
        let fixed_len = match (col.fixed_len(), prefix) {
            (Some(n), Some(p)) => Some(n.min(p)),
            (n, _) => n,
        };
        IndexField {
            kind: FieldKind::Column {
                ordinal: col.ordinal,
                prefix,
            },
            nullable: col.nullable,
            fixed_len,
            big: col.is_big(),
        }
    }
}

/// Physical field list of one index at one level (leaf or node pointer).
#[derive(Debug, Clone)]
pub struct IndexLayout {
    fields: Vec<IndexField>,
    /// Leading fields that identify a record (the search key).
    n_unique: usize,
    /// Nullable fields of the whole index; sizes the null bitmap on every
    /// level.
    n_nullable: usize,
    leaf: bool,
}

impl IndexLayout {
    /// Layout of the clustered index.
    pub fn clustered(def: &TableDef, leaf: bool) -> Self {
        let columns = def.columns();
        let mut fields = Vec::with_capacity(columns.len() + 3);
        let n_unique = match def.primary_key() {
            Some(pk) => {
                for ordinal in pk.ordinals() {
                    fields.push(IndexField::column(&columns[ordinal], None));
                }
                pk.parts.len()
            }
            None => {
                fields.push(IndexField::system(FieldKind::RowId, DATA_ROW_ID_LEN));
                1
            }
        };
        fields.push(IndexField::system(FieldKind::TrxId, DATA_TRX_ID_LEN));
        fields.push(IndexField::system(FieldKind::RollPtr, DATA_ROLL_PTR_LEN));
        for col in columns {
            if !def.is_pk_column(col.ordinal) {
                fields.push(IndexField::column(col, None));
            }
        }
        Self::finish(fields, n_unique, leaf)
    }

    /// Layout of a secondary index.
    ///
    /// The primary key columns follow the key parts, except those already
    /// present in full. Tables without a primary key carry DB_ROW_ID instead.
    pub fn secondary(def: &TableDef, key: &KeyMeta, leaf: bool) -> Result<Self, IdbError> {
        if key.kind == KeyKind::Fulltext {
            return Err(IdbError::Argument(format!(
                "key '{}' is a FULLTEXT index and has no B+tree of its own",
                key.name
            )));
        }
        let columns = def.columns();
        let mut fields = Vec::with_capacity(key.parts.len() + 2);
        for part in &key.parts {
            let col = &columns[part.ordinal];
            fields.push(IndexField::column(col, part.prefix_bytes(col)));
        }
        match def.primary_key() {
            Some(pk) => {
                for ordinal in pk.ordinals() {
                    let present = key
                        .parts
                        .iter()
                        .any(|p| p.ordinal == ordinal && p.prefix_len.is_none());
                    if !present {
                        fields.push(IndexField::column(&columns[ordinal], None));
                    }
                }
            }
            None => fields.push(IndexField::system(FieldKind::RowId, DATA_ROW_ID_LEN)),
        }
        let n_unique = fields.len();
        Ok(Self::finish(fields, n_unique, leaf))
    }

    fn finish(mut fields: Vec<IndexField>, n_unique: usize, leaf: bool) -> Self {
        let n_nullable = fields.iter().filter(|f| f.nullable).count();
        if !leaf {
            fields.truncate(n_unique);
            fields.push(IndexField::system(FieldKind::ChildPage, NODE_PTR_CHILD_LEN));
        }
        IndexLayout {
            fields,
            n_unique,
            n_nullable,
            leaf,
        }
    }

    pub fn fields(&self) -> &[IndexField] {
        &self.fields
    }

    pub fn n_unique(&self) -> usize {
        self.n_unique
    }

    pub fn n_nullable(&self) -> usize {
        self.n_nullable
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Position of a full (non-prefix) column value among the decoded values.
    pub fn position(&self, ordinal: usize) -> Option<usize> {
        self.fields.iter().position(|f| {
            f.kind
                == FieldKind::Column {
                    ordinal,
                    prefix: None,
                }
        })
    }

    /// Position of the first field of `kind` among the decoded values.
    pub fn kind_position(&self, kind: FieldKind) -> Option<usize> {
        self.fields.iter().position(|f| f.kind == kind)
    }

    /// True when every listed column is stored in full.
    pub fn covers(&self, ordinals: &[usize]) -> bool {
        ordinals.iter().all(|&o| self.position(o).is_some())
    }
}

/// A record decoded against an [`IndexLayout`].
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub offset: usize,
    pub header: RecordHeader,
    /// One value per field in layout order, the child page excluded. System
    /// columns decode as `UInt`.
    pub values: Vec<FieldValue>,
    pub child_page: Option<u32>,
    n_unique: usize,
}

impl DecodedRecord {
    /// The search key: the index's leading unique fields.
    pub fn key(&self) -> &[FieldValue] {
        &self.values[..self.n_unique.min(self.values.len())]
    }
}

/// Decodes the records of one index level.
pub struct RecordDecoder<'a> {
    def: &'a TableDef,
    layout: &'a IndexLayout,
    ctx: DecodeContext,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(def: &'a TableDef, layout: &'a IndexLayout, ctx: DecodeContext) -> Self {
        RecordDecoder { def, layout, ctx }
    }

    /// Decode the record at `rec.offset`.
    ///
    /// Externally stored values are completed from `source`.
    pub fn decode<S: PageSource + ?Sized>(
        &self,
        page: &[u8],
        rec: &RecordInfo,
        source: &S,
    ) -> Result<DecodedRecord, IdbError> {
        let expected = if self.layout.leaf {
            RecordType::Ordinary
        } else {
            RecordType::NodePtr
        };
        if rec.header.rec_type != expected {
            return Err(IdbError::Parse(format!(
                "record at offset {} has status {}, expected {}",
                rec.offset,
                rec.header.rec_type.name(),
                expected.name()
            )));
        }

        let c = ByteCursor::new(page);
        let origin = rec.offset;
        let null_bytes = self.layout.n_nullable.div_ceil(8);
        let nulls_end = origin.checked_sub(REC_N_NEW_EXTRA_BYTES + null_bytes).ok_or_else(|| {
            IdbError::Parse(format!("record at offset {} has no room for its null bitmap", origin))
        })?;
        let nulls_start = origin - REC_N_NEW_EXTRA_BYTES;
        let mut lens_pos = nulls_end;
        let mut null_idx = 0usize;
        let mut pos = origin;

        let mut values = Vec::with_capacity(self.layout.fields.len());
        let mut child_page = None;

        for field in &self.layout.fields {
            if field.nullable {
                let byte = c.u8_at(nulls_start - 1 - null_idx / 8)?;
                let is_null = byte & (1 << (null_idx % 8)) != 0;
                null_idx += 1;
                if is_null {
                    values.push(FieldValue::Null);
                    continue;
                }
            }

            let (len, external) = match field.fixed_len {
                Some(n) => (n, false),
                None => {
                    lens_pos = step_back(lens_pos, origin)?;
                    let b1 = c.u8_at(lens_pos)?;
                    if field.big && b1 & VARLEN_TWO_BYTE_FLAG != 0 {
                        lens_pos = step_back(lens_pos, origin)?;
                        let b2 = c.u8_at(lens_pos)?;
                        (
                            (((b1 & 0x3F) as usize) << 8) | b2 as usize,
                            b1 & VARLEN_EXTERN_FLAG != 0,
                        )
                    } else {
                        (b1 as usize, false)
                    }
                }
            };
            let bytes = c.bytes_at(pos, len)?;
            pos += len;

            match field.kind {
                FieldKind::ChildPage => child_page = Some(c.u32_at(pos - len)?),
                FieldKind::RowId | FieldKind::TrxId | FieldKind::RollPtr => {
                    values.push(FieldValue::UInt(c.uint_at(pos - len, len)?));
                }
                FieldKind::Column { ordinal, .. } => {
                    let col = &self.def.columns()[ordinal];
                    let value = if external {
                        let full = read_external(source, bytes)?;
                        debug!(
                            column = %col.name,
                            local = bytes.len(),
                            total = full.len(),
                            "reassembled externally stored value"
                        );
                        decode_column(&full, col, &self.ctx)?
                    } else {
                        decode_column(bytes, col, &self.ctx)?
                    };
                    values.push(value);
                }
            }
        }

        Ok(DecodedRecord {
            offset: origin,
            header: rec.header,
            values,
            child_page,
            n_unique: self.layout.n_unique,
        })
    }

    /// Walk and decode every user record on a page.
    pub fn decode_page<S: PageSource + ?Sized>(
        &self,
        page: &[u8],
        source: &S,
    ) -> Result<Vec<DecodedRecord>, IdbError> {
        walk_records(page)?
            .iter()
            .map(|rec| self.decode(page, rec, source))
            .collect()
    }
}

fn step_back(pos: usize, origin: usize) -> Result<usize, IdbError> {
    pos.checked_sub(1).ok_or_else(|| {
        IdbError::Parse(format!(
            "length table of record at offset {} runs off the page",
            origin
        ))
    })
}
