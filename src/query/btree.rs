//! B+tree descent and leaf-level cursors.
//!
//! A [`Tree`] is a view of one index (clustered or secondary) rooted at a
//! known page. Descent reads one node page per level, picks a child by
//! comparing node-pointer keys against the search key and stops at level 0.
//! Scans then follow the leaf chain through the FIL prev/next links, one page
//! at a time, so a range is never materialized in memory.
//!
//! Descent rules, where "prefix" means only the bound key columns are
//! compared and the leftmost node pointer of a level counts as -infinity:
//!
//! | Search | Child taken |
//! |--------|-------------|
//! | point lookup | last pointer with key <= target |
//! | forward, `>=` | last pointer with prefix < target |
//! | forward, `>` | last pointer with prefix <= target |
//! | reverse, `<=` | last pointer with prefix <= target |
//! | reverse, `<` | last pointer with prefix < target |
//!
//! When no pointer qualifies the first child is taken.

use std::cmp::Ordering;

use tracing::debug;

use crate::innodb::field_decode::{DecodeContext, FieldValue};
use crate::innodb::index::IndexPage;
use crate::innodb::page::{expect_index_page, FilHeader};
use crate::innodb::record::{DecodedRecord, IndexLayout, RecordDecoder};
use crate::innodb::tablespace::PageSource;
use crate::query::compare::{KeySchema, KeyValue, RangeOp};
use crate::schema::{KeyMeta, TableDef};
use crate::IdbError;

/// Layouts and search key of one index.
#[derive(Debug, Clone)]
pub struct IndexAccess {
    pub name: String,
    pub schema: KeySchema,
    pub leaf: IndexLayout,
    pub node: IndexLayout,
}

impl IndexAccess {
    pub fn clustered(def: &TableDef) -> Self {
        IndexAccess {
            name: def
                .primary_key()
                .map_or_else(|| "GEN_CLUST_INDEX".to_string(), |pk| pk.name.clone()),
            schema: KeySchema::clustered(def),
            leaf: IndexLayout::clustered(def, true),
            node: IndexLayout::clustered(def, false),
        }
    }

    pub fn secondary(def: &TableDef, key: &KeyMeta) -> Result<Self, IdbError> {
        Ok(IndexAccess {
            name: key.name.clone(),
            schema: KeySchema::secondary(def, key)?,
            leaf: IndexLayout::secondary(def, key, true)?,
            node: IndexLayout::secondary(def, key, false)?,
        })
    }
}

/// Which node pointer a descent follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descent {
    /// Last pointer whose key compares less than or equal to the target.
    LastAtOrBelow,
    /// Last pointer whose key compares strictly less than the target.
    LastBelow,
}

/// A bound on a scan: a search key prefix and its operator.
#[derive(Debug, Clone)]
pub struct ScanBound {
    pub key: Vec<KeyValue>,
    pub op: RangeOp,
}

impl ScanBound {
    pub fn new(values: Vec<FieldValue>, op: RangeOp) -> Self {
        ScanBound {
            key: values.into_iter().map(KeyValue::Value).collect(),
            op,
        }
    }
}

/// One index of one tablespace, rooted at `root`.
#[derive(Clone, Copy)]
pub struct Tree<'a> {
    source: &'a dyn PageSource,
    def: &'a TableDef,
    index: &'a IndexAccess,
    root: u32,
    ctx: DecodeContext,
    include_deleted: bool,
}

impl<'a> Tree<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        def: &'a TableDef,
        index: &'a IndexAccess,
        root: u32,
        ctx: DecodeContext,
        include_deleted: bool,
    ) -> Self {
        Tree {
            source,
            def,
            index,
            root,
            ctx,
            include_deleted,
        }
    }

    pub fn root(&self) -> u32 {
        self.root
    }

    pub fn index(&self) -> &'a IndexAccess {
        self.index
    }

    fn load(&self, page_no: u32) -> Result<(Vec<u8>, FilHeader, IndexPage), IdbError> {
        let data = self.source.load_page(page_no)?;
        let (fil, page) = expect_index_page(&data, page_no)?;
        Ok((data, fil, page))
    }

    /// Descend from the root to the leaf that may hold `target`.
    pub fn find_leaf(&self, target: &[KeyValue], rule: Descent) -> Result<u32, IdbError> {
        let mut page_no = self.root;
        let mut expected: Option<(u16, u64)> = None;
        loop {
            let (data, _, page) = self.load(page_no)?;
            if let Some((level, index_id)) = expected {
                if page.level() != level || page.index_id() != index_id {
                    return Err(IdbError::Parse(format!(
                        "page {} is level {} of index {}, expected level {} of index {}",
                        page_no,
                        page.level(),
                        page.index_id(),
                        level,
                        index_id
                    )));
                }
            }
            if page.is_leaf() {
                return Ok(page_no);
            }

            let decoder = RecordDecoder::new(self.def, &self.index.node, self.ctx);
            let records = decoder.decode_page(&data, self.source)?;
            let mut chosen = None;
            for rec in &records {
                let ord = if rec.header.min_rec {
                    Ordering::Less
                } else {
                    self.index.schema.compare(rec.key(), target)
                };
                let take = match rule {
                    Descent::LastAtOrBelow => ord != Ordering::Greater,
                    Descent::LastBelow => ord == Ordering::Less,
                };
                if !take {
                    break;
                }
                chosen = Some(rec);
            }
            let rec = chosen.or(records.first()).ok_or_else(|| {
                IdbError::Parse(format!("non-leaf page {} has no records", page_no))
            })?;
            let child = rec.child_page.ok_or_else(|| {
                IdbError::Parse(format!("node pointer on page {} lacks a child", page_no))
            })?;
            debug!(
                index = %self.index.name,
                page = page_no,
                level = page.level(),
                child,
                "descend"
            );
            expected = Some((page.level() - 1, page.index_id()));
            page_no = child;
        }
    }

    /// Decode every record of a leaf page, delete-marked ones included.
    pub fn leaf_records(&self, page_no: u32) -> Result<(FilHeader, Vec<DecodedRecord>), IdbError> {
        let (data, fil, page) = self.load(page_no)?;
        if !page.is_leaf() {
            return Err(IdbError::Parse(format!(
                "page {} is level {}, not a leaf",
                page_no,
                page.level()
            )));
        }
        let decoder = RecordDecoder::new(self.def, &self.index.leaf, self.ctx);
        Ok((fil, decoder.decode_page(&data, self.source)?))
    }

    /// Find the record whose full key equals `key`.
    pub fn lookup(&self, key: &[FieldValue]) -> Result<Option<(u32, DecodedRecord)>, IdbError> {
        let target: Vec<KeyValue> = key.iter().cloned().map(KeyValue::Value).collect();
        let leaf = self.find_leaf(&target, Descent::LastAtOrBelow)?;
        let (_, records) = self.leaf_records(leaf)?;
        for rec in records {
            match self.index.schema.compare(rec.key(), &target) {
                Ordering::Less => continue,
                Ordering::Greater => break,
                Ordering::Equal if rec.header.deleted && !self.include_deleted => continue,
                Ordering::Equal => return Ok(Some((leaf, rec))),
            }
        }
        Ok(None)
    }

    /// Start a leaf-level scan between optional bounds.
    pub fn scan(
        self,
        lower: Option<ScanBound>,
        upper: Option<ScanBound>,
        reverse: bool,
    ) -> Result<LeafCursor<'a>, IdbError> {
        for (bound, want_lower) in [(&lower, true), (&upper, false)] {
            if let Some(b) = bound {
                if b.op.is_lower() != want_lower {
                    return Err(IdbError::Argument(format!(
                        "'{}' cannot be used as a {} bound",
                        b.op,
                        if want_lower { "lower" } else { "upper" }
                    )));
                }
            }
        }

        let start = match (reverse, &lower, &upper) {
            (false, Some(b), _) => {
                let rule = if b.op == RangeOp::Gt {
                    Descent::LastAtOrBelow
                } else {
                    Descent::LastBelow
                };
                self.find_leaf(&b.key, rule)?
            }
            (false, None, _) => self.find_leaf(&[KeyValue::Min], Descent::LastBelow)?,
            (true, _, Some(b)) => {
                let rule = if b.op == RangeOp::Lte {
                    Descent::LastAtOrBelow
                } else {
                    Descent::LastBelow
                };
                self.find_leaf(&b.key, rule)?
            }
            (true, _, None) => self.find_leaf(&[KeyValue::Max], Descent::LastAtOrBelow)?,
        };
        debug!(index = %self.index.name, start, reverse, "scan starts");

        Ok(LeafCursor {
            tree: self,
            lower,
            upper,
            reverse,
            next_page: Some(start),
            current_page: start,
            index_id: None,
            buffer: Vec::new().into_iter(),
            pages_read: 0,
            done: false,
        })
    }
}

/// Lazy walk over the leaf records of a [`Tree`] within bounds.
///
/// Yields `(leaf page, record)` in key order, or reverse key order for a
/// reverse scan. Delete-marked records are skipped unless the tree was built
/// to include them. The cursor stops after the first error.
pub struct LeafCursor<'a> {
    tree: Tree<'a>,
    lower: Option<ScanBound>,
    upper: Option<ScanBound>,
    reverse: bool,
    next_page: Option<u32>,
    current_page: u32,
    index_id: Option<u64>,
    buffer: std::vec::IntoIter<DecodedRecord>,
    pages_read: u64,
    done: bool,
}

impl LeafCursor<'_> {
    fn admits(&self, bound: &Option<ScanBound>, rec: &DecodedRecord) -> bool {
        bound.as_ref().map_or(true, |b| {
            b.op.admits(self.tree.index.schema.compare(rec.key(), &b.key))
        })
    }

    fn load_next(&mut self, page_no: u32) -> Result<(), IdbError> {
        self.pages_read += 1;
        if self.pages_read > self.tree.source.page_count() {
            return Err(IdbError::Parse(format!(
                "leaf chain of index '{}' loops (revisited page {})",
                self.tree.index.name, page_no
            )));
        }
        let (data, fil, page) = self.tree.load(page_no)?;
        if !page.is_leaf() {
            return Err(IdbError::Parse(format!(
                "leaf chain reached page {} at level {}",
                page_no,
                page.level()
            )));
        }
        match self.index_id {
            Some(id) if id != page.index_id() => {
                return Err(IdbError::Parse(format!(
                    "leaf chain left index {} at page {} (index {})",
                    id,
                    page_no,
                    page.index_id()
                )));
            }
            _ => self.index_id = Some(page.index_id()),
        }
        let decoder = RecordDecoder::new(self.tree.def, &self.tree.index.leaf, self.tree.ctx);
        let mut records = decoder.decode_page(&data, self.tree.source)?;
        if self.reverse {
            records.reverse();
            self.next_page = fil.prev();
        } else {
            self.next_page = fil.next();
        }
        self.current_page = page_no;
        self.buffer = records.into_iter();
        Ok(())
    }
}

impl Iterator for LeafCursor<'_> {
    type Item = Result<(u32, DecodedRecord), IdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let Some(rec) = self.buffer.next() else {
                let Some(page_no) = self.next_page.take() else {
                    self.done = true;
                    break;
                };
                if let Err(e) = self.load_next(page_no) {
                    self.done = true;
                    return Some(Err(e));
                }
                continue;
            };

            let (skip_bound, stop_bound) = if self.reverse {
                (&self.upper, &self.lower)
            } else {
                (&self.lower, &self.upper)
            };
            if !self.admits(skip_bound, &rec) {
                continue;
            }
            if !self.admits(stop_bound, &rec) {
                self.done = true;
                break;
            }
            if rec.header.deleted && !self.tree.include_deleted {
                continue;
            }
            return Some(Ok((self.current_page, rec)));
        }
        None
    }
}
