//! The table reader facade.
//!
//! [`TableReader`] pairs a tablespace with a [`TableDef`] and answers row
//! queries: leaf page dumps, primary-key point lookups, forward and reverse
//! primary-key ranges, and secondary-key ranges resolved through the
//! clustered index. Range queries return a lazy [`RowIter`] that reads one
//! leaf page at a time.
//!
//! A reader goes through one lifecycle: [`TableReader::new`], then
//! [`open`](TableReader::open), any number of queries, then
//! [`close`](TableReader::close). Queries outside that window and a second
//! `open` fail with [`IdbError::State`]. Dropping the reader releases the
//! file on every path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::FixedOffset;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::innodb::field_decode::{utc, DecodeContext, FieldValue};
use crate::innodb::page::{FilHeader, Page};
use crate::innodb::record::{DecodedRecord, FieldKind, IndexLayout};
use crate::innodb::tablespace::Tablespace;
use crate::query::btree::{IndexAccess, LeafCursor, ScanBound, Tree};
use crate::query::cache::SingleFlight;
use crate::query::catalog::IndexCatalog;
use crate::query::compare::{compare_keys, KeyColumn, KeyValue, RangeOp};
use crate::schema::{KeyKind, KeyMeta, TableDef};
use crate::IdbError;

/// Clustered index root of a file-per-table tablespace.
pub const DEFAULT_CLUSTERED_ROOT: u32 = 3;

/// Reader settings.
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use ibdrow::query::reader::ReaderConfig;
///
/// let cfg: ReaderConfig =
///     serde_json::from_str(r#"{"time_zone": "+08:00", "lookup_cache": true}"#).unwrap();
/// assert_eq!(cfg.time_zone.local_minus_utc(), 8 * 3600);
/// assert!(cfg.discover_index_roots);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Clustered index root. Falls back to the definition's recorded root,
    /// then to page 3.
    pub root_page: Option<u32>,
    /// Zone TIMESTAMP values are rendered in.
    #[serde(deserialize_with = "deserialize_time_zone")]
    pub time_zone: FixedOffset,
    pub verify_checksums: bool,
    /// Memoize primary-key point lookups.
    pub lookup_cache: bool,
    /// Scan INDEX pages for secondary roots before guessing them.
    pub discover_index_roots: bool,
    /// Return delete-marked records too.
    pub include_deleted: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            root_page: None,
            time_zone: utc(),
            verify_checksums: false,
            lookup_cache: false,
            discover_index_roots: true,
            include_deleted: false,
        }
    }
}

impl ReaderConfig {
    pub fn with_root_page(mut self, page: u32) -> Self {
        self.root_page = Some(page);
        self
    }

    pub fn with_time_zone(mut self, tz: FixedOffset) -> Self {
        self.time_zone = tz;
        self
    }

    pub fn with_verify_checksums(mut self, on: bool) -> Self {
        self.verify_checksums = on;
        self
    }

    pub fn with_lookup_cache(mut self, on: bool) -> Self {
        self.lookup_cache = on;
        self
    }

    pub fn with_discover_index_roots(mut self, on: bool) -> Self {
        self.discover_index_roots = on;
        self
    }

    pub fn with_include_deleted(mut self, on: bool) -> Self {
        self.include_deleted = on;
        self
    }
}

/// Parse a UTC offset: `Z`, `UTC`, `+HH:MM`, `-HHMM` or `+HH`.
pub fn parse_time_zone(s: &str) -> Result<FixedOffset, IdbError> {
    let t = s.trim();
    if t.eq_ignore_ascii_case("z") || t.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }
    let bad = || IdbError::Argument(format!("invalid time zone '{}', expected +HH:MM", s));
    let (sign, rest) = match t.as_bytes().first() {
        Some(b'+') => (1, &t[1..]),
        Some(b'-') => (-1, &t[1..]),
        _ => return Err(bad()),
    };
    let (h, m) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => rest.split_at(2),
        None if rest.len() <= 2 => (rest, "0"),
        None => return Err(bad()),
    };
    let h: i32 = h.parse::<u8>().map_err(|_| bad())?.into();
    let m: i32 = m.parse::<u8>().map_err(|_| bad())?.into();
    if h > 14 || m > 59 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60)).ok_or_else(bad)
}

fn deserialize_time_zone<'de, D: Deserializer<'de>>(d: D) -> Result<FixedOffset, D::Error> {
    let s = String::deserialize(d)?;
    parse_time_zone(&s).map_err(serde::de::Error::custom)
}

/// Counters kept across queries.
#[derive(Debug, Default)]
pub struct QueryStats {
    clustered_lookups: AtomicU64,
}

impl QueryStats {
    /// Point lookups into the clustered index made to complete secondary
    /// index rows.
    pub fn clustered_lookups(&self) -> u64 {
        self.clustered_lookups.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.clustered_lookups.store(0, Ordering::Relaxed);
    }
}

/// Hidden columns of a clustered index record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemColumns {
    /// DB_ROW_ID, present only in tables without a primary key.
    pub row_id: Option<u64>,
    pub trx_id: Option<u64>,
    pub roll_ptr: Option<u64>,
}

/// One logical row.
///
/// Serializes as a JSON object from column name to value.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<FieldValue>,
    page_number: u32,
    deleted: bool,
    system: SystemColumns,
}

impl Row {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<FieldValue> {
        self.values
    }

    /// Value of column `name` (ASCII case-insensitive).
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|i| self.values.get(i))
    }

    /// Leaf page the row was read from.
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn system(&self) -> SystemColumns {
        self.system
    }

    pub fn row_id(&self) -> Option<u64> {
        self.system.row_id
    }

    fn project(self, projection: &Projection) -> Row {
        Row {
            columns: Arc::clone(&projection.names),
            values: projection
                .ordinals
                .iter()
                .map(|&o| self.values.get(o).cloned().unwrap_or(FieldValue::Null))
                .collect(),
            ..self
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Row filter applied before projection.
pub type RowPredicate<'a> = Box<dyn Fn(&Row) -> bool + 'a>;

/// Lower bound, its operator, upper bound, its operator.
type BoundPair<'v> = (
    Option<&'v [FieldValue]>,
    RangeOp,
    Option<&'v [FieldValue]>,
    RangeOp,
);

/// Names a secondary key by name or by position in the definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySelector<'a> {
    Name(&'a str),
    Ordinal(usize),
}

impl<'a> From<&'a str> for KeySelector<'a> {
    fn from(name: &'a str) -> Self {
        KeySelector::Name(name)
    }
}

impl From<usize> for KeySelector<'_> {
    fn from(ordinal: usize) -> Self {
        KeySelector::Ordinal(ordinal)
    }
}

#[derive(Debug, Clone)]
struct Projection {
    ordinals: Vec<usize>,
    names: Arc<[String]>,
}

enum State {
    Unopened(Option<Tablespace>),
    Open(Box<OpenState>),
    Closed,
}

struct OpenState {
    ts: Tablespace,
    clustered: IndexAccess,
    clustered_root: u32,
    /// One per secondary key; `None` for FULLTEXT keys.
    secondaries: Vec<Option<IndexAccess>>,
    catalog: OnceLock<Result<IndexCatalog, IdbError>>,
    cache: Option<SingleFlight<String, Option<Row>>>,
    ctx: DecodeContext,
    names: Arc<[String]>,
}

/// Reads rows of one table from its tablespace.
pub struct TableReader {
    path: Option<PathBuf>,
    def: TableDef,
    config: ReaderConfig,
    state: State,
    stats: QueryStats,
}

impl TableReader {
    /// A reader for the tablespace file at `path`. Nothing is read until
    /// [`open`](Self::open).
    pub fn new<P: AsRef<Path>>(path: P, def: TableDef, config: ReaderConfig) -> Self {
        TableReader {
            path: Some(path.as_ref().to_path_buf()),
            def,
            config,
            state: State::Unopened(None),
            stats: QueryStats::default(),
        }
    }

    /// A reader over an already opened (or in-memory) tablespace.
    pub fn with_tablespace(ts: Tablespace, def: TableDef, config: ReaderConfig) -> Self {
        TableReader {
            path: ts.path().map(Path::to_path_buf),
            def,
            config,
            state: State::Unopened(Some(ts)),
            stats: QueryStats::default(),
        }
    }

    /// Open the tablespace and prepare the index layouts.
    pub fn open(&mut self) -> Result<(), IdbError> {
        let pending = match &mut self.state {
            State::Unopened(ts) => ts.take(),
            State::Open(_) => return Err(IdbError::State("reader is already open".to_string())),
            State::Closed => return Err(IdbError::State("reader has been closed".to_string())),
        };
        let mut ts = match pending {
            Some(ts) => ts,
            None => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| IdbError::State("reader has no tablespace".to_string()))?;
                Tablespace::open(path)?
            }
        };
        ts.set_verify_checksums(self.config.verify_checksums);

        let secondaries = self
            .def
            .secondary_keys()
            .iter()
            .map(|key| match key.kind {
                KeyKind::Fulltext => Ok(None),
                _ => IndexAccess::secondary(&self.def, key).map(Some),
            })
            .collect::<Result<Vec<_>, IdbError>>()?;
        let clustered_root = self
            .config
            .root_page
            .or(self.def.clustered_root())
            .unwrap_or(DEFAULT_CLUSTERED_ROOT);

        debug!(
            path = ?self.path,
            pages = ts.page_count(),
            clustered_root,
            "opened tablespace"
        );
        self.state = State::Open(Box::new(OpenState {
            ts,
            clustered: IndexAccess::clustered(&self.def),
            clustered_root,
            secondaries,
            catalog: OnceLock::new(),
            cache: self.config.lookup_cache.then(SingleFlight::new),
            ctx: DecodeContext {
                time_zone: self.config.time_zone,
            },
            names: self.def.column_names().into(),
        }));
        Ok(())
    }

    /// Release the tablespace. Later queries fail; closing twice is a no-op.
    pub fn close(&mut self) {
        if matches!(self.state, State::Open(_)) {
            debug!(path = ?self.path, "closed tablespace");
        }
        self.state = State::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    pub fn def(&self) -> &TableDef {
        &self.def
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    fn open_state(&self) -> Result<&OpenState, IdbError> {
        match &self.state {
            State::Open(st) => Ok(st),
            State::Unopened(_) => Err(IdbError::State("reader is not open".to_string())),
            State::Closed => Err(IdbError::State("reader has been closed".to_string())),
        }
    }

    /// The open tablespace.
    pub fn tablespace(&self) -> Result<&Tablespace, IdbError> {
        Ok(&self.open_state()?.ts)
    }

    /// Root page used for the clustered index.
    pub fn clustered_root(&self) -> Result<u32, IdbError> {
        Ok(self.open_state()?.clustered_root)
    }

    pub fn page_count(&self) -> Result<u64, IdbError> {
        Ok(self.open_state()?.ts.page_count())
    }

    /// Read and decode one page.
    pub fn read_page(&self, page_no: u64) -> Result<Page, IdbError> {
        self.open_state()?.ts.decode_page(page_no)
    }

    /// Decode every page, failing on the first page that cannot be decoded.
    pub fn read_all_pages(&self) -> Result<Vec<Page>, IdbError> {
        self.pages()?.collect()
    }

    /// Lazily decode every page in page order.
    pub fn pages(&self) -> Result<PageIter<'_>, IdbError> {
        let ts = &self.open_state()?.ts;
        Ok(PageIter {
            ts,
            next: 0,
            count: ts.page_count(),
        })
    }

    /// FIL headers of every page, without decoding bodies.
    pub fn read_all_page_headers(&self) -> Result<Vec<FilHeader>, IdbError> {
        self.open_state()?.ts.read_all_page_headers()
    }

    /// B+trees found by scanning INDEX pages. Computed once per open.
    pub fn catalog(&self) -> Result<IndexCatalog, IdbError> {
        catalog_of(self.open_state()?).cloned()
    }

    fn clustered_tree<'a>(&'a self, st: &'a OpenState) -> Tree<'a> {
        Tree::new(
            &st.ts,
            &self.def,
            &st.clustered,
            st.clustered_root,
            st.ctx,
            self.config.include_deleted,
        )
    }

    /// Rows stored on one leaf page of the clustered index, in page order.
    pub fn query_by_page_number(&self, page_no: u32) -> Result<Vec<Row>, IdbError> {
        let st = self.open_state()?;
        let (_, records) = self.clustered_tree(st).leaf_records(page_no)?;
        Ok(records
            .into_iter()
            .filter(|rec| self.config.include_deleted || !rec.header.deleted)
            .map(|rec| clustered_row(&st.clustered.leaf, rec, page_no, &st.names))
            .collect())
    }

    /// Point lookup by the full primary key.
    pub fn query_by_primary_key(&self, key: &[FieldValue]) -> Result<Option<Row>, IdbError> {
        let st = self.open_state()?;
        let Some(pk) = self.def.primary_key() else {
            return Err(IdbError::Argument(format!(
                "table '{}' has no primary key",
                self.def.name()
            )));
        };
        if key.len() != pk.parts.len() {
            return Err(IdbError::Argument(format!(
                "primary key has {} columns, got {} values",
                pk.parts.len(),
                key.len()
            )));
        }
        let key = st.clustered.schema.coerce(key)?;
        let lookup = || -> Result<Option<Row>, IdbError> {
            Ok(self
                .clustered_tree(st)
                .lookup(&key)?
                .map(|(page, rec)| clustered_row(&st.clustered.leaf, rec, page, &st.names)))
        };
        match &st.cache {
            Some(cache) => {
                let cache_key =
                    serde_json::to_string(&key).map_err(|e| IdbError::Argument(e.to_string()))?;
                cache.get_or_compute(cache_key, lookup)
            }
            None => lookup(),
        }
    }

    /// Rows in primary key order between two optional bounds.
    ///
    /// `lower_op` must be `Gt`/`Gte` and `upper_op` `Lt`/`Lte`; an absent
    /// bound is open. Bounds may bind a leading prefix of the key. For a
    /// table without a primary key the key is the row id.
    pub fn range_query_by_primary_key<'a>(
        &'a self,
        lower: Option<&[FieldValue]>,
        lower_op: RangeOp,
        upper: Option<&[FieldValue]>,
        upper_op: RangeOp,
        predicate: Option<RowPredicate<'a>>,
        projection: Option<&[&str]>,
    ) -> Result<RowIter<'a>, IdbError> {
        self.scan_clustered(lower, lower_op, upper, upper_op, predicate, projection, false)
    }

    /// The same rows as [`range_query_by_primary_key`](Self::range_query_by_primary_key),
    /// in descending key order.
    pub fn reverse_range_query_by_primary_key<'a>(
        &'a self,
        lower: Option<&[FieldValue]>,
        lower_op: RangeOp,
        upper: Option<&[FieldValue]>,
        upper_op: RangeOp,
        predicate: Option<RowPredicate<'a>>,
        projection: Option<&[&str]>,
    ) -> Result<RowIter<'a>, IdbError> {
        self.scan_clustered(lower, lower_op, upper, upper_op, predicate, projection, true)
    }

    /// Every row in primary key order.
    pub fn query_all(&self) -> Result<RowIter<'_>, IdbError> {
        self.scan_clustered(None, RangeOp::Gte, None, RangeOp::Lte, None, None, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_clustered<'a>(
        &'a self,
        lower: Option<&[FieldValue]>,
        lower_op: RangeOp,
        upper: Option<&[FieldValue]>,
        upper_op: RangeOp,
        predicate: Option<RowPredicate<'a>>,
        projection: Option<&[&str]>,
        reverse: bool,
    ) -> Result<RowIter<'a>, IdbError> {
        let st = self.open_state()?;
        let projection = self.projection(projection)?;
        let lower = bound(&st.clustered, lower, lower_op)?;
        let upper = bound(&st.clustered, upper, upper_op)?;
        let cursor = self.clustered_tree(st).scan(lower, upper, reverse)?;
        Ok(RowIter {
            cursor,
            layout: &st.clustered.leaf,
            mode: ScanMode::Clustered,
            predicate,
            projection,
            names: Arc::clone(&st.names),
            stats: &self.stats,
        })
    }

    /// Rows in secondary key order between two optional bounds.
    ///
    /// `root_page` overrides every other source for the index root.
    /// Otherwise the root recorded in the key's metadata is used, then the
    /// discovered index catalog, then a guess from page numbers. Rows the
    /// index alone can answer (`projection` covered by its columns) cost no
    /// clustered lookups; otherwise each row costs exactly one.
    /// `predicate` sees the full row, or only the projected columns when
    /// the scan is covering.
    #[allow(clippy::too_many_arguments)]
    pub fn query_by_secondary_key<'a>(
        &'a self,
        selector: KeySelector<'_>,
        lower: Option<&[FieldValue]>,
        lower_op: RangeOp,
        upper: Option<&[FieldValue]>,
        upper_op: RangeOp,
        predicate: Option<RowPredicate<'a>>,
        projection: Option<&[&str]>,
        root_page: Option<u32>,
    ) -> Result<RowIter<'a>, IdbError> {
        let bounds = (lower, lower_op, upper, upper_op);
        self.scan_secondary(selector, bounds, predicate, projection, root_page, false)
    }

    /// Descending form of [`query_by_secondary_key`](Self::query_by_secondary_key).
    #[allow(clippy::too_many_arguments)]
    pub fn reverse_query_by_secondary_key<'a>(
        &'a self,
        selector: KeySelector<'_>,
        lower: Option<&[FieldValue]>,
        lower_op: RangeOp,
        upper: Option<&[FieldValue]>,
        upper_op: RangeOp,
        predicate: Option<RowPredicate<'a>>,
        projection: Option<&[&str]>,
        root_page: Option<u32>,
    ) -> Result<RowIter<'a>, IdbError> {
        let bounds = (lower, lower_op, upper, upper_op);
        self.scan_secondary(selector, bounds, predicate, projection, root_page, true)
    }

    fn scan_secondary<'a>(
        &'a self,
        selector: KeySelector<'_>,
        (lower, lower_op, upper, upper_op): BoundPair<'_>,
        predicate: Option<RowPredicate<'a>>,
        projection: Option<&[&str]>,
        root_page: Option<u32>,
        reverse: bool,
    ) -> Result<RowIter<'a>, IdbError> {
        let st = self.open_state()?;
        let (ordinal, key) = self.select_key(selector)?;
        let access = st.secondaries.get(ordinal).and_then(Option::as_ref).ok_or_else(|| {
            IdbError::Argument(format!(
                "key '{}' is a FULLTEXT index and cannot be scanned",
                key.name
            ))
        })?;
        let mut projection = self.projection(projection)?;

        let prefix_filter = self.prefix_filter(access, lower, lower_op, upper, upper_op)?;
        let lower = index_bound(access, lower, lower_op)?;
        let upper = index_bound(access, upper, upper_op)?;

        let wanted: Vec<usize> = match &projection {
            Some(p) => p.ordinals.clone(),
            None => (0..self.def.columns().len()).collect(),
        };
        let covering = prefix_filter.is_none() && access.leaf.covers(&wanted);
        if covering && projection.is_none() {
            projection = Some(Projection {
                ordinals: wanted,
                names: Arc::clone(&st.names),
            });
        }

        let pk_positions = match self.def.primary_key() {
            Some(pk) => pk
                .ordinals()
                .map(|o| access.leaf.position(o))
                .collect::<Option<Vec<_>>>(),
            None => access
                .leaf
                .kind_position(FieldKind::RowId)
                .map(|p| vec![p]),
        }
        .ok_or_else(|| {
            IdbError::Parse(format!(
                "index '{}' records do not carry the clustered key",
                access.name
            ))
        })?;

        let root = self.secondary_root(st, ordinal, key, root_page);
        debug!(index = %access.name, root, covering, "secondary scan");
        let tree = Tree::new(
            &st.ts,
            &self.def,
            access,
            root,
            st.ctx,
            self.config.include_deleted,
        );
        let cursor = tree.scan(lower, upper, reverse)?;
        Ok(RowIter {
            cursor,
            layout: &access.leaf,
            mode: ScanMode::Secondary {
                clustered: self.clustered_tree(st),
                pk_positions,
                covering,
                prefix_filter,
            },
            predicate,
            projection,
            names: Arc::clone(&st.names),
            stats: &self.stats,
        })
    }

    fn select_key(&self, selector: KeySelector<'_>) -> Result<(usize, &KeyMeta), IdbError> {
        let keys = self.def.secondary_keys();
        let ordinal = match selector {
            KeySelector::Name(name) => keys
                .iter()
                .position(|k| k.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| IdbError::Argument(format!("unknown secondary key '{}'", name)))?,
            KeySelector::Ordinal(n) if n < keys.len() => n,
            KeySelector::Ordinal(n) => {
                return Err(IdbError::Argument(format!(
                    "secondary key ordinal {} out of range ({} keys)",
                    n,
                    keys.len()
                )))
            }
        };
        Ok((ordinal, &keys[ordinal]))
    }

    fn secondary_root(
        &self,
        st: &OpenState,
        ordinal: usize,
        key: &KeyMeta,
        override_root: Option<u32>,
    ) -> u32 {
        if let Some(root) = override_root.or(key.root_page) {
            return root;
        }
        let keys = self.def.secondary_keys();
        let fulltext = keys.iter().filter(|k| k.kind == KeyKind::Fulltext).count();
        let position = keys[..ordinal]
            .iter()
            .filter(|k| k.kind != KeyKind::Fulltext)
            .count();

        if self.config.discover_index_roots {
            match catalog_of(st) {
                Ok(catalog) => {
                    if let Some(root) = catalog.secondary_root(st.clustered_root, position, fulltext) {
                        debug!(index = %key.name, root, "secondary root from index catalog");
                        return root;
                    }
                }
                Err(e) => warn!(error = %e, "index root discovery failed"),
            }
        }

        let root = st.clustered_root + 1 + position as u32 + fulltext as u32;
        warn!(
            index = %key.name,
            root,
            "secondary index root is not recorded; guessing from page numbers"
        );
        root
    }

    /// Full-value re-check for bounds that touch prefix-indexed columns.
    fn prefix_filter(
        &self,
        access: &IndexAccess,
        lower: Option<&[FieldValue]>,
        lower_op: RangeOp,
        upper: Option<&[FieldValue]>,
        upper_op: RangeOp,
    ) -> Result<Option<PrefixFilter>, IdbError> {
        let bound_len = lower.map_or(0, <[_]>::len).max(upper.map_or(0, <[_]>::len));
        let parts = &access.schema.parts()[..bound_len.min(access.schema.user_parts())];
        if !parts.iter().any(|p| p.prefix_len.is_some()) {
            return Ok(None);
        }
        let full = |values: Option<&[FieldValue]>, op| -> Result<Option<(Vec<KeyValue>, RangeOp)>, IdbError> {
            values
                .map(|v| {
                    let key = access.schema.coerce_full(v)?;
                    Ok((key.into_iter().map(KeyValue::Value).collect(), op))
                })
                .transpose()
        };
        Ok(Some(PrefixFilter {
            ordinals: parts.iter().map(|p| p.column.ordinal).collect(),
            parts: parts
                .iter()
                .map(|p| KeyColumn {
                    column: p.column.clone(),
                    prefix_len: None,
                })
                .collect(),
            lower: full(lower, lower_op)?,
            upper: full(upper, upper_op)?,
        }))
    }

    fn projection(&self, names: Option<&[&str]>) -> Result<Option<Projection>, IdbError> {
        let Some(names) = names else {
            return Ok(None);
        };
        if names.is_empty() {
            return Err(IdbError::Argument("projection names no columns".to_string()));
        }
        let columns = names
            .iter()
            .map(|n| {
                self.def
                    .column(n)
                    .ok_or_else(|| IdbError::Argument(format!("unknown column '{}'", n)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Projection {
            ordinals: columns.iter().map(|c| c.ordinal).collect(),
            names: columns.iter().map(|c| c.name.clone()).collect(),
        }))
    }
}

fn catalog_of(st: &OpenState) -> Result<&IndexCatalog, IdbError> {
    st.catalog
        .get_or_init(|| IndexCatalog::discover(&st.ts))
        .as_ref()
        .map_err(Clone::clone)
}

fn bound(
    access: &IndexAccess,
    values: Option<&[FieldValue]>,
    op: RangeOp,
) -> Result<Option<ScanBound>, IdbError> {
    values
        .map(|v| Ok(ScanBound::new(access.schema.coerce(v)?, op)))
        .transpose()
}

/// A secondary scan bound. Strict bounds cut down to a prefix are widened;
/// the prefix filter applies the exact bound.
fn index_bound(
    access: &IndexAccess,
    values: Option<&[FieldValue]>,
    op: RangeOp,
) -> Result<Option<ScanBound>, IdbError> {
    values
        .map(|v| {
            let (key, op) = access.schema.coerce_bound(v, op)?;
            Ok(ScanBound::new(key, op))
        })
        .transpose()
}

/// Assemble a full row from a clustered leaf record.
fn clustered_row(layout: &IndexLayout, rec: DecodedRecord, page: u32, names: &Arc<[String]>) -> Row {
    let mut values = vec![FieldValue::Null; names.len()];
    let mut system = SystemColumns::default();
    for (field, value) in layout.fields().iter().zip(rec.values) {
        match field.kind {
            FieldKind::Column { ordinal, .. } => {
                if let Some(slot) = values.get_mut(ordinal) {
                    *slot = value;
                }
            }
            FieldKind::RowId => system.row_id = value.as_u64(),
            FieldKind::TrxId => system.trx_id = value.as_u64(),
            FieldKind::RollPtr => system.roll_ptr = value.as_u64(),
            FieldKind::ChildPage => {}
        }
    }
    Row {
        columns: Arc::clone(names),
        values,
        page_number: page,
        deleted: rec.header.deleted,
        system,
    }
}

/// Answer a projection from a secondary leaf record alone.
fn covering_row(layout: &IndexLayout, rec: &DecodedRecord, page: u32, projection: &Projection) -> Row {
    let value_at = |p: Option<usize>| {
        p.and_then(|p| rec.values.get(p))
            .cloned()
            .unwrap_or(FieldValue::Null)
    };
    Row {
        columns: Arc::clone(&projection.names),
        values: projection
            .ordinals
            .iter()
            .map(|&o| value_at(layout.position(o)))
            .collect(),
        page_number: page,
        deleted: rec.header.deleted,
        system: SystemColumns {
            row_id: value_at(layout.kind_position(FieldKind::RowId)).as_u64(),
            ..SystemColumns::default()
        },
    }
}

struct PrefixFilter {
    ordinals: Vec<usize>,
    parts: Vec<KeyColumn>,
    lower: Option<(Vec<KeyValue>, RangeOp)>,
    upper: Option<(Vec<KeyValue>, RangeOp)>,
}

impl PrefixFilter {
    fn admits(&self, row: &Row) -> bool {
        let key: Vec<FieldValue> = self
            .ordinals
            .iter()
            .map(|&o| row.values.get(o).cloned().unwrap_or(FieldValue::Null))
            .collect();
        [&self.lower, &self.upper].into_iter().flatten().all(|(target, op)| {
            op.admits(compare_keys(&key, target, &self.parts))
        })
    }
}

enum ScanMode<'a> {
    Clustered,
    Secondary {
        clustered: Tree<'a>,
        /// Where the clustered key sits in a secondary record.
        pk_positions: Vec<usize>,
        covering: bool,
        prefix_filter: Option<PrefixFilter>,
    },
}

/// Lazy row sequence of a range query.
///
/// Pages are read as the iterator advances; dropping it ends the scan.
/// Iteration stops after the first error.
pub struct RowIter<'a> {
    cursor: LeafCursor<'a>,
    layout: &'a IndexLayout,
    mode: ScanMode<'a>,
    predicate: Option<RowPredicate<'a>>,
    projection: Option<Projection>,
    names: Arc<[String]>,
    stats: &'a QueryStats,
}

impl RowIter<'_> {
    fn resolve(&self, page: u32, rec: DecodedRecord) -> Result<Option<Row>, IdbError> {
        let row = match &self.mode {
            ScanMode::Clustered => clustered_row(self.layout, rec, page, &self.names),
            ScanMode::Secondary {
                clustered,
                pk_positions,
                covering,
                prefix_filter,
            } => {
                if *covering {
                    if let Some(p) = &self.projection {
                        let row = covering_row(self.layout, &rec, page, p);
                        if self.predicate.as_ref().is_some_and(|pred| !pred(&row)) {
                            return Ok(None);
                        }
                        return Ok(Some(row));
                    }
                }
                let key: Vec<FieldValue> = pk_positions
                    .iter()
                    .map(|&p| rec.values.get(p).cloned().unwrap_or(FieldValue::Null))
                    .collect();
                self.stats.clustered_lookups.fetch_add(1, Ordering::Relaxed);
                let Some((cpage, crec)) = clustered.lookup(&key)? else {
                    warn!(
                        page,
                        key = ?key,
                        "secondary index entry has no clustered row; skipped"
                    );
                    return Ok(None);
                };
                let row = clustered_row(&clustered.index().leaf, crec, cpage, &self.names);
                if prefix_filter.as_ref().is_some_and(|f| !f.admits(&row)) {
                    return Ok(None);
                }
                row
            }
        };
        if self.predicate.as_ref().is_some_and(|pred| !pred(&row)) {
            return Ok(None);
        }
        Ok(Some(match &self.projection {
            Some(p) => row.project(p),
            None => row,
        }))
    }
}

impl Iterator for RowIter<'_> {
    type Item = Result<Row, IdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (page, rec) = match self.cursor.next()? {
                Ok(hit) => hit,
                Err(e) => return Some(Err(e)),
            };
            match self.resolve(page, rec) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Decodes pages in order. Stops after the first failure.
pub struct PageIter<'a> {
    ts: &'a Tablespace,
    next: u64,
    count: u64,
}

impl Iterator for PageIter<'_> {
    type Item = Result<Page, IdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let page = self.ts.decode_page(self.next);
        self.next = if page.is_ok() { self.next + 1 } else { self.count };
        Some(page)
    }
}
