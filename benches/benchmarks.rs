//! Criterion benchmarks for the page decoder and the query engine.
//!
//! Benchmarks cover:
//! - Page header parsing and full page decoding
//! - Checksum validation (CRC-32C)
//! - Primary-key point lookups through a two-level tree
//! - Forward and reverse primary-key range scans
//! - Secondary-key scans, covering and with clustered lookups

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use common::*;
use ibdrow::innodb::checksum::validate_checksum;
use ibdrow::innodb::field_decode::FieldValue;
use ibdrow::innodb::page::{FilHeader, Page};
use ibdrow::innodb::tablespace::Tablespace;
use ibdrow::query::compare::RangeOp;
use ibdrow::query::reader::{KeySelector, ReaderConfig, TableReader};
use ibdrow::schema::{Column, ColumnType, KeyMeta, RawTableDef, TableDef};

const ROWS: i64 = 5000;
const CLUSTERED_ROOT: u32 = 3;
const SECONDARY_ROOT: u32 = 4;

// ---------------------------------------------------------------------------
// Synthetic table: id BIGINT PK, grp INT, name VARCHAR(32), KEY k_grp (grp)
// ---------------------------------------------------------------------------

fn bench_def() -> TableDef {
    TableDef::new(RawTableDef {
        name: "bench".to_string(),
        columns: vec![
            Column::new("id", ColumnType::BigInt),
            Column::new("grp", ColumnType::Int),
            Column::new("name", ColumnType::VarChar).length(32),
        ],
        primary_key: Some(KeyMeta::primary(&["id"])),
        secondary_keys: vec![KeyMeta::index("k_grp", &["grp"]).with_root_page(SECONDARY_ROOT)],
        ..Default::default()
    })
    .unwrap()
}

fn build_image() -> Vec<u8> {
    let clustered: Vec<_> = (1..=ROWS)
        .map(|id| {
            let key = Field::fixed(&int_bytes(id, 8));
            let mut fields = vec![key.clone()];
            fields.extend(trx_fields(id as u64));
            fields.push(Field::fixed(&int_bytes(id % 100, 4)));
            fields.push(Field::var(format!("row-{:06}", id).as_bytes()));
            (vec![key], encode_record(&fields, 0))
        })
        .collect();
    let mut by_grp: Vec<(i64, i64)> = (1..=ROWS).map(|id| (id % 100, id)).collect();
    by_grp.sort();
    let secondary: Vec<_> = by_grp
        .iter()
        .map(|&(grp, id)| {
            let fields = vec![Field::fixed(&int_bytes(grp, 4)), Field::fixed(&int_bytes(id, 8))];
            let rec = encode_record(&fields, 0);
            (fields, rec)
        })
        .collect();

    let shape = |index_id| TreeShape {
        index_id,
        per_leaf: 100,
        fanout: 50,
        n_nullable: 0,
    };
    let mut pages = build_tree(CLUSTERED_ROOT, 5, &shape(200), clustered);
    let next = pages.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
    pages.extend(build_tree(SECONDARY_ROOT, next, &shape(201), secondary));
    let total = pages.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
    pages.push((0, fsp_hdr_page(total, None)));
    pages.push((1, plain_page(1, TYPE_IBUF_BITMAP)));
    pages.push((2, plain_page(2, TYPE_INODE)));
    assemble(pages).concat()
}

fn open_reader(image: &[u8]) -> TableReader {
    let ts = Tablespace::from_bytes(image.to_vec()).unwrap();
    let mut reader = TableReader::with_tablespace(ts, bench_def(), ReaderConfig::default());
    reader.open().unwrap();
    reader
}

// ---------------------------------------------------------------------------
// Benchmark: page level
// ---------------------------------------------------------------------------

fn bench_page_decode(c: &mut Criterion) {
    let image = build_image();
    let root = &image[CLUSTERED_ROOT as usize * PS..(CLUSTERED_ROOT as usize + 1) * PS];

    let mut group = c.benchmark_group("page");
    group.throughput(Throughput::Bytes(PS as u64));
    group.bench_function("fil_header_parse", |b| {
        b.iter(|| black_box(FilHeader::parse(black_box(root))));
    });
    group.bench_function("decode_index_page", |b| {
        b.iter(|| black_box(Page::decode(black_box(root)).unwrap()));
    });
    group.bench_function("validate_checksum", |b| {
        b.iter(|| black_box(validate_checksum(black_box(root))));
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: primary key
// ---------------------------------------------------------------------------

fn bench_primary_key(c: &mut Criterion) {
    let image = build_image();
    let reader = open_reader(&image);

    let mut group = c.benchmark_group("primary_key");
    group.bench_function("point_lookup", |b| {
        let mut id = 0;
        b.iter(|| {
            id = id % ROWS + 1;
            black_box(reader.query_by_primary_key(&[FieldValue::Int(id)]).unwrap());
        });
    });

    group.throughput(Throughput::Elements(1000));
    let lower = [FieldValue::Int(2000)];
    let upper = [FieldValue::Int(3000)];
    group.bench_function("range_1000_rows", |b| {
        b.iter(|| {
            let rows = reader
                .range_query_by_primary_key(
                    Some(&lower),
                    RangeOp::Gte,
                    Some(&upper),
                    RangeOp::Lt,
                    None,
                    None,
                )
                .unwrap();
            black_box(rows.count());
        });
    });
    group.bench_function("reverse_range_1000_rows", |b| {
        b.iter(|| {
            let rows = reader
                .reverse_range_query_by_primary_key(
                    Some(&lower),
                    RangeOp::Gte,
                    Some(&upper),
                    RangeOp::Lt,
                    None,
                    None,
                )
                .unwrap();
            black_box(rows.count());
        });
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: secondary key
// ---------------------------------------------------------------------------

fn bench_secondary_key(c: &mut Criterion) {
    let image = build_image();
    let reader = open_reader(&image);
    let grp = [FieldValue::Int(42)];

    let mut group = c.benchmark_group("secondary_key");
    group.throughput(Throughput::Elements((ROWS / 100) as u64));
    group.bench_function("covering_scan", |b| {
        b.iter(|| {
            let rows = reader
                .query_by_secondary_key(
                    KeySelector::Name("k_grp"),
                    Some(&grp),
                    RangeOp::Gte,
                    Some(&grp),
                    RangeOp::Lte,
                    None,
                    Some(&["grp", "id"]),
                    None,
                )
                .unwrap();
            black_box(rows.count());
        });
    });
    group.bench_function("scan_with_lookups", |b| {
        b.iter(|| {
            let rows = reader
                .query_by_secondary_key(
                    KeySelector::Name("k_grp"),
                    Some(&grp),
                    RangeOp::Gte,
                    Some(&grp),
                    RangeOp::Lte,
                    None,
                    None,
                    None,
                )
                .unwrap();
            black_box(rows.count());
        });
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Group and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_page_decode,
    bench_primary_key,
    bench_secondary_key,
);
criterion_main!(benches);
