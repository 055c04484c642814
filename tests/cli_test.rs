#![cfg(feature = "cli")]
//! Subcommand tests: each `execute` writes into a buffer, which is checked
//! as text or parsed back as JSON.

mod common;

use std::io::Write;

use common::*;
use ibdrow::cli::{self, TableOptions};
use ibdrow::query::reader::ReaderConfig;
use ibdrow::schema::TableDef;
use ibdrow::IdbError;
use serde_json::Value;
use tempfile::NamedTempFile;

const TABLE_JSON: &str = r#"{
  "name": "t",
  "charset": "latin1",
  "columns": [
    {"name": "id", "type": "int"},
    {"name": "name", "type": "varchar", "length": 16}
  ],
  "primary_key": {"name": "PRIMARY", "kind": "primary", "parts": ["id"]}
}"#;

const SDI_JSON: &str = r#"{
  "mysqld_version_id": 80036,
  "dd_object_type": "Table",
  "dd_object": {
    "name": "t",
    "collation_id": 8,
    "columns": [
      {"name": "id", "type": 4, "column_type_utf8": "int", "hidden": 1},
      {"name": "name", "type": 16, "column_type_utf8": "varchar(16)", "hidden": 1,
       "char_length": 16, "collation_id": 8},
      {"name": "DB_TRX_ID", "type": 10, "hidden": 2},
      {"name": "DB_ROLL_PTR", "type": 9, "hidden": 2}
    ],
    "indexes": [
      {"name": "PRIMARY", "type": 1, "hidden": false,
       "se_private_data": "id=300;root=3;space_id=7;",
       "elements": [
         {"column_opx": 0, "length": 4294967295, "hidden": false},
         {"column_opx": 2, "length": 4294967295, "hidden": true},
         {"column_opx": 3, "length": 4294967295, "hidden": true}
       ]}
    ]
  }
}"#;

struct Fixture {
    ibd: NamedTempFile,
    def: NamedTempFile,
    /// First leaf page of the clustered tree.
    first_leaf: u32,
    page_count: usize,
}

/// Table `t` with ids 1..=30 on three leaves, plus an SDI page.
fn fixture() -> Fixture {
    let entries = (1..=30)
        .map(|id: i64| {
            let key = Field::fixed(&int_bytes(id, 4));
            let mut fields = vec![key.clone()];
            fields.extend(trx_fields(id as u64));
            fields.push(Field::var(format!("name-{:02}", id).as_bytes()));
            (vec![key], encode_record(&fields, 0))
        })
        .collect();
    let shape = TreeShape {
        index_id: 300,
        per_leaf: 10,
        fanout: 5,
        n_nullable: 0,
    };
    let mut pages = build_tree(3, 4, &shape, entries);
    let sdi_no = pages.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
    pages.push((sdi_no, sdi_page(sdi_no, &[(1, 1066, SDI_JSON)])));
    pages.push((0, fsp_hdr_page(sdi_no + 1, Some(sdi_no))));
    pages.push((1, plain_page(1, TYPE_IBUF_BITMAP)));
    pages.push((2, plain_page(2, TYPE_INODE)));
    let image = assemble(pages);

    let mut def = NamedTempFile::new().unwrap();
    def.write_all(TABLE_JSON.as_bytes()).unwrap();
    def.flush().unwrap();

    Fixture {
        ibd: write_tablespace(&image),
        def,
        first_leaf: 4,
        page_count: image.len(),
    }
}

fn table_opts(fx: &Fixture, from_sdi: bool) -> TableOptions {
    TableOptions {
        file: fx.ibd.path().to_string_lossy().into_owned(),
        table: (!from_sdi).then(|| fx.def.path().to_string_lossy().into_owned()),
        config: ReaderConfig::default(),
    }
}

fn range_opts(fx: &Fixture) -> cli::range::RangeOptions {
    cli::range::RangeOptions {
        table: table_opts(fx, false),
        gt: None,
        gte: None,
        lt: None,
        lte: None,
        reverse: false,
        columns: Vec::new(),
        limit: None,
        json: true,
    }
}

fn run<F>(f: F) -> String
where
    F: FnOnce(&mut dyn Write) -> Result<(), IdbError>,
{
    colored::control::set_override(false);
    let mut out: Vec<u8> = Vec::new();
    f(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn json_ids(out: &str) -> Vec<i64> {
    let rows: Vec<Value> = serde_json::from_str(out).unwrap();
    rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
}

#[test]
fn test_pages_headers_json() {
    let fx = fixture();
    let out = run(|w| {
        cli::pages::execute(
            &cli::pages::PagesOptions {
                file: fx.ibd.path().to_string_lossy().into_owned(),
                headers_only: true,
                verify_checksums: true,
                json: true,
            },
            w,
        )
    });
    let pages: Vec<Value> = serde_json::from_str(&out).unwrap();
    assert_eq!(pages.len(), fx.page_count);
    assert_eq!(pages[0]["page_type"], "FSP_HDR");
    assert_eq!(pages[3]["page_type"], "INDEX");
}

#[test]
fn test_pages_text_lists_index_levels() {
    let fx = fixture();
    let out = run(|w| {
        cli::pages::execute(
            &cli::pages::PagesOptions {
                file: fx.ibd.path().to_string_lossy().into_owned(),
                headers_only: false,
                verify_checksums: false,
                json: false,
            },
            w,
        )
    });
    assert!(out.contains("id=300 level=1"));
    assert!(out.contains("id=300 level=0 records=10"));
    assert!(out.contains("Page Type Summary"));
}

#[test]
fn test_page_json_decodes_body() {
    let fx = fixture();
    let out = run(|w| {
        cli::page::execute(
            &cli::page::PageOptions {
                file: fx.ibd.path().to_string_lossy().into_owned(),
                page: fx.first_leaf as u64,
                hex: false,
                verify_checksums: true,
                json: true,
            },
            w,
        )
    });
    let page: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(page["fil"]["page_number"], fx.first_leaf);
    assert_eq!(page["body"]["kind"], "Index");
}

#[test]
fn test_page_out_of_range() {
    let fx = fixture();
    let mut out: Vec<u8> = Vec::new();
    let err = cli::page::execute(
        &cli::page::PageOptions {
            file: fx.ibd.path().to_string_lossy().into_owned(),
            page: 1000,
            hex: false,
            verify_checksums: false,
            json: false,
        },
        &mut out,
    )
    .unwrap_err();
    assert!(matches!(err, IdbError::PageOutOfRange { page: 1000, .. }));
}

#[test]
fn test_get_json_and_missing_key() {
    let fx = fixture();
    let out = run(|w| {
        cli::get::execute(
            &cli::get::GetOptions {
                table: table_opts(&fx, false),
                key: "17".to_string(),
                json: true,
            },
            w,
        )
    });
    let row: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(row["id"], 17);
    assert_eq!(row["name"], "name-17");

    let out = run(|w| {
        cli::get::execute(
            &cli::get::GetOptions {
                table: table_opts(&fx, false),
                key: "99".to_string(),
                json: false,
            },
            w,
        )
    });
    assert!(out.contains("No row with key (99)"));
}

#[test]
fn test_get_rejects_bad_key() {
    let fx = fixture();
    let mut out: Vec<u8> = Vec::new();
    let err = cli::get::execute(
        &cli::get::GetOptions {
            table: table_opts(&fx, false),
            key: "seventeen".to_string(),
            json: true,
        },
        &mut out,
    )
    .unwrap_err();
    assert!(matches!(err, IdbError::Argument(_)));
}

#[test]
fn test_range_bounds_and_projection() {
    let fx = fixture();
    let out = run(|w| {
        cli::range::execute(
            &cli::range::RangeOptions {
                gte: Some("5".to_string()),
                lt: Some("12".to_string()),
                columns: vec!["id".to_string()],
                ..range_opts(&fx)
            },
            w,
        )
    });
    assert_eq!(json_ids(&out), (5..12).collect::<Vec<_>>());
    let rows: Vec<Value> = serde_json::from_str(&out).unwrap();
    assert!(rows.iter().all(|r| r.get("name").is_none()));
}

#[test]
fn test_range_reverse_with_limit() {
    let fx = fixture();
    let out = run(|w| {
        cli::range::execute(
            &cli::range::RangeOptions {
                lte: Some("25".to_string()),
                reverse: true,
                limit: Some(3),
                ..range_opts(&fx)
            },
            w,
        )
    });
    assert_eq!(json_ids(&out), vec![25, 24, 23]);

    let out = run(|w| {
        cli::range::execute(
            &cli::range::RangeOptions {
                gt: Some("28".to_string()),
                json: false,
                ..range_opts(&fx)
            },
            w,
        )
    });
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "id\tname");
    assert_eq!(lines[1], "29\tname-29");
    assert_eq!(lines[2], "30\tname-30");
    assert!(out.contains("2 rows"));
}

#[test]
fn test_empty_range_prints_empty_array() {
    let fx = fixture();
    let out = run(|w| {
        cli::range::execute(
            &cli::range::RangeOptions {
                gt: Some("30".to_string()),
                ..range_opts(&fx)
            },
            w,
        )
    });
    assert_eq!(out.trim(), "[]");
}

#[test]
fn test_rows_on_leaf_page() {
    let fx = fixture();
    let out = run(|w| {
        cli::rows::execute(
            &cli::rows::RowsOptions {
                table: table_opts(&fx, false),
                page: fx.first_leaf + 1,
                json: true,
            },
            w,
        )
    });
    assert_eq!(json_ids(&out), (11..=20).collect::<Vec<_>>());
}

#[test]
fn test_sdi_table_def_round_trips_into_queries() {
    let fx = fixture();
    let out = run(|w| {
        cli::sdi::execute(
            &cli::sdi::SdiOptions {
                file: fx.ibd.path().to_string_lossy().into_owned(),
                table_def: true,
                pretty: false,
                verify_checksums: false,
            },
            w,
        )
    });
    let def: TableDef = serde_json::from_str(&out).unwrap();
    assert_eq!(def.name(), "t");
    assert_eq!(def.columns().len(), 2);

    let out = run(|w| {
        cli::get::execute(
            &cli::get::GetOptions {
                table: table_opts(&fx, true),
                key: "3".to_string(),
                json: true,
            },
            w,
        )
    });
    let row: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(row["name"], "name-03");
}

#[test]
fn test_sdi_dump_lists_records() {
    let fx = fixture();
    let out = run(|w| {
        cli::sdi::execute(
            &cli::sdi::SdiOptions {
                file: fx.ibd.path().to_string_lossy().into_owned(),
                table_def: false,
                pretty: true,
                verify_checksums: false,
            },
            w,
        )
    });
    assert!(out.contains("type=1 (Table), id=1066"));
    assert!(out.contains("\"dd_object_type\": \"Table\""));
    assert!(out.contains("Total SDI records: 1"));
}
