//! Synthetic tablespace construction shared by the integration tests.
//!
//! Pages are built byte by byte the way InnoDB lays them out: FIL header,
//! compact INDEX page header, infimum/supremum, records linked through their
//! next offsets, a two-slot page directory and a CRC-32C checksum.

#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder};
use std::io::Write;
use tempfile::NamedTempFile;

use ibdrow::innodb::constants::*;

pub const PS: usize = SIZE_PAGE;

pub const TYPE_ALLOCATED: u16 = 0;
pub const TYPE_UNDO: u16 = 2;
pub const TYPE_INODE: u16 = 3;
pub const TYPE_IBUF_BITMAP: u16 = 5;
pub const TYPE_FSP_HDR: u16 = 8;
pub const TYPE_BLOB: u16 = 10;
pub const TYPE_SDI: u16 = 17853;
pub const TYPE_INDEX: u16 = 17855;

/// MySQL CRC-32C: CRC of bytes 4..26 XOR CRC of bytes 38..(page size - 8).
pub fn write_crc32c_checksum(page: &mut [u8]) {
    let end = PS - SIZE_FIL_TRAILER;
    let crc1 = crc32c::crc32c(&page[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN]);
    let crc2 = crc32c::crc32c(&page[FIL_PAGE_DATA..end]);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], crc1 ^ crc2);
}

/// A page with only its FIL header and trailer filled in.
pub fn fil_page(page_no: u32, page_type: u16, prev: u32, next: u32) -> Vec<u8> {
    let mut page = vec![0u8; PS];
    let lsn = 1000 + page_no as u64;
    BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], page_no);
    BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], prev);
    BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], next);
    BigEndian::write_u64(&mut page[FIL_PAGE_LSN..], lsn);
    BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], page_type);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], 7);
    BigEndian::write_u32(&mut page[PS - 4..], lsn as u32);
    page
}

pub fn seal(mut page: Vec<u8>) -> Vec<u8> {
    write_crc32c_checksum(&mut page);
    page
}

pub fn fsp_hdr_page(total_pages: u32, sdi_root: Option<u32>) -> Vec<u8> {
    let mut page = fil_page(0, TYPE_FSP_HDR, FIL_NULL, FIL_NULL);
    let fsp = FIL_PAGE_DATA;
    BigEndian::write_u32(&mut page[fsp + FSP_SPACE_ID..], 7);
    BigEndian::write_u32(&mut page[fsp + FSP_SIZE..], total_pages);
    BigEndian::write_u32(&mut page[fsp + FSP_FREE_LIMIT..], total_pages);
    if let Some(root) = sdi_root {
        let off = XDES_ARR_OFFSET + XDES_PER_PAGE * XDES_SIZE;
        BigEndian::write_u32(&mut page[off..], 1);
        BigEndian::write_u32(&mut page[off + 4..], root);
    }
    seal(page)
}

pub fn plain_page(page_no: u32, page_type: u16) -> Vec<u8> {
    seal(fil_page(page_no, page_type, FIL_NULL, FIL_NULL))
}

pub fn allocated_page() -> Vec<u8> {
    vec![0u8; PS]
}

/// One physical field of a record under construction.
#[derive(Debug, Clone)]
pub struct Field {
    bytes: Option<Vec<u8>>,
    nullable: bool,
    variable: bool,
    /// Length entry may take two bytes.
    big: bool,
    external: bool,
}

impl Field {
    pub fn fixed(bytes: &[u8]) -> Self {
        Field {
            bytes: Some(bytes.to_vec()),
            nullable: false,
            variable: false,
            big: false,
            external: false,
        }
    }

    pub fn var(bytes: &[u8]) -> Self {
        Field {
            variable: true,
            ..Field::fixed(bytes)
        }
    }

    /// Variable field whose column can exceed 255 bytes.
    pub fn big(bytes: &[u8]) -> Self {
        Field {
            big: true,
            ..Field::var(bytes)
        }
    }

    /// A NULL in a nullable field.
    pub fn null() -> Self {
        Field {
            bytes: None,
            nullable: true,
            variable: false,
            big: false,
            external: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Externally stored value: local prefix plus a 20-byte reference to a
    /// BLOB chain holding `off_page_len` more bytes.
    pub fn external(local: &[u8], first_page: u32, off_page_len: u32) -> Self {
        let mut bytes = local.to_vec();
        let mut r = [0u8; BTR_EXTERN_FIELD_REF_SIZE];
        BigEndian::write_u32(&mut r[BTR_EXTERN_SPACE_ID..], 7);
        BigEndian::write_u32(&mut r[BTR_EXTERN_PAGE_NO..], first_page);
        BigEndian::write_u32(&mut r[BTR_EXTERN_OFFSET..], FIL_PAGE_DATA as u32);
        BigEndian::write_u64(&mut r[BTR_EXTERN_LEN..], off_page_len as u64);
        bytes.extend_from_slice(&r);
        Field {
            external: true,
            ..Field::big(&bytes)
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }
}

/// A record ready to be placed on a page.
#[derive(Debug, Clone)]
pub struct Rec {
    /// Null bitmap and length table in ascending address order.
    pub extra: Vec<u8>,
    pub data: Vec<u8>,
    pub deleted: bool,
    pub min_rec: bool,
}

impl Rec {
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Encode fields into the compact format. `n_nullable` sizes the null
/// bitmap for the whole index; nullable fields take its bits in order.
pub fn encode_record(fields: &[Field], n_nullable: usize) -> Rec {
    let mut nulls = vec![0u8; n_nullable.div_ceil(8)];
    let mut lens = Vec::new();
    let mut data = Vec::new();
    let mut null_idx = 0;
    for f in fields {
        if f.nullable {
            if f.bytes.is_none() {
                nulls[null_idx / 8] |= 1 << (null_idx % 8);
            }
            null_idx += 1;
        }
        let Some(bytes) = &f.bytes else { continue };
        if f.variable {
            let len = bytes.len();
            if f.big && (len > 127 || f.external) {
                let mut b1 = 0x80 | (len >> 8) as u8;
                if f.external {
                    b1 |= 0x40;
                }
                lens.push(b1);
                lens.push(len as u8);
            } else {
                assert!(len <= 255, "short length entry cannot hold {}", len);
                lens.push(len as u8);
            }
        }
        data.extend_from_slice(bytes);
    }
    // Bytes going backward from the header: null bitmap first, then lengths.
    let mut back = nulls;
    back.extend(lens);
    back.reverse();
    Rec {
        extra: back,
        data,
        deleted: false,
        min_rec: false,
    }
}

fn write_rec_header(page: &mut [u8], origin: usize, info: u8, heap_no: u16, status: u16, next: usize) {
    let h = origin - REC_N_NEW_EXTRA_BYTES;
    page[h] = info;
    BigEndian::write_u16(&mut page[h + 1..], (heap_no << 3) | status);
    BigEndian::write_i16(&mut page[h + 3..], (next as i64 - origin as i64) as i16);
}

/// A compact INDEX (or SDI) page holding `recs` in order.
pub fn index_page_typed(
    page_type: u16,
    page_no: u32,
    index_id: u64,
    level: u16,
    prev: u32,
    next: u32,
    recs: &[Rec],
) -> Vec<u8> {
    let mut page = fil_page(page_no, page_type, prev, next);
    let ph = PAGE_HEADER;
    let n = recs.len() as u16;
    BigEndian::write_u16(&mut page[ph + PAGE_N_DIR_SLOTS..], 2);
    BigEndian::write_u16(&mut page[ph + PAGE_N_HEAP..], 0x8000 | (2 + n));
    BigEndian::write_u16(&mut page[ph + PAGE_N_RECS..], n);
    BigEndian::write_u16(&mut page[ph + PAGE_LEVEL..], level);
    BigEndian::write_u64(&mut page[ph + PAGE_INDEX_ID..], index_id);
    BigEndian::write_u16(&mut page[ph + PAGE_DIRECTION..], 5);

    page[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 8].copy_from_slice(b"infimum\0");
    page[PAGE_NEW_SUPREMUM..PAGE_NEW_SUPREMUM + 8].copy_from_slice(b"supremum");

    let status = if level == 0 { 0 } else { 1 };
    let mut pos = PAGE_NEW_SUPREMUM_END;
    let mut origins = Vec::with_capacity(recs.len());
    for rec in recs {
        let origin = pos + rec.extra.len() + REC_N_NEW_EXTRA_BYTES;
        assert!(
            origin + rec.data.len() < PAGE_DIR - 4,
            "records overflow page {}",
            page_no
        );
        page[pos..pos + rec.extra.len()].copy_from_slice(&rec.extra);
        page[origin..origin + rec.data.len()].copy_from_slice(&rec.data);
        origins.push(origin);
        pos = origin + rec.data.len();
    }
    BigEndian::write_u16(&mut page[ph + PAGE_HEAP_TOP..], pos as u16);

    let first = origins.first().copied().unwrap_or(PAGE_NEW_SUPREMUM);
    write_rec_header(&mut page, PAGE_NEW_INFIMUM, 0x01, 0, 2, first);
    write_rec_header(&mut page, PAGE_NEW_SUPREMUM, 1 + n as u8 % 8, 1, 3, PAGE_NEW_SUPREMUM);
    for (i, (rec, &origin)) in recs.iter().zip(&origins).enumerate() {
        let next = origins.get(i + 1).copied().unwrap_or(PAGE_NEW_SUPREMUM);
        let mut info = 0u8;
        if rec.deleted {
            info |= REC_INFO_DELETED_FLAG;
        }
        if rec.min_rec {
            info |= REC_INFO_MIN_REC_FLAG;
        }
        write_rec_header(&mut page, origin, info, 2 + i as u16, status, next);
    }

    BigEndian::write_u16(&mut page[PAGE_DIR - 2..], PAGE_NEW_INFIMUM as u16);
    BigEndian::write_u16(&mut page[PAGE_DIR - 4..], PAGE_NEW_SUPREMUM as u16);
    seal(page)
}

pub fn index_page(page_no: u32, index_id: u64, level: u16, prev: u32, next: u32, recs: &[Rec]) -> Vec<u8> {
    index_page_typed(TYPE_INDEX, page_no, index_id, level, prev, next, recs)
}

/// BLOB pages `first..first + chunks.len()` carrying `chunks` in order.
pub fn blob_chain(first: u32, chunks: &[&[u8]]) -> Vec<Vec<u8>> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let page_no = first + i as u32;
            let next = if i + 1 < chunks.len() { page_no + 1 } else { FIL_NULL };
            let mut page = fil_page(page_no, TYPE_BLOB, FIL_NULL, FIL_NULL);
            BigEndian::write_u32(&mut page[FIL_PAGE_DATA + BTR_BLOB_HDR_PART_LEN..], chunk.len() as u32);
            BigEndian::write_u32(&mut page[FIL_PAGE_DATA + BTR_BLOB_HDR_NEXT_PAGE_NO..], next);
            let start = FIL_PAGE_DATA + BTR_BLOB_HDR_SIZE;
            page[start..start + chunk.len()].copy_from_slice(chunk);
            seal(page)
        })
        .collect()
}

/// Shape of a synthetic B+tree.
pub struct TreeShape {
    pub index_id: u64,
    pub per_leaf: usize,
    pub fanout: usize,
    /// Nullable fields of the index, sizing node pointer null bitmaps.
    pub n_nullable: usize,
}

/// Build a B+tree whose root is `root` and whose other pages are numbered
/// from `first` upward, leaves first.
///
/// Each entry is (node pointer key fields, leaf record), in key order.
/// Returns the pages as (page number, bytes).
pub fn build_tree(
    root: u32,
    first: u32,
    shape: &TreeShape,
    entries: Vec<(Vec<Field>, Rec)>,
) -> Vec<(u32, Vec<u8>)> {
    struct Node {
        key: Vec<Field>,
        recs: Vec<Rec>,
    }

    let mut level: Vec<Node> = Vec::new();
    for chunk in entries.chunks(shape.per_leaf.max(1)) {
        level.push(Node {
            key: chunk[0].0.clone(),
            recs: chunk.iter().map(|(_, r)| r.clone()).collect(),
        });
    }
    if level.is_empty() {
        level.push(Node {
            key: Vec::new(),
            recs: Vec::new(),
        });
    }

    let mut levels: Vec<Vec<Node>> = Vec::new();
    while level.len() > 1 {
        // Number this level's pages so the parents can point at them.
        let base = first + levels.iter().map(Vec::len).sum::<usize>() as u32;
        let mut parents = Vec::new();
        for (g, group) in level.chunks(shape.fanout.max(2)).enumerate() {
            let recs = group
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    let child_no = base + (g * shape.fanout.max(2) + i) as u32;
                    let mut fields = child.key.clone();
                    fields.push(Field::fixed(&child_no.to_be_bytes()));
                    let mut rec = encode_record(&fields, shape.n_nullable);
                    rec.min_rec = g == 0 && i == 0;
                    rec
                })
                .collect();
            parents.push(Node {
                key: group[0].key.clone(),
                recs,
            });
        }
        levels.push(level);
        level = parents;
    }
    levels.push(level);

    let mut pages = Vec::new();
    let mut next_no = first;
    let top = levels.len() - 1;
    for (lvl, nodes) in levels.iter().enumerate() {
        let numbers: Vec<u32> = if lvl == top {
            vec![root]
        } else {
            let n: Vec<u32> = (next_no..next_no + nodes.len() as u32).collect();
            next_no += nodes.len() as u32;
            n
        };
        for (i, node) in nodes.iter().enumerate() {
            let prev = if i == 0 { FIL_NULL } else { numbers[i - 1] };
            let next = numbers.get(i + 1).copied().unwrap_or(FIL_NULL);
            pages.push((
                numbers[i],
                index_page(numbers[i], shape.index_id, lvl as u16, prev, next, &node.recs),
            ));
        }
    }
    pages
}

/// Assemble pages by number into one image, filling gaps with zero pages.
pub fn assemble(pages: Vec<(u32, Vec<u8>)>) -> Vec<Vec<u8>> {
    let count = pages.iter().map(|(n, _)| *n as usize + 1).max().unwrap_or(0);
    let mut out = vec![allocated_page(); count];
    for (n, p) in pages {
        out[n as usize] = p;
    }
    out
}

/// Write pages to a temp file.
pub fn write_tablespace(pages: &[Vec<u8>]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("create temp file");
    for page in pages {
        tmp.write_all(page).expect("write page");
    }
    tmp.flush().expect("flush");
    tmp
}

/// Sign-flipped big-endian integer, as InnoDB stores signed columns.
pub fn int_bytes(v: i64, width: usize) -> Vec<u8> {
    let bits = width * 8;
    let flipped = (v as u64) ^ (1u64 << (bits - 1));
    flipped.to_be_bytes()[8 - width..].to_vec()
}

pub fn uint_bytes(v: u64, width: usize) -> Vec<u8> {
    v.to_be_bytes()[8 - width..].to_vec()
}

pub fn trx_fields(trx: u64) -> [Field; 2] {
    [
        Field::fixed(&uint_bytes(trx, DATA_TRX_ID_LEN)),
        Field::fixed(&uint_bytes(0x80_0000_0000_0000 | trx, DATA_ROLL_PTR_LEN)),
    ]
}

/// A leaf SDI page holding one zlib-compressed JSON document per entry.
pub fn sdi_page(page_no: u32, docs: &[(u32, u64, &str)]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let recs: Vec<Rec> = docs
        .iter()
        .map(|&(sdi_type, id, json)| {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(json.as_bytes()).expect("compress SDI");
            let zipped = enc.finish().expect("finish SDI");
            let mut fields = vec![
                Field::fixed(&sdi_type.to_be_bytes()),
                Field::fixed(&id.to_be_bytes()),
            ];
            fields.extend(trx_fields(1));
            fields.push(Field::fixed(&(json.len() as u32).to_be_bytes()));
            fields.push(Field::fixed(&(zipped.len() as u32).to_be_bytes()));
            fields.push(Field::big(&zipped));
            encode_record(&fields, 0)
        })
        .collect();
    index_page_typed(TYPE_SDI, page_no, u64::MAX - 1, 0, FIL_NULL, FIL_NULL, &recs)
}
