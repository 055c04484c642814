//! Index root discovery.
//!
//! Without a data dictionary the only way to tell which B+tree is which is
//! to look at the INDEX pages themselves. Every page records its index id
//! and level; the root of each tree is the page at the highest level with no
//! siblings. InnoDB hands out index ids in creation order, which is the
//! order of the table's key declarations: the clustered index first, then
//! the secondary indexes.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::innodb::index::IndexHeader;
use crate::innodb::page::FilHeader;
use crate::innodb::page_types::PageType;
use crate::innodb::tablespace::Tablespace;
use crate::IdbError;

/// One discovered B+tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub index_id: u64,
    pub root_page: u32,
    /// Level of the root (0 for a single-page tree).
    pub levels: u16,
    /// INDEX pages seen for this index.
    pub pages: usize,
}

/// B+trees of a tablespace in index-id order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexCatalog {
    entries: Vec<CatalogEntry>,
}

impl IndexCatalog {
    /// Scan every page of the tablespace and group INDEX pages by index id.
    pub fn discover(ts: &Tablespace) -> Result<Self, IdbError> {
        // index id -> (best sibling-less page, highest page seen, page count)
        let mut seen: BTreeMap<u64, (Option<(u16, u32)>, (u16, u32), usize)> = BTreeMap::new();
        ts.for_each_page(|n, data| {
            let Some(fil) = FilHeader::parse(data) else {
                return Ok(());
            };
            if fil.kind() != Some(PageType::Index) {
                return Ok(());
            }
            let header = IndexHeader::parse(data)?;
            let here = (header.level, n as u32);
            let (root, top, pages) = seen
                .entry(header.index_id)
                .or_insert((None, here, 0));
            *pages += 1;
            if header.level > top.0 {
                *top = here;
            }
            let lone = fil.prev().is_none() && fil.next().is_none();
            if lone && root.map_or(true, |(level, _)| header.level > level) {
                *root = Some(here);
            }
            Ok(())
        })?;

        let entries = seen
            .into_iter()
            .map(|(index_id, (root, top, pages))| {
                let (levels, root_page) = root.unwrap_or(top);
                CatalogEntry {
                    index_id,
                    root_page,
                    levels,
                    pages,
                }
            })
            .collect::<Vec<_>>();
        debug!(indexes = entries.len(), "discovered index roots");
        Ok(IndexCatalog { entries })
    }

    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by_key(|e| e.index_id);
        IndexCatalog { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn root_of(&self, index_id: u64) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.index_id == index_id)
            .map(|e| e.root_page)
    }

    /// Root of the `ordinal`-th scannable secondary index, counting from the
    /// tree that follows the clustered index and skipping `fulltext` trees.
    ///
    /// `None` when the clustered root is not in the catalog or the position
    /// is past the end.
    pub fn secondary_root(&self, clustered_root: u32, ordinal: usize, fulltext: usize) -> Option<u32> {
        let p = self
            .entries
            .iter()
            .position(|e| e.root_page == clustered_root)?;
        self.entries
            .get(p + 1 + fulltext + ordinal)
            .map(|e| e.root_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index_id: u64, root_page: u32) -> CatalogEntry {
        CatalogEntry {
            index_id,
            root_page,
            levels: 0,
            pages: 1,
        }
    }

    #[test]
    fn test_secondary_root_follows_clustered_position() {
        let cat = IndexCatalog::from_entries(vec![entry(140, 5), entry(139, 4), entry(141, 9)]);
        assert_eq!(cat.entries()[0].index_id, 139);
        assert_eq!(cat.secondary_root(4, 0, 0), Some(5));
        assert_eq!(cat.secondary_root(4, 1, 0), Some(9));
        assert_eq!(cat.secondary_root(4, 0, 1), Some(9));
        assert_eq!(cat.secondary_root(4, 2, 0), None);
        assert_eq!(cat.secondary_root(3, 0, 0), None);
        assert_eq!(cat.root_of(141), Some(9));
    }
}
