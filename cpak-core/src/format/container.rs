use std::io::Cursor;
use std::path::Path;

use crate::error::{FormatError, Result};

use super::builder::{repack, Replacements};
use super::table::{AssetClass, AssetTable, TableCounts, TableEntry};

/// A loaded container: the four asset tables plus the full byte image they index.
///
/// Only the tables are parsed up front; asset payloads are sliced on demand.
#[derive(Debug, Clone)]
pub struct Container {
    counts: TableCounts,
    tables: [AssetTable; 4],
    bytes: Vec<u8>,
}

impl Container {
    pub fn load(bytes: Vec<u8>, counts: TableCounts) -> Result<Self> {
        let needed = counts.index_len();
        if bytes.len() < needed {
            // report the first table that does not fit
            let class = AssetClass::ALL
                .into_iter()
                .find(|c| counts.table_offset(*c) + counts.get(*c) * super::ENTRY_SIZE > bytes.len())
                .unwrap_or(AssetClass::Image);
            return Err(FormatError::TruncatedTable {
                class,
                needed,
                available: bytes.len(),
            });
        }

        let mut reader = Cursor::new(&bytes[..needed]);
        let mut tables = AssetClass::ALL.map(AssetTable::new);
        for table in tables.iter_mut() {
            let count = counts.get(table.class);
            table.entries.reserve_exact(count);
            for _ in 0..count {
                table.entries.push(TableEntry::read(&mut reader)?);
            }
        }

        log::debug!("loaded container index: {} ({} bytes)", counts, needed);

        Ok(Self {
            counts,
            tables,
            bytes,
        })
    }

    pub fn open(path: impl AsRef<Path>, counts: TableCounts) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::load(bytes, counts)
    }

    pub fn counts(&self) -> TableCounts {
        self.counts
    }

    pub fn table(&self, class: AssetClass) -> &AssetTable {
        &self.tables[class.position()]
    }

    pub fn tables(&self) -> &[AssetTable; 4] {
        &self.tables
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Offset at which the payload region begins (right after the last table).
    pub fn payload_start(&self) -> usize {
        self.counts.index_len()
    }

    pub fn entry(&self, class: AssetClass, index: usize) -> Result<TableEntry> {
        let table = self.table(class);
        table
            .entries
            .get(index)
            .copied()
            .ok_or(FormatError::NoSuchAsset {
                class,
                index,
                count: table.len(),
            })
    }

    /// Payload bytes of one asset.
    pub fn asset(&self, class: AssetClass, index: usize) -> Result<&[u8]> {
        let entry = self.entry(class, index)?;
        if entry.end() > self.bytes.len() as u64 {
            return Err(FormatError::EntryOutOfBounds {
                class,
                index,
                offset: entry.offset,
                size: entry.size,
                file_len: self.bytes.len(),
            });
        }
        Ok(&self.bytes[entry.offset as usize..entry.end() as usize])
    }

    /// Iterate `(index, bytes)` over one class; bad entries yield their error.
    pub fn assets(&self, class: AssetClass) -> impl Iterator<Item = (usize, Result<&[u8]>)> + '_ {
        (0..self.table(class).len()).map(move |i| (i, self.asset(class, i)))
    }

    /// Check every entry lies inside the file.
    pub fn validate(&self) -> Result<()> {
        for class in AssetClass::ALL {
            for index in 0..self.table(class).len() {
                self.asset(class, index)?;
            }
        }
        Ok(())
    }

    /// Re-emit the container: tables in class order, then payloads in table order.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        repack(self, &Replacements::default())
    }

    pub fn stats(&self) -> Vec<ClassStats> {
        AssetClass::ALL
            .into_iter()
            .map(|class| ClassStats::collect(class, &self.table(class).entries))
            .collect()
    }
}

/// Size distribution of one asset class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassStats {
    pub class: AssetClass,
    pub count: usize,
    pub smallest: u32,
    pub largest: u32,
    pub total: u64,
}

impl ClassStats {
    fn collect(class: AssetClass, entries: &[TableEntry]) -> Self {
        Self {
            class,
            count: entries.len(),
            smallest: entries.iter().map(|e| e.size).min().unwrap_or(0),
            largest: entries.iter().map(|e| e.size).max().unwrap_or(0),
            total: entries.iter().map(|e| e.size as u64).sum(),
        }
    }

    pub fn average(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total / self.count as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::test_util::build_container;

    #[test]
    fn load_reads_tables_in_class_order() {
        let bytes = build_container(&[
            vec![b"img0".to_vec(), b"img-one".to_vec()],
            vec![b"OggS....".to_vec()],
            vec![],
            vec![b"void main(){}".to_vec()],
        ]);
        let counts = TableCounts::new(2, 1, 0, 1);
        let container = Container::load(bytes, counts).unwrap();

        assert_eq!(container.payload_start(), 32);
        assert_eq!(container.asset(AssetClass::Image, 0).unwrap(), b"img0");
        assert_eq!(container.asset(AssetClass::Image, 1).unwrap(), b"img-one");
        assert_eq!(container.asset(AssetClass::Sound, 0).unwrap(), b"OggS....");
        assert_eq!(container.asset(AssetClass::Shader, 0).unwrap(), b"void main(){}");
        assert_eq!(container.table(AssetClass::Image).entries[0].offset, 32);
    }

    #[test]
    fn short_stream_is_truncated_table() {
        let counts = TableCounts::new(2, 1, 0, 1);
        let err = Container::load(vec![0; 20], counts).unwrap_err();
        match err {
            FormatError::TruncatedTable {
                class,
                needed,
                available,
            } => {
                assert_eq!(class, AssetClass::Sound);
                assert_eq!(needed, 32);
                assert_eq!(available, 20);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn entry_past_end_is_reported() {
        let mut bytes = build_container(&[vec![b"abcd".to_vec()], vec![], vec![], vec![]]);
        // size field of the only entry
        bytes[4..8].copy_from_slice(&100u32.to_le_bytes());
        let container = Container::load(bytes, TableCounts::new(1, 0, 0, 0)).unwrap();
        assert!(matches!(
            container.asset(AssetClass::Image, 0),
            Err(FormatError::EntryOutOfBounds { index: 0, .. })
        ));
        assert!(container.validate().is_err());
        assert!(matches!(
            container.asset(AssetClass::Font, 0),
            Err(FormatError::NoSuchAsset { count: 0, .. })
        ));
    }

    #[test]
    fn stats_per_class() {
        let bytes = build_container(&[
            vec![vec![0; 10], vec![0; 30]],
            vec![vec![0; 5]],
            vec![],
            vec![],
        ]);
        let container = Container::load(bytes, TableCounts::new(2, 1, 0, 0)).unwrap();
        let stats = container.stats();
        assert_eq!(stats[0].smallest, 10);
        assert_eq!(stats[0].largest, 30);
        assert_eq!(stats[0].average(), 20);
        assert_eq!(stats[1].total, 5);
        assert_eq!(stats[2].count, 0);
        assert_eq!(stats[2].average(), 0);
    }
}
