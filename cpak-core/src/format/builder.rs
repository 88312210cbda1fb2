use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;

use crate::error::{FormatError, Result};

use super::container::Container;
use super::table::{AssetClass, TableCounts, TableEntry};

/// Replacement payloads keyed by class and table index.
#[derive(Debug, Clone, Default)]
pub struct Replacements {
    classes: [BTreeMap<usize, Vec<u8>>; 4],
}

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: AssetClass, index: usize, bytes: Vec<u8>) -> Option<Vec<u8>> {
        self.classes[class.position()].insert(index, bytes)
    }

    pub fn get(&self, class: AssetClass, index: usize) -> Option<&[u8]> {
        self.classes[class.position()].get(&index).map(Vec::as_slice)
    }

    pub fn class(&self, class: AssetClass) -> &BTreeMap<usize, Vec<u8>> {
        &self.classes[class.position()]
    }

    pub fn len(&self) -> usize {
        self.classes.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect replacements from a directory laid out like an extraction:
    /// `images/image_NNNNN.bin`, `sounds/sound_NNN.*`, `fonts/font_NN.*`,
    /// `shaders/shader_NN.*`.
    ///
    /// Image replacements must be encoded records (`.bin`). Files whose names do
    /// not parse or whose index is out of range for `counts` are skipped.
    pub fn scan_dir(dir: impl AsRef<Path>, counts: TableCounts) -> Result<Self> {
        let mut replacements = Self::new();

        for class in AssetClass::ALL {
            let class_dir = dir.as_ref().join(class.dir_name());
            if !class_dir.is_dir() {
                continue;
            }

            let mut paths = std::fs::read_dir(&class_dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect::<Vec<_>>();
            paths.sort();

            for path in paths {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if class == AssetClass::Image
                    && path.extension().and_then(|e| e.to_str()) != Some("bin")
                {
                    log::debug!("skipping non-record image file {:?}", path);
                    continue;
                }
                let Some(index) = class.parse_file_stem(stem) else {
                    log::debug!("skipping {:?}: name does not match {}_N", path, class);
                    continue;
                };
                if index >= counts.get(class) {
                    log::warn!(
                        "skipping {:?}: index {} out of range ({} {} entries)",
                        path,
                        index,
                        counts.get(class),
                        class
                    );
                    continue;
                }

                let bytes = std::fs::read(&path)?;
                if replacements.insert(class, index, bytes).is_some() {
                    log::warn!("{} #{} replaced more than once, using {:?}", class, index, path);
                }
            }
        }

        Ok(replacements)
    }
}

/// Build a new container byte stream from `original` with `replacements` applied.
///
/// Entries without a replacement are copied verbatim. Offsets and sizes are
/// recomputed from the final layout. Any bad source entry aborts the whole
/// build; nothing partial is ever returned.
pub fn repack(original: &Container, replacements: &Replacements) -> Result<Vec<u8>> {
    let counts = original.counts();

    for class in AssetClass::ALL {
        if let Some((&index, _)) = replacements.class(class).range(counts.get(class)..).next() {
            return Err(FormatError::NoSuchAsset {
                class,
                index,
                count: counts.get(class),
            });
        }
    }

    let index_len = counts.index_len();
    let mut out = vec![0u8; index_len];
    let mut tables: [Vec<TableEntry>; 4] = Default::default();

    for class in AssetClass::ALL {
        let table = &mut tables[class.position()];
        table.reserve_exact(counts.get(class));

        for index in 0..counts.get(class) {
            let bytes = match replacements.get(class, index) {
                Some(bytes) => bytes,
                None => original.asset(class, index)?,
            };

            let offset = u32::try_from(out.len()).map_err(|_| FormatError::ContainerTooLarge)?;
            let size = u32::try_from(bytes.len()).map_err(|_| FormatError::ContainerTooLarge)?;
            if offset as u64 + size as u64 > u32::MAX as u64 {
                return Err(FormatError::ContainerTooLarge);
            }

            table.push(TableEntry::new(offset, size));
            out.extend_from_slice(bytes);
        }
    }

    let mut writer = Cursor::new(&mut out[..index_len]);
    for entry in tables.iter().flatten() {
        entry.write(&mut writer)?;
    }

    log::debug!(
        "repacked {} with {} replacement(s): {} bytes",
        counts,
        replacements.len(),
        out.len()
    );

    Ok(out)
}

/// Write through a temporary file in the destination directory, then rename.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
