use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{FormatError, Result};

/// Size of one `(offset, size)` table entry on disk.
pub const ENTRY_SIZE: usize = 8;

/// Asset classes, in the order their tables appear in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetClass {
    Image,
    Sound,
    Font,
    Shader,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Image,
        AssetClass::Sound,
        AssetClass::Font,
        AssetClass::Shader,
    ];

    pub fn position(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            AssetClass::Image => "image",
            AssetClass::Sound => "sound",
            AssetClass::Font => "font",
            AssetClass::Shader => "shader",
        }
    }

    /// Directory used for this class when extracting or collecting replacements.
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetClass::Image => "images",
            AssetClass::Sound => "sounds",
            AssetClass::Font => "fonts",
            AssetClass::Shader => "shaders",
        }
    }

    /// Zero-padded width of the index in extracted file names.
    pub fn index_width(self) -> usize {
        match self {
            AssetClass::Image => 5,
            AssetClass::Sound => 3,
            AssetClass::Font | AssetClass::Shader => 2,
        }
    }

    /// `image_00042`, `sound_007`, ...
    pub fn file_stem(self, index: usize) -> String {
        format!("{}_{:0width$}", self.name(), index, width = self.index_width())
    }

    /// Inverse of [`AssetClass::file_stem`]; the padding is not enforced.
    pub fn parse_file_stem(self, stem: &str) -> Option<usize> {
        let rest = stem.strip_prefix(self.name())?.strip_prefix('_')?;
        rest.parse().ok()
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Entry counts of the four tables.
///
/// The container carries no self-describing count header, so these always come
/// from outside (command line, layout manifest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableCounts {
    pub image: usize,
    pub sound: usize,
    pub font: usize,
    pub shader: usize,
}

impl TableCounts {
    pub fn new(image: usize, sound: usize, font: usize, shader: usize) -> Self {
        Self {
            image,
            sound,
            font,
            shader,
        }
    }

    /// Derive counts from the byte length of each table, in class order.
    pub fn from_byte_lengths(lengths: [u32; 4]) -> Result<Self> {
        let mut counts = [0usize; 4];
        for (class, len) in AssetClass::ALL.into_iter().zip(lengths) {
            if len as usize % ENTRY_SIZE != 0 {
                return Err(FormatError::MisalignedTable { class, len });
            }
            counts[class.position()] = len as usize / ENTRY_SIZE;
        }
        Ok(Self::new(counts[0], counts[1], counts[2], counts[3]))
    }

    pub fn get(&self, class: AssetClass) -> usize {
        match class {
            AssetClass::Image => self.image,
            AssetClass::Sound => self.sound,
            AssetClass::Font => self.font,
            AssetClass::Shader => self.shader,
        }
    }

    pub fn total(&self) -> usize {
        self.image + self.sound + self.font + self.shader
    }

    /// Byte length of the whole index (all four tables).
    pub fn index_len(&self) -> usize {
        self.total() * ENTRY_SIZE
    }

    /// Byte offset at which the table of `class` starts.
    pub fn table_offset(&self, class: AssetClass) -> usize {
        AssetClass::ALL
            .iter()
            .take_while(|c| **c != class)
            .map(|c| self.get(*c) * ENTRY_SIZE)
            .sum()
    }
}

impl fmt::Display for TableCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images, {} sounds, {} fonts, {} shaders",
            self.image, self.sound, self.font, self.shader
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableEntry {
    pub offset: u32,
    pub size: u32,
}

impl TableEntry {
    pub fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    pub fn read(reader: &mut impl Read) -> std::io::Result<Self> {
        let offset = reader.read_u32::<LittleEndian>()?;
        let size = reader.read_u32::<LittleEndian>()?;
        Ok(Self { offset, size })
    }

    pub fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.size)
    }

    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTable {
    pub class: AssetClass,
    pub entries: Vec<TableEntry>,
}

impl AssetTable {
    pub fn new(class: AssetClass) -> Self {
        Self {
            class,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.entries.len() * ENTRY_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_from_observed_table_lengths() {
        let counts = TableCounts::from_byte_lengths([82048, 2136, 152, 24]).unwrap();
        assert_eq!(counts, TableCounts::new(10256, 267, 19, 3));
        assert_eq!(counts.index_len(), 82048 + 2136 + 152 + 24);
    }

    #[test]
    fn table_offsets_are_sequential() {
        let counts = TableCounts::new(10256, 267, 19, 3);
        assert_eq!(counts.table_offset(AssetClass::Image), 0);
        assert_eq!(counts.table_offset(AssetClass::Sound), 0x14080);
        assert_eq!(counts.table_offset(AssetClass::Font), 0x14080 + 0x858);
        assert_eq!(counts.table_offset(AssetClass::Shader), 0x14080 + 0x858 + 0x98);
    }

    #[test]
    fn misaligned_table_is_rejected() {
        let err = TableCounts::from_byte_lengths([16, 12, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            FormatError::MisalignedTable {
                class: AssetClass::Sound,
                len: 12
            }
        ));
    }

    #[test]
    fn file_stems() {
        assert_eq!(AssetClass::Image.file_stem(42), "image_00042");
        assert_eq!(AssetClass::Sound.file_stem(7), "sound_007");
        assert_eq!(AssetClass::Shader.file_stem(1), "shader_01");
        assert_eq!(AssetClass::Image.parse_file_stem("image_00123"), Some(123));
        assert_eq!(AssetClass::Image.parse_file_stem("sound_001"), None);
        assert_eq!(AssetClass::Font.parse_file_stem("font_x"), None);
    }
}
