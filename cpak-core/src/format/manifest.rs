use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, Result};

use super::table::TableCounts;

/// Table byte lengths, as reported by a hex editor or an older tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBytes {
    pub image: u32,
    pub sound: u32,
    pub font: u32,
    pub shader: u32,
}

/// Companion manifest describing one container build.
///
/// ```toml
/// [counts]
/// image = 10256
/// sound = 267
/// font = 19
/// shader = 3
/// ```
///
/// or, equivalently, `[table_bytes]` with the byte length of each table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutManifest {
    #[serde(default)]
    pub counts: Option<TableCounts>,
    #[serde(default)]
    pub table_bytes: Option<TableBytes>,
}

impl LayoutManifest {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| FormatError::Manifest(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    pub fn table_counts(&self) -> Result<TableCounts> {
        match (self.counts, self.table_bytes) {
            (Some(counts), None) => Ok(counts),
            (None, Some(b)) => TableCounts::from_byte_lengths([b.image, b.sound, b.font, b.shader]),
            (Some(_), Some(_)) => Err(FormatError::Manifest(
                "give either [counts] or [table_bytes], not both".to_string(),
            )),
            (None, None) => Err(FormatError::Manifest(
                "missing [counts] or [table_bytes]".to_string(),
            )),
        }
    }
}

/// `"10260,267,19,3"`: image, sound, font and shader counts.
impl FromStr for TableCounts {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<usize>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FormatError::Manifest(format!("bad count in {:?}: {}", s, e)))?;

        match parts[..] {
            [image, sound, font, shader] => Ok(TableCounts::new(image, sound, font, shader)),
            _ => Err(FormatError::Manifest(format!(
                "expected 4 counts (image,sound,font,shader), got {}",
                parts.len()
            ))),
        }
    }
}
