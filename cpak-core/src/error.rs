use thiserror::Error;

use crate::format::AssetClass;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated {class} table: need {needed} bytes of index, stream has {available}")]
    TruncatedTable {
        class: AssetClass,
        needed: usize,
        available: usize,
    },

    #[error("{class} table is {len} bytes, not a multiple of the 8-byte entry size")]
    MisalignedTable { class: AssetClass, len: u32 },

    #[error("{class} #{index}: entry [{offset:#x}, +{size}] lies outside the {file_len} byte container")]
    EntryOutOfBounds {
        class: AssetClass,
        index: usize,
        offset: u32,
        size: u32,
        file_len: usize,
    },

    #[error("no {class} asset #{index} (table has {count} entries)")]
    NoSuchAsset {
        class: AssetClass,
        index: usize,
        count: usize,
    },

    #[error("container would exceed the 32-bit offset range")]
    ContainerTooLarge,

    #[error("image header too short: {0} bytes, need 50")]
    HeaderTooShort(usize),

    #[error("pixel stream failed to inflate: {0}")]
    DecompressionFailed(std::io::Error),

    #[error("pixel stream inflated to {actual} bytes, header declares {declared}")]
    SizeMismatch { declared: u16, actual: usize },

    #[error("{width}x{height} at {bytes_per_pixel} bpp needs {needed} bytes, format ceiling is 65535")]
    SizeLimitExceeded {
        width: u16,
        height: u16,
        bytes_per_pixel: usize,
        needed: usize,
    },

    #[error("got {actual} pixel bytes, {width}x{height} needs {expected}")]
    PixelCountMismatch {
        width: u16,
        height: u16,
        expected: usize,
        actual: usize,
    },

    #[error("invalid layout manifest: {0}")]
    Manifest(String),
}

pub type Result<T> = std::result::Result<T, FormatError>;
