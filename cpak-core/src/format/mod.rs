mod builder;
mod container;
mod image;
mod manifest;
pub mod probe;
pub mod sniff;
mod table;

#[cfg(test)]
mod test_util;

pub use builder::{repack, write_atomic, Replacements};
pub use container::{ClassStats, Container};
pub use image::{
    DecodedImage, Dims, EncodeOptions, ImageRecord, OpaquePolicy, OpaqueRegion, PixelLayout,
    HEADER_LEN, MAX_PIXEL_BYTES, OPAQUE_LEN, OPAQUE_OFFSET,
};
pub use manifest::{LayoutManifest, TableBytes};
pub use table::{AssetClass, AssetTable, TableCounts, TableEntry, ENTRY_SIZE};
