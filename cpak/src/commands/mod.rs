pub mod extract;
pub mod info;
pub mod optimize;
pub mod record;
pub mod repack;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use cpak_core::format::{probe, Container, DecodedImage, LayoutManifest, TableCounts};
use image::RgbaImage;

use crate::app::LayoutArgs;

pub fn table_counts(layout: &LayoutArgs) -> Result<TableCounts> {
    match (&layout.counts, &layout.layout) {
        (Some(counts), _) => Ok(*counts),
        (None, Some(path)) => LayoutManifest::load(path)
            .and_then(|m| m.table_counts())
            .with_context(|| format!("reading layout manifest {:?}", path)),
        (None, None) => Err(anyhow!("either --counts or --layout is required")),
    }
}

/// Open a container and cross-check the counts against the probed index length.
pub fn open_container(path: &Path, layout: &LayoutArgs) -> Result<Container> {
    let counts = table_counts(layout)?;
    let container =
        Container::open(path, counts).with_context(|| format!("loading container {:?}", path))?;
    if !probe::check_counts(container.as_bytes(), &counts) {
        log::warn!("the index may be misread; double-check the layout");
    }
    Ok(container)
}

pub fn to_rgba_image(decoded: &DecodedImage) -> Result<RgbaImage> {
    let dims = decoded.dims();
    let rgba = decoded.to_rgba8().ok_or_else(|| {
        anyhow!(
            "{} record declares {} pixel bytes, neither RGBA nor RGB",
            dims,
            decoded.pixels.len()
        )
    })?;
    RgbaImage::from_raw(dims.width as u32, dims.height as u32, rgba)
        .ok_or_else(|| anyhow!("pixel buffer does not match {}", dims))
}

/// Drop the alpha channel.
pub fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect()
}
