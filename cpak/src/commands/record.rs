use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cpak_core::format::{
    Dims, EncodeOptions, ImageRecord, OpaquePolicy, PixelLayout, OPAQUE_OFFSET,
};
use image::imageops::{self, FilterType};

pub fn decode(input: &Path, output: Option<&Path>) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {:?}", input))?;
    let decoded = ImageRecord::decode(&bytes).with_context(|| format!("decoding {:?}", input))?;
    let img = super::to_rgba_image(&decoded)?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("png"));
    img.save_with_format(&output, image::ImageFormat::Png)
        .with_context(|| format!("writing {:?}", output))?;
    log::info!("{:?}: {} -> {:?}", input, decoded.dims(), output);
    Ok(())
}

pub fn encode(
    input: &Path,
    output: &Path,
    original: Option<&Path>,
    size: Option<Dims>,
    keep_opaque: bool,
) -> Result<()> {
    let img = image::open(input)
        .with_context(|| format!("reading {:?}", input))?
        .to_rgba8();
    let (w, h) = img.dimensions();

    let target = match size {
        Some(dims) => dims,
        None => Dims::new(
            u16::try_from(w).context("image too wide for a record")?,
            u16::try_from(h).context("image too tall for a record")?,
        ),
    };
    let img = if (target.width as u32, target.height as u32) != (w, h) {
        log::debug!("resizing {}x{} -> {}", w, h, target);
        imageops::resize(&img, target.width as u32, target.height as u32, FilterType::Lanczos3)
    } else {
        img
    };

    let template = match original {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("reading {:?}", path))?;
            ImageRecord::parse_header(&bytes)
                .with_context(|| format!("parsing header of {:?}", path))?
        }
        None => ImageRecord::fresh(target),
    };

    // an RGB original stays RGB
    let layout = template.pixel_layout().unwrap_or_default();
    let pixels = match layout {
        PixelLayout::Rgba8 => img.into_raw(),
        PixelLayout::Rgb8 => super::rgba_to_rgb(img.as_raw()),
    };
    let options = EncodeOptions {
        layout,
        opaque_policy: if keep_opaque {
            OpaquePolicy::Preserve
        } else {
            OpaquePolicy::ZeroOnResize
        },
    };

    let bytes = template
        .encode(&pixels, target, &options)
        .with_context(|| format!("encoding {:?}", input))?;
    fs::write(output, &bytes).with_context(|| format!("writing {:?}", output))?;
    log::info!(
        "{:?} -> {:?}: {} {:?}, {} bytes ({} compressed)",
        input,
        output,
        target,
        layout,
        pixels.len(),
        bytes.len() - cpak_core::format::HEADER_LEN
    );
    Ok(())
}

pub fn header(input: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {:?}", input))?;
    let record =
        ImageRecord::parse_header(&bytes).with_context(|| format!("parsing {:?}", input))?;

    println!("{}", input.display());
    println!("  dimensions:        {}", record.dims());
    println!(
        "  mirrors:           {}x{} / {}x{}{}",
        record.width_copy,
        record.height_copy,
        record.width_copy2,
        record.height_copy2,
        if record.mirrors_consistent() { "" } else { "  (inconsistent)" }
    );
    println!("  unknown32:         {:#010x}", record.unknown32);
    println!("  hotspot:           ({}, {})", record.hotspot_x, record.hotspot_y());
    println!("  flags:             {:#06x}", record.flags());
    println!("  decompressed size: {}", record.decompressed_size);
    match record.pixel_layout() {
        Some(layout) => println!("  layout:            {:?}", layout),
        None => println!("  layout:            unknown"),
    }
    println!("  trailer:           {}", hex(&record.trailer));
    println!("  payload:           {} bytes", record.payload.len());
    println!("  opaque @{}:", OPAQUE_OFFSET);
    for (i, chunk) in record.opaque.0.chunks(8).enumerate() {
        println!("    +{:02}  {}", i * 8, hex(chunk));
    }

    match record.inflate() {
        Ok(_) => println!("  stream:            ok"),
        Err(e) => println!("  stream:            {}", e),
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `images/image_00042.bin` -> `images/image_00042.png`
pub fn png_path(bin: &Path) -> PathBuf {
    bin.with_extension("png")
}
