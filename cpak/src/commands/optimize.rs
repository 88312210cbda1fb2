use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cpak_core::format::{
    AssetClass, DecodedImage, Dims, EncodeOptions, ImageRecord, PixelLayout, MAX_PIXEL_BYTES,
};
use cpak_core::resample::{self, ResampleFilter};
use image::imageops::{self, FilterType};

use crate::app::FilterArg;

#[derive(Debug, Clone, Copy)]
pub struct OptimizeOptions {
    pub scale: f32,
    pub min_dim: u16,
    pub filter: FilterArg,
    /// Inclusive image index range.
    pub range: (Option<usize>, Option<usize>),
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Saved { old: Dims, new: Dims },
    TooSmall,
    NoChange,
    WouldBeTooLarge,
}

#[derive(Debug, Default)]
struct Summary {
    saved: usize,
    too_small: usize,
    no_change: usize,
    too_large: usize,
    failed: usize,
    original_pixels: u64,
    new_pixels: u64,
}

pub fn run(in_dir: &Path, out_dir: &Path, options: OptimizeOptions) -> Result<()> {
    let files = image_records(in_dir, options.range)?;
    log::info!(
        "optimizing {} record(s) from {:?} at {:.0}%, min dimension {}",
        files.len(),
        in_dir,
        options.scale * 100.0,
        options.min_dim
    );
    fs::create_dir_all(out_dir).with_context(|| format!("creating {:?}", out_dir))?;

    let mut summary = Summary::default();
    for (index, path) in &files {
        let name = AssetClass::Image.file_stem(*index);
        match optimize_one(path, &out_dir.join(format!("{}.bin", name)), &options) {
            Ok(Outcome::Saved { old, new }) => {
                if summary.saved < 5 {
                    log::info!("{}: {} -> {}", name, old, new);
                }
                summary.saved += 1;
                summary.original_pixels += old.pixel_count() as u64;
                summary.new_pixels += new.pixel_count() as u64;
            }
            Ok(Outcome::TooSmall) => summary.too_small += 1,
            Ok(Outcome::NoChange) => summary.no_change += 1,
            Ok(Outcome::WouldBeTooLarge) => summary.too_large += 1,
            Err(e) => {
                log::warn!("{}: {:#}", name, e);
                summary.failed += 1;
            }
        }
        if summary.saved > 0 && summary.saved % 500 == 0 {
            log::debug!("{} records downscaled so far", summary.saved);
        }
    }

    println!("optimized:        {}", summary.saved);
    println!("skipped (small):  {}", summary.too_small);
    println!("skipped (same):   {}", summary.no_change);
    println!("skipped (large):  {}", summary.too_large);
    println!("failed:           {}", summary.failed);
    if summary.original_pixels > 0 {
        let before = summary.original_pixels * 4;
        let after = summary.new_pixels * 4;
        println!(
            "texture RAM:      {:.1} MiB -> {:.1} MiB ({:.1}% less)",
            before as f64 / (1024.0 * 1024.0),
            after as f64 / (1024.0 * 1024.0),
            (1.0 - after as f64 / before as f64) * 100.0
        );
    }
    Ok(())
}

/// `image_*.bin` files in `dir`, sorted by index.
fn image_records(dir: &Path, range: (Option<usize>, Option<usize>)) -> Result<Vec<(usize, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {:?}", dir))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bin") {
            continue;
        }
        let Some(index) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| AssetClass::Image.parse_file_stem(s))
        else {
            continue;
        };
        if range.0.map_or(true, |start| index >= start) && range.1.map_or(true, |end| index <= end) {
            files.push((index, path));
        }
    }
    files.sort();
    Ok(files)
}

fn target_dims(old: Dims, options: &OptimizeOptions) -> Dims {
    let scale = |v: u16| ((v as f32 * options.scale).floor() as u16).max(options.min_dim).max(1);
    Dims::new(scale(old.width), scale(old.height))
}

fn optimize_one(input: &Path, output: &Path, options: &OptimizeOptions) -> Result<Outcome> {
    let bytes = fs::read(input)?;
    let decoded = ImageRecord::decode(&bytes)?;
    let old = decoded.dims();
    if old.width <= options.min_dim || old.height <= options.min_dim {
        return Ok(Outcome::TooSmall);
    }

    let new = target_dims(old, options);
    if new == old {
        return Ok(Outcome::NoChange);
    }
    let layout = decoded.layout().unwrap_or_default();
    if new.pixel_count() * layout.bytes_per_pixel() > MAX_PIXEL_BYTES {
        return Ok(Outcome::WouldBeTooLarge);
    }

    let rgba = shrink(&decoded, new, options.filter)?;
    let pixels = match layout {
        PixelLayout::Rgba8 => rgba,
        PixelLayout::Rgb8 => super::rgba_to_rgb(&rgba),
    };
    let encoded = decoded.record.encode(
        &pixels,
        new,
        &EncodeOptions {
            layout,
            ..Default::default()
        },
    )?;
    fs::write(output, encoded).with_context(|| format!("writing {:?}", output))?;
    Ok(Outcome::Saved { old, new })
}

fn shrink(decoded: &DecodedImage, new: Dims, filter: FilterArg) -> Result<Vec<u8>> {
    let old = decoded.dims();
    let (nw, nh) = (new.width as u32, new.height as u32);
    let pixels = match filter {
        FilterArg::Lanczos => {
            let img = super::to_rgba_image(decoded)?;
            imageops::resize(&img, nw, nh, FilterType::Lanczos3).into_raw()
        }
        FilterArg::Box | FilterArg::Bilinear => {
            let filter = if filter == FilterArg::Box {
                ResampleFilter::Box
            } else {
                ResampleFilter::Bilinear
            };
            let rgba = super::to_rgba_image(decoded)?.into_raw();
            resample::resample(&rgba, old.width as u32, old.height as u32, nw, nh, filter)
                .into_owned()
        }
    };
    Ok(pixels)
}
