use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cpak_core::format::{sniff, AssetClass, Container, ImageRecord};

use crate::app::LayoutArgs;

#[derive(Debug, Default)]
struct Summary {
    written: [usize; 4],
    failed: [usize; 4],
    decoded: usize,
    decode_failed: usize,
}

pub fn run(path: &Path, out_dir: &Path, layout: &LayoutArgs, decode: bool) -> Result<()> {
    let container = super::open_container(path, layout)?;
    let summary = extract_all(&container, out_dir, decode)?;

    for class in AssetClass::ALL {
        let i = class.position();
        log::info!(
            "{:<7} {:>6} written, {} failed",
            class.dir_name(),
            summary.written[i],
            summary.failed[i]
        );
    }
    if decode {
        log::info!(
            "png     {:>6} written, {} could not be decoded",
            summary.decoded,
            summary.decode_failed
        );
    }
    Ok(())
}

fn extract_all(container: &Container, out_dir: &Path, decode: bool) -> Result<Summary> {
    let mut summary = Summary::default();

    for class in AssetClass::ALL {
        let dir = out_dir.join(class.dir_name());
        fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;

        for (index, bytes) in container.assets(class) {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("skipping: {}", e);
                    summary.failed[class.position()] += 1;
                    continue;
                }
            };

            let ext = sniff::extension(class, bytes);
            let file = dir.join(format!("{}.{}", class.file_stem(index), ext));
            if let Err(e) = fs::write(&file, bytes) {
                log::warn!("could not write {:?}: {}", file, e);
                summary.failed[class.position()] += 1;
                continue;
            }
            summary.written[class.position()] += 1;

            if decode && class == AssetClass::Image && ext == "bin" {
                match decode_to_png(bytes, &super::record::png_path(&file)) {
                    Ok(()) => summary.decoded += 1,
                    Err(e) => {
                        log::debug!("{}: {:#}", class.file_stem(index), e);
                        summary.decode_failed += 1;
                    }
                }
            }
        }
    }

    Ok(summary)
}

fn decode_to_png(bytes: &[u8], path: &Path) -> Result<()> {
    let decoded = ImageRecord::decode(bytes)?;
    super::to_rgba_image(&decoded)?.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
