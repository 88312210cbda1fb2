use std::path::Path;

use anyhow::{Context, Result};
use cpak_core::format::{repack, write_atomic, AssetClass, Replacements};

use crate::app::LayoutArgs;

pub fn run(original: &Path, modified_dir: &Path, output: &Path, layout: &LayoutArgs) -> Result<()> {
    let container = super::open_container(original, layout)?;
    let replacements = Replacements::scan_dir(modified_dir, container.counts())
        .with_context(|| format!("scanning {:?}", modified_dir))?;

    for class in AssetClass::ALL {
        let n = replacements.class(class).len();
        if n > 0 {
            log::info!("replacing {} {} asset(s)", n, class);
        }
    }
    if replacements.is_empty() {
        log::warn!("no replacements found in {:?}, output will match the input", modified_dir);
    }

    let bytes = repack(&container, &replacements).context("repack failed, nothing written")?;
    write_atomic(output, &bytes).with_context(|| format!("writing {:?}", output))?;

    let before = container.as_bytes().len() as i64;
    let after = bytes.len() as i64;
    log::info!(
        "wrote {:?}: {} -> {} bytes ({:+})",
        output,
        before,
        after,
        after - before
    );
    Ok(())
}
