use std::path::Path;

use anyhow::Result;
use cpak_core::format::probe;

use crate::app::LayoutArgs;

pub fn run(path: &Path, layout: &LayoutArgs) -> Result<()> {
    let container = super::open_container(path, layout)?;
    let bytes = container.as_bytes();

    println!("{}", path.display());
    println!("  size:    {} bytes", bytes.len());
    println!("  layout:  {}", container.counts());
    println!("  index:   {} bytes", container.payload_start());
    match probe::index_len(bytes) {
        Some(len) if len == container.payload_start() => println!("  probe:   ok"),
        Some(len) => println!("  probe:   first entry suggests a {} byte index", len),
        None => println!("  probe:   inconclusive"),
    }
    println!();
    println!(
        "  {:<8} {:>7} {:>10} {:>10} {:>10} {:>12}",
        "class", "count", "min", "max", "avg", "total"
    );
    for stats in container.stats() {
        let offset = container.counts().table_offset(stats.class);
        println!(
            "  {:<8} {:>7} {:>10} {:>10} {:>10} {:>12}   table @ {:#x}",
            stats.class.to_string(),
            stats.count,
            stats.smallest,
            stats.largest,
            stats.average(),
            stats.total,
            offset
        );
    }

    match container.validate() {
        Ok(()) => println!("\n  all entries lie inside the file"),
        Err(e) => println!("\n  invalid entry: {}", e),
    }
    Ok(())
}
