mod app;
mod commands;

use anyhow::Result;
use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        Command::Info { container, layout } => commands::info::run(&container, &layout),
        Command::Extract {
            container,
            out_dir,
            layout,
            decode,
        } => commands::extract::run(&container, &out_dir, &layout, decode),
        Command::DecodeImage { input, output } => {
            commands::record::decode(&input, output.as_deref())
        }
        Command::EncodeImage {
            input,
            output,
            original,
            size,
            keep_opaque,
        } => commands::record::encode(&input, &output, original.as_deref(), size, keep_opaque),
        Command::Repack {
            original,
            modified_dir,
            output,
            layout,
        } => commands::repack::run(&original, &modified_dir, &output, &layout),
        Command::Optimize {
            in_dir,
            out_dir,
            scale,
            min_dim,
            filter,
            start,
            end,
        } => commands::optimize::run(
            &in_dir,
            &out_dir,
            commands::optimize::OptimizeOptions {
                scale,
                min_dim,
                filter,
                range: (start, end),
            },
        ),
        Command::Header { input } => commands::record::header(&input),
    }
}
