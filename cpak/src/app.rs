use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cpak_core::format::{Dims, TableCounts};

/// cpak - packed asset container toolkit
#[derive(Debug, Parser)]
#[command(name = "cpak", version, about, long_about = None)]
pub struct Cli {
    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the table counts come from. The container itself does not say.
#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct LayoutArgs {
    /// Entry counts as `image,sound,font,shader`.
    #[arg(long, value_name = "I,S,F,SH")]
    pub counts: Option<TableCounts>,

    /// TOML layout manifest with a [counts] or [table_bytes] section.
    #[arg(long, value_name = "FILE")]
    pub layout: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    Box,
    Bilinear,
    Lanczos,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print per-class entry statistics and check the supplied counts.
    Info {
        #[arg(value_name = "CONTAINER")]
        container: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Write every asset into per-class directories.
    Extract {
        #[arg(value_name = "CONTAINER")]
        container: PathBuf,

        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Also write a PNG next to every image record.
        #[arg(long)]
        decode: bool,
    },

    /// Convert one image record to PNG.
    DecodeImage {
        #[arg(value_name = "IN_BIN")]
        input: PathBuf,

        /// Defaults to the input path with a .png extension.
        #[arg(value_name = "OUT_PNG")]
        output: Option<PathBuf>,
    },

    /// Convert a PNG to an image record.
    EncodeImage {
        #[arg(value_name = "IN_PNG")]
        input: PathBuf,

        #[arg(value_name = "OUT_BIN")]
        output: PathBuf,

        /// Record whose header is used as the template.
        #[arg(long, value_name = "ORIG_BIN")]
        original: Option<PathBuf>,

        /// Resize to WxH before encoding.
        #[arg(long, value_name = "WxH", value_parser = parse_dims)]
        size: Option<Dims>,

        /// Keep the opaque header bytes even when the dimensions change.
        #[arg(long)]
        keep_opaque: bool,
    },

    /// Build a new container from an original and a directory of replacements.
    Repack {
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        #[arg(value_name = "MODIFIED_DIR")]
        modified_dir: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Downscale extracted image_*.bin records.
    Optimize {
        #[arg(value_name = "IN_DIR")]
        in_dir: PathBuf,

        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,

        #[arg(long, default_value_t = 0.5, value_parser = parse_scale)]
        scale: f32,

        /// Images with either side at or below this are left alone.
        #[arg(long, default_value_t = 16)]
        min_dim: u16,

        #[arg(long, value_enum, default_value_t = FilterArg::Lanczos)]
        filter: FilterArg,

        /// First image index to process.
        #[arg(long)]
        start: Option<usize>,

        /// Last image index to process (inclusive).
        #[arg(long)]
        end: Option<usize>,
    },

    /// Dump the header fields of one image record.
    Header {
        #[arg(value_name = "IN_BIN")]
        input: PathBuf,
    },
}

fn parse_dims(s: &str) -> Result<Dims, String> {
    let (w, h) = s
        .split_once(|c: char| c == 'x' || c == 'X')
        .ok_or_else(|| format!("expected WxH, got {:?}", s))?;
    let width = w.trim().parse::<u16>().map_err(|e| format!("bad width: {}", e))?;
    let height = h.trim().parse::<u16>().map_err(|e| format!("bad height: {}", e))?;
    if width == 0 || height == 0 {
        return Err("dimensions must be non-zero".to_string());
    }
    Ok(Dims::new(width, height))
}

fn parse_scale(s: &str) -> Result<f32, String> {
    let scale = s.parse::<f32>().map_err(|e| e.to_string())?;
    if scale > 0.0 && scale <= 1.0 {
        Ok(scale)
    } else {
        Err(format!("scale must be in (0, 1], got {}", scale))
    }
}
