//! Runtime configuration, read once from the environment.
//!
//! - `CPAK_SCALE` (float in (0, 1], default 0.5)
//! - `CPAK_MIN_SIZE` (minimum texture side to scale, default 64, never below 8)
//! - `CPAK_VERBOSE`, `CPAK_DISABLE`, `CPAK_AGGRESSIVE_FREE` (bools, default off)
//! - `CPAK_FILTER` (`box` or `bilinear`, default bilinear)
//! - `CPAK_LEDGER_CAPACITY` (tracked allocations, default 20000)
//! - `CPAK_TRACK_MIN` (smallest allocation tracked, default 16384)
//! - `CPAK_LOG` (env_logger filter, overrides the verbosity default)

use std::env;
use std::sync::OnceLock;

use cpak_core::resample::ResampleFilter;

pub const DEFAULT_SCALE: f32 = 0.5;
pub const DEFAULT_MIN_SIZE: u32 = 64;
pub const MIN_SIZE_FLOOR: u32 = 8;
pub const DEFAULT_LEDGER_CAPACITY: usize = 20_000;
pub const DEFAULT_TRACK_MIN: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShimConfig {
    pub scale: f32,
    pub min_size: u32,
    pub verbose: bool,
    pub disabled: bool,
    pub aggressive_free: bool,
    pub filter: ResampleFilter,
    pub ledger_capacity: usize,
    pub track_min: usize,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            min_size: DEFAULT_MIN_SIZE,
            verbose: false,
            disabled: false,
            aggressive_free: false,
            filter: ResampleFilter::Bilinear,
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
            track_min: DEFAULT_TRACK_MIN,
        }
    }
}

fn parse_bool(v: Option<String>) -> bool {
    match v {
        Some(v) => {
            let s = v.trim().to_ascii_lowercase();
            !(s.is_empty() || s == "0" || s == "false" || s == "no" || s == "off")
        }
        None => false,
    }
}

fn parse_num<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
    v.and_then(|v| v.trim().parse::<T>().ok())
}

impl ShimConfig {
    /// Build a configuration from a variable lookup; unparsable values fall back
    /// to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let scale = parse_num::<f32>(lookup("CPAK_SCALE"))
            .filter(|s| *s > 0.0 && *s <= 1.0)
            .unwrap_or(defaults.scale);
        let min_size = parse_num::<i64>(lookup("CPAK_MIN_SIZE"))
            .map(|v| v.clamp(MIN_SIZE_FLOOR as i64, u32::MAX as i64) as u32)
            .unwrap_or(defaults.min_size);
        let filter = lookup("CPAK_FILTER")
            .and_then(|v| v.parse::<ResampleFilter>().ok())
            .unwrap_or(defaults.filter);

        Self {
            scale,
            min_size,
            verbose: parse_bool(lookup("CPAK_VERBOSE")),
            disabled: parse_bool(lookup("CPAK_DISABLE")),
            aggressive_free: parse_bool(lookup("CPAK_AGGRESSIVE_FREE")),
            filter,
            ledger_capacity: parse_num(lookup("CPAK_LEDGER_CAPACITY"))
                .unwrap_or(defaults.ledger_capacity),
            track_min: parse_num(lookup("CPAK_TRACK_MIN")).unwrap_or(defaults.track_min),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Process-wide configuration, read on first use.
    pub fn get() -> &'static ShimConfig {
        static CONFIG: OnceLock<ShimConfig> = OnceLock::new();
        CONFIG.get_or_init(Self::from_env)
    }
}
