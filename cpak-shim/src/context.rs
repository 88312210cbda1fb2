//! Process-wide shim state with explicit, run-once `init` and `shutdown`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crate::config::ShimConfig;
use crate::guard::HookGuard;
use crate::ledger::BufferLedger;
use crate::stats::Stats;

pub struct ShimContext {
    pub config: ShimConfig,
    pub ledger: BufferLedger,
    pub stats: Stats,
}

impl ShimContext {
    pub fn new(config: ShimConfig) -> Self {
        // nothing is ever registered unless aggressive reclaim is on
        let capacity = if config.aggressive_free {
            config.ledger_capacity
        } else {
            0
        };
        Self {
            config,
            ledger: BufferLedger::with_capacity(capacity),
            stats: Stats::default(),
        }
    }
}

static CONTEXT: OnceLock<ShimContext> = OnceLock::new();
static SHUT_DOWN: AtomicBool = AtomicBool::new(false);

/// Initialize on first call; later calls return the same context.
///
/// Callers must hold a [`HookGuard`]: setup allocates and logs.
pub fn init() -> &'static ShimContext {
    CONTEXT.get_or_init(|| {
        let config = *ShimConfig::get();
        init_logging(&config);

        log::info!(
            "loaded: scale {:.0}%, min size {}, filter {:?}",
            config.scale * 100.0,
            config.min_size,
            config.filter
        );
        if config.aggressive_free {
            log::info!(
                "aggressive free ENABLED: tracking allocations >= {} bytes, up to {}",
                config.track_min,
                config.ledger_capacity
            );
        }
        if config.disabled {
            log::info!("disabled, passing everything through");
        }

        // SAFETY: registering a plain extern "C" fn
        if unsafe { libc::atexit(shutdown_at_exit) } != 0 {
            log::warn!("could not register the exit handler, no summary will be printed");
        }
        ShimContext::new(config)
    })
}

pub fn get() -> Option<&'static ShimContext> {
    CONTEXT.get()
}

/// Print the session summary. Runs at most once; a no-op before `init`.
pub fn shutdown() {
    let Some(ctx) = CONTEXT.get() else {
        return;
    };
    if SHUT_DOWN.swap(true, Ordering::AcqRel) {
        return;
    }
    ctx.stats.snapshot().log_summary();
    if ctx.config.aggressive_free {
        log::info!(
            "  ledger:             {} live, {} untracked (capacity {})",
            ctx.ledger.live(),
            ctx.ledger.untracked(),
            ctx.ledger.capacity()
        );
    }
}

extern "C" fn shutdown_at_exit() {
    let _guard = HookGuard::enter();
    let _ = std::panic::catch_unwind(shutdown);
}

fn init_logging(config: &ShimConfig) {
    let level = if config.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // the host may already have a logger if it links us as a library
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_env(env_logger::Env::new().filter("CPAK_LOG"))
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
