use std::sync::atomic::{AtomicU64, Ordering};

/// Session counters, updated lock-free from any host thread.
#[derive(Debug, Default)]
pub struct Stats {
    pub textures_seen: AtomicU64,
    pub textures_scaled: AtomicU64,
    /// Bytes the host asked to upload.
    pub original_bytes: AtomicU64,
    /// Bytes actually uploaded.
    pub uploaded_bytes: AtomicU64,
    pub sub_updates_scaled: AtomicU64,
    pub buffers_reclaimed: AtomicU64,
    pub reclaimed_bytes: AtomicU64,
    pub scratch_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub textures_seen: u64,
    pub textures_scaled: u64,
    pub original_bytes: u64,
    pub uploaded_bytes: u64,
    pub sub_updates_scaled: u64,
    pub buffers_reclaimed: u64,
    pub reclaimed_bytes: u64,
    pub scratch_failures: u64,
}

impl Stats {
    pub fn add(counter: &AtomicU64, n: u64) -> u64 {
        counter.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn snapshot(&self) -> Snapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Snapshot {
            textures_seen: get(&self.textures_seen),
            textures_scaled: get(&self.textures_scaled),
            original_bytes: get(&self.original_bytes),
            uploaded_bytes: get(&self.uploaded_bytes),
            sub_updates_scaled: get(&self.sub_updates_scaled),
            buffers_reclaimed: get(&self.buffers_reclaimed),
            reclaimed_bytes: get(&self.reclaimed_bytes),
            scratch_failures: get(&self.scratch_failures),
        }
    }
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

impl Snapshot {
    pub fn saved_bytes(&self) -> u64 {
        self.original_bytes.saturating_sub(self.uploaded_bytes)
    }

    pub fn log_summary(&self) {
        log::info!("session summary:");
        log::info!("  textures seen:      {}", self.textures_seen);
        log::info!("  textures scaled:    {}", self.textures_scaled);
        log::info!("  sub-updates scaled: {}", self.sub_updates_scaled);
        log::info!("  original size:      {:.2} MiB", mib(self.original_bytes));
        log::info!("  uploaded size:      {:.2} MiB", mib(self.uploaded_bytes));
        log::info!("  saved:              {:.2} MiB", mib(self.saved_bytes()));
        log::info!(
            "  buffers reclaimed:  {} ({:.2} MiB)",
            self.buffers_reclaimed,
            mib(self.reclaimed_bytes)
        );
        if self.scratch_failures > 0 {
            log::info!("  scratch failures:   {}", self.scratch_failures);
        }
    }
}
