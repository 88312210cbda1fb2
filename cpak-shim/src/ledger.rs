//! Registry of live large allocations, used to find and reclaim texture
//! source buffers after upload.
//!
//! Addresses get reused by the allocator, so an address alone never
//! identifies a buffer: every query resolves to the most recent entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{Result, ShimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Live,
    Freed,
    /// Released by the shim behind the host's back.
    Reclaimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedBuffer {
    pub address: usize,
    pub size: usize,
    pub state: BufferState,
}

/// What the `free` hook should do with a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeAction {
    Forward,
    /// The shim already returned this block; freeing it again would be a double free.
    Swallow,
}

pub struct BufferLedger {
    entries: Mutex<Vec<TrackedBuffer>>,
    capacity: usize,
    untracked: AtomicU64,
}

impl BufferLedger {
    /// The table is allocated here once; no later operation allocates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            untracked: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TrackedBuffer>> {
        // the table stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, address: usize, size: usize) -> Result<()> {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            // compact in place before giving up; reclaimed entries still owe a swallowed free
            entries.retain(|e| e.state != BufferState::Freed);
        }
        if entries.len() >= self.capacity {
            drop(entries);
            self.untracked.fetch_add(1, Ordering::Relaxed);
            return Err(ShimError::Capacity {
                capacity: self.capacity,
            });
        }
        entries.push(TrackedBuffer {
            address,
            size,
            state: BufferState::Live,
        });
        Ok(())
    }

    /// Size of the newest live buffer at `address`.
    pub fn lookup(&self, address: usize) -> Option<usize> {
        self.lock()
            .iter()
            .rev()
            .find(|e| e.address == address && e.state == BufferState::Live)
            .map(|e| e.size)
    }

    /// Mark the newest live buffer at `address` freed. Returns whether one was found.
    pub fn release(&self, address: usize) -> bool {
        self.transition(address, BufferState::Freed).is_some()
    }

    /// Mark the newest live buffer at `address` reclaimed and return its size.
    pub fn reclaim(&self, address: usize) -> Option<usize> {
        self.transition(address, BufferState::Reclaimed)
    }

    fn transition(&self, address: usize, to: BufferState) -> Option<usize> {
        let mut entries = self.lock();
        let entry = entries
            .iter_mut()
            .rev()
            .find(|e| e.address == address && e.state == BufferState::Live)?;
        entry.state = to;
        Some(entry.size)
    }

    /// Settle a host `free`: a live entry becomes freed; a block the shim already
    /// reclaimed must not reach the real allocator a second time.
    pub fn on_free(&self, address: usize) -> FreeAction {
        let mut entries = self.lock();
        let newest = entries
            .iter_mut()
            .rev()
            .find(|e| e.address == address && e.state != BufferState::Freed);
        match newest {
            Some(e) if e.state == BufferState::Reclaimed => {
                e.state = BufferState::Freed;
                FreeAction::Swallow
            }
            Some(e) => {
                e.state = BufferState::Freed;
                FreeAction::Forward
            }
            None => FreeAction::Forward,
        }
    }

    pub fn live(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.state == BufferState::Live)
            .count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocations dropped because the table was full.
    pub fn untracked(&self) -> u64 {
        self.untracked.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn released_address_is_not_found() {
        let ledger = BufferLedger::with_capacity(16);
        ledger.register(0x1000, 200_000).unwrap();
        assert_eq!(ledger.lookup(0x1000), Some(200_000));
        assert!(ledger.release(0x1000));
        assert_eq!(ledger.lookup(0x1000), None);
        // idempotent
        assert!(!ledger.release(0x1000));

        // the allocator hands the same address out again
        ledger.register(0x1000, 65_536).unwrap();
        assert_eq!(ledger.lookup(0x1000), Some(65_536));
        assert_eq!(ledger.live(), 1);
    }

    #[test]
    fn newest_entry_wins() {
        let ledger = BufferLedger::with_capacity(16);
        ledger.register(0x2000, 1).unwrap();
        ledger.register(0x2000, 2).unwrap();
        assert_eq!(ledger.lookup(0x2000), Some(2));
        assert!(ledger.release(0x2000));
        assert_eq!(ledger.lookup(0x2000), Some(1));
    }

    #[test]
    fn full_table_drops_new_entries() {
        let ledger = BufferLedger::with_capacity(2);
        ledger.register(1, 10).unwrap();
        ledger.register(2, 10).unwrap();
        assert_eq!(ledger.register(3, 10), Err(ShimError::Capacity { capacity: 2 }));
        assert_eq!(ledger.untracked(), 1);
        assert_eq!(ledger.lookup(3), None);

        // freed entries are compacted away when room is needed
        ledger.release(1);
        ledger.register(3, 10).unwrap();
        assert_eq!(ledger.lookup(3), Some(10));
        assert_eq!(ledger.lookup(2), Some(10));
    }

    #[test]
    fn reclaimed_block_is_not_freed_twice() {
        let ledger = BufferLedger::with_capacity(4);
        ledger.register(0x3000, 70_000).unwrap();
        assert_eq!(ledger.reclaim(0x3000), Some(70_000));
        assert_eq!(ledger.lookup(0x3000), None);
        assert_eq!(ledger.on_free(0x3000), FreeAction::Swallow);
        assert_eq!(ledger.on_free(0x3000), FreeAction::Forward);
        assert_eq!(ledger.on_free(0x9999), FreeAction::Forward);
    }

    #[test]
    fn stale_pointer_to_reused_address_is_swallowed_once() {
        let ledger = BufferLedger::with_capacity(8);
        ledger.register(0xA000, 40_000).unwrap();
        assert_eq!(ledger.reclaim(0xA000), Some(40_000));
        // the allocator hands the reclaimed block out again
        ledger.register(0xA000, 40_000).unwrap();

        let actions = [ledger.on_free(0xA000), ledger.on_free(0xA000)];
        assert_eq!(
            actions.iter().filter(|a| **a == FreeAction::Forward).count(),
            1
        );
        assert!(actions.contains(&FreeAction::Swallow));
        assert_eq!(ledger.on_free(0xA000), FreeAction::Forward);
    }

    #[test]
    fn compaction_keeps_reclaimed_entries() {
        let ledger = BufferLedger::with_capacity(2);
        ledger.register(0x4000, 20_000).unwrap();
        ledger.register(0x5000, 20_000).unwrap();
        ledger.reclaim(0x4000);
        assert!(ledger.register(0x6000, 20_000).is_err());
        assert_eq!(ledger.on_free(0x4000), FreeAction::Swallow);
    }

    #[test]
    fn concurrent_register_release_never_reports_freed_as_live() {
        const THREADS: usize = 8;
        const OPS: usize = 2_000;
        let ledger = Arc::new(BufferLedger::with_capacity(THREADS * OPS));

        let handles = (0..THREADS)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..OPS {
                        // disjoint address space per thread
                        let address = (t + 1) * 0x10_0000 + (i % 64) * 16;
                        ledger.register(address, i + 1).unwrap();
                        assert_eq!(ledger.lookup(address), Some(i + 1));
                        assert!(ledger.release(address));
                        assert_eq!(ledger.lookup(address), None);
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn concurrent_reuse_of_a_shared_address_pool() {
        const THREADS: usize = 8;
        const OPS: usize = 2_000;
        const POOL: usize = 4;
        let ledger = Arc::new(BufferLedger::with_capacity(THREADS * OPS));

        let handles = (0..THREADS)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..OPS {
                        let address = 0x7000 + ((t + i) % POOL) * 16;
                        let size = (t + 1) * 1_000_000 + i;
                        ledger.register(address, size).unwrap();
                        assert!(ledger.release(address));
                        // whatever is still live here belongs to some thread's open registration
                        if let Some(seen) = ledger.lookup(address) {
                            assert!(seen >= 1_000_000);
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ledger.live(), 0);
        for slot in 0..POOL {
            assert_eq!(ledger.lookup(0x7000 + slot * 16), None);
        }
    }
}
