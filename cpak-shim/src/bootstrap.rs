//! Static bump arena for allocations that arrive while `dlsym` is still
//! resolving the real allocator on the same thread.
//!
//! Memory handed out here is never reused or returned; `free` of an arena
//! pointer is a no-op. Each block carries its requested size in a 16 byte
//! prefix so `realloc` can move it to the real heap.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

const ALIGN: usize = 16;
pub const ARENA_SIZE: usize = 64 * 1024;

#[repr(C, align(16))]
pub struct BumpArena<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    next: AtomicUsize,
}

// blocks are carved out with a CAS on `next` and never overlap
unsafe impl<const N: usize> Sync for BumpArena<N> {}

impl<const N: usize> BumpArena<N> {
    pub const fn new() -> Self {
        Self {
            buf: UnsafeCell::new([0; N]),
            next: AtomicUsize::new(0),
        }
    }

    /// Zeroed, 16-byte aligned block, or null when the arena is spent.
    pub fn alloc(&self, size: usize) -> *mut c_void {
        let Some(total) = size
            .checked_add(ALIGN + ALIGN - 1)
            .map(|n| n & !(ALIGN - 1))
        else {
            return ptr::null_mut();
        };

        let mut start = self.next.load(Ordering::Relaxed);
        loop {
            let end = match start.checked_add(total) {
                Some(end) if end <= N => end,
                _ => return ptr::null_mut(),
            };
            match self
                .next
                .compare_exchange_weak(start, end, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => start = current,
            }
        }

        let base = self.buf.get() as *mut u8;
        // SAFETY: [start, start + total) is inside the buffer and owned by this call
        unsafe {
            let header = base.add(start);
            (header as *mut usize).write(size);
            header.add(ALIGN) as *mut c_void
        }
    }

    pub fn contains(&self, p: *const c_void) -> bool {
        let start = self.buf.get() as usize;
        let p = p as usize;
        p >= start && p < start + N
    }

    /// Requested size of a block returned by [`BumpArena::alloc`].
    ///
    /// # Safety
    /// `p` must have come from `alloc` on this arena.
    pub unsafe fn block_size(&self, p: *const c_void) -> usize {
        ((p as *const u8).sub(ALIGN) as *const usize).read()
    }

    pub fn used(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for BumpArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

static ARENA: BumpArena<ARENA_SIZE> = BumpArena::new();

pub fn alloc(size: usize) -> *mut c_void {
    ARENA.alloc(size)
}

pub fn alloc_zeroed(count: usize, size: usize) -> *mut c_void {
    match count.checked_mul(size) {
        Some(total) => ARENA.alloc(total),
        None => ptr::null_mut(),
    }
}

pub fn contains(p: *const c_void) -> bool {
    ARENA.contains(p)
}

/// # Safety
/// `p` must be an arena pointer.
pub unsafe fn block_size(p: *const c_void) -> usize {
    ARENA.block_size(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_aligned_sized_and_disjoint() {
        let arena = Box::new(BumpArena::<256>::new());
        let a = arena.alloc(5);
        let b = arena.alloc(40);
        assert!(!a.is_null() && !b.is_null());
        assert_eq!(a as usize % ALIGN, 0);
        assert_eq!(b as usize % ALIGN, 0);
        assert!(b as usize >= a as usize + 5);
        assert!(arena.contains(a) && arena.contains(b));
        unsafe {
            assert_eq!(arena.block_size(a), 5);
            assert_eq!(arena.block_size(b), 40);
            assert!(std::slice::from_raw_parts(b as *const u8, 40).iter().all(|v| *v == 0));
        }
        let outside = 0u8;
        assert!(!arena.contains(&outside as *const u8 as *const c_void));
    }

    #[test]
    fn exhaustion_returns_null() {
        let arena = Box::new(BumpArena::<64>::new());
        assert!(!arena.alloc(32).is_null());
        assert!(arena.alloc(32).is_null());
        assert!(!arena.alloc(0).is_null());
        assert!(arena.alloc(usize::MAX).is_null());
        assert_eq!(arena.used(), 64);
    }
}
