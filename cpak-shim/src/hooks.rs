//! Bodies of the interposed functions.
//!
//! Each hook forwards to the real implementation no matter what happens in
//! its own bookkeeping: nested calls (the guard is already held), unresolved
//! symbols and panics all end in a plain passthrough.

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use libc::size_t;

use crate::bootstrap;
use crate::context;
use crate::gl::{GLenum, GLint, GLsizei};
use crate::guard::HookGuard;
use crate::ledger::FreeAction;
use crate::symbols;
use crate::upload::{self, TexImage, TexSubImage, UploadBackend};

fn guarded<R>(f: impl FnOnce() -> R) -> Option<R> {
    catch_unwind(AssertUnwindSafe(f)).ok()
}

/// Real allocator and GL entry points.
pub struct RealBackend;

fn report_missing(real: &symbols::RealFn) {
    if real.first_report() {
        log::error!(
            "{}",
            crate::error::ShimError::Resolution { symbol: real.name() }
        );
    }
}

impl UploadBackend for RealBackend {
    fn alloc(&self, bytes: usize) -> *mut u8 {
        match symbols::malloc() {
            // SAFETY: real malloc
            Some(malloc) => unsafe { malloc(bytes) as *mut u8 },
            None => ptr::null_mut(),
        }
    }

    fn dealloc(&self, p: *mut c_void) {
        if p.is_null() || bootstrap::contains(p) {
            return;
        }
        if let Some(free) = symbols::free() {
            // SAFETY: p came from the real allocator
            unsafe { free(p) }
        }
    }

    fn tex_image_2d(&self, r: &TexImage) {
        match symbols::tex_image_2d() {
            // SAFETY: forwarding the host's own arguments (or scratch of the right size)
            Some(real) => unsafe {
                real(
                    r.target,
                    r.level,
                    r.internal_format,
                    r.width,
                    r.height,
                    r.border,
                    r.format,
                    r.ty,
                    r.data,
                )
            },
            None => report_missing(&symbols::GL_TEX_IMAGE_2D),
        }
    }

    fn tex_sub_image_2d(&self, r: &TexSubImage) {
        match symbols::tex_sub_image_2d() {
            // SAFETY: as above
            Some(real) => unsafe {
                real(
                    r.target, r.level, r.x_offset, r.y_offset, r.width, r.height, r.format, r.ty,
                    r.data,
                )
            },
            None => report_missing(&symbols::GL_TEX_SUB_IMAGE_2D),
        }
    }
}

static CAPACITY_REPORTED: AtomicBool = AtomicBool::new(false);

/// Record a fresh allocation in the ledger when aggressive reclaim is on.
fn track(p: *mut c_void, size: usize, replaces: Option<*mut c_void>) {
    if p.is_null() && replaces.is_none() {
        return;
    }
    let Some(_guard) = HookGuard::enter() else {
        return;
    };
    guarded(|| {
        let ctx = context::init();
        if !ctx.config.aggressive_free || ctx.config.disabled {
            return;
        }
        if let Some(old) = replaces.filter(|old| !old.is_null()) {
            ctx.ledger.release(old as usize);
        }
        if !p.is_null() && size >= ctx.config.track_min {
            if let Err(e) = ctx.ledger.register(p as usize, size) {
                if !CAPACITY_REPORTED.swap(true, Ordering::Relaxed) {
                    log::warn!("{}; further large allocations go untracked", e);
                }
            }
        }
    });
}

/// # Safety
/// Same contract as libc `malloc`.
pub unsafe fn malloc(size: size_t) -> *mut c_void {
    let Some(real) = symbols::malloc() else {
        return bootstrap::alloc(size);
    };
    let p = real(size);
    track(p, size, None);
    p
}

/// # Safety
/// Same contract as libc `calloc`.
pub unsafe fn calloc(count: size_t, size: size_t) -> *mut c_void {
    let Some(real) = symbols::calloc() else {
        return bootstrap::alloc_zeroed(count, size);
    };
    let p = real(count, size);
    track(p, count.saturating_mul(size), None);
    p
}

/// # Safety
/// Same contract as libc `realloc`.
pub unsafe fn realloc(old: *mut c_void, size: size_t) -> *mut c_void {
    if !old.is_null() && bootstrap::contains(old) {
        // move the block off the arena
        let p = malloc(size);
        if !p.is_null() {
            let n = bootstrap::block_size(old).min(size);
            ptr::copy_nonoverlapping(old as *const u8, p as *mut u8, n);
        }
        return p;
    }

    let Some(real) = symbols::realloc() else {
        return ptr::null_mut();
    };
    let p = real(old, size);
    // a failed resize leaves the old block alive
    if !p.is_null() || size == 0 {
        track(p, size, Some(old));
    }
    p
}

/// # Safety
/// Same contract as libc `free`.
pub unsafe fn free(p: *mut c_void) {
    if p.is_null() || bootstrap::contains(p) {
        return;
    }
    if let Some(_guard) = HookGuard::enter() {
        let action = guarded(|| match context::get() {
            Some(ctx) if ctx.config.aggressive_free => ctx.ledger.on_free(p as usize),
            _ => FreeAction::Forward,
        });
        if action == Some(FreeAction::Swallow) {
            return;
        }
    }
    if let Some(real) = symbols::free() {
        real(p);
    }
}

/// # Safety
/// Same contract as `glTexImage2D`.
#[allow(clippy::too_many_arguments)]
pub unsafe fn tex_image_2d(
    target: GLenum,
    level: GLint,
    internal_format: GLint,
    width: GLsizei,
    height: GLsizei,
    border: GLint,
    format: GLenum,
    ty: GLenum,
    data: *const c_void,
) {
    let req = TexImage {
        target,
        level,
        internal_format,
        width,
        height,
        border,
        format,
        ty,
        data,
    };
    let Some(_guard) = HookGuard::enter() else {
        RealBackend.tex_image_2d(&req);
        return;
    };
    let done = guarded(|| {
        let ctx = context::init();
        upload::tex_image_2d(ctx, &RealBackend, &req)
    });
    if done.is_none() {
        RealBackend.tex_image_2d(&req);
    }
}

/// # Safety
/// Same contract as `glTexSubImage2D`.
#[allow(clippy::too_many_arguments)]
pub unsafe fn tex_sub_image_2d(
    target: GLenum,
    level: GLint,
    x_offset: GLint,
    y_offset: GLint,
    width: GLsizei,
    height: GLsizei,
    format: GLenum,
    ty: GLenum,
    data: *const c_void,
) {
    let req = TexSubImage {
        target,
        level,
        x_offset,
        y_offset,
        width,
        height,
        format,
        ty,
        data,
    };
    let Some(_guard) = HookGuard::enter() else {
        RealBackend.tex_sub_image_2d(&req);
        return;
    };
    let done = guarded(|| {
        let ctx = context::init();
        upload::tex_sub_image_2d(ctx, &RealBackend, &req)
    });
    if done.is_none() {
        RealBackend.tex_sub_image_2d(&req);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_hooks_forward() {
        unsafe {
            let p = malloc(32) as *mut u8;
            assert!(!p.is_null());
            p.write_bytes(1, 32);

            let p = realloc(p as *mut c_void, 4096) as *mut u8;
            assert!(!p.is_null());
            assert_eq!(*p.add(31), 1);
            free(p as *mut c_void);

            let z = calloc(16, 16) as *const u8;
            assert!(std::slice::from_raw_parts(z, 256).iter().all(|b| *b == 0));
            free(z as *mut c_void);

            free(ptr::null_mut());
        }
    }

    #[test]
    fn arena_blocks_move_to_the_heap_on_realloc() {
        unsafe {
            let old = bootstrap::alloc(8) as *mut u8;
            old.copy_from_nonoverlapping(b"arena!!\0".as_ptr(), 8);
            let new = realloc(old as *mut c_void, 64) as *mut u8;
            assert!(!bootstrap::contains(new as *const c_void));
            assert_eq!(std::slice::from_raw_parts(new, 8), b"arena!!\0");
            free(new as *mut c_void);
            // ignored
            free(old as *mut c_void);
        }
    }

    #[test]
    fn nested_calls_skip_bookkeeping() {
        let _guard = HookGuard::enter().unwrap();
        unsafe {
            let p = malloc(1 << 20);
            assert!(!p.is_null());
            free(p);
        }
    }
}
