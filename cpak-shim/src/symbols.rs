//! Lazily resolved pointers to the next definition of every hooked symbol.

use std::cell::Cell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, Ordering};
use std::sync::Mutex;

use libc::{c_char, size_t};

use crate::error::{Result, ShimError};
use crate::gl::{GLenum, GLint, GLsizei};

thread_local! {
    static RESOLVING: Cell<bool> = const { Cell::new(false) };
}

static RESOLVE_LOCK: Mutex<()> = Mutex::new(());

/// Whether this thread is inside `dlsym`. Allocations made from there must not
/// wait on the real allocator.
pub fn resolving() -> bool {
    RESOLVING.try_with(Cell::get).unwrap_or(false)
}

pub struct RealFn {
    name: &'static str,
    // nul-terminated copy of `name`
    cname: &'static [u8],
    addr: AtomicPtr<c_void>,
    // dlsym came back empty; never asked again
    missing: AtomicBool,
    reported: AtomicBool,
    lookups: AtomicU32,
}

impl RealFn {
    pub const fn new(name: &'static str, cname: &'static [u8]) -> Self {
        Self {
            name,
            cname,
            addr: AtomicPtr::new(std::ptr::null_mut()),
            missing: AtomicBool::new(false),
            reported: AtomicBool::new(false),
            lookups: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Times `dlsym` was actually called for this symbol.
    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// True for the first caller only, so a missing symbol is logged once.
    pub fn first_report(&self) -> bool {
        !self.reported.swap(true, Ordering::Relaxed)
    }

    fn cached(&self) -> Option<Result<*mut c_void>> {
        let addr = self.addr.load(Ordering::Acquire);
        if !addr.is_null() {
            return Some(Ok(addr));
        }
        if self.missing.load(Ordering::Acquire) {
            return Some(Err(ShimError::Resolution { symbol: self.name }));
        }
        None
    }

    /// Address of the real implementation, resolved once and cached. A failed
    /// lookup is cached too.
    pub fn get(&self) -> Result<*mut c_void> {
        match self.cached() {
            Some(result) => result,
            None => self.resolve(),
        }
    }

    #[cold]
    fn resolve(&self) -> Result<*mut c_void> {
        let _lock = RESOLVE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(result) = self.cached() {
            return result;
        }

        RESOLVING.with(|r| r.set(true));
        // SAFETY: cname is nul-terminated
        let addr = unsafe { libc::dlsym(libc::RTLD_NEXT, self.cname.as_ptr() as *const c_char) };
        RESOLVING.with(|r| r.set(false));
        self.lookups.fetch_add(1, Ordering::Relaxed);

        if addr.is_null() {
            self.missing.store(true, Ordering::Release);
            return Err(ShimError::Resolution { symbol: self.name });
        }
        self.addr.store(addr, Ordering::Release);
        Ok(addr)
    }
}

macro_rules! real_fn {
    ($static:ident, $name:literal) => {
        pub static $static: RealFn = RealFn::new($name, concat!($name, "\0").as_bytes());
    };
}

real_fn!(MALLOC, "malloc");
real_fn!(CALLOC, "calloc");
real_fn!(REALLOC, "realloc");
real_fn!(FREE, "free");
real_fn!(GL_TEX_IMAGE_2D, "glTexImage2D");
real_fn!(GL_TEX_SUB_IMAGE_2D, "glTexSubImage2D");

pub type MallocFn = unsafe extern "C" fn(size_t) -> *mut c_void;
pub type CallocFn = unsafe extern "C" fn(size_t, size_t) -> *mut c_void;
pub type ReallocFn = unsafe extern "C" fn(*mut c_void, size_t) -> *mut c_void;
pub type FreeFn = unsafe extern "C" fn(*mut c_void);
pub type TexImage2DFn = unsafe extern "C" fn(
    GLenum,
    GLint,
    GLint,
    GLsizei,
    GLsizei,
    GLint,
    GLenum,
    GLenum,
    *const c_void,
);
pub type TexSubImage2DFn = unsafe extern "C" fn(
    GLenum,
    GLint,
    GLint,
    GLint,
    GLsizei,
    GLsizei,
    GLenum,
    GLenum,
    *const c_void,
);

/// Typed accessors. The allocator ones return `None` while this thread is
/// resolving, so the caller falls back to the bootstrap arena instead of
/// recursing into `dlsym`.
macro_rules! typed {
    ($fn_name:ident, $static:ident, $ty:ty, allocator) => {
        pub fn $fn_name() -> Option<$ty> {
            if resolving() {
                return None;
            }
            typed!(@get $static, $ty)
        }
    };
    ($fn_name:ident, $static:ident, $ty:ty) => {
        pub fn $fn_name() -> Option<$ty> {
            typed!(@get $static, $ty)
        }
    };
    (@get $static:ident, $ty:ty) => {
        match $static.get() {
            // SAFETY: the address came from dlsym for a symbol with this signature
            Ok(addr) => Some(unsafe { std::mem::transmute::<*mut c_void, $ty>(addr) }),
            Err(_) => None,
        }
    };
}

typed!(malloc, MALLOC, MallocFn, allocator);
typed!(calloc, CALLOC, CallocFn, allocator);
typed!(realloc, REALLOC, ReallocFn, allocator);
typed!(free, FREE, FreeFn, allocator);
typed!(tex_image_2d, GL_TEX_IMAGE_2D, TexImage2DFn);
typed!(tex_sub_image_2d, GL_TEX_SUB_IMAGE_2D, TexSubImage2DFn);
