//! The C symbols the dynamic linker interposes. Compiled out of unit tests so
//! the test binary keeps its own allocator.

use std::ffi::c_void;

use libc::size_t;

use crate::context;
use crate::gl::{GLenum, GLint, GLsizei};
use crate::guard::HookGuard;
use crate::hooks;

#[no_mangle]
pub unsafe extern "C" fn malloc(size: size_t) -> *mut c_void {
    hooks::malloc(size)
}

#[no_mangle]
pub unsafe extern "C" fn calloc(count: size_t, size: size_t) -> *mut c_void {
    hooks::calloc(count, size)
}

#[no_mangle]
pub unsafe extern "C" fn realloc(p: *mut c_void, size: size_t) -> *mut c_void {
    hooks::realloc(p, size)
}

#[no_mangle]
pub unsafe extern "C" fn free(p: *mut c_void) {
    hooks::free(p)
}

#[no_mangle]
#[allow(non_snake_case, clippy::too_many_arguments)]
pub unsafe extern "C" fn glTexImage2D(
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
    hooks::tex_image_2d(
        target,
        level,
        internal_format,
        width,
        height,
        border,
        format,
        ty,
        data,
    )
}

#[no_mangle]
#[allow(non_snake_case, clippy::too_many_arguments)]
pub unsafe extern "C" fn glTexSubImage2D(
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
    hooks::tex_sub_image_2d(target, level, x_offset, y_offset, width, height, format, ty, data)
}

/// Initialize eagerly instead of on the first hooked call.
#[no_mangle]
pub extern "C" fn cpak_shim_init() {
    if let Some(_guard) = HookGuard::enter() {
        let _ = std::panic::catch_unwind(|| {
            context::init();
        });
    }
}

/// Print the session summary now. Later calls, including the exit handler, do nothing.
#[no_mangle]
pub extern "C" fn cpak_shim_shutdown() {
    if let Some(_guard) = HookGuard::enter() {
        let _ = std::panic::catch_unwind(context::shutdown);
    }
}
