//! Per-upload decisions for intercepted texture calls.
//!
//! Every call moves through the same states: it arrives unseen, [`evaluate`]
//! turns it into a [`Verdict`], and execution ends in an [`UploadOutcome`]
//! (scaled or passed through). Execution is written against
//! [`UploadBackend`] so the real GL entry points and allocator can be swapped
//! out.

use std::ffi::c_void;
use std::fmt;

use cpak_core::resample::{is_downscale, resample_into, scaled_dims};

use crate::config::ShimConfig;
use crate::context::ShimContext;
use crate::error::{Result, ShimError};
use crate::gl::{GLenum, GLint, GLsizei, GL_RGBA, GL_TEXTURE_2D, GL_UNSIGNED_BYTE};
use crate::stats::Stats;

const BPP: usize = 4;

/// Arguments of one `glTexImage2D` call.
#[derive(Debug, Clone, Copy)]
pub struct TexImage {
    pub target: GLenum,
    pub level: GLint,
    pub internal_format: GLint,
    pub width: GLsizei,
    pub height: GLsizei,
    pub border: GLint,
    pub format: GLenum,
    pub ty: GLenum,
    pub data: *const c_void,
}

/// Arguments of one `glTexSubImage2D` call.
#[derive(Debug, Clone, Copy)]
pub struct TexSubImage {
    pub target: GLenum,
    pub level: GLint,
    pub x_offset: GLint,
    pub y_offset: GLint,
    pub width: GLsizei,
    pub height: GLsizei,
    pub format: GLenum,
    pub ty: GLenum,
    pub data: *const c_void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    Disabled,
    NotTexture2D,
    MipLevel,
    NotRgba8,
    NullData,
    TooSmall,
    NoReduction,
    ScratchUnavailable,
}

impl fmt::Display for PassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PassReason::Disabled => "shim disabled",
            PassReason::NotTexture2D => "not GL_TEXTURE_2D",
            PassReason::MipLevel => "mip level above 0",
            PassReason::NotRgba8 => "not RGBA/UNSIGNED_BYTE",
            PassReason::NullData => "no client data",
            PassReason::TooSmall => "below minimum size",
            PassReason::NoReduction => "scaling would not shrink it",
            PassReason::ScratchUnavailable => "no scratch memory",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Scale { width: u32, height: u32 },
    PassThrough(PassReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Scaled { from: (u32, u32), to: (u32, u32) },
    PassedThrough(PassReason),
}

/// The real functions an upload ends up calling.
pub trait UploadBackend {
    fn alloc(&self, bytes: usize) -> *mut u8;
    fn dealloc(&self, ptr: *mut c_void);
    fn tex_image_2d(&self, req: &TexImage);
    fn tex_sub_image_2d(&self, req: &TexSubImage);
}

/// Checks shared by full and partial uploads.
#[allow(clippy::too_many_arguments)]
fn eligible(
    config: &ShimConfig,
    target: GLenum,
    level: GLint,
    format: GLenum,
    ty: GLenum,
    data: *const c_void,
    width: GLsizei,
    height: GLsizei,
) -> std::result::Result<(u32, u32), PassReason> {
    if config.disabled {
        return Err(PassReason::Disabled);
    }
    if target != GL_TEXTURE_2D {
        return Err(PassReason::NotTexture2D);
    }
    if level != 0 {
        return Err(PassReason::MipLevel);
    }
    if format != GL_RGBA || ty != GL_UNSIGNED_BYTE {
        return Err(PassReason::NotRgba8);
    }
    if data.is_null() {
        return Err(PassReason::NullData);
    }
    let min = config.min_size as i64;
    if (width as i64) < min || (height as i64) < min {
        return Err(PassReason::TooSmall);
    }
    Ok((width as u32, height as u32))
}

pub fn evaluate(req: &TexImage, config: &ShimConfig) -> Verdict {
    let (w, h) = match eligible(
        config, req.target, req.level, req.format, req.ty, req.data, req.width, req.height,
    ) {
        Ok(dims) => dims,
        Err(reason) => return Verdict::PassThrough(reason),
    };
    let (width, height) = scaled_dims(w, h, config.scale);
    if !is_downscale(w, h, width, height) {
        return Verdict::PassThrough(PassReason::NoReduction);
    }
    Verdict::Scale { width, height }
}

/// Sub-region updates use the same checks and factor; offsets scale too.
pub fn evaluate_sub(req: &TexSubImage, config: &ShimConfig) -> std::result::Result<TexSubImage, PassReason> {
    let (w, h) = eligible(
        config, req.target, req.level, req.format, req.ty, req.data, req.width, req.height,
    )?;
    let scale = |v: GLint| (v as f32 * config.scale).floor() as GLint;
    let width = scale(w as GLint).max(1);
    let height = scale(h as GLint).max(1);
    if !is_downscale(w, h, width as u32, height as u32) {
        return Err(PassReason::NoReduction);
    }
    Ok(TexSubImage {
        x_offset: scale(req.x_offset),
        y_offset: scale(req.y_offset),
        width,
        height,
        ..*req
    })
}

fn byte_len(width: GLsizei, height: GLsizei) -> u64 {
    width.max(0) as u64 * height.max(0) as u64 * BPP as u64
}

/// Resample `src` into scratch from the real allocator and hand it to `upload`.
///
/// # Safety
/// `src` must point to `w * h * 4` readable bytes.
unsafe fn with_scaled<B: UploadBackend>(
    backend: &B,
    config: &ShimConfig,
    src: *const c_void,
    (w, h): (u32, u32),
    (dw, dh): (u32, u32),
    upload: impl FnOnce(*const c_void),
) -> Result<()> {
    let bytes = dw as usize * dh as usize * BPP;
    let scratch = backend.alloc(bytes);
    if scratch.is_null() {
        return Err(ShimError::Scratch { bytes });
    }

    let src = std::slice::from_raw_parts(src as *const u8, w as usize * h as usize * BPP);
    let dst = std::slice::from_raw_parts_mut(scratch, bytes);
    resample_into(src, w, h, dst, dw, dh, config.filter);

    upload(scratch as *const c_void);
    backend.dealloc(scratch as *mut c_void);
    Ok(())
}

/// Hand a tracked source buffer back to the allocator once GL has copied it.
fn reclaim<B: UploadBackend>(ctx: &ShimContext, backend: &B, data: *const c_void) {
    if !ctx.config.aggressive_free || ctx.config.disabled || data.is_null() {
        return;
    }
    if let Some(size) = ctx.ledger.reclaim(data as usize) {
        backend.dealloc(data as *mut c_void);
        Stats::add(&ctx.stats.buffers_reclaimed, 1);
        Stats::add(&ctx.stats.reclaimed_bytes, size as u64);
        if ctx.config.verbose {
            log::debug!("reclaimed source buffer {:p} ({:.1} KiB)", data, size as f64 / 1024.0);
        }
    }
}

/// Run one `glTexImage2D` through the shim.
///
/// # Safety
/// `req.data` must be null or point to the pixel data GL would read for `req`.
pub unsafe fn tex_image_2d<B: UploadBackend>(
    ctx: &ShimContext,
    backend: &B,
    req: &TexImage,
) -> UploadOutcome {
    Stats::add(&ctx.stats.textures_seen, 1);
    let original = byte_len(req.width, req.height);
    Stats::add(&ctx.stats.original_bytes, original);

    let outcome = match evaluate(req, &ctx.config) {
        Verdict::Scale { width, height } => {
            let from = (req.width as u32, req.height as u32);
            let scaled = with_scaled(backend, &ctx.config, req.data, from, (width, height), |data| {
                backend.tex_image_2d(&TexImage {
                    width: width as GLsizei,
                    height: height as GLsizei,
                    data,
                    ..*req
                })
            });
            match scaled {
                Ok(()) => UploadOutcome::Scaled {
                    from,
                    to: (width, height),
                },
                Err(e) => {
                    log::debug!("{}, uploading unscaled", e);
                    Stats::add(&ctx.stats.scratch_failures, 1);
                    backend.tex_image_2d(req);
                    UploadOutcome::PassedThrough(PassReason::ScratchUnavailable)
                }
            }
        }
        Verdict::PassThrough(reason) => {
            backend.tex_image_2d(req);
            UploadOutcome::PassedThrough(reason)
        }
    };

    match outcome {
        UploadOutcome::Scaled { from, to } => {
            let uploaded = byte_len(to.0 as GLsizei, to.1 as GLsizei);
            Stats::add(&ctx.stats.uploaded_bytes, uploaded);
            let n = Stats::add(&ctx.stats.textures_scaled, 1);
            let saved_kib = (original - uploaded) as f64 / 1024.0;
            if n <= 5 {
                log::info!("scaled {}x{} -> {}x{} (saved {:.1} KiB)", from.0, from.1, to.0, to.1, saved_kib);
            } else if ctx.config.verbose {
                log::debug!("scaled {}x{} -> {}x{} (saved {:.1} KiB)", from.0, from.1, to.0, to.1, saved_kib);
            } else if n % 500 == 0 {
                log::info!("{} textures scaled so far", n);
            }
        }
        UploadOutcome::PassedThrough(reason) => {
            Stats::add(&ctx.stats.uploaded_bytes, original);
            if ctx.config.verbose {
                log::debug!(
                    "passed {}x{} format {:#06x} type {:#06x} level {} through: {}",
                    req.width,
                    req.height,
                    req.format,
                    req.ty,
                    req.level,
                    reason
                );
            }
        }
    }

    reclaim(ctx, backend, req.data);
    outcome
}

/// Run one `glTexSubImage2D` through the shim.
///
/// # Safety
/// Same contract as [`tex_image_2d`].
pub unsafe fn tex_sub_image_2d<B: UploadBackend>(
    ctx: &ShimContext,
    backend: &B,
    req: &TexSubImage,
) -> UploadOutcome {
    let scaled_req = match evaluate_sub(req, &ctx.config) {
        Ok(scaled) => scaled,
        Err(reason) => {
            if ctx.config.verbose {
                log::debug!(
                    "passed sub-update {}x{} at ({}, {}) format {:#06x} through: {}",
                    req.width,
                    req.height,
                    req.x_offset,
                    req.y_offset,
                    req.format,
                    reason
                );
            }
            backend.tex_sub_image_2d(req);
            return UploadOutcome::PassedThrough(reason);
        }
    };

    let from = (req.width as u32, req.height as u32);
    let to = (scaled_req.width as u32, scaled_req.height as u32);
    let result = with_scaled(backend, &ctx.config, req.data, from, to, |data| {
        backend.tex_sub_image_2d(&TexSubImage { data, ..scaled_req })
    });
    match result {
        Ok(()) => {
            Stats::add(&ctx.stats.sub_updates_scaled, 1);
            UploadOutcome::Scaled { from, to }
        }
        Err(e) => {
            log::debug!("{}, updating unscaled", e);
            Stats::add(&ctx.stats.scratch_failures, 1);
            backend.tex_sub_image_2d(req);
            UploadOutcome::PassedThrough(PassReason::ScratchUnavailable)
        }
    }
}
