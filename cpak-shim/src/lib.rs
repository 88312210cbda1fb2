//! Texture downscaling and allocation tracking for a host process, loaded with
//! `LD_PRELOAD`.
//!
//! The shim interposes `glTexImage2D`, `glTexSubImage2D` and the libc
//! allocator. Eligible RGBA uploads are resampled into scratch memory before
//! reaching the driver; with aggressive reclaim on, the host's source buffer
//! is released right after the upload. Configuration comes from `CPAK_*`
//! environment variables (see [`config`]).

#![allow(clippy::uninlined_format_args)]

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod gl;
pub mod guard;
pub mod hooks;
pub mod ledger;
pub mod stats;
pub mod symbols;
pub mod upload;

#[cfg(not(test))]
mod exports;

pub use config::ShimConfig;
pub use context::ShimContext;
pub use error::{Result, ShimError};
pub use ledger::BufferLedger;
