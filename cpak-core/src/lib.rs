//! Reading, editing and rebuilding packed asset containers.
//!
//! This covers the container index, the compressed image record codec, the
//! repacker, and the RGBA resampler shared with the texture interception shim.

#![allow(clippy::uninlined_format_args)]

pub mod error;
pub mod format;
pub mod resample;

pub use error::{FormatError, Result};
