use thiserror::Error;

/// Failures inside the shim. None of these ever reach the host: each one turns
/// into a passthrough, a skipped bookkeeping step, or a counter bump.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShimError {
    #[error("could not resolve the next definition of {symbol}")]
    Resolution { symbol: &'static str },

    #[error("buffer ledger is full ({capacity} entries)")]
    Capacity { capacity: usize },

    #[error("could not allocate {bytes} bytes of scratch")]
    Scratch { bytes: usize },
}

pub type Result<T> = std::result::Result<T, ShimError>;
