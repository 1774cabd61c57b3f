//! Error types for the shared ring and record layout.
//!
//! Consumer and benchmark failures live next to the code that raises them
//! (`consumer::ConsumeError`, `bench::BenchError`) because they carry partial
//! results alongside the cause.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RingError>;

#[derive(Error, Debug)]
pub enum RingError {
    #[error("System call failed: {0}")]
    Sys(#[from] nix::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Insufficient space: record needs {needed} bytes, {free} bytes free")]
    InsufficientSpace { needed: usize, free: usize },

    #[error("Invalid record size: {0} bytes")]
    InvalidRecordSize(usize),

    #[error("Ring buffer already has a {role} attached")]
    AlreadyAttached { role: &'static str },
}

impl RingError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Backpressure rather than a broken ring.
    pub fn is_full(&self) -> bool {
        matches!(self, Self::InsufficientSpace { .. })
    }
}

/// Outcome of a blocking read that produced no record.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("deadline exceeded while waiting for data")]
    DeadlineExceeded,

    #[error("ring buffer closed")]
    Closed,

    #[error("ring buffer flushed")]
    Flushed,

    #[error("ring wait failed: {0}")]
    Sys(#[from] nix::Error),
}

impl ReadError {
    /// Closed and flushed signal a temporary condition, not producer termination.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Closed | Self::Flushed)
    }
}

/// A sample whose bytes cannot be viewed as the expected record.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    #[error("sample is {got} bytes, expected exactly {expected}")]
    SizeMismatch { got: usize, expected: usize },

    #[error("sample is not aligned to {align} bytes")]
    Misaligned { align: usize },
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::RingError::config(format!($($arg)*))
    };
}
