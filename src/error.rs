//! Unified error taxonomy for the dispatcher.
//!
//! One type `main` can match once at the top level, the way
//! `profanity.cpp`'s `main()` catches `std::runtime_error` and everything
//! else at the outermost scope.

use thiserror::Error;

/// Top-level error returned by the dispatcher and its collaborators.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Configuration-time errors: bad CLI arguments, bad seed keys, bad mode
/// operands, device selection that leaves nothing to run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("seed public key must be 128 hex characters (got {0})")]
    BadKeyLength(usize),

    #[error("seed public key is not valid hex: {0}")]
    BadKeyHex(String),

    #[error("seed public key is not a point on the curve")]
    NotOnCurve,

    #[error("invalid hex character {0:?} in mode argument")]
    BadHexChar(char),

    #[error("unknown target {0:?}")]
    UnknownTarget(String),

    #[error("no GPU devices selected (all skipped or none found)")]
    NoDevices,

    #[error("no scoring mode selected")]
    NoMode,

    #[error("more than one scoring mode selected ({0})")]
    ConflictingModes(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// GPU-facing errors.
///
/// Variants carry the OpenCL status translated to a human-readable string
/// rather than the raw driver code, via the table in `device.rs`.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to enumerate OpenCL platforms/devices: {0}")]
    Enumeration(String),

    #[error("failed to create GPU context: {0}")]
    ContextCreation(String),

    #[error("failed to create program: {0}")]
    ProgramCreation(String),

    #[error("program build failed: {0}")]
    BuildFailed(String),

    #[error("kernel {name:?} launch failed: {reason}")]
    KernelLaunch { name: String, reason: String },

    #[error("buffer operation failed: {0}")]
    Buffer(String),
}

/// Cache-load failures are never fatal: callers log and fall back to
/// compiling from source. Kept as its own type so that fallback sites stay
/// honest about what they're swallowing.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file missing or unreadable: {0}")]
    Missing(String),

    #[error("failed to write cache file: {0}")]
    WriteFailed(String),
}
