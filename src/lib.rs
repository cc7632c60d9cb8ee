//! # tron_vanity
//!
//! GPU-accelerated vanity address search for TRON, built on top of
//! `opencl3`, `secp256k1`, and `crossbeam-channel`.
//!
//! ## Architecture
//!
//! - `mode`: scoring predicate descriptors (what makes an address "good")
//! - `crypto`: seed key handling and TRON address derivation
//! - `device`: per-GPU OpenCL state (buffers, kernels)
//! - `round`: the per-device round pipeline
//! - `aggregator`: cross-device best-score tracking and hit publishing
//! - `cache`: compiled-kernel binary cache
//! - `dispatcher`: ties the above together into one running search
//! - `config`: CLI surface
//! - `error`: the error taxonomy shared by every module above

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod mode;
pub mod round;

pub use aggregator::{Hit, ResultAggregator};
pub use config::Config;
pub use crypto::{Address, SeedKey};
pub use dispatcher::{Dispatcher, KernelSources};
pub use error::{CacheError, ConfigError, CoreError, GpuError};
pub use mode::{Mode, ScoreKernel, Target};
