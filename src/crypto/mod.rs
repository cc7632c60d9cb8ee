//! Address derivation and seed-key handling for the TRON search.

mod address;
mod seed;

pub use address::{Address, TRON_VERSION_BYTE};
pub use seed::SeedKey;
