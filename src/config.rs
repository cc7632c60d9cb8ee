//! CLI configuration for the vanity address search.
//!
//! Field layout and short flags are carried over verbatim from
//! `original_source/profanity.cpp`'s `ArgParser` registrations, recast as a
//! `clap::Parser` struct.

use clap::Parser;

use crate::error::ConfigError;
use crate::mode::Mode;

/// GPU-accelerated TRON vanity address search.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Run the scoring benchmark (every candidate scores identically).
    #[arg(short = '0', long)]
    pub benchmark: bool,

    /// Seed public key, 128 hex characters (X||Y, no 0x04 tag). A fresh
    /// key pair is generated if omitted.
    #[arg(short = 'z', long = "publicKey")]
    pub public_key: Option<String>,

    /// Score runs of repeated trailing characters.
    #[arg(short = 'R', long = "tron-repeat")]
    pub tron_repeat: bool,

    /// Score monotonic (ascending/descending) trailing runs.
    #[arg(short = 'S', long = "tron-sequential")]
    pub tron_sequential: bool,

    /// Score a comma-separated list of suffix patterns.
    #[arg(short = 'T', long = "tron-suffix")]
    pub tron_suffix: Option<String>,

    /// Score addresses matching a "lucky number" suffix shape.
    #[arg(short = 'L', long = "tron-lucky")]
    pub tron_lucky: bool,

    /// Device index to skip (repeatable).
    #[arg(short = 's', long = "skip")]
    pub skip: Vec<usize>,

    /// Don't read or write the compiled-kernel binary cache.
    #[arg(short = 'n', long = "no-cache")]
    pub no_cache: bool,

    /// Local work size (work-items per work-group).
    #[arg(short = 'w', long = "work", default_value_t = 64)]
    pub worksize_local: usize,

    /// Global work size; 0 derives it from inverse-size * inverse-multiple.
    #[arg(short = 'W', long = "work-max", default_value_t = 0)]
    pub worksize_max: usize,

    /// Batch size of the modular-inversion table.
    #[arg(short = 'i', long = "inverse-size", default_value_t = 255)]
    pub inverse_size: usize,

    /// Number of inversion batches resident per device at once.
    #[arg(short = 'I', long = "inverse-multiple", default_value_t = 16384)]
    pub inverse_multiple: usize,
}

impl Config {
    /// Resolves the mutually-exclusive mode flags into one [`Mode`].
    ///
    /// Mirrors `profanity.cpp`'s `if`/`else if` mode-selection chain, but
    /// rejects more than one mode flag being set instead of silently
    /// taking the first match.
    pub fn resolve_mode(&self) -> Result<Mode, ConfigError> {
        let selected: Vec<&str> = [
            (self.benchmark, "benchmark"),
            (self.tron_repeat, "tron-repeat"),
            (self.tron_sequential, "tron-sequential"),
            (self.tron_suffix.is_some(), "tron-suffix"),
            (self.tron_lucky, "tron-lucky"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();

        match selected.as_slice() {
            [] => Err(ConfigError::NoMode),
            ["benchmark"] => Ok(Mode::benchmark()),
            ["tron-repeat"] => Ok(Mode::tron_repeat()),
            ["tron-sequential"] => Ok(Mode::tron_sequential()),
            ["tron-suffix"] => Ok(Mode::tron_suffix(self.tron_suffix.as_deref().unwrap_or(""))),
            ["tron-lucky"] => Ok(Mode::tron_lucky()),
            _ => Err(ConfigError::ConflictingModes(selected.join(", "))),
        }
    }

    /// The global work size passed to the score kernel's `enqueue_nd_range`.
    pub fn global_work_size(&self) -> usize {
        if self.worksize_max == 0 {
            self.inverse_size * self.inverse_multiple
        } else {
            self.worksize_max
        }
    }

    /// Validates numeric arguments that clap's type system can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve_mode()?;

        if self.inverse_size == 0 {
            return Err(ConfigError::InvalidParameter(
                "inverse-size must be greater than zero".into(),
            ));
        }
        if self.inverse_multiple == 0 {
            return Err(ConfigError::InvalidParameter(
                "inverse-multiple must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            benchmark: false,
            public_key: None,
            tron_repeat: false,
            tron_sequential: false,
            tron_suffix: None,
            tron_lucky: false,
            skip: Vec::new(),
            no_cache: false,
            worksize_local: 64,
            worksize_max: 0,
            inverse_size: 255,
            inverse_multiple: 16384,
        }
    }

    #[test]
    fn no_mode_flag_is_an_error() {
        assert!(matches!(base_config().resolve_mode(), Err(ConfigError::NoMode)));
    }

    #[test]
    fn single_mode_flag_resolves() {
        let mut config = base_config();
        config.tron_lucky = true;
        assert!(config.resolve_mode().is_ok());
    }

    #[test]
    fn two_mode_flags_conflict() {
        let mut config = base_config();
        config.tron_repeat = true;
        config.tron_sequential = true;
        assert!(matches!(
            config.resolve_mode(),
            Err(ConfigError::ConflictingModes(_))
        ));
    }

    #[test]
    fn work_max_zero_derives_from_inverse_settings() {
        let mut config = base_config();
        config.inverse_size = 255;
        config.inverse_multiple = 16384;
        config.worksize_max = 0;
        assert_eq!(config.global_work_size(), 255 * 16384);
    }

    #[test]
    fn explicit_work_max_wins() {
        let mut config = base_config();
        config.worksize_max = 1_000_000;
        assert_eq!(config.global_work_size(), 1_000_000);
    }
}
