//! Scoring-mode descriptors.
//!
//! Grounded on `original_source/Mode.cpp`: each factory builds an immutable
//! [`Mode`] carrying up to two 20-byte operand buffers and the identifier of
//! the GPU kernel that evaluates it. Where the C++ original threw a bare
//! string literal (`throw "No kernel for target"`) or indexed into
//! `cl_uchar data1[20]` without a bounds check, this version uses a closed
//! [`ScoreKernel`] enum and bounds-checked writes instead.

use crate::error::ConfigError;

/// Closed set of GPU scoring kernels a [`Mode`] can select.
///
/// Replaces the original's by-name kernel dispatch (`r.kernel = "profanity_score_range"`)
/// with a mapping resolved once at dispatcher init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKernel {
    Benchmark,
    Range,
    Leading,
    LeadingRange,
    Matching,
    ZeroBytes,
    Mirror,
    Doubles,
    TronRepeat,
    TronSequential,
    TronSuffix,
    TronLucky,
}

impl ScoreKernel {
    /// The GPU kernel function name this variant resolves to.
    pub fn kernel_name(self) -> &'static str {
        match self {
            ScoreKernel::Benchmark => "profanity_score_benchmark",
            ScoreKernel::Range => "profanity_score_range",
            ScoreKernel::Leading => "profanity_score_leading",
            ScoreKernel::LeadingRange => "profanity_score_leadingrange",
            ScoreKernel::Matching => "profanity_score_matching",
            ScoreKernel::ZeroBytes => "profanity_score_zerobytes",
            ScoreKernel::Mirror => "profanity_score_mirror",
            ScoreKernel::Doubles => "profanity_score_doubles",
            ScoreKernel::TronRepeat => "profanity_score_tron_repeat",
            ScoreKernel::TronSequential => "profanity_score_tron_sequential",
            ScoreKernel::TronSuffix => "profanity_score_tron_suffix",
            ScoreKernel::TronLucky => "profanity_score_tron_lucky",
        }
    }
}

/// What a candidate's hashed 20 bytes represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Address,
    Contract,
}

impl Target {
    /// The transform kernel to run before scoring, if any.
    pub fn transform_kernel_id(self) -> Option<&'static str> {
        match self {
            Target::Address => None,
            Target::Contract => Some("profanity_transform_contract"),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Target::Address => "Address",
            Target::Contract => "Contract",
        }
    }
}

/// An immutable scoring-mode descriptor.
///
/// `data1`/`data2` are zero-initialized 20-byte operand buffers whose
/// meaning depends on `kernel` (see the individual factory docs below).
#[derive(Debug, Clone)]
pub struct Mode {
    pub name: String,
    pub kernel: ScoreKernel,
    pub data1: [u8; 20],
    pub data2: [u8; 20],
    pub target: Target,
}

impl Mode {
    fn blank(name: &str, kernel: ScoreKernel) -> Self {
        Self {
            name: name.to_string(),
            kernel,
            data1: [0u8; 20],
            data2: [0u8; 20],
            target: Target::Address,
        }
    }

    /// Returns this mode with a different target (address vs. contract).
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Scores every candidate identically; used for throughput measurement.
    pub fn benchmark() -> Self {
        Self::blank("benchmark", ScoreKernel::Benchmark)
    }

    /// Alias for `range(0, 0)`: scores leading zero nibbles.
    pub fn zeros() -> Self {
        let mut r = Self::range(0, 0);
        r.name = "zeros".to_string();
        r
    }

    /// Scores consecutive leading nibbles whose value lies in `[min, max]`.
    pub fn range(min: u8, max: u8) -> Self {
        let mut r = Self::blank("range", ScoreKernel::Range);
        r.data1[0] = min;
        r.data2[0] = max;
        r
    }

    /// Same operand encoding as `range`, different (non-leading-contiguous) kernel.
    pub fn leading_range(min: u8, max: u8) -> Self {
        let mut r = Self::blank("leadingrange", ScoreKernel::LeadingRange);
        r.data1[0] = min;
        r.data2[0] = max;
        r
    }

    /// Scores consecutive leading nibbles equal to `c`. Errors on non-hex input.
    pub fn leading(c: char) -> Result<Self, ConfigError> {
        let mut r = Self::blank("leading", ScoreKernel::Leading);
        r.data1[0] = hex_value(c)?;
        Ok(r)
    }

    /// `range(10, 15)` renamed: scores runs of hex letters (a-f).
    pub fn letters() -> Self {
        let mut r = Self::range(10, 15);
        r.name = "letters".to_string();
        r
    }

    /// `range(0, 9)` renamed: scores runs of decimal digits.
    pub fn numbers() -> Self {
        let mut r = Self::range(0, 9);
        r.name = "numbers".to_string();
        r
    }

    /// Matches a (possibly partial) hex pattern against the address nibble
    /// by nibble. Unknown characters become wildcards rather than errors
    /// (`hexValueNoException` in the original).
    pub fn matching(hex: &str) -> Self {
        let mut r = Self::blank("matching", ScoreKernel::Matching);

        let chars: Vec<char> = hex.chars().collect();
        let mut index = 0usize;
        let mut i = 0usize;
        while i < chars.len() && index < r.data1.len() {
            let hi = hex_value_no_exception(chars[i]);
            let lo = chars.get(i + 1).copied().and_then(hex_value_no_exception);

            let val_hi = hi.map(|v| v << 4).unwrap_or(0);
            let val_lo = lo.unwrap_or(0);
            let mask_hi: u8 = if hi.is_some() { 0xF0 } else { 0 };
            let mask_lo: u8 = if lo.is_some() { 0x0F } else { 0 };

            r.data1[index] = mask_hi | mask_lo;
            r.data2[index] = val_hi | val_lo;

            index += 1;
            i += 2;
        }

        r
    }

    pub fn zero_bytes() -> Self {
        Self::blank("zeroBytes", ScoreKernel::ZeroBytes)
    }

    pub fn mirror() -> Self {
        Self::blank("mirror", ScoreKernel::Mirror)
    }

    pub fn doubles() -> Self {
        Self::blank("doubles", ScoreKernel::Doubles)
    }

    /// TRON "repeated trailing chars" (豹子号-style) mode.
    pub fn tron_repeat() -> Self {
        Self::blank("tron-repeat", ScoreKernel::TronRepeat)
    }

    /// TRON "monotonic trailing run" (顺子号-style) mode.
    pub fn tron_sequential() -> Self {
        Self::blank("tron-sequential", ScoreKernel::TronSequential)
    }

    /// TRON "lucky number" suffix-shape mode.
    pub fn tron_lucky() -> Self {
        Self::blank("tron-lucky", ScoreKernel::TronLucky)
    }

    /// Parses `patterns` as comma-separated suffix patterns (`X` = wildcard,
    /// interpreted by the GPU kernel, not here) and packs them into
    /// `data1`, NUL-separated, in input order.
    ///
    /// `data2[0]` = total bytes written (including one separator per
    /// pattern, <= 20); `data2[1]` = number of patterns written.
    ///
    /// A pattern that does not fit whole in the remaining budget is
    /// discarded rather than truncated, and later, possibly shorter,
    /// patterns are still considered.
    pub fn tron_suffix(patterns: &str) -> Self {
        let mut r = Self::blank("tron-suffix", ScoreKernel::TronSuffix);

        let mut data_pos = 0usize;
        let mut pattern_count = 0usize;

        for pattern in patterns.split(',') {
            if pattern.is_empty() {
                continue;
            }
            let pattern_len = pattern.len();
            if data_pos + pattern_len + 1 > r.data1.len() {
                continue;
            }
            r.data1[data_pos..data_pos + pattern_len].copy_from_slice(pattern.as_bytes());
            data_pos += pattern_len;
            r.data1[data_pos] = 0;
            data_pos += 1;
            pattern_count += 1;
        }

        r.data2[0] = data_pos as u8;
        r.data2[1] = pattern_count as u8;
        r
    }
}

fn hex_value_no_exception(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    "0123456789abcdef".find(c).map(|i| i as u8)
}

fn hex_value(c: char) -> Result<u8, ConfigError> {
    hex_value_no_exception(c).ok_or(ConfigError::BadHexChar(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_encodes_min_max() {
        let m = Mode::range(5, 5);
        assert_eq!(m.data1[0], 5);
        assert_eq!(m.data2[0], 5);
        assert_eq!(m.kernel, ScoreKernel::Range);
    }

    #[test]
    fn zeros_is_range_0_0_renamed() {
        let m = Mode::zeros();
        assert_eq!(m.name, "zeros");
        assert_eq!(m.kernel, ScoreKernel::Range);
        assert_eq!(m.data1[0], 0);
        assert_eq!(m.data2[0], 0);
    }

    #[test]
    fn leading_rejects_bad_hex() {
        assert!(Mode::leading('G').is_err());
        assert!(Mode::leading('g').is_err());
        assert!(Mode::leading('f').is_ok());
    }

    #[test]
    fn matching_empty_is_all_wildcard() {
        let m = Mode::matching("");
        assert_eq!(m.data1, [0u8; 20]);
        assert_eq!(m.data2, [0u8; 20]);
    }

    #[test]
    fn matching_packs_nibbles_hi_first() {
        // "a1" -> byte0 = hi('a')<<4 | lo('1'), fully specified => mask 0xFF
        let m = Mode::matching("a1");
        assert_eq!(m.data1[0], 0xFF);
        assert_eq!(m.data2[0], 0xA1);
        // remaining nibbles are wildcards
        assert_eq!(m.data1[1], 0);
    }

    #[test]
    fn matching_unknown_char_is_wildcard_not_error() {
        // 'x' isn't hex: should become a wildcard nibble, not panic.
        let m = Mode::matching("x1");
        // hi is wildcard (mask 0), lo '1' is specified (mask 0x0F)
        assert_eq!(m.data1[0], 0x0F);
        assert_eq!(m.data2[0], 0x01);
    }

    #[test]
    fn matching_odd_length_last_nibble_wildcard() {
        let m = Mode::matching("a");
        assert_eq!(m.data1[0], 0xF0);
        assert_eq!(m.data2[0], 0xA0);
    }

    #[test]
    fn tron_suffix_empty_is_zeroed() {
        let m = Mode::tron_suffix("");
        assert_eq!(m.data2[0], 0);
        assert_eq!(m.data2[1], 0);
    }

    #[test]
    fn tron_suffix_packs_three_patterns_in_order() {
        let m = Mode::tron_suffix("aaa,bb,ccccc");
        assert_eq!(m.data2[1], 3);
        // 3 + 1 + 2 + 1 + 5 + 1 = 13
        assert_eq!(m.data2[0], 13);
        let tokens: Vec<&str> = m.data1[..13 as usize]
            .split(|&b| b == 0)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(tokens, vec!["aaa", "bb", "ccccc"]);
    }

    #[test]
    fn tron_suffix_skips_leading_commas_and_empty_patterns() {
        let m = Mode::tron_suffix(",,888,,999");
        assert_eq!(m.data2[1], 2);
    }

    #[test]
    fn tron_suffix_discards_oversized_pattern_without_truncating() {
        // 22 'a's: doesn't fit in 20 bytes even alone (22 + 1 > 20), discarded whole.
        let m = Mode::tron_suffix(&"a".repeat(22));
        assert_eq!(m.data2[0], 0);
        assert_eq!(m.data2[1], 0);
    }

    #[test]
    fn tron_suffix_still_packs_later_shorter_pattern_after_oversized_one() {
        // First pattern doesn't fit; a later, shorter one still should.
        let spec = format!("{},ok", "x".repeat(25));
        let m = Mode::tron_suffix(&spec);
        assert_eq!(m.data2[1], 1);
        assert_eq!(&m.data1[..2], b"ok");
    }

    #[test]
    fn target_address_has_no_transform_kernel() {
        assert_eq!(Target::Address.transform_kernel_id(), None);
        assert_eq!(
            Target::Contract.transform_kernel_id(),
            Some("profanity_transform_contract")
        );
    }
}
