//! NRIC redaction for logs and UI
//!
//! A Singapore NRIC/FIN is nine characters (`S3000941Z`). Only the last five
//! are shown: `****0941Z`. Masking is character based, so non-ASCII input is
//! never split mid code point.

use tracing::warn;

/// Returned in place of a masked value when no identifier is available
pub const NRIC_PLACEHOLDER: &str = "XXXXXXXNRC";

/// Length of a well-formed NRIC
pub const NRIC_LENGTH: usize = 9;

/// Number of trailing NRIC characters left readable
pub const NRIC_VISIBLE_SUFFIX: usize = 5;

/// Default replacement character
pub const DEFAULT_MASK_CHAR: char = '*';

/// Masking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskOptions {
    /// Expected identifier length; longer input is truncated to it
    pub expected_length: usize,
    /// Number of trailing characters left unmasked
    pub visible_suffix_length: usize,
    /// Replacement character
    pub mask_char: char,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            expected_length: NRIC_LENGTH,
            visible_suffix_length: NRIC_VISIBLE_SUFFIX,
            mask_char: DEFAULT_MASK_CHAR,
        }
    }
}

/// Character positions to mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskRange {
    /// Every character
    All,
    /// Characters `start..=end` (0-based, inclusive); positions past the end are ignored
    Span {
        /// First masked position
        start: usize,
        /// Last masked position
        end: usize,
    },
}

/// Mask an NRIC with the default options
///
/// ```rust
/// use singpass_auth::mask_nric;
///
/// assert_eq!(mask_nric(Some("S3000941Z")), "****0941Z");
/// assert_eq!(mask_nric(None), "XXXXXXXNRC");
/// ```
pub fn mask_nric(value: Option<&str>) -> String {
    mask_identifier(value, MaskOptions::default())
}

/// Mask an identifier, leaving only its trailing `visible_suffix_length` characters
///
/// `None` yields [`NRIC_PLACEHOLDER`]. Input whose length differs from
/// `expected_length` is logged and truncated to `expected_length` before
/// masking; this is not an error.
pub fn mask_identifier(value: Option<&str>, options: MaskOptions) -> String {
    let Some(value) = value else {
        warn!("No identifier provided, returning placeholder");
        return NRIC_PLACEHOLDER.to_string();
    };

    let length = value.chars().count();
    let normalized: String = if length == options.expected_length {
        value.to_string()
    } else {
        warn!(
            length,
            expected = options.expected_length,
            "Identifier length is abnormal, truncating"
        );
        value.chars().take(options.expected_length).collect()
    };

    let masked_count = options
        .expected_length
        .saturating_sub(options.visible_suffix_length);
    if masked_count == 0 {
        return normalized;
    }

    mask_chars(
        &normalized,
        MaskRange::Span {
            start: 0,
            end: masked_count - 1,
        },
        options.mask_char,
    )
}

/// Replace the characters selected by `range` with `mask`
pub fn mask_chars(input: &str, range: MaskRange, mask: char) -> String {
    match range {
        MaskRange::All => input.chars().map(|_| mask).collect(),
        MaskRange::Span { start, end } => input
            .chars()
            .enumerate()
            .map(|(i, c)| if (start..=end).contains(&i) { mask } else { c })
            .collect(),
    }
}
