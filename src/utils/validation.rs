//! Centralized validation and helper functions.

use crate::core::types::Indexing;

/// Maximum number of bases a single range query may cover (DOS protection)
pub const MAX_QUERY_BASES: u64 = 1_000_000;

/// Maximum number of bases requested on each side of a target base
pub const MAX_NUMBER_AROUND: u64 = 100_000;

/// Maximum number of samples in a call set (DOS protection)
pub const MAX_SAMPLES: usize = 100_000;

/// Validate that a string is a valid MD5 checksum (32 hex characters).
///
/// # Examples
///
/// ```
/// use tile_library::utils::validation::is_valid_md5;
///
/// assert!(is_valid_md5("6aef897c3d6ff0c78aff06ac189178dd"));
/// assert!(!is_valid_md5("not-an-md5"));
/// assert!(!is_valid_md5("6aef897c3d6ff0c78aff06ac189178d")); // 31 chars
/// ```
#[must_use]
pub fn is_valid_md5(s: &str) -> bool {
    s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Normalize an MD5 string to lowercase.
/// Returns None if the input is not a valid MD5.
#[must_use]
pub fn normalize_md5(s: &str) -> Option<String> {
    if is_valid_md5(s) {
        Some(s.to_lowercase())
    } else {
        None
    }
}

/// Lowercase hex MD5 of a base sequence
#[must_use]
pub fn compute_md5(sequence: &str) -> String {
    format!("{:x}", md5::compute(sequence.as_bytes()))
}

/// Whether a sequence only holds nucleotide letters (IUPAC codes allowed)
#[must_use]
pub fn is_valid_sequence(sequence: &str) -> bool {
    sequence
        .bytes()
        .all(|b| b"ACGTNRYKMSWBDHVacgtnrykmswbdhv".contains(&b))
}

/// Range validation failures, all caused by client input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Empty range: low base {low} must be below high base {high}")]
    Empty { low: u64, high: u64 },
    #[error("Base 0 is not valid with 1-based indexing")]
    ZeroWithOneBasedIndexing,
    #[error("Range of {0} bases exceeds the maximum of {MAX_QUERY_BASES}")]
    TooLarge(u64),
    #[error("Number of bases around the target ({0}) exceeds the maximum of {MAX_NUMBER_AROUND}")]
    TooManyAround(u64),
}

/// Convert a user-supplied base to the internal 0-based convention
///
/// # Errors
///
/// Returns `RangeError::ZeroWithOneBasedIndexing` for base 0 in 1-based input.
pub fn to_zero_based(base: u64, indexing: Indexing) -> Result<u64, RangeError> {
    match indexing {
        Indexing::Zero => Ok(base),
        Indexing::One => base
            .checked_sub(1)
            .ok_or(RangeError::ZeroWithOneBasedIndexing),
    }
}

/// Convert a user-supplied range to 0-based half-open `[low, high)`
///
/// 1-based ranges are inclusive at both ends, so only `low` moves.
///
/// # Errors
///
/// Returns `RangeError::ZeroWithOneBasedIndexing` for base 0 in 1-based input.
pub fn to_half_open(low: u64, high: u64, indexing: Indexing) -> Result<(u64, u64), RangeError> {
    Ok((to_zero_based(low, indexing)?, high))
}

/// Check a 0-based half-open range before resolving it
///
/// # Errors
///
/// Returns `RangeError::Empty` if `low >= high`, or `RangeError::TooLarge`
/// if the range exceeds [`MAX_QUERY_BASES`].
pub fn validate_range(low: u64, high: u64) -> Result<(), RangeError> {
    if low >= high {
        return Err(RangeError::Empty { low, high });
    }
    if high - low > MAX_QUERY_BASES {
        return Err(RangeError::TooLarge(high - low));
    }
    Ok(())
}

/// Check the margin of an around-target query
///
/// # Errors
///
/// Returns `RangeError::TooManyAround` if `number_around` exceeds [`MAX_NUMBER_AROUND`].
pub fn validate_number_around(number_around: u64) -> Result<(), RangeError> {
    if number_around > MAX_NUMBER_AROUND {
        return Err(RangeError::TooManyAround(number_around));
    }
    Ok(())
}
