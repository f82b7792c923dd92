//! Weighted per-value checksum used by the measurement devices.
//!
//! Every character contributes `code_point * ((index % 5) + 1)`. Code points
//! above 127 are first shifted by the distance between Latin `A` (65) and
//! the capital Alpha of the device codepage (193), so that Greek letters
//! decoded from the device file land on the values the device used.

use crate::error::{Result, SealwatchError};

/// Code point of the capital Alpha in the single-byte device codepage.
const CODEPAGE_ALPHA: i32 = 193;

/// Renormalization offset subtracted from code points above 127.
const HIGH_CODE_POINT_OFFSET: i32 = 'A' as i32 - CODEPAGE_ALPHA;

/// Number of distinct positional weights (`1..=5`).
const WEIGHT_CYCLE: usize = 5;

fn normalize(ch: char) -> i32 {
    let code_point = ch as i32;
    if code_point > 127 {
        code_point - HIGH_CODE_POINT_OFFSET
    } else {
        code_point
    }
}

fn weight(index: usize) -> i32 {
    (index % WEIGHT_CYCLE) as i32 + 1
}

/// Compute the checksum of `value`, refusing sums that overflow.
///
/// # Errors
///
/// Returns [`SealwatchError::ChecksumUnavailable`] when the weighted sum does
/// not fit in 32 bits.
pub fn try_checksum(value: &str) -> Result<String> {
    let mut sum: i32 = 0;
    for (index, ch) in value.chars().enumerate() {
        sum = normalize(ch)
            .checked_mul(weight(index))
            .and_then(|term| sum.checked_add(term))
            .ok_or_else(|| SealwatchError::ChecksumUnavailable(value.to_owned()))?;
    }
    Ok(sum.to_string())
}

/// Compute the checksum of `value` exactly as the devices do.
///
/// The devices accumulate in a 32-bit two's-complement integer, so an
/// overflowing sum wraps instead of failing.
pub fn checksum(value: &str) -> String {
    value
        .chars()
        .enumerate()
        .fold(0i32, |sum, (index, ch)| {
            sum.wrapping_add(normalize(ch).wrapping_mul(weight(index)))
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_sum(value: &str) -> i64 {
        value
            .chars()
            .enumerate()
            .map(|(i, c)| i64::from(c as u32) * ((i % 5) as i64 + 1))
            .sum()
    }

    #[test]
    fn test_empty_value_is_zero() {
        assert_eq!(checksum(""), "0");
    }

    #[test]
    fn test_known_value() {
        // '2' = 50, '5' = 53 -> 50*1 + 53*2
        assert_eq!(checksum("25"), "156");
    }

    #[test]
    fn test_weights_cycle_after_five_positions() {
        // 'A' = 65 at positions 0..6 -> weights 1,2,3,4,5,1
        assert_eq!(checksum("AAAAAA"), (65 * 16).to_string());
    }

    #[test]
    fn test_ascii_letters_match_weighted_sum() {
        for value in ["Temperature", "abcdefghijklmnopqrstuvwxyz", "XyZ", "Q"] {
            assert_eq!(checksum(value), reference_sum(value).to_string(), "{value}");
        }
    }

    #[test]
    fn test_high_code_points_are_shifted() {
        // Greek capital Alpha U+0391 = 913; 913 - (65 - 193) = 1041
        assert_eq!(checksum("\u{391}"), "1041");
        // Latin-1 e-acute at position 1: (233 + 128) * 2
        assert_eq!(checksum("a\u{e9}"), (97 + 361 * 2).to_string());
    }

    #[test]
    fn test_deterministic() {
        let value = "T1 \u{3a0}\u{3b9}\u{3b5}\u{3c3}\u{3b7}";
        assert_eq!(checksum(value), checksum(value));
    }

    #[test]
    fn test_overflow_wraps_like_device() {
        let value = "\u{10FFFF}".repeat(1000);
        assert!(try_checksum(&value).is_err());

        // 32-bit two's-complement wrap of the exact sum
        let exact = value
            .chars()
            .enumerate()
            .map(|(i, c)| (i64::from(c as u32) + 128) * ((i % 5) as i64 + 1))
            .sum::<i64>();
        let wrapped = (exact.rem_euclid(1 << 32) as u32) as i32;
        assert!(exact > i64::from(i32::MAX));
        assert_eq!(checksum(&value), wrapped.to_string());
    }

    #[test]
    fn test_checked_and_wrapping_agree_without_overflow() {
        for value in ["", "25", "\u{391}\u{392}", "T1=-3.5"] {
            assert_eq!(try_checksum(value).unwrap(), checksum(value));
        }
    }
}
