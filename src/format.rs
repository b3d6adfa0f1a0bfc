//! PAN formatting for display in the PAN field.
//!
//! Digits are grouped in fours (`4111 1111 1111 1111`) except for Amex,
//! which uses 4-6-5 (`3782 822463 10005`). Partial PANs are grouped as far
//! as they go, with no trailing separator, so formatting can run on every
//! keystroke.
//!
//! # Example
//!
//! ```
//! use access_checkout::format::format_pan;
//! use access_checkout::CardConfiguration;
//!
//! let config = CardConfiguration::built_in();
//! let amex = config.brand_named("amex");
//!
//! assert_eq!(format_pan("4111111111111111", None), "4111 1111 1111 1111");
//! assert_eq!(format_pan("378282246310005", amex), "3782 822463 10005");
//! assert_eq!(format_pan("41111", None), "4111 1");
//! ```

use crate::card::{CardBrand, CardConfiguration};

/// Separator inserted between digit groups.
pub const SEPARATOR: &str = " ";

const AMEX_GROUPS: &[usize] = &[4, 6, 5];
const DEFAULT_GROUP: usize = 4;

fn is_amex(brand: Option<&CardBrand>) -> bool {
    brand.is_some_and(|b| b.is("amex"))
}

/// Groups the digits of `pan` for the given brand using spaces.
#[inline]
pub fn format_pan(pan: &str, brand: Option<&CardBrand>) -> String {
    format_pan_with_separator(pan, brand, SEPARATOR)
}

/// Groups the digits of `pan` for the given brand.
///
/// Everything but ASCII digits is dropped first.
///
/// # Example
///
/// ```
/// use access_checkout::format::format_pan_with_separator;
///
/// assert_eq!(format_pan_with_separator("4111 1111-1111", None, "-"), "4111-1111-1111");
/// ```
pub fn format_pan_with_separator(pan: &str, brand: Option<&CardBrand>, separator: &str) -> String {
    let digits = strip_formatting(pan);
    if digits.is_empty() {
        return digits;
    }

    let mut result = String::with_capacity(digits.len() + 4 * separator.len());
    let mut rest = digits.as_str();
    let mut group_index = 0;

    while !rest.is_empty() {
        let size = if is_amex(brand) {
            AMEX_GROUPS.get(group_index).copied().unwrap_or(rest.len())
        } else {
            DEFAULT_GROUP
        };
        let (group, tail) = rest.split_at(size.min(rest.len()));

        if group_index > 0 {
            result.push_str(separator);
        }
        result.push_str(group);

        rest = tail;
        group_index += 1;
    }

    result
}

/// Keeps only ASCII digits.
///
/// # Example
///
/// ```
/// use access_checkout::format::strip_formatting;
///
/// assert_eq!(strip_formatting("4111 1111-1111 1111"), "4111111111111111");
/// ```
#[inline]
pub fn strip_formatting(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Number of separators a fully typed PAN of this brand contains.
///
/// Amex always has two. Other brands have one per group of four after
/// the first, measured at the brand's (or the default) maximum length.
pub fn expected_space_count(brand: Option<&CardBrand>, config: &CardConfiguration) -> usize {
    if is_amex(brand) {
        return AMEX_GROUPS.len() - 1;
    }

    let max = brand.map_or(&config.defaults().pan, CardBrand::pan_rule).max_length();
    max.div_ceil(DEFAULT_GROUP).saturating_sub(1)
}
