//! Maximum field lengths.
//!
//! Host fields are limited to the longest input the current rules can
//! accept, so a Visa PAN field stops at 19 digits and an Amex CVC at 4.
//! Limits follow the detected brand and change with it.

use crate::card::{CardBrand, CardConfiguration};
use crate::detect::find_brand;
use crate::format::{expected_space_count, strip_formatting};

/// Longest PAN text for the brand `pan` resolves to.
///
/// # Arguments
///
/// * `pan` - Current PAN text, formatted or not.
/// * `config` - Brands and defaults.
/// * `formatted` - Whether the field shows separators, which count
///   towards the limit.
///
/// # Example
///
/// ```
/// use access_checkout::{length::pan_max_length, CardConfiguration};
///
/// let config = CardConfiguration::built_in();
/// assert_eq!(pan_max_length("4111", &config, false), 19);
/// assert_eq!(pan_max_length("4111", &config, true), 23);
/// assert_eq!(pan_max_length("3782", &config, true), 17);
/// ```
pub fn pan_max_length(pan: &str, config: &CardConfiguration, formatted: bool) -> usize {
    let brand = find_brand(&strip_formatting(pan), config.brands());
    pan_max_length_for_brand(brand, config, formatted)
}

/// Longest PAN text for an already detected brand.
pub fn pan_max_length_for_brand(
    brand: Option<&CardBrand>,
    config: &CardConfiguration,
    formatted: bool,
) -> usize {
    let digits = brand
        .map_or(&config.defaults().pan, CardBrand::pan_rule)
        .max_length();

    if formatted {
        digits + expected_space_count(brand, config)
    } else {
        digits
    }
}

/// Longest CVC for the brand the PAN resolves to.
#[inline]
pub fn cvc_max_length(pan: Option<&str>, config: &CardConfiguration) -> usize {
    let brand = pan.and_then(|pan| find_brand(&strip_formatting(pan), config.brands()));
    cvc_max_length_for_brand(brand, config)
}

/// Longest CVC for an already detected brand.
#[inline]
pub fn cvc_max_length_for_brand(brand: Option<&CardBrand>, config: &CardConfiguration) -> usize {
    crate::cvc::cvc_rule_for(brand, config).max_length()
}

/// Longest expiry date text (`MM/YY`).
#[inline]
pub fn expiry_max_length(config: &CardConfiguration) -> usize {
    config.defaults().expiry_date.max_length()
}

/// Cuts `text` to at most `max` characters.
///
/// Returns `None` when nothing had to be cut.
pub fn clamp(text: &str, max: usize) -> Option<String> {
    match text.char_indices().nth(max) {
        Some((index, _)) => Some(text[..index].to_string()),
        None => None,
    }
}
