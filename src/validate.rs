//! PAN validation against the brand rules.
//!
//! A PAN is `partial` while it matches its rule's pattern and is no longer
//! than the rule's maximum length, and `complete` once its length is one of
//! the accepted lengths and it passes Luhn.

use crate::card::{CardBrand, CardConfiguration};
use crate::detect::find_brand;
use crate::luhn;
use crate::rule::ValidationResult;

/// Removes whitespace, so formatted PANs (`4111 1111 ...`) validate.
#[inline]
pub fn strip_spaces(pan: &str) -> String {
    pan.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Validates a PAN and reports the brand it resolved to.
///
/// # Arguments
///
/// * `pan` - The PAN text; whitespace is ignored.
/// * `config` - Brands and defaults to validate against.
///
/// # Returns
///
/// The validation result and the matched brand, if any. Without a brand,
/// the default PAN rule applies.
///
/// # Example
///
/// ```
/// use access_checkout::{validate_pan, CardConfiguration};
///
/// let config = CardConfiguration::built_in();
///
/// let (result, brand) = validate_pan("4111 1111 1111 1111", &config);
/// assert!(result.complete);
/// assert_eq!(brand.unwrap().name(), "visa");
///
/// let (result, _) = validate_pan("4111", &config);
/// assert!(result.partial && !result.complete);
/// ```
pub fn validate_pan<'a>(
    pan: &str,
    config: &'a CardConfiguration,
) -> (ValidationResult, Option<&'a CardBrand>) {
    let pan = strip_spaces(pan);
    let brand = find_brand(&pan, config.brands());
    let rule = brand.map_or(&config.defaults().pan, CardBrand::pan_rule);

    if !rule.matches(&pan) {
        return (ValidationResult::INVALID, brand);
    }

    let length = pan.chars().count();
    let partial = length <= rule.max_length();
    let complete = rule.is_valid_length(length) && luhn::is_luhn_valid(&pan);

    (ValidationResult::new(partial, complete), brand)
}

/// Returns `true` if the PAN is complete and valid.
#[inline]
pub fn is_valid_pan(pan: &str, config: &CardConfiguration) -> bool {
    validate_pan(pan, config).0.complete
}

/// PAN validation that also honours a merchant's accepted brands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanCheck<'a> {
    /// Rule and Luhn outcome.
    pub result: ValidationResult,
    /// Detected brand.
    pub brand: Option<&'a CardBrand>,
    /// False when a brand was detected that the merchant does not take.
    pub brand_accepted: bool,
}

impl PanCheck<'_> {
    /// Complete and from an accepted brand.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.result.complete && self.brand_accepted
    }
}

/// Whether `brand` is in `accepted`.
///
/// Names compare case-insensitively. An empty list, or no detected brand,
/// counts as accepted.
pub fn is_brand_accepted<S: AsRef<str>>(brand: Option<&CardBrand>, accepted: &[S]) -> bool {
    match brand {
        Some(brand) if !accepted.is_empty() => accepted.iter().any(|name| brand.is(name.as_ref())),
        _ => true,
    }
}

/// Validates a PAN and checks its brand against the accepted list.
///
/// # Example
///
/// ```
/// use access_checkout::{validate::check_pan, CardConfiguration};
///
/// let config = CardConfiguration::built_in();
/// let check = check_pan("4111111111111111", &config, &["mastercard"]);
/// assert!(check.result.complete);
/// assert!(!check.brand_accepted);
/// assert!(!check.is_valid());
/// ```
pub fn check_pan<'a, S: AsRef<str>>(
    pan: &str,
    config: &'a CardConfiguration,
    accepted: &[S],
) -> PanCheck<'a> {
    let (result, brand) = validate_pan(pan, config);
    PanCheck {
        result,
        brand,
        brand_accepted: is_brand_accepted(brand, accepted),
    }
}
