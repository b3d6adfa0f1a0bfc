//! CVC validation.
//!
//! The CVC rule depends on the PAN: a PAN that resolves to a brand brings
//! that brand's fixed CVC length (4 for Amex, 3 for the others in the
//! built-in configuration); otherwise the default rule accepts 3 or 4
//! digits. There is no checksum.

use crate::card::{CardBrand, CardConfiguration};
use crate::detect::find_brand;
use crate::rule::{CardValidationRule, ValidationResult};
use crate::validate::strip_spaces;

/// Picks the CVC rule for a brand, falling back to the default rule.
#[inline]
pub fn cvc_rule_for<'a>(
    brand: Option<&'a CardBrand>,
    config: &'a CardConfiguration,
) -> &'a CardValidationRule {
    brand.map_or(&config.defaults().cvc, CardBrand::cvc_rule)
}

/// Validates a CVC.
///
/// # Arguments
///
/// * `cvc` - CVC text.
/// * `pan` - PAN text, when the form has one; selects the brand rule.
/// * `config` - Brands and defaults.
///
/// # Returns
///
/// The result and the brand whose rule was used.
///
/// # Example
///
/// ```
/// use access_checkout::{validate_cvc, CardConfiguration};
///
/// let config = CardConfiguration::built_in();
///
/// let (result, brand) = validate_cvc("1234", Some("342793178931249"), &config);
/// assert!(result.complete);
/// assert_eq!(brand.unwrap().name(), "amex");
///
/// let (result, _) = validate_cvc("1234", Some("4111111111111111"), &config);
/// assert!(!result.complete);
///
/// let (result, brand) = validate_cvc("1234", None, &config);
/// assert!(result.complete);
/// assert!(brand.is_none());
/// ```
pub fn validate_cvc<'a>(
    cvc: &str,
    pan: Option<&str>,
    config: &'a CardConfiguration,
) -> (ValidationResult, Option<&'a CardBrand>) {
    let brand = pan.and_then(|pan| find_brand(&strip_spaces(pan), config.brands()));
    (validate_cvc_for_brand(cvc, brand, config), brand)
}

/// Validates a CVC against an already detected brand.
pub fn validate_cvc_for_brand(
    cvc: &str,
    brand: Option<&CardBrand>,
    config: &CardConfiguration,
) -> ValidationResult {
    cvc_rule_for(brand, config).validate(cvc)
}

/// Returns `true` if the CVC is complete for the PAN's brand.
#[inline]
pub fn is_valid_cvc(cvc: &str, pan: Option<&str>, config: &CardConfiguration) -> bool {
    validate_cvc(cvc, pan, config).0.complete
}
