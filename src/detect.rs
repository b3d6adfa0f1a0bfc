//! Card brand detection by ordered pattern matching.
//!
//! Brands are tried in the order the configuration lists them and the first
//! one whose PAN pattern matches wins. Overlapping ranges (Visa's `4` and
//! Maestro's `493698`) are settled by that order together with the
//! exclusions written into the patterns, so the list must not be reordered
//! or turned into a lookup table.

use crate::card::CardBrand;

/// Finds the brand for a partial or complete PAN.
///
/// # Arguments
///
/// * `pan` - Digits typed so far, without separators.
/// * `brands` - Brands in priority order.
///
/// # Returns
///
/// The first matching brand, or `None` for an empty PAN or when nothing
/// matches (default rules then apply).
///
/// # Example
///
/// ```
/// use access_checkout::{detect::find_brand, CardConfiguration};
///
/// let config = CardConfiguration::built_in();
/// let brand = find_brand("4111", config.brands()).unwrap();
/// assert_eq!(brand.name(), "visa");
///
/// let brand = find_brand("4936981234", config.brands()).unwrap();
/// assert_eq!(brand.name(), "maestro");
///
/// assert!(find_brand("", config.brands()).is_none());
/// ```
#[inline]
pub fn find_brand<'a>(pan: &str, brands: &'a [CardBrand]) -> Option<&'a CardBrand> {
    if pan.is_empty() {
        return None;
    }

    brands.iter().find(|brand| brand.pan_rule().matches(pan))
}
