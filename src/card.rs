//! Card brands, brand-less defaults and the configuration that holds them.
//!
//! A [`CardConfiguration`] is an ordered list of [`CardBrand`]s plus
//! [`CardDefaults`]. Brand order is significant: the brand matcher returns
//! the first brand whose PAN pattern matches, so overlapping ranges are
//! resolved by declaration order.
//!
//! Until the remote card-types document arrives, validation runs against
//! [`CardConfiguration::default`], which has no brands at all.
//! [`CardConfiguration::built_in`] carries the seven brands the service
//! publishes.

use crate::config;
use crate::rule::{CardValidationRule, Matcher};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Matcher used for brand CVC rules and as the default PAN matcher.
pub const DEFAULT_MATCHER: &str = r"^\d{0,19}$";

/// Default CVC matcher.
pub const CVC_DEFAULT_MATCHER: &str = r"^\d{0,4}$";

/// Month matcher. Accepts `0` and `1` as partial months.
pub const MONTH_DEFAULT_MATCHER: &str = r"^0[1-9]{0,1}$|^1[0-2]{0,1}$";

/// Two-digit year matcher.
pub const YEAR_DEFAULT_MATCHER: &str = r"^\d{0,2}$";

/// Full `MM/YY` matcher.
pub const EXPIRY_DATE_DEFAULT_MATCHER: &str = r"^((0[1-9])|(1[0-2]))/(\d{2})$";

/// Card-types document compiled into the crate.
const BUILT_IN_CARD_TYPES: &str = include_str!("../data/card_types.json");

static DEFAULTS: Lazy<CardDefaults> = Lazy::new(|| CardDefaults {
    pan: rule(DEFAULT_MATCHER, 12..=19),
    cvc: rule(CVC_DEFAULT_MATCHER, [3, 4]),
    month: rule(MONTH_DEFAULT_MATCHER, [2]),
    year: rule(YEAR_DEFAULT_MATCHER, [2]),
    expiry_date: rule(EXPIRY_DATE_DEFAULT_MATCHER, [5]),
});

static BUILT_IN: Lazy<CardConfiguration> =
    Lazy::new(|| config::parse_card_configuration(BUILT_IN_CARD_TYPES));

fn rule(pattern: &str, lengths: impl IntoIterator<Item = usize>) -> CardValidationRule {
    CardValidationRule::from_matcher(Matcher::new(pattern).ok(), lengths)
}

/// Brand logo reference as published in the card-types document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardBrandImage {
    /// Media type, e.g. `image/svg+xml`.
    #[serde(rename = "type")]
    pub media_type: String,
    /// Where to fetch the image from.
    pub url: String,
}

/// A card network with its PAN and CVC rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardBrand {
    name: String,
    images: Vec<CardBrandImage>,
    cvc_rule: CardValidationRule,
    pan_rule: CardValidationRule,
}

impl CardBrand {
    /// Creates a brand.
    pub fn new(
        name: impl Into<String>,
        images: Vec<CardBrandImage>,
        cvc_rule: CardValidationRule,
        pan_rule: CardValidationRule,
    ) -> Self {
        Self {
            name: name.into(),
            images,
            cvc_rule,
            pan_rule,
        }
    }

    /// Brand name as published, e.g. `visa`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logo references.
    pub fn images(&self) -> &[CardBrandImage] {
        &self.images
    }

    /// Rule applied to the CVC when the PAN belongs to this brand.
    pub fn cvc_rule(&self) -> &CardValidationRule {
        &self.cvc_rule
    }

    /// Rule applied to the PAN.
    pub fn pan_rule(&self) -> &CardValidationRule {
        &self.pan_rule
    }

    /// Case-insensitive name comparison.
    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Rules applied when no brand matches, and for the date fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDefaults {
    /// PAN rule: up to 19 digits, lengths 12 to 19.
    pub pan: CardValidationRule,
    /// CVC rule: 3 or 4 digits.
    pub cvc: CardValidationRule,
    /// Expiry month rule.
    pub month: CardValidationRule,
    /// Expiry year rule.
    pub year: CardValidationRule,
    /// Full `MM/YY` rule.
    pub expiry_date: CardValidationRule,
}

impl Default for CardDefaults {
    fn default() -> Self {
        DEFAULTS.clone()
    }
}

/// Ordered brands plus defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardConfiguration {
    brands: Vec<CardBrand>,
    defaults: CardDefaults,
}

impl CardConfiguration {
    /// Creates a configuration. Brand order is preserved.
    pub fn new(brands: Vec<CardBrand>, defaults: CardDefaults) -> Self {
        Self { brands, defaults }
    }

    /// The configuration compiled into the crate: Visa, Mastercard, Amex,
    /// JCB, Discover, Diners and Maestro, in that order.
    ///
    /// # Example
    ///
    /// ```
    /// use access_checkout::CardConfiguration;
    ///
    /// let config = CardConfiguration::built_in();
    /// let names: Vec<_> = config.brands().iter().map(|b| b.name()).collect();
    /// assert_eq!(names, ["visa", "mastercard", "amex", "jcb", "discover", "diners", "maestro"]);
    /// ```
    pub fn built_in() -> Self {
        BUILT_IN.clone()
    }

    /// Brands in priority order.
    pub fn brands(&self) -> &[CardBrand] {
        &self.brands
    }

    /// Brand-less rules.
    pub fn defaults(&self) -> &CardDefaults {
        &self.defaults
    }

    /// Looks a brand up by name, ignoring case.
    pub fn brand_named(&self, name: &str) -> Option<&CardBrand> {
        self.brands.iter().find(|b| b.is(name))
    }

    /// True when no brands are configured.
    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }
}
