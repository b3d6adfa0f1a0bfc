//! Remote card configuration: parsing the card-types document and holding
//! the current [`CardConfiguration`].
//!
//! The document is a JSON array of brands. Two brand shapes are accepted:
//!
//! ```json
//! [
//!   {"name": "visa", "pattern": "^4\\d*$", "panLengths": [13, 16, 19],
//!    "cvvLength": 3, "images": [{"type": "image/png", "url": "/visa.png"}]},
//!   {"name": "amex", "image": "/amex.svg",
//!    "cvv": {"matcher": "^\\d{0,4}$", "validLength": 4},
//!    "pans": [{"matcher": "^3[47]\\d{0,13}$", "validLength": 15, "subRules": []}]}
//! ]
//! ```
//!
//! Parsing is lenient per field: a missing or wrongly typed field falls
//! back to the matching default rule, a brand with no usable name or
//! pattern is skipped, and a document that is not a JSON array yields
//! [`CardConfiguration::default`]. None of these surface as errors; they
//! are logged.

use crate::card::{CardBrand, CardBrandImage, CardConfiguration, CardDefaults, DEFAULT_MATCHER};
use crate::error::{AccessCheckoutError, ConfigurationError};
use crate::http::HttpClient;
use crate::rule::{CardValidationRule, Matcher};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};
use url::Url;

/// Path of the card-types document relative to the service base URL.
pub const CARD_CONFIGURATION_PATH: &str = "access-checkout/cardTypes.json";

/// Parses a card-types document, falling back to defaults on failure.
///
/// # Example
///
/// ```
/// use access_checkout::config::parse_card_configuration;
///
/// let config = parse_card_configuration(r#"[{"name": "amex", "pattern": "^3[47]\\d*$", "panLengths": [15], "cvvLength": 4}]"#);
/// assert_eq!(config.brands()[0].name(), "amex");
///
/// let fallback = parse_card_configuration("not json");
/// assert!(fallback.is_empty());
/// ```
pub fn parse_card_configuration(json: &str) -> CardConfiguration {
    match try_parse_card_configuration(json) {
        Ok(config) => config,
        Err(error) => {
            warn!(%error, "using default card configuration");
            CardConfiguration::default()
        }
    }
}

/// Parses a card-types document.
///
/// Individual brands that cannot be used are skipped with a warning.
///
/// # Errors
///
/// Returns [`ConfigurationError::Malformed`] if the document is empty or not
/// a JSON array.
pub fn try_parse_card_configuration(json: &str) -> Result<CardConfiguration, ConfigurationError> {
    if json.trim().is_empty() {
        return Err(ConfigurationError::Malformed("empty document".into()));
    }

    let entries: Vec<Value> =
        serde_json::from_str(json).map_err(|e| ConfigurationError::Malformed(e.to_string()))?;

    let defaults = CardDefaults::default();
    let brands = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match to_brand(entry, &defaults) {
            Ok(brand) => Some(brand),
            Err(error) => {
                warn!(index, %error, "skipping card brand");
                None
            }
        })
        .collect();

    Ok(CardConfiguration::new(brands, defaults))
}

/// Deserializes a field, turning a wrongly typed value into `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteBrand {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pattern: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pan_lengths: Option<Vec<usize>>,
    #[serde(default, deserialize_with = "lenient")]
    cvv_length: Option<usize>,
    #[serde(default, deserialize_with = "lenient")]
    images: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient")]
    image: Option<String>,
    #[serde(default, alias = "cvv", deserialize_with = "lenient")]
    cvc: Option<RemoteRule>,
    #[serde(default, deserialize_with = "lenient")]
    pans: Option<Vec<RemoteRule>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteRule {
    #[serde(default, deserialize_with = "lenient")]
    matcher: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    valid_length: Option<usize>,
    #[serde(default, deserialize_with = "lenient")]
    min_length: Option<usize>,
    #[serde(default, deserialize_with = "lenient")]
    max_length: Option<usize>,
    #[serde(default, deserialize_with = "lenient")]
    sub_rules: Option<Vec<RemoteRule>>,
}

impl RemoteRule {
    /// Lengths named by this rule and its sub-rules.
    fn lengths(&self) -> Vec<usize> {
        let own: Vec<usize> = match (self.valid_length, self.min_length, self.max_length) {
            (Some(exact), _, _) => vec![exact],
            (None, Some(min), Some(max)) if min <= max => (min..=max).collect(),
            (None, _, Some(max)) => vec![max],
            _ => Vec::new(),
        };

        own.into_iter()
            .chain(self.sub_rules.iter().flatten().flat_map(RemoteRule::lengths))
            .collect()
    }
}

fn to_brand(entry: Value, defaults: &CardDefaults) -> Result<CardBrand, ConfigurationError> {
    let remote: RemoteBrand =
        serde_json::from_value(entry).map_err(|e| ConfigurationError::Malformed(e.to_string()))?;

    let name = remote
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ConfigurationError::Malformed("brand without a name".into()))?
        .to_string();

    let pan_rule = pan_rule(&remote, defaults)?;
    let cvc_rule = cvc_rule(&remote, defaults)?;
    let images = images(&remote);

    debug!(brand = %name, pattern = ?pan_rule.matcher().map(Matcher::as_str), "loaded card brand");
    Ok(CardBrand::new(name, images, cvc_rule, pan_rule))
}

fn pan_rule(
    remote: &RemoteBrand,
    defaults: &CardDefaults,
) -> Result<CardValidationRule, ConfigurationError> {
    if let Some(pattern) = &remote.pattern {
        let lengths = remote
            .pan_lengths
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| defaults.pan.valid_lengths().to_vec());
        return CardValidationRule::new(Some(pattern), lengths);
    }

    let pans = remote.pans.as_deref().unwrap_or_default();
    let patterns: Vec<&str> = pans.iter().filter_map(|p| p.matcher.as_deref()).collect();
    if patterns.is_empty() {
        return Err(ConfigurationError::Malformed("brand without a PAN pattern".into()));
    }

    let pattern = match patterns.as_slice() {
        [single] => single.to_string(),
        many => many.iter().map(|p| format!("(?:{p})")).collect::<Vec<_>>().join("|"),
    };
    let mut lengths: Vec<usize> = pans.iter().flat_map(RemoteRule::lengths).collect();
    if lengths.is_empty() {
        lengths = defaults.pan.valid_lengths().to_vec();
    }

    CardValidationRule::new(Some(&pattern), lengths)
}

fn cvc_rule(
    remote: &RemoteBrand,
    defaults: &CardDefaults,
) -> Result<CardValidationRule, ConfigurationError> {
    if let Some(length) = remote.cvv_length {
        return CardValidationRule::new(Some(DEFAULT_MATCHER), [length]);
    }

    match &remote.cvc {
        Some(rule) => {
            let lengths = rule.lengths();
            let lengths = if lengths.is_empty() {
                defaults.cvc.valid_lengths().to_vec()
            } else {
                lengths
            };
            let matcher = rule.matcher.as_deref().unwrap_or(DEFAULT_MATCHER);
            CardValidationRule::new(Some(matcher), lengths)
        }
        None => Ok(defaults.cvc.clone()),
    }
}

fn images(remote: &RemoteBrand) -> Vec<CardBrandImage> {
    let mut images: Vec<CardBrandImage> = remote
        .images
        .iter()
        .flatten()
        .filter_map(|value| serde_json::from_value(value.clone()).ok())
        .collect();

    if let Some(url) = &remote.image {
        let media_type = if url.ends_with(".png") {
            "image/png"
        } else {
            "image/svg+xml"
        };
        images.push(CardBrandImage {
            media_type: media_type.to_string(),
            url: url.clone(),
        });
    }

    images
}

/// Called with the new configuration after every swap.
pub type ConfigurationObserver = Arc<dyn Fn(&Arc<CardConfiguration>) + Send + Sync>;

/// Holds the configuration in use and swaps in fetched ones.
///
/// Readers take an `Arc` snapshot, so a swap never tears a validation that
/// is already running.
pub struct CardConfigurationProvider {
    current: RwLock<Arc<CardConfiguration>>,
    observers: Mutex<Vec<ConfigurationObserver>>,
}

impl std::fmt::Debug for CardConfigurationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardConfigurationProvider")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

impl Default for CardConfigurationProvider {
    fn default() -> Self {
        Self::new(CardConfiguration::default())
    }
}

impl CardConfigurationProvider {
    /// Starts with `initial`.
    pub fn new(initial: CardConfiguration) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the configuration in use.
    pub fn current(&self) -> Arc<CardConfiguration> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers a callback for configuration swaps.
    pub fn subscribe(&self, observer: impl Fn(&Arc<CardConfiguration>) + Send + Sync + 'static) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// Swaps in `config` and notifies observers.
    ///
    /// Observers run with no lock held, so they may subscribe or update
    /// again. One subscribed during this call is first notified on the
    /// next update.
    pub fn update(&self, config: CardConfiguration) {
        let config = Arc::new(config);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&config);

        let observers: Vec<ConfigurationObserver> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer(&config);
        }
    }

    /// Fetches `{base_url}/access-checkout/cardTypes.json` and swaps it in.
    ///
    /// A document that does not parse is swapped in as the default
    /// configuration. A failed request leaves the current configuration in
    /// place.
    ///
    /// # Errors
    ///
    /// Returns the discovery or HTTP error when the document could not be
    /// fetched.
    pub async fn fetch(
        &self,
        http: &HttpClient,
        base_url: &str,
    ) -> Result<(), AccessCheckoutError> {
        let url = card_configuration_url(base_url)?;

        match http.get(&url, &[]).await {
            Ok(body) => {
                self.update(parse_card_configuration(&body));
                Ok(())
            }
            Err(error) => {
                warn!(%url, %error, "could not fetch card configuration");
                Err(error.into())
            }
        }
    }

    /// Runs [`fetch`](Self::fetch) on the tokio runtime.
    pub fn fetch_in_background(
        self: &Arc<Self>,
        http: HttpClient,
        base_url: String,
    ) -> tokio::task::JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            // Failures are logged by fetch and the defaults stay in place.
            let _ = provider.fetch(&http, &base_url).await;
        })
    }
}

/// Builds the card-types URL for a service base URL.
///
/// # Errors
///
/// Returns [`DiscoveryError::NoUrl`](crate::error::DiscoveryError::NoUrl) for
/// a blank base URL and
/// [`DiscoveryError::InvalidUrl`](crate::error::DiscoveryError::InvalidUrl)
/// if the result does not parse.
pub fn card_configuration_url(base_url: &str) -> Result<Url, AccessCheckoutError> {
    use crate::error::DiscoveryError;

    let base = base_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(DiscoveryError::NoUrl.into());
    }

    let url = format!("{base}/{CARD_CONFIGURATION_PATH}");
    Url::parse(&url).map_err(|_| DiscoveryError::InvalidUrl(url).into())
}
