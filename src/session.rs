//! Session requests: card details in, session reference out.
//!
//! A [`SessionRequest`] knows which discovery chain leads to its endpoint
//! and how it is serialized. [`SessionRequestSender`] discovers the
//! endpoint, POSTs the request and reads the session href out of the
//! response.
//!
//! Request bodies:
//!
//! ```json
//! {"cardNumber": "4111111111111111", "cardExpiryDate": {"month": 12, "year": 2030}, "cvc": "123", "identity": "checkout-id"}
//! {"cvc": "123", "identity": "checkout-id"}
//! ```

use crate::discovery::{ApiDiscoveryClient, DiscoverLinks, SESSIONS_MEDIA_TYPE};
use crate::error::{AccessCheckoutError, DeserializationError};
use crate::expiry::ExpiryDate;
use crate::hal::{Curie, HalDocument};
use crate::http::HttpClient;
use crate::mask::{mask_pan, mask_secret};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};
use zeroize::Zeroize;

/// Name of the header identifying the SDK.
pub const SDK_HEADER_NAME: &str = "X-WP-SDK";

/// Relation of the session reference in a session response.
pub const SESSION_RELATION: &str = "sessions:session";

static SDK_HEADER_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+/\d+\.\d+\.\d+(-SNAPSHOT)?$").ok());

/// Kind of session a merchant can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    /// Session for the full card: PAN, expiry date and CVC.
    Card,
    /// Session for the CVC alone.
    Cvc,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card => f.write_str("CARD"),
            Self::Cvc => f.write_str("CVC"),
        }
    }
}

/// Expiry date as the sessions API expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardExpiryDate {
    /// Month, 1 to 12.
    pub month: u32,
    /// Four-digit year.
    pub year: u32,
}

impl From<ExpiryDate> for CardExpiryDate {
    fn from(date: ExpiryDate) -> Self {
        Self {
            month: date.month(),
            year: date.year(),
        }
    }
}

/// Body of a card session request.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSessionRequest {
    card_number: String,
    card_expiry_date: CardExpiryDate,
    cvc: String,
    identity: String,
}

impl CardSessionRequest {
    /// Creates the request. `identity` is the merchant's checkout id.
    pub fn new(
        card_number: impl Into<String>,
        card_expiry_date: impl Into<CardExpiryDate>,
        cvc: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            card_number: card_number.into(),
            card_expiry_date: card_expiry_date.into(),
            cvc: cvc.into(),
            identity: identity.into(),
        }
    }

    /// Expiry date sent.
    pub fn card_expiry_date(&self) -> CardExpiryDate {
        self.card_expiry_date
    }

    /// Checkout id sent.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Debug for CardSessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardSessionRequest")
            .field("card_number", &mask_pan(&self.card_number))
            .field("card_expiry_date", &self.card_expiry_date)
            .field("cvc", &mask_secret(&self.cvc))
            .field("identity", &self.identity)
            .finish()
    }
}

impl Drop for CardSessionRequest {
    fn drop(&mut self) {
        self.card_number.zeroize();
        self.cvc.zeroize();
    }
}

/// Body of a CVC session request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CvcSessionRequest {
    cvc: String,
    identity: String,
}

impl CvcSessionRequest {
    /// Creates the request. `identity` is the merchant's checkout id.
    pub fn new(cvc: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            cvc: cvc.into(),
            identity: identity.into(),
        }
    }

    /// Checkout id sent.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Debug for CvcSessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CvcSessionRequest")
            .field("cvc", &mask_secret(&self.cvc))
            .field("identity", &self.identity)
            .finish()
    }
}

impl Drop for CvcSessionRequest {
    fn drop(&mut self) {
        self.cvc.zeroize();
    }
}

/// A session request of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    /// Full card session.
    Card(CardSessionRequest),
    /// CVC-only session.
    Cvc(CvcSessionRequest),
}

impl SessionRequest {
    /// Kind of session this request produces.
    pub fn session_type(&self) -> SessionType {
        match self {
            Self::Card(_) => SessionType::Card,
            Self::Cvc(_) => SessionType::Cvc,
        }
    }

    /// Chain leading to the endpoint for this request.
    pub fn discover_links(&self) -> DiscoverLinks {
        match self {
            Self::Card(_) => DiscoverLinks::card_sessions(),
            Self::Cvc(_) => DiscoverLinks::cvc_sessions(),
        }
    }

    /// Media type for `Content-Type` and `Accept`.
    pub fn media_type(&self) -> &'static str {
        SESSIONS_MEDIA_TYPE
    }

    /// Relation holding the session reference in the response.
    pub fn response_relation(&self) -> &'static str {
        SESSION_RELATION
    }

    /// JSON body.
    ///
    /// # Errors
    ///
    /// Only if serde_json fails to write a string, which it does not for
    /// these types.
    pub fn to_json(&self) -> Result<String, AccessCheckoutError> {
        let json = match self {
            Self::Card(request) => serde_json::to_string(request),
            Self::Cvc(request) => serde_json::to_string(request),
        };
        json.map_err(|e| AccessCheckoutError::illegal_argument(e.to_string()))
    }
}

/// The session endpoint reference in a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionEndpoints {
    /// The session href, handed to the merchant as-is.
    pub href: String,
}

/// Links of a session response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionResponseLinks {
    /// The session reference.
    pub endpoints: SessionEndpoints,
    /// Compact URI declarations.
    pub curies: Vec<Curie>,
}

/// A parsed session response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionResponse {
    /// Links in the response.
    pub links: SessionResponseLinks,
}

impl SessionResponse {
    /// Parses a response, reading the session href from `relation`.
    ///
    /// # Errors
    ///
    /// Any [`DeserializationError`]. A missing relation is
    /// [`DeserializationError::MissingObject`].
    ///
    /// # Example
    ///
    /// ```
    /// use access_checkout::session::SessionResponse;
    ///
    /// let json = r#"{"_links": {"sessions:session": {"href": "https://example.com/sessions/abc"}}}"#;
    /// let response = SessionResponse::from_json(json, "sessions:session").unwrap();
    /// assert_eq!(response.href(), "https://example.com/sessions/abc");
    /// ```
    pub fn from_json(body: &str, relation: &str) -> Result<Self, DeserializationError> {
        let doc = HalDocument::parse(body)?;
        let href = doc
            .href(relation)?
            .ok_or_else(|| DeserializationError::MissingObject(relation.to_string()))?;

        Ok(Self {
            links: SessionResponseLinks {
                endpoints: SessionEndpoints { href },
                curies: doc.curies()?,
            },
        })
    }

    /// The session reference.
    pub fn href(&self) -> &str {
        &self.links.endpoints.href
    }
}

/// Outcome of one session request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResponseInfo {
    /// Kind of session requested.
    pub session_type: SessionType,
    /// The response, or why there is none.
    pub result: Result<SessionResponse, AccessCheckoutError>,
}

/// Value of the `X-WP-SDK` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SdkHeader(String);

impl SdkHeader {
    /// Checks an override such as `my-sdk/1.2.3` or `my-sdk/1.2.3-SNAPSHOT`.
    ///
    /// # Errors
    ///
    /// [`AccessCheckoutError::IllegalArgument`] when the value is not
    /// `name/major.minor.patch`.
    ///
    /// # Example
    ///
    /// ```
    /// use access_checkout::session::SdkHeader;
    ///
    /// assert!(SdkHeader::new("access-checkout-react-native/2.0.0").is_ok());
    /// assert!(SdkHeader::new("access-checkout/2.0").is_err());
    /// ```
    pub fn new(value: impl Into<String>) -> Result<Self, AccessCheckoutError> {
        let value = value.into();
        let valid = SDK_HEADER_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(&value));

        if valid {
            Ok(Self(value))
        } else {
            Err(AccessCheckoutError::illegal_argument(format!(
                "Unsupported version format. This functionality only supports access-checkout-react-native semantic versions or default access-checkout-rust version. Value was: {value}"
            )))
        }
    }

    /// Header value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SdkHeader {
    fn default() -> Self {
        Self(format!("access-checkout-rust/{}", env!("CARGO_PKG_VERSION")))
    }
}

impl fmt::Display for SdkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discovers session endpoints and sends session requests to them.
#[derive(Debug, Clone)]
pub struct SessionRequestSender {
    discovery: ApiDiscoveryClient,
    http: HttpClient,
    sdk_header: SdkHeader,
}

impl SessionRequestSender {
    /// A sender using `discovery` for endpoints and `http` for the POST.
    pub fn new(discovery: ApiDiscoveryClient, http: HttpClient) -> Self {
        Self {
            discovery,
            http,
            sdk_header: SdkHeader::default(),
        }
    }

    /// Sends `header` as `X-WP-SDK`.
    pub fn with_sdk_header(mut self, header: SdkHeader) -> Self {
        self.sdk_header = header;
        self
    }

    /// Sends `request` to the service at `base_url`.
    ///
    /// Never fails outright: errors are carried in the returned
    /// [`SessionResponseInfo`].
    pub async fn send_session_request(
        &self,
        request: &SessionRequest,
        base_url: &str,
    ) -> SessionResponseInfo {
        let session_type = request.session_type();
        let result = self.send(request, base_url).await;

        match &result {
            Ok(response) => debug!(%session_type, href = response.href(), "session created"),
            Err(error) => warn!(%session_type, %error, "session request failed"),
        }

        SessionResponseInfo { session_type, result }
    }

    /// Runs [`send_session_request`](Self::send_session_request) on the
    /// tokio runtime and hands the outcome to `callback`.
    pub fn send_session_request_with_callback<F>(
        &self,
        request: SessionRequest,
        base_url: impl Into<String>,
        callback: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(SessionResponseInfo) + Send + 'static,
    {
        let sender = self.clone();
        let base_url = base_url.into();
        tokio::spawn(async move {
            callback(sender.send_session_request(&request, &base_url).await);
        })
    }

    async fn send(
        &self,
        request: &SessionRequest,
        base_url: &str,
    ) -> Result<SessionResponse, AccessCheckoutError> {
        let url = self
            .discovery
            .discover(base_url, &request.discover_links())
            .await?;

        let headers = [
            ("Content-Type".to_string(), request.media_type().to_string()),
            ("Accept".to_string(), request.media_type().to_string()),
            (SDK_HEADER_NAME.to_string(), self.sdk_header.to_string()),
        ];

        debug!(session_type = %request.session_type(), %url, "sending session request");
        let body = self.http.post(&url, request.to_json()?, &headers).await?;

        Ok(SessionResponse::from_json(&body, request.response_relation())?)
    }
}
