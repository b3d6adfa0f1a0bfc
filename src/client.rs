//! The merchant-facing client: card details in, session references out.
//!
//! # Example
//!
//! ```no_run
//! use access_checkout::client::{AccessCheckoutClient, CardDetails, SessionResponseListener};
//! use access_checkout::{AccessCheckoutError, SessionType};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! struct PrintSessions;
//!
//! impl SessionResponseListener for PrintSessions {
//!     fn on_request_finished(&self, result: Result<HashMap<SessionType, String>, AccessCheckoutError>) {
//!         match result {
//!             Ok(sessions) => println!("{sessions:?}"),
//!             Err(error) => eprintln!("{error}"),
//!         }
//!     }
//! }
//!
//! # async fn run() -> access_checkout::Result<()> {
//! let client = AccessCheckoutClient::builder()
//!     .base_url("https://try.access.worldpay.com/")
//!     .checkout_id("identity")
//!     .listener(Arc::new(PrintSessions))
//!     .build()?;
//!
//! let card = CardDetails::builder()
//!     .pan("4111111111111111")
//!     .expiry_date("12/30")
//!     .cvc("123")
//!     .build()?;
//!
//! for handle in client.generate_sessions(&card, &[SessionType::Card, SessionType::Cvc])? {
//!     let _ = handle.await;
//! }
//! # Ok(())
//! # }
//! ```

use crate::controller::{CardValidationController, CardValidationControllerBuilder};
use crate::discovery::{ApiDiscoveryClient, DiscoveryCache, DEFAULT_MAX_ATTEMPTS};
use crate::error::AccessCheckoutError;
use crate::expiry::{ExpiryDate, DEFAULT_MAX_YEARS_AHEAD};
use crate::http::{
    HttpClient, HttpTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS,
    DEFAULT_READ_TIMEOUT,
};
use crate::mask::{mask_pan, mask_secret};
use crate::session::{
    CardSessionRequest, CvcSessionRequest, SdkHeader, SessionRequest, SessionRequestSender,
    SessionType,
};
use crate::tracker::{Completion, SessionCompletionTracker};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use zeroize::Zeroize;

/// Tunables for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Connect timeout of every HTTP call.
    pub connect_timeout: Duration,
    /// Read timeout of every HTTP call.
    pub read_timeout: Duration,
    /// Attempts made for a failing discovery chain.
    pub max_discovery_attempts: u32,
    /// Redirects followed per request.
    pub max_redirects: usize,
    /// Value of the `X-WP-SDK` header.
    pub sdk_header: SdkHeader,
    /// Expiry dates further ahead than this are invalid.
    pub max_years_ahead: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_discovery_attempts: DEFAULT_MAX_ATTEMPTS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            sdk_header: SdkHeader::default(),
            max_years_ahead: DEFAULT_MAX_YEARS_AHEAD,
        }
    }
}

impl ClientConfig {
    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the discovery attempt limit.
    pub fn with_max_discovery_attempts(mut self, attempts: u32) -> Self {
        self.max_discovery_attempts = attempts;
        self
    }

    /// Sets the redirect limit.
    pub fn with_max_redirects(mut self, redirects: usize) -> Self {
        self.max_redirects = redirects;
        self
    }

    /// Sets the `X-WP-SDK` header.
    pub fn with_sdk_header(mut self, header: SdkHeader) -> Self {
        self.sdk_header = header;
        self
    }

    /// Sets how far ahead an expiry date may lie.
    pub fn with_max_years_ahead(mut self, years: u32) -> Self {
        self.max_years_ahead = years;
        self
    }

    /// A validation controller builder using these settings.
    pub fn validation_builder(&self) -> CardValidationControllerBuilder {
        CardValidationController::builder().max_years_ahead(self.max_years_ahead)
    }
}

/// Card data to exchange for sessions.
///
/// Which fields are needed depends on the session types asked for. The
/// PAN and CVC are wiped from memory on drop.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CardDetails {
    pan: Option<String>,
    expiry_date: Option<ExpiryDate>,
    cvc: Option<String>,
}

impl CardDetails {
    /// Starts building card details.
    pub fn builder() -> CardDetailsBuilder {
        CardDetailsBuilder::default()
    }

    /// PAN, without separators.
    pub fn pan(&self) -> Option<&str> {
        self.pan.as_deref()
    }

    /// Expiry date.
    pub fn expiry_date(&self) -> Option<ExpiryDate> {
        self.expiry_date
    }

    /// CVC.
    pub fn cvc(&self) -> Option<&str> {
        self.cvc.as_deref()
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("pan", &self.pan.as_deref().map(mask_pan))
            .field("expiry_date", &self.expiry_date)
            .field("cvc", &self.cvc.as_deref().map(mask_secret))
            .finish()
    }
}

impl Drop for CardDetails {
    fn drop(&mut self) {
        if let Some(pan) = self.pan.as_mut() {
            pan.zeroize();
        }
        if let Some(cvc) = self.cvc.as_mut() {
            cvc.zeroize();
        }
    }
}

/// Builder for [`CardDetails`].
#[derive(Default)]
pub struct CardDetailsBuilder {
    pan: Option<String>,
    expiry_date: Option<String>,
    cvc: Option<String>,
}

impl fmt::Debug for CardDetailsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetailsBuilder")
            .field("pan", &self.pan.as_deref().map(mask_pan))
            .field("expiry_date", &self.expiry_date)
            .field("cvc", &self.cvc.as_deref().map(mask_secret))
            .finish()
    }
}

impl CardDetailsBuilder {
    /// PAN; spaces are removed.
    pub fn pan(mut self, pan: impl Into<String>) -> Self {
        let pan: String = pan.into();
        self.pan = Some(pan.chars().filter(|c| !c.is_whitespace()).collect());
        self
    }

    /// Expiry date as `MM/YY` or `MMYY`.
    pub fn expiry_date(mut self, expiry_date: impl Into<String>) -> Self {
        self.expiry_date = Some(expiry_date.into());
        self
    }

    /// CVC.
    pub fn cvc(mut self, cvc: impl Into<String>) -> Self {
        self.cvc = Some(cvc.into());
        self
    }

    /// Builds the card details.
    ///
    /// # Errors
    ///
    /// [`AccessCheckoutError::IllegalArgument`] if the expiry date is not
    /// `MM/YY` or `MMYY`.
    pub fn build(mut self) -> Result<CardDetails, AccessCheckoutError> {
        let expiry_date = self
            .expiry_date
            .as_deref()
            .map(ExpiryDate::parse)
            .transpose()
            .map_err(|e| AccessCheckoutError::illegal_argument(e.to_string()))?;

        Ok(CardDetails {
            pan: self.pan.take(),
            expiry_date,
            cvc: self.cvc.take(),
        })
    }
}

impl Drop for CardDetailsBuilder {
    fn drop(&mut self) {
        if let Some(pan) = self.pan.as_mut() {
            pan.zeroize();
        }
        if let Some(cvc) = self.cvc.as_mut() {
            cvc.zeroize();
        }
    }
}

/// Receives the outcome of [`AccessCheckoutClient::generate_sessions`].
///
/// Called from tokio tasks.
pub trait SessionResponseListener: Send + Sync {
    /// A submit has started.
    fn on_request_started(&self) {}

    /// A submit has finished: every session reference by type, or the
    /// first error. Called once per submit.
    fn on_request_finished(
        &self,
        result: Result<HashMap<SessionType, String>, AccessCheckoutError>,
    );
}

/// Exchanges card details for session references.
#[derive(Clone)]
pub struct AccessCheckoutClient {
    base_url: String,
    checkout_id: String,
    listener: Arc<dyn SessionResponseListener>,
    sender: SessionRequestSender,
    tracker: Arc<SessionCompletionTracker>,
}

impl fmt::Debug for AccessCheckoutClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCheckoutClient")
            .field("base_url", &self.base_url)
            .field("checkout_id", &self.checkout_id)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl AccessCheckoutClient {
    /// Starts building a client.
    pub fn builder() -> AccessCheckoutClientBuilder {
        AccessCheckoutClientBuilder::default()
    }

    /// Service base URL, without a trailing `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests one session per type in `session_types`.
    ///
    /// Checks the card details first, then tells the listener the submit
    /// started and sends the requests concurrently. The listener gets one
    /// `on_request_finished` call: all references once every request
    /// succeeded, or the first error.
    ///
    /// # Returns
    ///
    /// Handles of the spawned requests. Awaiting them is optional.
    ///
    /// # Errors
    ///
    /// [`AccessCheckoutError::IllegalArgument`] when no session type is
    /// given, a field a session type needs is missing, or no tokio runtime
    /// is running. Nothing is sent in that case.
    pub fn generate_sessions(
        &self,
        card_details: &CardDetails,
        session_types: &[SessionType],
    ) -> Result<Vec<JoinHandle<()>>, AccessCheckoutError> {
        let mut types = session_types.to_vec();
        types.sort_unstable();
        types.dedup();
        if types.is_empty() {
            return Err(AccessCheckoutError::illegal_argument(
                "Expected session types to be provided but was empty",
            ));
        }

        let requests = types
            .iter()
            .map(|session_type| self.request_for(*session_type, card_details))
            .collect::<Result<Vec<_>, _>>()?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            AccessCheckoutError::illegal_argument("generate_sessions needs a running tokio runtime")
        })?;

        let flow = self.tracker.reset(requests.len());
        debug!(flow, ?types, "generating sessions");
        self.listener.on_request_started();

        let handles = requests
            .into_iter()
            .map(|request| {
                let sender = self.sender.clone();
                let tracker = Arc::clone(&self.tracker);
                let listener = Arc::clone(&self.listener);
                let base_url = self.base_url.clone();

                runtime.spawn(async move {
                    let info = sender.send_session_request(&request, &base_url).await;
                    let href = info.result.map(|response| response.links.endpoints.href);

                    match tracker.record(flow, info.session_type, href) {
                        Completion::Succeeded(sessions) => {
                            listener.on_request_finished(Ok(sessions))
                        }
                        Completion::Failed(error) => listener.on_request_finished(Err(error)),
                        Completion::Pending | Completion::Ignored => {}
                    }
                })
            })
            .collect();

        Ok(handles)
    }

    fn request_for(
        &self,
        session_type: SessionType,
        card_details: &CardDetails,
    ) -> Result<SessionRequest, AccessCheckoutError> {
        let cvc = required(card_details.cvc(), "cvc")?;

        match session_type {
            SessionType::Card => {
                let pan = required(card_details.pan(), "pan")?;
                let expiry_date = card_details
                    .expiry_date()
                    .ok_or_else(|| missing("expiry date"))?;

                Ok(SessionRequest::Card(CardSessionRequest::new(
                    pan,
                    expiry_date,
                    cvc,
                    self.checkout_id.as_str(),
                )))
            }
            SessionType::Cvc => Ok(SessionRequest::Cvc(CvcSessionRequest::new(
                cvc,
                self.checkout_id.as_str(),
            ))),
        }
    }
}

fn missing(field: &str) -> AccessCheckoutError {
    AccessCheckoutError::illegal_argument(format!("Expected {field} to be provided but was not"))
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AccessCheckoutError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| missing(field))
}

/// Builder for [`AccessCheckoutClient`].
///
/// Base URL, checkout id and listener are required.
#[derive(Default)]
pub struct AccessCheckoutClientBuilder {
    base_url: Option<String>,
    checkout_id: Option<String>,
    listener: Option<Arc<dyn SessionResponseListener>>,
    config: ClientConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    cache: Option<Arc<DiscoveryCache>>,
    tracker: Option<Arc<SessionCompletionTracker>>,
}

impl AccessCheckoutClientBuilder {
    /// Service base URL, e.g. `https://try.access.worldpay.com/`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// The merchant's checkout id, sent as `identity`.
    pub fn checkout_id(mut self, checkout_id: impl Into<String>) -> Self {
        self.checkout_id = Some(checkout_id.into());
        self
    }

    /// Receives submit outcomes.
    pub fn listener(mut self, listener: Arc<dyn SessionResponseListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Timeouts, limits and headers.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the reqwest transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shares a discovery cache with other clients.
    pub fn discovery_cache(mut self, cache: Arc<DiscoveryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Shares a completion tracker.
    pub fn tracker(mut self, tracker: Arc<SessionCompletionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// [`AccessCheckoutError::IllegalArgument`] when a required value is
    /// missing or blank, or [`AccessCheckoutError::Http`] if the default
    /// transport cannot be created.
    pub fn build(self) -> Result<AccessCheckoutClient, AccessCheckoutError> {
        let base_url = self
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| missing("base url"))?;
        let checkout_id = self
            .checkout_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| missing("checkout id"))?;
        let listener = self.listener.ok_or_else(|| missing("session response listener"))?;

        let config = self.config;
        let http = match self.transport {
            Some(transport) => HttpClient::new(transport),
            None => HttpClient::with_timeouts(config.connect_timeout, config.read_timeout)?,
        }
        .with_max_redirects(config.max_redirects);

        let discovery = ApiDiscoveryClient::new(http.clone(), self.cache.unwrap_or_default())
            .with_max_attempts(config.max_discovery_attempts);
        let sender = SessionRequestSender::new(discovery, http).with_sdk_header(config.sdk_header);

        Ok(AccessCheckoutClient {
            base_url,
            checkout_id,
            listener,
            sender,
            tracker: self.tracker.unwrap_or_default(),
        })
    }
}
