//! Endpoint discovery by following HAL links.
//!
//! The service publishes one root document. A [`DiscoverLinks`] chain names
//! the relation to follow at each hop, for example `service:sessions` in
//! the root document and then `sessions:card` in the sessions document.
//! Resolved URLs are cached in a [`DiscoveryCache`] so a submit does not
//! walk the chain again.
//!
//! Failures are cached too. A chain that failed is tried again on the
//! next call, up to a fixed number of attempts; after that the cached
//! error is returned without touching the network.
//!
//! # Example
//!
//! ```no_run
//! use access_checkout::discovery::{ApiDiscoveryClient, DiscoverLinks, DiscoveryCache};
//! use access_checkout::http::HttpClient;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> access_checkout::Result<()> {
//! let http = HttpClient::with_timeouts(Duration::from_secs(30), Duration::from_secs(30))?;
//! let client = ApiDiscoveryClient::new(http, Arc::new(DiscoveryCache::new()));
//!
//! let url = client
//!     .discover("https://try.access.worldpay.com", &DiscoverLinks::card_sessions())
//!     .await?;
//! println!("card sessions at {url}");
//! # Ok(())
//! # }
//! ```

use crate::error::{AccessCheckoutError, DiscoveryError};
use crate::hal::HalDocument;
use crate::http::HttpClient;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;
use url::Url;

/// Relation of the sessions service in the root document.
pub const SERVICE_SESSIONS: &str = "service:sessions";

/// Relation of the card sessions endpoint.
pub const SESSIONS_CARD: &str = "sessions:card";

/// Relation of the CVC sessions endpoint.
pub const SESSIONS_PAYMENTS_CVC: &str = "sessions:paymentsCvc";

/// Media type of the sessions API.
pub const SESSIONS_MEDIA_TYPE: &str = "application/vnd.worldpay.sessions-v1.hal+json";

/// Attempts made for a failing chain before its error is returned as is.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// One hop of a discovery chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    relation: String,
    headers: Vec<(String, String)>,
}

impl Endpoint {
    /// A hop following `relation`.
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            headers: Vec::new(),
        }
    }

    /// Adds a header to the GET that fetches the document holding the
    /// relation.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Relation name.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Headers for this hop.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// An ordered chain of relations leading to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoverLinks {
    endpoints: Vec<Endpoint>,
}

impl DiscoverLinks {
    /// A chain over the given hops.
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    /// `service:sessions` then `sessions:card`.
    pub fn card_sessions() -> Self {
        Self::sessions(SESSIONS_CARD)
    }

    /// `service:sessions` then `sessions:paymentsCvc`.
    pub fn cvc_sessions() -> Self {
        Self::sessions(SESSIONS_PAYMENTS_CVC)
    }

    fn sessions(relation: &str) -> Self {
        Self::new(vec![
            Endpoint::new(SERVICE_SESSIONS),
            Endpoint::new(relation)
                .with_header("Accept", SESSIONS_MEDIA_TYPE)
                .with_header("Content-Type", SESSIONS_MEDIA_TYPE),
        ])
    }

    /// Hops in order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Identity of the chain, e.g. `service:sessions > sessions:card`.
    pub fn cache_key(&self) -> String {
        self.endpoints
            .iter()
            .map(Endpoint::relation)
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

type Outcome = Result<Url, AccessCheckoutError>;

/// Cached state of one chain.
#[derive(Debug, Default)]
struct CacheEntry {
    attempts: AtomicU32,
    outcome: Mutex<Option<Outcome>>,
}

impl CacheEntry {
    fn outcome(&self) -> Option<Outcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Stores an outcome and returns the attempt count including it.
    fn record(&self, outcome: Outcome) -> u32 {
        let attempts = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        attempts
    }
}

/// Resolved endpoints and fetched discovery documents.
///
/// Share one cache between clients with an `Arc` to resolve each chain once
/// per process. Chains are keyed by base URL and relations, so chains with
/// a common first hop do not collide.
#[derive(Default)]
pub struct DiscoveryCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    documents: RwLock<HashMap<Url, String>>,
}

impl fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("DiscoveryCache")
            .field("chains", &entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl DiscoveryCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<CacheEntry> {
        if let Some(entry) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key.to_string()).or_default())
    }

    /// Cached URL for a chain, if it resolved.
    pub fn get(&self, base_url: &Url, links: &DiscoverLinks) -> Option<Url> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&chain_key(base_url, links))?.outcome() {
            Some(Ok(url)) => Some(url),
            _ => None,
        }
    }

    /// Attempts made for a chain so far.
    pub fn attempts(&self, base_url: &Url, links: &DiscoverLinks) -> u32 {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&chain_key(base_url, links))
            .map_or(0, |entry| entry.attempts.load(Ordering::SeqCst))
    }

    /// Forgets everything.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn document(&self, url: &Url) -> Option<String> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    fn store_document(&self, url: Url, body: String) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url, body);
    }

    fn forget_documents<'a>(&self, urls: impl IntoIterator<Item = &'a Url>) {
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        for url in urls {
            documents.remove(url);
        }
    }
}

fn chain_key(base_url: &Url, links: &DiscoverLinks) -> String {
    format!("{base_url} {}", links.cache_key())
}

/// Parses a service base URL.
///
/// # Errors
///
/// [`DiscoveryError::NoUrl`] for blank input and
/// [`DiscoveryError::InvalidUrl`] for input that is not an absolute URL.
pub fn parse_base_url(base_url: &str) -> Result<Url, DiscoveryError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::NoUrl);
    }

    Url::parse(trimmed).map_err(|_| DiscoveryError::InvalidUrl(trimmed.to_string()))
}

/// Resolves [`DiscoverLinks`] against a service, through a cache.
#[derive(Debug, Clone)]
pub struct ApiDiscoveryClient {
    http: HttpClient,
    cache: Arc<DiscoveryCache>,
    max_attempts: u32,
}

impl ApiDiscoveryClient {
    /// A client using `http` and sharing `cache`.
    pub fn new(http: HttpClient, cache: Arc<DiscoveryCache>) -> Self {
        Self {
            http,
            cache,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets how often a failing chain is tried before its error sticks.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// The cache in use.
    pub fn cache(&self) -> &Arc<DiscoveryCache> {
        &self.cache
    }

    /// Resolves `links` against `base_url`.
    ///
    /// # Errors
    ///
    /// Any [`DiscoveryError`], wrapped in [`AccessCheckoutError::Discovery`]:
    /// - a blank or unparsable base URL;
    /// - a request that failed or got an error status;
    /// - a document that is not a links document or lacks the relation;
    /// - an `href` that is not a URL.
    pub async fn discover(
        &self,
        base_url: &str,
        links: &DiscoverLinks,
    ) -> Result<Url, AccessCheckoutError> {
        let base = parse_base_url(base_url)?;
        let entry = self.cache.entry(&chain_key(&base, links));

        match entry.outcome() {
            Some(Ok(url)) => {
                debug!(chain = %links.cache_key(), %url, "discovery cache hit");
                return Ok(url);
            }
            Some(Err(error)) if entry.attempts.load(Ordering::SeqCst) >= self.max_attempts => {
                debug!(
                    chain = %links.cache_key(),
                    %error,
                    "discovery failed too often, returning cached error"
                );
                return Err(error);
            }
            Some(Err(_)) => entry.clear(),
            None => {}
        }

        let outcome = self.resolve(base, links).await;
        let attempts = entry.record(outcome.clone());
        debug!(
            chain = %links.cache_key(),
            attempts,
            success = outcome.is_ok(),
            "discovery finished"
        );
        outcome
    }

    /// Runs [`discover`](Self::discover) on the tokio runtime and hands the
    /// result to `callback`.
    pub fn discover_with_callback<F>(
        &self,
        base_url: impl Into<String>,
        links: DiscoverLinks,
        callback: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(Result<Url, AccessCheckoutError>) + Send + 'static,
    {
        let client = self.clone();
        let base_url = base_url.into();
        tokio::spawn(async move {
            callback(client.discover(&base_url, &links).await);
        })
    }

    async fn resolve(&self, base: Url, links: &DiscoverLinks) -> Outcome {
        let mut visited = Vec::with_capacity(links.endpoints().len());
        let result = self.follow(base, links, &mut visited).await;

        if result.is_err() {
            // The documents may be stale; fetch them afresh next time.
            self.cache.forget_documents(&visited);
        }
        result
    }

    async fn follow(&self, base: Url, links: &DiscoverLinks, visited: &mut Vec<Url>) -> Outcome {
        let mut current = base;

        for endpoint in links.endpoints() {
            let body = match self.cache.document(&current) {
                Some(body) => body,
                None => {
                    debug!(
                        url = %current,
                        relation = endpoint.relation(),
                        "fetching discovery document"
                    );
                    let body = self
                        .http
                        .get(&current, endpoint.headers())
                        .await
                        .map_err(DiscoveryError::Request)?;
                    self.cache.store_document(current.clone(), body.clone());
                    body
                }
            };
            visited.push(current.clone());

            let href = HalDocument::parse(&body)
                .and_then(|doc| doc.href(endpoint.relation()))
                .map_err(DiscoveryError::Document)?
                .ok_or_else(|| DiscoveryError::LinkNotFound {
                    relation: endpoint.relation().to_string(),
                })?;

            current = current
                .join(&href)
                .map_err(|_| DiscoveryError::InvalidUrl(href))?;
        }

        Ok(current)
    }
}
