//! HTTPS client used for discovery, card configuration and session requests.
//!
//! The wire exchange sits behind the [`HttpTransport`] trait so the
//! status-code handling in [`HttpClient`] can be driven by a scripted
//! transport in tests. [`ReqwestTransport`] is the production transport.
//!
//! Status handling:
//!
//! | Status | Outcome |
//! |--------|---------|
//! | 2xx | body returned |
//! | 3xx | same request re-sent to `Location` |
//! | 4xx | [`HttpError::Client`] if the body is a structured API error, else [`HttpError::ClientStatus`] |
//! | 5xx | [`HttpError::Server`] |
//! | anything else | [`HttpError::UnexpectedStatus`] |

use crate::error::{ClientError, HttpError};
use async_trait::async_trait;
use reqwest::header::{CONNECTION, LOCATION};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on followed redirects.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

const CONNECTION_FAILURE: &str = "An exception was thrown when trying to establish a connection";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

/// A request handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Extra headers, sent in order.
    pub headers: Vec<(String, String)>,
    /// Body for POST requests.
    pub body: Option<String>,
}

/// What a transport got back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase for the status.
    pub reason: String,
    /// `Location` header, if any.
    pub location: Option<String>,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// A response with the canonical reason phrase for `status`.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();

        Self {
            status,
            reason,
            location: None,
            body: body.into(),
        }
    }

    /// Sets the `Location` header.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Performs a single HTTP exchange without following redirects.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request and returns whatever status came back.
    ///
    /// Only failures to get a response at all are errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the given timeouts and redirects disabled.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Transport`] if the TLS backend cannot be set up.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder.header(CONNECTION, "close");

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            location,
            body,
        })
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string();
        if message.is_empty() {
            Self::Transport(CONNECTION_FAILURE.to_string())
        } else {
            Self::Transport(message)
        }
    }
}

/// Status-aware client over any [`HttpTransport`].
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn HttpTransport>,
    max_redirects: usize,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Wraps a transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Client over [`ReqwestTransport`] with the given timeouts.
    ///
    /// # Errors
    ///
    /// See [`ReqwestTransport::new`].
    pub fn with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::new(connect_timeout, read_timeout)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Limits how many redirects one request may follow.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// GET `url` and return the body of the final 2xx response.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`]; see the module docs for the status mapping.
    pub async fn get(&self, url: &Url, headers: &[(String, String)]) -> Result<String, HttpError> {
        self.send(HttpRequest {
            method: Method::Get,
            url: url.clone(),
            headers: headers.to_vec(),
            body: None,
        })
        .await
    }

    /// POST `body` to `url` and return the body of the final 2xx response.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`]; see the module docs for the status mapping.
    pub async fn post(
        &self,
        url: &Url,
        body: String,
        headers: &[(String, String)],
    ) -> Result<String, HttpError> {
        self.send(HttpRequest {
            method: Method::Post,
            url: url.clone(),
            headers: headers.to_vec(),
            body: Some(body),
        })
        .await
    }

    async fn send(&self, mut request: HttpRequest) -> Result<String, HttpError> {
        for _ in 0..=self.max_redirects {
            let response = self.transport.execute(request.clone()).await?;

            match response.status {
                200..=299 => return Ok(response.body),
                300..=399 => {
                    let location = response.location.ok_or(HttpError::MissingLocation {
                        status: response.status,
                    })?;
                    let target = request
                        .url
                        .join(&location)
                        .map_err(|_| HttpError::InvalidUrl(location.clone()))?;

                    debug!(
                        status = response.status,
                        from = %request.url,
                        to = %target,
                        "following redirect"
                    );
                    request.url = target;
                }
                400..=499 => return Err(client_error(response)),
                500..=599 => {
                    return Err(HttpError::Server {
                        status: response.status,
                        message: response.reason,
                    })
                }
                _ => {
                    return Err(HttpError::UnexpectedStatus {
                        status: response.status,
                        message: response.reason,
                    })
                }
            }
        }

        Err(HttpError::TooManyRedirects(self.max_redirects))
    }
}

fn client_error(response: HttpResponse) -> HttpError {
    match serde_json::from_str::<ClientError>(&response.body) {
        Ok(error) => HttpError::Client(error),
        Err(_) => HttpError::ClientStatus {
            status: response.status,
            message: response.reason,
            body: response.body,
        },
    }
}
