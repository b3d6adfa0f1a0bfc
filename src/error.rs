//! Error types for discovery, session requests and card configuration.
//!
//! Validation of card fields never produces errors: a PAN that fails Luhn is
//! an ordinary `false` in a [`ValidationResult`](crate::ValidationResult).
//! The types here cover the network side of the SDK and the remote rule
//! configuration.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = AccessCheckoutError> = std::result::Result<T, E>;

/// Top-level error delivered to session and discovery callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessCheckoutError {
    /// Endpoint discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A response body could not be interpreted.
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    /// An HTTP request failed or the server returned an error status.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The card configuration document was unusable.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The caller supplied an unusable argument.
    #[error("{0}")]
    IllegalArgument(String),
}

impl AccessCheckoutError {
    /// Builds an [`AccessCheckoutError::IllegalArgument`].
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument(message.into())
    }

    /// Returns the structured API error, if the server sent one.
    ///
    /// Looks through discovery failures as well, so a 400 from a discovery
    /// hop is reachable the same way as a 400 from the session POST.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::Http(HttpError::Client(error))
            | Self::Discovery(DiscoveryError::Request(HttpError::Client(error))) => Some(error),
            _ => None,
        }
    }
}

/// Failures while resolving an endpoint through the discovery link chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// The base URL was blank.
    #[error("No URL supplied")]
    NoUrl,

    /// The base URL or a discovered href is not a valid URL.
    #[error("Invalid URL supplied: {0}")]
    InvalidUrl(String),

    /// A discovery document did not contain the requested relation.
    #[error("Could not discover endpoint: link '{relation}' not found")]
    LinkNotFound {
        /// Relation name that was looked up, e.g. `service:sessions`.
        relation: String,
    },

    /// A discovery document was not a valid links document.
    #[error("Could not discover endpoint: {0}")]
    Document(#[from] DeserializationError),

    /// No connection could be made, or the server answered with an error.
    #[error("Could not discover endpoint: {0}")]
    Request(#[from] HttpError),
}

/// Failures while interpreting a JSON response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeserializationError {
    /// The body was empty.
    #[error("Cannot deserialize empty string")]
    EmptyBody,

    /// The body was not JSON.
    #[error("Cannot interpret json: {0}")]
    MalformedJson(String),

    /// A required property was absent.
    #[error("Missing property: '{0}'")]
    MissingProperty(String),

    /// A required object was absent or not an object.
    #[error("Missing object: '{0}'")]
    MissingObject(String),

    /// A required array was absent or not an array.
    #[error("Missing array: '{0}'")]
    MissingArray(String),

    /// A property had an unexpected JSON type.
    #[error("Invalid property type: '{property}', expected '{expected}'")]
    InvalidPropertyType {
        /// Name of the property.
        property: String,
        /// JSON type that was expected.
        expected: &'static str,
    },
}

/// Failures of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// A 4xx response carrying a structured API error.
    #[error("{0}")]
    Client(ClientError),

    /// A 4xx response whose body was not a structured API error.
    #[error("Error message was: {message}. Error response was: {body}")]
    ClientStatus {
        /// HTTP status code.
        status: u16,
        /// Status reason phrase.
        message: String,
        /// Raw response body.
        body: String,
    },

    /// A 5xx response.
    #[error("A server error occurred when trying to make the request ({status} {message})")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Status reason phrase.
        message: String,
    },

    /// No connection could be made, or the exchange timed out.
    #[error("{0}")]
    Transport(String),

    /// A status outside 2xx-5xx.
    #[error("Unexpected HTTP response code: {status} {message}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Status reason phrase, if the code has one.
        message: String,
    },

    /// A 3xx response without a `Location` header.
    #[error(
        "Response from server was a redirect HTTP response code: {status} but did not include a Location header"
    )]
    MissingLocation {
        /// HTTP status code.
        status: u16,
    },

    /// The redirect chain was longer than the configured limit.
    #[error("Too many redirects: gave up after {0}")]
    TooManyRedirects(usize),

    /// A URL (usually a `Location` header) could not be parsed.
    #[error("Invalid URL supplied: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// Returns the HTTP status code for errors raised from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client(error) => Some(error.error_name.status_code()),
            Self::ClientStatus { status, .. }
            | Self::Server { status, .. }
            | Self::UnexpectedStatus { status, .. }
            | Self::MissingLocation { status } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` when no response was received at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Problems with a card configuration document.
///
/// These never reach callers; the configuration parser logs them and
/// falls back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The document was not a JSON array of brands.
    #[error("Invalid card configuration document: {0}")]
    Malformed(String),

    /// A matcher pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern as it appeared in the document.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },
}

/// A structured error body returned by the Access API on 4xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{error_name}: {message}")]
pub struct ClientError {
    /// Machine-readable error name.
    pub error_name: ApiErrorName,
    /// Human-readable message.
    pub message: String,
    /// Per-field problems, present for schema failures.
    #[serde(default)]
    pub validation_errors: Vec<ValidationRule>,
}

/// Error names the Access API uses in client error bodies.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiErrorName {
    BodyIsNotJson,
    BodyIsEmpty,
    BodyDoesNotMatchSchema,
    ResourceNotFound,
    EndpointNotFound,
    MethodNotAllowed,
    UnsupportedAcceptHeader,
    UnsupportedContentType,
    InternalErrorOccurred,
    #[serde(other)]
    UnknownError,
}

impl ApiErrorName {
    /// HTTP status the API pairs with this error name.
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BodyIsNotJson | Self::BodyIsEmpty | Self::BodyDoesNotMatchSchema => 400,
            Self::ResourceNotFound | Self::EndpointNotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::UnsupportedAcceptHeader => 406,
            Self::UnsupportedContentType => 415,
            Self::InternalErrorOccurred | Self::UnknownError => 500,
        }
    }

    /// Wire name of the error.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BodyIsNotJson => "bodyIsNotJson",
            Self::BodyIsEmpty => "bodyIsEmpty",
            Self::BodyDoesNotMatchSchema => "bodyDoesNotMatchSchema",
            Self::ResourceNotFound => "resourceNotFound",
            Self::EndpointNotFound => "endpointNotFound",
            Self::MethodNotAllowed => "methodNotAllowed",
            Self::UnsupportedAcceptHeader => "unsupportedAcceptHeader",
            Self::UnsupportedContentType => "unsupportedContentType",
            Self::InternalErrorOccurred => "internalErrorOccurred",
            Self::UnknownError => "unknownError",
        }
    }
}

impl fmt::Display for ApiErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level problem inside a [`ClientError`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    /// Machine-readable rule name.
    pub error_name: ValidationRuleName,
    /// Human-readable message.
    pub message: String,
    /// JSON path of the offending field, e.g. `$.cardNumber`.
    #[serde(default)]
    pub json_path: String,
}

/// Field-level rule names the Access API reports.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationRuleName {
    UnrecognizedField,
    FieldHasInvalidValue,
    PanFailedLuhnCheck,
    FieldIsMissing,
    StringIsTooShort,
    StringIsTooLong,
    FieldMustBeInteger,
    IntegerIsTooSmall,
    IntegerIsTooLarge,
    FieldMustBeNumber,
    FieldMustBeString,
    FieldMustBeBoolean,
    FieldMustBeObject,
    FieldMustBeArray,
    FieldIsNull,
    FieldIsEmpty,
    FieldIsNotAllowed,
    NumberIsTooSmall,
    NumberIsTooLarge,
    StringFailedRegexCheck,
    DateHasInvalidFormat,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_messages() {
        assert_eq!(DiscoveryError::NoUrl.to_string(), "No URL supplied");
        assert_eq!(
            DiscoveryError::InvalidUrl("nope".into()).to_string(),
            "Invalid URL supplied: nope"
        );
    }

    #[test]
    fn test_missing_location_message() {
        let err = HttpError::MissingLocation { status: 301 };
        assert_eq!(
            err.to_string(),
            "Response from server was a redirect HTTP response code: 301 but did not include a Location header"
        );
        assert_eq!(err.status(), Some(301));
    }

    #[test]
    fn test_client_error_deserializes() {
        let body = r#"{
            "errorName": "bodyDoesNotMatchSchema",
            "message": "bodyDoesNotMatchSchema",
            "validationErrors": [
                {"errorName": "panFailedLuhnCheck", "message": "The identified field contains a PAN that has failed the Luhn check.", "jsonPath": "$.cardNumber"}
            ]
        }"#;

        let error: ClientError = serde_json::from_str(body).unwrap();
        assert_eq!(error.error_name, ApiErrorName::BodyDoesNotMatchSchema);
        assert_eq!(error.validation_errors.len(), 1);
        assert_eq!(
            error.validation_errors[0].error_name,
            ValidationRuleName::PanFailedLuhnCheck
        );
        assert_eq!(error.validation_errors[0].json_path, "$.cardNumber");
    }

    #[test]
    fn test_unknown_error_names_are_tolerated() {
        let body = r#"{"errorName": "somethingNew", "message": "x",
            "validationErrors": [{"errorName": "alsoNew", "message": "y", "jsonPath": "$.a"}]}"#;

        let error: ClientError = serde_json::from_str(body).unwrap();
        assert_eq!(error.error_name, ApiErrorName::UnknownError);
        assert_eq!(error.validation_errors[0].error_name, ValidationRuleName::Unknown);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiErrorName::BodyIsEmpty.status_code(), 400);
        assert_eq!(ApiErrorName::EndpointNotFound.status_code(), 404);
        assert_eq!(ApiErrorName::UnsupportedContentType.status_code(), 415);
    }

    #[test]
    fn test_client_error_lookup() {
        let client = ClientError {
            error_name: ApiErrorName::BodyIsEmpty,
            message: "empty".into(),
            validation_errors: vec![],
        };

        let direct = AccessCheckoutError::from(HttpError::Client(client.clone()));
        assert_eq!(direct.client_error(), Some(&client));

        let via_discovery =
            AccessCheckoutError::from(DiscoveryError::Request(HttpError::Client(client.clone())));
        assert_eq!(via_discovery.client_error(), Some(&client));

        assert!(AccessCheckoutError::from(DiscoveryError::NoUrl).client_error().is_none());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AccessCheckoutError>();
    }
}
