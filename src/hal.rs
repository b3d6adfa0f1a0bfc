//! Reading HAL link documents.
//!
//! Discovery and session responses share one shape:
//!
//! ```json
//! {
//!   "_links": {
//!     "sessions:session": { "href": "https://..." },
//!     "curies": [{ "href": "https://.../rels/sessions/{rel}", "name": "sessions", "templated": true }]
//!   }
//! }
//! ```
//!
//! Values are checked property by property so a bad document reports the
//! exact property at fault.

use crate::error::DeserializationError;
use serde::Serialize;
use serde_json::{Map, Value};

const LINKS: &str = "_links";
const HREF: &str = "href";
const CURIES: &str = "curies";

/// A compact URI declaration from the `curies` array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Curie {
    /// URI template, e.g. `https://access.worldpay.com/rels/sessions{rel}.json`.
    pub href: String,
    /// Prefix the template stands for, e.g. `sessions`.
    pub name: String,
    /// Whether `href` is a template.
    pub templated: bool,
}

/// The `_links` object of a parsed response.
#[derive(Debug, Clone, PartialEq)]
pub struct HalDocument {
    links: Map<String, Value>,
}

impl HalDocument {
    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// - [`DeserializationError::EmptyBody`] for an empty body.
    /// - [`DeserializationError::MalformedJson`] when the body is not JSON.
    /// - [`DeserializationError::MissingObject`] when `_links` is absent.
    ///
    /// # Example
    ///
    /// ```
    /// use access_checkout::hal::HalDocument;
    ///
    /// let doc = HalDocument::parse(r#"{"_links": {"service:sessions": {"href": "https://example.com/sessions"}}}"#).unwrap();
    /// assert_eq!(doc.href("service:sessions").unwrap().as_deref(), Some("https://example.com/sessions"));
    /// assert_eq!(doc.href("service:tokens").unwrap(), None);
    /// ```
    pub fn parse(body: &str) -> Result<Self, DeserializationError> {
        if body.is_empty() {
            return Err(DeserializationError::EmptyBody);
        }

        let value: Value = serde_json::from_str(body)
            .map_err(|_| DeserializationError::MalformedJson(body.to_string()))?;

        match value.get(LINKS) {
            Some(Value::Object(links)) => Ok(Self {
                links: links.clone(),
            }),
            _ => Err(DeserializationError::MissingObject(LINKS.to_string())),
        }
    }

    /// The `href` of `relation`, or `None` if the relation is absent.
    ///
    /// # Errors
    ///
    /// - [`DeserializationError::MissingObject`] when the relation is not an object.
    /// - [`DeserializationError::MissingProperty`] when it has no `href`.
    /// - [`DeserializationError::InvalidPropertyType`] when `href` is not a string.
    pub fn href(&self, relation: &str) -> Result<Option<String>, DeserializationError> {
        let Some(link) = self.links.get(relation) else {
            return Ok(None);
        };
        let Value::Object(link) = link else {
            return Err(DeserializationError::MissingObject(relation.to_string()));
        };

        string_property(link, HREF).map(Some)
    }

    /// The `curies` array. Absent means empty.
    ///
    /// # Errors
    ///
    /// Each curie needs string `href` and `name` and a boolean `templated`.
    pub fn curies(&self) -> Result<Vec<Curie>, DeserializationError> {
        let items = match self.links.get(CURIES) {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(DeserializationError::MissingArray(CURIES.to_string())),
        };

        items
            .iter()
            .map(|item| {
                let Value::Object(curie) = item else {
                    return Err(DeserializationError::MissingObject(CURIES.to_string()));
                };
                Ok(Curie {
                    href: string_property(curie, HREF)?,
                    name: string_property(curie, "name")?,
                    templated: bool_property(curie, "templated")?,
                })
            })
            .collect()
    }
}

fn property<'a>(
    object: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Value, DeserializationError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(DeserializationError::MissingProperty(field.to_string())),
        Some(value) => Ok(value),
    }
}

fn string_property(
    object: &Map<String, Value>,
    field: &str,
) -> Result<String, DeserializationError> {
    property(object, field)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| DeserializationError::InvalidPropertyType {
            property: field.to_string(),
            expected: "String",
        })
}

fn bool_property(object: &Map<String, Value>, field: &str) -> Result<bool, DeserializationError> {
    property(object, field)?
        .as_bool()
        .ok_or_else(|| DeserializationError::InvalidPropertyType {
            property: field.to_string(),
            expected: "Boolean",
        })
}
