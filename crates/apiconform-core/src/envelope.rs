//! Request and response shapes exchanged with the API under test
//!
//! Responses follow the resource-envelope convention:
//! `{"data": {...}}` for a single resource, `{"data": [...]}` for a
//! collection, `{"errors": [...]}` for error responses.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A single GET request, built per test value and consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// Path template relative to the base URL, e.g. `account-indexes/{accountIndexCode}`
    pub endpoint: String,
    /// Value substituted into the path template
    pub path_param: Option<String>,
    /// Query parameters (may be empty)
    pub query: BTreeMap<String, String>,
}

impl RequestSpec {
    /// `GET endpoint?name=value&...`
    #[must_use]
    pub fn query(endpoint: impl Into<String>, query: BTreeMap<String, String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            path_param: None,
            query,
        }
    }

    /// `GET endpoint/{value}`
    #[must_use]
    pub fn path(endpoint: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            path_param: Some(value.into()),
            query: BTreeMap::new(),
        }
    }

    /// Path segments with the path parameter substituted.
    ///
    /// The first `{...}` segment receives the value; a template without a
    /// placeholder gets the value appended as the last segment.
    #[must_use]
    pub fn segments(&self) -> Vec<String> {
        let mut segments: Vec<String> = self
            .endpoint
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if let Some(value) = &self.path_param {
            match segments.iter().position(|s| is_placeholder(s)) {
                Some(idx) => segments[idx].clone_from(value),
                None => segments.push(value.clone()),
            }
        }
        segments
    }
}

/// True for a `{name}` path template segment.
#[must_use]
pub fn is_placeholder(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Status code and parsed body of one dispatched request.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub elapsed_ms: u64,
    /// Parsed JSON body, `None` when empty or not JSON
    pub body: Option<Value>,
    /// Raw body text as received
    pub raw_body: String,
}

/// Resource objects extracted from a response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData<'a> {
    Single(&'a Map<String, Value>),
    Collection(Vec<&'a Map<String, Value>>),
}

/// Why a body could not be read as an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Neither `data` nor `errors` at the top level
    #[error("body has neither `data` nor `errors`")]
    MissingEnvelope,
    /// `data`/`errors` present but holding something other than objects
    #[error("`{0}` does not hold resource objects")]
    NotResourceObjects(String),
}

impl<'a> ResourceData<'a> {
    /// Extract resource objects: `data` first, then `errors`.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError` when the body is not a resource envelope.
    pub fn from_body(body: &'a Value) -> Result<Self, EnvelopeError> {
        if let Some(data) = body.get("data") {
            return match data {
                Value::Object(obj) => Ok(Self::Single(obj)),
                Value::Array(items) => collect_objects(items, "data").map(Self::Collection),
                _ => Err(EnvelopeError::NotResourceObjects("data".into())),
            };
        }
        match body.get("errors") {
            Some(Value::Array(items)) => collect_objects(items, "errors").map(Self::Collection),
            Some(_) => Err(EnvelopeError::NotResourceObjects("errors".into())),
            None => Err(EnvelopeError::MissingEnvelope),
        }
    }

    /// Every resource object, singular or not.
    #[must_use]
    pub fn objects(&self) -> Vec<&'a Map<String, Value>> {
        match self {
            Self::Single(obj) => vec![*obj],
            Self::Collection(items) => items.clone(),
        }
    }

    #[must_use]
    pub fn is_empty_collection(&self) -> bool {
        matches!(self, Self::Collection(items) if items.is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Collection(items) => items.len(),
        }
    }
}

fn collect_objects<'a>(
    items: &'a [Value],
    key: &str,
) -> Result<Vec<&'a Map<String, Value>>, EnvelopeError> {
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| EnvelopeError::NotResourceObjects(key.to_string()))
        })
        .collect()
}

/// Attribute of a resource object: `attributes.<name>`, or `<name>` for
/// objects without an `attributes` member (error objects).
#[must_use]
pub fn attribute<'a>(resource: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    match resource.get("attributes").and_then(Value::as_object) {
        Some(attrs) => attrs.get(name),
        None => resource.get(name),
    }
}
