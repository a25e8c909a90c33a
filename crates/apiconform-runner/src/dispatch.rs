//! Request dispatch over one shared HTTP session
//!
//! The `Session` is created once per run and passed by reference to every
//! dispatch. Requests are always GET, never retried, and the response is
//! returned whatever its status code.

use std::time::{Duration, Instant};

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use apiconform_core::config::{BasicAuth, RunConfig};
use apiconform_core::envelope::{RequestSpec, ResponseEnvelope};

/// Connection pool, base URL and credentials shared by all scenarios.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    base_url: Url,
    headers: Vec<(String, String)>,
    auth: Option<BasicAuth>,
}

impl Session {
    /// Build the session from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the base URL or a header is invalid, or the
    /// HTTP client cannot be built.
    pub fn new(config: &RunConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(format!(
                "{}: cannot be used as a base URL",
                config.base_url
            )));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.sort();
        for (key, value) in &headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| TransportError::Client(format!("header '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Client(format!("header '{key}': {e}")))?;
            default_headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .default_headers(default_headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            headers,
            auth: config.auth.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Configured headers, sorted by name.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Absolute URL for a request: base URL + substituted path + query.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidUrl` if the base URL cannot take path segments.
    pub fn url_for(&self, spec: &RequestSpec) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                TransportError::InvalidUrl(format!("{}: cannot be used as a base URL", self.base_url))
            })?;
            segments.pop_if_empty();
            for segment in spec.segments() {
                segments.push(&segment);
            }
        }
        if !spec.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&spec.query);
        }
        Ok(url)
    }
}

/// Send one GET request and capture the response.
///
/// # Errors
///
/// Returns `TransportError` if the request cannot be sent or the body cannot
/// be read. Non-2xx statuses are not errors.
pub fn dispatch(session: &Session, spec: &RequestSpec) -> Result<ResponseEnvelope, TransportError> {
    let url = session.url_for(spec)?;
    debug!(url = %url, "GET");

    let mut request = session.client.get(url.clone());
    if let Some(auth) = &session.auth {
        request = request.basic_auth(&auth.username, auth.password.as_ref());
    }

    let start = Instant::now();
    let response = request
        .send()
        .map_err(|e| TransportError::Http(error_chain(&e)))?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let raw_body = response
        .text()
        .map_err(|e| TransportError::Http(error_chain(&e)))?;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let body = if raw_body.trim().is_empty() {
        None
    } else {
        serde_json::from_str(&raw_body).ok()
    };
    debug!(status, elapsed_ms, body = %raw_body, "response");

    Ok(ResponseEnvelope {
        url: url.to_string(),
        status,
        content_type,
        elapsed_ms,
        body,
        raw_body,
    })
}

/// `outer: inner: root` cause chain of an error.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("HTTP client error: {0}")]
    Client(String),
}
