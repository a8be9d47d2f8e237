use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

use crate::domain::{
    RestMethod, RestRequest, RestResponse, RestTransport, TransportError, UrlEscaper,
};

#[derive(Error, Debug)]
pub enum RestClientError {
    #[error("Invalid default header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Escaping applied to query values before they go on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryEscaping {
    None,
    #[default]
    Url,
}

#[derive(Debug, Clone)]
pub struct RestClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub query_escaping: QueryEscaping,
    /// Sent with every request, e.g. a static API key header
    pub default_headers: HashMap<String, String>,
}

impl RestClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        RestClientConfig {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(10),
            query_escaping: QueryEscaping::default(),
            default_headers: HashMap::new(),
        }
    }
}

/// [`RestTransport`] over reqwest
///
/// Only moves bytes: status classification and retries belong to the actor.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    query_escaping: QueryEscaping,
}

impl ReqwestTransport {
    pub fn new(config: RestClientConfig) -> Result<Self, RestClientError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let invalid = |reason: String| RestClientError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(ReqwestTransport {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            query_escaping: config.query_escaping,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &RestRequest) -> String {
        let query = match self.query_escaping {
            QueryEscaping::None => request.params.query_string(),
            QueryEscaping::Url => request.params.query_string_with(&UrlEscaper),
        };

        let mut url = format!("{}{}", self.base_url, request.path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}

#[async_trait]
impl RestTransport for ReqwestTransport {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError> {
        let url = self.url_for(&request);
        trace!(method = %request.method, url = %url, "Sending request");

        let resp = self
            .client
            .request(method(request.method), &url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let body = resp.text().await.map_err(transport_error)?;

        Ok(RestResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn method(method: RestMethod) -> Method {
    match method {
        RestMethod::Get => Method::GET,
        RestMethod::Post => Method::POST,
        RestMethod::Put => Method::PUT,
        RestMethod::Delete => Method::DELETE,
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    }
}

/// `Retry-After` in delta-seconds; HTTP-date values are ignored
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
