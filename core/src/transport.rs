//! The network seam: one `send` per attempt.
//!
//! # Design
//! The engine only needs `send(HttpRequest) -> HttpResponse | TransportError`
//! with the body already read, so `Transport` is that one async method.
//! Tests plug in stubs; `UreqTransport` is the production implementation.
//!
//! ureq is blocking, so each attempt runs on tokio's blocking pool. The
//! engine's per-attempt deadline only stops waiting for the result, so the
//! same deadline is also handed to ureq to make it abandon the socket.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one round trip and read the response body in full.
    ///
    /// Non-2xx responses are returned as `Ok`; `Err` is reserved for attempts
    /// that produced no usable response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `Transport` backed by a `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a caller-configured agent. It should be built with
    /// `http_status_as_error(false)` so error statuses come back as responses.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute(&agent, request))
            .await
            .map_err(TransportError::unexpected)?
    }
}

fn execute(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    trace!(method = %request.method, url = %request.url, "ureq round trip");

    let timeout = request.timeout;
    let wire = build_wire(request)?;
    let wire = match timeout {
        Some(timeout) => agent
            .configure_request(wire)
            .timeout_global(Some(timeout))
            .build(),
        None => wire,
    };

    let mut response = agent.run(wire).map_err(map_ureq_error)?;

    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = response.body_mut().read_to_vec().map_err(map_ureq_error)?;

    Ok(HttpResponse {
        status: status.as_u16(),
        reason: status.canonical_reason().map(str::to_string),
        headers,
        body: Bytes::from(body),
    })
}

/// Convert to an `http::Request`. The body's media type becomes the
/// `content-type` header unless the caller already set one.
fn build_wire(request: HttpRequest) -> Result<ureq::http::Request<Vec<u8>>, TransportError> {
    let has_content_type = request.header("content-type").is_some();
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let body = match request.body {
        Some(body) => {
            if !has_content_type {
                builder = builder.header("content-type", body.media_type.as_str());
            }
            body.bytes.to_vec()
        }
        None => Vec::new(),
    };
    builder.body(body).map_err(TransportError::unexpected)
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(timeout) => TransportError::Timeout(timeout.to_string()),
        ureq::Error::StatusCode(status) => TransportError::Network {
            status: Some(status),
            message: format!("HTTP {status}"),
        },
        ureq::Error::BadUri(uri) => TransportError::unexpected(format!("invalid uri: {uri}")),
        ureq::Error::Io(io_err) if io_err.kind() == io::ErrorKind::TimedOut => {
            TransportError::Timeout(io_err.to_string())
        }
        other => TransportError::network(other.to_string()),
    }
}
