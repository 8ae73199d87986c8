//! Wire-level HTTP types handed to and returned from a `Transport`.
//!
//! # Design
//! These types describe one attempt as plain data. The engine derives a
//! fresh `HttpRequest` from a `Request` snapshot for every attempt, and the
//! transport hands back an `HttpResponse` whose body has already been read in
//! full, so nothing here owns a live connection.
//!
//! Bodies are `Bytes`: re-wrapping them per attempt is a reference-count bump
//! and the payload stays readable after any single send.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request payload together with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBody {
    pub bytes: Bytes,
    pub media_type: String,
}

impl HttpBody {
    pub fn new(bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }
}

/// One attempt's request, described as plain data.
///
/// `timeout` is the per-attempt deadline the engine is enforcing. Transports
/// that block a thread should apply it to their own I/O as well.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// First value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reason phrase, falling back to `HTTP <status>` when none was sent.
    pub fn reason_phrase(&self) -> String {
        match &self.reason {
            Some(reason) if !reason.is_empty() => reason.clone(),
            _ => format!("HTTP {}", self.status),
        }
    }
}
