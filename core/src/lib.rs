//! Declarative HTTP requests with retries, timeouts and a uniform result.
//!
//! # Overview
//! A `Client` hands out `RequestBuilder`s per HTTP verb. A builder collects
//! headers, body, authorization, timeout, retry policy and observer
//! callbacks, then `send` runs the attempts through a `Transport` and
//! returns a `RequestResult`. Failures never surface as `Err`: HTTP errors,
//! timeouts and transport faults all end up in the result's state, status
//! code and error message.
//!
//! # Design
//! - Client defaults (base address, headers, authorization, timeout) are an
//!   explicit value owned by the `Client`, copied into each builder.
//! - The network sits behind the `Transport` trait. `UreqTransport` is the
//!   shipped implementation; tests use in-process stubs.
//! - Request bodies are stored as `Bytes` and re-wrapped for every attempt.
//! - Backoff strategies are pure functions of the retry index.

pub mod backoff;
pub mod client;
pub mod defaults;
mod engine;
pub mod error;
pub mod http;
pub mod request;
pub mod result;
pub mod transport;

pub use backoff::{Backoff, BackoffConfig, RetryConfig, RetryPolicy};
pub use client::Client;
pub use defaults::{Authorization, ClientDefaults};
pub use error::{ConfigError, TransportError};
pub use http::{HttpBody, HttpMethod, HttpRequest, HttpResponse};
pub use request::{Request, RequestBuilder};
pub use result::{RequestResult, RequestState};
pub use transport::{Transport, UreqTransport};
