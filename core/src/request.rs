//! Request descriptors: the fluent `RequestBuilder` and its immutable
//! `Request` snapshot.
//!
//! # Design
//! A builder is created by one of the `Client` verb factories, which seed it
//! with the client defaults at that moment. Chained calls only record
//! configuration; nothing touches the network until `send`. `build()`
//! freezes the configuration into a `Request` that can be sent any number of
//! times, from any number of tasks.
//!
//! Each observer kind has a single slot. Registering a second `on_success`
//! replaces the first one.

use std::fmt;
use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backoff::{Backoff, RetryPolicy};
use crate::client::Client;
use crate::defaults::Authorization;
use crate::engine;
use crate::http::{HttpBody, HttpMethod, HttpRequest};
use crate::result::RequestResult;

/// Media type set by `RequestBuilder::with_json`.
pub const JSON_MEDIA_TYPE: &str = "application/json";

pub type ResultCallback = Arc<dyn Fn(&RequestResult) + Send + Sync>;

/// Receives the result so far, the retry index (1-based) and the time spent.
pub type RetryCallback = Arc<dyn Fn(&RequestResult, u32, Duration) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks {
    pub(crate) on_success: Option<ResultCallback>,
    pub(crate) on_fail: Option<ResultCallback>,
    pub(crate) on_exception: Option<ResultCallback>,
    pub(crate) on_retry: Option<RetryCallback>,
}

impl Callbacks {
    pub(crate) fn success(&self, result: &RequestResult) {
        if let Some(cb) = &self.on_success {
            cb(result);
        }
    }

    pub(crate) fn fail(&self, result: &RequestResult) {
        if let Some(cb) = &self.on_fail {
            cb(result);
        }
    }

    pub(crate) fn exception(&self, result: &RequestResult) {
        if let Some(cb) = &self.on_exception {
            cb(result);
        }
    }

    pub(crate) fn retry(&self, result: &RequestResult, attempt: u32, elapsed: Duration) {
        if let Some(cb) = &self.on_retry {
            cb(result, attempt, elapsed);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_fail", &self.on_fail.is_some())
            .field("on_exception", &self.on_exception.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

/// An immutable request description, ready to be executed.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) client: Client,
    pub(crate) method: HttpMethod,
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<HttpBody>,
    pub(crate) authorization: Option<Authorization>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) callbacks: Callbacks,
    pub(crate) build_error: Option<String>,
}

impl Request {
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&HttpBody> {
        self.body.as_ref()
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// A fresh wire request for one attempt.
    ///
    /// The body is a new `Bytes` handle over the stored payload every time,
    /// so no attempt can observe a payload consumed by an earlier one.
    pub fn to_wire(&self) -> HttpRequest {
        let mut headers = self.headers.clone();
        if let Some(auth) = &self.authorization {
            headers.push(("Authorization".to_string(), auth.header_value()));
        }
        HttpRequest {
            method: self.method,
            url: self.url.clone(),
            headers,
            body: self
                .body
                .as_ref()
                .map(|b| HttpBody::new(b.bytes.clone(), b.media_type.clone())),
            timeout: self.timeout,
        }
    }

    /// Execute the request, retrying per its policy.
    pub async fn send(&self) -> RequestResult {
        self.send_until(future::pending::<()>()).await
    }

    /// Like `send`, but gives up once `cancel` resolves.
    ///
    /// Cancellation is checked while an attempt is in flight and while
    /// waiting between attempts. A cancelled result is `Failed` with the
    /// message "request cancelled".
    pub async fn send_until<C>(&self, cancel: C) -> RequestResult
    where
        C: Future<Output = ()>,
    {
        engine::execute(self.client.transport(), self, cancel).await
    }

    /// Send and decode the payload, see `RequestResult::parse_as`.
    pub async fn send_as<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.send().await.parse_as()
    }

    /// Send and return the payload text, or an empty string.
    pub async fn send_raw(&self) -> String {
        self.send().await.raw_payload().into_owned()
    }

    /// Send and report whether the final state is `Success`.
    pub async fn send_ok(&self) -> bool {
        self.send().await.is_success()
    }
}

/// Fluent configuration for one request.
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, method: HttpMethod, url: &str) -> Self {
        let defaults = client.defaults();
        let request = Request {
            method,
            url: defaults.resolve_url(url),
            headers: defaults.headers().to_vec(),
            body: None,
            authorization: defaults.authorization().cloned(),
            timeout: defaults.timeout(),
            retry: None,
            callbacks: Callbacks::default(),
            build_error: None,
            client,
        };
        Self { request }
    }

    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), value.into()));
        self
    }

    pub fn add_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.request
            .headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Serialize `value` as the JSON body.
    ///
    /// A serialization failure is kept and reported by `send` as an `Error`
    /// result, without any network attempt.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.request.body = Some(HttpBody::new(bytes, JSON_MEDIA_TYPE));
                self.request.build_error = None;
            }
            Err(err) => {
                self.request.body = None;
                self.request.build_error = Some(format!("failed to serialize request body: {err}"));
            }
        }
        self
    }

    pub fn with_content(mut self, bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        self.request.body = Some(HttpBody::new(bytes, media_type));
        self.request.build_error = None;
        self
    }

    /// Replaces the default authorization for this request only.
    pub fn with_authorization(
        mut self,
        scheme: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.request.authorization = Some(Authorization::new(scheme, credential));
        self
    }

    /// Deadline for each attempt. Re-armed on every retry.
    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }

    /// Retry up to `max_attempts` times, one second apart.
    pub fn set_retries(mut self, max_attempts: u32) -> Self {
        self.request.retry = Some(RetryPolicy::new(max_attempts));
        self
    }

    pub fn set_retries_with(mut self, max_attempts: u32, backoff: Backoff) -> Self {
        self.request.retry = Some(RetryPolicy::with_backoff(max_attempts, backoff));
        self
    }

    pub fn set_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.request.retry = Some(policy);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestResult) + Send + Sync + 'static,
    {
        self.request.callbacks.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_fail<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestResult) + Send + Sync + 'static,
    {
        self.request.callbacks.on_fail = Some(Arc::new(callback));
        self
    }

    pub fn on_exception<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestResult) + Send + Sync + 'static,
    {
        self.request.callbacks.on_exception = Some(Arc::new(callback));
        self
    }

    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestResult, u32, Duration) + Send + Sync + 'static,
    {
        self.request.callbacks.on_retry = Some(Arc::new(callback));
        self
    }

    /// Freeze the configuration into a reusable `Request`.
    pub fn build(self) -> Request {
        self.request
    }

    pub async fn send(self) -> RequestResult {
        self.request.send().await
    }

    pub async fn send_until<C>(self, cancel: C) -> RequestResult
    where
        C: Future<Output = ()>,
    {
        self.request.send_until(cancel).await
    }

    pub async fn send_as<T>(self) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.request.send_as().await
    }

    pub async fn send_raw(self) -> String {
        self.request.send_raw().await
    }

    pub async fn send_ok(self) -> bool {
        self.request.send_ok().await
    }
}
