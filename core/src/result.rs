//! The outcome record of one execution, plus helpers for reading it.
//!
//! # Design
//! `RequestResult` is created by the engine, updated across attempts, and
//! handed back read-only. Its fields are private so the state invariants
//! hold for every value a caller can observe:
//! - `Success` has a payload and no error message.
//! - `Failed` and `Error` always carry an error message.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// An attempt is in progress. Never seen on a returned result.
    Sending,
    /// Waiting to start the next attempt. Observed by `on_retry` callbacks.
    Retrying,
    Success,
    /// The server or network failed in an anticipated way.
    Failed,
    /// A failure outside the network taxonomy. Inspect `error_message`.
    Error,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Success | RequestState::Failed | RequestState::Error)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Sending => "sending",
            RequestState::Retrying => "retrying",
            RequestState::Success => "success",
            RequestState::Failed => "failed",
            RequestState::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct RequestResult {
    state: RequestState,
    status_code: Option<u16>,
    error_message: Option<String>,
    payload: Option<Bytes>,
    elapsed: Duration,
}

impl RequestResult {
    pub(crate) fn sending() -> Self {
        Self {
            state: RequestState::Sending,
            status_code: None,
            error_message: None,
            payload: None,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn mark_retrying(&mut self) {
        self.state = RequestState::Retrying;
    }

    pub(crate) fn succeed(&mut self, status: u16, payload: Bytes) {
        self.state = RequestState::Success;
        self.status_code = Some(status);
        self.payload = Some(payload);
        self.error_message = None;
    }

    pub(crate) fn fail(&mut self, status: Option<u16>, message: impl Into<String>) {
        self.state = RequestState::Failed;
        if status.is_some() {
            self.status_code = status;
        }
        self.error_message = Some(message.into());
    }

    pub(crate) fn error(&mut self, status: Option<u16>, message: impl Into<String>) {
        self.state = RequestState::Error;
        if status.is_some() {
            self.status_code = status;
        }
        self.error_message = Some(message.into());
    }

    pub(crate) fn finish(&mut self, elapsed: Duration, last_response_status: Option<u16>) {
        self.elapsed = elapsed;
        if self.status_code.is_none() {
            self.status_code = last_response_status;
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Wall-clock time from the first attempt to the final outcome,
    /// including every retry delay.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_success(&self) -> bool {
        self.state == RequestState::Success
    }

    /// The response body as text, or an empty string when there is none.
    pub fn raw_payload(&self) -> Cow<'_, str> {
        match &self.payload {
            Some(bytes) => String::from_utf8_lossy(bytes),
            None => Cow::Borrowed(""),
        }
    }

    /// Decode the payload as JSON.
    ///
    /// Returns `T::default()` when the request did not succeed, the payload is
    /// empty, or decoding fails. Decode failures are logged, not returned.
    pub fn parse_as<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        let bytes = match &self.payload {
            Some(bytes) if self.is_success() && !bytes.is_empty() => bytes,
            _ => return T::default(),
        };
        match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    target_type = std::any::type_name::<T>(),
                    error = %err,
                    "failed to decode response payload"
                );
                T::default()
            }
        }
    }
}
