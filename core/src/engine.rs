//! The retry loop that turns a `Request` into a `RequestResult`.
//!
//! # Design
//! One call runs as a single task and suspends only while an attempt is in
//! flight or while waiting out a backoff delay. Attempts are strictly
//! sequential: the next one starts after the previous response has been read
//! and dropped. Each attempt gets its own deadline, so a slow first attempt
//! never shortens the second.
//!
//! Every outcome lands in the result and the matching callback:
//!
//! | outcome                          | state   | status code            | callback       |
//! |----------------------------------|---------|------------------------|----------------|
//! | 2xx response                     | Success | response status        | `on_success`   |
//! | other response                   | Failed  | response status        | `on_fail`      |
//! | per-attempt deadline elapsed     | Failed  | 408                    | `on_fail`      |
//! | recognized transport error       | Failed  | carried, else fallback | `on_fail`      |
//! | unexpected error                 | Error   | fallback               | `on_exception` |
//!
//! The fallback status is the last status received from the server in this
//! call, or 500 if none was.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::error::{TransportError, INTERNAL_SERVER_ERROR, REQUEST_TIMEOUT};
use crate::http::{HttpRequest, HttpResponse};
use crate::request::Request;
use crate::result::RequestResult;
use crate::transport::Transport;

const CANCELLED: &str = "request cancelled";

enum Attempt {
    Response(HttpResponse),
    TimedOut(Duration),
    Transport(TransportError),
}

pub(crate) async fn execute<C>(transport: &dyn Transport, request: &Request, cancel: C) -> RequestResult
where
    C: Future<Output = ()>,
{
    let mut cancel = pin!(cancel);
    let callbacks = &request.callbacks;
    let mut result = RequestResult::sending();
    let start = Instant::now();

    if let Some(message) = &request.build_error {
        warn!(method = %request.method, url = %request.url, %message, "request could not be built");
        result.error(Some(INTERNAL_SERVER_ERROR), message.clone());
        callbacks.exception(&result);
        result.finish(start.elapsed(), None);
        return result;
    }

    let budget = request.retry.as_ref().map_or(0, |policy| policy.max_attempts);
    let mut last_status: Option<u16> = None;
    let mut attempts = 0u32;

    for attempt in 0..=budget {
        if attempt > 0 {
            result.mark_retrying();
            callbacks.retry(&result, attempt, start.elapsed());

            let delay = request
                .retry
                .as_ref()
                .map_or(Duration::ZERO, |policy| policy.delay(attempt));
            if !delay.is_zero() {
                debug!(attempt, ?delay, "waiting before retry");
                tokio::select! {
                    biased;
                    _ = cancel.as_mut() => {
                        result.fail(None, CANCELLED);
                        callbacks.fail(&result);
                        break;
                    }
                    _ = time::sleep(delay) => {}
                }
            }
        }

        attempts += 1;
        debug!(method = %request.method, url = %request.url, attempt, "sending");
        let wire = request.to_wire();
        let outcome = tokio::select! {
            biased;
            _ = cancel.as_mut() => None,
            outcome = attempt_once(transport, wire, request.timeout) => Some(outcome),
        };

        let Some(outcome) = outcome else {
            result.fail(None, CANCELLED);
            callbacks.fail(&result);
            break;
        };

        match outcome {
            Attempt::Response(response) if response.is_success() => {
                result.succeed(response.status, response.body);
                callbacks.success(&result);
                break;
            }
            Attempt::Response(response) => {
                last_status = Some(response.status);
                warn!(attempt, status = response.status, "unsuccessful response");
                result.fail(Some(response.status), response.reason_phrase());
                callbacks.fail(&result);
            }
            Attempt::TimedOut(timeout) => {
                warn!(attempt, ?timeout, "attempt timed out");
                result.fail(
                    Some(REQUEST_TIMEOUT),
                    format!("request timed out after {timeout:?}"),
                );
                callbacks.fail(&result);
            }
            Attempt::Transport(err) => {
                let fallback = last_status.unwrap_or(INTERNAL_SERVER_ERROR);
                if err.is_recognized() {
                    warn!(attempt, error = %err, "transport failure");
                    result.fail(Some(err.status_code().unwrap_or(fallback)), err.to_string());
                    callbacks.fail(&result);
                } else {
                    warn!(attempt, error = %err, "unexpected failure");
                    result.error(Some(fallback), err.to_string());
                    callbacks.exception(&result);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    result.finish(elapsed, last_status);
    if result.is_success() && attempts > 1 {
        info!(attempts, ?elapsed, "request succeeded after retries");
    } else {
        debug!(attempts, state = %result.state(), ?elapsed, "request finished");
    }
    result
}

/// One bounded round trip. The deadline is scoped to this call only.
async fn attempt_once(
    transport: &dyn Transport,
    wire: HttpRequest,
    timeout: Option<Duration>,
) -> Attempt {
    let sent = match timeout {
        Some(limit) => match time::timeout(limit, transport.send(wire)).await {
            Ok(sent) => sent,
            Err(_) => return Attempt::TimedOut(limit),
        },
        None => transport.send(wire).await,
    };
    match sent {
        Ok(response) => Attempt::Response(response),
        Err(err) => Attempt::Transport(err),
    }
}
