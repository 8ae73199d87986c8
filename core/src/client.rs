//! Entry point: owns the defaults and the transport, hands out builders.
//!
//! # Design
//! `Client` is a cheap handle around shared state. Every builder and
//! `Request` keeps a handle so it can reach the transport when sent.
//! Defaults are copied into a builder when it is created, so changing them
//! later never affects a request that already exists.
//!
//! Defaults can only be changed through `configure`, which requires the
//! handle to be the only one alive. Once the client has been cloned or has
//! outstanding requests, `configure` fails with `DefaultsInUse` instead of
//! changing configuration under in-flight traffic.

use std::fmt;
use std::sync::Arc;

use crate::defaults::ClientDefaults;
use crate::error::ConfigError;
use crate::http::HttpMethod;
use crate::request::RequestBuilder;
use crate::transport::{Transport, UreqTransport};

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    defaults: ClientDefaults,
    transport: Box<dyn Transport>,
}

impl Client {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_defaults(ClientDefaults::default(), transport)
    }

    pub fn with_defaults(defaults: ClientDefaults, transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                defaults,
                transport: Box::new(transport),
            }),
        }
    }

    /// A client using `UreqTransport`.
    pub fn ureq(defaults: ClientDefaults) -> Self {
        Self::with_defaults(defaults, UreqTransport::new())
    }

    pub fn defaults(&self) -> &ClientDefaults {
        &self.inner.defaults
    }

    /// Mutable access to the defaults while this is the only handle.
    pub fn configure(&mut self) -> Result<&mut ClientDefaults, ConfigError> {
        let handles = Arc::strong_count(&self.inner);
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => Ok(&mut inner.defaults),
            None => Err(ConfigError::DefaultsInUse(handles)),
        }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub fn request(&self, method: HttpMethod, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Get, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Post, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Put, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Delete, url)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.inner.defaults)
            .finish_non_exhaustive()
    }
}
