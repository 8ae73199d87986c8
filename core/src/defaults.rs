//! Client-wide defaults seeded into every request a `Client` builds.
//!
//! # Design
//! `ClientDefaults` is an ordinary value owned by a `Client`, not a global.
//! It is read when a `RequestBuilder` is created and never during execution,
//! so requests already built are unaffected by later changes.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable read by `ClientDefaults::from_env` for the base address.
pub const BASE_ADDRESS_ENV: &str = "COURIER_BASE_ADDRESS";

/// Environment variable read by `ClientDefaults::from_env` for the timeout.
pub const TIMEOUT_MS_ENV: &str = "COURIER_TIMEOUT_MS";

/// `Authorization` header value split into its scheme and credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub scheme: String,
    pub credential: String,
}

impl Authorization {
    pub fn new(scheme: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            credential: credential.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new("Bearer", token)
    }

    /// Rendered header value, e.g. `Bearer abc123`.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.scheme, self.credential)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientDefaults {
    base_address: Option<String>,
    headers: Vec<(String, String)>,
    authorization: Option<Authorization>,
    timeout: Option<Duration>,
}

impl ClientDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the base address and timeout from `COURIER_BASE_ADDRESS` and
    /// `COURIER_TIMEOUT_MS`. Unset variables leave the field empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut defaults = Self::new();
        if let Some(address) = lookup(BASE_ADDRESS_ENV).filter(|a| !a.trim().is_empty()) {
            defaults.set_base_address(address.trim());
        }
        if let Some(raw) = lookup(TIMEOUT_MS_ENV) {
            let ms: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                var: TIMEOUT_MS_ENV,
                reason: format!("{raw:?}: {e}"),
            })?;
            defaults.set_timeout(Duration::from_millis(ms));
        }
        Ok(defaults)
    }

    pub fn set_base_address(&mut self, address: impl Into<String>) -> &mut Self {
        self.base_address = Some(address.into());
        self
    }

    pub fn remove_base_address(&mut self) -> &mut Self {
        self.base_address = None;
        self
    }

    /// Append a header. Existing headers with the same name are kept.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn add_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Remove every header called `name` (case-insensitive).
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self
    }

    pub fn remove_headers<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for name in names {
            self.remove_header(name);
        }
        self
    }

    pub fn clear_headers(&mut self) -> &mut Self {
        self.headers.clear();
        self
    }

    pub fn add_authorization(
        &mut self,
        scheme: impl Into<String>,
        credential: impl Into<String>,
    ) -> &mut Self {
        self.authorization = Some(Authorization::new(scheme, credential));
        self
    }

    pub fn remove_authorization(&mut self) -> &mut Self {
        self.authorization = None;
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_address(&self) -> Option<&str> {
        self.base_address.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve `url` against the base address.
    ///
    /// Absolute URLs are returned unchanged, as are relative ones when no
    /// base address is set.
    pub fn resolve_url(&self, url: &str) -> String {
        match &self.base_address {
            Some(base) if !url.contains("://") => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            _ => url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_url_joins_base() {
        let mut defaults = ClientDefaults::new();
        defaults.set_base_address("http://localhost:3000/");
        assert_eq!(defaults.resolve_url("/items/1"), "http://localhost:3000/items/1");
        assert_eq!(defaults.resolve_url("items"), "http://localhost:3000/items");
    }

    #[test]
    fn absolute_url_ignores_base() {
        let mut defaults = ClientDefaults::new();
        defaults.set_base_address("http://localhost:3000");
        assert_eq!(defaults.resolve_url("https://example.com/x"), "https://example.com/x");
    }

    #[test]
    fn no_base_passes_through() {
        let mut defaults = ClientDefaults::new();
        defaults.set_base_address("http://a").remove_base_address();
        assert_eq!(defaults.resolve_url("/x"), "/x");
        assert_eq!(defaults.base_address(), None);
    }

    #[test]
    fn headers_keep_duplicates_and_order() {
        let mut defaults = ClientDefaults::new();
        defaults
            .add_header("Accept", "application/json")
            .add_headers([("X-Tag", "a"), ("X-Tag", "b")]);
        assert_eq!(
            defaults.headers(),
            &[
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Tag".to_string(), "a".to_string()),
                ("X-Tag".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn remove_header_is_case_insensitive() {
        let mut defaults = ClientDefaults::new();
        defaults
            .add_headers([("X-Tag", "a"), ("x-tag", "b"), ("Accept", "*/*"), ("X-Other", "c")])
            .remove_header("X-TAG");
        assert_eq!(defaults.headers().len(), 2);
        defaults.remove_headers(["accept", "x-other"]);
        assert!(defaults.headers().is_empty());
        defaults.add_header("A", "1").clear_headers();
        assert!(defaults.headers().is_empty());
    }

    #[test]
    fn authorization_round_trip() {
        let mut defaults = ClientDefaults::new();
        defaults.add_authorization("Basic", "dXNlcjpwYXNz");
        assert_eq!(
            defaults.authorization().map(Authorization::header_value).as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
        defaults.remove_authorization();
        assert!(defaults.authorization().is_none());
    }

    #[test]
    fn bearer_scheme() {
        let auth = Authorization::bearer("abc123");
        assert_eq!(auth, Authorization::new("Bearer", "abc123"));
        assert_eq!(auth.header_value(), "Bearer abc123");
    }

    #[test]
    fn from_lookup_reads_values() {
        let defaults = ClientDefaults::from_lookup(|var| match var {
            BASE_ADDRESS_ENV => Some(" http://svc:8080 ".to_string()),
            TIMEOUT_MS_ENV => Some("2500".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(defaults.base_address(), Some("http://svc:8080"));
        assert_eq!(defaults.timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn from_lookup_empty_environment() {
        let defaults = ClientDefaults::from_lookup(|_| None).unwrap();
        assert!(defaults.base_address().is_none());
        assert!(defaults.timeout().is_none());
    }

    #[test]
    fn from_lookup_rejects_bad_timeout() {
        let err = ClientDefaults::from_lookup(|var| (var == TIMEOUT_MS_ENV).then(|| "-5".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: TIMEOUT_MS_ENV, .. }));
    }
}
