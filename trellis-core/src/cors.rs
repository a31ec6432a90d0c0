//! CORS header policy.
//!
//! [`CorsOptions`] holds caller overrides; [`CorsOptions::resolve`] merges them
//! over the defaults into a [`CorsPolicy`], which knows how to render the
//! `Access-Control-*` response headers. Both the response builder
//! ([`HttpResponse::allow_cors`](crate::HttpResponse::allow_cors)) and
//! [`CorsMiddleware`](crate::CorsMiddleware) go through this module.

use serde::{Deserialize, Serialize};

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";

const DEFAULT_HEADERS: [&str; 2] = ["Content-Type", "Authorization"];
const DEFAULT_METHODS: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Either a single pre-joined header value or a list to be comma-joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorsList {
    One(String),
    Many(Vec<String>),
}

impl CorsList {
    pub fn joined(&self) -> String {
        match self {
            CorsList::One(value) => value.clone(),
            CorsList::Many(values) => values.join(", "),
        }
    }
}

impl From<&str> for CorsList {
    fn from(value: &str) -> Self {
        CorsList::One(value.to_string())
    }
}

impl From<Vec<&str>> for CorsList {
    fn from(values: Vec<&str>) -> Self {
        CorsList::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for CorsList {
    fn from(values: Vec<String>) -> Self {
        CorsList::Many(values)
    }
}

/// Caller-supplied CORS overrides; unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsOptions {
    pub origin: Option<String>,
    pub credentials: Option<bool>,
    pub headers: Option<CorsList>,
    pub methods: Option<CorsList>,
}

impl CorsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn credentials(mut self, credentials: bool) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn headers(mut self, headers: impl Into<CorsList>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn methods(mut self, methods: impl Into<CorsList>) -> Self {
        self.methods = Some(methods.into());
        self
    }

    /// Merge these options over the defaults.
    pub fn resolve(&self) -> CorsPolicy {
        let defaults = CorsPolicy::default();
        CorsPolicy {
            origin: self.origin.clone().unwrap_or(defaults.origin),
            credentials: self.credentials.unwrap_or(defaults.credentials),
            headers: self.headers.clone().unwrap_or(defaults.headers),
            methods: self.methods.clone().unwrap_or(defaults.methods),
        }
    }
}

/// Fully resolved CORS settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub origin: String,
    pub credentials: bool,
    pub headers: CorsList,
    pub methods: CorsList,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
            credentials: false,
            headers: DEFAULT_HEADERS.to_vec().into(),
            methods: DEFAULT_METHODS.to_vec().into(),
        }
    }
}

impl CorsPolicy {
    /// Headers to set, in emission order.
    pub fn header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (ALLOW_ORIGIN, self.origin.clone()),
            (ALLOW_HEADERS, self.headers.joined()),
            (ALLOW_METHODS, self.methods.joined()),
        ];
        if self.credentials {
            pairs.push((ALLOW_CREDENTIALS, "true".to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = CorsOptions::new().resolve();
        assert_eq!(policy.origin, "*");
        assert!(!policy.credentials);
        assert_eq!(policy.headers.joined(), "Content-Type, Authorization");
        assert_eq!(policy.methods.joined(), "GET, POST, PUT, PATCH, DELETE, OPTIONS");
    }

    #[test]
    fn test_overrides_merge_over_defaults() {
        let policy = CorsOptions::new()
            .origin("https://example.com")
            .methods("GET")
            .resolve();
        assert_eq!(policy.origin, "https://example.com");
        assert_eq!(policy.methods.joined(), "GET");
        assert_eq!(policy.headers.joined(), "Content-Type, Authorization");
    }

    #[test]
    fn test_credentials_header_only_when_enabled() {
        let pairs = CorsOptions::new().resolve().header_pairs();
        assert!(pairs.iter().all(|(name, _)| *name != ALLOW_CREDENTIALS));

        let pairs = CorsOptions::new().credentials(true).resolve().header_pairs();
        assert!(pairs.contains(&(ALLOW_CREDENTIALS, "true".to_string())));
    }

    #[test]
    fn test_deserialize_string_or_list() {
        let options: CorsOptions =
            serde_json::from_str(r#"{"headers": "X-Api-Key", "methods": ["GET", "HEAD"]}"#)
                .unwrap();
        let policy = options.resolve();
        assert_eq!(policy.headers.joined(), "X-Api-Key");
        assert_eq!(policy.methods.joined(), "GET, HEAD");
    }
}
