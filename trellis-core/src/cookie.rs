// Cookie directives attached to a response

use crate::Error;
use http::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, UNIX_EPOCH};

/// `SameSite` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Latest `Expires` that can be rendered: 9999-12-31T23:59:59Z.
pub const MAX_EXPIRES: u64 = 253_402_300_799;

/// Optional cookie attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieOptions {
    /// Expiry as a unix timestamp in seconds, capped at [`MAX_EXPIRES`] when rendered
    pub expires: Option<u64>,
    pub max_age: Option<i64>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expires(mut self, timestamp: u64) -> Self {
        self.expires = Some(timestamp);
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// A single cookie directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options,
        }
    }

    /// Check that the name is a token and that `Path` and `Domain` cannot
    /// terminate the directive or the header line.
    pub fn validate(&self) -> Result<(), Error> {
        if HeaderName::from_bytes(self.name.as_bytes()).is_err() {
            return Err(Error::InvalidHeader(format!("invalid cookie name {:?}", self.name)));
        }
        let attributes = [("Path", &self.options.path), ("Domain", &self.options.domain)];
        for (attribute, value) in attributes {
            let Some(value) = value else { continue };
            if value.contains(';') || HeaderValue::from_bytes(value.as_bytes()).is_err() {
                return Err(Error::InvalidHeader(format!(
                    "invalid {} for cookie '{}'",
                    attribute, self.name
                )));
            }
        }
        Ok(())
    }

    /// Render the `Set-Cookie` header value.
    ///
    /// The value is percent-encoded; `Expires` uses the IMF-fixdate format.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, urlencoding::encode(&self.value));
        let opts = &self.options;

        if let Some(ts) = opts.expires {
            let when = UNIX_EPOCH + Duration::from_secs(ts.min(MAX_EXPIRES));
            out.push_str("; Expires=");
            out.push_str(&httpdate::fmt_http_date(when));
        }
        if let Some(max_age) = opts.max_age {
            out.push_str(&format!("; Max-Age={}", max_age));
        }
        if let Some(path) = &opts.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(domain) = &opts.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if opts.secure {
            out.push_str("; Secure");
        }
        if opts.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = opts.same_site {
            out.push_str("; SameSite=");
            out.push_str(same_site.as_str());
        }

        out
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}
