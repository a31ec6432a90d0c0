// HTTP response builder and the emitted response

use crate::Error;
use crate::cookie::{Cookie, CookieOptions};
use crate::cors::CorsOptions;
use crate::logging::warn;
use crate::request::find_header;
use http::header::{HeaderName, HeaderValue};
use serde::Serialize;
use std::io::{self, Write};

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Mutable response state for one request.
///
/// Non-terminal calls chain:
///
/// ```
/// use trellis_core::HttpResponse;
///
/// let mut res = HttpResponse::new();
/// res.status(201).header("X-Trace", "abc").text("created").unwrap();
/// assert_eq!(res.sent().unwrap().status, 201);
/// ```
///
/// The terminal operations ([`json`](Self::json), [`text`](Self::text),
/// [`redirect`](Self::redirect), [`send`](Self::send)) emit the response once.
/// A second terminal call fails with [`Error::ResponseAlreadySent`] and leaves
/// the emitted response as it was; non-terminal calls after emission are
/// ignored.
#[derive(Debug)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    sent: Option<SentResponse>,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            cookies: Vec::new(),
            sent: None,
        }
    }

    pub fn status(&mut self, code: u16) -> &mut Self {
        if self.guard_mutation("status") {
            self.status = code;
        }
        self
    }

    /// Set a header, replacing any existing value for the same name in place.
    ///
    /// Names that are not HTTP tokens and values containing control
    /// characters (CR and LF included) are dropped with a `warn` event.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        if self.guard_mutation("header") {
            let name = name.into();
            let value = value.into();
            if let Err(err) = check_header(&name, &value) {
                warn!(error = %err, "Dropping invalid response header");
                return self;
            }
            match self
                .headers
                .iter_mut()
                .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
            {
                Some(slot) => slot.1 = value,
                None => self.headers.push((name, value)),
            }
        }
        self
    }

    pub fn cookie(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        options: CookieOptions,
    ) -> &mut Self {
        if self.guard_mutation("cookie") {
            let cookie = Cookie::new(name, value, options);
            match cookie.validate() {
                Ok(()) => self.cookies.push(cookie),
                Err(err) => warn!(error = %err, "Dropping invalid cookie"),
            }
        }
        self
    }

    /// Apply CORS headers merged over the defaults. Does not send.
    pub fn allow_cors(&mut self, options: &CorsOptions) -> &mut Self {
        for (name, value) in options.resolve().header_pairs() {
            self.header(name, value);
        }
        self
    }

    /// Serialize `data` as UTF-8 JSON and send it.
    pub fn json<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<(), Error> {
        self.ensure_unsent()?;
        let body = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
        self.header("Content-Type", CONTENT_TYPE_JSON);
        self.send(body)
    }

    pub fn text(&mut self, body: impl Into<String>) -> Result<(), Error> {
        self.ensure_unsent()?;
        self.header("Content-Type", CONTENT_TYPE_TEXT);
        self.send(body.into())
    }

    /// Redirect with `302 Found`.
    pub fn redirect(&mut self, url: impl Into<String>) -> Result<(), Error> {
        self.redirect_with(url, 302)
    }

    /// Redirect with an explicit status. Fails with [`Error::InvalidHeader`]
    /// when `url` cannot be carried in a `Location` header.
    pub fn redirect_with(&mut self, url: impl Into<String>, status: u16) -> Result<(), Error> {
        self.ensure_unsent()?;
        let url = url.into();
        check_header("Location", &url)?;
        self.status(status).header("Location", url);
        self.send(Vec::new())
    }

    /// Emit the response. This is the only place a response is finalized.
    pub fn send(&mut self, body: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.ensure_unsent()?;
        self.sent = Some(SentResponse {
            status: self.status,
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            body: body.into(),
        });
        Ok(())
    }

    pub fn is_sent(&self) -> bool {
        self.sent.is_some()
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// The emitted response, once a terminal operation has run.
    pub fn sent(&self) -> Option<&SentResponse> {
        self.sent.as_ref()
    }

    pub fn into_sent(self) -> Option<SentResponse> {
        self.sent
    }

    fn ensure_unsent(&self) -> Result<(), Error> {
        if self.sent.is_some() {
            return Err(Error::ResponseAlreadySent);
        }
        Ok(())
    }

    fn guard_mutation(&self, operation: &str) -> bool {
        if self.sent.is_some() {
            warn!(operation, "Ignoring response mutation after send");
            return false;
        }
        true
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// The finalized response handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<Cookie>,
    pub body: Vec<u8>,
}

impl SentResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Canonical reason phrase for the status, empty for unknown codes.
    pub fn reason(&self) -> &'static str {
        http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("")
    }

    /// Headers in emission order, followed by one `Set-Cookie` per cookie.
    pub fn header_lines(&self) -> Vec<(String, String)> {
        let mut lines = self.headers.clone();
        lines.extend(
            self.cookies
                .iter()
                .map(|cookie| ("Set-Cookie".to_string(), cookie.to_header_value())),
        );
        lines
    }

    /// Serialize as an HTTP/1.1 response.
    pub fn write_http1<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "HTTP/1.1 {} {}\r\n", self.status, self.reason())?;
        for (name, value) in self.header_lines() {
            write!(writer, "{}: {}\r\n", name, value)?;
        }
        if self.header("Content-Length").is_none() {
            write!(writer, "Content-Length: {}\r\n", self.body.len())?;
        }
        writer.write_all(b"\r\n")?;
        writer.write_all(&self.body)?;
        writer.flush()
    }
}

/// Reject header names that are not tokens and values that would break framing.
fn check_header(name: &str, value: &str) -> Result<(), Error> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::InvalidHeader(format!("invalid header name {:?}", name)))?;
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|_| Error::InvalidHeader(format!("invalid value for header '{}'", name)))?;
    Ok(())
}
