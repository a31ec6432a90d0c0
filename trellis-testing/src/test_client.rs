// Test HTTP Client

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use trellis_core::{Cookie, Error, Method, RawRequest, Router, SentResponse};

/// Drives requests through a [`Router`] without a network transport.
#[derive(Clone)]
pub struct TestClient {
    router: Arc<Router>,
}

impl TestClient {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    pub fn from_router(router: Router) -> Self {
        Self::new(Arc::new(router))
    }

    pub fn get(&self, path: &str) -> TestRequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> TestRequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> TestRequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> TestRequestBuilder {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> TestRequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Start a request with any method, extension verbs included.
    pub fn request(&self, method: Method, path: &str) -> TestRequestBuilder {
        TestRequestBuilder::new(Arc::clone(&self.router), method, path)
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    router: Arc<Router>,
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Vec<u8>,
}

impl TestRequestBuilder {
    fn new(router: Arc<Router>, method: Method, path: &str) -> Self {
        Self {
            router,
            method,
            path: path.to_string(),
            headers: Vec::new(),
            query: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Append a query parameter; it is percent-encoded into the URI.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(self, data: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(self.header("Content-Type", "application/json").body(body))
    }

    /// Set a url-encoded form body and the matching content type.
    pub fn form(self, fields: &[(&str, &str)]) -> Result<Self, Error> {
        let body =
            serde_urlencoded::to_string(fields).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(self
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body))
    }

    /// The raw request this builder would dispatch.
    pub fn build(&self) -> Result<RawRequest, Error> {
        let mut uri = self.path.clone();
        if !self.query.is_empty() {
            let encoded = serde_urlencoded::to_string(&self.query)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&encoded);
        }

        let mut raw = RawRequest::new(self.method.as_str(), uri).with_body(self.body.clone());
        raw.headers = self.headers.clone();
        Ok(raw)
    }

    pub fn send(self) -> Result<TestResponse, Error> {
        let raw = self.build()?;
        Ok(TestResponse::new(self.router.dispatch(raw)))
    }
}

/// Response from a test request
#[derive(Debug, Clone)]
pub struct TestResponse {
    inner: SentResponse,
}

impl TestResponse {
    pub fn new(inner: SentResponse) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.header(name)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.inner.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.inner.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.inner.cookies.iter().find(|cookie| cookie.name == name)
    }

    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    /// Body as UTF-8, with invalid sequences replaced.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.body).into_owned()
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.inner.body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    pub fn into_inner(self) -> SentResponse {
        self.inner
    }
}
