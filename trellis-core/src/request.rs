// HTTP request types: the transport's raw input and the handler-facing view

use crate::Error;
use crate::form::{InputMap, parse_form_map, parse_query_string};
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Raw request data as handed over by the hosting transport.
///
/// `query` and `form` are optional: when left unset they are derived from the
/// URI and from a url-encoded body respectively.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub query: Option<InputMap>,
    pub form: Option<InputMap>,
}

impl RawRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Build a raw request from already-decoded transport parts.
    pub fn from_parts(
        method: impl Into<String>,
        uri: impl Into<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
        query: InputMap,
        form: InputMap,
    ) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers,
            body,
            query: Some(query),
            form: Some(form),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_query(mut self, query: InputMap) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_form(mut self, form: InputMap) -> Self {
        self.form = Some(form);
        self
    }

    /// The request method, upper-cased. `None` when it is not a valid token.
    pub fn parsed_method(&self) -> Option<Method> {
        Method::from_bytes(self.method.to_ascii_uppercase().as_bytes()).ok()
    }

    /// The path used for route matching.
    pub fn path(&self) -> &str {
        normalize_path(&self.uri)
    }

    /// Convert into the handler-facing request with the given path parameters.
    pub fn into_request(self, params: HashMap<String, String>) -> Result<HttpRequest, Error> {
        let method = self
            .parsed_method()
            .ok_or_else(|| Error::Internal(format!("invalid method '{}'", self.method)))?;
        Ok(HttpRequest::build(method, self, params))
    }

    fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Strip any query string or fragment and trim surrounding slashes.
pub fn normalize_path(uri: &str) -> &str {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    uri[..end].trim_matches('/')
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Decode a body as a JSON object; anything else yields an empty map.
fn parse_json_object(body: &[u8]) -> InputMap {
    if body.is_empty() {
        return InputMap::new();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => InputMap::new(),
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Request view handed to middleware and handlers.
///
/// Built once per dispatch and only ever shared by reference, so handlers see
/// the same data the router matched on.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    path_params: HashMap<String, String>,
    query: InputMap,
    form: InputMap,
    json: InputMap,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Create an empty request for `method` and `path`.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: normalize_path(path).to_string(),
            path_params: HashMap::new(),
            query: InputMap::new(),
            form: InputMap::new(),
            json: InputMap::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub(crate) fn build(method: Method, raw: RawRequest, params: HashMap<String, String>) -> Self {
        let path = normalize_path(&raw.uri).to_string();

        let is_form = raw
            .header("content-type")
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let query = match raw.query {
            Some(query) => query,
            None => raw
                .uri
                .split_once('?')
                .map(|(_, q)| parse_query_string(q.split('#').next().unwrap_or("")))
                .unwrap_or_default(),
        };

        let form = match raw.form {
            Some(form) => form,
            None if is_form => parse_form_map(&raw.body),
            None => InputMap::new(),
        };

        let json = parse_json_object(&raw.body);

        Self {
            method,
            path,
            path_params: params,
            query,
            form,
            json,
            headers: raw.headers,
            body: raw.body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized path (no surrounding slashes, no query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    pub fn query_params(&self) -> &InputMap {
        &self.query
    }

    pub fn form_body(&self) -> &InputMap {
        &self.form
    }

    /// Decoded JSON body; empty when the body was absent or not a JSON object.
    pub fn json_body(&self) -> &InputMap {
        &self.json
    }

    /// Get a path parameter by name
    pub fn param(&self, key: &str) -> Option<&str> {
        self.path_params.get(key).map(String::as_str)
    }

    pub fn param_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.param(key).unwrap_or(default)
    }

    /// Parse a path parameter, e.g. `req.param_as::<u64>("id")`.
    pub fn param_as<T: FromStr>(&self, key: &str) -> Option<T> {
        self.param(key).and_then(|value| value.parse().ok())
    }

    /// Get a query parameter by name
    pub fn query(&self, key: &str) -> Option<&Value> {
        present(self.query.get(key))
    }

    pub fn query_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.query(key).cloned().unwrap_or_else(|| default.into())
    }

    /// Query parameter as a string slice; `None` for arrays.
    pub fn query_str(&self, key: &str) -> Option<&str> {
        self.query(key).and_then(Value::as_str)
    }

    /// Look up a body value: form fields first, then the JSON body.
    ///
    /// `null` JSON values count as absent.
    pub fn input(&self, key: &str) -> Option<&Value> {
        present(self.form.get(key)).or_else(|| present(self.json.get(key)))
    }

    pub fn input_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.input(key).cloned().unwrap_or_else(|| default.into())
    }

    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input(key).and_then(Value::as_str)
    }

    /// Deserialize a single body value into `T`.
    pub fn input_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.input(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Case-insensitive header lookup; the first matching header wins.
    pub fn header(&self, key: &str) -> Option<&str> {
        find_header(&self.headers, key)
    }

    pub fn header_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.header(key).unwrap_or(default)
    }

    /// True only if every key is present in the form body, JSON body or query.
    pub fn has(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| {
            present(self.form.get(*key)).is_some()
                || present(self.json.get(*key)).is_some()
                || present(self.query.get(*key)).is_some()
        })
    }

    /// Collect `input()` values for `keys`, leaving out absent ones.
    pub fn only(&self, keys: &[&str]) -> InputMap {
        keys.iter()
            .filter_map(|key| self.input(key).map(|value| (key.to_string(), value.clone())))
            .collect()
    }

    /// Parse the whole request body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
