// Test assertions for HTTP responses

use crate::TestResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;

/// Assert that a response has a specific status code
#[track_caller]
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        actual,
        response.body_string()
    );
}

/// Assert that the JSON body deserializes to `expected`
#[track_caller]
pub fn assert_json<T>(response: &TestResponse, expected: &T)
where
    T: DeserializeOwned + PartialEq + Debug,
{
    let actual: T = match response.body_json() {
        Ok(actual) => actual,
        Err(err) => panic!(
            "Response body is not the expected JSON ({}): {}",
            err,
            response.body_string()
        ),
    };
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

/// Assert that a response has a specific header
#[track_caller]
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

#[track_caller]
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that a response is successful (2xx status)
#[track_caller]
pub fn assert_success(response: &TestResponse) {
    let status = response.status();
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

/// Assert that a response is a client error (4xx status)
#[track_caller]
pub fn assert_client_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

/// Assert that a response is a server error (5xx status)
#[track_caller]
pub fn assert_server_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

/// Assert that the body is the router's error shape:
/// `{"error": true, "message": "<non-empty>"}`.
#[track_caller]
pub fn assert_error_json(response: &TestResponse) {
    let body: Value = match response.body_json() {
        Ok(body) => body,
        Err(_) => panic!("Expected JSON error body, got: {}", response.body_string()),
    };

    assert_eq!(body["error"], Value::Bool(true), "Missing error flag in {}", body);
    let message = body["message"].as_str().unwrap_or_default();
    assert!(!message.is_empty(), "Missing error message in {}", body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::SentResponse;

    fn response(status: u16, body: &str) -> TestResponse {
        TestResponse::new(SentResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            cookies: Vec::new(),
            body: body.as_bytes().to_vec(),
        })
    }

    #[test]
    fn test_passing_assertions() {
        let ok = response(200, r#"{"id": 1}"#);
        assert_status(&ok, 200);
        assert_success(&ok);
        assert_header(&ok, "content-type", "application/json");
        assert_body_contains(&ok, "\"id\"");
        assert_json(&ok, &serde_json::json!({"id": 1}));

        let failed = response(500, r#"{"error": true, "message": "boom"}"#);
        assert_server_error(&failed);
        assert_error_json(&failed);

        assert_client_error(&response(404, "Not Found"));
    }

    #[test]
    #[should_panic(expected = "Expected status 201, got 200")]
    fn test_status_mismatch_panics() {
        assert_status(&response(200, "{}"), 201);
    }

    #[test]
    #[should_panic(expected = "Missing error message")]
    fn test_error_json_requires_message() {
        assert_error_json(&response(500, r#"{"error": true, "message": ""}"#));
    }
}
