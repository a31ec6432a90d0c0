use serde_json::json;
use std::fs;
use trellis_config::{ConfigError, Settings};
use trellis_core::{RawRequest, Router};

fn demo_router(settings: &Settings) -> Router {
    let mut router = Router::new();
    settings.apply(&mut router);
    router
        .post("/echo", |req, _res| Ok(json!({ "len": req.body().len() })))
        .unwrap();
    router
}

#[test]
fn test_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("router.toml");
    fs::write(
        &path,
        r#"
request_id = true
max_body_bytes = 8

[cors]
origin = "https://app.example"
methods = ["GET", "POST"]

[log]
level = "debug"
"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert!(settings.request_id);
    assert_eq!(settings.max_body_bytes, Some(8));
    assert_eq!(settings.log.level, "debug");
    assert_eq!(settings.log.format, "json");

    let router = demo_router(&settings);
    assert_eq!(router.middleware().len(), 3);

    let ok = router.dispatch(RawRequest::new("POST", "/echo").with_body("1234"));
    assert_eq!(ok.status, 200);
    assert!(ok.header("X-Request-Id").is_some());
    assert_eq!(ok.header("Access-Control-Allow-Origin"), Some("https://app.example"));
    assert_eq!(ok.header("Access-Control-Allow-Methods"), Some("GET, POST"));

    let too_big = router.dispatch(RawRequest::new("POST", "/echo").with_body("123456789"));
    assert_eq!(too_big.status, 413);
    // Body limit runs before CORS, so the rejection carries no CORS headers.
    assert!(too_big.header("Access-Control-Allow-Origin").is_none());
    assert!(too_big.header("X-Request-Id").is_some());
}

#[test]
fn test_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("router.json");
    fs::write(&path, r#"{"log_requests": true, "log": {"format": "pretty"}}"#).unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert!(settings.log_requests);
    assert_eq!(settings.log.format, "pretty");
    assert!(settings.log.to_log_config().is_ok());
}

#[test]
fn test_dotenv_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(
        &path,
        "TRELLIS_REQUEST_ID=1\nTRELLIS_CORS_ORIGIN=*\nDATABASE_URL=postgres://ignored\n",
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert!(settings.request_id);
    assert_eq!(settings.cors.unwrap().origin.as_deref(), Some("*"));
}

#[test]
fn test_invalid_file_contents() {
    let dir = tempfile::tempdir().unwrap();

    let zero = dir.path().join("zero.json");
    fs::write(&zero, r#"{"max_body_bytes": 0}"#).unwrap();
    assert!(matches!(
        Settings::from_file(&zero),
        Err(ConfigError::ValidationError(_))
    ));

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "request_id = ").unwrap();
    assert!(matches!(
        Settings::from_file(&broken),
        Err(ConfigError::ParseError(_))
    ));

    assert!(matches!(
        Settings::from_file(dir.path().join("missing.json")),
        Err(ConfigError::LoadError(_))
    ));
}

#[test]
fn test_from_env_with_unused_prefix() {
    let settings = Settings::from_env("TRELLIS_TEST_NOTHING_SET_55121").unwrap();
    assert_eq!(settings, Settings::default());
}
