//! Router settings and their application to a [`Router`].
//!
//! Settings come from a JSON or TOML document, a dotenv file, or `TRELLIS_*`
//! environment variables, in any combination:
//!
//! ```toml
//! request_id = true
//! max_body_bytes = 1048576
//! log_requests = true
//!
//! [cors]
//! origin = "https://app.example"
//! methods = ["GET", "POST"]
//!
//! [log]
//! level = "debug"
//! format = "pretty"
//! ```
//!
//! The equivalent environment variables are `TRELLIS_REQUEST_ID`,
//! `TRELLIS_MAX_BODY_BYTES`, `TRELLIS_LOG_REQUESTS`, `TRELLIS_CORS_ORIGIN`,
//! `TRELLIS_CORS_CREDENTIALS`, `TRELLIS_CORS_HEADERS`, `TRELLIS_CORS_METHODS`
//! (comma-separated), `TRELLIS_LOG_LEVEL`, `TRELLIS_LOG_FORMAT` and
//! `TRELLIS_LOG_FILTER`.

use crate::env::EnvLoader;
use crate::loader::{ConfigLoader, FileFormat};
use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use trellis_core::logging::{LogConfig, LogFormat, LogLevel};
use trellis_core::{
    BodySizeLimitMiddleware, CorsList, CorsMiddleware, CorsOptions, LoggingMiddleware,
    RequestIdMiddleware, Router,
};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "warning", "error"];
const LOG_FORMATS: [&str; 4] = ["json", "plain", "pretty", "compact"];

/// Router-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Install [`CorsMiddleware`] with these options when set
    pub cors: Option<CorsOptions>,
    /// Install [`RequestIdMiddleware`]
    pub request_id: bool,
    /// Install [`BodySizeLimitMiddleware`] with this limit when set
    pub max_body_bytes: Option<usize>,
    /// Install [`LoggingMiddleware`]
    pub log_requests: bool,
    pub log: LogSettings,
}

/// Logger settings, convertible into a core [`LogConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: String,
    /// Filter directive such as `trellis_core=debug`
    pub filter: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            filter: None,
        }
    }
}

impl LogSettings {
    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level = LogLevel::parse(&self.level).ok_or_else(|| ConfigError::InvalidValue {
            key: "log.level".to_string(),
            value: self.level.clone(),
            expected: "trace, debug, info, warn or error",
        })?;
        let format = LogFormat::parse(&self.format).ok_or_else(|| ConfigError::InvalidValue {
            key: "log.format".to_string(),
            value: self.format.clone(),
            expected: "json, plain, pretty or compact",
        })?;

        let mut config = LogConfig::new().level(level).format(format);
        if let Some(filter) = &self.filter {
            config = config.with_env_filter(filter.clone());
        }
        Ok(config)
    }
}

impl Settings {
    /// Deserialize settings from a JSON value; missing fields take defaults.
    pub fn from_value(value: Value) -> Result<Self> {
        let settings: Self = serde_json::from_value(value)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a `.json`, `.toml` or `.env` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?;

        match loader.format() {
            FileFormat::Env => {
                let vars = EnvLoader::default().load_dotenv(path)?;
                Self::default().with_env(&vars)
            }
            FileFormat::Json | FileFormat::Toml => Self::from_value(loader.load_file(path)?),
        }
    }

    /// Defaults overlaid with process variables carrying `prefix`.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let vars = EnvLoader::with_prefix(prefix).load()?;
        Self::default().with_env(&vars)
    }

    /// Layered load: the file when given, then `TRELLIS_*` variables on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env(&EnvLoader::default().load()?)
    }

    /// Overlay already-collected variables (keys as produced by
    /// [`EnvLoader`], e.g. `cors_origin`). Unknown keys are ignored.
    pub fn with_env(mut self, vars: &HashMap<String, String>) -> Result<Self> {
        for (key, value) in vars {
            match key.as_str() {
                "request_id" => self.request_id = parse_bool(key, value)?,
                "log_requests" => self.log_requests = parse_bool(key, value)?,
                "max_body_bytes" => {
                    let limit = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.clone(),
                        value: value.clone(),
                        expected: "a byte count",
                    })?;
                    self.max_body_bytes = Some(limit);
                }
                "cors_origin" => self.cors_mut().origin = Some(value.clone()),
                "cors_credentials" => self.cors_mut().credentials = Some(parse_bool(key, value)?),
                "cors_headers" => self.cors_mut().headers = Some(parse_list(value)),
                "cors_methods" => self.cors_mut().methods = Some(parse_list(value)),
                "log_level" => self.log.level = value.clone(),
                "log_format" => self.log.format = value.clone(),
                "log_filter" => self.log.filter = Some(value.clone()),
                _ => {}
            }
        }

        self.validate()?;
        Ok(self)
    }

    fn cors_mut(&mut self) -> &mut CorsOptions {
        self.cors.get_or_insert_with(CorsOptions::default)
    }

    /// Install the configured middleware in a fixed order: request logging,
    /// request id, body size limit, CORS.
    pub fn apply(&self, router: &mut Router) {
        if self.log_requests {
            router.use_middleware(LoggingMiddleware::new());
        }
        if self.request_id {
            router.use_middleware(RequestIdMiddleware::new());
        }
        if let Some(limit) = self.max_body_bytes {
            router.use_middleware(BodySizeLimitMiddleware::new(limit));
        }
        if let Some(cors) = &self.cors {
            router.use_middleware(CorsMiddleware::with_options(cors.clone()));
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        if let Some(limit) = self.max_body_bytes {
            ConfigValidator::positive(limit, "max_body_bytes")?;
        }
        if let Some(origin) = self.cors.as_ref().and_then(|cors| cors.origin.as_deref()) {
            ConfigValidator::not_empty(origin, "cors.origin")?;
        }
        ConfigValidator::one_of(&self.log.level, &LOG_LEVELS, "log.level")?;
        ConfigValidator::one_of(&self.log.format, &LOG_FORMATS, "log.format")?;
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

fn parse_list(value: &str) -> CorsList {
    CorsList::Many(
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
