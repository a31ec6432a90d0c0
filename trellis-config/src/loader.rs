// Settings file loaders

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Supported settings file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    /// `KEY=value` lines, as in a `.env` file
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    /// Detect the format of `path`. A bare `.env` file name counts as
    /// [`FileFormat::Env`].
    pub fn detect(path: &Path) -> Result<Self> {
        if path.file_name().and_then(|name| name.to_str()) == Some(".env") {
            return Ok(FileFormat::Env);
        }

        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::UnsupportedFormat(format!("{} has no extension", path.display()))
            })?;

        Self::from_extension(ext).ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))
    }
}

/// Reads a settings document into a JSON value.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the loader from the file extension.
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        FileFormat::detect(path.as_ref()).map(Self::new)
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        self.parse(&content)
    }

    /// Parse a document. JSON and TOML must have a table at the top level;
    /// env lines always produce an object of strings.
    pub fn parse(&self, content: &str) -> Result<Value> {
        let value = match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON: {}", e)))?,
            FileFormat::Toml => parse_toml(content)?,
            FileFormat::Env => Value::Object(parse_env_lines(content)),
        };

        if !value.is_object() {
            return Err(ConfigError::ParseError(
                "top level must be a table of settings".to_string(),
            ));
        }
        Ok(value)
    }
}

fn parse_toml(content: &str) -> Result<Value> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("TOML: {}", e)))?;

    serde_json::to_value(table).map_err(|e| ConfigError::ParseError(format!("TOML: {}", e)))
}

fn parse_env_lines(content: &str) -> Map<String, Value> {
    let mut map = Map::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            map.insert(key.trim().to_string(), Value::String(value.to_string()));
        }
    }

    map
}
