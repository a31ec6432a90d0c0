// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::Path;

/// Prefix used by [`EnvLoader::default`].
pub const DEFAULT_PREFIX: &str = "TRELLIS";

/// Reads settings from process environment variables.
///
/// With a prefix of `TRELLIS`, `TRELLIS_CORS_ORIGIN` is reported under the key
/// `cors_origin`. Variables without the prefix are ignored.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.map(|p| p.trim_end_matches('_').to_ascii_uppercase()),
        }
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self::new(Some(prefix.to_string()))
    }

    /// Every matching process variable, keyed by lower-cased name without the
    /// prefix. Variables whose name or value is not UTF-8 are skipped.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.collect(utf8_vars(env::vars_os())))
    }

    /// Like [`load`](Self::load), but reading `KEY=value` lines from a dotenv
    /// file instead of the process environment. The process environment is
    /// left untouched.
    pub fn load_dotenv(&self, path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        let vars = iter
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(self.collect(vars))
    }

    /// Apply prefix filtering and key normalization to `vars`.
    pub fn collect<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| self.strip(&key).map(|key| (key, value)))
            .collect()
    }

    fn strip(&self, key: &str) -> Option<String> {
        match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|rest| !rest.is_empty())
                .map(str::to_ascii_lowercase),
            None => Some(key.to_ascii_lowercase()),
        }
    }

    /// Full variable name for `key`, e.g. `cors_origin` -> `TRELLIS_CORS_ORIGIN`.
    pub fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_ascii_uppercase()),
            None => key.to_ascii_uppercase(),
        }
    }

    pub fn load_var(&self, key: &str) -> Result<String> {
        let name = self.var_name(key);
        env::var(&name).map_err(|source| ConfigError::EnvError { name, source })
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // std::env::set_var is unsafe in edition 2024, so these tests feed
    // variables through `collect` instead of the process environment.

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_filtering() {
        let loader = EnvLoader::default();
        let loaded = loader.collect(vars(&[
            ("TRELLIS_REQUEST_ID", "true"),
            ("TRELLIS_CORS_ORIGIN", "*"),
            ("TRELLISX_OTHER", "ignored"),
            ("TRELLIS_", "ignored"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["request_id"], "true");
        assert_eq!(loaded["cors_origin"], "*");
    }

    #[test]
    fn test_without_prefix() {
        let loader = EnvLoader::new(None);
        let loaded = loader.collect(vars(&[("HOME", "/root")]));
        assert_eq!(loaded["home"], "/root");
    }

    #[test]
    fn test_var_name() {
        assert_eq!(EnvLoader::default().var_name("log_level"), "TRELLIS_LOG_LEVEL");
        assert_eq!(EnvLoader::with_prefix("app_").var_name("x"), "APP_X");
        assert_eq!(EnvLoader::new(None).var_name("path"), "PATH");
    }

    #[test]
    fn test_load_var_or_default() {
        let loader = EnvLoader::with_prefix("TRELLIS_TEST_UNSET_91827");
        assert_eq!(loader.load_var_or("missing", "fallback"), "fallback");
        assert!(matches!(
            loader.load_var("missing"),
            Err(ConfigError::EnvError { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_vars_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let raw = vec![
            (OsString::from("TRELLIS_LOG_LEVEL"), OsString::from("debug")),
            (OsString::from("TRELLIS_BINARY"), OsString::from_vec(vec![0x66, 0xff, 0x6f])),
            (OsString::from_vec(vec![b'T', 0xfe]), OsString::from("x")),
        ];
        let loaded = EnvLoader::default().collect(utf8_vars(raw));
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["log_level"], "debug");
    }

    #[test]
    fn test_load_reads_process_environment() {
        let loaded = EnvLoader::with_prefix("TRELLIS_TEST_UNSET_91827").load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_dotenv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "TRELLIS_MAX_BODY_BYTES=2048\n# comment\nOTHER=1\nTRELLIS_LOG_LEVEL=\"debug\"\n",
        )
        .unwrap();

        let loaded = EnvLoader::default().load_dotenv(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["max_body_bytes"], "2048");
        assert_eq!(loaded["log_level"], "debug");
    }

    #[test]
    fn test_load_dotenv_missing_file() {
        let result = EnvLoader::default().load_dotenv("/nonexistent/trellis/.env");
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
