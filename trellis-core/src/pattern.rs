//! Route pattern compilation.
//!
//! A route template is a `/`-delimited path in which `{name}` placeholders
//! capture a single path segment:
//!
//! ```
//! use trellis_core::CompiledPattern;
//!
//! let pattern = CompiledPattern::compile("/users/{id}/posts/{post}").unwrap();
//! let params = pattern.matches("users/42/posts/7").unwrap();
//! assert_eq!(params["id"], "42");
//! assert_eq!(params["post"], "7");
//! assert!(pattern.matches("users/42").is_none());
//! ```
//!
//! Templates are compiled once, at registration, into an anchored regular
//! expression. Literal text is escaped, so characters such as `.` or `+` in a
//! template only ever match themselves.

use crate::Error;
use regex::Regex;
use std::collections::HashMap;

/// Capture used for every placeholder: one or more characters other than `/`.
const SEGMENT_CAPTURE: &str = "([^/]+)";

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    regex: Regex,
    names: Vec<String>,
}

impl CompiledPattern {
    /// Compile a route template.
    ///
    /// Leading and trailing slashes are ignored, mirroring the normalization
    /// applied to request paths. Fails with [`Error::InvalidPattern`] for
    /// unbalanced or empty braces, placeholder names that are not made of
    /// ASCII letters, digits and `_`, names used twice in one template, and
    /// placeholders with no literal text between them (`{a}{b}`).
    pub fn compile(template: &str) -> Result<Self, Error> {
        let trimmed = template.trim_matches('/');
        let mut source = String::with_capacity(trimmed.len() + 16);
        let mut names: Vec<String> = Vec::new();
        let mut literal = String::new();

        source.push('^');

        let mut chars = trimmed.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    let name = read_placeholder(&mut chars, template)?;
                    if names.iter().any(|existing| *existing == name) {
                        return Err(Error::InvalidPattern(format!(
                            "duplicate parameter '{}' in '{}'",
                            name, template
                        )));
                    }

                    if !names.is_empty() && literal.is_empty() {
                        return Err(Error::InvalidPattern(format!(
                            "placeholders '{}' and '{}' need literal text between them in '{}'",
                            names[names.len() - 1],
                            name,
                            template
                        )));
                    }

                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    source.push_str(SEGMENT_CAPTURE);
                    names.push(name);
                }
                '}' => {
                    return Err(Error::InvalidPattern(format!(
                        "unmatched '}}' in '{}'",
                        template
                    )));
                }
                _ => literal.push(ch),
            }
        }

        source.push_str(&regex::escape(&literal));
        source.push('$');

        let regex = Regex::new(&source)
            .map_err(|e| Error::InvalidPattern(format!("'{}': {}", template, e)))?;

        Ok(Self {
            template: template.to_string(),
            regex,
            names,
        })
    }

    /// Match a request path, returning the captured parameters.
    ///
    /// A template without placeholders yields an empty map on success.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path.trim_matches('/'))?;

        let params = self
            .names
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                captures
                    .get(index + 1)
                    .map(|value| (name.clone(), value.as_str().to_string()))
            })
            .collect();

        Some(params)
    }

    /// The template this pattern was compiled from, as registered.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }
}

fn read_placeholder(chars: &mut std::str::Chars<'_>, template: &str) -> Result<String, Error> {
    let mut name = String::new();

    loop {
        match chars.next() {
            Some('}') => break,
            Some('{') => {
                return Err(Error::InvalidPattern(format!(
                    "nested '{{' in '{}'",
                    template
                )));
            }
            Some(ch) => name.push(ch),
            None => {
                return Err(Error::InvalidPattern(format!(
                    "unclosed '{{' in '{}'",
                    template
                )));
            }
        }
    }

    if name.is_empty() {
        return Err(Error::InvalidPattern(format!(
            "empty '{{}}' in '{}'",
            template
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidPattern(format!(
            "invalid parameter name '{}' in '{}'",
            name, template
        )));
    }

    Ok(name)
}
