// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable field checks for [`Validate`] implementations.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    pub fn positive(value: usize, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                field
            )));
        }
        Ok(())
    }

    /// Case-insensitive membership check.
    pub fn one_of(value: &str, allowed: &[&str], field: &str) -> Result<()> {
        if !allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(value)) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be one of: {}",
                field,
                allowed.join(", ")
            )));
        }
        Ok(())
    }
}
