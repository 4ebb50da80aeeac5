//! Environment variable loading with type conversion, defaults, and
//! validation — the same shape as this codebase's general-purpose env
//! loader, scoped down to what the pipeline needs.

use std::collections::HashMap;
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("environment variable not found: {var}")]
    NotFound { var: String },

    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("type conversion error for {var}: {reason}")]
    ConversionError { var: String, reason: String },
}

pub struct EnvConfigLoader {
    prefix: Option<String>,
    required: Vec<String>,
    defaults: HashMap<String, String>,
}

impl EnvConfigLoader {
    pub fn new() -> Self {
        Self {
            prefix: None,
            required: Vec::new(),
            defaults: HashMap::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn require(mut self, var: impl Into<String>) -> Self {
        self.required.push(var.into());
        self
    }

    pub fn default(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(var.into(), value.into());
        self
    }

    pub fn get(&self, var: &str) -> Result<String, EnvError> {
        let full_var = self.make_var_name(var);
        env::var(&full_var).or_else(|_| {
            self.defaults
                .get(var)
                .cloned()
                .ok_or_else(|| EnvError::NotFound {
                    var: full_var.clone(),
                })
        })
    }

    pub fn get_optional(&self, var: &str) -> Option<String> {
        let full_var = self.make_var_name(var);
        env::var(&full_var).ok().or_else(|| self.defaults.get(var).cloned())
    }

    pub fn get_u32(&self, var: &str) -> Result<u32, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::ConversionError {
            var: self.make_var_name(var),
            reason: format!("cannot parse as u32: {}", e),
        })
    }

    pub fn get_u64(&self, var: &str) -> Result<u64, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::ConversionError {
            var: self.make_var_name(var),
            reason: format!("cannot parse as u64: {}", e),
        })
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        for var in &self.required {
            self.get(var)?;
        }
        Ok(())
    }

    fn make_var_name(&self, var: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, var.to_uppercase()),
            None => var.to_uppercase(),
        }
    }
}

impl Default for EnvConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn reads_set_variable_with_prefix() {
        env::set_var("PFX_VALUE", "123");
        let loader = EnvConfigLoader::new().with_prefix("PFX_");
        assert_eq!(loader.get("VALUE").unwrap(), "123");
        assert_eq!(loader.get_u32("VALUE").unwrap(), 123);
        env::remove_var("PFX_VALUE");
    }

    #[test]
    #[serial]
    fn falls_back_to_default() {
        let loader = EnvConfigLoader::new()
            .with_prefix("MISSING_")
            .default("timeout", "60000");
        assert_eq!(loader.get_u64("timeout").unwrap(), 60000);
    }

    #[test]
    #[serial]
    fn validation_fails_until_required_var_present() {
        let loader = EnvConfigLoader::new().with_prefix("VALID_").require("REQUIRED");
        assert!(loader.validate().is_err());
        env::set_var("VALID_REQUIRED", "present");
        assert!(loader.validate().is_ok());
        env::remove_var("VALID_REQUIRED");
    }
}
