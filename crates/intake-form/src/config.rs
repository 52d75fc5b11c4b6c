//! Form engine configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Form engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Maximum distinct option refs memoized per session
    pub options_cache_capacity: u64,
    /// Message for a required field left blank
    pub required_message: String,
    /// First, empty entry of every select control
    pub select_placeholder: String,
    /// Submit button label while idle
    pub submit_label: String,
    /// Submit button label while a submission is in flight
    pub submitting_label: String,
}

impl FormConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML; missing keys keep their defaults
    ///
    /// # Errors
    /// Returns error if TOML is invalid or a value is out of range
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for a zero cache capacity, which
    /// would evict every resolved option list immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.options_cache_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "options_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// With options cache capacity
    #[inline]
    #[must_use]
    pub fn with_options_cache_capacity(mut self, capacity: u64) -> Self {
        self.options_cache_capacity = capacity;
        self
    }

    /// With required-field message
    #[inline]
    #[must_use]
    pub fn with_required_message(mut self, message: impl Into<String>) -> Self {
        self.required_message = message.into();
        self
    }

    /// With select placeholder
    #[inline]
    #[must_use]
    pub fn with_select_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.select_placeholder = placeholder.into();
        self
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            options_cache_capacity: 1_000,
            required_message: "This field is required.".to_string(),
            select_placeholder: "Select...".to_string(),
            submit_label: "Save intake".to_string(),
            submitting_label: "Saving...".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = FormConfig::new();
        assert_eq!(config.options_cache_capacity, 1_000);
        assert_eq!(config.required_message, "This field is required.");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = FormConfig::from_toml_str(
            r#"
            required_message = "Required"
            options_cache_capacity = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.required_message, "Required");
        assert_eq!(config.options_cache_capacity, 16);
        assert_eq!(config.submit_label, "Save intake");
    }

    #[test]
    fn toml_rejects_zero_capacity() {
        let result = FormConfig::from_toml_str("options_cache_capacity = 0");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn toml_rejects_wrong_types() {
        let result = FormConfig::from_toml_str("options_cache_capacity = \"many\"");
        assert!(matches!(result, Err(ConfigError::InvalidToml(_))));
    }

    #[test]
    fn builder_methods() {
        let config = FormConfig::new()
            .with_options_cache_capacity(8)
            .with_required_message("Needed")
            .with_select_placeholder("Choose");
        assert_eq!(config.options_cache_capacity, 8);
        assert_eq!(config.required_message, "Needed");
        assert_eq!(config.select_placeholder, "Choose");
    }
}
