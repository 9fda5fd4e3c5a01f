//! Configuration types for the survey pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};

/// Configuration for the survey pipeline.
///
/// Use [`SurveyConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use wellbeing_survey::config::SurveyConfig;
///
/// let config = SurveyConfig::builder()
///     .source_extension("csv")
///     .round_decimals(2)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Extension (without the dot) of the yearly source files.
    /// Matched case-insensitively.
    /// Default: "csv"
    pub source_extension: String,

    /// Number of rows the CSV reader samples to infer column dtypes.
    /// `None` scans the whole file.
    /// Default: None
    pub infer_schema_length: Option<usize>,

    /// Decimal places kept for indicator values handed to the commentary
    /// collaborator.
    /// Default: 2
    pub round_decimals: u32,

    /// Whether to request natural-language commentary (requires a provider).
    /// Default: true
    pub use_commentary: bool,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            source_extension: "csv".to_string(),
            infer_schema_length: None,
            round_decimals: 2,
            use_commentary: true,
        }
    }
}

impl SurveyConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SurveyConfigBuilder {
        SurveyConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let ext = self.source_extension.trim();
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(ConfigValidationError::InvalidExtension(
                self.source_extension.clone(),
            ));
        }

        if self.infer_schema_length == Some(0) {
            return Err(ConfigValidationError::InvalidInferSchemaLength);
        }

        if self.round_decimals > 10 {
            return Err(ConfigValidationError::InvalidRoundDecimals(
                self.round_decimals,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid source extension '{0}' (expected a bare extension such as 'csv')")]
    InvalidExtension(String),

    #[error("Invalid infer_schema_length: must be at least 1 row (or None for a full scan)")]
    InvalidInferSchemaLength,

    #[error("Invalid round_decimals: {0} (must be at most 10)")]
    InvalidRoundDecimals(u32),
}

impl From<ConfigValidationError> for crate::error::SurveyError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::SurveyError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`SurveyConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct SurveyConfigBuilder {
    source_extension: Option<String>,
    infer_schema_length: Option<Option<usize>>,
    round_decimals: Option<u32>,
    use_commentary: Option<bool>,
}

impl SurveyConfigBuilder {
    /// Set the source file extension (without the dot).
    pub fn source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = Some(extension.into());
        self
    }

    /// Set how many rows the CSV reader uses for dtype inference.
    pub fn infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = Some(rows);
        self
    }

    /// Set the rounding precision used for commentary payloads.
    pub fn round_decimals(mut self, decimals: u32) -> Self {
        self.round_decimals = Some(decimals);
        self
    }

    /// Enable or disable commentary generation.
    pub fn use_commentary(mut self, enable: bool) -> Self {
        self.use_commentary = Some(enable);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<SurveyConfig, ConfigValidationError> {
        let defaults = SurveyConfig::default();
        let config = SurveyConfig {
            source_extension: self
                .source_extension
                .unwrap_or(defaults.source_extension)
                .trim()
                .trim_start_matches('.')
                .to_string(),
            infer_schema_length: self
                .infer_schema_length
                .unwrap_or(defaults.infer_schema_length),
            round_decimals: self.round_decimals.unwrap_or(defaults.round_decimals),
            use_commentary: self.use_commentary.unwrap_or(defaults.use_commentary),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SurveyConfig::default();
        assert_eq!(config.source_extension, "csv");
        assert_eq!(config.round_decimals, 2);
        assert!(config.infer_schema_length.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_strips_leading_dot() {
        let config = SurveyConfig::builder()
            .source_extension(".CSV")
            .use_commentary(false)
            .build()
            .unwrap();
        assert_eq!(config.source_extension, "CSV");
        assert!(!config.use_commentary);
    }

    #[test]
    fn test_builder_rejects_zero_inference_rows() {
        let result = SurveyConfig::builder().infer_schema_length(Some(0)).build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::InvalidInferSchemaLength)
        ));
    }

    #[test]
    fn test_builder_rejects_path_like_extension() {
        let result = SurveyConfig::builder().source_extension("data/csv").build();
        assert!(matches!(result, Err(ConfigValidationError::InvalidExtension(_))));
    }

    #[test]
    fn test_config_serializes() {
        let json = serde_json::to_string(&SurveyConfig::default()).unwrap();
        assert!(json.contains("\"source_extension\":\"csv\""));
    }
}
