//! Error types for the survey pipeline.
//!
//! Every stage returns [`SurveyError`]. Nothing is downgraded to a warning:
//! the first failure aborts the run and is handed back to the caller.
//!
//! Errors serialize as `{ code, message }` so they can be emitted by the
//! CLI's JSON mode unchanged.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// A single field-level schema failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub kind: ViolationKind,
}

/// What went wrong with a field during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required field is absent from the dataset.
    Missing,
    /// The field exists but has the wrong dtype.
    WrongType { expected: String, found: String },
    /// The field holds nulls but the schema forbids them.
    NullNotAllowed { null_count: usize },
    /// The field is not declared by the schema at all.
    UnknownField,
    /// Several source columns collapse onto the same canonical field.
    Duplicate { sources: Vec<String> },
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "'{}' is missing", self.field),
            ViolationKind::WrongType { expected, found } => {
                write!(f, "'{}' expected {} but found {}", self.field, expected, found)
            }
            ViolationKind::NullNotAllowed { null_count } => {
                write!(f, "'{}' has {} disallowed null(s)", self.field, null_count)
            }
            ViolationKind::UnknownField => write!(f, "'{}' is not part of the schema", self.field),
            ViolationKind::Duplicate { sources } => {
                write!(f, "'{}' produced by several columns {:?}", self.field, sources)
            }
        }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// The main error type for the survey pipeline.
#[derive(Error, Debug)]
pub enum SurveyError {
    /// A source file name does not parse as a year.
    #[error("Cannot derive a year from file name '{}'", .path.display())]
    Naming { path: PathBuf },

    /// A source file could not be parsed as tabular data.
    #[error("Failed to parse '{}' as tabular data: {reason}", .path.display())]
    FileFormat { path: PathBuf, reason: String },

    /// A dataset failed validation against one of the registered schemas.
    #[error("Schema '{schema}' violated: {}", join_violations(.violations))]
    SchemaViolation {
        schema: String,
        violations: Vec<FieldViolation>,
    },

    /// The source directory holds no file with a recognized extension.
    #[error("No source files with extension '{extension}' found in '{}'", .dir.display())]
    NoSourceFiles { dir: PathBuf, extension: String },

    /// Nothing matched the requested country/year.
    #[error("No records for {what}")]
    NoMatchingRecords { what: String },

    /// The commentary collaborator failed or returned unusable output.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SurveyError>,
    },
}

impl SurveyError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SurveyError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a schema violation from a list of field failures.
    pub fn schema_violation(schema: impl Into<String>, violations: Vec<FieldViolation>) -> Self {
        SurveyError::SchemaViolation {
            schema: schema.into(),
            violations,
        }
    }

    /// Stable machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Naming { .. } => "NAMING_ERROR",
            Self::FileFormat { .. } => "FILE_FORMAT_ERROR",
            Self::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            Self::NoSourceFiles { .. } => "NO_SOURCE_FILES",
            Self::NoMatchingRecords { .. } => "NO_MATCHING_RECORDS",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The field violations carried by this error, looking through context wrappers.
    pub fn violations(&self) -> Option<&[FieldViolation]> {
        match self {
            Self::SchemaViolation { violations, .. } => Some(violations),
            Self::WithContext { source, .. } => source.violations(),
            _ => None,
        }
    }

    /// Check if this error is a schema violation.
    pub fn is_schema_violation(&self) -> bool {
        self.violations().is_some()
    }
}

impl Serialize for SurveyError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("SurveyError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for survey operations.
pub type Result<T> = std::result::Result<T, SurveyError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SurveyError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = SurveyError::Naming {
            path: PathBuf::from("latest.csv"),
        };
        assert_eq!(err.error_code(), "NAMING_ERROR");
        assert_eq!(
            SurveyError::ExternalService("down".to_string()).error_code(),
            "EXTERNAL_SERVICE_ERROR"
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        let errors = [
            SurveyError::FileFormat {
                path: PathBuf::from("2015.csv"),
                reason: "ragged row".to_string(),
            },
            SurveyError::NoSourceFiles {
                dir: PathBuf::from("data"),
                extension: "csv".to_string(),
            },
            SurveyError::InvalidConfig("no provider".to_string()),
            SurveyError::Io(std::io::Error::other("gone")),
        ];
        let codes: Vec<_> = errors.iter().map(SurveyError::error_code).collect();
        assert_eq!(
            codes,
            ["FILE_FORMAT_ERROR", "NO_SOURCE_FILES", "INVALID_CONFIG", "IO_ERROR"]
        );
    }

    #[test]
    fn test_schema_violation_lists_every_field() {
        let err = SurveyError::schema_violation(
            "parsed",
            vec![
                FieldViolation {
                    field: "region".to_string(),
                    kind: ViolationKind::NullNotAllowed { null_count: 4 },
                },
                FieldViolation {
                    field: "score_freedom".to_string(),
                    kind: ViolationKind::Missing,
                },
            ],
        );
        let message = err.to_string();
        assert!(message.contains("parsed"));
        assert!(message.contains("'region' has 4 disallowed null(s)"));
        assert!(message.contains("'score_freedom' is missing"));
        assert_eq!(err.violations().map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_error_serialization() {
        let error = SurveyError::NoMatchingRecords {
            what: "country 'Narnia' in 2015".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("NO_MATCHING_RECORDS"));
        assert!(json.contains("Narnia"));
    }

    #[test]
    fn test_with_context_preserves_code_and_violations() {
        let error = SurveyError::schema_violation(
            "raw",
            vec![FieldViolation {
                field: "country".to_string(),
                kind: ViolationKind::Missing,
            }],
        )
        .with_context("While loading 2015.csv");
        assert!(error.to_string().contains("While loading 2015.csv"));
        assert_eq!(error.error_code(), "SCHEMA_VIOLATION");
        assert!(error.is_schema_violation());
    }
}
