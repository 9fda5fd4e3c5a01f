//! Schema registry and stage-boundary validation.
//!
//! Three record shapes are registered: [`raw_schema`] (one reconciled source
//! file, or the concatenation of all of them), [`parsed_schema`] (after
//! region gap-filling) and [`summary_schema`] (aggregator output).
//!
//! Validation uses filter semantics: columns the schema does not declare are
//! dropped from the returned frame rather than reported. Every other problem
//! (missing required field, wrong dtype, disallowed null) is collected so a
//! single [`SurveyError::SchemaViolation`] names all offending fields.

use crate::error::{FieldViolation, Result, SurveyError, ViolationKind};
use crate::types::{
    COUNTRY, FAMILY_AND_SOCIAL_SUPPORT, FREEDOM, GDP_PER_CAPITA, GENEROSITY, HAPPINESS_QUARTILE,
    HAPPINESS_RANK, HAPPINESS_SCORE, HEALTHY_LIFE_EXPECTANCY, Indicator, NUM_COUNTRIES,
    PERCEPTION_OF_CORRUPTION, REGION, YEAR,
};
use once_cell::sync::Lazy;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Logical field types understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Int32,
    Int64,
    UInt32,
    Float64,
    String,
}

impl FieldType {
    /// The polars dtype a column must have to satisfy this field type.
    pub fn data_type(self) -> DataType {
        match self {
            FieldType::Int32 => DataType::Int32,
            FieldType::Int64 => DataType::Int64,
            FieldType::UInt32 => DataType::UInt32,
            FieldType::Float64 => DataType::Float64,
            FieldType::String => DataType::String,
        }
    }
}

/// Declaration of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub dtype: FieldType,
    pub required: bool,
    pub nullable: bool,
}

impl FieldSpec {
    /// A required, non-nullable field.
    pub const fn required(dtype: FieldType) -> Self {
        Self {
            dtype,
            required: true,
            nullable: false,
        }
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// An ordered, named collection of field declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    fields: Vec<(String, FieldSpec)>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field declaration (builder style).
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[(String, FieldSpec)] {
        &self.fields
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn get(&self, field: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, spec)| spec)
    }

    /// Derive a new schema with a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Schema {
        Schema {
            name: name.into(),
            fields: self.fields.clone(),
        }
    }

    /// Derive a new schema where `field` has the given requiredness.
    ///
    /// `self` is left untouched.
    pub fn update(&self, field: &str, required: bool) -> Result<Schema> {
        self.derive(field, |spec| spec.required = required)
    }

    /// Derive a new schema where `field` has the given nullability.
    pub fn with_nullable(&self, field: &str, nullable: bool) -> Result<Schema> {
        self.derive(field, |spec| spec.nullable = nullable)
    }

    fn derive(&self, field: &str, change: impl FnOnce(&mut FieldSpec)) -> Result<Schema> {
        let mut derived = self.clone();
        let spec = derived
            .fields
            .iter_mut()
            .find(|(name, _)| name == field)
            .map(|(_, spec)| spec)
            .ok_or_else(|| {
                SurveyError::schema_violation(
                    self.name.clone(),
                    vec![FieldViolation {
                        field: field.to_string(),
                        kind: ViolationKind::UnknownField,
                    }],
                )
            })?;
        change(spec);
        Ok(derived)
    }

    /// Validate `df` and return it restricted to this schema's fields, in
    /// schema order.
    pub fn validate(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut violations = Vec::new();
        let mut keep: Vec<&str> = Vec::with_capacity(self.fields.len());

        for (name, spec) in &self.fields {
            let Ok(column) = df.column(name) else {
                if spec.required {
                    violations.push(FieldViolation {
                        field: name.clone(),
                        kind: ViolationKind::Missing,
                    });
                }
                continue;
            };

            let expected = spec.dtype.data_type();
            if column.dtype() != &expected {
                violations.push(FieldViolation {
                    field: name.clone(),
                    kind: ViolationKind::WrongType {
                        expected: expected.to_string(),
                        found: column.dtype().to_string(),
                    },
                });
                continue;
            }

            let null_count = column.null_count();
            if !spec.nullable && null_count > 0 {
                violations.push(FieldViolation {
                    field: name.clone(),
                    kind: ViolationKind::NullNotAllowed { null_count },
                });
                continue;
            }

            keep.push(name.as_str());
        }

        if !violations.is_empty() {
            return Err(SurveyError::schema_violation(self.name.clone(), violations));
        }

        let dropped = df.width().saturating_sub(keep.len());
        if dropped > 0 {
            debug!(
                "Schema '{}' filtered out {} undeclared column(s)",
                self.name, dropped
            );
        }

        Ok(df.select(keep)?)
    }
}

/// Validate `df` against `schema`, consuming the input.
pub fn validate(df: DataFrame, schema: &Schema) -> Result<DataFrame> {
    schema.validate(&df)
}

static RAW_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    let float = FieldSpec::required(FieldType::Float64);
    Schema::new("raw")
        .field(YEAR, FieldSpec::required(FieldType::Int32))
        .field(COUNTRY, FieldSpec::required(FieldType::String))
        // absent in some source years; null after the loose union
        .field(REGION, FieldSpec::required(FieldType::String).optional().nullable())
        .field(HAPPINESS_RANK, FieldSpec::required(FieldType::Int64))
        .field(HAPPINESS_SCORE, float)
        .field(GDP_PER_CAPITA, float)
        .field(HEALTHY_LIFE_EXPECTANCY, float)
        .field(FAMILY_AND_SOCIAL_SUPPORT, float)
        .field(FREEDOM, float)
        .field(PERCEPTION_OF_CORRUPTION, float.nullable())
        .field(GENEROSITY, float)
});

static PARSED_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    RAW_SCHEMA
        .update(REGION, true)
        .and_then(|schema| schema.with_nullable(REGION, false))
        .map(|schema| schema.renamed("parsed"))
        .unwrap_or_else(|_| RAW_SCHEMA.renamed("parsed"))
});

static SUMMARY_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    // empty quartiles and all-null indicator groups yield null statistics
    let stat = FieldSpec::required(FieldType::Float64).nullable();
    let mut schema = Schema::new("summary")
        .field(YEAR, FieldSpec::required(FieldType::Int32))
        .field(HAPPINESS_QUARTILE, FieldSpec::required(FieldType::String))
        .field(NUM_COUNTRIES, FieldSpec::required(FieldType::UInt32));
    for indicator in Indicator::ALL {
        for column in indicator.summary_columns() {
            schema = schema.field(column, stat);
        }
    }
    schema
});

/// Shape of a reconciled source file.
pub fn raw_schema() -> &'static Schema {
    &RAW_SCHEMA
}

/// Shape of the gap-filled dataset: `region` required and non-null.
pub fn parsed_schema() -> &'static Schema {
    &PARSED_SCHEMA
}

/// Shape of the aggregator output.
pub fn summary_schema() -> &'static Schema {
    &SUMMARY_SCHEMA
}
