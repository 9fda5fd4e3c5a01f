//! Column reconciliation for a single yearly source file.
//!
//! Survey files from different years spell the same indicator differently
//! ("Economy (GDP per Capita)", "Economy..GDP.per.Capita.", "GDP per capita").
//! Reconciliation maps every header onto the canonical vocabulary of the raw
//! schema, coerces the corruption score to a float, stamps the year taken from
//! the file name and drops known extraneous columns.

use crate::error::{FieldViolation, Result, ResultExt, SurveyError, ViolationKind};
use crate::schema::raw_schema;
use crate::types::{Indicator, PERCEPTION_OF_CORRUPTION, YEAR};
use crate::utils::{column_names, is_numeric_dtype, parse_float_lenient};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

static HEADER_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ .()]+").expect("Invalid regex: header separators"));

/// Normalized source spelling → canonical field name.
///
/// Headers not listed here pass through unchanged.
pub const SYNONYMS: &[(&str, &str)] = &[
    ("country_or_region", "country"),
    ("health_life_expectancy", "healthy_life_expectancy"),
    ("generosity", "score_generosity"),
    ("trust_government_corruption", "score_perception_of_corruption"),
    ("perceptions_of_corruption", "score_perception_of_corruption"),
    ("overall_rank", "happiness_rank"),
    ("score", "happiness_score"),
    ("freedom", "score_freedom"),
    ("freedom_to_make_life_choices", "score_freedom"),
    ("economy_gdp_per_capita", "gdp_per_capita"),
    ("family", "score_family_and_social_support"),
    ("social_support", "score_family_and_social_support"),
];

/// Columns some years publish that have no place in the raw schema.
pub const DROPPED_COLUMNS: &[&str] = &[
    "whisker_high",
    "whisker_low",
    "standard_error",
    "upper_confidence_interval",
    "lower_confidence_interval",
    "dystopia_residual",
];

/// Derive the survey year from a source file's base name (`2016.csv` → 2016).
pub fn year_from_path(path: &Path) -> Result<i32> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.trim().parse::<i32>().ok())
        .ok_or_else(|| SurveyError::Naming {
            path: path.to_path_buf(),
        })
}

/// Lowercase a header, collapse runs of space/`.`/`(`/`)` into `_` and trim
/// underscores from both ends.
pub fn normalize_header(name: &str) -> String {
    let lowered = name.to_lowercase();
    HEADER_SEPARATORS
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Map a normalized header to its canonical name.
pub fn canonical_name(normalized: &str) -> &str {
    SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(normalized)
}

/// Reconcile one source file's frame and stamp it with `year`.
///
/// The result is validated against the raw schema, so it carries only raw
/// schema fields, in schema order.
pub fn reconcile(mut df: DataFrame, year: i32) -> Result<DataFrame> {
    let original = column_names(&df);
    let renamed: Vec<String> = original
        .iter()
        .map(|name| canonical_name(&normalize_header(name)).to_string())
        .collect();

    check_unique(&original, &renamed)?;

    for (from, to) in original.iter().zip(&renamed) {
        if from != to {
            debug!("Renaming column '{}' -> '{}'", from, to);
        }
    }
    df.set_column_names(renamed.iter().map(|s| s.as_str()))
        .context("Failed to apply canonical column names")?;

    coerce_corruption_score(&mut df)?;
    widen_integer_indicators(&mut df)?;

    let year_column = Series::new(YEAR.into(), vec![year; df.height()]);
    df.with_column(year_column)?;

    let to_drop: Vec<PlSmallStr> = DROPPED_COLUMNS
        .iter()
        .filter(|name| renamed.iter().any(|r| r == *name))
        .map(|name| (*name).into())
        .collect();
    if !to_drop.is_empty() {
        debug!("Dropping extraneous columns: {:?}", to_drop);
        df = df.drop_many(to_drop);
    }

    raw_schema().validate(&df)
}

/// Reconcile a frame read from `path`, deriving the year from its name.
pub fn reconcile_source(path: &Path, df: DataFrame) -> Result<DataFrame> {
    let year = year_from_path(path)?;
    reconcile(df, year).context(format!("While reconciling '{}'", path.display()))
}

fn check_unique(original: &[String], renamed: &[String]) -> Result<()> {
    let mut sources: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (from, to) in original.iter().zip(renamed) {
        sources.entry(to.as_str()).or_default().push(from.clone());
    }

    let violations: Vec<FieldViolation> = sources
        .into_iter()
        .filter(|(_, from)| from.len() > 1)
        .map(|(field, from)| FieldViolation {
            field: field.to_string(),
            kind: ViolationKind::Duplicate { sources: from },
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SurveyError::schema_violation(
            raw_schema().name(),
            violations,
        ))
    }
}

/// Cast the corruption score to Float64; values that don't parse become null.
fn coerce_corruption_score(df: &mut DataFrame) -> Result<()> {
    let Ok(column) = df.column(PERCEPTION_OF_CORRUPTION) else {
        return Ok(());
    };
    let series = column.as_materialized_series();

    let coerced = match series.dtype() {
        DataType::Float64 => return Ok(()),
        DataType::String => {
            let values: Vec<Option<f64>> = series
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_float_lenient))
                .collect();
            let unparsable = values.iter().filter(|v| v.is_none()).count() - series.null_count();
            if unparsable > 0 {
                debug!(
                    "Coerced {} unparsable '{}' value(s) to null",
                    unparsable, PERCEPTION_OF_CORRUPTION
                );
            }
            Series::new(PERCEPTION_OF_CORRUPTION.into(), values)
        }
        dtype if is_numeric_dtype(dtype) => series.cast(&DataType::Float64)?,
        dtype => {
            warn!(
                "'{}' has non-numeric dtype {}; treating every value as missing",
                PERCEPTION_OF_CORRUPTION, dtype
            );
            Series::full_null(PERCEPTION_OF_CORRUPTION.into(), series.len(), &DataType::Float64)
        }
    };

    df.replace(PERCEPTION_OF_CORRUPTION, coerced)?;
    Ok(())
}

/// Cast indicator columns that were read as integers to Float64.
///
/// A year file whose indicator cells are all whole numbers ("5", "6") is
/// inferred as an integer column by the CSV reader.
fn widen_integer_indicators(df: &mut DataFrame) -> Result<()> {
    for indicator in Indicator::ALL {
        let name = indicator.column();
        let Ok(column) = df.column(name) else {
            continue;
        };
        if !column.dtype().is_integer() {
            continue;
        }
        debug!("Widening integer column '{}' to Float64", name);
        let widened = column.as_materialized_series().cast(&DataType::Float64)?;
        df.replace(name, widened)?;
    }
    Ok(())
}
