//! Shared helpers used across the pipeline stages.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Owned column names of a DataFrame, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// =============================================================================
// Value Utilities
// =============================================================================

/// Parse a cell as f64, yielding `None` for anything unparsable.
///
/// Matches a non-strict float cast: surrounding whitespace is ignored, but
/// no other cleanup is attempted.
pub fn parse_float_lenient(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Read a column as `Vec<Option<f64>>`, casting numeric columns as needed.
pub fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(name)?.as_materialized_series();
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats.f64()?.into_iter().collect())
}

/// Read a string column as `Vec<Option<String>>`.
pub fn string_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(name)?.as_materialized_series();
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_lenient() {
        assert_eq!(parse_float_lenient(" 0.25 "), Some(0.25));
        assert_eq!(parse_float_lenient("N/A"), None);
        assert_eq!(parse_float_lenient(""), None);
        assert_eq!(parse_float_lenient("NaN"), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(7.5874, 2), 7.59);
        assert_eq!(round_to(1.3966, 2), 1.40);
        assert_eq!(round_to(-0.125, 1), -0.1);
    }

    #[test]
    fn test_f64_values_casts_integers() {
        let df = df!["rank" => [1i64, 2, 3]].unwrap();
        assert_eq!(
            f64_values(&df, "rank").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int32));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
    }
}
