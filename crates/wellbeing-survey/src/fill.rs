//! Region gap-filling.
//!
//! Some survey years publish no region column at all. A country's region is
//! recovered from its own history: within each country group the last known
//! region is carried forward through later years, then the first known region
//! is carried backward to the years before it.
//!
//! The input must already be sorted by (country, year) so that each country's
//! rows are contiguous and chronological. This module does not re-sort.

use crate::error::{Result, ResultExt};
use crate::schema::parsed_schema;
use crate::types::{COUNTRY, REGION, YEAR};
use crate::utils::string_values;
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Fill nulls in `values` per contiguous run of equal `groups`:
/// forward fill, then backward fill.
///
/// `groups` holds one key per value. A group with no known value stays
/// entirely null.
pub fn fill_forward_backward(groups: &[Option<String>], values: &Series) -> PolarsResult<Series> {
    let mut filled = values.clear();
    let mut start = 0;
    while start < groups.len() {
        let mut end = start + 1;
        while end < groups.len() && groups[end] == groups[start] {
            end += 1;
        }
        let run = values
            .slice(start as i64, end - start)
            .fill_null(FillNullStrategy::Forward(None))?
            .fill_null(FillNullStrategy::Backward(None))?;
        filled.append(&run)?;
        start = end;
    }
    Ok(filled)
}

/// Fill missing regions and validate the result against the parsed schema.
///
/// A country without any known region keeps null regions and fails
/// validation with a schema violation.
pub fn fill_regions(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;

    let Ok(column) = df.column(REGION) else {
        debug!("No '{}' column present; nothing to fill", REGION);
        return parsed_schema().validate(&df);
    };
    let regions = column.as_materialized_series().clone();
    regions.str().context("Reading regions for region fill")?;

    let countries = string_values(&df, COUNTRY).context("Reading countries for region fill")?;
    warn_if_unsorted(&df, &countries);

    let missing_before = regions.null_count();
    let filled = fill_forward_backward(&countries, &regions).context("Filling regions")?;
    let missing_after = filled.null_count();
    info!(
        "Filled {} missing region value(s); {} remain unresolved",
        missing_before - missing_after,
        missing_after
    );

    df.replace(REGION, filled)?;
    parsed_schema().validate(&df)
}

/// Log when the (country, year) ordering precondition is visibly broken.
fn warn_if_unsorted(df: &DataFrame, countries: &[Option<String>]) {
    let Ok(years) = df
        .column(YEAR)
        .and_then(|c| c.as_materialized_series().cast(&DataType::Int64))
    else {
        return;
    };
    let Ok(years) = years.i64() else {
        return;
    };

    let keys: Vec<(Option<&String>, Option<i64>)> = countries
        .iter()
        .map(|c| c.as_ref())
        .zip(years.into_iter())
        .collect();
    if keys.windows(2).any(|pair| pair[0] > pair[1]) {
        warn!("Region fill input is not sorted by (country, year); fill results are undefined");
    }
}
