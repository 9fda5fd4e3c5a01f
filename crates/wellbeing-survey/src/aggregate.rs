//! Per-year and per-quartile summary statistics.
//!
//! Two passes over the parsed dataset are unioned into one summary frame:
//!
//! - **Global pass**: one "All" row per year.
//! - **Quartile pass**: within each year, rows are split into Q1..Q4 by the
//!   25th/50th/75th percentiles of that year's `happiness_score`.
//!
//! Every (year, bucket) row carries `num_countries` plus mean/min/max for each
//! [`Indicator`]. A null indicator value is skipped by that indicator's
//! statistics but still counts towards `num_countries`.
//!
//! # Quartile boundaries
//!
//! Cut points use linear interpolation between closest ranks (position
//! `p * (n - 1)` in the ascending scores). Buckets are right-closed:
//! `score <= q25` is Q1, `q25 < score <= q50` is Q2, `q50 < score <= q75` is
//! Q3 and `score > q75` is Q4. Ties on a cut point go to the lower bucket.
//! All four quartile rows are emitted for every year; a bucket without members
//! reports `num_countries = 0` and null statistics.

use crate::error::{Result, ResultExt};
use crate::schema::{parsed_schema, summary_schema};
use crate::types::{Bucket, HAPPINESS_QUARTILE, HAPPINESS_SCORE, Indicator, NUM_COUNTRIES, YEAR};
use crate::utils::f64_values;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

const INDICATOR_COUNT: usize = Indicator::ALL.len();

/// Running mean/min/max over the non-null values of one indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorStats {
    count: usize,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl IndicatorStats {
    pub fn push(&mut self, value: Option<f64>) {
        let Some(v) = value else {
            return;
        };
        self.count += 1;
        self.sum += v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

/// One summary row before it is turned into columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub year: i32,
    pub bucket: Bucket,
    pub num_countries: u32,
    pub stats: [IndicatorStats; INDICATOR_COUNT],
}

impl SummaryRow {
    fn empty(year: i32, bucket: Bucket) -> Self {
        Self {
            year,
            bucket,
            num_countries: 0,
            stats: [IndicatorStats::default(); INDICATOR_COUNT],
        }
    }

    fn add(&mut self, values: &[Option<f64>; INDICATOR_COUNT]) {
        self.num_countries += 1;
        for (stats, value) in self.stats.iter_mut().zip(values) {
            stats.push(*value);
        }
    }

    pub fn stats_for(&self, indicator: Indicator) -> &IndicatorStats {
        let idx = Indicator::ALL
            .iter()
            .position(|i| *i == indicator)
            .unwrap_or_default();
        &self.stats[idx]
    }
}

/// Value at percentile `p` (0.0..=1.0) of ascending `sorted`, interpolating
/// linearly between the two closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// The 25th, 50th and 75th percentiles of `scores`.
pub fn quartile_cuts(scores: &[f64]) -> Option<[f64; 3]> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some([
        percentile(&sorted, 0.25)?,
        percentile(&sorted, 0.50)?,
        percentile(&sorted, 0.75)?,
    ])
}

/// Bucket of `score` given right-closed quartile cut points.
pub fn assign_quartile(score: f64, cuts: &[f64; 3]) -> Bucket {
    if score <= cuts[0] {
        Bucket::Q1
    } else if score <= cuts[1] {
        Bucket::Q2
    } else if score <= cuts[2] {
        Bucket::Q3
    } else {
        Bucket::Q4
    }
}

struct Observation {
    year: i32,
    score: f64,
    values: [Option<f64>; INDICATOR_COUNT],
}

fn observations(parsed: &DataFrame) -> Result<Vec<Observation>> {
    let years = parsed.column(YEAR)?.as_materialized_series().i32()?;
    let scores = f64_values(parsed, HAPPINESS_SCORE)?;
    let columns = Indicator::ALL
        .iter()
        .map(|indicator| f64_values(parsed, indicator.column()))
        .collect::<PolarsResult<Vec<_>>>()
        .context("Reading indicator columns")?;

    Ok(years
        .into_iter()
        .zip(scores)
        .enumerate()
        .filter_map(|(row, (year, score))| {
            Some(Observation {
                year: year?,
                score: score?,
                values: std::array::from_fn(|i| columns[i][row]),
            })
        })
        .collect())
}

/// Compute every (year, bucket) summary row, ordered by year then bucket.
pub fn summarize(parsed: &DataFrame) -> Result<Vec<SummaryRow>> {
    let observations = observations(parsed)?;

    let mut by_year: BTreeMap<i32, Vec<&Observation>> = BTreeMap::new();
    for obs in &observations {
        by_year.entry(obs.year).or_default().push(obs);
    }

    let mut rows: BTreeMap<(i32, Bucket), SummaryRow> = BTreeMap::new();
    for (year, members) in &by_year {
        let year = *year;
        for bucket in std::iter::once(Bucket::All).chain(Bucket::QUARTILES) {
            rows.insert((year, bucket), SummaryRow::empty(year, bucket));
        }

        let scores: Vec<f64> = members.iter().map(|o| o.score).collect();
        let Some(cuts) = quartile_cuts(&scores) else {
            continue;
        };
        debug!("Quartile cuts for {}: {:?}", year, cuts);

        for obs in members {
            if let Some(all) = rows.get_mut(&(year, Bucket::All)) {
                all.add(&obs.values);
            }
            let bucket = assign_quartile(obs.score, &cuts);
            if let Some(quartile) = rows.get_mut(&(year, bucket)) {
                quartile.add(&obs.values);
            }
        }
    }

    Ok(rows.into_values().collect())
}

/// Lay summary rows out as columns in summary schema order.
pub fn rows_to_frame(rows: &[SummaryRow]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = vec![
        Series::new(YEAR.into(), rows.iter().map(|r| r.year).collect::<Vec<_>>()).into(),
        Series::new(
            HAPPINESS_QUARTILE.into(),
            rows.iter().map(|r| r.bucket.label()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            NUM_COUNTRIES.into(),
            rows.iter().map(|r| r.num_countries).collect::<Vec<_>>(),
        )
        .into(),
    ];

    for (i, indicator) in Indicator::ALL.iter().enumerate() {
        let [mean_name, min_name, max_name] = indicator.summary_columns();
        let means: Vec<Option<f64>> = rows.iter().map(|r| r.stats[i].mean()).collect();
        let mins: Vec<Option<f64>> = rows.iter().map(|r| r.stats[i].min()).collect();
        let maxs: Vec<Option<f64>> = rows.iter().map(|r| r.stats[i].max()).collect();
        columns.push(Series::new(mean_name.into(), means).into());
        columns.push(Series::new(min_name.into(), mins).into());
        columns.push(Series::new(max_name.into(), maxs).into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Aggregate a parsed dataset into the summary dataset.
pub fn aggregate(parsed: &DataFrame) -> Result<DataFrame> {
    let parsed = parsed_schema()
        .validate(parsed)
        .context("Aggregator input")?;

    let rows = summarize(&parsed)?;
    info!(
        "Aggregated {} records into {} summary rows",
        parsed.height(),
        rows.len()
    );

    let summary = rows_to_frame(&rows)?;
    summary_schema().validate(&summary)
}
