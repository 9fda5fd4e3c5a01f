//! Shared domain types: canonical column names, indicators and buckets.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

pub const YEAR: &str = "year";
pub const COUNTRY: &str = "country";
pub const REGION: &str = "region";
pub const HAPPINESS_RANK: &str = "happiness_rank";
pub const HAPPINESS_SCORE: &str = "happiness_score";
pub const GDP_PER_CAPITA: &str = "gdp_per_capita";
pub const HEALTHY_LIFE_EXPECTANCY: &str = "healthy_life_expectancy";
pub const FAMILY_AND_SOCIAL_SUPPORT: &str = "score_family_and_social_support";
pub const FREEDOM: &str = "score_freedom";
pub const PERCEPTION_OF_CORRUPTION: &str = "score_perception_of_corruption";
pub const GENEROSITY: &str = "score_generosity";

pub const HAPPINESS_QUARTILE: &str = "happiness_quartile";
pub const NUM_COUNTRIES: &str = "num_countries";

/// Numeric indicators summarised by the aggregator, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    HappinessScore,
    GdpPerCapita,
    HealthyLifeExpectancy,
    SocialSupport,
    Freedom,
    PerceptionOfCorruption,
}

impl Indicator {
    pub const ALL: [Indicator; 6] = [
        Indicator::HappinessScore,
        Indicator::GdpPerCapita,
        Indicator::HealthyLifeExpectancy,
        Indicator::SocialSupport,
        Indicator::Freedom,
        Indicator::PerceptionOfCorruption,
    ];

    /// Column holding the indicator in a parsed dataset.
    pub fn column(self) -> &'static str {
        match self {
            Indicator::HappinessScore => HAPPINESS_SCORE,
            Indicator::GdpPerCapita => GDP_PER_CAPITA,
            Indicator::HealthyLifeExpectancy => HEALTHY_LIFE_EXPECTANCY,
            Indicator::SocialSupport => FAMILY_AND_SOCIAL_SUPPORT,
            Indicator::Freedom => FREEDOM,
            Indicator::PerceptionOfCorruption => PERCEPTION_OF_CORRUPTION,
        }
    }

    /// Prefix used for the indicator's columns in a summary dataset.
    pub fn summary_alias(self) -> &'static str {
        match self {
            Indicator::SocialSupport => "social_support",
            other => other.column(),
        }
    }

    /// Names of the `(mean, min, max)` summary columns.
    pub fn summary_columns(self) -> [String; 3] {
        let alias = self.summary_alias();
        [
            format!("{alias}_mean"),
            format!("{alias}_min"),
            format!("{alias}_max"),
        ]
    }
}

/// A summary bucket: the whole year, or one happiness-score quartile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    All,
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Bucket {
    pub const QUARTILES: [Bucket; 4] = [Bucket::Q1, Bucket::Q2, Bucket::Q3, Bucket::Q4];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::All => "All",
            Bucket::Q1 => "Q1",
            Bucket::Q2 => "Q2",
            Bucket::Q3 => "Q3",
            Bucket::Q4 => "Q4",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The two datasets produced by one pipeline run.
#[derive(Debug, Clone)]
pub struct SurveyOutput {
    /// Gap-filled records sorted by (country, year).
    pub parsed: DataFrame,
    /// One row per (year, bucket).
    pub summary: DataFrame,
}

impl SurveyOutput {
    /// Distinct years present in the parsed dataset, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .parsed
            .column(YEAR)
            .ok()
            .and_then(|c| c.as_materialized_series().i32().ok())
            .map(|ca| ca.into_iter().flatten().collect())
            .unwrap_or_default();
        years.sort_unstable();
        years.dedup();
        years
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_support_alias() {
        assert_eq!(Indicator::SocialSupport.column(), "score_family_and_social_support");
        assert_eq!(
            Indicator::SocialSupport.summary_columns(),
            [
                "social_support_mean".to_string(),
                "social_support_min".to_string(),
                "social_support_max".to_string()
            ]
        );
        assert_eq!(Indicator::Freedom.summary_alias(), "score_freedom");
    }

    #[test]
    fn test_bucket_order_matches_labels() {
        let mut buckets = vec![Bucket::Q3, Bucket::All, Bucket::Q1, Bucket::Q4, Bucket::Q2];
        buckets.sort();
        let labels: Vec<&str> = buckets.iter().map(|b| b.label()).collect();
        let mut sorted_labels = labels.clone();
        sorted_labels.sort();
        assert_eq!(labels, sorted_labels);
    }
}
