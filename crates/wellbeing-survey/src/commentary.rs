//! Payloads handed to the commentary provider.
//!
//! Two record lists are built from the pipeline output: the global ("All")
//! summary of one year and the parsed rows of one country in that year.
//! Floats are rounded, bookkeeping fields are stripped and each row becomes
//! an ordered field→value map.

use crate::ai::CommentaryProvider;
use crate::error::{Result, SurveyError};
use crate::types::{
    Bucket, COUNTRY, HAPPINESS_QUARTILE, NUM_COUNTRIES, REGION, SurveyOutput, YEAR,
};
use crate::utils::{round_to, string_values};
use polars::prelude::*;
use serde_json::{Map, Number, Value};
use tracing::{debug, info};

/// One row as an ordered field→value map.
pub type Record = Map<String, Value>;

/// Fields stripped from the year overview.
const OVERVIEW_STRIPPED: &[&str] = &[YEAR, NUM_COUNTRIES, HAPPINESS_QUARTILE];

/// Fields stripped from the country snapshot.
const SNAPSHOT_STRIPPED: &[&str] = &[REGION, YEAR];

fn year_mask(df: &DataFrame, year: i32) -> Result<Vec<bool>> {
    let years = df.column(YEAR)?.as_materialized_series().i32()?;
    Ok(years.into_iter().map(|y| y == Some(year)).collect())
}

fn to_json(value: AnyValue<'_>, decimals: u32) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Float64(v) => Number::from_f64(round_to(v, decimals))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AnyValue::Float32(v) => Number::from_f64(round_to(f64::from(v), decimals))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Boolean(v) => Value::Bool(v),
        AnyValue::String(v) => Value::String(v.to_string()),
        AnyValue::StringOwned(v) => Value::String(v.to_string()),
        other => Value::String(other.to_string()),
    }
}

/// Turn the selected rows of `df` into records, skipping `stripped` fields.
fn frame_records(
    df: &DataFrame,
    mask: &[bool],
    stripped: &[&str],
    decimals: u32,
) -> Result<Vec<Record>> {
    let kept: Vec<&Column> = df
        .get_columns()
        .iter()
        .filter(|c| !stripped.contains(&c.name().as_str()))
        .collect();

    let mut records = Vec::new();
    for (row, _) in mask.iter().enumerate().filter(|(_, keep)| **keep) {
        let mut record = Record::new();
        for column in &kept {
            let value = column.get(row)?;
            record.insert(column.name().to_string(), to_json(value, decimals));
        }
        records.push(record);
    }
    Ok(records)
}

/// Every row of `df` as a record, floats rounded to `decimals`.
pub fn records(df: &DataFrame, decimals: u32) -> Result<Vec<Record>> {
    frame_records(df, &vec![true; df.height()], &[], decimals)
}

/// The "All" summary row of `year`, stats rounded to `decimals`.
///
/// Fails with [`SurveyError::NoMatchingRecords`] when the year is absent.
pub fn year_overview(summary: &DataFrame, year: i32, decimals: u32) -> Result<Vec<Record>> {
    let labels = string_values(summary, HAPPINESS_QUARTILE)?;
    let mask: Vec<bool> = year_mask(summary, year)?
        .into_iter()
        .zip(labels.iter())
        .map(|(in_year, label)| in_year && label.as_deref() == Some(Bucket::All.label()))
        .collect();

    let records = frame_records(summary, &mask, OVERVIEW_STRIPPED, decimals)?;
    if records.is_empty() {
        return Err(SurveyError::NoMatchingRecords {
            what: format!("year {}", year),
        });
    }
    Ok(records)
}

/// The parsed rows of `country` in `year`, floats rounded to `decimals`.
///
/// Fails with [`SurveyError::NoMatchingRecords`] when nothing matches.
pub fn country_snapshot(
    parsed: &DataFrame,
    country: &str,
    year: i32,
    decimals: u32,
) -> Result<Vec<Record>> {
    let countries = string_values(parsed, COUNTRY)?;
    let mask: Vec<bool> = year_mask(parsed, year)?
        .into_iter()
        .zip(countries.iter())
        .map(|(in_year, c)| in_year && c.as_deref() == Some(country))
        .collect();

    let records = frame_records(parsed, &mask, SNAPSHOT_STRIPPED, decimals)?;
    if records.is_empty() {
        return Err(SurveyError::NoMatchingRecords {
            what: format!("country '{}' in {}", country, year),
        });
    }
    Ok(records)
}

/// Render the provider prompt for one country and year.
pub fn build_prompt(
    country: &str,
    year: i32,
    overview: &[Record],
    snapshot: &[Record],
) -> Result<String> {
    let overview_json = serde_json::to_string_pretty(overview)?;
    let snapshot_json = serde_json::to_string_pretty(snapshot)?;

    Ok(format!(
        "Below are world happiness survey results for {year}.\n\n\
        GLOBAL AVERAGES AND RANGES ({year}, all countries):\n{overview_json}\n\n\
        {country} ({year}):\n{snapshot_json}\n\n\
        Write a short commentary (two or three paragraphs) on how {country} compares \
        with the global picture in {year}. Mention the indicators where it stands out \
        above or below the mean. Use only the numbers given above."
    ))
}

/// Build payloads and prompt, then ask `provider` for commentary.
///
/// Provider failures and blank responses become
/// [`SurveyError::ExternalService`]. There is no retry.
pub fn generate_commentary(
    provider: &dyn CommentaryProvider,
    output: &SurveyOutput,
    country: &str,
    year: i32,
    decimals: u32,
) -> Result<String> {
    let overview = year_overview(&output.summary, year, decimals)?;
    let snapshot = country_snapshot(&output.parsed, country, year, decimals)?;
    let prompt = build_prompt(country, year, &overview, &snapshot)?;
    debug!("Commentary prompt:\n{}", prompt);

    info!(
        "Requesting commentary for {} {} from {}{}",
        country,
        year,
        provider.name(),
        provider.model().map(|m| format!(" ({m})")).unwrap_or_default()
    );
    let text = provider
        .generate(&prompt)
        .map_err(|e| SurveyError::ExternalService(format!("{}: {:#}", provider.name(), e)))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(SurveyError::ExternalService(format!(
            "{} returned an empty response",
            provider.name()
        )));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    fn summary_frame() -> DataFrame {
        df![
            "year" => [2015i32, 2015, 2016],
            "happiness_quartile" => ["All", "Q1", "All"],
            "num_countries" => [3u32, 1, 3],
            "happiness_score_mean" => [Some(5.123456), Some(3.0), Some(6.0)],
            "happiness_score_min" => [Some(3.0), Some(3.0), None],
        ]
        .unwrap()
    }

    fn parsed_frame() -> DataFrame {
        df![
            "year" => [2015i32, 2016, 2015],
            "country" => ["Chile", "Chile", "Peru"],
            "region" => ["Latin America", "Latin America", "Latin America"],
            "happiness_rank" => [27i64, 24, 58],
            "happiness_score" => [6.6701, 6.7051, 5.824],
            "score_perception_of_corruption" => [None, Some(0.0411), Some(0.0584)],
        ]
        .unwrap()
    }

    struct CannedProvider {
        reply: anyhow::Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(anyhow::anyhow!(message.to_string())),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommentaryProvider for CannedProvider {
        fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!(e.to_string())),
            }
        }

        fn name(&self) -> &str {
            "Canned"
        }
    }

    fn output() -> SurveyOutput {
        SurveyOutput {
            parsed: parsed_frame(),
            summary: summary_frame(),
        }
    }

    #[test]
    fn test_year_overview_strips_bookkeeping_and_rounds() {
        let overview = year_overview(&summary_frame(), 2015, 2).unwrap();

        assert_eq!(overview.len(), 1);
        assert_eq!(
            Value::Object(overview[0].clone()),
            json!({"happiness_score_mean": 5.12, "happiness_score_min": 3.0})
        );
        let keys: Vec<&String> = overview[0].keys().collect();
        assert_eq!(keys, vec!["happiness_score_mean", "happiness_score_min"]);
    }

    #[test]
    fn test_records_keep_every_row_and_field() {
        let all = records(&parsed_frame(), 1).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2]["region"], json!("Latin America"));
        assert_eq!(all[2]["happiness_score"], json!(5.8));
        assert_eq!(all[0].len(), 6);
    }

    #[test]
    fn test_year_overview_keeps_null_stats() {
        let overview = year_overview(&summary_frame(), 2016, 2).unwrap();
        assert_eq!(overview[0]["happiness_score_min"], Value::Null);
    }

    #[test]
    fn test_year_overview_unknown_year() {
        let err = year_overview(&summary_frame(), 1999, 2).unwrap_err();
        assert_eq!(err.error_code(), "NO_MATCHING_RECORDS");
    }

    #[test]
    fn test_country_snapshot_fields() {
        let snapshot = country_snapshot(&parsed_frame(), "Chile", 2016, 2).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            Value::Object(snapshot[0].clone()),
            json!({
                "country": "Chile",
                "happiness_rank": 24,
                "happiness_score": 6.71,
                "score_perception_of_corruption": 0.04,
            })
        );
    }

    #[test]
    fn test_country_snapshot_null_indicator_is_null() {
        let snapshot = country_snapshot(&parsed_frame(), "Chile", 2015, 2).unwrap();
        assert_eq!(snapshot[0]["score_perception_of_corruption"], Value::Null);
    }

    #[test]
    fn test_country_snapshot_unknown_country() {
        let err = country_snapshot(&parsed_frame(), "Narnia", 2015, 2).unwrap_err();
        assert_eq!(err.error_code(), "NO_MATCHING_RECORDS");
        assert!(err.to_string().contains("Narnia"));
    }

    #[test]
    fn test_build_prompt_embeds_payloads() {
        let overview = year_overview(&summary_frame(), 2015, 2).unwrap();
        let snapshot = country_snapshot(&parsed_frame(), "Peru", 2015, 2).unwrap();

        let prompt = build_prompt("Peru", 2015, &overview, &snapshot).unwrap();
        assert!(prompt.contains("Peru (2015)"));
        assert!(prompt.contains("\"happiness_score_mean\": 5.12"));
        assert!(prompt.contains("\"happiness_rank\": 58"));
    }

    #[test]
    fn test_generate_commentary_returns_trimmed_text() {
        let provider = CannedProvider::replying("  Chile is above average.\n");
        let text = generate_commentary(&provider, &output(), "Chile", 2015, 2).unwrap();

        assert_eq!(text, "Chile is above average.");
        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Chile (2015)"));
    }

    #[test]
    fn test_generate_commentary_provider_failure() {
        let provider = CannedProvider::failing("connection refused");
        let err = generate_commentary(&provider, &output(), "Chile", 2015, 2).unwrap_err();

        assert_eq!(err.error_code(), "EXTERNAL_SERVICE_ERROR");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_generate_commentary_empty_response() {
        let provider = CannedProvider::replying("   ");
        let err = generate_commentary(&provider, &output(), "Chile", 2015, 2).unwrap_err();
        assert_eq!(err.error_code(), "EXTERNAL_SERVICE_ERROR");
    }

    #[test]
    fn test_generate_commentary_skips_provider_when_no_records() {
        let provider = CannedProvider::replying("unused");
        let err = generate_commentary(&provider, &output(), "Chile", 2030, 2).unwrap_err();

        assert_eq!(err.error_code(), "NO_MATCHING_RECORDS");
        assert!(provider.prompts.lock().unwrap().is_empty());
    }
}
