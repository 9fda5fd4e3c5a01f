//! CLI entry point for the world happiness survey pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use serde::Serialize;
use std::path::Path;
use wellbeing_survey::commentary::{self, Record};
use wellbeing_survey::{SurveyConfig, SurveyError, SurveyOutput, SurveyPipeline};

#[cfg(feature = "ai")]
use std::env;
#[cfg(feature = "ai")]
use std::sync::Arc;
#[cfg(feature = "ai")]
use wellbeing_survey::ai::OpenRouterProvider;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "World happiness survey normalization and summary pipeline",
    long_about = "Loads yearly happiness survey files (named <year>.csv), reconciles their \
                  columns, fills missing regions and prints per-year and per-quartile \
                  summaries.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  OPENROUTER_API_KEY    API key for OpenRouter (required for commentary)\n\n\
                  EXAMPLES:\n  \
                  # Summaries only\n  \
                  wellbeing-survey -i data/\n\n  \
                  # Commentary for one country and year\n  \
                  wellbeing-survey -i data/ --country Chile --year 2017\n\n  \
                  # Commentary payloads without calling the service\n  \
                  wellbeing-survey -i data/ --country Chile --year 2017 --no-ai"
)]
struct Args {
    /// Directory holding the yearly source files
    #[arg(short, long)]
    input: String,

    /// Country to comment on
    #[arg(short, long, requires = "year")]
    country: Option<String>,

    /// Survey year to comment on
    #[arg(short, long, requires = "country")]
    year: Option<i32>,

    /// Do not call the commentary service; print its payloads instead
    #[arg(long, default_value = "false")]
    no_ai: bool,

    /// Source file extension
    #[arg(long, default_value = "csv")]
    extension: String,

    /// Decimal places for commentary payloads
    #[arg(long, default_value = "2")]
    decimals: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of printed tables
    ///
    /// Disables all logs; only the final JSON document is written.
    #[arg(long)]
    json: bool,
}

/// JSON document written by `--json`.
#[derive(Serialize)]
struct RunReport {
    years: Vec<i32>,
    parsed: Vec<Record>,
    summary: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commentary: Option<CommentaryReport>,
}

#[derive(Serialize)]
struct CommentaryReport {
    country: String,
    year: i32,
    year_overview: Vec<Record>,
    country_snapshot: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled so stdout only
/// carries the JSON document.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    if !Path::new(&args.input).is_dir() {
        return Err(anyhow!("Input directory not found: {}", args.input));
    }

    let config = SurveyConfig::builder()
        .source_extension(&args.extension)
        .round_decimals(args.decimals)
        .use_commentary(!args.no_ai)
        .build()?;

    let pipeline = build_pipeline(&args, config)?;

    match run(&pipeline, &args) {
        Ok(()) => Ok(()),
        Err(e) if args.json => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "error": e }))?);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Build the pipeline, attaching the OpenRouter provider when commentary is requested.
#[cfg(feature = "ai")]
fn build_pipeline(args: &Args, config: SurveyConfig) -> Result<SurveyPipeline> {
    let wants_commentary = args.country.is_some() && !args.no_ai;
    if !wants_commentary {
        return Ok(SurveyPipeline::builder().config(config).build()?);
    }

    let api_key = env::var("OPENROUTER_API_KEY").map_err(|_| {
        anyhow!("OPENROUTER_API_KEY not set (pass --no-ai to print the commentary payloads instead)")
    })?;
    tracing::info!("Commentary via OpenRouter");

    let provider = Arc::new(OpenRouterProvider::new(api_key)?);
    Ok(SurveyPipeline::builder()
        .config(config)
        .commentary_provider(provider)
        .build()?)
}

/// Build pipeline (non-AI version when the ai feature is disabled)
#[cfg(not(feature = "ai"))]
fn build_pipeline(args: &Args, config: SurveyConfig) -> Result<SurveyPipeline> {
    if args.country.is_some() && !args.no_ai {
        tracing::warn!("Built without the 'ai' feature; printing commentary payloads only");
    }
    Ok(SurveyPipeline::builder().config(config).build()?)
}

fn run(pipeline: &SurveyPipeline, args: &Args) -> std::result::Result<(), SurveyError> {
    let output = pipeline.run(&args.input)?;
    let decimals = pipeline.config().round_decimals;

    let commentary_report = match (&args.country, args.year) {
        (Some(country), Some(year)) => Some(build_commentary(pipeline, &output, country, year)?),
        _ => None,
    };

    if args.json {
        let report = RunReport {
            years: output.years(),
            parsed: commentary::records(&output.parsed, decimals)?,
            summary: commentary::records(&output.summary, decimals)?,
            commentary: commentary_report,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_output(&output, commentary_report.as_ref())
}

fn build_commentary(
    pipeline: &SurveyPipeline,
    output: &SurveyOutput,
    country: &str,
    year: i32,
) -> std::result::Result<CommentaryReport, SurveyError> {
    let decimals = pipeline.config().round_decimals;
    let year_overview = commentary::year_overview(&output.summary, year, decimals)?;
    let country_snapshot = commentary::country_snapshot(&output.parsed, country, year, decimals)?;

    let text = if pipeline.has_commentary() {
        Some(pipeline.commentary(output, country, year)?)
    } else {
        None
    };

    Ok(CommentaryReport {
        country: country.to_string(),
        year,
        year_overview,
        country_snapshot,
        text,
    })
}

/// Print frames and commentary for humans.
///
/// Uses `println!` intentionally: this is the primary output and must be
/// visible regardless of log level.
fn print_output(
    output: &SurveyOutput,
    commentary: Option<&CommentaryReport>,
) -> std::result::Result<(), SurveyError> {
    println!("\n{}", "=".repeat(80));
    println!("PARSED RECORDS ({} rows, years {:?})", output.parsed.height(), output.years());
    println!("{}", "=".repeat(80));
    println!("{}", output.parsed);

    println!("\n{}", "=".repeat(80));
    println!("SUMMARY ({} rows)", output.summary.height());
    println!("{}", "=".repeat(80));
    println!("{}", output.summary);

    let Some(report) = commentary else {
        return Ok(());
    };

    println!("\n{}", "=".repeat(80));
    println!("{} IN {}", report.country.to_uppercase(), report.year);
    println!("{}", "=".repeat(80));
    match &report.text {
        Some(text) => println!("{}", text),
        None => {
            println!("Year overview:");
            println!("{}", serde_json::to_string_pretty(&report.year_overview)?);
            println!("Country snapshot:");
            println!("{}", serde_json::to_string_pretty(&report.country_snapshot)?);
        }
    }
    Ok(())
}
