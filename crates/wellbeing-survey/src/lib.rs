//! World Happiness Survey Pipeline Library
//!
//! Normalizes yearly world happiness survey files into one validated dataset
//! and summarizes it per year and per happiness quartile, built on Polars.
//!
//! # Overview
//!
//! - **Column Reconciliation**: per-year header spellings map onto one canonical set
//! - **Region Filling**: years without a region column borrow each country's region
//!   from its other years
//! - **Schema Contracts**: raw, parsed and summary datasets are validated at every
//!   stage boundary
//! - **Aggregation**: "All" and Q1..Q4 rows per year with mean/min/max per indicator
//! - **Commentary**: optional natural-language commentary through a
//!   [`ai::CommentaryProvider`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use wellbeing_survey::SurveyPipeline;
//!
//! // Directory holding 2015.csv, 2016.csv, ...
//! let output = SurveyPipeline::builder().build()?.run("data/")?;
//!
//! println!("{}", output.parsed);
//! println!("{}", output.summary);
//! ```
//!
//! # Stages
//!
//! Each stage can also be used on its own:
//!
//! ```rust,ignore
//! use wellbeing_survey::{aggregate, fill_regions, load};
//!
//! let raw = load("data/")?;
//! let parsed = fill_regions(raw)?;
//! let summary = aggregate(&parsed)?;
//! ```
//!
//! # Errors
//!
//! Every stage returns [`SurveyError`]. The first failure aborts the run; a
//! schema failure carries the full list of offending fields.

pub mod aggregate;
pub mod ai;
pub mod commentary;
pub mod config;
pub mod error;
pub mod fill;
pub mod loader;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use aggregate::{SummaryRow, aggregate, assign_quartile, quartile_cuts, summarize};
pub use config::{ConfigValidationError, SurveyConfig, SurveyConfigBuilder};
pub use error::{FieldViolation, Result as SurveyResult, ResultExt, SurveyError, ViolationKind};
pub use fill::fill_regions;
pub use loader::{Loader, load};
pub use pipeline::{SurveyPipeline, SurveyPipelineBuilder};
pub use reconcile::reconcile;
pub use schema::{
    FieldSpec, FieldType, Schema, parsed_schema, raw_schema, summary_schema, validate,
};
pub use types::{Bucket, Indicator, SurveyOutput};
