//! Source discovery, CSV parsing and cross-year concatenation.
//!
//! Each yearly file is reconciled on its own, then all frames are stacked
//! with a loose union: the combined column set is the union of every file's
//! columns, and a file lacking a column contributes typed nulls for it. The
//! stacked frame is stably sorted by (country, year) and validated against
//! the raw schema.

use crate::config::SurveyConfig;
use crate::error::{Result, ResultExt, SurveyError};
use crate::reconcile::reconcile_source;
use crate::schema::raw_schema;
use crate::types::{COUNTRY, YEAR};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// List files in `dir` whose extension matches `extension` (case-insensitive).
///
/// Paths are returned sorted so that repeated loads see the same order.
pub fn discover_sources(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Parse one source file as CSV with a header row.
pub fn read_source(path: &Path, config: &SurveyConfig) -> Result<DataFrame> {
    let file_format_error = |e: PolarsError| SurveyError::FileFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(config.infer_schema_length)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(file_format_error)?
        .finish()
        .map_err(file_format_error)
}

/// Loads every yearly source file of a directory into one raw dataset.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    config: SurveyConfig,
}

impl Loader {
    pub fn new(config: SurveyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    /// Discover, reconcile, concatenate, sort and validate.
    pub fn load(&self, dir: &Path) -> Result<DataFrame> {
        let sources = discover_sources(dir, &self.config.source_extension)
            .context(format!("While listing '{}'", dir.display()))?;
        if sources.is_empty() {
            return Err(SurveyError::NoSourceFiles {
                dir: dir.to_path_buf(),
                extension: self.config.source_extension.clone(),
            });
        }

        info!("Loading {} source file(s) from {}", sources.len(), dir.display());

        let mut frames = Vec::with_capacity(sources.len());
        for path in &sources {
            let raw = read_source(path, &self.config)?;
            let reconciled = reconcile_source(path, raw)?;
            debug!(
                "Reconciled {}: {} rows, {} columns",
                path.display(),
                reconciled.height(),
                reconciled.width()
            );
            frames.push(reconciled);
        }

        let combined = concat_loose(frames)?;
        let sorted = combined.sort(
            [COUNTRY, YEAR],
            SortMultipleOptions::default().with_maintain_order(true),
        )?;

        info!("Loaded {} records", sorted.height());
        raw_schema().validate(&sorted)
    }
}

/// Load a directory with the default configuration.
pub fn load(dir: impl AsRef<Path>) -> Result<DataFrame> {
    Loader::default().load(dir.as_ref())
}

/// Stack frames whose column sets may differ.
///
/// The output columns follow raw schema order; columns a frame lacks are
/// filled with nulls of the schema's dtype.
pub fn concat_loose(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let union: Vec<(&str, DataType)> = raw_schema()
        .fields()
        .iter()
        .filter(|(name, _)| frames.iter().any(|df| df.column(name).is_ok()))
        .map(|(name, spec)| (name.as_str(), spec.dtype.data_type()))
        .collect();
    let names: Vec<&str> = union.iter().map(|(name, _)| *name).collect();

    let mut combined: Option<DataFrame> = None;
    for mut df in frames {
        for (name, dtype) in &union {
            if df.column(name).is_err() {
                debug!("Filling absent column '{}' with nulls", name);
                df.with_column(Series::full_null((*name).into(), df.height(), dtype))?;
            }
        }
        let aligned = df.select(names.iter().copied())?;
        match combined.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&aligned)?;
            }
            None => combined = Some(aligned),
        }
    }

    Ok(combined.unwrap_or_default())
}
