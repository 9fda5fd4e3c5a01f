//! The survey pipeline: load, fill, aggregate.
//!
//! Stages hand whole datasets to one another. Each stage validates its own
//! output against a schema, so a [`SurveyOutput`] that comes back from
//! [`SurveyPipeline::run`] satisfies both the parsed and the summary contract.

use crate::aggregate::aggregate;
use crate::ai::CommentaryProvider;
use crate::commentary::generate_commentary;
use crate::config::{ConfigValidationError, SurveyConfig};
use crate::error::{Result, ResultExt, SurveyError};
use crate::fill::fill_regions;
use crate::loader::Loader;
use crate::types::SurveyOutput;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Runs the survey stages over a directory of yearly source files.
///
/// Use [`SurveyPipeline::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use wellbeing_survey::{SurveyConfig, SurveyPipeline};
/// use wellbeing_survey::ai::OpenRouterProvider;
/// use std::sync::Arc;
///
/// let provider = Arc::new(OpenRouterProvider::new(api_key)?);
/// let pipeline = SurveyPipeline::builder()
///     .commentary_provider(provider)
///     .build()?;
///
/// let output = pipeline.run("data/")?;
/// let text = pipeline.commentary(&output, "Chile", 2017)?;
///
/// // Data only
/// let output = SurveyPipeline::builder()
///     .config(SurveyConfig::builder().use_commentary(false).build()?)
///     .build()?
///     .run("data/")?;
/// ```
pub struct SurveyPipeline {
    config: SurveyConfig,
    loader: Loader,
    commentary_provider: Option<Arc<dyn CommentaryProvider>>,
}

// Ensure SurveyPipeline is Send (can be moved to another thread)
static_assertions::assert_impl_all!(SurveyPipeline: Send);

impl SurveyPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> SurveyPipelineBuilder {
        SurveyPipelineBuilder::default()
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    /// Whether [`commentary`](Self::commentary) can be called.
    pub fn has_commentary(&self) -> bool {
        self.config.use_commentary && self.commentary_provider.is_some()
    }

    /// Load every source file in `dir`, fill regions and aggregate.
    ///
    /// The first failing stage aborts the run.
    pub fn run(&self, dir: impl AsRef<Path>) -> Result<SurveyOutput> {
        let dir = dir.as_ref();
        match self.run_internal(dir) {
            Ok(output) => Ok(output),
            Err(e) => {
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn run_internal(&self, dir: &Path) -> Result<SurveyOutput> {
        let start_time = Instant::now();
        info!("Starting survey pipeline on {}", dir.display());

        info!("Step 1: Loading source files...");
        let raw = self.loader.load(dir)?;

        info!("Step 2: Filling missing regions...");
        let parsed = fill_regions(raw).context("While filling regions")?;

        info!("Step 3: Aggregating per year and quartile...");
        let summary = aggregate(&parsed).context("While aggregating")?;

        info!(
            "Pipeline finished in {:.2?}: {} parsed rows, {} summary rows",
            start_time.elapsed(),
            parsed.height(),
            summary.height()
        );
        Ok(SurveyOutput { parsed, summary })
    }

    /// Ask the configured provider to comment on `country` in `year`.
    ///
    /// Fails with [`SurveyError::InvalidConfig`] when commentary is disabled
    /// or no provider was supplied.
    pub fn commentary(&self, output: &SurveyOutput, country: &str, year: i32) -> Result<String> {
        if !self.config.use_commentary {
            return Err(SurveyError::InvalidConfig(
                "commentary is disabled in the configuration".to_string(),
            ));
        }
        let provider = self.commentary_provider.as_deref().ok_or_else(|| {
            SurveyError::InvalidConfig("no commentary provider configured".to_string())
        })?;

        generate_commentary(provider, output, country, year, self.config.round_decimals)
    }
}

/// Builder for creating a [`SurveyPipeline`] instance.
///
/// Use [`SurveyPipeline::builder()`] to get started.
#[derive(Default)]
pub struct SurveyPipelineBuilder {
    config: Option<SurveyConfig>,
    commentary_provider: Option<Arc<dyn CommentaryProvider>>,
}

// Ensure SurveyPipelineBuilder is Send (can be moved to another thread during construction)
static_assertions::assert_impl_all!(SurveyPipelineBuilder: Send);

impl SurveyPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: SurveyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the provider used by [`SurveyPipeline::commentary`].
    ///
    /// Use `Arc` so one provider can be shared across pipelines.
    pub fn commentary_provider(mut self, provider: Arc<dyn CommentaryProvider>) -> Self {
        self.commentary_provider = Some(provider);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<SurveyPipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(SurveyPipeline {
            loader: Loader::new(config.clone()),
            config,
            commentary_provider: self.commentary_provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    struct EchoProvider;

    impl CommentaryProvider for EchoProvider {
        fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            Ok(format!("{} chars", prompt.len()))
        }

        fn name(&self) -> &str {
            "Echo"
        }
    }

    fn tiny_output() -> SurveyOutput {
        let parsed = df![
            "year" => [2015i32],
            "country" => ["Chile"],
            "region" => ["Latin America"],
            "happiness_rank" => [27i64],
            "happiness_score" => [6.67],
        ]
        .unwrap();
        let summary = df![
            "year" => [2015i32],
            "happiness_quartile" => ["All"],
            "num_countries" => [1u32],
            "happiness_score_mean" => [6.67],
        ]
        .unwrap();
        SurveyOutput { parsed, summary }
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = SurveyPipeline::builder().build().unwrap();
        assert_eq!(pipeline.config(), &SurveyConfig::default());
        assert!(!pipeline.has_commentary());
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let config = SurveyConfig {
            source_extension: String::new(),
            ..SurveyConfig::default()
        };
        assert!(SurveyPipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_commentary_without_provider() {
        let pipeline = SurveyPipeline::builder().build().unwrap();
        let err = pipeline.commentary(&tiny_output(), "Chile", 2015).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_commentary_disabled_in_config() {
        let pipeline = SurveyPipeline::builder()
            .config(SurveyConfig::builder().use_commentary(false).build().unwrap())
            .commentary_provider(Arc::new(EchoProvider))
            .build()
            .unwrap();
        assert!(!pipeline.has_commentary());
        let err = pipeline.commentary(&tiny_output(), "Chile", 2015).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_commentary_with_provider() {
        let pipeline = SurveyPipeline::builder()
            .commentary_provider(Arc::new(EchoProvider))
            .build()
            .unwrap();
        assert!(pipeline.has_commentary());
        let text = pipeline.commentary(&tiny_output(), "Chile", 2015).unwrap();
        assert!(text.ends_with("chars"));
    }

    #[test]
    fn test_run_on_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SurveyPipeline::builder().build().unwrap();
        let err = pipeline.run(dir.path()).unwrap_err();
        assert_eq!(err.error_code(), "NO_SOURCE_FILES");
    }
}
