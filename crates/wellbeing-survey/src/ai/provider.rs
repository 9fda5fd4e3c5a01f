//! Commentary provider trait for abstracting LLM interactions.
//!
//! The pipeline only ever hands a finished prompt to a provider and reads
//! back free text. Everything about transport, authentication and model
//! choice stays behind [`CommentaryProvider`].
//!
//! # Implementing a New Provider
//!
//! 1. Create a new file in `src/ai/` (e.g., `ollama.rs`)
//! 2. Implement [`CommentaryProvider`] for your provider struct
//! 3. Export the provider in `src/ai/mod.rs`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wellbeing_survey::ai::OpenRouterProvider;
//! use wellbeing_survey::SurveyPipeline;
//!
//! let provider = Arc::new(OpenRouterProvider::new("your-api-key")?);
//! let pipeline = SurveyPipeline::builder()
//!     .commentary_provider(provider)
//!     .build()?;
//! ```

use anyhow::Result;

/// Trait for text-generation backends that write survey commentary.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a pipeline holding one can be
/// moved across threads.
///
/// # Error Handling
///
/// Transport and decoding failures are returned via `anyhow::Result`. The
/// pipeline maps them to an external service error; there is no fallback text.
pub trait CommentaryProvider: Send + Sync {
    /// Send `prompt` to the backend and return its text response.
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the provider name for logging and debugging.
    fn name(&self) -> &str;

    /// Get the model being used by this provider.
    ///
    /// Returns `None` if the provider doesn't expose model information.
    fn model(&self) -> Option<&str> {
        None
    }
}
