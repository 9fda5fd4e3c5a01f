//! Text-generation backends for survey commentary.
//!
//! # Feature Flag
//!
//! The [`CommentaryProvider`] trait is always available for custom
//! implementations. The HTTP-backed [`OpenRouterProvider`] requires the `ai`
//! feature.
//!
//! ```toml
//! # Enable the OpenRouter client (default)
//! wellbeing-survey = { version = "0.1", features = ["ai"] }
//!
//! # Data pipeline only
//! wellbeing-survey = { version = "0.1", default-features = false }
//! ```

// Provider trait is always available (for custom implementations)
mod provider;
pub use provider::CommentaryProvider;

#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use openrouter::{OpenRouterConfig, OpenRouterConfigBuilder, OpenRouterProvider};
