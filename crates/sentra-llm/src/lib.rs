//! # Sentra LLM
//!
//! LLM provider integrations for Sentra.
//!
//! ## Supported Backends
//!
//! | Provider | Type | Key Required |
//! |----------|------|--------------|
//! | Anthropic | API | `ANTHROPIC_API_KEY` |
//! | OpenAI | API | `OPENAI_API_KEY` |
//! | Mock | Testing | None |
//!
//! ## Quick Start
//!
//! ```rust
//! use sentra_llm::{MockProvider, LlmProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Use mock provider for testing
//!     let llm = MockProvider::smart();
//!
//!     let response = llm.ask("Summarize the flagged transactions").await.unwrap();
//!     println!("{}", response);
//! }
//! ```

pub mod anthropic;
pub mod config;
pub mod metrics;
pub mod mock;
pub mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use config::{ConfigError, LlmConfig};
pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};
