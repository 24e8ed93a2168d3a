//! Credence - Structured-Output LLM Execution Core
//!
//! Credence invokes one or more LLM providers, enforces that their free-text
//! responses conform to a caller-specified schema, retries on validation
//! failure with progressively more directive prompts, and aggregates
//! multiple models' outputs into a single consensus result.
//!
//! # Architecture
//!
//! - **Single-Agent Executor**: drives one model through the
//!   invoke → validate → escalate-and-retry loop
//! - **Consensus Executor**: fans a prompt out to N models in parallel and
//!   collects whichever succeed (fails only if all fail)
//! - **Aggregation Executor**: feeds all successful raw responses to one
//!   designated aggregator model for synthesis; with a schema it
//!   short-circuits to the first conforming response
//! - **Provider Registry**: model-name patterns (`gpt-`, `claude-`,
//!   `gemini`) mapped to provider integrations, built once at configuration
//!   time
//!
//! # Main Modules
//!
//! - [`executor`] - agent, consensus and aggregation execution
//! - [`config`] - model identities and per-call options
//! - [`logging`] - optional tracing-subscriber setup for embedders
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use credence::{AgentExecutor, ExecutionOptions, ModelIdentity};
//! use credence::executor::provider::ProviderRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), credence::ExecutorError> {
//! let executor = AgentExecutor::new(Arc::new(ProviderRegistry::with_defaults()));
//!
//! let models = vec![
//!     ModelIdentity::new("gpt-4o").with_api_key("OPENAI_API_KEY"),
//!     ModelIdentity::new("claude-3-5-sonnet-20241022").with_api_key("ANTHROPIC_API_KEY"),
//! ];
//! let aggregator = ModelIdentity::new("gpt-4o").with_api_key("OPENAI_API_KEY");
//!
//! let report = executor
//!     .consensus_with_aggregation(
//!         &models,
//!         &aggregator,
//!         "Assess the credibility of the posts below...",
//!         &ExecutionOptions::default(),
//!     )
//!     .await?;
//! println!("{} [{}]", report.content, report.model);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod logging;

pub use config::{ExecutionOptions, ModelIdentity};
pub use executor::agent::{AgentExecutor, ResponseEnvelope};
pub use executor::consensus::ConsensusEnvelope;
pub use executor::error::{ExecutorError, ModelFailure};
pub use executor::provider::{ChatMessage, ProviderRegistry};
pub use executor::schema::{Field, Kind, Schema, ValidationOutcome, Violation};
