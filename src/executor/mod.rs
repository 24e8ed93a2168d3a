//! Structured-output LLM execution core
//!
//! Layered bottom-up:
//!
//! - [`schema`] — structural validation of model responses
//! - [`escalation`] — retry prompts after a validation failure
//! - [`provider`] — one [`provider::ProviderClient`] per provider family,
//!   selected by model-name pattern through [`provider::ProviderRegistry`]
//! - [`invoker`] — uniform invocation with defaults and timeouts
//! - [`agent`] — single-model execution with the bounded retry loop
//! - [`consensus`] — parallel multi-model fan-out with partial-failure
//!   tolerance
//! - [`aggregation`] — synthesis of consensus responses by one aggregator
//!   model

pub mod agent;
pub mod aggregation;
pub mod consensus;
pub mod error;
pub mod escalation;
pub mod invoker;
pub mod provider;
pub mod schema;

pub use agent::{AgentExecutor, ResponseEnvelope};
pub use consensus::ConsensusEnvelope;
pub use error::{ExecutorError, ModelFailure};
pub use schema::{Field, Kind, Schema, ValidationOutcome, Violation};
