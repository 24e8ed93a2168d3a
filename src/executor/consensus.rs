//! Consensus executor: parallel fan-out of one prompt to many models
//!
//! Every branch runs independently (own prompt copy, own retry budget) via
//! `tokio::spawn`, and all branches are joined before returning — a slow
//! branch is never cancelled by a fast sibling, so every model's answer is
//! part of the result. Collected responses keep the input identity order
//! regardless of completion order.

use super::agent::{AgentExecutor, ResponseEnvelope};
use super::error::{ExecutorError, ModelFailure};
use super::schema::Schema;
use crate::config::{ExecutionOptions, ModelIdentity};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// The responses that succeeded out of N attempted models. Non-empty on
/// success; failed branches are retained for diagnostics.
#[derive(Debug, Clone)]
pub struct ConsensusEnvelope<T> {
    /// Successful branch envelopes, in input identity order
    pub responses: Vec<ResponseEnvelope<T>>,
    /// Branches that failed, with their terminal reasons
    pub failures: Vec<ModelFailure>,
    /// Wall-clock duration of the whole fan-out (bounded by the slowest branch)
    pub elapsed: Duration,
}

impl<T> ConsensusEnvelope<T> {
    /// Names of the models that produced a successful response
    pub fn succeeded_models(&self) -> Vec<&str> {
        self.responses.iter().map(|r| r.model.as_str()).collect()
    }

    /// Sum of token estimates across successful branches
    pub fn total_tokens(&self) -> u32 {
        self.responses.iter().map(|r| r.tokens_used).sum()
    }
}

impl AgentExecutor {
    /// Fan a prompt out to every identity concurrently, raw-text branches.
    ///
    /// Succeeds iff at least one branch succeeds; raises
    /// [`ExecutorError::AllModelsFailed`] with per-branch reasons otherwise.
    pub async fn agent_consensus(
        &self,
        identities: &[ModelIdentity],
        prompt: &str,
        options: &ExecutionOptions,
    ) -> Result<ConsensusEnvelope<String>, ExecutorError> {
        check_non_empty(identities)?;
        let start = Instant::now();

        let mut handles = Vec::with_capacity(identities.len());
        for identity in identities {
            let executor = self.clone();
            let identity = identity.clone();
            let prompt = prompt.to_string();
            let options = options.clone();
            handles.push(tokio::spawn(async move {
                executor.execute_agent(&identity, &prompt, &options).await
            }));
        }

        collect_settled(identities, join_all(handles).await, start.elapsed())
    }

    /// Fan-out with a schema: each branch runs the full validated retry
    /// loop independently. Branch results are assumed interchangeable by
    /// construction once they conform.
    pub async fn agent_consensus_typed<T>(
        &self,
        identities: &[ModelIdentity],
        prompt: &str,
        options: &ExecutionOptions,
        schema: &Schema,
    ) -> Result<ConsensusEnvelope<T>, ExecutorError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        check_non_empty(identities)?;
        let start = Instant::now();

        let mut handles = Vec::with_capacity(identities.len());
        for identity in identities {
            let executor = self.clone();
            let identity = identity.clone();
            let prompt = prompt.to_string();
            let options = options.clone();
            let schema = schema.clone();
            handles.push(tokio::spawn(async move {
                executor
                    .execute_agent_typed::<T>(&identity, &prompt, &options, &schema)
                    .await
            }));
        }

        collect_settled(identities, join_all(handles).await, start.elapsed())
    }
}

fn check_non_empty(identities: &[ModelIdentity]) -> Result<(), ExecutorError> {
    if identities.is_empty() {
        return Err(ExecutorError::InvalidArgument(
            "consensus requires at least one model".to_string(),
        ));
    }
    Ok(())
}

/// Every branch's outcome is inspected once all have settled: successes are
/// kept in input order, failures become warnings unless nothing succeeded.
fn collect_settled<T>(
    identities: &[ModelIdentity],
    settled: Vec<Result<Result<ResponseEnvelope<T>, ExecutorError>, tokio::task::JoinError>>,
    elapsed: Duration,
) -> Result<ConsensusEnvelope<T>, ExecutorError> {
    let mut responses = Vec::new();
    let mut failures = Vec::new();

    // join_all preserves spawn order, which is input identity order
    for (identity, joined) in identities.iter().zip(settled) {
        match joined {
            Ok(Ok(envelope)) => responses.push(envelope),
            Ok(Err(e)) => {
                tracing::warn!(model = %identity.name, error = %e, "consensus branch failed");
                failures.push(ModelFailure {
                    model: identity.name.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                // Branch task panicked; treat like any other branch failure
                tracing::warn!(model = %identity.name, error = %e, "consensus branch aborted");
                failures.push(ModelFailure {
                    model: identity.name.clone(),
                    reason: format!("task failed: {}", e),
                });
            }
        }
    }

    if responses.is_empty() {
        return Err(ExecutorError::AllModelsFailed { failures });
    }

    tracing::info!(
        succeeded = responses.len(),
        failed = failures.len(),
        "consensus fan-out settled"
    );
    Ok(ConsensusEnvelope {
        responses,
        failures,
        elapsed,
    })
}
