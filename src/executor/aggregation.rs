//! Aggregation executor: consensus plus a synthesis step
//!
//! The no-schema path feeds every successful raw response to one designated
//! aggregator model, which synthesizes a single final answer. The schema
//! path short-circuits to the first successful structured response: once the
//! shape is constrained, any conforming answer is treated as acceptable, so
//! the aggregator is never invoked. The asymmetry (no reconciliation of
//! divergent structured answers) is intentional, observable behavior.

use super::agent::{AgentExecutor, ResponseEnvelope};
use super::consensus::ConsensusEnvelope;
use super::error::ExecutorError;
use super::schema::Schema;
use crate::config::{ExecutionOptions, ModelIdentity};
use serde::de::DeserializeOwned;
use std::time::Instant;

/// Temperature forced onto the aggregator unless the caller overrides it,
/// to minimize synthesis variance
const AGGREGATION_TEMPERATURE: f32 = 0.1;

fn consensus_label(succeeded: &[&str]) -> String {
    format!("consensus({})", succeeded.join(","))
}

/// Synthesis prompt: the original request plus each model's labeled answer
fn build_synthesis_prompt(original: &str, responses: &[ResponseEnvelope<String>]) -> String {
    let mut prompt = String::with_capacity(original.len() + 512);

    prompt.push_str("You are aggregating answers from multiple independent models.\n\n");
    prompt.push_str("Original request:\n");
    prompt.push_str(original);
    prompt.push('\n');

    for response in responses {
        prompt.push_str(&format!("\n--- Response from {} ---\n", response.model));
        prompt.push_str(&response.content);
        prompt.push('\n');
    }

    prompt.push_str(
        "\nSynthesize the responses above into a single final answer. \
         Where the models disagree on a numeric judgement, average it; \
         otherwise prefer the position supported by the majority. \
         Respond with the final answer only.",
    );

    prompt
}

impl AgentExecutor {
    /// Consensus then synthesis: fan out to `identities`, then have
    /// `aggregator` merge all successful raw responses into one answer.
    ///
    /// The returned model label is `consensus(a,b,...) -> aggregator` and
    /// `tokens_used` sums every input branch plus the aggregator's own.
    pub async fn consensus_with_aggregation(
        &self,
        identities: &[ModelIdentity],
        aggregator: &ModelIdentity,
        prompt: &str,
        options: &ExecutionOptions,
    ) -> Result<ResponseEnvelope<String>, ExecutorError> {
        let start = Instant::now();
        let consensus = self.agent_consensus(identities, prompt, options).await?;

        let synthesis_prompt = build_synthesis_prompt(prompt, &consensus.responses);
        let aggregation_options = ExecutionOptions {
            temperature: Some(options.temperature.unwrap_or(AGGREGATION_TEMPERATURE)),
            ..options.clone()
        };

        tracing::debug!(
            aggregator = %aggregator.name,
            inputs = consensus.responses.len(),
            "synthesizing consensus responses"
        );
        let aggregated = self
            .execute_agent(aggregator, &synthesis_prompt, &aggregation_options)
            .await
            .map_err(|e| ExecutorError::Aggregation {
                aggregator: aggregator.name.clone(),
                source: Box::new(e),
            })?;

        let model = format!(
            "{} -> {}",
            consensus_label(&consensus.succeeded_models()),
            aggregator.name
        );
        let tokens_used = consensus.total_tokens() + aggregated.tokens_used;

        Ok(ResponseEnvelope {
            content: aggregated.content,
            model,
            tokens_used,
            elapsed: start.elapsed(),
        })
    }

    /// Schema path: consensus with validation, then the first successful
    /// branch's value verbatim (input order). No aggregator call; the model
    /// label lists every model that succeeded and `tokens_used` sums all
    /// successful branches.
    pub async fn consensus_with_aggregation_typed<T>(
        &self,
        identities: &[ModelIdentity],
        prompt: &str,
        options: &ExecutionOptions,
        schema: &Schema,
    ) -> Result<ResponseEnvelope<T>, ExecutorError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let start = Instant::now();
        let consensus: ConsensusEnvelope<T> = self
            .agent_consensus_typed(identities, prompt, options, schema)
            .await?;

        let model = consensus_label(&consensus.succeeded_models());
        let tokens_used = consensus.total_tokens();

        // Non-empty by the consensus invariant
        let first = consensus
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ExecutorError::InvalidArgument(
                "consensus returned no responses".to_string(),
            ))?;

        Ok(ResponseEnvelope {
            content: first.content,
            model,
            tokens_used,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn envelope(model: &str, content: &str) -> ResponseEnvelope<String> {
        ResponseEnvelope {
            content: content.to_string(),
            model: model.to_string(),
            tokens_used: 10,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_consensus_label() {
        assert_eq!(
            consensus_label(&["gpt-4o", "claude-3-opus"]),
            "consensus(gpt-4o,claude-3-opus)"
        );
    }

    #[test]
    fn test_synthesis_prompt_labels_every_response() {
        let responses = vec![
            envelope("gpt-4o", "the profile looks authentic"),
            envelope("claude-3-opus", "mostly credible with caveats"),
        ];
        let prompt = build_synthesis_prompt("Rate this profile.", &responses);

        assert!(prompt.contains("Rate this profile."));
        assert!(prompt.contains("--- Response from gpt-4o ---"));
        assert!(prompt.contains("the profile looks authentic"));
        assert!(prompt.contains("--- Response from claude-3-opus ---"));
        assert!(prompt.contains("mostly credible with caveats"));
        assert!(prompt.contains("average it"));
    }
}
