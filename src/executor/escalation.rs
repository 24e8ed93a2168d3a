//! Retry-prompt escalation after a failed structured attempt
//!
//! The first attempt always sends the caller's prompt unmodified. Every
//! retry appends directive formatting instructions, the rendered schema and
//! the previous attempt's violations, so each escalated prompt strictly
//! contains the original.

use super::schema::{Schema, Violation};

/// Build the prompt for a retry attempt.
///
/// `violations` is empty when the previous attempt failed before validation
/// (provider error, unparseable response).
pub fn escalate_prompt(original: &str, schema: &Schema, violations: &[Violation]) -> String {
    let mut prompt = String::with_capacity(original.len() + 512);

    prompt.push_str(original);
    prompt.push_str("\n\nIMPORTANT: your previous reply did not conform to the required format.\n");
    prompt.push_str(
        "Respond with ONLY a JSON value matching the schema below. \
         No prose before or after, no markdown fences, \
         every required field present with the exact type.\n\nSchema:\n",
    );
    prompt.push_str(&schema.render());

    if !violations.is_empty() {
        prompt.push_str("\nProblems with your previous reply:\n");
        for violation in violations {
            prompt.push_str(&format!("- {}\n", violation));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::schema::{Field, Kind};

    fn schema() -> Schema {
        Schema::object(vec![Field::required(
            "score",
            Kind::number_between(0.0, 100.0),
        )])
    }

    #[test]
    fn test_escalation_contains_original_prompt() {
        let original = "Rate the credibility of @someone's recent posts.";
        let escalated = escalate_prompt(original, &schema(), &[]);

        assert!(escalated.contains(original));
        assert!(escalated.len() > original.len());
        assert!(escalated.contains("ONLY a JSON value"));
        assert!(escalated.contains("score (required)"));
    }

    #[test]
    fn test_escalation_lists_violations() {
        let violations = vec![Violation {
            path: "$.score".to_string(),
            reason: "expected number between 0 and 100, got string".to_string(),
        }];
        let escalated = escalate_prompt("original", &schema(), &violations);

        assert!(escalated.contains("$.score: expected number between 0 and 100"));
    }

    #[test]
    fn test_escalation_without_violations_omits_problem_list() {
        let escalated = escalate_prompt("original", &schema(), &[]);
        assert!(!escalated.contains("Problems with your previous reply"));
    }
}
