//! Evidence sufficiency assessment between retrieval rounds.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::llm::{complete_with_retry, extract_json_object, ChatModel};

/// The controller's branching decision after a round: stop, or continue
/// with `next_query`.
#[derive(Debug, Clone)]
pub struct Decision {
    pub sufficient: bool,
    pub next_query: Option<String>,
}

impl Decision {
    pub fn sufficient() -> Self {
        Self { sufficient: true, next_query: None }
    }
}

#[async_trait]
pub trait Assessor: Send + Sync {
    /// Judge whether `evidence` answers `question`. Implementations must
    /// not fail: anything unjudgeable counts as sufficient so the loop
    /// terminates instead of spinning.
    async fn assess(&self, question: &str, evidence: &[String]) -> Decision;
}

pub struct LlmAssessor {
    model: Arc<dyn ChatModel>,
    max_retries: usize,
}

impl LlmAssessor {
    pub fn new(model: Arc<dyn ChatModel>, max_retries: usize) -> Self {
        Self { model, max_retries }
    }
}

const ASSESS_SYSTEM: &str = "You judge whether retrieved passages contain enough \
information to answer a question completely. Reply with a JSON object only: \
{\"sufficient\": true|false, \"next_query\": \"<follow-up search query, or omit if sufficient>\"}";

#[async_trait]
impl Assessor for LlmAssessor {
    async fn assess(&self, question: &str, evidence: &[String]) -> Decision {
        let mut user = format!("Question: {question}\n\nRetrieved passages:\n");
        for passage in evidence {
            user.push_str("- ");
            user.push_str(passage);
            user.push('\n');
        }
        let reply =
            match complete_with_retry(self.model.as_ref(), ASSESS_SYSTEM, &user, self.max_retries)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    debug!(error = %e, "Assessment call failed, treating evidence as sufficient");
                    return Decision::sufficient();
                }
            };
        parse_decision(&reply)
    }
}

/// Lenient parse of the assessment reply. Missing or malformed JSON, or
/// a missing `sufficient` field, falls open to sufficient.
fn parse_decision(reply: &str) -> Decision {
    let Some(value) = extract_json_object(reply) else {
        return Decision::sufficient();
    };
    let Some(sufficient) = value["sufficient"].as_bool() else {
        return Decision::sufficient();
    };
    let next_query = value["next_query"]
        .as_str()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);
    Decision { sufficient, next_query }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_with_follow_up_parses() {
        let d = parse_decision("{\"sufficient\": false, \"next_query\": \"tomato varieties\"}");
        assert!(!d.sufficient);
        assert_eq!(d.next_query.as_deref(), Some("tomato varieties"));
    }

    #[test]
    fn prose_wrapped_json_parses() {
        let d = parse_decision("Looking at the passages:\n{\"sufficient\": true}\nHope that helps!");
        assert!(d.sufficient);
        assert!(d.next_query.is_none());
    }

    #[test]
    fn garbage_fails_open_to_sufficient() {
        assert!(parse_decision("I cannot decide").sufficient);
        assert!(parse_decision("{\"sufficient\": \"maybe\"}").sufficient);
        assert!(parse_decision("").sufficient);
    }

    #[test]
    fn blank_next_query_is_dropped() {
        let d = parse_decision("{\"sufficient\": false, \"next_query\": \"  \"}");
        assert!(!d.sufficient);
        assert!(d.next_query.is_none());
    }
}
