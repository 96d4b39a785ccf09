//! Query intent routing.
//!
//! Rule-based cues in English and Chinese; optionally the model refines
//! the classification with a constrained one-word output. Either way the
//! result is always exactly one of the three intents.

use std::sync::Arc;
use tracing::debug;

use ragdb_core::types::Intent;

use crate::llm::ChatModel;

const LIST_CUES: &[&str] = &[
    "list", "enumerate", "all recipes", "all dishes", "which recipes", "what recipes",
    "name all", "every recipe", "所有", "哪些", "有什么", "列出", "全部",
];

const DETAIL_CUES: &[&str] = &[
    "ingredient", "how to", "how do", "how is", "step", "instructions", "recipe for",
    "in detail", "exactly", "做法", "步骤", "怎么做", "详细", "具体", "用料", "材料",
];

/// Classify by cue matching. Enumeration cues win over specificity cues
/// so "list all recipes using chicken" routes to `List` even though it
/// names recipes.
pub fn classify(query: &str) -> Intent {
    let lowered = query.to_lowercase();
    if LIST_CUES.iter().any(|cue| lowered.contains(cue)) {
        return Intent::List;
    }
    if DETAIL_CUES.iter().any(|cue| lowered.contains(cue)) {
        return Intent::Detail;
    }
    Intent::General
}

pub struct Router {
    model: Option<Arc<dyn ChatModel>>,
}

impl Router {
    pub fn rule_based() -> Self {
        Self { model: None }
    }

    pub fn with_model(model: Arc<dyn ChatModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Model-backed classification when configured; transport failures
    /// fall back to the rules, and output that names no known intent
    /// falls open to `General`.
    pub async fn classify(&self, query: &str) -> Intent {
        if let Some(model) = &self.model {
            let system = "You classify questions for a retrieval system. \
                          Reply with exactly one word: list, detail, or general.";
            match model.complete(system, query).await {
                Ok(reply) => {
                    let intent = parse_intent_label(&reply);
                    debug!(%query, ?intent, "Model-routed intent");
                    return intent;
                }
                Err(e) => {
                    debug!(error = %e, "Intent model unavailable, using rules");
                    return classify(query);
                }
            }
        }
        classify(query)
    }
}

fn parse_intent_label(reply: &str) -> Intent {
    let lowered = reply.to_lowercase();
    if lowered.contains("list") {
        Intent::List
    } else if lowered.contains("detail") {
        Intent::Detail
    } else if lowered.contains("general") {
        Intent::General
    } else {
        Intent::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_cues_route_to_list() {
        assert_eq!(classify("list all recipes using chicken"), Intent::List);
        assert_eq!(classify("有什么汤可以做"), Intent::List);
    }

    #[test]
    fn specificity_cues_route_to_detail() {
        assert_eq!(classify("What are the ingredients for tomato soup?"), Intent::Detail);
        assert_eq!(classify("番茄汤的做法"), Intent::Detail);
    }

    #[test]
    fn everything_else_is_general() {
        assert_eq!(classify("tomato soup"), Intent::General);
        assert_eq!(classify(""), Intent::General);
        assert_eq!(classify("%$#@! ~~ 0x00"), Intent::General);
    }

    #[test]
    fn list_wins_when_both_cue_sets_match() {
        assert_eq!(classify("list the ingredients of every dish"), Intent::List);
    }

    #[test]
    fn unknown_model_labels_fall_open_to_general() {
        assert_eq!(parse_intent_label("banana"), Intent::General);
        assert_eq!(parse_intent_label(""), Intent::General);
        assert_eq!(parse_intent_label("Detail."), Intent::Detail);
    }
}
