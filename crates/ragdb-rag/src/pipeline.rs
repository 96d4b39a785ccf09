//! The question-answering facade: route, retrieve recursively, generate.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use ragdb_core::config::RagConfig;
use ragdb_core::store::ChunkStore;
use ragdb_core::traits::Retriever;
use ragdb_core::types::{ChunkId, Intent, MetadataFilter};

use crate::assess::LlmAssessor;
use crate::controller::{EvidenceHit, RecursiveController};
use crate::expand::{LlmExpander, QueryExpander, RuleExpander};
use crate::generator::{Answer, Generator, StreamedAnswer};
use crate::llm::ChatModel;
use crate::router::Router;

#[derive(Debug)]
pub struct RagResponse {
    pub intent: Intent,
    pub answer: Answer,
    pub evidence: Vec<ChunkId>,
}

pub struct RagPipeline {
    router: Router,
    controller: RecursiveController,
    generator: Generator,
}

impl RagPipeline {
    /// Wire the pipeline from its collaborators. The model backs the
    /// assessor, the list-intent expander, the generator, and (when
    /// `llm.llm_router` is set) the router.
    pub fn new(
        config: &RagConfig,
        store: Arc<ChunkStore>,
        retriever: Arc<dyn Retriever>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let router = if config.llm.llm_router {
            Router::with_model(Arc::clone(&model))
        } else {
            Router::rule_based()
        };
        let assessor = Arc::new(LlmAssessor::new(Arc::clone(&model), config.llm.max_retries));
        let expander: Arc<dyn QueryExpander> = if config.llm.llm_router {
            Arc::new(LlmExpander::new(Arc::clone(&model), config.llm.max_retries))
        } else {
            Arc::new(RuleExpander)
        };
        let controller = RecursiveController::new(
            retriever,
            assessor,
            expander,
            Arc::clone(&store),
            config.retrieval.clone(),
            config.recursion.clone(),
        );
        let generator =
            Generator::new(model, store, config.generation.clone(), &config.llm);
        Self { router, controller, generator }
    }

    pub async fn ask(&self, question: &str) -> Result<RagResponse> {
        self.ask_filtered(question, None).await
    }

    pub async fn ask_filtered(
        &self,
        question: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<RagResponse> {
        let intent = self.router.classify(question).await;
        let evidence = self.controller.run(question, intent, filter).await?;
        info!(%question, intent = intent.as_str(), evidence = evidence.len(), "Question routed and retrieved");
        let answer = self.generator.generate(question, intent, &evidence).await;
        Ok(RagResponse {
            intent,
            answer,
            evidence: evidence.into_iter().map(|h| h.id).collect(),
        })
    }

    /// Streaming variant for interactive use; the caller drains the
    /// fragment channel and may extract citations from the collected
    /// text afterwards.
    pub async fn ask_streamed(
        &self,
        question: &str,
    ) -> Result<(Intent, Vec<EvidenceHit>, StreamedAnswer)> {
        let intent = self.router.classify(question).await;
        let evidence = self.controller.run(question, intent, None).await?;
        let streamed = self.generator.generate_streamed(question, intent, &evidence).await;
        Ok((intent, evidence, streamed))
    }
}
