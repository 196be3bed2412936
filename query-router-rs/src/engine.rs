//! Query engine facade: classify, then respond.

use std::sync::Arc;

use log::info;
use oracle_sdk::ReasoningOracle;
use structured_store::StructuredStore;

use crate::classifier::QueryClassifier;
use crate::config::RouterConfig;
use crate::registry::ToolRegistry;
use crate::response::{Question, QueryResponse, ResponseContent};
use crate::router::QueryRouter;

/// Answers natural-language questions about the structured store
pub struct QueryEngine {
    classifier: QueryClassifier,
    router: QueryRouter,
    config: RouterConfig,
}

impl QueryEngine {
    /// Build the registry once for this engine. Without an oracle, complex
    /// questions get the guidance message.
    pub fn new(
        store: Arc<dyn StructuredStore>,
        oracle: Option<Arc<dyn ReasoningOracle>>,
        config: RouterConfig,
    ) -> Self {
        let registry = Arc::new(ToolRegistry::standard(Arc::clone(&store)));
        let classifier_oracle = if config.oracle_classification {
            oracle.clone()
        } else {
            None
        };

        Self {
            classifier: QueryClassifier::new(config.mode, classifier_oracle),
            router: QueryRouter::new(registry, store, oracle, config.format, config.max_schema_tables),
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.router.registry()
    }

    /// Classify and answer one question. Never fails.
    pub async fn handle(&self, question: Question) -> QueryResponse {
        let classification = self.classifier.classify(&question.text).await;
        info!(
            "Session {}: question classified as {:?}",
            question.session_id, classification
        );

        let raw = self.router.respond(&question.text, &classification).await;

        QueryResponse {
            session_id: question.session_id,
            classification,
            content: ResponseContent::normalize(raw, self.config.format),
        }
    }
}
