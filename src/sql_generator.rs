//! SQL Generator
//!
//! Turns a question into candidate SQL by asking the language model with a
//! prompt that enumerates every legal table, join key and metric mapping.
//! The reply is returned as-is (trimmed): it is untrusted text until the
//! validator has seen it.

use crate::error::Result;
use crate::llm::{ChatRequest, TextGenerator};
use crate::topic_filter::TopicFilter;
use crate::vocabulary::Vocabulary;
use std::sync::Arc;
use tracing::{debug, info};

/// Reply meaning "this question cannot be answered with SQL".
pub const NO_SQL: &str = "NONE";

/// System message sent alongside the composed prompt.
pub const GENERATOR_ROLE: &str = "You generate SQL only.";

pub struct SqlGenerator {
    vocabulary: Arc<Vocabulary>,
    filter: TopicFilter,
    llm: Arc<dyn TextGenerator>,
}

impl SqlGenerator {
    pub fn new(vocabulary: Arc<Vocabulary>, llm: Arc<dyn TextGenerator>) -> Self {
        Self {
            vocabulary,
            filter: TopicFilter::default(),
            llm,
        }
    }

    pub fn with_filter(mut self, filter: TopicFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Vocabulary block, then the question, then the answer-format instruction.
    pub fn build_prompt(&self, question: &str) -> String {
        format!(
            "{}\nUser Question:\n{}\n\nReturn SQL or NONE:\n",
            self.vocabulary.system_prompt(),
            question
        )
    }

    /// Returns candidate SQL or [`NO_SQL`]. Model errors are propagated.
    pub async fn generate_sql(&self, question: &str) -> Result<String> {
        if let Some(term) = self.filter.matched_term(question) {
            info!("Question rejected before generation (unsupported term '{}')", term);
            return Ok(NO_SQL.to_string());
        }

        let hits: Vec<&str> = self
            .vocabulary
            .matching(question)
            .iter()
            .map(|e| e.expression)
            .collect();
        debug!("Vocabulary hits: {:?}", hits);

        let request = ChatRequest::deterministic(GENERATOR_ROLE, self.build_prompt(question));
        let reply = self.llm.chat(&request).await?;
        debug!("{} replied with {} chars", self.llm.name(), reply.len());

        Ok(reply.trim().to_string())
    }
}
