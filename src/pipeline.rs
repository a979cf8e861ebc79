//! Question-to-answer pipeline
//!
//! question → topic filter → SQL generator (→ model) → validator →
//! datastore → rendered table. Every failure collapses into [`NO_ANSWER`];
//! the internal reason is kept in [`AnswerOutcome`] for logging only.

use crate::error::QaError;
use crate::execution::{Datastore, QueryResult};
use crate::sql_generator::{SqlGenerator, NO_SQL};
use crate::sql_validator::{check_sql, SqlRejection};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Returned on every non-success path.
pub const NO_ANSWER: &str = "Sorry can not find the answer";

/// Returned by the request layer for blank questions.
pub const INVALID_QUESTION: &str = "Please ask a valid question.";

/// Internal classification of how a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Answered { rows: usize },
    UnsupportedTopic,
    NoSql,
    RejectedSql(SqlRejection),
    ExecutionFailed(String),
    EmptyResult,
    TimedOut,
}

impl AnswerOutcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, AnswerOutcome::Answered { .. })
    }
}

impl fmt::Display for AnswerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerOutcome::Answered { rows } => write!(f, "answered ({} rows)", rows),
            AnswerOutcome::UnsupportedTopic => f.write_str("unsupported topic"),
            AnswerOutcome::NoSql => f.write_str("model returned NONE"),
            AnswerOutcome::RejectedSql(reason) => write!(f, "rejected SQL: {}", reason),
            AnswerOutcome::ExecutionFailed(err) => write!(f, "execution failed: {}", err),
            AnswerOutcome::EmptyResult => f.write_str("empty result"),
            AnswerOutcome::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Text returned to the caller plus the reason behind it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub outcome: AnswerOutcome,
}

impl Answer {
    fn no_answer(outcome: AnswerOutcome) -> Self {
        Self {
            text: NO_ANSWER.to_string(),
            outcome,
        }
    }
}

pub struct QaPipeline {
    generator: SqlGenerator,
    store: Arc<dyn Datastore>,
    timeout: Option<Duration>,
}

impl QaPipeline {
    pub fn new(generator: SqlGenerator, store: Arc<dyn Datastore>) -> Self {
        Self {
            generator,
            store,
            timeout: None,
        }
    }

    /// Bound each question; an elapsed limit counts as an execution failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Answer one question. Never fails: every error becomes [`NO_ANSWER`].
    pub async fn answer(&self, question: &str) -> String {
        self.answer_detailed(question).await.text
    }

    pub async fn answer_detailed(&self, question: &str) -> Answer {
        let run = self.run(question);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{}", QaError::Timeout(limit));
                    Err(AnswerOutcome::TimedOut)
                }
            },
            None => run.await,
        };

        let answer = match result {
            Ok(table) => Answer {
                text: table.render_table(),
                outcome: AnswerOutcome::Answered {
                    rows: table.row_count(),
                },
            },
            Err(outcome) => Answer::no_answer(outcome),
        };

        if answer.outcome.is_answered() {
            info!("Question {}", answer.outcome);
        } else {
            warn!("No answer: {}", answer.outcome);
        }
        answer
    }

    async fn run(&self, question: &str) -> std::result::Result<QueryResult, AnswerOutcome> {
        if !self.generator.filter().is_supported(question) {
            return Err(AnswerOutcome::UnsupportedTopic);
        }

        let sql = self
            .generator
            .generate_sql(question)
            .await
            .map_err(|e| AnswerOutcome::ExecutionFailed(e.to_string()))?;

        if sql == NO_SQL {
            return Err(AnswerOutcome::NoSql);
        }
        check_sql(&sql).map_err(AnswerOutcome::RejectedSql)?;
        debug!("Validated SQL: {}", sql);

        let result = self
            .store
            .execute(&sql)
            .await
            .map_err(|e| AnswerOutcome::ExecutionFailed(e.to_string()))?;

        if result.is_empty() {
            return Err(AnswerOutcome::EmptyResult);
        }
        Ok(result)
    }
}
