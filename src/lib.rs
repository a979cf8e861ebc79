//! Natural-language questions over a holdings/trades snapshot.
//!
//! A question is screened by [`topic_filter`], turned into SQL by
//! [`sql_generator`] with the fixed [`vocabulary`], checked by
//! [`sql_validator`] and run against the [`execution`] datastore. The
//! [`pipeline`] ties the stages together and [`server`] exposes it over HTTP.

pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod sql_generator;
pub mod sql_validator;
pub mod topic_filter;
pub mod vocabulary;

pub use config::Config;
pub use error::{QaError, Result};
pub use execution::{Datastore, PolarsStore, QueryResult};
pub use pipeline::{Answer, AnswerOutcome, QaPipeline, INVALID_QUESTION, NO_ANSWER};
pub use sql_generator::{SqlGenerator, NO_SQL};
pub use vocabulary::Vocabulary;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber (`RUST_LOG` overrides `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load the datastore and wire the model backend selected in `config`.
pub fn build_pipeline(config: &Config) -> Result<QaPipeline> {
    let store = PolarsStore::load_dir(&config.data_dir)?;
    let llm = llm::build_generator(&config.llm)?;
    let generator = SqlGenerator::new(Arc::new(Vocabulary::standard()), llm);

    let pipeline = QaPipeline::new(generator, Arc::new(store));
    Ok(match config.request_timeout_secs {
        Some(secs) => pipeline.with_timeout(Duration::from_secs(secs)),
        None => pipeline,
    })
}
