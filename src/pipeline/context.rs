use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::app_config::Config;
use crate::errors::PipelineError;

use super::cache::ArtifactCache;
use super::retry::RetryPolicy;

/// Stages of a run, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Translation,
    Synthesis,
    StemSeparation,
    AdClassification,
    Reconciliation,
    Splice,
    Composition,
    Output,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Translation => "translation",
            Stage::Synthesis => "synthesis",
            Stage::StemSeparation => "stem_separation",
            Stage::AdClassification => "ad_classification",
            Stage::Reconciliation => "reconciliation",
            Stage::Splice => "splice",
            Stage::Composition => "composition",
            Stage::Output => "output",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared cancellation flag, checked between units of work
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled(stage))` once the flag is raised
    pub fn check(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled(stage))
        } else {
            Ok(())
        }
    }
}

/// Everything a run needs besides its inputs and collaborators.
///
/// Two runs with separate contexts share no mutable state.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Config,
    pub cache: ArtifactCache,
    pub retry: RetryPolicy,
    pub cancel: CancellationFlag,
}

impl RunContext {
    /// Context with the cache and retry policy described by `config`
    pub fn from_config(config: Config) -> Self {
        let cache = ArtifactCache::from_config(&config.pipeline);
        let retry = RetryPolicy::from_config(&config.pipeline);
        Self {
            config,
            cache,
            retry,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cache(mut self, cache: ArtifactCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.config.pipeline.concurrency.max(1)
    }
}
