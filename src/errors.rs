/*!
 * Error types for the dubsplice engine.
 *
 * Collaborator failures are reported as `UpstreamError` and classified as
 * retryable or not. Everything the engine itself can raise is a
 * `PipelineError`; the variants mirror the failure classes of a run:
 * transient upstream failures, failed stages, an empty output after ad
 * removal and broken timeline invariants.
 */

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::Stage;
use crate::timeline::SegmentId;

/// Errors returned by external collaborators (translator, synthesizer,
/// stem separator, ad classifier)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    /// Transport-level failure, usually transient
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The collaborator asked us to slow down
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The call did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The collaborator answered with something unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The collaborator cannot serve this input at all
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// An external command exited unsuccessfully
    #[error("External command failed: {0}")]
    CommandFailed(String),
}

impl UpstreamError {
    /// Whether retrying the same call can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpstreamError::RequestFailed(_)
                | UpstreamError::RateLimitExceeded(_)
                | UpstreamError::Timeout(_)
                | UpstreamError::InvalidResponse(_)
        )
    }
}

/// Errors raised by the engine
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A transient collaborator failure that will be retried
    #[error("Recoverable upstream failure during {stage} (attempt {attempt}): {source}")]
    RecoverableUpstreamFailure {
        stage: Stage,
        attempt: u32,
        #[source]
        source: UpstreamError,
    },

    /// A collaborator failed for good; the run halts at this stage
    #[error("Stage {stage} failed: {reason}")]
    StageFailed { stage: Stage, reason: String },

    /// Ad removal left nothing to output
    #[error("Ad removal consumed the entire media ({media_duration:.3}s)")]
    EmptyOutputAfterSplice { media_duration: f64 },

    /// Planner or reconciler produced an inconsistent timeline
    #[error("Timeline invariant violated: {0}")]
    TimelineInvariantViolation(String),

    /// Malformed input rejected at ingestion
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The run was cancelled between units of work
    #[error("Run cancelled during {0}")]
    Cancelled(Stage),

    /// Audio decoding, encoding or format mismatch
    #[error("Audio error: {0}")]
    Audio(String),

    /// Artifact cache read/write failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// File system failure
    #[error("File error: {0}")]
    File(String),
}

impl PipelineError {
    /// Fatal errors abort the whole run; the others are isolated per segment
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::RecoverableUpstreamFailure { .. } | PipelineError::StageFailed { .. }
        )
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<hound::Error> for PipelineError {
    fn from(error: hound::Error) -> Self {
        Self::Audio(error.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        Self::Cache(error.to_string())
    }
}

/// Non-fatal warning: a translated clip did not fit its window even at the
/// maximum compression factor and was truncated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationOverflow {
    /// Segment whose clip was truncated
    pub segment_id: SegmentId,
    /// Seconds of (compressed) speech that were cut off
    pub overflow_secs: f64,
}

impl fmt::Display for DurationOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Duration overflow in segment {}: {:.3}s truncated",
            self.segment_id, self.overflow_secs
        )
    }
}
