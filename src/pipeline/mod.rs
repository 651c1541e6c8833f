/*!
 * Pipeline driver.
 *
 * - `context`: `RunContext` threaded through every stage, `Stage` and cancellation
 * - `retry`: exponential backoff around collaborator calls
 * - `cache`: content-fingerprinted artifact cache for resumable runs
 * - `driver`: runs the stages and joins their results
 */

pub mod cache;
pub mod context;
pub mod driver;
pub mod retry;

pub use cache::{audio_digest, file_tag, ArtifactCache, Fingerprint};
pub use context::{CancellationFlag, RunContext, Stage};
pub use driver::{Collaborators, PipelineDriver, PipelineProgress, RunReport, SegmentFallback};
pub use retry::RetryPolicy;
