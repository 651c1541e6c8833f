/*!
 * Segment store: the time-coded transcript model consumed by every stage.
 *
 * - `span`: validated `TimeSpan` in seconds
 * - `segment`: `TranscriptSegment` and the ordered, non-overlapping `SegmentStore`
 * - `srt`: SRT cue parsing and formatting used for ingestion and export
 */

pub mod segment;
pub mod span;
pub mod srt;

pub use segment::{SegmentId, SegmentStore, TranscriptSegment};
pub use span::TimeSpan;

/// Tolerance used when comparing timeline positions in seconds
pub const TIME_EPSILON: f64 = 1e-9;
