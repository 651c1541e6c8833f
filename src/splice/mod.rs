/*!
 * Ad splice planning.
 *
 * - `planner`: normalizes classifier output and builds the `SpliceMap`
 * - `map`: the old-to-new timeline mapping, split segments and the video cut list
 */

pub mod map;
pub mod planner;

use serde::{Deserialize, Serialize};

use crate::timeline::TimeSpan;

pub use map::{CutList, SpliceMap, SplicedSegment};
pub use planner::SplicePlanner;

/// Advertisement candidate on the original timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdInterval {
    pub span: TimeSpan,
    /// Classifier confidence in `[0, 1]`
    pub confidence: f32,
    /// Free-form origin of the candidate (classifier name, reason)
    #[serde(default)]
    pub source_tag: String,
}

impl AdInterval {
    pub fn new(start: f64, end: f64, confidence: f32, source_tag: &str) -> Result<Self, crate::errors::PipelineError> {
        Ok(Self {
            span: TimeSpan::new(start, end)?,
            confidence,
            source_tag: source_tag.to_string(),
        })
    }
}
