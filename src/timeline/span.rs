use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

use super::TIME_EPSILON;

/// Half-open time interval `[start, end)` in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSpan")]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

#[derive(Deserialize)]
struct RawTimeSpan {
    start: f64,
    end: f64,
}

impl TryFrom<RawTimeSpan> for TimeSpan {
    type Error = PipelineError;

    fn try_from(raw: RawTimeSpan) -> Result<Self, Self::Error> {
        TimeSpan::new(raw.start, raw.end)
    }
}

impl TimeSpan {
    /// Create a span, rejecting negative, empty and non-finite intervals
    pub fn new(start: f64, end: f64) -> Result<Self, PipelineError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(PipelineError::InvalidInput(format!(
                "Non-finite time span: {} -> {}",
                start, end
            )));
        }
        if start < 0.0 {
            return Err(PipelineError::InvalidInput(format!(
                "Time span starts before zero: {:.3}s",
                start
            )));
        }
        if end <= start {
            return Err(PipelineError::InvalidInput(format!(
                "Time span has no positive duration: {:.3}s -> {:.3}s",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a span from bounds the caller has already ordered
    pub(crate) fn from_ordered(start: f64, end: f64) -> Self {
        debug_assert!(end > start, "unordered span {} -> {}", start, end);
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `t` lies in `[start, end)`
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end - TIME_EPSILON && other.start < self.end - TIME_EPSILON
    }

    /// Common part of two spans, if it has positive length
    pub fn intersection(&self, other: &TimeSpan) -> Option<TimeSpan> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end - start > TIME_EPSILON {
            Some(TimeSpan::from_ordered(start, end))
        } else {
            None
        }
    }

    /// Silence between the end of this span and the start of `next`
    pub fn gap_to(&self, next: &TimeSpan) -> f64 {
        (next.start - self.end).max(0.0)
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}s - {:.3}s]", self.start, self.end)
    }
}
