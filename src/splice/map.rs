use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::timeline::srt::{self, SrtCue};
use crate::timeline::{SegmentId, TimeSpan, TIME_EPSILON};

/// Tolerance of the duration conservation check
const CONSERVATION_EPSILON: f64 = 1e-6;

/// The kept part of a transcript segment after ad removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplicedSegment {
    pub segment_id: SegmentId,
    /// 0 for the first kept part of a segment, 1 for the second...
    pub part: usize,
    pub original_span: TimeSpan,
    pub remapped_span: TimeSpan,
    pub source_text: String,
    pub translated_text: String,
}

/// Mapping between the original timeline and the timeline with ads removed.
///
/// `kept` and `removed` partition `[0, media_duration]`; `offsets[i]` is the
/// position of `kept[i].start` on the new timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpliceMap {
    pub media_duration: f64,
    pub kept: Vec<TimeSpan>,
    pub removed: Vec<TimeSpan>,
    pub offsets: Vec<f64>,
    pub kept_segments: Vec<SplicedSegment>,
}

impl SpliceMap {
    pub(crate) fn from_parts(
        media_duration: f64,
        kept: Vec<TimeSpan>,
        removed: Vec<TimeSpan>,
        kept_segments: Vec<SplicedSegment>,
    ) -> Self {
        let mut offsets = Vec::with_capacity(kept.len());
        let mut cursor = 0.0;
        for span in &kept {
            offsets.push(cursor);
            cursor += span.duration();
        }
        Self {
            media_duration,
            kept,
            removed,
            offsets,
            kept_segments,
        }
    }

    /// Map of a media with nothing removed
    pub fn identity(media_duration: f64) -> Result<Self, PipelineError> {
        let whole = TimeSpan::new(0.0, media_duration)?;
        Ok(Self::from_parts(media_duration, vec![whole], Vec::new(), Vec::new()))
    }

    /// Duration of the spliced timeline
    pub fn new_duration(&self) -> f64 {
        match (self.kept.last(), self.offsets.last()) {
            (Some(span), Some(offset)) => offset + span.duration(),
            _ => 0.0,
        }
    }

    pub fn removed_duration(&self) -> f64 {
        self.removed.iter().map(TimeSpan::duration).sum()
    }

    /// Original position to spliced position.
    ///
    /// Positions inside a removed interval collapse onto the mapped value of
    /// the interval start; positions outside the media are clamped.
    pub fn remap(&self, old_t: f64) -> f64 {
        let t = old_t.clamp(0.0, self.media_duration);
        let idx = self.kept.partition_point(|span| span.start <= t);
        if idx == 0 {
            return 0.0;
        }
        let span = &self.kept[idx - 1];
        let offset = self.offsets[idx - 1];
        if t < span.end {
            offset + (t - span.start)
        } else {
            offset + span.duration()
        }
    }

    /// Spliced position back to the original timeline; exact inverse of
    /// `remap` on kept spans. Junctions resolve to the later kept span.
    pub fn unmap(&self, new_t: f64) -> f64 {
        let t = new_t.clamp(0.0, self.new_duration());
        let idx = self.offsets.partition_point(|offset| *offset <= t);
        if idx == 0 {
            return self.kept.first().map_or(0.0, |span| span.start);
        }
        let span = &self.kept[idx - 1];
        (span.start + (t - self.offsets[idx - 1])).min(span.end)
    }

    /// Parts of `span` that survive the splice, each with its start on the
    /// new timeline
    pub fn kept_pieces(&self, span: &TimeSpan) -> Vec<(TimeSpan, f64)> {
        self.kept
            .iter()
            .zip(&self.offsets)
            .filter_map(|(kept, offset)| {
                kept.intersection(span)
                    .map(|piece| (piece, offset + (piece.start - kept.start)))
            })
            .collect()
    }

    /// Check the map's invariants: kept spans ordered and disjoint, kept and
    /// removed covering the media, `remap` monotonic and the duration
    /// conserved
    pub fn verify(&self) -> Result<(), PipelineError> {
        let violation = |msg: String| Err(PipelineError::TimelineInvariantViolation(msg));

        if self.offsets.len() != self.kept.len() {
            return violation(format!(
                "{} offsets for {} kept spans",
                self.offsets.len(),
                self.kept.len()
            ));
        }
        for pair in self.kept.windows(2) {
            if pair[1].start < pair[0].end - TIME_EPSILON {
                return violation(format!("Kept spans {} and {} are out of order", pair[0], pair[1]));
            }
        }
        if let Some(last) = self.kept.last() {
            if last.end > self.media_duration + TIME_EPSILON {
                return violation(format!("Kept span {} exceeds the media", last));
            }
        }

        let covered = self.kept.iter().map(TimeSpan::duration).sum::<f64>() + self.removed_duration();
        if (covered - self.media_duration).abs() > CONSERVATION_EPSILON {
            return violation(format!(
                "Kept and removed spans cover {:.6}s of {:.6}s",
                covered, self.media_duration
            ));
        }

        let mut checkpoints: Vec<f64> = self
            .kept
            .iter()
            .chain(&self.removed)
            .flat_map(|span| [span.start, (span.start + span.end) / 2.0, span.end])
            .collect();
        checkpoints.push(0.0);
        checkpoints.push(self.media_duration);
        checkpoints.sort_by(f64::total_cmp);
        let mut previous = f64::NEG_INFINITY;
        for t in checkpoints {
            let mapped = self.remap(t);
            if mapped < previous - TIME_EPSILON {
                return violation(format!("remap is not monotonic at {:.6}s", t));
            }
            previous = mapped;
        }

        let expected = self.media_duration - self.removed_duration();
        let actual = self.remap(self.media_duration);
        if (actual - expected).abs() > CONSERVATION_EPSILON {
            return violation(format!(
                "remap(media) = {:.6}s, expected {:.6}s",
                actual, expected
            ));
        }

        for pair in self.kept_segments.windows(2) {
            if pair[0].remapped_span.overlaps(&pair[1].remapped_span) {
                return violation(format!(
                    "Spliced segments {} and {} overlap",
                    pair[0].segment_id, pair[1].segment_id
                ));
            }
        }
        Ok(())
    }

    /// Video cut list for the muxer
    pub fn cut_list(&self) -> CutList {
        CutList {
            keep: self.kept.clone(),
            output_duration: self.new_duration(),
        }
    }

    /// Transcript on the spliced timeline
    pub fn transcript_srt(&self, use_translation: bool) -> String {
        let cues: Vec<SrtCue> = self
            .kept_segments
            .iter()
            .enumerate()
            .map(|(i, segment)| SrtCue {
                index: i + 1,
                span: segment.remapped_span,
                text: if use_translation && !segment.translated_text.is_empty() {
                    segment.translated_text.clone()
                } else {
                    segment.source_text.clone()
                },
            })
            .collect();
        srt::format_srt(&cues)
    }

    /// Deterministic JSON rendering
    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Kept spans of the original video, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutList {
    pub keep: Vec<TimeSpan>,
    pub output_duration: f64,
}

impl CutList {
    /// `between(t,a,b)+...` expression selecting the kept frames
    pub fn select_expression(&self) -> String {
        let mut expr = String::new();
        for (i, span) in self.keep.iter().enumerate() {
            if i > 0 {
                expr.push('+');
            }
            let _ = write!(expr, "between(t,{:.3},{:.3})", span.start, span.end);
        }
        expr
    }

    /// ffmpeg `-vf` argument keeping only the listed spans
    pub fn video_filter(&self) -> String {
        format!("select='{}',setpts=N/FRAME_RATE/TB", self.select_expression())
    }

    /// ffmpeg `-af` argument keeping only the listed spans
    pub fn audio_filter(&self) -> String {
        format!("aselect='{}',asetpts=N/SR/TB", self.select_expression())
    }
}
