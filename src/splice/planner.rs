use log::{debug, info};

use crate::app_config::SpliceConfig;
use crate::errors::PipelineError;
use crate::timeline::{SegmentStore, TimeSpan, TIME_EPSILON};

use super::map::{SpliceMap, SplicedSegment};
use super::AdInterval;

/// Builds a `SpliceMap` from transcript segments and ad candidates.
///
/// Planning is a pure function of its inputs: the same segments and
/// intervals always yield the same map.
#[derive(Debug, Clone)]
pub struct SplicePlanner {
    merge_gap: f64,
    min_confidence: f32,
    min_fragment: f64,
}

impl SplicePlanner {
    pub fn new(config: &SpliceConfig) -> Self {
        Self {
            merge_gap: config.merge_gap_ms as f64 / 1000.0,
            min_confidence: config.min_ad_confidence,
            min_fragment: config.min_fragment_ms as f64 / 1000.0,
        }
    }

    /// Drop low-confidence candidates, sort the rest and merge those that
    /// overlap or are separated by less than the merge gap
    pub fn merge_intervals(&self, intervals: &[AdInterval]) -> Vec<TimeSpan> {
        let mut spans: Vec<TimeSpan> = intervals
            .iter()
            .filter(|ad| ad.confidence >= self.min_confidence)
            .map(|ad| ad.span)
            .collect();
        spans.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));

        let mut merged: Vec<TimeSpan> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if span.start - last.end < self.merge_gap => {
                    last.end = last.end.max(span.end);
                }
                _ => merged.push(span),
            }
        }
        merged
    }

    pub fn plan(
        &self,
        segments: &SegmentStore,
        ad_intervals: &[AdInterval],
        media_duration: f64,
    ) -> Result<SpliceMap, PipelineError> {
        if !media_duration.is_finite() || media_duration <= 0.0 {
            return Err(PipelineError::InvalidInput(format!(
                "Media duration must be positive, got {}",
                media_duration
            )));
        }

        let media = TimeSpan::from_ordered(0.0, media_duration);
        let removed: Vec<TimeSpan> = self
            .merge_intervals(ad_intervals)
            .iter()
            .filter_map(|span| span.intersection(&media))
            .collect();

        let kept = complement(&removed, media_duration);
        if kept.is_empty() {
            return Err(PipelineError::EmptyOutputAfterSplice { media_duration });
        }

        let mut map = SpliceMap::from_parts(media_duration, kept, removed, Vec::new());

        let mut kept_segments = Vec::with_capacity(segments.len());
        let mut dropped = 0;
        for segment in segments {
            let pieces = map.kept_pieces(&segment.span);
            if pieces.is_empty() {
                dropped += 1;
                debug!("Segment {} {} falls entirely inside an ad", segment.id, segment.span);
                continue;
            }
            let mut part = 0;
            for (piece, new_start) in pieces {
                if piece.duration() < self.min_fragment {
                    debug!("Dropping {:.3}s fragment of segment {}", piece.duration(), segment.id);
                    continue;
                }
                kept_segments.push(SplicedSegment {
                    segment_id: segment.id,
                    part,
                    original_span: piece,
                    remapped_span: TimeSpan::from_ordered(new_start, new_start + piece.duration()),
                    source_text: segment.source_text.clone(),
                    translated_text: segment.translated_text.clone(),
                });
                part += 1;
            }
        }
        map.kept_segments = kept_segments;
        map.verify()?;

        info!(
            "Splice plan: {} ad interval(s) removing {:.3}s, {:.3}s -> {:.3}s, {} segment(s) dropped",
            map.removed.len(),
            map.removed_duration(),
            media_duration,
            map.new_duration(),
            dropped
        );
        Ok(map)
    }
}

/// Spans of `[0, media_duration]` not covered by `removed` (sorted, disjoint)
fn complement(removed: &[TimeSpan], media_duration: f64) -> Vec<TimeSpan> {
    let mut kept = Vec::with_capacity(removed.len() + 1);
    let mut cursor = 0.0;
    for span in removed {
        if span.start - cursor > TIME_EPSILON {
            kept.push(TimeSpan::from_ordered(cursor, span.start));
        }
        cursor = span.end;
    }
    if media_duration - cursor > TIME_EPSILON {
        kept.push(TimeSpan::from_ordered(cursor, media_duration));
    }
    kept
}
