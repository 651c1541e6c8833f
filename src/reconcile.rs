/*!
 * Duration reconciliation.
 *
 * A synthesized clip rarely matches the duration of the segment it dubs.
 * The reconciler decides, deterministically, how the clip is fitted into the
 * segment's time budget:
 *
 * 1. Within tolerance: placed on the segment span, centered or barely
 *    compressed.
 * 2. Too long: extended into the silence before the next segment, never past
 *    its start minus a guard interval.
 * 3. Still too long: pitch-preserving compression up to a maximum factor,
 *    then truncation with a `DurationOverflow` warning.
 * 4. Too short: padded with trailing silence; speech is never slowed down.
 */

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use serde::Serialize;

use crate::app_config::ReconcileConfig;
use crate::audio::buffer::{samples_to_secs, secs_to_samples};
use crate::audio::dsp;
use crate::errors::{DurationOverflow, PipelineError};
use crate::pipeline::Stage;
use crate::timeline::{SegmentId, SegmentStore, TimeSpan, TranscriptSegment, TIME_EPSILON};

/// Translated speech for one segment, as returned by the synthesizer
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip {
    pub segment_id: SegmentId,
    pub audio_samples: Vec<f32>,
    pub sample_rate: u32,
    pub natural_duration: f64,
}

impl SynthesizedClip {
    pub fn new(segment_id: SegmentId, audio_samples: Vec<f32>, sample_rate: u32) -> Self {
        let natural_duration = samples_to_secs(audio_samples.len(), sample_rate);
        Self {
            segment_id,
            audio_samples,
            sample_rate,
            natural_duration,
        }
    }
}

/// Which rule placed a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileDecision {
    WithinTolerance,
    Padded,
    ExtendedIntoGap,
    Compressed,
    Truncated,
}

/// A clip fitted to its final window on the original timeline.
///
/// `audio_samples` is at the track sample rate and exactly fills
/// `placed_span`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledClip {
    pub segment_id: SegmentId,
    pub placed_span: TimeSpan,
    pub audio_samples: Vec<f32>,
    /// Seconds of speech that could not be placed
    pub overflow_debt: f64,
    pub decision: ReconcileDecision,
    /// Time-scale factor applied (1.0 = untouched)
    pub compression: f64,
}

/// Result of reconciling one clip
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub clip: ReconciledClip,
    pub warning: Option<DurationOverflow>,
}

/// Result of reconciling every clip of a run
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Clips ordered by placed start
    pub clips: Vec<ReconciledClip>,
    pub warnings: Vec<DurationOverflow>,
}

/// Fits synthesized clips into segment windows
#[derive(Debug, Clone)]
pub struct DurationReconciler {
    tolerance: f64,
    guard: f64,
    max_compression: f64,
    frame_ms: u64,
    sample_rate: u32,
}

impl DurationReconciler {
    /// `sample_rate` is the rate of the output track; clips are converted to it
    pub fn new(config: &ReconcileConfig, sample_rate: u32) -> Self {
        Self {
            tolerance: config.tolerance_secs(),
            guard: config.guard_secs(),
            max_compression: config.max_compression.max(1.0),
            frame_ms: config.stretch_frame_ms,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Fit `clip` into `segment`, given the position the clip must not run
    /// past (the next segment's original start, or the media end)
    pub fn reconcile(
        &self,
        segment: &TranscriptSegment,
        clip: &SynthesizedClip,
        next_boundary: f64,
    ) -> Reconciliation {
        let sr = self.sample_rate;
        let samples = dsp::resample_linear(&clip.audio_samples, clip.sample_rate, sr);
        let natural = samples_to_secs(samples.len(), sr);
        let span = segment.span;
        let target = span.duration();
        let diff = natural - target;

        if diff.abs() <= self.tolerance {
            if diff <= 0.0 {
                let fitted = dsp::center_pad(&samples, secs_to_samples(target, sr));
                return self.placed(segment.id, span, fitted, ReconcileDecision::WithinTolerance, 1.0);
            }
            let factor = natural / target;
            if factor <= self.max_compression {
                let fitted = self.compress_to(&samples, factor, target);
                return self.placed(segment.id, span, fitted, ReconcileDecision::WithinTolerance, factor);
            }
        } else if diff < 0.0 {
            let fitted = dsp::pad_to_len(&samples, secs_to_samples(target, sr));
            return self.placed(segment.id, span, fitted, ReconcileDecision::Padded, 1.0);
        }

        // too long: borrow the following gap first
        let limit = (next_boundary - self.guard).max(span.end);
        if span.start + natural <= limit + TIME_EPSILON {
            let placed = TimeSpan::from_ordered(span.start, span.start + natural);
            let fitted = dsp::pad_to_len(&samples, secs_to_samples(natural, sr));
            return self.placed(segment.id, placed, fitted, ReconcileDecision::ExtendedIntoGap, 1.0);
        }

        let window = limit - span.start;
        let placed = TimeSpan::from_ordered(span.start, limit);
        let factor = natural / window;
        if factor <= self.max_compression + TIME_EPSILON {
            let fitted = self.compress_to(&samples, factor, window);
            return self.placed(segment.id, placed, fitted, ReconcileDecision::Compressed, factor);
        }

        let compressed = dsp::time_compress(&samples, sr, self.max_compression, self.frame_ms);
        let compressed_secs = samples_to_secs(compressed.len(), sr);
        let overflow = (compressed_secs - window).max(0.0);
        let fitted = dsp::pad_to_len(&compressed, secs_to_samples(window, sr));

        let warning = DurationOverflow {
            segment_id: segment.id,
            overflow_secs: overflow,
        };
        debug!("{}", warning);

        let mut result = self.placed(
            segment.id,
            placed,
            fitted,
            ReconcileDecision::Truncated,
            self.max_compression,
        );
        result.clip.overflow_debt = overflow;
        result.warning = Some(warning);
        result
    }

    fn compress_to(&self, samples: &[f32], factor: f64, window: f64) -> Vec<f32> {
        let compressed = dsp::time_compress(samples, self.sample_rate, factor, self.frame_ms);
        dsp::pad_to_len(&compressed, secs_to_samples(window, self.sample_rate))
    }

    fn placed(
        &self,
        segment_id: SegmentId,
        placed_span: TimeSpan,
        audio_samples: Vec<f32>,
        decision: ReconcileDecision,
        compression: f64,
    ) -> Reconciliation {
        debug!(
            "Segment {}: {:?} at {} (x{:.3})",
            segment_id, decision, placed_span, compression
        );
        Reconciliation {
            clip: ReconciledClip {
                segment_id,
                placed_span,
                audio_samples,
                overflow_debt: 0.0,
                decision,
                compression,
            },
            warning: None,
        }
    }
}

/// Fail if any two placed spans overlap
pub fn check_no_overlap(clips: &[ReconciledClip]) -> Result<(), PipelineError> {
    let mut spans: Vec<(SegmentId, TimeSpan)> =
        clips.iter().map(|c| (c.segment_id, c.placed_span)).collect();
    spans.sort_by(|a, b| a.1.start.total_cmp(&b.1.start));

    for pair in spans.windows(2) {
        if pair[0].1.overlaps(&pair[1].1) {
            return Err(PipelineError::TimelineInvariantViolation(format!(
                "Reconciled clips of segments {} {} and {} {} overlap",
                pair[0].0, pair[0].1, pair[1].0, pair[1].1
            )));
        }
    }
    Ok(())
}

/// Reconcile every clip on a bounded pool of blocking workers.
///
/// Clips without a matching segment are ignored; segments without a clip
/// keep their original audio.
pub async fn reconcile_all(
    reconciler: Arc<DurationReconciler>,
    segments: &SegmentStore,
    clips: Vec<SynthesizedClip>,
    media_duration: f64,
    concurrency: usize,
) -> Result<ReconcileOutcome, PipelineError> {
    let mut jobs = Vec::with_capacity(clips.len());
    for clip in clips {
        let Some(index) = segments.iter().position(|s| s.id == clip.segment_id) else {
            warn!("Dropping clip for unknown segment {}", clip.segment_id);
            continue;
        };
        let segment = segments.segments()[index].clone();
        let boundary = segments.next_boundary(index, media_duration);
        jobs.push((segment, clip, boundary));
    }

    let results: Vec<_> = stream::iter(jobs)
        .map(|(segment, clip, boundary)| {
            let reconciler = reconciler.clone();
            tokio::task::spawn_blocking(move || reconciler.reconcile(&segment, &clip, boundary))
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = ReconcileOutcome::default();
    for result in results {
        let reconciliation = result.map_err(|e| PipelineError::StageFailed {
            stage: Stage::Reconciliation,
            reason: format!("Reconcile worker failed: {}", e),
        })?;
        if let Some(warning) = reconciliation.warning {
            outcome.warnings.push(warning);
        }
        outcome.clips.push(reconciliation.clip);
    }

    outcome
        .clips
        .sort_by(|a, b| a.placed_span.start.total_cmp(&b.placed_span.start));
    outcome.warnings.sort_by_key(|w| w.segment_id);
    check_no_overlap(&outcome.clips)?;

    Ok(outcome)
}
