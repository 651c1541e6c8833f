/*!
 * Timeline compositor.
 *
 * Builds the final track on the spliced timeline from the two stems and the
 * reconciled clips. Background audio is carried over untouched; the original
 * voice is replaced wherever a dubbed clip plays and kept everywhere else.
 */

use log::{debug, info};
use serde::Serialize;

use crate::app_config::ComposeConfig;
use crate::audio::buffer::secs_to_samples;
use crate::audio::{dsp, AudioBuffer};
use crate::errors::{DurationOverflow, PipelineError};
use crate::reconcile::ReconciledClip;
use crate::splice::{CutList, SpliceMap};
use crate::stems::StemPair;
use crate::timeline::SegmentId;

/// Output of a composition: the dubbed track and the matching video cuts
#[derive(Debug, Clone, Serialize)]
pub struct CompositeTrack {
    #[serde(skip)]
    pub audio: AudioBuffer,
    pub cut_list: CutList,
    /// Segments whose original voice was replaced by a clip
    pub replaced_segments: Vec<SegmentId>,
    pub warnings: Vec<DurationOverflow>,
    /// Gain applied by peak normalization
    pub normalization_gain: f32,
}

impl CompositeTrack {
    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }

    pub fn with_warnings(mut self, warnings: Vec<DurationOverflow>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Destination range of one kept span in the output buffer
struct Placement {
    source_start: usize,
    dest_start: usize,
    dest_end: usize,
}

#[derive(Debug, Clone)]
pub struct TimelineCompositor {
    crossfade_ms: u64,
    duck_gain: f32,
    target_peak: f32,
}

impl TimelineCompositor {
    pub fn new(config: &ComposeConfig) -> Self {
        Self {
            crossfade_ms: config.crossfade_ms,
            duck_gain: config.duck_gain.clamp(0.0, 1.0),
            target_peak: config.target_peak,
        }
    }

    pub fn compose(
        &self,
        stems: &StemPair,
        clips: &[ReconciledClip],
        splice_map: &SpliceMap,
    ) -> Result<CompositeTrack, PipelineError> {
        let sr = stems.sample_rate();
        let new_duration = splice_map.new_duration();
        if new_duration <= 0.0 {
            return Err(PipelineError::EmptyOutputAfterSplice {
                media_duration: splice_map.media_duration,
            });
        }

        let total = secs_to_samples(new_duration, sr);
        let fade_len = secs_to_samples(self.crossfade_ms as f64 / 1000.0, sr);
        let placements = self.placements(splice_map, sr, total);

        let background = self.splice_stem(stems.background(), &placements, fade_len, total);
        let vocal = self.splice_stem(stems.vocal(), &placements, fade_len, total);

        let mut dub = vec![0.0f32; total];
        let mut vocal_gain = vec![1.0f32; total];
        let mut replaced_segments = Vec::new();

        for clip in clips {
            let pieces = splice_map.kept_pieces(&clip.placed_span);
            if pieces.is_empty() {
                debug!("Clip of segment {} lies entirely inside an ad", clip.segment_id);
                continue;
            }
            for (piece, new_start) in pieces {
                let clip_offset = secs_to_samples(piece.start - clip.placed_span.start, sr);
                let dest_start = secs_to_samples(new_start, sr).min(total);
                let dest_end = secs_to_samples(new_start + piece.duration(), sr).min(total);
                if dest_end <= dest_start {
                    continue;
                }
                let len = dest_end - dest_start;

                let mut samples = vec![0.0f32; len];
                if clip_offset < clip.audio_samples.len() {
                    let available = (clip.audio_samples.len() - clip_offset).min(len);
                    samples[..available]
                        .copy_from_slice(&clip.audio_samples[clip_offset..clip_offset + available]);
                }
                dsp::fade_in(&mut samples, fade_len);
                dsp::fade_out(&mut samples, fade_len);

                for (out, s) in dub[dest_start..dest_end].iter_mut().zip(&samples) {
                    *out += s;
                }
                self.duck(&mut vocal_gain[dest_start..dest_end], fade_len);
            }
            replaced_segments.push(clip.segment_id);
        }

        let mut mix: Vec<f32> = background
            .iter()
            .zip(&vocal)
            .zip(vocal_gain.iter().zip(&dub))
            .map(|((bg, voice), (gain, dubbed))| bg + voice * gain + dubbed)
            .collect();
        let normalization_gain = dsp::normalize_peak(&mut mix, self.target_peak);

        info!(
            "Composed {:.3}s track: {} clip(s) placed, {} kept span(s), gain {:.3}",
            new_duration,
            replaced_segments.len(),
            placements.len(),
            normalization_gain
        );

        Ok(CompositeTrack {
            audio: AudioBuffer::new(mix, sr),
            cut_list: splice_map.cut_list(),
            replaced_segments,
            warnings: Vec::new(),
            normalization_gain,
        })
    }

    fn placements(&self, splice_map: &SpliceMap, sr: u32, total: usize) -> Vec<Placement> {
        let count = splice_map.kept.len();
        splice_map
            .kept
            .iter()
            .zip(&splice_map.offsets)
            .enumerate()
            .map(|(i, (span, offset))| {
                let dest_start = secs_to_samples(*offset, sr).min(total);
                let dest_end = if i + 1 == count {
                    total
                } else {
                    secs_to_samples(offset + span.duration(), sr).min(total)
                };
                Placement {
                    source_start: secs_to_samples(span.start, sr),
                    dest_start,
                    dest_end: dest_end.max(dest_start),
                }
            })
            .collect()
    }

    /// Copy the kept parts of a stem to their new offsets, crossfading each
    /// junction from the material that was cut away into the next kept part
    fn splice_stem(&self, stem: &AudioBuffer, placements: &[Placement], fade_len: usize, total: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; total];
        let mut previous_source_end: Option<usize> = None;

        for placement in placements {
            let len = placement.dest_end - placement.dest_start;
            let slice = stem.slice_padded(placement.source_start, len);
            let dest = &mut out[placement.dest_start..placement.dest_end];
            dest.copy_from_slice(&slice);

            if let Some(source_end) = previous_source_end {
                let n = fade_len.min(len);
                let outgoing = stem.slice_padded(source_end, n);
                dsp::crossfade_into(&mut dest[..n], &outgoing);
            }
            previous_source_end = Some(placement.source_start + len);
        }
        out
    }

    /// Lower the vocal gain to the duck level across `window`, ramping at
    /// both edges. Overlapping ramps keep the lower gain.
    fn duck(&self, window: &mut [f32], fade_len: usize) {
        let len = window.len();
        let ramp = fade_len.min(len / 2);
        for (i, gain) in window.iter_mut().enumerate() {
            let edge = i.min(len - 1 - i);
            let target = if edge < ramp {
                let t = (edge as f32 + 0.5) / ramp as f32;
                1.0 + (self.duck_gain - 1.0) * t
            } else {
                self.duck_gain
            };
            *gain = gain.min(target);
        }
    }
}
