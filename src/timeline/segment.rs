use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

use super::srt::{self, SrtCue};
use super::TimeSpan;

/// Identifier of a transcript segment, stable across all stages
pub type SegmentId = usize;

/// Largest start or end difference between a source cue and its
/// translation before a warning is logged
const SRT_TIMING_TOLERANCE: f64 = 0.5;

/// One time-coded unit of transcript text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: SegmentId,
    pub span: TimeSpan,
    pub source_text: String,
    /// Empty until the translator has produced a translation
    #[serde(default)]
    pub translated_text: String,
    /// Recognizer confidence in `[0, 1]`
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl TranscriptSegment {
    pub fn new(id: SegmentId, start: f64, end: f64, source_text: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            id,
            span: TimeSpan::new(start, end)?,
            source_text: source_text.to_string(),
            translated_text: String::new(),
            confidence: default_confidence(),
        })
    }

    pub fn with_translation(mut self, translated_text: &str) -> Self {
        self.translated_text = translated_text.to_string();
        self
    }

    pub fn is_translated(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }
}

/// Validated, immutable, start-ordered sequence of transcript segments.
///
/// Segments never overlap; gaps between them are silence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStore {
    segments: Vec<TranscriptSegment>,
}

impl SegmentStore {
    /// Validate and order recognizer output
    pub fn new(mut segments: Vec<TranscriptSegment>) -> Result<Self, PipelineError> {
        segments.sort_by(|a, b| a.span.start.total_cmp(&b.span.start));

        let mut seen = HashSet::with_capacity(segments.len());
        for segment in &segments {
            if !seen.insert(segment.id) {
                return Err(PipelineError::InvalidInput(format!(
                    "Duplicate segment id {}",
                    segment.id
                )));
            }
            if !(0.0..=1.0).contains(&segment.confidence) {
                return Err(PipelineError::InvalidInput(format!(
                    "Segment {} has confidence {} outside [0, 1]",
                    segment.id, segment.confidence
                )));
            }
        }

        for pair in segments.windows(2) {
            if pair[0].span.overlaps(&pair[1].span) {
                return Err(PipelineError::InvalidInput(format!(
                    "Segments {} {} and {} {} overlap",
                    pair[0].id, pair[0].span, pair[1].id, pair[1].span
                )));
            }
        }

        debug!("Segment store holds {} segments", segments.len());
        Ok(Self { segments })
    }

    /// Build a store from a source-language SRT and its translation.
    ///
    /// Segment ids follow the source cues in time order, starting at 1.
    /// Translated cues are matched by cue number; a source cue without a
    /// translated counterpart stays untranslated.
    pub fn from_srt_pair(source_srt: &str, translated_srt: Option<&str>) -> Result<Self, PipelineError> {
        let source = srt::parse_srt(source_srt)?;
        let mut translated: HashMap<usize, SrtCue> = HashMap::new();
        if let Some(content) = translated_srt {
            for cue in srt::parse_srt(content)? {
                if translated.contains_key(&cue.index) {
                    return Err(PipelineError::InvalidInput(format!(
                        "Translated transcript repeats cue {}",
                        cue.index
                    )));
                }
                translated.insert(cue.index, cue);
            }
        }

        let segments = source
            .into_iter()
            .enumerate()
            .map(|(i, cue)| {
                let translated_text = match translated.remove(&cue.index) {
                    Some(tr) => {
                        let drift = (tr.span.start - cue.span.start)
                            .abs()
                            .max((tr.span.end - cue.span.end).abs());
                        if drift > SRT_TIMING_TOLERANCE {
                            warn!(
                                "Translated cue {} is timed {}, source cue is {}",
                                cue.index, tr.span, cue.span
                            );
                        }
                        tr.text
                    }
                    None => {
                        if translated_srt.is_some() {
                            warn!("Cue {} has no translation", cue.index);
                        }
                        String::new()
                    }
                };
                TranscriptSegment {
                    id: i + 1,
                    span: cue.span,
                    source_text: cue.text,
                    translated_text,
                    confidence: default_confidence(),
                }
            })
            .collect();

        if !translated.is_empty() {
            let mut orphans: Vec<usize> = translated.into_keys().collect();
            orphans.sort_unstable();
            warn!("Translated cue(s) {:?} have no source cue", orphans);
        }

        Self::new(segments)
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: SegmentId) -> Option<&TranscriptSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Position a clip of the segment at `index` must not run past: the next
    /// segment's original start, or the media end for the last segment
    pub fn next_boundary(&self, index: usize, media_duration: f64) -> f64 {
        match self.segments.get(index + 1) {
            Some(next) => next.span.start,
            None => media_duration.max(self.segments[index].span.end),
        }
    }

    /// End of the last segment, zero for an empty store
    pub fn last_end(&self) -> f64 {
        self.segments.last().map_or(0.0, |s| s.span.end)
    }
}

impl<'a> IntoIterator for &'a SegmentStore {
    type Item = &'a TranscriptSegment;
    type IntoIter = std::slice::Iter<'a, TranscriptSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
