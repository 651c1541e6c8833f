/*!
 * Mock collaborators for tests and dry runs.
 *
 * Every mock shares a `MockBehavior`:
 * - `Working`: always succeeds
 * - `Intermittent`: fails every Nth call with a retryable error
 * - `Failing`: always fails with a non-retryable error
 * - `FailingFor`: fails for the listed segment ids only
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::audio::{dsp, AudioBuffer};
use crate::errors::UpstreamError;
use crate::reconcile::SynthesizedClip;
use crate::splice::AdInterval;
use crate::stems::StemPair;
use crate::timeline::{SegmentId, SegmentStore, TranscriptSegment};

use super::{AdClassifier, MediaSource, SpeechSynthesizer, StemSeparator, Translator};

/// Behavior mode shared by all mocks
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    Working,
    /// Fails every `fail_every`-th call (1-based) with a transient error
    Intermittent { fail_every: usize },
    Failing,
    FailingFor(Vec<SegmentId>),
}

/// Call counter and behavior, cheap to clone across tasks
#[derive(Debug, Clone)]
struct MockState {
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockState {
    fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn check(&self, segment_id: Option<SegmentId>) -> Result<(), UpstreamError> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.behavior {
            MockBehavior::Working => Ok(()),
            MockBehavior::Intermittent { fail_every } => {
                if *fail_every > 0 && count % fail_every == 0 {
                    Err(UpstreamError::RequestFailed(format!("Simulated transient failure on call {}", count)))
                } else {
                    Ok(())
                }
            }
            MockBehavior::Failing => Err(UpstreamError::Unavailable("Simulated outage".to_string())),
            MockBehavior::FailingFor(ids) => match segment_id {
                Some(id) if ids.contains(&id) => {
                    Err(UpstreamError::Unavailable(format!("Simulated failure for segment {}", id)))
                }
                _ => Ok(()),
            },
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Prefixes the source text with a language tag
#[derive(Debug, Clone)]
pub struct MockTranslator {
    state: MockState,
    target_language: String,
}

impl MockTranslator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            state: MockState::new(behavior),
            target_language: "en".to_string(),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn calls(&self) -> usize {
        self.state.calls()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, segment: &TranscriptSegment) -> Result<String, UpstreamError> {
        self.state.check(Some(segment.id))?;
        Ok(format!("[{}] {}", self.target_language, segment.source_text))
    }

    fn cache_tag(&self) -> String {
        format!("mock:{}", self.target_language)
    }
}

/// Produces a sine tone per segment.
///
/// Clip durations come from `with_duration`; otherwise the length is derived
/// from the text (60 ms per character, at least 0.5 s).
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    state: MockState,
    sample_rate: u32,
    durations: HashMap<SegmentId, f64>,
}

impl MockSynthesizer {
    pub fn new(behavior: MockBehavior, sample_rate: u32) -> Self {
        Self {
            state: MockState::new(behavior),
            sample_rate,
            durations: HashMap::new(),
        }
    }

    pub fn working(sample_rate: u32) -> Self {
        Self::new(MockBehavior::Working, sample_rate)
    }

    pub fn with_duration(mut self, segment_id: SegmentId, secs: f64) -> Self {
        self.durations.insert(segment_id, secs);
        self
    }

    pub fn calls(&self) -> usize {
        self.state.calls()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        segment_id: SegmentId,
        text: &str,
        _voice: &str,
    ) -> Result<SynthesizedClip, UpstreamError> {
        self.state.check(Some(segment_id))?;
        let secs = self
            .durations
            .get(&segment_id)
            .copied()
            .unwrap_or_else(|| (text.chars().count() as f64 * 0.06).max(0.5));
        let frequency = 180.0 + (segment_id % 8) as f32 * 20.0;
        let samples = dsp::sine(frequency, secs, self.sample_rate, 0.4);
        Ok(SynthesizedClip::new(segment_id, samples, self.sample_rate))
    }

    fn cache_tag(&self, segment_id: SegmentId) -> String {
        match self.durations.get(&segment_id) {
            Some(secs) => format!("mock:{}:{}", self.sample_rate, secs),
            None => format!("mock:{}:by-text", self.sample_rate),
        }
    }
}

/// Splits the source into a low-level "vocal" copy and a "background" copy
#[derive(Debug, Clone)]
pub struct MockStemSeparator {
    state: MockState,
}

impl MockStemSeparator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            state: MockState::new(behavior),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn calls(&self) -> usize {
        self.state.calls()
    }
}

#[async_trait]
impl StemSeparator for MockStemSeparator {
    async fn separate(&self, media: &MediaSource) -> Result<StemPair, UpstreamError> {
        self.state.check(None)?;
        let sr = media.sample_rate();
        let vocal: Vec<f32> = media.audio.samples.iter().map(|s| s * 0.5).collect();
        let background: Vec<f32> = media.audio.samples.iter().map(|s| s * 0.5).collect();
        StemPair::new(AudioBuffer::new(vocal, sr), AudioBuffer::new(background, sr))
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }

    fn cache_tag(&self) -> String {
        "mock:half-level".to_string()
    }
}

/// Returns a fixed list of ad intervals
#[derive(Debug, Clone)]
pub struct MockAdClassifier {
    state: MockState,
    intervals: Vec<AdInterval>,
}

impl MockAdClassifier {
    pub fn new(behavior: MockBehavior, intervals: Vec<AdInterval>) -> Self {
        Self {
            state: MockState::new(behavior),
            intervals,
        }
    }

    pub fn with_intervals(intervals: Vec<AdInterval>) -> Self {
        Self::new(MockBehavior::Working, intervals)
    }

    pub fn none() -> Self {
        Self::with_intervals(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.state.calls()
    }
}

#[async_trait]
impl AdClassifier for MockAdClassifier {
    async fn classify(&self, _segments: &SegmentStore) -> Result<Vec<AdInterval>, UpstreamError> {
        self.state.check(None)?;
        Ok(self.intervals.clone())
    }

    fn cache_tag(&self) -> String {
        format!("mock:{}", serde_json::to_string(&self.intervals).unwrap_or_default())
    }
}
