/*!
 * External collaborator interfaces.
 *
 * The engine never implements speech recognition, translation, synthesis,
 * separation or ad classification itself. It talks to them through these
 * traits:
 * - `Translator`: source text to target-language text, per segment
 * - `SpeechSynthesizer`: translated text to a speech clip, per segment
 * - `StemSeparator`: source audio to vocal and background stems
 * - `AdClassifier`: transcript to ad interval candidates
 *
 * Each collaborator also reports a `cache_tag`: a string that changes
 * whenever its output for the same input would change (another voice
 * engine, an edited clip or ad report). The driver folds it into every
 * artifact fingerprint.
 *
 * `mock` holds deterministic implementations for tests and dry runs, `files`
 * reads artifacts other tools have already produced.
 */

use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::audio::AudioBuffer;
use crate::errors::UpstreamError;
use crate::reconcile::SynthesizedClip;
use crate::splice::AdInterval;
use crate::stems::StemPair;
use crate::timeline::{SegmentId, SegmentStore, TranscriptSegment};

pub mod files;
pub mod mock;

/// Source media as delivered by the fetcher
#[derive(Debug, Clone)]
pub struct MediaSource {
    /// Stable identifier, part of every cache fingerprint
    pub id: String,
    /// Extracted source audio, mono
    pub audio: AudioBuffer,
    /// Source video, if any; only passed through to the muxer
    pub video_path: Option<PathBuf>,
}

impl MediaSource {
    pub fn new(id: &str, audio: AudioBuffer) -> Self {
        Self {
            id: id.to_string(),
            audio,
            video_path: None,
        }
    }

    pub fn with_video(mut self, video_path: PathBuf) -> Self {
        self.video_path = Some(video_path);
        self
    }

    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }
}

#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate the source text of one segment
    async fn translate(&self, segment: &TranscriptSegment) -> Result<String, UpstreamError>;

    fn cache_tag(&self) -> String;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + Debug {
    /// Speak `text` with the given voice profile
    async fn synthesize(
        &self,
        segment_id: SegmentId,
        text: &str,
        voice: &str,
    ) -> Result<SynthesizedClip, UpstreamError>;

    /// Identity of the clip this synthesizer would produce for `segment_id`
    fn cache_tag(&self, segment_id: SegmentId) -> String;
}

#[async_trait]
pub trait StemSeparator: Send + Sync + Debug {
    /// Split the media's audio into full-length vocal and background stems
    async fn separate(&self, media: &MediaSource) -> Result<StemPair, UpstreamError>;

    fn cache_tag(&self) -> String;
}

#[async_trait]
pub trait AdClassifier: Send + Sync + Debug {
    /// Ad candidates on the original timeline; may overlap or be imprecise
    async fn classify(&self, segments: &SegmentStore) -> Result<Vec<AdInterval>, UpstreamError>;

    fn cache_tag(&self) -> String;
}
