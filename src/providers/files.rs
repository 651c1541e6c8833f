/*!
 * File-backed collaborators.
 *
 * These read artifacts produced by other tools (translated transcripts,
 * pre-rendered speech clips, ad reports) so the engine can run on the
 * output of an existing pipeline.
 */

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;

use crate::audio::wav::read_wav;
use crate::errors::UpstreamError;
use crate::pipeline::file_tag;
use crate::reconcile::SynthesizedClip;
use crate::splice::AdInterval;
use crate::timeline::{SegmentId, SegmentStore, TranscriptSegment};

use super::{AdClassifier, SpeechSynthesizer, Translator};

/// Uses the translation already attached to each segment
#[derive(Debug, Clone, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, segment: &TranscriptSegment) -> Result<String, UpstreamError> {
        if segment.is_translated() {
            Ok(segment.translated_text.clone())
        } else {
            Err(UpstreamError::Unavailable(format!(
                "Segment {} has no translation",
                segment.id
            )))
        }
    }

    fn cache_tag(&self) -> String {
        "passthrough".to_string()
    }
}

/// Reads one pre-rendered clip per segment.
///
/// Clip files are numbered from zero in transcript order, so segment 1
/// reads `segment_0000.wav`, segment 2 `segment_0001.wav` and so on.
#[derive(Debug, Clone)]
pub struct ClipDirectorySynthesizer {
    dir: PathBuf,
}

impl ClipDirectorySynthesizer {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// `None` for segment id 0, which has no clip number
    pub fn clip_path(&self, segment_id: SegmentId) -> Option<PathBuf> {
        let number = segment_id.checked_sub(1)?;
        Some(self.dir.join(format!("segment_{:04}.wav", number)))
    }
}

#[async_trait]
impl SpeechSynthesizer for ClipDirectorySynthesizer {
    async fn synthesize(
        &self,
        segment_id: SegmentId,
        _text: &str,
        _voice: &str,
    ) -> Result<SynthesizedClip, UpstreamError> {
        let path = self
            .clip_path(segment_id)
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("No clip number for segment {}", segment_id)))?;
        if !path.exists() {
            return Err(UpstreamError::Unavailable(format!("No clip at {:?}", path)));
        }
        let audio = read_wav(&path).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        debug!("Loaded clip {:?} ({:.3}s)", path, audio.duration());
        Ok(SynthesizedClip::new(segment_id, audio.samples, audio.sample_rate))
    }

    fn cache_tag(&self, segment_id: SegmentId) -> String {
        match self.clip_path(segment_id) {
            Some(path) => file_tag("clip", &path),
            None => "clip:none".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AdReport {
    #[serde(default)]
    ad_segments: Vec<AdReportEntry>,
}

#[derive(Debug, Deserialize)]
struct AdReportEntry {
    start_time: f64,
    end_time: f64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Reads an ad report: `{"ad_segments": [{"start_time", "end_time", "reason"}]}`
#[derive(Debug, Clone)]
pub struct AdReportClassifier {
    path: PathBuf,
}

impl AdReportClassifier {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parse a report; entries with unusable timing are skipped
    pub fn parse(content: &str) -> Result<Vec<AdInterval>, UpstreamError> {
        let report: AdReport = serde_json::from_str(content)
            .map_err(|e| UpstreamError::InvalidResponse(format!("Malformed ad report: {}", e)))?;

        let intervals = report
            .ad_segments
            .into_iter()
            .filter_map(|entry| {
                match AdInterval::new(
                    entry.start_time,
                    entry.end_time,
                    entry.confidence.unwrap_or(1.0),
                    &entry.reason,
                ) {
                    Ok(interval) => Some(interval),
                    Err(e) => {
                        warn!("Skipping ad entry: {}", e);
                        None
                    }
                }
            })
            .collect();
        Ok(intervals)
    }

    fn read(path: &Path) -> Result<String, UpstreamError> {
        std::fs::read_to_string(path)
            .map_err(|e| UpstreamError::Unavailable(format!("Failed to read {:?}: {}", path, e)))
    }
}

#[async_trait]
impl AdClassifier for AdReportClassifier {
    async fn classify(&self, _segments: &SegmentStore) -> Result<Vec<AdInterval>, UpstreamError> {
        Self::parse(&Self::read(&self.path)?)
    }

    fn cache_tag(&self) -> String {
        file_tag("ad-report", &self.path)
    }
}

/// Reports no ads
#[derive(Debug, Clone, Default)]
pub struct NoAdsClassifier;

#[async_trait]
impl AdClassifier for NoAdsClassifier {
    async fn classify(&self, _segments: &SegmentStore) -> Result<Vec<AdInterval>, UpstreamError> {
        Ok(Vec::new())
    }

    fn cache_tag(&self) -> String {
        "none".to_string()
    }
}
