/*!
 * Job manifests.
 *
 * A job names the files of one media: its audio, its transcript and
 * whatever upstream tools already produced (translation, clips, stems, ad
 * report). Relative paths are resolved against the manifest's directory.
 *
 * ```json
 * {
 *   "media_id": "episode-12",
 *   "audio": "episode-12.wav",
 *   "transcript": "episode-12.srt",
 *   "translated_transcript": "episode-12.en.srt",
 *   "clips_dir": "tts",
 *   "ads_report": "ads_info.json"
 * }
 * ```
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::wav::read_wav;
use crate::pipeline::Collaborators;
use crate::providers::files::{AdReportClassifier, ClipDirectorySynthesizer, NoAdsClassifier, PassthroughTranslator};
use crate::providers::mock::{MockSynthesizer, MockTranslator};
use crate::providers::{AdClassifier, MediaSource, SpeechSynthesizer, StemSeparator, Translator};
use crate::stems::{DemucsSeparator, WavStemSeparator};
use crate::timeline::SegmentStore;

/// Pre-separated stems
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StemFiles {
    pub vocal: PathBuf,
    pub background: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobManifest {
    pub media_id: String,
    /// Source audio (WAV)
    pub audio: PathBuf,
    /// Source-language transcript (SRT)
    pub transcript: PathBuf,
    /// Source video, passed through to the cut list
    #[serde(default)]
    pub video: Option<PathBuf>,
    /// Translated transcript (SRT), matched to `transcript` by cue number
    #[serde(default)]
    pub translated_transcript: Option<PathBuf>,
    /// Directory of `segment_NNNN.wav` clips, numbered from 0 in transcript order
    #[serde(default)]
    pub clips_dir: Option<PathBuf>,
    /// Pre-separated stems; `demucs` is run when absent
    #[serde(default)]
    pub stems: Option<StemFiles>,
    /// Ad report (`{"ad_segments": [...]}`); no ads are removed when absent
    #[serde(default)]
    pub ads_report: Option<PathBuf>,
    /// Output directory; defaults to `<manifest dir>/out`
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl JobManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read job manifest {:?}", path))?;
        let manifest: JobManifest =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse job manifest {:?}", path))?;
        if manifest.media_id.trim().is_empty() {
            return Err(anyhow!("Job manifest {:?} has an empty media_id", path));
        }
        let base = path.parent().unwrap_or(Path::new("."));
        Ok(manifest.resolved_against(base))
    }

    /// Make every relative path relative to `base`
    pub fn resolved_against(mut self, base: &Path) -> Self {
        let resolve = |p: &PathBuf| if p.is_relative() { base.join(p) } else { p.clone() };
        self.audio = resolve(&self.audio);
        self.transcript = resolve(&self.transcript);
        self.video = self.video.as_ref().map(resolve);
        self.translated_transcript = self.translated_transcript.as_ref().map(resolve);
        self.clips_dir = self.clips_dir.as_ref().map(resolve);
        self.stems = self.stems.as_ref().map(|s| StemFiles {
            vocal: resolve(&s.vocal),
            background: resolve(&s.background),
        });
        self.ads_report = self.ads_report.as_ref().map(resolve);
        self.output_dir = Some(self.output_dir.as_ref().map_or_else(|| base.join("out"), resolve));
        self
    }

    pub fn load_media(&self) -> Result<MediaSource> {
        let audio = read_wav(&self.audio).with_context(|| format!("Failed to load media audio {:?}", self.audio))?;
        let mut media = MediaSource::new(&self.media_id, audio);
        if let Some(video) = &self.video {
            media = media.with_video(video.clone());
        }
        Ok(media)
    }

    pub fn load_segments(&self) -> Result<SegmentStore> {
        let source = std::fs::read_to_string(&self.transcript)
            .with_context(|| format!("Failed to read transcript {:?}", self.transcript))?;
        let translated = match &self.translated_transcript {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read translated transcript {:?}", path))?,
            ),
            None => None,
        };
        SegmentStore::from_srt_pair(&source, translated.as_deref())
            .with_context(|| format!("Invalid transcript {:?}", self.transcript))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("out"))
    }

    /// Collaborators backed by the job's files. With `dry_run`, translation
    /// and synthesis are replaced by deterministic mocks.
    pub fn collaborators(&self, sample_rate: u32, dry_run: bool) -> Result<Collaborators> {
        let translator: Arc<dyn Translator> = if dry_run {
            Arc::new(MockTranslator::working())
        } else {
            Arc::new(PassthroughTranslator)
        };

        let synthesizer: Arc<dyn SpeechSynthesizer> = match (&self.clips_dir, dry_run) {
            (_, true) => Arc::new(MockSynthesizer::working(sample_rate)),
            (Some(dir), false) => Arc::new(ClipDirectorySynthesizer::new(dir.clone())),
            (None, false) => return Err(anyhow!("Job {} has no clips_dir; use --dry-run to synthesize test tones", self.media_id)),
        };

        let separator: Arc<dyn StemSeparator> = match &self.stems {
            Some(files) => Arc::new(WavStemSeparator::new(files.vocal.clone(), files.background.clone())),
            None => Arc::new(DemucsSeparator::default()),
        };

        let classifier: Arc<dyn AdClassifier> = match &self.ads_report {
            Some(path) => Arc::new(AdReportClassifier::new(path.clone())),
            None => Arc::new(NoAdsClassifier),
        };

        Ok(Collaborators {
            translator,
            synthesizer,
            separator,
            classifier,
        })
    }
}
