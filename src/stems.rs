/*!
 * Stem separator adapter.
 *
 * Source audio is split into a vocal stem and a background stem. Separation
 * itself is done by an external tool; this module wraps it and validates
 * what comes back.
 */

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::audio::wav::{read_wav, write_wav};
use crate::audio::{AudioBuffer, WavEncoding};
use crate::errors::{PipelineError, UpstreamError};
use crate::pipeline::file_tag;
use crate::providers::{MediaSource, StemSeparator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemKind {
    Vocal,
    Background,
}

/// One isolated component of the source mix
#[derive(Debug, Clone, PartialEq)]
pub struct Stem {
    pub kind: StemKind,
    pub audio: AudioBuffer,
}

/// Vocal and background stems of the same media, same rate and length
#[derive(Debug, Clone, PartialEq)]
pub struct StemPair {
    vocal: Stem,
    background: Stem,
}

impl StemPair {
    /// Pair two stems; lengths are conformed to the longer one
    pub fn new(vocal: AudioBuffer, background: AudioBuffer) -> Result<Self, PipelineError> {
        if vocal.sample_rate != background.sample_rate {
            return Err(PipelineError::Audio(format!(
                "Stem sample rates differ: vocal {} Hz, background {} Hz",
                vocal.sample_rate, background.sample_rate
            )));
        }
        if vocal.sample_rate == 0 {
            return Err(PipelineError::Audio("Stems have a zero sample rate".to_string()));
        }

        let len = vocal.len().max(background.len());
        let (mut vocal, mut background) = (vocal, background);
        if vocal.len() != background.len() {
            debug!(
                "Conforming stems to {} samples (vocal {}, background {})",
                len,
                vocal.len(),
                background.len()
            );
        }
        vocal.conform_len(len);
        background.conform_len(len);

        Ok(Self {
            vocal: Stem {
                kind: StemKind::Vocal,
                audio: vocal,
            },
            background: Stem {
                kind: StemKind::Background,
                audio: background,
            },
        })
    }

    pub fn vocal(&self) -> &AudioBuffer {
        &self.vocal.audio
    }

    pub fn background(&self) -> &AudioBuffer {
        &self.background.audio
    }

    pub fn stem(&self, kind: StemKind) -> &Stem {
        match kind {
            StemKind::Vocal => &self.vocal,
            StemKind::Background => &self.background,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.vocal.audio.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.vocal.audio.duration()
    }
}

fn find_stem_file(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(|entry| entry.into_path())
}

/// Runs `demucs --two-stems=vocals` on the source audio
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    binary: String,
    model: Option<String>,
}

impl DemucsSeparator {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }
}

impl Default for DemucsSeparator {
    fn default() -> Self {
        Self::new("demucs")
    }
}

#[async_trait]
impl StemSeparator for DemucsSeparator {
    async fn separate(&self, media: &MediaSource) -> Result<StemPair, UpstreamError> {
        let workdir = TempDir::new()
            .map_err(|e| UpstreamError::Unavailable(format!("Failed to create work dir: {}", e)))?;
        let input = workdir.path().join("source.wav");
        let output = workdir.path().join("separated");

        write_wav(&input, &media.audio, WavEncoding::Float32)
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("--two-stems=vocals").arg("-o").arg(&output);
        if let Some(model) = &self.model {
            cmd.arg("-n").arg(model);
        }
        cmd.arg(&input);

        info!("Separating stems of {} with {}", media.id, self.binary);
        let result = cmd
            .output()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("Failed to run {}: {}", self.binary, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(UpstreamError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.binary,
                result.status,
                stderr.trim()
            )));
        }

        let vocal_path = find_stem_file(&output, "vocals.wav")
            .ok_or_else(|| UpstreamError::InvalidResponse("No vocals.wav produced".to_string()))?;
        let background_path = find_stem_file(&output, "no_vocals.wav")
            .ok_or_else(|| UpstreamError::InvalidResponse("No no_vocals.wav produced".to_string()))?;

        let read = |path: &Path| read_wav(path).map_err(|e| UpstreamError::InvalidResponse(e.to_string()));
        let vocal = read(&vocal_path)?;
        let background = read(&background_path)?;

        StemPair::new(vocal, background).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }

    fn cache_tag(&self) -> String {
        format!("demucs:{}:{}", self.binary, self.model.as_deref().unwrap_or("default"))
    }
}

/// Reads stems separated ahead of time
#[derive(Debug, Clone)]
pub struct WavStemSeparator {
    vocal_path: PathBuf,
    background_path: PathBuf,
}

impl WavStemSeparator {
    pub fn new(vocal_path: PathBuf, background_path: PathBuf) -> Self {
        Self {
            vocal_path,
            background_path,
        }
    }
}

#[async_trait]
impl StemSeparator for WavStemSeparator {
    async fn separate(&self, media: &MediaSource) -> Result<StemPair, UpstreamError> {
        let read = |path: &Path| read_wav(path).map_err(|e| UpstreamError::Unavailable(e.to_string()));
        let vocal = read(&self.vocal_path)?;
        let background = read(&self.background_path)?;

        let pair = StemPair::new(vocal, background).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        if pair.sample_rate() != media.audio.sample_rate {
            return Err(UpstreamError::InvalidResponse(format!(
                "Stems are at {} Hz, media is at {} Hz",
                pair.sample_rate(),
                media.audio.sample_rate
            )));
        }
        Ok(pair)
    }

    fn cache_tag(&self) -> String {
        format!(
            "{}|{}",
            file_tag("vocal", &self.vocal_path),
            file_tag("background", &self.background_path)
        )
    }
}
