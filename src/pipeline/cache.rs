/*!
 * Content-fingerprinted artifact cache.
 *
 * Intermediate artifacts are stored under
 * `<root>/<stage>/<sha256>.{wav,json}`, where the hash covers the media id,
 * the stage and the stage inputs. A re-run with identical inputs finds its
 * artifacts and skips the work; a cancelled run keeps everything it already
 * stored.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::app_config::PipelineConfig;
use crate::audio::wav::{read_wav, write_wav};
use crate::audio::{AudioBuffer, WavEncoding};
use crate::errors::PipelineError;

use super::context::Stage;

/// Cache key of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    stage: Stage,
    digest: String,
}

impl Fingerprint {
    /// Hash `(media_id, stage, inputs...)`. Each part is length-prefixed so
    /// that different splits of the same bytes never collide.
    pub fn compute(media_id: &str, stage: Stage, inputs: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in [media_id.as_bytes(), stage.as_str().as_bytes()].iter().chain(inputs) {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self {
            stage,
            digest: hex(&hasher.finalize()),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of an audio buffer's rate and samples
pub fn audio_digest(audio: &AudioBuffer) -> String {
    let mut hasher = Sha256::new();
    hasher.update(audio.sample_rate.to_le_bytes());
    for sample in &audio.samples {
        hasher.update(sample.to_le_bytes());
    }
    hex(&hasher.finalize())
}

/// SHA-256 of a file's bytes; `None` when it cannot be read
pub fn file_digest(path: &Path) -> Option<String> {
    let content = std::fs::read(path).ok()?;
    Some(hex(&Sha256::digest(&content)))
}

/// Cache tag of a collaborator reading `path`, keyed on the file content;
/// an unreadable file is tagged with its path instead
pub fn file_tag(kind: &str, path: &Path) -> String {
    match file_digest(path) {
        Some(digest) => format!("{}:{}", kind, digest),
        None => format!("{}:missing:{}", kind, path.display()),
    }
}

/// On-disk artifact cache; a disabled cache misses every lookup and stores
/// nothing
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: Option<PathBuf>,
    hits: Arc<RwLock<usize>>,
    misses: Arc<RwLock<usize>>,
}

impl ArtifactCache {
    pub fn at(root: PathBuf) -> Self {
        Self {
            root: Some(root),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
        }
    }

    pub fn disabled() -> Self {
        Self {
            root: None,
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
        }
    }

    /// Cache in `config.cache_dir`, or `<user cache dir>/dubsplice`
    pub fn from_config(config: &PipelineConfig) -> Self {
        if !config.cache_enabled {
            return Self::disabled();
        }
        match config
            .cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("dubsplice")))
        {
            Some(root) => Self::at(root),
            None => {
                warn!("No cache directory available, artifact caching disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn path_for(&self, fingerprint: &Fingerprint, extension: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| {
            root.join(fingerprint.stage.as_str())
                .join(format!("{}.{}", fingerprint.digest, extension))
        })
    }

    fn record(&self, hit: bool, fingerprint: &Fingerprint) {
        if hit {
            *self.hits.write() += 1;
            debug!("Cache hit for {} {}", fingerprint.stage, &fingerprint.digest[..12]);
        } else {
            *self.misses.write() += 1;
            debug!("Cache miss for {} {}", fingerprint.stage, &fingerprint.digest[..12]);
        }
    }

    /// Cached audio, if present and readable
    pub fn load_audio(&self, fingerprint: &Fingerprint) -> Option<AudioBuffer> {
        let path = self.path_for(fingerprint, "wav")?;
        let loaded = if path.exists() {
            match read_wav(&path) {
                Ok(audio) => Some(audio),
                Err(e) => {
                    warn!("Ignoring unreadable cache entry {:?}: {}", path, e);
                    None
                }
            }
        } else {
            None
        };
        self.record(loaded.is_some(), fingerprint);
        loaded
    }

    pub fn store_audio(&self, fingerprint: &Fingerprint, audio: &AudioBuffer) -> Result<(), PipelineError> {
        let Some(path) = self.path_for(fingerprint, "wav") else {
            return Ok(());
        };
        let temp = Self::temp_file_beside(&path)?;
        write_wav(temp.path(), audio, WavEncoding::Float32)?;
        Self::persist(temp, &path)
    }

    /// Cached JSON value, if present and parseable
    pub fn load_json<T: DeserializeOwned>(&self, fingerprint: &Fingerprint) -> Option<T> {
        let path = self.path_for(fingerprint, "json")?;
        let loaded = if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(PipelineError::from)
                .and_then(|content| serde_json::from_str(&content).map_err(PipelineError::from))
            {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring unreadable cache entry {:?}: {}", path, e);
                    None
                }
            }
        } else {
            None
        };
        self.record(loaded.is_some(), fingerprint);
        loaded
    }

    pub fn store_json<T: Serialize>(&self, fingerprint: &Fingerprint, value: &T) -> Result<(), PipelineError> {
        let Some(path) = self.path_for(fingerprint, "json") else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(value)?;
        let temp = Self::temp_file_beside(&path)?;
        std::fs::write(temp.path(), content)?;
        Self::persist(temp, &path)
    }

    fn temp_file_beside(path: &Path) -> Result<NamedTempFile, PipelineError> {
        let dir = path
            .parent()
            .ok_or_else(|| PipelineError::Cache(format!("Cache path {:?} has no parent", path)))?;
        std::fs::create_dir_all(dir)?;
        Ok(NamedTempFile::new_in(dir)?)
    }

    fn persist(temp: NamedTempFile, path: &Path) -> Result<(), PipelineError> {
        temp.persist(path)
            .map_err(|e| PipelineError::Cache(format!("Failed to store {:?}: {}", path, e)))?;
        debug!("Stored cache entry {:?}", path);
        Ok(())
    }

    /// (hits, misses, hit rate)
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::disabled()
    }
}
