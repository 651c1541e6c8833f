use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the engine configuration including loading,
/// validating and saving configuration settings.
/// Represents the engine configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Duration reconciliation thresholds
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Ad splice thresholds
    #[serde(default)]
    pub splice: SpliceConfig,

    /// Compositor settings
    #[serde(default)]
    pub compose: ComposeConfig,

    /// Driver settings (concurrency, retries, cache)
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// How synthesized clips are fitted into their segment windows
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Duration difference (ms) under which a clip is placed on the
    /// segment span unchanged
    #[serde(default = "default_tolerance_ms")]
    pub tolerance_ms: u64,

    /// Distance (ms) kept free before the next segment's start when a clip
    /// is extended into the following gap
    #[serde(default = "default_guard_ms")]
    pub guard_ms: u64,

    /// Maximum pitch-preserving compression factor (1.3 = 30% faster)
    #[serde(default = "default_max_compression")]
    pub max_compression: f64,

    /// Analysis frame length (ms) of the time-scale compressor
    #[serde(default = "default_stretch_frame_ms")]
    pub stretch_frame_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: default_tolerance_ms(),
            guard_ms: default_guard_ms(),
            max_compression: default_max_compression(),
            stretch_frame_ms: default_stretch_frame_ms(),
        }
    }
}

impl ReconcileConfig {
    pub fn tolerance_secs(&self) -> f64 {
        self.tolerance_ms as f64 / 1000.0
    }

    pub fn guard_secs(&self) -> f64 {
        self.guard_ms as f64 / 1000.0
    }
}

/// How ad interval candidates are normalized before splicing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpliceConfig {
    /// Ad intervals closer than this (ms) are merged into one cut
    #[serde(default = "default_merge_gap_ms")]
    pub merge_gap_ms: u64,

    /// Candidates below this classifier confidence are ignored
    #[serde(default)]
    pub min_ad_confidence: f32,

    /// Segment fragments shorter than this (ms) are dropped after splitting
    #[serde(default = "default_min_fragment_ms")]
    pub min_fragment_ms: u64,
}

impl Default for SpliceConfig {
    fn default() -> Self {
        Self {
            merge_gap_ms: default_merge_gap_ms(),
            min_ad_confidence: 0.0,
            min_fragment_ms: default_min_fragment_ms(),
        }
    }
}

/// Timeline compositor settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ComposeConfig {
    /// Crossfade length (ms) at splice points and clip edges
    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: u64,

    /// Gain applied to the original vocal stem under a dubbed clip
    #[serde(default)]
    pub duck_gain: f32,

    /// Peak level the final mix is scaled down to when exceeded
    #[serde(default = "default_target_peak")]
    pub target_peak: f32,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            crossfade_ms: default_crossfade_ms(),
            duck_gain: 0.0,
            target_peak: default_target_peak(),
        }
    }
}

/// Pipeline driver settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum number of segments translated/synthesized at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per collaborator call before the stage fails
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Whether intermediate artifacts are cached on disk
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Cache directory; defaults to the user cache dir
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Voice profile passed to the speech synthesizer
    #[serde(default = "default_voice_profile")]
    pub voice_profile: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            cache_enabled: true,
            cache_dir: None,
            voice_profile: default_voice_profile(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_tolerance_ms() -> u64 {
    150
}

fn default_guard_ms() -> u64 {
    20
}

fn default_max_compression() -> f64 {
    1.3
}

fn default_stretch_frame_ms() -> u64 {
    30
}

fn default_merge_gap_ms() -> u64 {
    500
}

fn default_min_fragment_ms() -> u64 {
    50
}

fn default_crossfade_ms() -> u64 {
    20
}

fn default_target_peak() -> f32 {
    0.98
}

fn default_concurrency() -> usize {
    4
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_voice_profile() -> String {
    "default".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if !(self.reconcile.max_compression >= 1.0 && self.reconcile.max_compression <= 4.0) {
            return Err(anyhow!(
                "reconcile.max_compression must be within [1.0, 4.0], got {}",
                self.reconcile.max_compression
            ));
        }

        if self.reconcile.stretch_frame_ms < 5 {
            return Err(anyhow!("reconcile.stretch_frame_ms must be at least 5ms"));
        }

        if !(0.0..=1.0).contains(&self.splice.min_ad_confidence) {
            return Err(anyhow!("splice.min_ad_confidence must be within [0, 1]"));
        }

        if !(0.0..=1.0).contains(&self.compose.duck_gain) {
            return Err(anyhow!("compose.duck_gain must be within [0, 1]"));
        }

        if !(self.compose.target_peak > 0.0 && self.compose.target_peak <= 1.0) {
            return Err(anyhow!("compose.target_peak must be within (0, 1]"));
        }

        if self.pipeline.concurrency == 0 {
            return Err(anyhow!("pipeline.concurrency must be greater than zero"));
        }

        if self.pipeline.retry_count == 0 {
            return Err(anyhow!("pipeline.retry_count must allow at least one attempt"));
        }

        Ok(())
    }

    /// Load the configuration file, creating a default one if it doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        if config_path.exists() {
            let file = File::open(config_path)
                .with_context(|| format!("Failed to open config file: {:?}", config_path))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", config_path))?;

        Ok(config)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            reconcile: ReconcileConfig::default(),
            splice: SpliceConfig::default(),
            compose: ComposeConfig::default(),
            pipeline: PipelineConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
