use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::app_config::Config;
use crate::audio::wav::write_wav;
use crate::audio::WavEncoding;
use crate::job::JobManifest;
use crate::pipeline::{PipelineDriver, PipelineProgress, RunContext, RunReport};
use crate::splice::{CutList, SplicePlanner};
use crate::timeline::TimeSpan;

// @module: Application controller for dubbing jobs

/// Options of a single `run` invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overwrite outputs that already exist
    pub force_overwrite: bool,
    /// Replace translation and synthesis with deterministic mocks
    pub dry_run: bool,
    /// Write outputs here instead of the manifest's output dir
    pub output_dir: Option<PathBuf>,
}

/// Paths written by a finished job
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutputs {
    pub audio: PathBuf,
    pub splice_map: PathBuf,
    pub cut_list: PathBuf,
    pub transcript: PathBuf,
    pub report: PathBuf,
}

impl JobOutputs {
    fn in_dir(dir: &Path, media_id: &str) -> Self {
        Self {
            audio: dir.join(format!("{}.dub.wav", media_id)),
            splice_map: dir.join(format!("{}.splice_map.json", media_id)),
            cut_list: dir.join(format!("{}.cuts.json", media_id)),
            transcript: dir.join(format!("{}.dub.srt", media_id)),
            report: dir.join(format!("{}.report.json", media_id)),
        }
    }
}

/// Cut list as written for the muxer, with ready-made ffmpeg filters
#[derive(Debug, Serialize)]
struct CutListFile<'a> {
    video: Option<&'a Path>,
    keep: &'a [TimeSpan],
    output_duration: f64,
    video_filter: String,
    audio_filter: String,
}

impl<'a> CutListFile<'a> {
    fn new(cuts: &'a CutList, video: Option<&'a Path>) -> Self {
        Self {
            video,
            keep: &cuts.keep,
            output_duration: cuts.output_duration,
            video_filter: cuts.video_filter(),
            audio_filter: cuts.audio_filter(),
        }
    }
}

/// Main application controller for dubbing jobs
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a job manifest end to end and write its outputs
    pub async fn run(&self, manifest_path: &Path, options: &RunOptions) -> Result<Option<JobOutputs>> {
        let start_time = std::time::Instant::now();
        let manifest = JobManifest::load(manifest_path)?;
        let output_dir = options.output_dir.clone().unwrap_or_else(|| manifest.output_dir());
        let outputs = JobOutputs::in_dir(&output_dir, &manifest.media_id);

        if outputs.audio.exists() && !options.force_overwrite {
            warn!(
                "Skipping {}, output already exists (use -f to force overwrite)",
                manifest.media_id
            );
            return Ok(None);
        }

        let media = manifest.load_media()?;
        let segments = manifest.load_segments()?;
        let collaborators = manifest.collaborators(media.sample_rate(), options.dry_run)?;
        info!(
            "Job {}: {:.1}s of audio, {} segment(s){}",
            manifest.media_id,
            media.duration(),
            segments.len(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        let progress_bar = ProgressBar::new(segments.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message("Synthesizing");

        let pb = progress_bar.clone();
        let driver = PipelineDriver::new(RunContext::from_config(self.config.clone()), collaborators).with_progress(
            Arc::new(move |event: PipelineProgress| match event {
                PipelineProgress::SegmentFinished { completed, .. } => pb.set_position(completed as u64),
                PipelineProgress::StageStarted(stage) => pb.set_message(format!("{}", stage)),
                PipelineProgress::StageFinished(_) => {}
            }),
        );

        let result = driver.run(&media, &segments).await;
        progress_bar.finish_and_clear();
        let report = result.with_context(|| format!("Job {} failed", manifest.media_id))?;

        for warning in &report.overflow_warnings {
            warn!("{}", warning);
        }
        for fallback in &report.fallbacks {
            warn!(
                "Segment {} kept its original voice ({}): {}",
                fallback.segment_id, fallback.stage, fallback.reason
            );
        }

        self.write_outputs(&outputs, &report, manifest.video.as_deref())?;

        info!("{}", report.summary());
        info!(
            "Success: {:?} ({:.1}s)",
            outputs.audio,
            start_time.elapsed().as_secs_f64()
        );
        Ok(Some(outputs))
    }

    /// Plan the ad splice of a job without touching audio
    pub async fn plan(&self, manifest_path: &Path) -> Result<CutList> {
        let manifest = JobManifest::load(manifest_path)?;
        let segments = manifest.load_segments()?;
        let media = manifest.load_media()?;
        let collaborators = manifest.collaborators(media.sample_rate(), true)?;

        let ads = collaborators
            .classifier
            .classify(&segments)
            .await
            .map_err(|e| anyhow!("Ad classification failed: {}", e))?;
        let map = SplicePlanner::new(&self.config.splice).plan(&segments, &ads, media.duration())?;

        for segment in &map.kept_segments {
            info!(
                "Segment {}.{}: {} -> {}",
                segment.segment_id, segment.part, segment.original_span, segment.remapped_span
            );
        }
        Ok(map.cut_list())
    }

    /// Run every `*.job.json` manifest below `dir`; failures are logged and
    /// do not stop the others
    pub async fn run_folder(&self, dir: &Path, options: &RunOptions) -> Result<usize> {
        let manifests: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy().ends_with(".job.json"))
            .map(|e| e.into_path())
            .collect();

        if manifests.is_empty() {
            return Err(anyhow!("No *.job.json manifests found in {:?}", dir));
        }

        let mut processed = 0;
        for manifest in &manifests {
            match self.run(manifest, options).await {
                Ok(_) => processed += 1,
                Err(e) => log::error!("Error processing {:?}: {:#}", manifest, e),
            }
        }
        info!("Finished processing {} of {} jobs", processed, manifests.len());
        Ok(processed)
    }

    fn write_outputs(&self, outputs: &JobOutputs, report: &RunReport, video: Option<&Path>) -> Result<()> {
        write_wav(&outputs.audio, &report.track.audio, WavEncoding::Pcm16)
            .with_context(|| format!("Failed to write {:?}", outputs.audio))?;

        let splice_map = report.splice_map.to_json()?;
        std::fs::write(&outputs.splice_map, splice_map)
            .with_context(|| format!("Failed to write {:?}", outputs.splice_map))?;

        let cuts = CutListFile::new(&report.track.cut_list, video);
        std::fs::write(&outputs.cut_list, serde_json::to_string_pretty(&cuts)?)
            .with_context(|| format!("Failed to write {:?}", outputs.cut_list))?;

        std::fs::write(&outputs.transcript, report.splice_map.transcript_srt(true))
            .with_context(|| format!("Failed to write {:?}", outputs.transcript))?;

        std::fs::write(&outputs.report, serde_json::to_string_pretty(report)?)
            .with_context(|| format!("Failed to write {:?}", outputs.report))?;
        Ok(())
    }
}
