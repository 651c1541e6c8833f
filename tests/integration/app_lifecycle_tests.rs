/*!
 * Job manifests run through the application controller
 */

use std::path::{Path, PathBuf};

use anyhow::Result;

use dubsplice::app_config::Config;
use dubsplice::app_controller::{Controller, JobOutputs, RunOptions};
use dubsplice::audio::wav::{read_wav, write_wav};
use dubsplice::audio::{dsp, AudioBuffer, WavEncoding};
use dubsplice::splice::SpliceMap;

use crate::common::{create_temp_dir, create_test_file, SAMPLE_RATE};

const TRANSCRIPT: &str = "1
00:00:00,000 --> 00:00:05,000
Hallo zusammen.

2
00:00:05,000 --> 00:00:10,000
Willkommen zur Sendung.
";

const TRANSLATED_TRANSCRIPT: &str = "1
00:00:00,000 --> 00:00:05,000
Hello everyone.

2
00:00:05,000 --> 00:00:10,000
Welcome to the show.
";

const ADS_REPORT: &str = r#"{
  "ad_segments": [
    { "start_time": 4.0, "end_time": 6.0, "reason": "sponsor read" }
  ]
}"#;

fn write_tone(path: &Path, secs: f64, level: f32) -> Result<()> {
    let audio = AudioBuffer::new(dsp::sine(110.0, secs, SAMPLE_RATE, level), SAMPLE_RATE);
    write_wav(path, &audio, WavEncoding::Pcm16)?;
    Ok(())
}

/// Writes a complete job under `dir` and returns the manifest path
fn create_job(dir: &Path, media_id: &str) -> Result<PathBuf> {
    create_job_with_ads(dir, media_id, ADS_REPORT)
}

fn create_job_with_ads(dir: &Path, media_id: &str, ads_report: &str) -> Result<PathBuf> {
    write_tone(&dir.join(format!("{}.wav", media_id)), 10.0, 0.3)?;
    write_tone(&dir.join(format!("{}.vocals.wav", media_id)), 10.0, 0.15)?;
    write_tone(&dir.join(format!("{}.background.wav", media_id)), 10.0, 0.15)?;
    create_test_file(dir, &format!("{}.srt", media_id), TRANSCRIPT)?;
    create_test_file(dir, &format!("{}.ads.json", media_id), ads_report)?;

    let manifest = format!(
        r#"{{
  "media_id": "{id}",
  "audio": "{id}.wav",
  "transcript": "{id}.srt",
  "video": "{id}.mp4",
  "stems": {{ "vocal": "{id}.vocals.wav", "background": "{id}.background.wav" }},
  "ads_report": "{id}.ads.json"
}}"#,
        id = media_id
    );
    create_test_file(dir, &format!("{}.job.json", media_id), &manifest)
}

/// A job with a translated transcript and rendered clips of 5.0s and 4.0s
fn create_rendered_job(dir: &Path, media_id: &str) -> Result<PathBuf> {
    create_job(dir, media_id)?;
    create_test_file(dir, &format!("{}.en.srt", media_id), TRANSLATED_TRANSCRIPT)?;
    let clips = dir.join("tts");
    write_tone(&clips.join("segment_0000.wav"), 5.0, 0.4)?;
    write_tone(&clips.join("segment_0001.wav"), 4.0, 0.4)?;

    let manifest = format!(
        r#"{{
  "media_id": "{id}",
  "audio": "{id}.wav",
  "transcript": "{id}.srt",
  "translated_transcript": "{id}.en.srt",
  "clips_dir": "tts",
  "stems": {{ "vocal": "{id}.vocals.wav", "background": "{id}.background.wav" }},
  "ads_report": "{id}.ads.json"
}}"#,
        id = media_id
    );
    create_test_file(dir, &format!("{}.job.json", media_id), &manifest)
}

fn controller() -> Result<Controller> {
    let mut config = Config::default();
    config.pipeline.cache_enabled = false;
    config.pipeline.retry_count = 1;
    Controller::with_config(config)
}

fn cached_controller(cache_dir: &Path) -> Result<Controller> {
    let mut config = Config::default();
    config.pipeline.cache_enabled = true;
    config.pipeline.cache_dir = Some(cache_dir.to_path_buf());
    config.pipeline.retry_count = 1;
    Controller::with_config(config)
}

fn report_json(outputs: &JobOutputs) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(&std::fs::read_to_string(&outputs.report)?)?)
}

fn dry_run() -> RunOptions {
    RunOptions {
        dry_run: true,
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn test_run_withDryRun_shouldWriteEveryOutput() -> Result<()> {
    let dir = create_temp_dir()?;
    let manifest = create_job(dir.path(), "episode")?;

    let outputs = controller()?.run(&manifest, &dry_run()).await?.expect("job should run");

    let audio = read_wav(&outputs.audio)?;
    assert_eq!(audio.sample_rate, SAMPLE_RATE);
    assert!((audio.duration() - 8.0).abs() < 1e-3);

    let map: SpliceMap = serde_json::from_str(&std::fs::read_to_string(&outputs.splice_map)?)?;
    assert!((map.new_duration() - 8.0).abs() < 1e-9);
    assert_eq!(map.kept_segments.len(), 2);

    let cuts: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&outputs.cut_list)?)?;
    assert!(cuts["video"].as_str().unwrap_or_default().ends_with("episode.mp4"));
    assert!(cuts["video_filter"].as_str().unwrap_or_default().starts_with("select="));

    let srt = std::fs::read_to_string(&outputs.transcript)?;
    assert!(srt.contains("00:00:00,000 --> 00:00:04,000"));
    assert!(srt.contains("00:00:04,000 --> 00:00:08,000"));

    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&outputs.report)?)?;
    assert_eq!(report["media_id"], "episode");
    assert_eq!(report["fallbacks"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_run_withExistingOutput_shouldSkipUnlessForced() -> Result<()> {
    let dir = create_temp_dir()?;
    let manifest = create_job(dir.path(), "episode")?;
    let controller = controller()?;

    assert!(controller.run(&manifest, &dry_run()).await?.is_some());
    assert!(controller.run(&manifest, &dry_run()).await?.is_none());

    let forced = RunOptions {
        force_overwrite: true,
        ..dry_run()
    };
    assert!(controller.run(&manifest, &forced).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_run_withOutputDirOverride_shouldWriteThere() -> Result<()> {
    let dir = create_temp_dir()?;
    let manifest = create_job(dir.path(), "episode")?;
    let target = dir.path().join("elsewhere");
    let options = RunOptions {
        output_dir: Some(target.clone()),
        ..dry_run()
    };

    let outputs = controller()?.run(&manifest, &options).await?.expect("job should run");

    assert!(outputs.audio.starts_with(&target));
    assert!(outputs.audio.exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withoutClipsOrDryRun_shouldFail() -> Result<()> {
    let dir = create_temp_dir()?;
    let manifest = create_job(dir.path(), "episode")?;

    let result = controller()?.run(&manifest, &RunOptions::default()).await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_plan_shouldReturnCutListWithoutAudioOutputs() -> Result<()> {
    let dir = create_temp_dir()?;
    let manifest = create_job(dir.path(), "episode")?;

    let cuts = controller()?.plan(&manifest).await?;

    assert_eq!(cuts.keep.len(), 2);
    assert!((cuts.output_duration - 8.0).abs() < 1e-9);
    assert!(!dir.path().join("out").exists());
    Ok(())
}

#[tokio::test]
async fn test_runFolder_shouldProcessEveryManifest() -> Result<()> {
    let dir = create_temp_dir()?;
    create_job(dir.path(), "episode-1")?;
    create_job(dir.path(), "episode-2")?;

    let processed = controller()?.run_folder(dir.path(), &dry_run()).await?;

    assert_eq!(processed, 2);
    assert!(dir.path().join("out").join("episode-1.dub.wav").exists());
    assert!(dir.path().join("out").join("episode-2.dub.wav").exists());
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withoutManifests_shouldFail() -> Result<()> {
    let dir = create_temp_dir()?;
    assert!(controller()?.run_folder(dir.path(), &dry_run()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_run_afterDryRun_shouldUseRenderedClipsNotTestTones() -> Result<()> {
    let dir = create_temp_dir()?;
    let cache = create_temp_dir()?;
    let manifest = create_rendered_job(dir.path(), "episode")?;
    let controller = cached_controller(cache.path())?;

    let dry = controller.run(&manifest, &dry_run()).await?.expect("dry run should run");
    assert_eq!(report_json(&dry)?["decisions"][0][1], "padded");

    let real = RunOptions {
        force_overwrite: true,
        ..RunOptions::default()
    };
    let outputs = controller.run(&manifest, &real).await?.expect("job should run");

    let report = report_json(&outputs)?;
    assert_eq!(report["decisions"][0][1], "within_tolerance");
    assert_eq!(report["decisions"][1][1], "padded");
    assert_eq!(report["fallbacks"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_run_afterAdReportEdit_shouldApplyNewAds() -> Result<()> {
    let dir = create_temp_dir()?;
    let cache = create_temp_dir()?;
    let manifest = create_job(dir.path(), "episode")?;
    let controller = cached_controller(cache.path())?;

    let first = controller.run(&manifest, &dry_run()).await?.expect("job should run");
    assert!((read_wav(&first.audio)?.duration() - 8.0).abs() < 1e-3);

    create_test_file(dir.path(), "episode.ads.json", r#"{"ad_segments": []}"#)?;
    let forced = RunOptions {
        force_overwrite: true,
        ..dry_run()
    };
    let second = controller.run(&manifest, &forced).await?.expect("job should run");

    assert!((read_wav(&second.audio)?.duration() - 10.0).abs() < 1e-3);
    Ok(())
}

#[tokio::test]
async fn test_run_withAdCoveringMedia_shouldWriteNoOutput() -> Result<()> {
    let dir = create_temp_dir()?;
    let everything = r#"{"ad_segments": [{ "start_time": 0.0, "end_time": 10.0, "reason": "whole episode" }]}"#;
    let manifest = create_job_with_ads(dir.path(), "episode", everything)?;

    let result = controller()?.run(&manifest, &dry_run()).await;

    assert!(result.is_err());
    let out = dir.path().join("out");
    for name in ["episode.dub.wav", "episode.cuts.json", "episode.splice_map.json", "episode.dub.srt", "episode.report.json"] {
        assert!(!out.join(name).exists(), "{} should not be written", name);
    }
    Ok(())
}
