/*!
 * Tests for app configuration functionality
 */

use anyhow::Result;

use dubsplice::app_config::{Config, LogLevel};

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let dir = create_temp_dir()?;
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    assert_eq!(config, Config::default());
    let reloaded = Config::load_or_create(&path)?;
    assert_eq!(reloaded, config);
    Ok(())
}

#[test]
fn test_loadOrCreate_withPartialFile_shouldKeepOverrides() -> Result<()> {
    let dir = create_temp_dir()?;
    let path = create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "reconcile": { "max_compression": 1.2 },
            "splice": { "merge_gap_ms": 1000, "min_ad_confidence": 0.6 },
            "pipeline": { "concurrency": 8, "cache_enabled": false },
            "log_level": "warn"
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.reconcile.max_compression, 1.2);
    assert_eq!(config.reconcile.tolerance_ms, 150);
    assert_eq!(config.splice.merge_gap_ms, 1000);
    assert_eq!(config.splice.min_ad_confidence, 0.6);
    assert_eq!(config.pipeline.concurrency, 8);
    assert!(!config.pipeline.cache_enabled);
    assert_eq!(config.log_level, LogLevel::Warn);
    assert!(config.validate().is_ok());
    Ok(())
}

#[test]
fn test_loadOrCreate_withMalformedFile_shouldFail() -> Result<()> {
    let dir = create_temp_dir()?;
    let path = create_test_file(dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

#[test]
fn test_validate_withOutOfRangeValues_shouldFail() {
    let mut config = Config::default();
    config.compose.target_peak = 1.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.splice.min_ad_confidence = 2.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.pipeline.retry_count = 0;
    assert!(config.validate().is_err());
}
