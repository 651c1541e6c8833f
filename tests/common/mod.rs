/*!
 * Common test utilities for the dubsplice test suite
 */

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use dubsplice::app_config::Config;
use dubsplice::audio::{dsp, AudioBuffer};
use dubsplice::pipeline::{ArtifactCache, Collaborators, RetryPolicy, RunContext};
use dubsplice::providers::mock::{MockAdClassifier, MockBehavior, MockStemSeparator, MockSynthesizer, MockTranslator};
use dubsplice::providers::MediaSource;
use dubsplice::splice::AdInterval;
use dubsplice::timeline::{SegmentStore, TranscriptSegment};

pub const SAMPLE_RATE: u32 = 8_000;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    std::fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Route engine logs to the test output; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A low constant hum of `secs` seconds
pub fn test_media(id: &str, secs: f64) -> MediaSource {
    let samples = dsp::sine(110.0, secs, SAMPLE_RATE, 0.2);
    MediaSource::new(id, AudioBuffer::new(samples, SAMPLE_RATE))
}

/// Segments from `(start, end, text)` triples, numbered from 1
pub fn segment_store(spans: &[(f64, f64, &str)]) -> SegmentStore {
    let segments = spans
        .iter()
        .enumerate()
        .map(|(i, (start, end, text))| TranscriptSegment::new(i + 1, *start, *end, text).unwrap())
        .collect();
    SegmentStore::new(segments).unwrap()
}

/// The two segments shared by most scenarios
pub fn hello_world() -> SegmentStore {
    segment_store(&[(0.0, 5.0, "hello"), (5.0, 10.0, "world")])
}

pub fn ad(start: f64, end: f64) -> AdInterval {
    AdInterval::new(start, end, 1.0, "test").unwrap()
}

/// Mock collaborators; the individual mocks are returned too so tests can
/// read their call counters
pub struct MockSet {
    pub translator: MockTranslator,
    pub synthesizer: MockSynthesizer,
    pub separator: MockStemSeparator,
    pub classifier: MockAdClassifier,
}

impl MockSet {
    pub fn new(synthesizer: MockSynthesizer, ads: Vec<AdInterval>) -> Self {
        Self {
            translator: MockTranslator::working(),
            synthesizer,
            separator: MockStemSeparator::working(),
            classifier: MockAdClassifier::with_intervals(ads),
        }
    }

    pub fn with_translator(mut self, behavior: MockBehavior) -> Self {
        self.translator = MockTranslator::new(behavior);
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            translator: Arc::new(self.translator.clone()),
            synthesizer: Arc::new(self.synthesizer.clone()),
            separator: Arc::new(self.separator.clone()),
            classifier: Arc::new(self.classifier.clone()),
        }
    }

    /// Total collaborator calls so far
    pub fn total_calls(&self) -> usize {
        self.translator.calls() + self.synthesizer.calls() + self.separator.calls() + self.classifier.calls()
    }
}

/// Context without caching or retry delays
pub fn test_context() -> RunContext {
    init_logging();
    let mut config = Config::default();
    config.pipeline.cache_enabled = false;
    RunContext::from_config(config)
        .with_cache(ArtifactCache::disabled())
        .with_retry(RetryPolicy::none())
}

/// Context caching into `dir`
pub fn cached_context(dir: &Path) -> RunContext {
    test_context().with_cache(ArtifactCache::at(dir.to_path_buf()))
}
