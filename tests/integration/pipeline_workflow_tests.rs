/*!
 * End-to-end runs through the pipeline driver with mock collaborators
 */

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use dubsplice::errors::PipelineError;
use dubsplice::pipeline::{CancellationFlag, PipelineDriver, PipelineProgress, RetryPolicy, Stage};
use dubsplice::providers::mock::{MockBehavior, MockStemSeparator, MockSynthesizer};
use dubsplice::reconcile::ReconcileDecision;
use dubsplice::timeline::{SegmentStore, TranscriptSegment};

use crate::common::{ad, hello_world, segment_store, test_context, test_media, MockSet, SAMPLE_RATE};

fn scenario_a_synthesizer() -> MockSynthesizer {
    MockSynthesizer::working(SAMPLE_RATE)
        .with_duration(1, 5.0)
        .with_duration(2, 4.8)
}

#[tokio::test]
async fn test_run_withoutAds_shouldKeepFullDurationAndPadShortClip() {
    let mocks = MockSet::new(scenario_a_synthesizer(), Vec::new());
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let report = driver.run(&test_media("scenario-a", 10.0), &hello_world()).await.unwrap();

    assert!((report.track.duration() - 10.0).abs() < 1e-6);
    assert_eq!(
        report.decisions,
        vec![(1, ReconcileDecision::WithinTolerance), (2, ReconcileDecision::Padded)]
    );
    assert_eq!(report.track.replaced_segments, vec![1, 2]);
    assert!(report.fallbacks.is_empty());
    assert!(report.overflow_warnings.is_empty());
    assert_eq!(mocks.translator.calls(), 2);
    assert_eq!(mocks.synthesizer.calls(), 2);
}

#[tokio::test]
async fn test_run_withAdAcrossBoundary_shouldSpliceAndRemap() {
    let mocks = MockSet::new(scenario_a_synthesizer(), vec![ad(4.0, 6.0)]);
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let report = driver.run(&test_media("scenario-b", 10.0), &hello_world()).await.unwrap();

    assert!((report.track.duration() - 8.0).abs() < 1e-6);
    let spans: Vec<(f64, f64, f64, f64)> = report
        .splice_map
        .kept_segments
        .iter()
        .map(|s| {
            (
                s.original_span.start,
                s.original_span.end,
                s.remapped_span.start,
                s.remapped_span.end,
            )
        })
        .collect();
    assert_eq!(spans.len(), 2);
    assert_eq!((spans[0].0, spans[0].1), (0.0, 4.0));
    assert_eq!((spans[1].0, spans[1].1), (6.0, 10.0));
    assert!((spans[1].2 - 4.0).abs() < 1e-9 && (spans[1].3 - 8.0).abs() < 1e-9);
    assert!((report.track.cut_list.output_duration - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_run_withOverflowIntoGap_shouldNotReportDebt() {
    let segments = segment_store(&[(0.0, 3.0, "first"), (3.5, 6.0, "second")]);
    let synthesizer = MockSynthesizer::working(SAMPLE_RATE)
        .with_duration(1, 4.5)
        .with_duration(2, 2.5);
    let mocks = MockSet::new(synthesizer, Vec::new());
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let report = driver.run(&test_media("scenario-c", 6.0), &segments).await.unwrap();

    assert_eq!(report.decisions[0], (1, ReconcileDecision::Compressed));
    assert!(report.overflow_warnings.is_empty());
    assert!(report.track.warnings.is_empty());
    assert!((report.track.duration() - 6.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_run_withAdCoveringMedia_shouldFailWithEmptyOutput() {
    let mocks = MockSet::new(scenario_a_synthesizer(), vec![ad(0.0, 10.0)]);
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let result = driver.run(&test_media("scenario-d", 10.0), &hello_world()).await;

    assert!(matches!(result, Err(PipelineError::EmptyOutputAfterSplice { .. })));
}

#[tokio::test]
async fn test_run_withFailingSegment_shouldFallBackToOriginalVoice() {
    let synthesizer = MockSynthesizer::new(MockBehavior::FailingFor(vec![2]), SAMPLE_RATE);
    let mocks = MockSet::new(synthesizer, Vec::new());
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let report = driver.run(&test_media("isolation", 10.0), &hello_world()).await.unwrap();

    assert_eq!(report.fallbacks.len(), 1);
    assert_eq!(report.fallbacks[0].segment_id, 2);
    assert_eq!(report.fallbacks[0].stage, Stage::Synthesis);
    assert_eq!(report.track.replaced_segments, vec![1]);
    assert!((report.track.duration() - 10.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_run_withFailingTranslator_shouldKeepEverySegmentOriginal() {
    let mocks = MockSet::new(MockSynthesizer::working(SAMPLE_RATE), Vec::new()).with_translator(MockBehavior::Failing);
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let report = driver.run(&test_media("no-translation", 10.0), &hello_world()).await.unwrap();

    assert_eq!(report.fallbacks.len(), 2);
    assert!(report.fallbacks.iter().all(|f| f.stage == Stage::Translation));
    assert!(report.track.replaced_segments.is_empty());
    assert_eq!(mocks.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_run_withExistingTranslations_shouldSkipTranslator() {
    let segments = SegmentStore::new(vec![
        TranscriptSegment::new(1, 0.0, 5.0, "hallo").unwrap().with_translation("hello"),
        TranscriptSegment::new(2, 5.0, 10.0, "welt").unwrap().with_translation("world"),
    ])
    .unwrap();
    let mocks = MockSet::new(MockSynthesizer::working(SAMPLE_RATE), Vec::new()).with_translator(MockBehavior::Failing);
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let report = driver.run(&test_media("pretranslated", 10.0), &segments).await.unwrap();

    assert!(report.fallbacks.is_empty());
    assert_eq!(mocks.translator.calls(), 0);
    assert_eq!(mocks.synthesizer.calls(), 2);
}

#[tokio::test]
async fn test_run_withIntermittentSynthesizer_shouldRetryAndSucceed() {
    let synthesizer = MockSynthesizer::new(MockBehavior::Intermittent { fail_every: 2 }, SAMPLE_RATE);
    let mocks = MockSet::new(synthesizer, Vec::new());
    let mut context = test_context().with_retry(RetryPolicy::new(
        3,
        Duration::from_millis(1),
        Duration::from_millis(5),
    ));
    context.config.pipeline.concurrency = 1;
    let driver = PipelineDriver::new(context, mocks.collaborators());

    let report = driver.run(&test_media("retry", 10.0), &hello_world()).await.unwrap();

    assert!(report.fallbacks.is_empty());
    assert_eq!(report.track.replaced_segments, vec![1, 2]);
    assert_eq!(mocks.synthesizer.calls(), 3);
}

#[tokio::test]
async fn test_run_withFailingSeparator_shouldHaltAtStemSeparation() {
    let mut mocks = MockSet::new(MockSynthesizer::working(SAMPLE_RATE), Vec::new());
    mocks.separator = MockStemSeparator::new(MockBehavior::Failing);
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let result = driver.run(&test_media("no-stems", 10.0), &hello_world()).await;

    assert!(matches!(
        result,
        Err(PipelineError::StageFailed {
            stage: Stage::StemSeparation,
            ..
        })
    ));
}

#[tokio::test]
async fn test_run_whenCancelled_shouldStopWithCancelled() {
    let mocks = MockSet::new(MockSynthesizer::working(SAMPLE_RATE), Vec::new());
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let driver = PipelineDriver::new(test_context().with_cancellation(cancel), mocks.collaborators());

    let result = driver.run(&test_media("cancelled", 10.0), &hello_world()).await;

    assert!(matches!(result, Err(PipelineError::Cancelled(_))));
    assert_eq!(mocks.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_run_withForeignClipRate_shouldResampleToTrackRate() {
    let synthesizer = MockSynthesizer::working(SAMPLE_RATE * 2)
        .with_duration(1, 5.0)
        .with_duration(2, 5.0);
    let mocks = MockSet::new(synthesizer, Vec::new());
    let driver = PipelineDriver::new(test_context(), mocks.collaborators());

    let report = driver.run(&test_media("resample", 10.0), &hello_world()).await.unwrap();

    assert_eq!(report.track.audio.sample_rate, SAMPLE_RATE);
    assert!((report.track.duration() - 10.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_run_withProgressCallback_shouldReportEverySegment() {
    let events: Arc<Mutex<Vec<PipelineProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mocks = MockSet::new(scenario_a_synthesizer(), Vec::new());
    let driver = PipelineDriver::new(test_context(), mocks.collaborators())
        .with_progress(Arc::new(move |event: PipelineProgress| sink.lock().push(event)));

    driver.run(&test_media("progress", 10.0), &hello_world()).await.unwrap();

    let events = events.lock();
    let finished: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            PipelineProgress::SegmentFinished { completed, total } => {
                assert_eq!(*total, 2);
                Some(*completed)
            }
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![1, 2]);
    assert_eq!(events.last(), Some(&PipelineProgress::StageFinished(Stage::Composition)));
}
