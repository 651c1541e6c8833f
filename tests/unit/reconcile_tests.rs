/*!
 * Tests for duration reconciliation across whole segment stores
 */

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dubsplice::app_config::ReconcileConfig;
use dubsplice::audio::dsp;
use dubsplice::reconcile::{check_no_overlap, reconcile_all, DurationReconciler, ReconcileDecision, SynthesizedClip};
use dubsplice::timeline::{SegmentStore, TranscriptSegment};

use crate::common::{segment_store, SAMPLE_RATE};

fn reconciler() -> Arc<DurationReconciler> {
    Arc::new(DurationReconciler::new(&ReconcileConfig::default(), SAMPLE_RATE))
}

fn tone(segment_id: usize, secs: f64) -> SynthesizedClip {
    SynthesizedClip::new(segment_id, dsp::sine(220.0, secs, SAMPLE_RATE, 0.3), SAMPLE_RATE)
}

fn random_case(rng: &mut StdRng) -> (SegmentStore, Vec<SynthesizedClip>, f64) {
    let mut segments = Vec::new();
    let mut clips = Vec::new();
    let mut t = 0.0;
    for id in 1..=rng.random_range(2..8) {
        let duration = rng.random_range(0.5..3.0);
        segments.push(TranscriptSegment::new(id, t, t + duration, "text").unwrap());
        // anything from much shorter to far too long
        clips.push(tone(id, duration * rng.random_range(0.5..2.5)));
        t += duration + rng.random_range(0.0..1.0);
    }
    (SegmentStore::new(segments).unwrap(), clips, t + 1.0)
}

#[tokio::test]
async fn test_reconcileAll_withRandomClips_shouldNeverOverlap() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..25 {
        let (segments, clips, media) = random_case(&mut rng);
        let outcome = reconcile_all(reconciler(), &segments, clips, media, 4).await.unwrap();

        check_no_overlap(&outcome.clips).unwrap();
        for (index, segment) in segments.iter().enumerate() {
            let clip = outcome.clips.iter().find(|c| c.segment_id == segment.id).unwrap();
            assert!((clip.placed_span.start - segment.span.start).abs() < 1e-9);
            assert!(clip.placed_span.end <= segments.next_boundary(index, media) + 1e-9);
            let placed_samples = (clip.placed_span.duration() * SAMPLE_RATE as f64).round() as i64;
            assert!((clip.audio_samples.len() as i64 - placed_samples).abs() <= 1);
        }
    }
}

#[tokio::test]
async fn test_reconcileAll_withRandomClips_shouldReportDebtOnlyWhenTruncated() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..25 {
        let (segments, clips, media) = random_case(&mut rng);
        let outcome = reconcile_all(reconciler(), &segments, clips, media, 2).await.unwrap();

        for clip in &outcome.clips {
            assert!(clip.overflow_debt >= 0.0);
            if clip.decision != ReconcileDecision::Truncated {
                assert_eq!(clip.overflow_debt, 0.0);
            }
            assert!(clip.compression >= 1.0 && clip.compression <= 1.3 + 1e-9);
        }
        let truncated = outcome
            .clips
            .iter()
            .filter(|c| c.decision == ReconcileDecision::Truncated)
            .count();
        assert_eq!(outcome.warnings.len(), truncated);
    }
}

#[tokio::test]
async fn test_reconcileAll_withOverflowIntoGap_shouldAbsorbWithoutDebt() {
    // 3 s slot, next segment 0.5 s later, 4.5 s of speech
    let segments = segment_store(&[(0.0, 3.0, "first"), (3.5, 6.0, "second")]);
    let clips = vec![tone(1, 4.5), tone(2, 2.5)];

    let outcome = reconcile_all(reconciler(), &segments, clips, 6.0, 2).await.unwrap();

    let first = &outcome.clips[0];
    assert_eq!(first.decision, ReconcileDecision::Compressed);
    assert_eq!(first.overflow_debt, 0.0);
    assert!(first.placed_span.end <= 3.5);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_reconcileAll_isDeterministic() {
    let mut rng = StdRng::seed_from_u64(5);
    let (segments, clips, media) = random_case(&mut rng);

    let first = tokio_test::block_on(reconcile_all(reconciler(), &segments, clips.clone(), media, 4)).unwrap();
    let second = tokio_test::block_on(reconcile_all(reconciler(), &segments, clips, media, 1)).unwrap();
    assert_eq!(first.clips, second.clips);
}
