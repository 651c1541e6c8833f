/*!
 * Tests for the ad splice planner and the splice map it produces
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dubsplice::app_config::SpliceConfig;
use dubsplice::errors::PipelineError;
use dubsplice::splice::{AdInterval, SpliceMap, SplicePlanner};
use dubsplice::timeline::{SegmentStore, TranscriptSegment};

use crate::common::{ad, hello_world, segment_store};

const MEDIA_SECS: f64 = 60.0;

fn planner() -> SplicePlanner {
    SplicePlanner::new(&SpliceConfig::default())
}

/// Back-to-back segments with random lengths and small random gaps
fn random_segments(rng: &mut StdRng) -> SegmentStore {
    let mut segments = Vec::new();
    let mut t = rng.random_range(0.0..1.0);
    let mut id = 1;
    while t < MEDIA_SECS - 1.0 {
        let end = (t + rng.random_range(0.5..4.0)).min(MEDIA_SECS);
        segments.push(TranscriptSegment::new(id, t, end, &format!("segment {}", id)).unwrap());
        id += 1;
        t = end + rng.random_range(0.0..0.8);
    }
    SegmentStore::new(segments).unwrap()
}

/// Up to four ads of at most five seconds, possibly overlapping
fn random_ads(rng: &mut StdRng) -> Vec<AdInterval> {
    let count = rng.random_range(0..5);
    (0..count)
        .map(|_| {
            let start = rng.random_range(0.0..MEDIA_SECS - 1.0);
            let end = (start + rng.random_range(0.1..5.0)).min(MEDIA_SECS);
            AdInterval::new(start, end, rng.random_range(0.5..1.0), "random").unwrap()
        })
        .collect()
}

fn random_plans(seed: u64, count: usize) -> Vec<SpliceMap> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let segments = random_segments(&mut rng);
            let ads = random_ads(&mut rng);
            planner().plan(&segments, &ads, MEDIA_SECS).unwrap()
        })
        .collect()
}

#[test]
fn test_plan_withRandomInputs_shouldConserveDuration() {
    for map in random_plans(7, 50) {
        map.verify().unwrap();
        let total = map.new_duration() + map.removed_duration();
        assert!((total - MEDIA_SECS).abs() < 1e-6, "{} != {}", total, MEDIA_SECS);
    }
}

#[test]
fn test_remap_withRandomInputs_shouldBeMonotonic() {
    for map in random_plans(11, 50) {
        let mut previous = 0.0;
        for step in 0..=600 {
            let t = step as f64 * MEDIA_SECS / 600.0;
            let mapped = map.remap(t);
            assert!(mapped + 1e-9 >= previous, "remap({}) = {} < {}", t, mapped, previous);
            assert!(mapped <= map.new_duration() + 1e-9);
            previous = mapped;
        }
    }
}

#[test]
fn test_unmap_ofRemap_insideKeptSpans_shouldRoundTrip() {
    for map in random_plans(13, 50) {
        for span in &map.kept {
            for fraction in [0.0, 0.25, 0.5, 0.99] {
                let t = span.start + span.duration() * fraction;
                let back = map.unmap(map.remap(t));
                assert!((back - t).abs() < 1e-6, "unmap(remap({})) = {}", t, back);
            }
        }
    }
}

#[test]
fn test_keptSegments_withRandomInputs_shouldStayOrderedAndInsideOutput() {
    for map in random_plans(17, 50) {
        for pair in map.kept_segments.windows(2) {
            assert!(pair[0].remapped_span.end <= pair[1].remapped_span.start + 1e-9);
        }
        for segment in &map.kept_segments {
            assert!(segment.remapped_span.end <= map.new_duration() + 1e-9);
            assert!(map.removed.iter().all(|r| !r.overlaps(&segment.original_span)));
            let shift = segment.original_span.start - segment.remapped_span.start;
            assert!((segment.original_span.end - segment.remapped_span.end - shift).abs() < 1e-9);
        }
    }
}

#[test]
fn test_plan_twiceWithSameInputs_shouldBeIdentical() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..20 {
        let segments = random_segments(&mut rng);
        let ads = random_ads(&mut rng);
        let first = planner().plan(&segments, &ads, MEDIA_SECS).unwrap();
        let second = planner().plan(&segments, &ads, MEDIA_SECS).unwrap();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }
}

#[test]
fn test_plan_withAdAcrossSegmentBoundary_shouldSplitBothSegments() {
    let map = planner().plan(&hello_world(), &[ad(4.0, 6.0)], 10.0).unwrap();

    assert_eq!(map.kept_segments.len(), 2);
    let first = &map.kept_segments[0];
    let second = &map.kept_segments[1];
    assert_eq!((first.original_span.start, first.original_span.end), (0.0, 4.0));
    assert_eq!((second.original_span.start, second.original_span.end), (6.0, 10.0));
    assert!((second.remapped_span.start - 4.0).abs() < 1e-9);
    assert!((second.remapped_span.end - 8.0).abs() < 1e-9);
    assert!((map.new_duration() - 8.0).abs() < 1e-9);
}

#[test]
fn test_plan_withAdInsideSegment_shouldProduceTwoParts() {
    let segments = segment_store(&[(0.0, 10.0, "long monologue")]);
    let map = planner().plan(&segments, &[ad(3.0, 5.0)], 10.0).unwrap();

    let parts: Vec<usize> = map.kept_segments.iter().map(|s| s.part).collect();
    assert_eq!(parts, vec![0, 1]);
    assert!(map.kept_segments.iter().all(|s| s.segment_id == 1));
}

#[test]
fn test_plan_withCloseAds_shouldMergeIntoOneCut() {
    let map = planner().plan(&hello_world(), &[ad(2.0, 3.0), ad(3.2, 4.0)], 10.0).unwrap();

    assert_eq!(map.removed.len(), 1);
    assert!((map.removed_duration() - 2.0).abs() < 1e-9);
}

#[test]
fn test_plan_withAdOutsideMedia_shouldClip() {
    let map = planner().plan(&hello_world(), &[ad(9.0, 15.0)], 10.0).unwrap();

    assert!((map.new_duration() - 9.0).abs() < 1e-9);
    assert!((map.removed_duration() - 1.0).abs() < 1e-9);
}

#[test]
fn test_plan_withAdCoveringEverything_shouldFail() {
    let result = planner().plan(&hello_world(), &[ad(0.0, 10.0)], 10.0);
    assert!(matches!(result, Err(PipelineError::EmptyOutputAfterSplice { .. })));
}

#[test]
fn test_cutList_shouldMatchKeptSpans() {
    let map = planner().plan(&hello_world(), &[ad(4.0, 6.0)], 10.0).unwrap();
    let cuts = map.cut_list();

    assert_eq!(cuts.keep, map.kept);
    assert!((cuts.output_duration - 8.0).abs() < 1e-9);
    assert!(cuts.video_filter().starts_with("select="));
    assert!(cuts.audio_filter().starts_with("aselect="));
}
