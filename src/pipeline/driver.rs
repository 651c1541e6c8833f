use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;

use crate::audio::AudioBuffer;
use crate::compose::{CompositeTrack, TimelineCompositor};
use crate::errors::{DurationOverflow, PipelineError};
use crate::providers::{AdClassifier, MediaSource, SpeechSynthesizer, StemSeparator, Translator};
use crate::reconcile::{reconcile_all, DurationReconciler, ReconcileDecision, SynthesizedClip};
use crate::splice::{AdInterval, SpliceMap, SplicePlanner};
use crate::stems::StemPair;
use crate::timeline::{SegmentId, SegmentStore, TranscriptSegment};

use super::cache::{audio_digest, Fingerprint};
use super::context::{RunContext, Stage};

/// The external services a run talks to
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub separator: Arc<dyn StemSeparator>,
    pub classifier: Arc<dyn AdClassifier>,
}

/// Progress notifications emitted while a run advances
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineProgress {
    StageStarted(Stage),
    SegmentFinished { completed: usize, total: usize },
    StageFinished(Stage),
}

pub type ProgressCallback = Arc<dyn Fn(PipelineProgress) + Send + Sync>;

/// A segment that kept its original voice because its translation or
/// synthesis failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentFallback {
    pub segment_id: SegmentId,
    pub stage: Stage,
    pub reason: String,
}

/// Everything a successful run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub media_id: String,
    pub track: CompositeTrack,
    pub splice_map: SpliceMap,
    pub decisions: Vec<(SegmentId, ReconcileDecision)>,
    pub overflow_warnings: Vec<DurationOverflow>,
    pub fallbacks: Vec<SegmentFallback>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "{}: {:.3}s -> {:.3}s, {} ad cut(s), {} segment(s) dubbed, {} fallback(s), {} overflow warning(s) in {:.1}s",
            self.media_id,
            self.splice_map.media_duration,
            self.track.duration(),
            self.splice_map.removed.len(),
            self.track.replaced_segments.len(),
            self.fallbacks.len(),
            self.overflow_warnings.len(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Runs one media through every stage.
///
/// Stem separation, the per-segment translate and synthesize branch and ad
/// classification run concurrently; reconciliation, planning and composition
/// start once all three have finished.
pub struct PipelineDriver {
    context: Arc<RunContext>,
    collaborators: Collaborators,
    progress: Option<ProgressCallback>,
}

impl PipelineDriver {
    pub fn new(context: RunContext, collaborators: Collaborators) -> Self {
        Self {
            context: Arc::new(context),
            collaborators,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    fn notify(&self, event: PipelineProgress) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }

    pub async fn run(&self, media: &MediaSource, segments: &SegmentStore) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let media_duration = media.duration();
        if media_duration <= 0.0 {
            return Err(PipelineError::InvalidInput(format!("Media {} has no audio", media.id)));
        }
        info!(
            "Starting run for {} ({:.3}s, {} segments)",
            media.id,
            media_duration,
            segments.len()
        );

        let (stems, synthesized, ads) = tokio::join!(
            self.separate_stems(media),
            self.synthesize_segments(media, segments),
            self.classify_ads(media, segments)
        );
        let stems = stems?;
        let (clips, fallbacks) = synthesized?;
        let ads = ads?;

        self.context.cancel.check(Stage::Reconciliation)?;
        self.notify(PipelineProgress::StageStarted(Stage::Reconciliation));
        let reconciler = Arc::new(DurationReconciler::new(&self.context.config.reconcile, stems.sample_rate()));
        let outcome = reconcile_all(
            reconciler,
            segments,
            clips,
            media_duration,
            self.context.concurrency(),
        )
        .await?;
        self.notify(PipelineProgress::StageFinished(Stage::Reconciliation));

        self.context.cancel.check(Stage::Splice)?;
        let splice_map = self.plan_splice(media, segments, &ads)?;

        self.context.cancel.check(Stage::Composition)?;
        self.notify(PipelineProgress::StageStarted(Stage::Composition));
        let track = TimelineCompositor::new(&self.context.config.compose)
            .compose(&stems, &outcome.clips, &splice_map)?
            .with_warnings(outcome.warnings.clone());
        self.notify(PipelineProgress::StageFinished(Stage::Composition));

        let (hits, misses, _) = self.context.cache.stats();
        debug!("Artifact cache: {} hit(s), {} miss(es)", hits, misses);

        Ok(RunReport {
            media_id: media.id.clone(),
            decisions: outcome.clips.iter().map(|c| (c.segment_id, c.decision)).collect(),
            overflow_warnings: outcome.warnings,
            track,
            splice_map,
            fallbacks,
            elapsed: started.elapsed(),
        })
    }

    async fn separate_stems(&self, media: &MediaSource) -> Result<StemPair, PipelineError> {
        self.notify(PipelineProgress::StageStarted(Stage::StemSeparation));
        let content = audio_digest(&media.audio);
        let tag = self.collaborators.separator.cache_tag();
        let stem_key = |kind: &[u8]| {
            Fingerprint::compute(
                &media.id,
                Stage::StemSeparation,
                &[kind, content.as_bytes(), tag.as_bytes()],
            )
        };
        let vocal_key = stem_key(b"vocal".as_slice());
        let background_key = stem_key(b"background".as_slice());

        let cached = self
            .context
            .cache
            .load_audio(&vocal_key)
            .zip(self.context.cache.load_audio(&background_key));
        let stems = match cached {
            Some((vocal, background)) => {
                info!("Using cached stems for {}", media.id);
                StemPair::new(vocal, background)?
            }
            None => {
                let separator = self.collaborators.separator.clone();
                let stems = self
                    .context
                    .retry
                    .run(Stage::StemSeparation, "stem separation", &self.context.cancel, || {
                        let separator = separator.clone();
                        async move { separator.separate(media).await }
                    })
                    .await?;
                self.store_audio(&vocal_key, stems.vocal());
                self.store_audio(&background_key, stems.background());
                stems
            }
        };

        self.notify(PipelineProgress::StageFinished(Stage::StemSeparation));
        Ok(stems)
    }

    async fn classify_ads(&self, media: &MediaSource, segments: &SegmentStore) -> Result<Vec<AdInterval>, PipelineError> {
        self.notify(PipelineProgress::StageStarted(Stage::AdClassification));
        let transcript = serde_json::to_vec(segments)?;
        let tag = self.collaborators.classifier.cache_tag();
        let key = Fingerprint::compute(
            &media.id,
            Stage::AdClassification,
            &[transcript.as_slice(), tag.as_bytes()],
        );

        let ads = match self.context.cache.load_json::<Vec<AdInterval>>(&key) {
            Some(ads) => ads,
            None => {
                let classifier = self.collaborators.classifier.clone();
                let ads = self
                    .context
                    .retry
                    .run(Stage::AdClassification, "ad classification", &self.context.cancel, || {
                        let classifier = classifier.clone();
                        async move { classifier.classify(segments).await }
                    })
                    .await?;
                if let Err(e) = self.context.cache.store_json(&key, &ads) {
                    warn!("Failed to cache ad intervals: {}", e);
                }
                ads
            }
        };

        info!("{} ad candidate(s) for {}", ads.len(), media.id);
        self.notify(PipelineProgress::StageFinished(Stage::AdClassification));
        Ok(ads)
    }

    /// Translate and synthesize every segment with bounded concurrency.
    ///
    /// A segment whose translation or synthesis fails for good is reported
    /// as a fallback and keeps its original voice; only fatal errors such as
    /// cancellation abort the branch.
    async fn synthesize_segments(
        &self,
        media: &MediaSource,
        segments: &SegmentStore,
    ) -> Result<(Vec<SynthesizedClip>, Vec<SegmentFallback>), PipelineError> {
        self.notify(PipelineProgress::StageStarted(Stage::Synthesis));
        let total = segments.len();
        let completed = AtomicUsize::new(0);

        let results: Vec<(SegmentId, Result<SynthesizedClip, PipelineError>)> = stream::iter(segments.iter())
            .map(|segment| {
                let completed = &completed;
                async move {
                    let result = self.process_segment(media, segment).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.notify(PipelineProgress::SegmentFinished { completed: done, total });
                    (segment.id, result)
                }
            })
            .buffer_unordered(self.context.concurrency())
            .collect()
            .await;

        let mut clips = Vec::with_capacity(total);
        let mut fallbacks = Vec::new();
        for (segment_id, result) in results {
            match result {
                Ok(clip) => clips.push(clip),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let stage = match &e {
                        PipelineError::StageFailed { stage, .. } => *stage,
                        _ => Stage::Synthesis,
                    };
                    warn!("Segment {} keeps its original audio: {}", segment_id, e);
                    fallbacks.push(SegmentFallback {
                        segment_id,
                        stage,
                        reason: e.to_string(),
                    });
                }
            }
        }
        clips.sort_by_key(|c| c.segment_id);
        fallbacks.sort_by_key(|f| f.segment_id);

        info!(
            "Synthesized {} of {} segment(s), {} fallback(s)",
            clips.len(),
            total,
            fallbacks.len()
        );
        self.notify(PipelineProgress::StageFinished(Stage::Synthesis));
        Ok((clips, fallbacks))
    }

    async fn process_segment(
        &self,
        media: &MediaSource,
        segment: &TranscriptSegment,
    ) -> Result<SynthesizedClip, PipelineError> {
        self.context.cancel.check(Stage::Translation)?;
        let text = self.translate(media, segment).await?;
        if text.trim().is_empty() {
            return Err(PipelineError::StageFailed {
                stage: Stage::Translation,
                reason: format!("Empty translation for segment {}", segment.id),
            });
        }

        self.context.cancel.check(Stage::Synthesis)?;
        let voice = &self.context.config.pipeline.voice_profile;
        let id = segment.id.to_string();
        let tag = self.collaborators.synthesizer.cache_tag(segment.id);
        let key = Fingerprint::compute(
            &media.id,
            Stage::Synthesis,
            &[id.as_bytes(), text.as_bytes(), voice.as_bytes(), tag.as_bytes()],
        );
        if let Some(audio) = self.context.cache.load_audio(&key) {
            return Ok(SynthesizedClip::new(segment.id, audio.samples, audio.sample_rate));
        }

        let synthesizer = self.collaborators.synthesizer.clone();
        let label = format!("synthesis of segment {}", segment.id);
        let clip = self
            .context
            .retry
            .run(Stage::Synthesis, &label, &self.context.cancel, || {
                let synthesizer = synthesizer.clone();
                let text = text.clone();
                async move { synthesizer.synthesize(segment.id, &text, voice).await }
            })
            .await?;

        if clip.segment_id != segment.id {
            return Err(PipelineError::StageFailed {
                stage: Stage::Synthesis,
                reason: format!("Synthesizer returned segment {} for {}", clip.segment_id, segment.id),
            });
        }
        self.store_audio(&key, &AudioBuffer::new(clip.audio_samples.clone(), clip.sample_rate));
        Ok(clip)
    }

    /// Existing translations are used as-is; the rest go to the translator
    async fn translate(&self, media: &MediaSource, segment: &TranscriptSegment) -> Result<String, PipelineError> {
        if segment.is_translated() {
            return Ok(segment.translated_text.clone());
        }

        let id = segment.id.to_string();
        let tag = self.collaborators.translator.cache_tag();
        let key = Fingerprint::compute(
            &media.id,
            Stage::Translation,
            &[id.as_bytes(), segment.source_text.as_bytes(), tag.as_bytes()],
        );
        if let Some(text) = self.context.cache.load_json::<String>(&key) {
            return Ok(text);
        }

        let translator = self.collaborators.translator.clone();
        let label = format!("translation of segment {}", segment.id);
        let text = self
            .context
            .retry
            .run(Stage::Translation, &label, &self.context.cancel, || {
                let translator = translator.clone();
                async move { translator.translate(segment).await }
            })
            .await?;

        if let Err(e) = self.context.cache.store_json(&key, &text) {
            warn!("Failed to cache translation of segment {}: {}", segment.id, e);
        }
        Ok(text)
    }

    fn plan_splice(
        &self,
        media: &MediaSource,
        segments: &SegmentStore,
        ads: &[AdInterval],
    ) -> Result<SpliceMap, PipelineError> {
        self.notify(PipelineProgress::StageStarted(Stage::Splice));
        let config = &self.context.config.splice;
        let transcript = serde_json::to_vec(segments)?;
        let intervals = serde_json::to_vec(ads)?;
        let settings = serde_json::to_vec(config)?;
        let duration = media.duration().to_le_bytes();
        let key = Fingerprint::compute(
            &media.id,
            Stage::Splice,
            &[
                transcript.as_slice(),
                intervals.as_slice(),
                settings.as_slice(),
                duration.as_slice(),
            ],
        );

        let map = match self.context.cache.load_json::<SpliceMap>(&key) {
            Some(map) => {
                map.verify()?;
                map
            }
            None => {
                let map = SplicePlanner::new(config).plan(segments, ads, media.duration())?;
                if let Err(e) = self.context.cache.store_json(&key, &map) {
                    warn!("Failed to cache splice map: {}", e);
                }
                map
            }
        };

        self.notify(PipelineProgress::StageFinished(Stage::Splice));
        Ok(map)
    }

    fn store_audio(&self, key: &Fingerprint, audio: &AudioBuffer) {
        if let Err(e) = self.context.cache.store_audio(key, audio) {
            warn!("Failed to cache {} artifact: {}", key.stage(), e);
        }
    }
}
