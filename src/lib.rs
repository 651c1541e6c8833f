/*!
 * # dubsplice - dub-timeline synthesis and ad splice engine
 *
 * Places synthesized translated speech on the timeline of an original
 * recording, removes detected ad intervals, and produces one continuous
 * dubbed track plus a cut list for the matching video edit.
 *
 * ## Features
 *
 * - Duration reconciliation of each synthesized clip against its
 *   transcript slot (pad, extend into the gap, time-compress, truncate)
 * - Ad splice planning with a bidirectional original/output time map
 * - Stem-aware compositing: dubbed speech over the background stem with
 *   crossfaded splice junctions and peak normalization
 * - Concurrent, cancellable pipeline with retries and a content-addressed
 *   artifact cache for resumable runs
 *
 * ## Architecture
 *
 * - `timeline`: time spans, transcript segments and SRT handling
 * - `audio`: sample buffers, WAV I/O and DSP primitives
 * - `reconcile`: fitting clips to segment slots
 * - `splice`: ad interval merging, the splice map and cut lists
 * - `stems`: vocal/background stem pairs and separators
 * - `compose`: final track assembly
 * - `providers`: translator, synthesizer, separator and ad classifier seams
 * - `pipeline`: the run driver, retries, cancellation and artifact cache
 * - `job`: job manifests naming a media's input files
 * - `app_controller`: running jobs and writing their outputs
 * - `app_config`: configuration management
 * - `errors`: custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod audio;
pub mod compose;
pub mod errors;
pub mod job;
pub mod pipeline;
pub mod providers;
pub mod reconcile;
pub mod splice;
pub mod stems;
pub mod timeline;

// Re-export main types for easier usage
pub use app_config::Config;
pub use audio::AudioBuffer;
pub use compose::{CompositeTrack, TimelineCompositor};
pub use errors::{DurationOverflow, PipelineError, UpstreamError};
pub use pipeline::{Collaborators, PipelineDriver, RunContext, RunReport};
pub use reconcile::{DurationReconciler, ReconcileDecision, ReconciledClip, SynthesizedClip};
pub use splice::{AdInterval, CutList, SpliceMap, SplicePlanner};
pub use stems::StemPair;
pub use timeline::{SegmentStore, TimeSpan, TranscriptSegment};
