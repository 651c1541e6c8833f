/*!
 * Audio primitives shared by the reconciler, the stem adapter and the
 * compositor.
 *
 * All buffers are mono `f32` in `[-1, 1]`. Multi-channel input is downmixed
 * when read from disk.
 */

pub mod buffer;
pub mod dsp;
pub mod wav;

pub use buffer::AudioBuffer;
pub use wav::WavEncoding;
