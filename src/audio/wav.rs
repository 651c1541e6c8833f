//! WAV reading and writing on top of `hound`.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::errors::PipelineError;

use super::AudioBuffer;

/// On-disk sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavEncoding {
    /// 16-bit integer PCM, for deliverables
    Pcm16,
    /// 32-bit float, lossless for cached intermediates
    Float32,
}

/// Read a WAV file, downmixing all channels to mono
pub fn read_wav(path: &Path) -> Result<AudioBuffer, PipelineError> {
    let mut reader = WavReader::open(path)
        .map_err(|e| PipelineError::Audio(format!("Failed to open {:?}: {}", path, e)))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    debug!(
        "Read {:?}: {} samples at {} Hz ({} channel(s))",
        path,
        samples.len(),
        spec.sample_rate,
        channels
    );

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

/// Write a mono WAV file
pub fn write_wav(path: &Path, audio: &AudioBuffer, encoding: WavEncoding) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = match encoding {
        WavEncoding::Pcm16 => WavSpec {
            channels: 1,
            sample_rate: audio.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
        WavEncoding::Float32 => WavSpec {
            channels: 1,
            sample_rate: audio.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    };

    let mut writer = WavWriter::create(path, spec)?;
    match encoding {
        WavEncoding::Pcm16 => {
            for &s in &audio.samples {
                let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer.write_sample(v)?;
            }
        }
        WavEncoding::Float32 => {
            for &s in &audio.samples {
                writer.write_sample(s)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}
