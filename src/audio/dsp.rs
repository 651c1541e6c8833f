/*!
 * Sample-level processing: resampling, pitch-preserving time compression,
 * padding, fades and peak normalization.
 */

use std::f32::consts::PI;

/// Linear-interpolation resampler
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }
    let out_len = ((samples.len() as f64) * to_rate as f64 / from_rate as f64).round() as usize;
    resample_to_len(samples, out_len)
}

/// Stretch or squeeze `samples` to exactly `len` samples by interpolation.
/// Changes pitch; only meant for rate conversion and very short fragments.
pub fn resample_to_len(samples: &[f32], len: usize) -> Vec<f32> {
    if samples.is_empty() {
        return vec![0.0; len];
    }
    if len == samples.len() {
        return samples.to_vec();
    }
    let step = if len > 1 {
        (samples.len() - 1) as f64 / (len - 1) as f64
    } else {
        0.0
    };
    (0..len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

fn hann_window(len: usize) -> Vec<f32> {
    // periodic Hann: overlapping at len/2 sums to one
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / len as f32).cos())
        .collect()
}

fn sample_at(samples: &[f32], idx: usize) -> f32 {
    samples.get(idx).copied().unwrap_or(0.0)
}

/// Input position near `nominal` whose waveform best continues the one at
/// `natural` (maximum cross-correlation over `overlap` samples)
fn best_offset(samples: &[f32], natural: usize, nominal: usize, tolerance: usize, overlap: usize) -> usize {
    let lo = nominal.saturating_sub(tolerance);
    let hi = nominal + tolerance;

    let mut best = nominal;
    let mut best_score = f32::NEG_INFINITY;
    for candidate in lo..=hi {
        let score: f32 = (0..overlap)
            .map(|i| sample_at(samples, natural + i) * sample_at(samples, candidate + i))
            .sum();
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }
    best
}

/// Pitch-preserving time compression (WSOLA).
///
/// `factor > 1` shortens the signal: the output holds
/// `round(len / factor)` samples. Frames of `frame_ms` are overlap-added at a
/// fixed output hop while the read position follows `factor`, each frame
/// shifted within half a hop to the offset that best continues the previous
/// frame, so periodic content keeps its period.
pub fn time_compress(samples: &[f32], sample_rate: u32, factor: f64, frame_ms: u64) -> Vec<f32> {
    let out_len = (samples.len() as f64 / factor).round() as usize;
    if samples.is_empty() || out_len == 0 {
        return vec![0.0; out_len];
    }
    if (factor - 1.0).abs() < 1e-6 {
        let mut out = samples.to_vec();
        out.resize(out_len, 0.0);
        return out;
    }

    let frame = (((frame_ms as f64 / 1000.0) * sample_rate as f64).round() as usize).max(16) & !1;
    if samples.len() < frame * 2 {
        return resample_to_len(samples, out_len);
    }
    let hop = frame / 2;
    let tolerance = hop / 2;
    let window = hann_window(frame);

    let mut out = vec![0.0f32; out_len + frame];
    let mut norm = vec![0.0f32; out_len + frame];
    let mut previous: Option<usize> = None;
    let mut out_pos = 0;

    while out_pos < out_len {
        let nominal = (out_pos as f64 * factor).round() as usize;
        let chosen = match previous {
            None => 0,
            Some(prev) => best_offset(samples, prev + hop, nominal, tolerance, hop),
        };
        for i in 0..frame {
            out[out_pos + i] += sample_at(samples, chosen + i) * window[i];
            norm[out_pos + i] += window[i];
        }
        previous = Some(chosen);
        out_pos += hop;
    }

    for (o, n) in out.iter_mut().zip(&norm) {
        if *n > 1e-3 {
            *o /= *n;
        }
    }
    out.truncate(out_len);
    out
}

/// Truncate or pad with trailing silence to `len` samples
pub fn pad_to_len(samples: &[f32], len: usize) -> Vec<f32> {
    let mut out = samples.to_vec();
    out.resize(len, 0.0);
    out
}

/// Center `samples` in a buffer of `len` samples, silence on both sides
pub fn center_pad(samples: &[f32], len: usize) -> Vec<f32> {
    if samples.len() >= len {
        return samples[..len].to_vec();
    }
    let lead = (len - samples.len()) / 2;
    let mut out = vec![0.0; len];
    out[lead..lead + samples.len()].copy_from_slice(samples);
    out
}

/// Linear fade-in over the first `n` samples
pub fn fade_in(samples: &mut [f32], n: usize) {
    let n = n.min(samples.len());
    for (i, s) in samples.iter_mut().take(n).enumerate() {
        *s *= (i as f32 + 0.5) / n as f32;
    }
}

/// Linear fade-out over the last `n` samples
pub fn fade_out(samples: &mut [f32], n: usize) {
    let len = samples.len();
    let n = n.min(len);
    for i in 0..n {
        samples[len - n + i] *= 1.0 - (i as f32 + 0.5) / n as f32;
    }
}

/// Crossfade from `outgoing` into the start of `dst`
pub fn crossfade_into(dst: &mut [f32], outgoing: &[f32]) {
    let n = dst.len().min(outgoing.len());
    for i in 0..n {
        let w = (i as f32 + 0.5) / n as f32;
        dst[i] = dst[i] * w + outgoing[i] * (1.0 - w);
    }
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Scale down so the peak does not exceed `target`; returns the applied gain
pub fn normalize_peak(samples: &mut [f32], target: f32) -> f32 {
    let current = peak(samples);
    if current <= target || current == 0.0 {
        return 1.0;
    }
    let gain = target / current;
    for s in samples.iter_mut() {
        *s *= gain;
    }
    gain
}

/// Sine tone, used for synthetic test material
pub fn sine(frequency: f32, duration_secs: f64, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let len = (duration_secs * sample_rate as f64).round() as usize;
    (0..len)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}
