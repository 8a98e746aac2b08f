//! Channel mixing and sample-rate conversion.
//!
//! Captured audio arrives at the device's native rate and channel count.
//! Transcription wants **16 kHz mono**, and playback wants whatever the
//! output device runs at.  Both directions go through the helpers here:
//!
//! 1. [`downmix_to_mono`] — average interleaved channels into one.
//! 2. [`resample`] — linear-interpolation rate conversion.

/// Sample rate handed to every transcriber.
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`; a trailing partial frame
/// is discarded.  `channels == 0` yields an empty vector.
///
/// # Example
///
/// ```rust
/// use voice_chat::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Convert mono `samples` from `source_rate` Hz to `target_rate` Hz using
/// linear interpolation.
///
/// Equal rates return a copy; empty input or a zero rate returns an empty
/// vector.  The output length is `ceil(len * target / source)`.
///
/// ```rust
/// use voice_chat::audio::resample;
///
/// let hi = vec![0.5_f32; 480];          // 10 ms @ 48 kHz
/// let lo = resample(&hi, 48_000, 16_000);
/// assert_eq!(lo.len(), 160);            // 10 ms @ 16 kHz
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = (src_pos as usize).min(last);
            let frac = (src_pos - idx as f64) as f32;
            match samples.get(idx + 1) {
                Some(&next) => samples[idx] * (1.0 - frac) + next * frac,
                None => samples[idx],
            }
        })
        .collect()
}

/// Shorthand for `resample(samples, source_rate, SPEECH_SAMPLE_RATE)`.
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    resample(samples, source_rate, SPEECH_SAMPLE_RATE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
