//! In-memory WAV encoding and decoding via `hound`.
//!
//! The capture adapter hands transcribers a self-describing WAV container
//! rather than bare samples, so remote APIs can accept the bytes unchanged
//! and local engines can recover the PCM with [`decode_wav`].

use std::borrow::Cow;
use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::resample::downmix_to_mono;

/// Encode mono `samples` as a 16-bit PCM WAV file held in memory.
///
/// Samples are clamped to `[-1.0, 1.0]` before quantisation.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Decoded mono PCM with its sample rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode a WAV file held in memory to mono `f32` samples in `[-1.0, 1.0]`.
///
/// Integer PCM of any bit depth and 32-bit float are accepted; multi-channel
/// input is downmixed.  Streamed files whose RIFF and `data` sizes are
/// placeholders (`0xFFFFFFFF`) are read up to the end of the buffer.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, hound::Error> {
    let bytes = fix_chunk_sizes(bytes);
    let mut reader = WavReader::new(Cursor::new(&bytes[..]))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(DecodedAudio {
        samples: downmix_to_mono(&interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

// ---------------------------------------------------------------------------
// Streamed headers
// ---------------------------------------------------------------------------

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Rewrite RIFF and `data` chunk sizes that claim more bytes than the
/// buffer holds.  The `data` size is trimmed to whole frames.
fn fix_chunk_sizes(bytes: &[u8]) -> Cow<'_, [u8]> {
    let len = bytes.len();
    if len < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Cow::Borrowed(bytes);
    }

    let mut fixed: Option<Vec<u8>> = None;

    let riff_available = (len - 8) as u32;
    if read_u32(bytes, 4) > riff_available {
        fixed
            .get_or_insert_with(|| bytes.to_vec())[4..8]
            .copy_from_slice(&riff_available.to_le_bytes());
    }

    let mut block_align = 1usize;
    let mut pos = 12usize;
    while pos + 8 <= len {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(bytes, pos + 4) as usize;
        let body = pos + 8;

        if id == b"fmt " && body + 14 <= len {
            block_align = usize::from(u16::from_le_bytes([bytes[body + 12], bytes[body + 13]])).max(1);
        }

        if id == b"data" {
            let available = len - body;
            if size > available {
                let trimmed = (available - available % block_align) as u32;
                fixed
                    .get_or_insert_with(|| bytes.to_vec())[pos + 4..pos + 8]
                    .copy_from_slice(&trimmed.to_le_bytes());
            }
            break;
        }

        // Chunks are padded to an even length.
        pos = body.saturating_add(size).saturating_add(size & 1);
    }

    match fixed {
        Some(owned) => Cow::Owned(owned),
        None => Cow::Borrowed(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_header_describes_16k_mono_pcm16() {
        let bytes = encode_wav(&[0.0; 1_600], 16_000).unwrap();
        let reader = WavReader::new(Cursor::new(&bytes[..])).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 1_600);
    }

    #[test]
    fn decode_recovers_amplitude_within_quantisation_error() {
        let bytes = encode_wav(&[0.5, -0.25, 0.0], 16_000).unwrap();
        let decoded = decode_wav(&bytes).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.samples.len(), 3);
        assert!((decoded.samples[0] - 0.5).abs() < 1e-3);
        assert!((decoded.samples[1] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let decoded = decode_wav(&encode_wav(&[4.0, -4.0], 8_000).unwrap()).unwrap();
        assert!(decoded.samples[0] <= 1.0 && decoded.samples[0] > 0.99);
        assert!(decoded.samples[1] >= -1.0 && decoded.samples[1] < -0.99);
    }

    #[test]
    fn stereo_float_input_is_downmixed() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 24_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut w = WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.2_f32, 0.4, 1.0, 0.0] {
                w.write_sample(s).unwrap();
            }
            w.finalize().unwrap();
        }

        let decoded = decode_wav(&cursor.into_inner()).unwrap();
        assert_eq!(decoded.samples.len(), 2);
        assert!((decoded.samples[0] - 0.3).abs() < 1e-6);
        assert!((decoded.duration_secs() - 2.0 / 24_000.0).abs() < 1e-9);
    }

    /// Mark the RIFF and `data` sizes as unknown, the way streaming
    /// encoders write them.
    fn with_streamed_header(mut bytes: Vec<u8>) -> Vec<u8> {
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        let data = bytes
            .windows(4)
            .position(|w| w == b"data")
            .expect("data chunk");
        bytes[data + 4..data + 8].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes
    }

    #[test]
    fn streamed_header_is_read_to_end_of_buffer() {
        let bytes = with_streamed_header(encode_wav(&[0.1; 2_400], 24_000).unwrap());

        let decoded = decode_wav(&bytes).unwrap();

        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.samples.len(), 2_400);
        assert!((decoded.samples[0] - 0.1).abs() < 1e-3);
        assert!((decoded.duration_secs() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn streamed_header_drops_trailing_partial_frame() {
        let mut bytes = with_streamed_header(encode_wav(&[0.25; 100], 16_000).unwrap());
        bytes.push(0x7f);

        let decoded = decode_wav(&bytes).unwrap();
        assert_eq!(decoded.samples.len(), 100);
    }

    #[test]
    fn well_formed_input_is_not_copied() {
        let bytes = encode_wav(&[0.0; 10], 16_000).unwrap();
        assert!(matches!(fix_chunk_sizes(&bytes), Cow::Borrowed(_)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode_wav(b"definitely not a wav file").is_err());
    }
}
