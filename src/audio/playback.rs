//! Blocking playback of mono PCM through the default output device.
//!
//! Call [`play_blocking`] from `tokio::task::spawn_blocking`; it returns once
//! every sample has been handed to the device (or a safety timeout of the
//! clip length plus 500 ms elapses).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::resample::resample;

/// Errors raised while opening or driving the output stream.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported output sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Play mono `samples` recorded at `sample_rate` Hz and wait for completion.
///
/// Samples are resampled to the device rate and duplicated across all
/// output channels.  `f32` and `i16` devices are supported.  Empty input
/// returns immediately.
pub fn play_blocking(samples: &[f32], sample_rate: u32) -> Result<(), PlaybackError> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
    let supported = device.default_output_config()?;

    let device_rate = supported.sample_rate().0;
    let channels = supported.channels().max(1) as usize;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let pcm = Arc::new(resample(samples, sample_rate, device_rate));
    let total = pcm.len();
    let position = Arc::new(AtomicUsize::new(0));

    let on_error = |err: cpal::StreamError| log::error!("cpal playback error: {err}");

    let stream = {
        let pcm = Arc::clone(&pcm);
        let position = Arc::clone(&position);
        match format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_frames(data, channels, &pcm, &position, |s| s);
                },
                on_error,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    fill_frames(data, channels, &pcm, &position, f32_to_i16);
                },
                on_error,
                None,
            )?,
            other => return Err(PlaybackError::UnsupportedFormat(format!("{other:?}"))),
        }
    };

    stream.play()?;

    let clip = Duration::from_millis((total as u64 * 1_000) / u64::from(device_rate.max(1)));
    let deadline = Instant::now() + clip + Duration::from_millis(500);

    while position.load(Ordering::Relaxed) < total && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    // Let the device drain its last buffer.
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    log::debug!("playback: finished {total} frames at {device_rate} Hz");
    Ok(())
}

// ---------------------------------------------------------------------------
// Callback helpers
// ---------------------------------------------------------------------------

/// Write the next mono sample into every channel of each frame in `data`.
///
/// Frames past the end of `pcm` are filled with silence.
fn fill_frames<T: Copy>(
    data: &mut [T],
    channels: usize,
    pcm: &[f32],
    position: &AtomicUsize,
    convert: impl Fn(f32) -> T,
) {
    for frame in data.chunks_mut(channels) {
        let pos = position.fetch_add(1, Ordering::Relaxed);
        let sample = convert(pcm.get(pos).copied().unwrap_or(0.0));
        frame.iter_mut().for_each(|out| *out = sample);
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
