//! Microphone capture: the [`AudioCapture`] contract and its `cpal` binding.
//!
//! [`CpalCapture`] runs the cpal input stream on a dedicated thread because
//! `cpal::Stream` is not `Send` on every platform.  `start` spawns the thread
//! and waits for it to report whether the device opened; `stop` signals the
//! thread, joins it, and turns the accumulated samples into a 16 kHz mono
//! WAV payload.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::oneshot;

use super::resample::{downmix_to_mono, resample_to_16k, SPEECH_SAMPLE_RATE};
use super::wav::encode_wav;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while starting or stopping a capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("a capture is already in progress")]
    AlreadyCapturing,

    #[error("no capture is in progress")]
    NotCapturing,

    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[source] cpal::DefaultStreamConfigError),

    #[error("unsupported input sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[source] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[source] cpal::PlayStreamError),

    #[error("capture worker failed: {0}")]
    Worker(String),

    #[error("failed to encode captured audio: {0}")]
    Encode(#[from] hound::Error),
}

// cpal reports OS-level access refusals (macOS TCC, PipeWire portals, ALSA
// EACCES) only as backend-specific text.
fn permission_denied(err: &cpal::BackendSpecificError) -> Option<CaptureError> {
    let text = err.description.to_lowercase();
    ["permission", "not permitted", "denied", "unauthorized"]
        .iter()
        .any(|needle| text.contains(needle))
        .then(|| CaptureError::PermissionDenied(err.description.clone()))
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        let denied = match &e {
            cpal::DefaultStreamConfigError::BackendSpecific { err } => permission_denied(err),
            _ => None,
        };
        denied.unwrap_or(CaptureError::DefaultConfig(e))
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        let denied = match &e {
            cpal::BuildStreamError::BackendSpecific { err } => permission_denied(err),
            _ => None,
        };
        denied.unwrap_or(CaptureError::BuildStream(e))
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(e: cpal::PlayStreamError) -> Self {
        let denied = match &e {
            cpal::PlayStreamError::BackendSpecific { err } => permission_denied(err),
            _ => None,
        };
        denied.unwrap_or(CaptureError::PlayStream(e))
    }
}

// ---------------------------------------------------------------------------
// AudioCapture trait
// ---------------------------------------------------------------------------

/// Microphone capture capability used by the session.
///
/// # Contract
///
/// - At most one outstanding `start` without an intervening `stop`; a second
///   `start` returns [`CaptureError::AlreadyCapturing`].
/// - `stop` without a running capture returns [`CaptureError::NotCapturing`].
/// - `stop` returns an encoded audio container (WAV for [`CpalCapture`]).
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn start(&self) -> Result<(), CaptureError>;

    async fn stop(&self) -> Result<Vec<u8>, CaptureError>;
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// State of a recording that has been started and not yet stopped.
struct ActiveRecording {
    stop_tx: mpsc::Sender<()>,
    worker: JoinHandle<()>,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    channels: u16,
}

/// [`AudioCapture`] backed by a cpal input stream.
///
/// ```rust,no_run
/// use voice_chat::audio::{AudioCapture, CpalCapture};
///
/// # async fn demo() -> Result<(), voice_chat::audio::CaptureError> {
/// let capture = CpalCapture::new(None);
/// capture.start().await?;
/// // … speak …
/// let wav = capture.stop().await?;
/// println!("captured {} bytes", wav.len());
/// # Ok(())
/// # }
/// ```
pub struct CpalCapture {
    device_name: Option<String>,
    active: Mutex<Option<ActiveRecording>>,
}

impl CpalCapture {
    /// Capture from the named input device, or the host default when `None`.
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            active: Mutex::new(None),
        }
    }

    /// Returns `true` while a recording is running.
    pub fn is_capturing(&self) -> bool {
        self.lock_active().is_some()
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRecording>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&self) -> Result<(), CaptureError> {
        let busy = self.is_capturing();
        if busy {
            return Err(CaptureError::AlreadyCapturing);
        }

        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);
        let device_name = self.device_name.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let stream = match open_input_stream(device_name.as_deref(), sink) {
                    Ok((stream, rate, channels)) => {
                        let _ = ready_tx.send(Ok((rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Returns on stop() or when the owning CpalCapture is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("capture: input stream closed");
            })
            .map_err(|e| CaptureError::Worker(e.to_string()))?;

        let (sample_rate, channels) = ready_rx
            .await
            .map_err(|_| CaptureError::Worker("capture thread exited during start-up".into()))??;

        let mut active = self.lock_active();
        if active.is_some() {
            let _ = stop_tx.send(());
            return Err(CaptureError::AlreadyCapturing);
        }
        *active = Some(ActiveRecording {
            stop_tx,
            worker,
            samples,
            sample_rate,
            channels,
        });

        log::info!("capture: recording started ({sample_rate} Hz, {channels} ch)");
        Ok(())
    }

    async fn stop(&self) -> Result<Vec<u8>, CaptureError> {
        let recording = self.lock_active().take().ok_or(CaptureError::NotCapturing)?;
        let ActiveRecording {
            stop_tx,
            worker,
            samples,
            sample_rate,
            channels,
        } = recording;

        let _ = stop_tx.send(());

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, CaptureError> {
            worker
                .join()
                .map_err(|_| CaptureError::Worker("capture thread panicked".into()))?;

            let raw = std::mem::take(&mut *samples.lock().unwrap_or_else(PoisonError::into_inner));
            let mono = downmix_to_mono(&raw, channels);
            let pcm = resample_to_16k(&mono, sample_rate);

            log::info!(
                "capture: recording stopped ({:.2} s)",
                pcm.len() as f32 / SPEECH_SAMPLE_RATE as f32
            );

            Ok(encode_wav(&pcm, SPEECH_SAMPLE_RATE)?)
        })
        .await
        .map_err(|e| CaptureError::Worker(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Stream construction (runs on the capture thread)
// ---------------------------------------------------------------------------

fn find_input_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string())),
    }
}

fn open_input_stream(
    device_name: Option<&str>,
    sink: Arc<Mutex<Vec<f32>>>,
) -> Result<(cpal::Stream, u32, u16), CaptureError> {
    let device = find_input_device(device_name)?;
    let supported = device.default_input_config()?;

    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let on_error = |err: cpal::StreamError| log::error!("cpal stream error: {err}");

    let stream = match format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = sink.lock() {
                    buf.extend_from_slice(data);
                }
            },
            on_error,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = sink.lock() {
                    buf.extend(data.iter().map(|&s| s as f32 / 32_768.0));
                }
            },
            on_error,
            None,
        )?,
        other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream.play()?;
    Ok((stream, sample_rate, channels))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
