//! Local transcription with whisper.cpp via `whisper-rs`.
//!
//! A new `WhisperState` is created for every call so one loaded model can
//! serve concurrent sessions without locking.  Inference runs on the tokio
//! blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use crate::audio::{decode_wav, resample_to_16k, SPEECH_SAMPLE_RATE};
use crate::stt::engine::{primary_language, SttError, Transcriber};
use crate::stt::transcribe::{SamplingStrategy, Segment, TranscribeParams, TranscriptionResult};

/// Minimum audio length: 0.5 s at 16 kHz.
const MIN_AUDIO_SAMPLES: usize = SPEECH_SAMPLE_RATE as usize / 2;
/// Maximum audio length: 60 s at 16 kHz.
const MAX_AUDIO_SAMPLES: usize = SPEECH_SAMPLE_RATE as usize * 60;

/// [`Transcriber`] backed by an in-process GGML Whisper model.
#[derive(Clone)]
pub struct WhisperTranscriber {
    ctx: Arc<WhisperContext>,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl WhisperTranscriber {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] — `model_path` does not exist.
    /// - [`SttError::ContextInit`]  — whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(params.use_gpu);
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded whisper model {}", path.display());
        Ok(Self {
            ctx: Arc::new(ctx),
            params,
        })
    }

    /// Run inference on 16 kHz mono samples and return per-segment timing.
    ///
    /// `language` is a BCP-47 tag or `"auto"` for Whisper's own detection.
    /// This call blocks; the [`Transcriber`] impl moves it onto the blocking
    /// pool.
    pub fn transcribe_full(
        &self,
        audio: &[f32],
        language: &str,
    ) -> Result<TranscriptionResult, SttError> {
        run_whisper(&self.ctx, &self.params, audio, language)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, SttError> {
        if audio.is_empty() {
            return Err(SttError::EmptyAudio);
        }

        let decoded = decode_wav(audio).map_err(|e| SttError::InvalidAudio(e.to_string()))?;
        let samples = resample_to_16k(&decoded.samples, decoded.sample_rate);

        let ctx = Arc::clone(&self.ctx);
        let params = self.params.clone();
        let language = language.to_string();

        let result = tokio::task::spawn_blocking(move || {
            run_whisper(&ctx, &params, &samples, &language)
        })
        .await
        .map_err(|e| SttError::Transcription(format!("inference task failed: {e}")))??;

        log::debug!(
            "stt: whisper produced {} segment(s) in {} ms",
            result.segments.len(),
            result.duration_ms
        );
        Ok(result.text)
    }
}

fn run_whisper(
    ctx: &WhisperContext,
    params: &TranscribeParams,
    audio: &[f32],
    language: &str,
) -> Result<TranscriptionResult, SttError> {
    if audio.len() < MIN_AUDIO_SAMPLES {
        return Err(SttError::AudioTooShort);
    }
    if audio.len() > MAX_AUDIO_SAMPLES {
        return Err(SttError::AudioTooLong);
    }

    use whisper_rs::SamplingStrategy as WS;
    let ws = match params.strategy {
        SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
        SamplingStrategy::BeamSearch { beam_size, patience } => {
            WS::BeamSearch { beam_size, patience }
        }
    };

    // Must outlive `fp`, which borrows it.
    let lang = primary_language(language);

    let mut fp = FullParams::new(ws);
    fp.set_language(if lang.is_empty() || lang == "auto" {
        None
    } else {
        Some(lang.as_str())
    });
    fp.set_n_threads(params.n_threads);
    if params.suppress_progress {
        fp.set_print_progress(false);
        fp.set_print_realtime(false);
    }

    let mut state = ctx
        .create_state()
        .map_err(|e| SttError::ContextInit(e.to_string()))?;

    let wall_start = std::time::Instant::now();

    state
        .full(fp, audio)
        .map_err(|e| SttError::Transcription(e.to_string()))?;

    let n_segments = state
        .full_n_segments()
        .map_err(|e| SttError::Transcription(e.to_string()))?;

    let mut text = String::new();
    let mut segments = Vec::with_capacity(n_segments.max(0) as usize);

    for i in 0..n_segments {
        let seg_text = state
            .full_get_segment_text(i)
            .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;

        // Timestamps are in centiseconds.
        let t0 = state.full_get_segment_t0(i).unwrap_or(0).max(0) as u64 * 10;
        let t1 = state.full_get_segment_t1(i).unwrap_or(0).max(0) as u64 * 10;

        text.push_str(&seg_text);
        segments.push(Segment {
            text: seg_text,
            start_ms: t0,
            end_ms: t1,
        });
    }

    Ok(TranscriptionResult {
        text: text.trim().to_string(),
        segments,
        duration_ms: wall_start.elapsed().as_millis(),
    })
}
