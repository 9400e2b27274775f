use ringbuf::traits::{Consumer, Observer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, info, warn};
use webrtc_vad::{SampleRate, Vad, VadMode};

use super::clip::{encode_wav, to_pcm16};
use crate::channels::{CaptureContent, ChannelListener, RawCapture};
use crate::error::CaptureError;
use crate::kernel::message::InputType;

pub const DEFAULT_AUDIO_DEVICE: &str = "microphone";

// VAD frame length and debounce, same tuning as the speech detector.
const VAD_FRAME_MS: usize = 30;
const MIN_SPEECH_FRAMES: usize = 3;

/// Allocates the sample ring shared by a capture device and an `AudioListener`.
pub fn sample_ring(sample_rate: u32, buffer_secs: f32) -> (HeapProd<f32>, HeapCons<f32>) {
    let capacity = ((sample_rate as f32 * buffer_secs) as usize).max(1);
    HeapRb::<f32>::new(capacity).split()
}

/// Audio channel: cuts the incoming sample stream into fixed windows and
/// emits each window as a WAV clip.
pub struct AudioListener<C>
where
    C: Consumer<Item = f32> + Send,
{
    name: String,
    consumer: C,
    source_device: String,
    sample_rate: u32,
    window: Vec<f32>,
    voice_gate: bool,
    disconnect_reported: bool,
}

impl<C> AudioListener<C>
where
    C: Consumer<Item = f32> + Send,
{
    /// The window is `sample_rate * window_secs` samples, clamped to the
    /// consumer's capacity.
    pub fn new(
        consumer: C,
        source_device: impl Into<String>,
        sample_rate: u32,
        window_secs: f32,
    ) -> Self {
        let requested = ((sample_rate as f32 * window_secs) as usize).max(1);
        // A window larger than the ring could never fill.
        let capacity = consumer.capacity().get();
        let window_len = requested.min(capacity);
        if window_len < requested {
            warn!(
                "Audio window of {} samples exceeds ring capacity {}, clamped",
                requested, capacity
            );
        }
        info!(
            "Audio listener ready. Rate: {}Hz, window: {} samples",
            sample_rate, window_len
        );
        Self {
            name: "AudioListener".to_string(),
            consumer,
            source_device: source_device.into(),
            sample_rate,
            window: vec![0.0; window_len],
            voice_gate: false,
            disconnect_reported: false,
        }
    }

    /// Drop windows that contain no voiced frames.
    /// Only 8k/16k/32k/48k streams can be gated; other rates pass everything.
    pub fn with_voice_gate(mut self, enabled: bool) -> Self {
        self.voice_gate = enabled && vad_rate(self.sample_rate).is_some();
        if enabled && !self.voice_gate {
            warn!(
                "Voice gate disabled: unsupported VAD rate {}Hz",
                self.sample_rate
            );
        }
        self
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn voice_gate(&self) -> bool {
        self.voice_gate
    }

    fn contains_voice(&self, pcm: &[i16]) -> bool {
        let Some(rate) = vad_rate(self.sample_rate) else {
            return true;
        };
        // Vad is not Send; build one per window instead of storing it.
        let mut vad = Vad::new_with_rate(rate);
        vad.set_mode(VadMode::Aggressive);
        let frame_len = (self.sample_rate as usize * VAD_FRAME_MS) / 1000;

        let mut consecutive_speech = 0;
        for frame in pcm.chunks_exact(frame_len) {
            match vad.is_voice_segment(frame) {
                Ok(true) => {
                    consecutive_speech += 1;
                    if consecutive_speech >= MIN_SPEECH_FRAMES {
                        return true;
                    }
                }
                Ok(false) => consecutive_speech = 0,
                Err(e) => {
                    debug!("VAD Error: {:?}", e);
                    consecutive_speech = 0;
                }
            }
        }
        false
    }
}

impl<C> ChannelListener for AudioListener<C>
where
    C: Consumer<Item = f32> + Send,
{
    fn kind(&self) -> InputType {
        InputType::Audio
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&mut self) -> Result<Option<RawCapture>, CaptureError> {
        // 1. Wait for a full window; report a vanished device once.
        if self.consumer.occupied_len() < self.window.len() {
            if !self.consumer.write_is_held() && !self.disconnect_reported {
                self.disconnect_reported = true;
                return Err(CaptureError::Disconnected);
            }
            return Ok(None);
        }

        // 2. Pop exactly one window.
        let popped = self.consumer.pop_slice(&mut self.window);
        let pcm = to_pcm16(&self.window[..popped]);

        // 3. Voice gate
        if self.voice_gate && !self.contains_voice(&pcm) {
            debug!("Audio window discarded: no speech");
            return Ok(None);
        }

        // 4. Encode
        let clip = encode_wav(&pcm, self.sample_rate)?;
        Ok(Some(
            RawCapture::new(CaptureContent::Audio {
                clip,
                sample_rate: self.sample_rate,
            })
            .with_device(self.source_device.clone()),
        ))
    }
}

fn vad_rate(sample_rate: u32) -> Option<SampleRate> {
    match sample_rate {
        8000 => Some(SampleRate::Rate8kHz),
        16000 => Some(SampleRate::Rate16kHz),
        32000 => Some(SampleRate::Rate32kHz),
        48000 => Some(SampleRate::Rate48kHz),
        _ => None,
    }
}
