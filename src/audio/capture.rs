use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::Producer;
use ringbuf::HeapCons;
use tracing::{error, info};

use super::listener::sample_ring;
use crate::error::CaptureError;

// Rates the voice gate understands, preferred first.
const TARGET_RATES: [u32; 4] = [16000, 32000, 48000, 8000];

/// Live microphone feeding the audio sample ring.
/// The stream stops when this value is dropped, so keep it alive for the run.
pub struct MicCapture {
    _stream: cpal::Stream,
    pub sample_rate: u32,
}

impl MicCapture {
    /// Opens the default input device and a sample ring sized for the rate the
    /// device actually accepted, not the preferred one.
    pub fn open(preferred_rate: u32, buffer_secs: f32) -> Result<(Self, HeapCons<f32>), CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::Device("no input device available".into()))?;

        info!("Audio Input Device: {}", device.name().unwrap_or_default());

        let (config, sample_rate) = negotiate(&device, preferred_rate)?;
        info!(
            "Audio Config Selected: Rate={}Hz, Channels={}",
            sample_rate,
            config.channels()
        );

        let (mut producer, consumer) = sample_ring(sample_rate, buffer_secs);
        let channels = config.channels() as usize;
        let err_fn = |err| error!("an error occurred on stream: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| write_f32(data, channels, &mut producer),
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| write_i16(data, channels, &mut producer),
                err_fn,
                None,
            ),
            other => {
                return Err(CaptureError::Device(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|e| CaptureError::Device(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        Ok((
            Self {
                _stream: stream,
                sample_rate,
            },
            consumer,
        ))
    }
}

// Preferred rate first, then anything the VAD accepts, then the device default.
fn negotiate(
    device: &cpal::Device,
    preferred_rate: u32,
) -> Result<(cpal::SupportedStreamConfig, u32), CaptureError> {
    let mut candidates = vec![preferred_rate];
    candidates.extend(TARGET_RATES.iter().copied().filter(|r| *r != preferred_rate));

    for rate in candidates {
        let ranges = device
            .supported_input_configs()
            .map_err(|e| CaptureError::Device(e.to_string()))?;
        for range in ranges {
            if range.min_sample_rate().0 <= rate && range.max_sample_rate().0 >= rate {
                return Ok((range.with_sample_rate(cpal::SampleRate(rate)), rate));
            }
        }
    }

    let def = device
        .default_input_config()
        .map_err(|e| CaptureError::Device(e.to_string()))?;
    let rate = def.sample_rate().0;
    Ok((def, rate))
}

// Downmix to mono by taking the first channel. A full ring drops input (lossy).
fn write_f32<P>(input: &[f32], channels: usize, producer: &mut P)
where
    P: Producer<Item = f32>,
{
    for frame in input.chunks(channels.max(1)) {
        let _ = producer.try_push(frame[0]);
    }
}

fn write_i16<P>(input: &[i16], channels: usize, producer: &mut P)
where
    P: Producer<Item = f32>,
{
    for frame in input.chunks(channels.max(1)) {
        let _ = producer.try_push(frame[0] as f32 / i16::MAX as f32);
    }
}
