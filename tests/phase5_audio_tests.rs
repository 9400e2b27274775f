use std::io::Cursor;

use ringbuf::traits::Producer;
use uig::audio::clip::{encode_wav, to_pcm16};
use uig::audio::{sample_ring, AudioListener};
use uig::channels::{CaptureContent, ChannelListener};
use uig::error::CaptureError;
use uig::kernel::Normalizer;
use uig::{InputType, PayloadType};

#[test]
fn test_pcm_conversion_clamps() {
    let pcm = to_pcm16(&[0.0, 1.0, -1.0, 2.5, -7.0, f32::NAN, f32::INFINITY]);
    assert_eq!(pcm[0], 0);
    assert_eq!(pcm[1], i16::MAX);
    assert_eq!(pcm[2], -i16::MAX);
    assert_eq!(pcm[3], i16::MAX);
    assert_eq!(pcm[4], -i16::MAX);
    assert_eq!(pcm[5], 0);
    assert_eq!(pcm[6], 0);
}

#[test]
fn test_wav_clip_reads_back() {
    let pcm: Vec<i16> = (0..1600).map(|i| ((i % 200) * 100 - 10_000) as i16).collect();
    let clip = encode_wav(&pcm, 16000).unwrap();
    assert_eq!(&clip[0..4], b"RIFF");
    assert_eq!(&clip[8..12], b"WAVE");

    let mut reader = hound::WavReader::new(Cursor::new(clip)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.bits_per_sample, 16);

    let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(decoded, pcm);
}

#[test]
fn test_listener_waits_for_full_window() {
    let (mut producer, consumer) = sample_ring(16000, 1.0);
    let mut listener = AudioListener::new(consumer, "microphone", 16000, 0.5);
    assert_eq!(listener.window_len(), 8000);
    assert_eq!(listener.kind(), InputType::Audio);

    producer.push_slice(&vec![0.1; 4000]);
    assert!(listener.listen().unwrap().is_none());

    producer.push_slice(&vec![0.1; 4000]);
    let capture = listener.listen().unwrap().expect("one full window");
    match &capture.content {
        CaptureContent::Audio { clip, sample_rate } => {
            assert_eq!(*sample_rate, 16000);
            let reader = hound::WavReader::new(Cursor::new(clip.clone())).unwrap();
            assert_eq!(reader.len(), 8000);
        }
        other => panic!("expected audio, got {:?}", other),
    }

    let message = Normalizer::default().normalize(capture);
    assert_eq!(message.payload_type(), PayloadType::Binary);
    assert_eq!(message.source_device(), "microphone");

    // Window consumed
    assert!(listener.listen().unwrap().is_none());
}

#[test]
fn test_window_fits_ring_sized_for_another_rate() {
    // Ring sized for 16 kHz, device came up at 48 kHz
    let (mut producer, consumer) = sample_ring(16000, 4.0);
    let mut listener = AudioListener::new(consumer, "microphone", 48000, 2.0);
    assert_eq!(listener.window_len(), 64000);

    assert_eq!(producer.push_slice(&vec![0.25; 64000]), 64000);
    let capture = listener.listen().unwrap().expect("a full ring yields a clip");
    match &capture.content {
        CaptureContent::Audio { clip, sample_rate } => {
            assert_eq!(*sample_rate, 48000);
            let reader = hound::WavReader::new(Cursor::new(clip.clone())).unwrap();
            assert_eq!(reader.spec().sample_rate, 48000);
            assert_eq!(reader.len(), 64000);
        }
        other => panic!("expected audio, got {:?}", other),
    }
}

#[test]
fn test_voice_gate_drops_silence() {
    let (mut producer, consumer) = sample_ring(16000, 1.0);
    let mut listener = AudioListener::new(consumer, "microphone", 16000, 0.5).with_voice_gate(true);
    assert!(listener.voice_gate());

    producer.push_slice(&vec![0.0; 8000]);
    assert!(listener.listen().unwrap().is_none());
}

#[test]
fn test_voice_gate_needs_supported_rate() {
    let (_producer, consumer) = sample_ring(22050, 1.0);
    let listener = AudioListener::new(consumer, "microphone", 22050, 0.5).with_voice_gate(true);
    assert!(!listener.voice_gate());
}

#[test]
fn test_dropped_producer_reports_disconnect_once() {
    let (producer, consumer) = sample_ring(16000, 1.0);
    let mut listener = AudioListener::new(consumer, "microphone", 16000, 0.5);
    drop(producer);

    assert!(matches!(listener.listen(), Err(CaptureError::Disconnected)));
    assert!(listener.listen().unwrap().is_none());
}
