//! Audio file I/O: decode anything rodio can read, standardize it to the
//! engine's canonical format, and export WAV.
//!
//! All analysis and splicing assumes 44.1 kHz stereo; `load_audio` does the
//! resampling and channel mapping once, at the boundary.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, Source};

use crate::buffer::{STANDARD_CHANNELS, STANDARD_SAMPLE_RATE, SampleBuffer};

/// Decode an audio file and standardize it to 44.1 kHz stereo.
pub fn load_audio(path: &Path) -> Result<SampleBuffer, String> {
    let file = File::open(path)
        .map_err(|e| format!("Cannot open '{}': {}", path.display(), e))?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Cannot decode '{}': {}", path.display(), e))?;

    let channels = source.channels();
    let sample_rate = source.sample_rate();
    let samples: Vec<f32> = source.convert_samples::<f32>().collect();

    let raw = SampleBuffer::new(samples, sample_rate, channels)?;
    Ok(standardize(&raw))
}

/// Convert any buffer to the canonical 44.1 kHz stereo format. Mono is
/// duplicated to both channels; more than two channels are mixed down to
/// mono first. Resampling is linear, which is plenty for insertion-point
/// analysis and speech-adjacent material.
pub fn standardize(buffer: &SampleBuffer) -> SampleBuffer {
    if buffer.sample_rate() == STANDARD_SAMPLE_RATE && buffer.channels() == STANDARD_CHANNELS {
        return buffer.clone();
    }

    let channels = buffer.channels() as usize;
    let frames = buffer.frames();

    // Per-frame stereo pairs at the source rate.
    let stereo_at = |frame: usize| -> (f32, f32) {
        let base = frame * channels;
        let samples = buffer.samples();
        match channels {
            1 => {
                let v = samples[base];
                (v, v)
            }
            2 => (samples[base], samples[base + 1]),
            n => {
                let sum: f32 = samples[base..base + n].iter().sum();
                let v = sum / n as f32;
                (v, v)
            }
        }
    };

    let out_frames = if buffer.sample_rate() == STANDARD_SAMPLE_RATE {
        frames
    } else {
        (frames as u64 * STANDARD_SAMPLE_RATE as u64 / buffer.sample_rate() as u64) as usize
    };

    let mut out = Vec::with_capacity(out_frames * 2);
    if frames == 0 {
        return SampleBuffer::empty(STANDARD_SAMPLE_RATE, STANDARD_CHANNELS);
    }
    let step = buffer.sample_rate() as f64 / STANDARD_SAMPLE_RATE as f64;
    for n in 0..out_frames {
        let pos = n as f64 * step;
        let i0 = pos.floor() as usize;
        let i1 = (i0 + 1).min(frames - 1);
        let frac = (pos - i0 as f64) as f32;
        let i0 = i0.min(frames - 1);
        let (l0, r0) = stereo_at(i0);
        let (l1, r1) = stereo_at(i1);
        out.push(l0 + (l1 - l0) * frac);
        out.push(r0 + (r1 - r0) * frac);
    }

    SampleBuffer::new(out, STANDARD_SAMPLE_RATE, STANDARD_CHANNELS)
        .unwrap_or_else(|_| SampleBuffer::empty(STANDARD_SAMPLE_RATE, STANDARD_CHANNELS))
}

/// Write a buffer out as 16-bit PCM WAV.
pub fn export_wav(buffer: &SampleBuffer, path: &Path) -> Result<(), String> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("Cannot create '{}': {}", path.display(), e))?;
    for &sample in buffer.samples() {
        let v = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(v)
            .map_err(|e| format!("Failed writing '{}': {}", path.display(), e))?;
    }
    writer
        .finalize()
        .map_err(|e| format!("Failed finalizing '{}': {}", path.display(), e))?;
    Ok(())
}
