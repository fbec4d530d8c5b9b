//! In-memory PCM sample buffer and the pure editing primitives built on it.
//!
//! A `SampleBuffer` is immutable once created: every edit (slice, gain, fade,
//! overlay, crossfaded append) returns a new buffer and leaves its inputs
//! untouched, so pipeline stages compose without aliasing concerns.

/// Sample rate every pipeline stage expects after standardization.
pub const STANDARD_SAMPLE_RATE: u32 = 44100;

/// Channel count every pipeline stage expects after standardization.
pub const STANDARD_CHANNELS: u16 = 2;

/// Interleaved f32 PCM audio with sample-rate and channel metadata.
///
/// Samples are normalized to [-1.0, 1.0]; full scale is 1.0, so a raw RMS
/// over these samples is already the normalized RMS downstream stages use.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl SampleBuffer {
    /// Build a buffer from interleaved samples.
    ///
    /// A trailing partial frame (sample count not divisible by the channel
    /// count) is truncated so frame math stays exact.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, String> {
        if sample_rate == 0 {
            return Err("Sample rate must be non-zero".to_string());
        }
        if channels == 0 {
            return Err("Channel count must be non-zero".to_string());
        }
        let remainder = samples.len() % channels as usize;
        if remainder != 0 {
            samples.truncate(samples.len() - remainder);
        }
        Ok(SampleBuffer {
            samples,
            sample_rate,
            channels,
        })
    }

    /// A buffer of digital silence with the given duration.
    pub fn silent(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let frames = (duration_ms * sample_rate as u64 / 1000) as usize;
        SampleBuffer {
            samples: vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        }
    }

    /// A zero-length buffer with the given format.
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        SampleBuffer {
            samples: Vec::new(),
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one frame = one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in integer milliseconds: `frames / sample_rate * 1000`.
    pub fn duration_ms(&self) -> u64 {
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame index for a millisecond offset, clamped to the buffer length.
    pub fn frame_at_ms(&self, ms: u64) -> usize {
        ((ms * self.sample_rate as u64 / 1000) as usize).min(self.frames())
    }

    /// Extract `[start_ms, end_ms)` as a new buffer. Bounds are clamped to
    /// the buffer; an inverted range yields an empty buffer.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> SampleBuffer {
        let start = self.frame_at_ms(start_ms) * self.channels as usize;
        let end = self.frame_at_ms(end_ms.max(start_ms)) * self.channels as usize;
        SampleBuffer {
            samples: self.samples[start..end.max(start)].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Apply a uniform gain in decibels.
    pub fn gain_db(&self, db: f32) -> SampleBuffer {
        let factor = db_to_amplitude(db);
        SampleBuffer {
            samples: self.samples.iter().map(|s| s * factor).collect(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Linear amplitude ramp from 0 to 1 over the first `fade_ms`.
    pub fn fade_in_ms(&self, fade_ms: u64) -> SampleBuffer {
        let fade_frames = self.frame_at_ms(fade_ms);
        let mut samples = self.samples.clone();
        apply_ramp(&mut samples, self.channels as usize, fade_frames, false);
        SampleBuffer {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Linear amplitude ramp from 1 to 0 over the last `fade_ms`.
    pub fn fade_out_ms(&self, fade_ms: u64) -> SampleBuffer {
        let fade_frames = self.frame_at_ms(fade_ms);
        let mut samples = self.samples.clone();
        apply_ramp(&mut samples, self.channels as usize, fade_frames, true);
        SampleBuffer {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Mix `other` on top of this buffer starting at `position_ms`.
    ///
    /// The result keeps this buffer's length; any part of `other` that runs
    /// past the end is dropped. Sample sums are clamped to [-1, 1].
    pub fn overlay(&self, other: &SampleBuffer, position_ms: u64) -> Result<SampleBuffer, String> {
        self.check_format(other)?;
        let mut samples = self.samples.clone();
        let offset = self.frame_at_ms(position_ms) * self.channels as usize;
        for (i, s) in other.samples.iter().enumerate() {
            let Some(slot) = samples.get_mut(offset + i) else {
                break;
            };
            *slot = (*slot + s).clamp(-1.0, 1.0);
        }
        Ok(SampleBuffer {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }

    /// Repeat this buffer until `target_ms` is covered, then truncate.
    /// An empty buffer loops to pure silence.
    pub fn loop_to_length_ms(&self, target_ms: u64) -> SampleBuffer {
        if self.samples.is_empty() {
            return SampleBuffer::silent(target_ms, self.sample_rate, self.channels);
        }
        let target_samples =
            (target_ms * self.sample_rate as u64 / 1000) as usize * self.channels as usize;
        let mut samples = Vec::with_capacity(target_samples);
        while samples.len() < target_samples {
            let take = (target_samples - samples.len()).min(self.samples.len());
            samples.extend_from_slice(&self.samples[..take]);
        }
        SampleBuffer {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Append `other` after this buffer, overlapping by `crossfade_ms` with
    /// complementary linear fades. The overlap is clipped to the shorter of
    /// the two buffers; the result is `self + other - overlap` long.
    pub fn append_crossfade(
        &self,
        other: &SampleBuffer,
        crossfade_ms: u64,
    ) -> Result<SampleBuffer, String> {
        self.check_format(other)?;
        let ch = self.channels as usize;
        let cf_frames = self
            .frame_at_ms(crossfade_ms)
            .min(self.frames())
            .min(other.frames());
        let cf_samples = cf_frames * ch;

        let keep = self.samples.len() - cf_samples;
        let mut samples = Vec::with_capacity(self.samples.len() + other.samples.len() - cf_samples);
        samples.extend_from_slice(&self.samples[..keep]);

        for frame in 0..cf_frames {
            let t = (frame + 1) as f32 / (cf_frames + 1) as f32;
            for c in 0..ch {
                let tail = self.samples[keep + frame * ch + c] * (1.0 - t);
                let head = other.samples[frame * ch + c] * t;
                samples.push((tail + head).clamp(-1.0, 1.0));
            }
        }

        samples.extend_from_slice(&other.samples[cf_samples..]);
        Ok(SampleBuffer {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }

    /// RMS over the entire buffer. Full scale is 1.0, so this is already the
    /// normalized value in [0, 1].
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (sum_sq / self.samples.len() as f64).sqrt() as f32
    }

    /// Normalized RMS over `[start_ms, end_ms)`. Negative starts clamp to 0
    /// and an empty window reads as 0.
    pub fn rms_window_ms(&self, start_ms: i64, end_ms: i64) -> f32 {
        let start = start_ms.max(0) as u64;
        let end = end_ms.max(start_ms.max(0)) as u64;
        self.slice_ms(start, end).rms()
    }

    /// Overall loudness in dBFS. `None` for an empty buffer or exact digital
    /// silence (which would otherwise be negative infinity).
    pub fn dbfs(&self) -> Option<f32> {
        let rms = self.rms();
        if rms <= 0.0 {
            None
        } else {
            Some(20.0 * rms.log10())
        }
    }

    fn check_format(&self, other: &SampleBuffer) -> Result<(), String> {
        if self.sample_rate != other.sample_rate || self.channels != other.channels {
            return Err(format!(
                "Buffer format mismatch: {} Hz/{} ch vs {} Hz/{} ch",
                self.sample_rate, self.channels, other.sample_rate, other.channels
            ));
        }
        Ok(())
    }
}

/// Convert a decibel gain to a linear amplitude factor.
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Apply a linear ramp over the first (or last, when `reverse`) `fade_frames`.
fn apply_ramp(samples: &mut [f32], channels: usize, fade_frames: usize, reverse: bool) {
    if fade_frames == 0 {
        return;
    }
    let total_frames = samples.len() / channels;
    let fade_frames = fade_frames.min(total_frames);
    for i in 0..fade_frames {
        let gain = (i + 1) as f32 / (fade_frames + 1) as f32;
        let frame = if reverse { total_frames - 1 - i } else { i };
        for c in 0..channels {
            samples[frame * channels + c] *= gain;
        }
    }
}
