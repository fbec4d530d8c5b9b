//! Loudness Matcher: EBU R128 integrated loudness and gain matching.
//!
//! Promo material is matched against the loudness of the host audio
//! surrounding the insertion point rather than the whole program, so an
//! ad landing in a quiet passage is not deafening. `-70.0` LUFS is the
//! meter floor and stands in for "silent or unmeasurable".

use ebur128::{EbuR128, Mode};

use crate::buffer::SampleBuffer;

/// Integrated loudness reported for silent or unmeasurable audio.
pub const SILENCE_LUFS: f64 = -70.0;

/// Result of matching one buffer's loudness to a target.
#[derive(Debug, Clone)]
pub struct LoudnessMatch {
    pub matched: SampleBuffer,
    pub target_lufs: f64,
    pub before_lufs: f64,
    pub after_lufs: f64,
}

/// Integrated (EBU R128 "I") loudness of a buffer, or [`SILENCE_LUFS`]
/// when the buffer is empty or too quiet to measure.
pub fn measure_lufs(buffer: &SampleBuffer) -> Result<f64, String> {
    if buffer.is_empty() {
        return Ok(SILENCE_LUFS);
    }
    let mut meter = EbuR128::new(
        buffer.channels() as u32,
        buffer.sample_rate(),
        Mode::I,
    )
    .map_err(|err| format!("failed to create loudness meter: {err}"))?;
    meter
        .add_frames_f32(buffer.samples())
        .map_err(|err| format!("failed to feed loudness meter: {err}"))?;
    let lufs = meter
        .loudness_global()
        .map_err(|err| format!("failed to compute integrated loudness: {err}"))?;
    if !lufs.is_finite() || lufs < SILENCE_LUFS {
        return Ok(SILENCE_LUFS);
    }
    Ok(lufs)
}

/// Apply a flat gain so `buffer` measures `target_lufs`. A silent buffer
/// or a silent target leaves the audio untouched; only the measurements
/// are reported.
pub fn match_loudness(buffer: &SampleBuffer, target_lufs: f64) -> Result<LoudnessMatch, String> {
    let before_lufs = measure_lufs(buffer)?;
    if before_lufs <= SILENCE_LUFS || target_lufs <= SILENCE_LUFS {
        return Ok(LoudnessMatch {
            matched: buffer.clone(),
            target_lufs,
            before_lufs,
            after_lufs: before_lufs,
        });
    }
    let gain_db = target_lufs - before_lufs;
    let matched = buffer.gain_db(gain_db as f32);
    let after_lufs = measure_lufs(&matched)?;
    Ok(LoudnessMatch {
        matched,
        target_lufs,
        before_lufs,
        after_lufs,
    })
}

/// Slice of host audio around an insertion point, used as the loudness
/// reference for the inserted material. The window is clamped to the
/// buffer, so points near either end simply see a shorter context.
pub fn context_window(host: &SampleBuffer, insertion_ms: u64, half_window_ms: u64) -> SampleBuffer {
    let start = insertion_ms.saturating_sub(half_window_ms);
    let end = insertion_ms + half_window_ms;
    host.slice_ms(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{STANDARD_CHANNELS, STANDARD_SAMPLE_RATE, SampleBuffer};

    fn tone(duration_ms: u64, amplitude: f32) -> SampleBuffer {
        let rate = STANDARD_SAMPLE_RATE;
        let frames = (duration_ms * rate as u64 / 1000) as usize;
        let mut samples = Vec::with_capacity(frames * 2);
        for n in 0..frames {
            let t = n as f32 / rate as f32;
            let v = amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            samples.push(v);
            samples.push(v);
        }
        SampleBuffer::new(samples, rate, STANDARD_CHANNELS).unwrap()
    }

    #[test]
    fn silence_measures_at_floor() {
        let buf = SampleBuffer::silent(5000, STANDARD_SAMPLE_RATE, STANDARD_CHANNELS);
        assert_eq!(measure_lufs(&buf).unwrap(), SILENCE_LUFS);
        let empty = SampleBuffer::empty(STANDARD_SAMPLE_RATE, STANDARD_CHANNELS);
        assert_eq!(measure_lufs(&empty).unwrap(), SILENCE_LUFS);
    }

    #[test]
    fn louder_tone_measures_louder() {
        let quiet = measure_lufs(&tone(5000, 0.05)).unwrap();
        let loud = measure_lufs(&tone(5000, 0.5)).unwrap();
        assert!(loud > quiet);
        // A 20 dB amplitude step should read close to 20 LU.
        assert!((loud - quiet - 20.0).abs() < 1.0, "delta={}", loud - quiet);
    }

    #[test]
    fn matching_converges_to_target() {
        let promo = tone(5000, 0.05);
        let target = measure_lufs(&tone(5000, 0.3)).unwrap();
        let result = match_loudness(&promo, target).unwrap();
        assert!((result.after_lufs - target).abs() < 0.5, "after={}", result.after_lufs);
        assert_eq!(result.matched.duration_ms(), promo.duration_ms());
    }

    #[test]
    fn matching_already_at_target_is_noop_gain() {
        let promo = tone(5000, 0.3);
        let target = measure_lufs(&promo).unwrap();
        let result = match_loudness(&promo, target).unwrap();
        assert!((result.after_lufs - result.before_lufs).abs() < 0.1);
    }

    #[test]
    fn silent_target_leaves_audio_untouched() {
        let promo = tone(2000, 0.3);
        let result = match_loudness(&promo, SILENCE_LUFS).unwrap();
        assert_eq!(result.matched.samples(), promo.samples());
    }

    #[test]
    fn silent_promo_is_not_amplified() {
        let promo = SampleBuffer::silent(2000, STANDARD_SAMPLE_RATE, STANDARD_CHANNELS);
        let result = match_loudness(&promo, -16.0).unwrap();
        assert_eq!(result.before_lufs, SILENCE_LUFS);
        assert!(result.matched.samples().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn context_window_clamps_at_edges() {
        let host = tone(10000, 0.2);
        let mid = context_window(&host, 5000, 2000);
        assert_eq!(mid.duration_ms(), 4000);
        let start = context_window(&host, 1000, 4000);
        assert_eq!(start.duration_ms(), 5000);
        let end = context_window(&host, 9500, 4000);
        assert_eq!(end.duration_ms(), 4500);
    }
}
