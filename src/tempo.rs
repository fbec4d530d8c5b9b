//! Music-mode analysis: tempo estimate, beat grid, and energy valleys.
//!
//! The recording is mixed down to a single analysis channel, an onset-flux
//! envelope is computed over short frames, and the tempo is taken from the
//! autocorrelation peak of that envelope in the 60–180 BPM range. Beats are
//! laid on a fixed grid at the estimated period, phased to line up with the
//! strongest onsets. Independently, the 12 lowest-RMS sliding windows
//! ("energy valleys") become insertion-point candidates, each snapped to
//! the nearest beat when a beat grid exists.

use crate::buffer::SampleBuffer;

/// Tempo range considered by the autocorrelation search.
const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 180.0;

/// Onset envelope hop, in ms (frame is twice the hop).
const ONSET_HOP_MS: u64 = 10;

/// Energy-valley scan parameters: 50 ms frames on a 25 ms hop, keeping the
/// 12 quietest frames.
const VALLEY_FRAME_MS: u64 = 50;
const VALLEY_HOP_MS: u64 = 25;
const VALLEY_COUNT: usize = 12;

/// Result of analyzing a music recording.
#[derive(Debug, Clone, Default)]
pub struct SongAnalysis {
    /// Estimated tempo in BPM, when the signal supports an estimate.
    pub tempo: Option<f64>,
    /// Beat timestamps in ms, ascending.
    pub beat_times_ms: Vec<u64>,
    /// Candidate insertion points: energy valleys snapped to the nearest
    /// beat, deduplicated, in valley-depth discovery order.
    pub candidates_ms: Vec<u64>,
}

/// Analyze a recording for tempo, beats, and valley candidates.
pub fn analyze(buffer: &SampleBuffer) -> SongAnalysis {
    let mono = mixdown(buffer);
    if mono.is_empty() {
        return SongAnalysis::default();
    }
    let rate = buffer.sample_rate();

    let (tempo, beat_times_ms) = track_beats(&mono, rate, buffer.duration_ms());
    let valleys = energy_valleys(&mono, rate, VALLEY_FRAME_MS, VALLEY_HOP_MS, VALLEY_COUNT);
    let candidates_ms = snap_to_beats(&valleys, &beat_times_ms);

    SongAnalysis {
        tempo,
        beat_times_ms,
        candidates_ms,
    }
}

/// Mix interleaved channels down to a single analysis channel.
fn mixdown(buffer: &SampleBuffer) -> Vec<f32> {
    let ch = buffer.channels() as usize;
    if ch == 1 {
        return buffer.samples().to_vec();
    }
    buffer
        .samples()
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Onset-strength envelope: half-wave-rectified energy flux over frames of
/// twice the hop length.
fn onset_envelope(samples: &[f32], rate: u32) -> Vec<f64> {
    let hop = (rate as u64 * ONSET_HOP_MS / 1000).max(1) as usize;
    let frame = hop * 2;
    if samples.len() < frame {
        return Vec::new();
    }
    let energies: Vec<f64> = (0..=(samples.len() - frame))
        .step_by(hop)
        .map(|start| {
            samples[start..start + frame]
                .iter()
                .map(|s| (*s as f64) * (*s as f64))
                .sum::<f64>()
                / frame as f64
        })
        .collect();
    energies
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect()
}

/// Estimate tempo and lay out a beat grid. Returns `(None, empty)` when the
/// envelope carries no onsets (silence or a featureless signal).
fn track_beats(samples: &[f32], rate: u32, duration_ms: u64) -> (Option<f64>, Vec<u64>) {
    let flux = onset_envelope(samples, rate);
    let total: f64 = flux.iter().sum();
    if flux.is_empty() || total <= f64::EPSILON {
        return (None, Vec::new());
    }

    let frames_per_sec = 1000.0 / ONSET_HOP_MS as f64;
    let min_lag = ((frames_per_sec * 60.0 / MAX_BPM).floor() as usize).max(1);
    let max_lag = ((frames_per_sec * 60.0 / MIN_BPM).ceil() as usize).min(flux.len() - 1);
    if min_lag > max_lag {
        return (None, Vec::new());
    }

    // Autocorrelation peak in the candidate lag range; ties go to the
    // smaller lag (faster tempo).
    let mut best_lag = 0;
    let mut best_score = 0.0f64;
    for lag in min_lag..=max_lag {
        let n = flux.len() - lag;
        let score: f64 = (0..n).map(|i| flux[i] * flux[i + lag]).sum::<f64>() / n as f64;
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }
    if best_lag == 0 || best_score <= f64::EPSILON {
        return (None, Vec::new());
    }

    let tempo = 60.0 * frames_per_sec / best_lag as f64;

    // Phase the grid where the onset envelope is strongest.
    let mut best_phase = 0;
    let mut best_energy = -1.0f64;
    for phase in 0..best_lag {
        let energy: f64 = (phase..flux.len()).step_by(best_lag).map(|i| flux[i]).sum();
        if energy > best_energy {
            best_energy = energy;
            best_phase = phase;
        }
    }

    let period_ms = best_lag as u64 * ONSET_HOP_MS;
    let mut beats = Vec::new();
    let mut t = best_phase as u64 * ONSET_HOP_MS;
    while t < duration_ms {
        beats.push(t);
        t += period_ms;
    }
    (Some(tempo), beats)
}

/// Timestamps (ms) of the `top_k` lowest-RMS sliding windows, in ascending
/// order of RMS (deepest valley first).
pub fn energy_valleys(
    samples: &[f32],
    rate: u32,
    frame_ms: u64,
    hop_ms: u64,
    top_k: usize,
) -> Vec<u64> {
    let frame = (rate as u64 * frame_ms / 1000).max(1) as usize;
    let hop = (rate as u64 * hop_ms / 1000).max(1) as usize;
    if samples.len() < frame {
        return vec![0];
    }
    let rms: Vec<f64> = (0..=(samples.len() - frame))
        .step_by(hop)
        .map(|start| {
            let sum_sq: f64 = samples[start..start + frame]
                .iter()
                .map(|s| (*s as f64) * (*s as f64))
                .sum();
            (sum_sq / frame as f64).sqrt()
        })
        .collect();

    let mut order: Vec<usize> = (0..rms.len()).collect();
    order.sort_by(|a, b| rms[*a].partial_cmp(&rms[*b]).unwrap_or(std::cmp::Ordering::Equal));
    order
        .into_iter()
        .take(top_k)
        .map(|idx| idx as u64 * hop as u64 * 1000 / rate as u64)
        .collect()
}

/// Snap each valley to its nearest beat (when beats exist), dropping
/// duplicates while preserving first-occurrence order.
pub fn snap_to_beats(valleys_ms: &[u64], beat_times_ms: &[u64]) -> Vec<u64> {
    let mut out = Vec::new();
    for &valley in valleys_ms {
        let snapped = if beat_times_ms.is_empty() {
            valley
        } else {
            *beat_times_ms
                .iter()
                .min_by_key(|b| b.abs_diff(valley))
                .unwrap_or(&valley)
        };
        if !out.contains(&snapped) {
            out.push(snapped);
        }
    }
    out
}
