//! Candidate model and the insertion-point Generator.
//!
//! Spoken-word mode derives candidates from silent intervals; music mode
//! derives them from beat-snapped energy valleys (computed in `tempo`).
//! Both modes pad a thin set with uniformly spaced fallback points and
//! truncate an oversized one, so downstream stages always see a workable
//! set. The Generator never fails: an empty recording yields a single
//! zeroed candidate at time 0 — fatal input errors belong to loading.

use crate::buffer::SampleBuffer;
use crate::config::{CandidateConfig, PathwayParams};
use crate::tempo::SongAnalysis;
use std::collections::HashSet;

/// Analysis mode for a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SpokenWord,
    Music,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::SpokenWord => "spoken_word",
            Mode::Music => "music",
        }
    }
}

// Provenance tags recorded on each candidate.
pub const NOTE_SILENCE: &str = "silence";
pub const NOTE_FALLBACK: &str = "fallback";
pub const NOTE_BEAT: &str = "beat";
pub const NOTE_ENERGY: &str = "energy";

/// One potential insertion instant in the host recording.
///
/// Created by the Generator, enriched by the Feature Extractor, scored by
/// the Scorer, and read (never mutated) by the Selector.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Insertion point, in ms from the start of the recording.
    pub insertion_ms: u64,
    /// Length of the silent interval this candidate sits in (spoken-word
    /// mode only).
    pub silence_ms: Option<u64>,
    /// Normalized RMS in the window before the insertion point.
    pub rms_before: f32,
    /// Normalized RMS in the window after the insertion point.
    pub rms_after: f32,
    /// Normalized RMS in a narrow window around the point (music mode only).
    pub rms_center: Option<f32>,
    /// Whether a beat lies within the pathway's tolerance (music mode only).
    pub beat_aligned: bool,
    /// Whether the preceding transcript ends a sentence (spoken-word mode,
    /// best-effort).
    pub sentence_boundary: bool,
    /// Provenance tag: "silence" | "fallback" | "beat" | "energy", with
    /// ",boundary" appended when a sentence boundary is confirmed.
    pub notes: String,
    /// Seamlessness score, 0–100. Written once by the Scorer.
    pub score: f32,
}

impl Candidate {
    /// A bare candidate with zeroed metrics.
    pub fn at(insertion_ms: u64, notes: &str) -> Self {
        Candidate {
            insertion_ms,
            silence_ms: None,
            rms_before: 0.0,
            rms_after: 0.0,
            rms_center: None,
            beat_aligned: false,
            sentence_boundary: false,
            notes: notes.to_string(),
            score: 0.0,
        }
    }
}

/// Silence threshold for a recording: 16 dB under its overall loudness, or
/// a fixed −40 dBFS floor when the recording is digital silence.
pub fn silence_threshold_db(buffer: &SampleBuffer) -> f32 {
    match buffer.dbfs() {
        Some(dbfs) => dbfs - 16.0,
        None => -40.0,
    }
}

/// Analysis hop for the silence scan, in ms.
const SILENCE_FRAME_MS: u64 = 10;

/// Scan the recording for silent intervals: runs of consecutive 10 ms
/// frames whose RMS sits below `threshold_db`, at least `min_silence_ms`
/// long. Returns `[start_ms, end_ms)` pairs in ascending order; a run that
/// reaches the end of the recording is included.
pub fn detect_silence_intervals(
    buffer: &SampleBuffer,
    min_silence_ms: u64,
    threshold_db: f32,
) -> Vec<(u64, u64)> {
    let duration = buffer.duration_ms();
    if duration == 0 {
        return Vec::new();
    }
    let threshold_rms = crate::buffer::db_to_amplitude(threshold_db);

    let mut intervals = Vec::new();
    let mut run_start: Option<u64> = None;
    let mut pos = 0u64;
    while pos < duration {
        let end = (pos + SILENCE_FRAME_MS).min(duration);
        let rms = buffer.rms_window_ms(pos as i64, end as i64);
        if rms < threshold_rms {
            if run_start.is_none() {
                run_start = Some(pos);
            }
        } else if let Some(start) = run_start.take() {
            if pos - start >= min_silence_ms {
                intervals.push((start, pos));
            }
        }
        pos = end;
    }
    if let Some(start) = run_start {
        if duration - start >= min_silence_ms {
            intervals.push((start, duration));
        }
    }
    intervals
}

/// Uniformly spaced fallback points over the central portion of the
/// recording (by default 15%–85% of the duration).
pub fn fallback_points(duration_ms: u64, cfg: &CandidateConfig) -> Vec<u64> {
    if duration_ms == 0 {
        return vec![0];
    }
    let start = (duration_ms as f64 * cfg.fallback_start_frac) as u64;
    let end = (duration_ms as f64 * cfg.fallback_end_frac) as u64;
    if end <= start {
        return vec![duration_ms / 2];
    }
    let count = cfg.fallback_count.max(1);
    if count == 1 {
        return vec![(start + end) / 2];
    }
    let span = (end - start) as f64;
    (0..count)
        .map(|i| start + (span * i as f64 / (count - 1) as f64).round() as u64)
        .collect()
}

/// Produce raw insertion-point candidates for the recording.
///
/// Music mode requires the `song` analysis (tempo/beats/valleys from
/// `tempo::analyze`); it is ignored for spoken word.
pub fn generate(
    buffer: &SampleBuffer,
    mode: Mode,
    song: Option<&SongAnalysis>,
    params: &PathwayParams,
    cfg: &CandidateConfig,
) -> Vec<Candidate> {
    if buffer.is_empty() {
        return vec![Candidate::at(0, NOTE_FALLBACK)];
    }
    let mut candidates = match mode {
        Mode::SpokenWord => spoken_word_candidates(buffer, params),
        Mode::Music => music_candidates(buffer, song, cfg),
    };
    pad_with_fallback(&mut candidates, buffer.duration_ms(), mode, cfg);
    truncate_largest_silence(&mut candidates, cfg.max_candidates);
    candidates
}

fn spoken_word_candidates(buffer: &SampleBuffer, params: &PathwayParams) -> Vec<Candidate> {
    let threshold = silence_threshold_db(buffer);
    let intervals = detect_silence_intervals(buffer, params.min_silence_ms, threshold);

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for (start, end) in intervals {
        let mid = (start + end) / 2;
        if !seen.insert(mid) {
            continue;
        }
        let mut cand = Candidate::at(mid, NOTE_SILENCE);
        cand.silence_ms = Some(end - start);
        candidates.push(cand);
    }
    candidates
}

fn music_candidates(
    buffer: &SampleBuffer,
    song: Option<&SongAnalysis>,
    cfg: &CandidateConfig,
) -> Vec<Candidate> {
    let times: Vec<u64> = match song {
        Some(analysis) if !analysis.candidates_ms.is_empty() => analysis.candidates_ms.clone(),
        _ => fallback_points(buffer.duration_ms(), cfg),
    };
    times
        .into_iter()
        .map(|ms| Candidate::at(ms, NOTE_ENERGY))
        .collect()
}

/// Pad a thin candidate set with fallback points, skipping collisions,
/// until the pad target is reached or fallback points run out.
fn pad_with_fallback(candidates: &mut Vec<Candidate>, duration_ms: u64, mode: Mode, cfg: &CandidateConfig) {
    if candidates.len() >= cfg.min_candidates {
        return;
    }
    let mut existing: HashSet<u64> = candidates.iter().map(|c| c.insertion_ms).collect();
    for point in fallback_points(duration_ms, cfg) {
        if existing.contains(&point) {
            continue;
        }
        let mut cand = Candidate::at(point, NOTE_FALLBACK);
        if mode == Mode::SpokenWord {
            cand.silence_ms = Some(0);
        }
        candidates.push(cand);
        existing.insert(point);
        if candidates.len() >= cfg.pad_target {
            break;
        }
    }
}

/// Keep the `max` candidates with the largest silence intervals, then
/// restore ascending time order. The sort is stable, so for music mode
/// (no silences) discovery order decides.
fn truncate_largest_silence(candidates: &mut Vec<Candidate>, max: usize) {
    if candidates.len() <= max {
        return;
    }
    candidates.sort_by(|a, b| b.silence_ms.unwrap_or(0).cmp(&a.silence_ms.unwrap_or(0)));
    candidates.truncate(max);
    candidates.sort_by_key(|c| c.insertion_ms);
}
