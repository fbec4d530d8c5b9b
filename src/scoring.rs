//! Scorer: turns candidate features into a 0–100 seamlessness score.
//!
//! Two scoring paths exist. The primary path produces the human-facing
//! seamlessness percentage, with a presentation-policy boost/cap pass
//! (best option reads as at least 65, nothing claims more than 95). The
//! arbitration path produces small relative scores used to rank the
//! candidates offered to the external arbitration collaborator; those
//! values never reach users.

use crate::candidates::{Candidate, Mode};
use crate::transcript::{Transcript, ends_sentence, looks_mid_sentence, starts_sentence};

/// Quietness of a normalized RMS value: 1 at silence, 0 from `1/3.5` up.
/// Non-increasing in `rms`, always within [0, 1].
pub fn quietness(rms: f32) -> f32 {
    (1.0 - (rms * 3.5).min(1.0)).clamp(0.0, 1.0)
}

/// Insertion points closer than this to either end draw a penalty.
const PROXIMITY_MS: u64 = 5000;

fn score_spoken_word(cand: &Candidate, duration_ms: u64) -> f32 {
    let silence_ms = cand.silence_ms.unwrap_or(0);
    let silence_score = silence_ms.min(1500) as f32 / 1500.0;
    let quiet_before = quietness(cand.rms_before);
    let quiet_after = quietness(cand.rms_after);

    let mut score = 45.0 * silence_score + 20.0 * quiet_before + 10.0 * quiet_after;
    if cand.sentence_boundary {
        score += 12.0;
    }
    score -= 10.0 * (1.0 - quiet_after);

    if cand.insertion_ms < PROXIMITY_MS {
        score -= 25.0;
    }
    if duration_ms.saturating_sub(cand.insertion_ms) < PROXIMITY_MS {
        score -= 25.0;
    }
    score.clamp(0.0, 100.0)
}

fn score_music(cand: &Candidate, duration_ms: u64) -> f32 {
    let valley = quietness(cand.rms_center.unwrap_or(0.0));
    let quiet_before = quietness(cand.rms_before);
    let quiet_after = quietness(cand.rms_after);

    let mut score = if cand.beat_aligned { 40.0 } else { 0.0 };
    score += 30.0 * valley + 15.0 * quiet_before + 10.0 * quiet_after;

    if cand.insertion_ms < PROXIMITY_MS {
        score -= 20.0;
    }
    if duration_ms.saturating_sub(cand.insertion_ms) < PROXIMITY_MS {
        score -= 20.0;
    }
    score.clamp(0.0, 100.0)
}

/// Score every candidate, then apply the presentation policy: when the best
/// raw score is under 65, boost the whole set uniformly so the top option
/// reads as at least 65% seamless; afterwards cap everything at 95 so the
/// system never claims certainty. The boost never reorders candidates.
pub fn score_candidates(candidates: &mut [Candidate], duration_ms: u64, mode: Mode) {
    for cand in candidates.iter_mut() {
        cand.score = match mode {
            Mode::SpokenWord => score_spoken_word(cand, duration_ms),
            Mode::Music => score_music(cand, duration_ms),
        };
    }
    if candidates.is_empty() {
        return;
    }
    let max = candidates.iter().map(|c| c.score).fold(f32::MIN, f32::max);
    if max < 65.0 {
        let bump = 65.0 - max;
        for cand in candidates.iter_mut() {
            cand.score = (cand.score + bump).clamp(0.0, 100.0);
        }
    }
    for cand in candidates.iter_mut() {
        cand.score = cand.score.min(95.0);
    }
}

// ── Arbitration ranking path ─────────────────────────────────────────────────

/// Relative scores for ranking arbitration candidates.
///
/// Spoken word leans on transcripts: long silences help, a sentence-ending
/// preceding transcript helps, a capitalized/quoted following transcript
/// helps a little, a mid-sentence preceding transcript hurts. The sentinel
/// `TRANSCRIPT_UNAVAILABLE` reads as empty text, never as content.
///
/// Music leans on features: beat alignment plus min-max-scaled energy
/// before/after, with additive penalties when the energy after the point
/// jumps past the energy before it.
pub fn arbitration_scores(
    mode: Mode,
    candidates: &[Candidate],
    before: &[Transcript],
    after: &[Transcript],
) -> Vec<f32> {
    match mode {
        Mode::SpokenWord => candidates
            .iter()
            .enumerate()
            .map(|(i, cand)| {
                let text_before = before.get(i).map_or("", Transcript::text_or_empty);
                let text_after = after.get(i).map_or("", Transcript::text_or_empty);
                let mut score = (cand.silence_ms.unwrap_or(0) as f32 / 500.0).min(2.0);
                if ends_sentence(text_before) {
                    score += 1.0;
                }
                if starts_sentence(text_after) {
                    score += 0.5;
                }
                if looks_mid_sentence(text_before) {
                    score -= 1.0;
                }
                score
            })
            .collect(),
        Mode::Music => {
            let befores: Vec<f32> = candidates.iter().map(|c| c.rms_before).collect();
            let afters: Vec<f32> = candidates.iter().map(|c| c.rms_after).collect();
            candidates
                .iter()
                .enumerate()
                .map(|(i, cand)| {
                    let mut score = if cand.beat_aligned { 1.0 } else { 0.0 };
                    score += 0.6 * min_max_scaled(&befores, i);
                    score += 0.4 * min_max_scaled(&afters, i);
                    if cand.rms_after > 1.25 * cand.rms_before {
                        score -= 0.5;
                    }
                    if cand.rms_after > 1.5 * cand.rms_before {
                        score -= 0.8;
                    }
                    score
                })
                .collect()
        }
    }
}

/// Index of the best arbitration candidate; ties go to the first occurrence.
pub fn rank_for_arbitration(
    mode: Mode,
    candidates: &[Candidate],
    before: &[Transcript],
    after: &[Transcript],
) -> Option<usize> {
    let scores = arbitration_scores(mode, candidates, before, after);
    let mut best: Option<usize> = None;
    for (i, score) in scores.iter().enumerate() {
        match best {
            Some(b) if scores[b] >= *score => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Min-max scale `values[i]` across the whole slice to [0, 1]; all zeros
/// when the slice is constant.
fn min_max_scaled(values: &[f32], i: usize) -> f32 {
    let min = values.iter().cloned().fold(f32::MAX, f32::min);
    let max = values.iter().cloned().fold(f32::MIN, f32::max);
    if max <= min {
        return 0.0;
    }
    (values[i] - min) / (max - min)
}
