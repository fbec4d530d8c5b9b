//! End-to-end pipelines: slot recommendation and promo insertion.
//!
//! `recommend_slots` is the read-only path: analyze, score, and report the
//! best insertion slots without touching the audio. `insert_promo` is the
//! write path: pick a point (arbitrated or heuristic), condition the promo
//! (loudness match, fades, room tone), and splice it into the host.

use serde::{Deserialize, Serialize};

use crate::arbiter::{
    Arbiter, ArbitrationCandidate, ArbitrationOutcome, ArbitrationRequest, resolve,
};
use crate::buffer::SampleBuffer;
use crate::candidates::{self, Candidate, Mode};
use crate::config::{CandidateConfig, InsertionConfig, PathwayParams, SpliceConfig};
use crate::features;
use crate::loudness;
use crate::scoring;
use crate::select::{self, DEFAULT_MIN_SEP_MS, RecommendationReport};
use crate::splice;
use crate::tempo::{self, SongAnalysis};
use crate::transcript::Transcriber;

/// Analyze `host` and report the best insertion slots.
///
/// Music mode runs tempo analysis first; spoken-word mode runs silence
/// detection and transcript boundary checks through `transcriber`.
pub fn recommend_slots(
    host: &SampleBuffer,
    mode: Mode,
    transcriber: &dyn Transcriber,
    params: &PathwayParams,
    cand_cfg: &CandidateConfig,
    top_n: usize,
    debug: bool,
) -> Result<RecommendationReport, String> {
    let duration_ms = host.duration_ms();

    let song = match mode {
        Mode::Music => Some(tempo::analyze(host)),
        Mode::SpokenWord => None,
    };
    let mut cands = candidates::generate(host, mode, song.as_ref(), params, cand_cfg);

    let beat_times: &[u64] = song.as_ref().map_or(&[], |s| &s.beat_times_ms);
    features::extract(host, &mut cands, mode, beat_times, params);
    if mode == Mode::SpokenWord {
        features::apply_transcript_boundaries(host, &mut cands, transcriber, params);
    }
    scoring::score_candidates(&mut cands, duration_ms, mode);

    let selected = select::select_top(&cands, top_n.max(1), DEFAULT_MIN_SEP_MS);
    Ok(select::build_report(duration_ms, mode, &cands, &selected, debug))
}

/// First candidate at or past `min_offset_ms`; failing that, the earliest
/// candidate; failing that, `min_offset_ms` itself.
pub fn choose_default_insertion(candidates_ms: &[u64], min_offset_ms: u64) -> u64 {
    if candidates_ms.is_empty() {
        return min_offset_ms;
    }
    let mut sorted = candidates_ms.to_vec();
    sorted.sort_unstable();
    for ms in &sorted {
        if *ms >= min_offset_ms {
            return *ms;
        }
    }
    candidates_ms[0]
}

/// Keep candidates inside `[min_offset, duration - end_buffer]`. When the
/// window eats everything, the unfiltered list comes back rather than an
/// empty one, so downstream always has something to choose from.
pub fn filter_candidates(candidates_ms: &[u64], duration_ms: u64, cfg: &InsertionConfig) -> Vec<u64> {
    let max_allowed = duration_ms.saturating_sub(cfg.end_buffer_ms);
    let filtered: Vec<u64> = candidates_ms
        .iter()
        .copied()
        .filter(|ms| *ms >= cfg.min_offset_ms && *ms <= max_allowed)
        .collect();
    if filtered.is_empty() {
        candidates_ms.to_vec()
    } else {
        filtered
    }
}

fn build_prompt_candidates(
    host: &SampleBuffer,
    candidates_ms: &[u64],
    transcriber: &dyn Transcriber,
    params: &PathwayParams,
) -> Vec<ArbitrationCandidate> {
    candidates_ms
        .iter()
        .enumerate()
        .map(|(i, ms)| {
            let snippet = if i < params.max_snippets {
                let start = ms.saturating_sub(params.snippet_window_ms) as i64;
                transcriber
                    .transcribe(host, start, *ms as i64)
                    .text()
                    .unwrap_or("")
                    .to_string()
            } else {
                String::new()
            };
            ArbitrationCandidate { ms: *ms, snippet }
        })
        .collect()
}

/// Sponsor metadata attached to an insertion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sponsor {
    pub name: String,
    pub blurb: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Loudness numbers recorded for the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoudnessReport {
    pub target_lufs: f64,
    pub promo_before_lufs: f64,
    pub promo_after_lufs: f64,
}

/// Everything `insert_promo` did, for logs and debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertReport {
    pub mode: String,
    pub chosen_insertion_ms: u64,
    pub candidates_ms: Vec<u64>,
    pub candidates_for_prompt_ms: Vec<u64>,
    /// Why the heuristic choice was used instead of the arbiter's, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arbitration_fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined_text: Option<String>,
    pub loudness: LoudnessReport,
}

/// A spliced host plus the record of how it was made.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub merged: SampleBuffer,
    pub report: InsertReport,
}

/// Insert `promo` into `host` at the best available point.
///
/// The promo must not exceed the configured maximum length. Candidate
/// points are generated, windowed to the allowed insertion range, and
/// offered to `arbiter`; a rejected or declined arbitration falls back to
/// the heuristic default, and an accepted choice that lands outside the
/// allowed range is also overridden. The promo is loudness-matched to the
/// host audio around the chosen point, faded, bedded on room tone (spoken
/// word only), and spliced in with crossfades.
pub fn insert_promo(
    host: &SampleBuffer,
    promo: &SampleBuffer,
    mode: Mode,
    sponsor: &Sponsor,
    arbiter: &dyn Arbiter,
    transcriber: &dyn Transcriber,
    params: &PathwayParams,
    cand_cfg: &CandidateConfig,
    insertion: &InsertionConfig,
    splice_cfg: &SpliceConfig,
) -> Result<InsertOutcome, String> {
    let promo_ms = promo.duration_ms();
    if promo_ms > insertion.max_insert_ms {
        return Err(format!(
            "promo runs {promo_ms}ms, over the {}ms limit",
            insertion.max_insert_ms
        ));
    }
    let duration_ms = host.duration_ms();

    let song: Option<SongAnalysis> = match mode {
        Mode::Music => Some(tempo::analyze(host)),
        Mode::SpokenWord => None,
    };
    let cands = candidates::generate(host, mode, song.as_ref(), params, cand_cfg);
    let candidates_ms: Vec<u64> = cands.iter().map(|c| c.insertion_ms).collect();
    let for_prompt_ms = filter_candidates(&candidates_ms, duration_ms, insertion);
    let for_prompt: Vec<Candidate> = cands
        .iter()
        .filter(|c| for_prompt_ms.contains(&c.insertion_ms))
        .cloned()
        .collect();

    let mut chosen_ms = choose_default_insertion(&for_prompt_ms, insertion.min_offset_ms);
    if duration_ms > 0 {
        chosen_ms = chosen_ms.min(duration_ms - 1);
    }

    let mut request = ArbitrationRequest::new(mode, &*sponsor.name, &*sponsor.blurb, duration_ms)
        .with_candidates(build_prompt_candidates(host, &for_prompt_ms, transcriber, params));
    request.sponsor_url = sponsor.url.clone();

    let mut arbitration_fallback = None;
    let mut refined_text = None;
    match resolve(arbiter, &request, &for_prompt) {
        ArbitrationOutcome::Accepted {
            insertion_ms,
            refined_text: refined,
            ..
        } => {
            let max_allowed = duration_ms.saturating_sub(insertion.end_buffer_ms);
            if insertion_ms < insertion.min_offset_ms || insertion_ms > max_allowed {
                arbitration_fallback = Some(format!(
                    "arbitrated point {insertion_ms}ms is outside the allowed range"
                ));
            } else {
                chosen_ms = insertion_ms;
                refined_text = refined;
            }
        }
        ArbitrationOutcome::Fallback { reason } => {
            arbitration_fallback = Some(reason);
        }
    }

    // Condition the promo against the audio it will sit inside.
    let context = loudness::context_window(host, chosen_ms, splice_cfg.context_window_ms);
    let target_lufs = loudness::measure_lufs(&context)?;
    let matched = loudness::match_loudness(promo, target_lufs)?;

    let mut promo_processed = matched
        .matched
        .fade_in_ms(splice_cfg.insert_fade_ms)
        .fade_out_ms(splice_cfg.insert_fade_ms);

    if mode == Mode::SpokenWord {
        let tone_start = chosen_ms.saturating_sub(splice_cfg.room_tone_ms);
        let room_tone = host.slice_ms(tone_start, chosen_ms);
        if !room_tone.is_empty() {
            promo_processed =
                splice::apply_room_tone(&promo_processed, Some(&room_tone), splice_cfg.room_tone_gain_db)?;
        }
    }

    let merged = splice::insert_with_crossfade(host, &promo_processed, chosen_ms, splice_cfg)?;

    Ok(InsertOutcome {
        merged,
        report: InsertReport {
            mode: mode.as_str().to_string(),
            chosen_insertion_ms: chosen_ms,
            candidates_ms,
            candidates_for_prompt_ms: for_prompt_ms,
            arbitration_fallback,
            refined_text,
            loudness: LoudnessReport {
                target_lufs: matched.target_lufs,
                promo_before_lufs: matched.before_lufs,
                promo_after_lufs: matched.after_lufs,
            },
        },
    })
}
