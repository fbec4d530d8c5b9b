//! End-to-end pipeline tests for splice_point.
//!
//! These exercise the full recommendation and insertion paths on synthetic
//! audio: speech-shaped noise with engineered pauses, click tracks with a
//! known tempo, and constant tones for splice arithmetic.

use splice_point::arbiter::{Arbiter, ArbitrationChoice, ArbitrationRequest, NoArbiter};
use splice_point::buffer::{SampleBuffer, STANDARD_CHANNELS, STANDARD_SAMPLE_RATE};
use splice_point::candidates::Mode;
use splice_point::config::{CandidateConfig, InsertionConfig, PathwayParams, SpliceConfig};
use splice_point::loudness;
use splice_point::recommend::{self, Sponsor};
use splice_point::splice;
use splice_point::tempo;
use splice_point::transcript::{NoTranscriber, Transcriber, Transcript};

const RATE: u32 = 8000;

/// Mono pseudo-speech: sustained mid-level noise with silent gaps at the
/// given positions. A cheap xorshift keeps the test deterministic.
fn speech_with_gaps(duration_ms: u64, gaps: &[(u64, u64)]) -> SampleBuffer {
    let frames = (duration_ms * RATE as u64 / 1000) as usize;
    let mut state: u32 = 0x1234_5678;
    let mut samples = Vec::with_capacity(frames);
    for n in 0..frames {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let noise = (state as f32 / u32::MAX as f32) * 2.0 - 1.0;
        let ms = n as u64 * 1000 / RATE as u64;
        let in_gap = gaps.iter().any(|(start, len)| ms >= *start && ms < start + len);
        samples.push(if in_gap { 0.0 } else { noise * 0.3 });
    }
    SampleBuffer::new(samples, RATE, 1).unwrap()
}

fn constant_tone(duration_ms: u64, amplitude: f32) -> SampleBuffer {
    let frames = (duration_ms * RATE as u64 / 1000) as usize;
    SampleBuffer::new(vec![amplitude; frames], RATE, 1).unwrap()
}

fn stereo_sine(duration_ms: u64, amplitude: f32) -> SampleBuffer {
    let rate = STANDARD_SAMPLE_RATE;
    let frames = (duration_ms * rate as u64 / 1000) as usize;
    let mut samples = Vec::with_capacity(frames * 2);
    for n in 0..frames {
        let t = n as f32 / rate as f32;
        let v = amplitude * (2.0 * std::f32::consts::PI * 330.0 * t).sin();
        samples.push(v);
        samples.push(v);
    }
    SampleBuffer::new(samples, rate, STANDARD_CHANNELS).unwrap()
}

// ── Recommendation path ───────────────────────────────────────────────────

#[test]
fn long_pause_wins_the_recommendation() {
    // Two minutes of speech with one long gap mid-file and two short ones.
    let host = speech_with_gaps(
        120_000,
        &[(60_000, 900), (20_000, 550), (95_000, 550)],
    );
    let report = recommend::recommend_slots(
        &host,
        Mode::SpokenWord,
        &NoTranscriber,
        &PathwayParams::recommendation(),
        &CandidateConfig::default(),
        3,
        false,
    )
    .unwrap();

    assert_eq!(report.mode, "spoken_word");
    assert!(report.candidates_count >= 3);
    assert!(!report.recommendations.is_empty());

    // The 900ms gap's midpoint should take the top slot.
    let top = &report.recommendations[0];
    assert!(
        (top.insertion_ms as i64 - 60_450).abs() < 200,
        "top slot at {}ms",
        top.insertion_ms
    );
    assert!(top.seamlessness_percent >= 65);
    assert!(top.seamlessness_percent <= 95);
    assert!(top.pros.len() >= 2);
    assert!(!top.cons.is_empty());
    assert!(!top.rationale.is_empty());
    assert_eq!(top.slot_id, "slot-0");
}

#[test]
fn recommendations_respect_minimum_separation() {
    let host = speech_with_gaps(
        120_000,
        &[(40_000, 800), (41_500, 800), (80_000, 800)],
    );
    let report = recommend::recommend_slots(
        &host,
        Mode::SpokenWord,
        &NoTranscriber,
        &PathwayParams::recommendation(),
        &CandidateConfig::default(),
        3,
        false,
    )
    .unwrap();

    let times: Vec<u64> = report
        .recommendations
        .iter()
        .map(|r| r.insertion_ms)
        .collect();
    // The two gaps 1.5s apart cannot both appear unless backfill was needed,
    // and with a third gap available it was not.
    for (i, a) in times.iter().enumerate() {
        for b in times.iter().skip(i + 1) {
            assert!(a.abs_diff(*b) >= 6000, "slots {a} and {b} too close");
        }
    }
}

#[test]
fn candidates_near_edges_rank_below_the_middle() {
    // Identical gaps near the start, middle, and end.
    let host = speech_with_gaps(
        120_000,
        &[(2_000, 800), (60_000, 800), (117_500, 800)],
    );
    let report = recommend::recommend_slots(
        &host,
        Mode::SpokenWord,
        &NoTranscriber,
        &PathwayParams::recommendation(),
        &CandidateConfig::default(),
        3,
        true,
    )
    .unwrap();

    let debug = report.debug.expect("debug requested");
    let score_near = |target: u64| {
        debug
            .candidates
            .iter()
            .filter(|c| c.insertion_ms.abs_diff(target) < 1000)
            .map(|c| c.score)
            .fold(f32::MIN, f32::max)
    };
    let start_score = score_near(2_400);
    let mid_score = score_near(60_400);
    let end_score = score_near(117_900);
    assert!(mid_score > start_score, "{mid_score} vs {start_score}");
    assert!(mid_score > end_score, "{mid_score} vs {end_score}");
}

#[test]
fn quiet_audio_still_produces_enough_candidates() {
    // No gaps at all: fallback points must carry the report.
    let host = constant_tone(60_000, 0.3);
    let report = recommend::recommend_slots(
        &host,
        Mode::SpokenWord,
        &NoTranscriber,
        &PathwayParams::recommendation(),
        &CandidateConfig::default(),
        3,
        false,
    )
    .unwrap();
    assert!(report.candidates_count >= 10);
    assert_eq!(report.recommendations.len(), 3);
    // Even slots with no organic strengths explain themselves fully.
    for rec in &report.recommendations {
        assert!(rec.pros.len() >= 2, "slot {} pros: {:?}", rec.slot_id, rec.pros);
        assert!(!rec.cons.is_empty());
    }
}

#[test]
fn music_mode_reports_beat_aligned_slots() {
    // 120 BPM click track: clicks every 500ms over silence.
    let frames = (60_000u64 * RATE as u64 / 1000) as usize;
    let mut samples = vec![0.02f32; frames];
    let frames_per_beat = RATE as usize / 2;
    for beat in 0..(frames / frames_per_beat) {
        let start = beat * frames_per_beat;
        for s in samples.iter_mut().skip(start).take(RATE as usize / 100) {
            *s = 0.9;
        }
    }
    let host = SampleBuffer::new(samples, RATE, 1).unwrap();
    let report = recommend::recommend_slots(
        &host,
        Mode::Music,
        &NoTranscriber,
        &PathwayParams::recommendation(),
        &CandidateConfig::default(),
        3,
        true,
    )
    .unwrap();

    assert_eq!(report.mode, "music");
    assert!(!report.recommendations.is_empty());
    let debug = report.debug.expect("debug requested");
    assert!(debug.candidates.iter().any(|c| c.beat_aligned));
}

// ── Transcript boundaries ─────────────────────────────────────────────────

struct SentenceEndTranscriber;

impl Transcriber for SentenceEndTranscriber {
    fn transcribe(&self, _buffer: &SampleBuffer, _start_ms: i64, _end_ms: i64) -> Transcript {
        Transcript::Text("And that wraps up this segment.".to_string())
    }
}

#[test]
fn sentence_boundaries_lift_spoken_scores() {
    let host = speech_with_gaps(120_000, &[(60_000, 900)]);
    let with_boundary = recommend::recommend_slots(
        &host,
        Mode::SpokenWord,
        &SentenceEndTranscriber,
        &PathwayParams::recommendation(),
        &CandidateConfig::default(),
        1,
        true,
    )
    .unwrap();
    let debug = with_boundary.debug.unwrap();
    assert!(debug.candidates.iter().any(|c| c.boundary));
}

// ── Insertion path ────────────────────────────────────────────────────────

fn sponsor() -> Sponsor {
    Sponsor {
        name: "Acme".to_string(),
        blurb: "Rocket skates for every terrain".to_string(),
        url: None,
    }
}

#[test]
fn heuristic_insertion_lands_past_the_minimum_offset() {
    let host = speech_with_gaps(120_000, &[(10_000, 900), (45_000, 900)]);
    let promo = speech_with_gaps(8_000, &[]);
    let outcome = recommend::insert_promo(
        &host,
        &promo,
        Mode::SpokenWord,
        &sponsor(),
        &NoArbiter,
        &NoTranscriber,
        &PathwayParams::interactive(),
        &CandidateConfig::default(),
        &InsertionConfig::promo(),
        &SpliceConfig::default(),
    )
    .unwrap();

    assert!(outcome.report.chosen_insertion_ms >= 30_000);
    assert!(outcome.report.arbitration_fallback.is_some());
    // Overlay splice: host length shrinks only by the crossfades.
    assert_eq!(outcome.merged.duration_ms(), 120_000 - 500);
}

struct FixedArbiter(ArbitrationChoice);

impl Arbiter for FixedArbiter {
    fn arbitrate(&self, _req: &ArbitrationRequest) -> Result<Option<ArbitrationChoice>, String> {
        Ok(Some(self.0.clone()))
    }
}

#[test]
fn arbitrated_choice_is_validated_before_use() {
    let host = speech_with_gaps(120_000, &[(45_000, 900), (70_000, 900)]);
    let promo = speech_with_gaps(8_000, &[]);

    // An index that exists but echoes the wrong time must be rejected.
    let lying = FixedArbiter(ArbitrationChoice {
        chosen_index: 0,
        chosen_insertion_ms: 999_999,
        rationale: String::new(),
        refined_text: None,
    });
    let outcome = recommend::insert_promo(
        &host,
        &promo,
        Mode::SpokenWord,
        &sponsor(),
        &lying,
        &NoTranscriber,
        &PathwayParams::interactive(),
        &CandidateConfig::default(),
        &InsertionConfig::promo(),
        &SpliceConfig::default(),
    )
    .unwrap();

    let reason = outcome
        .report
        .arbitration_fallback
        .expect("rejection must be recorded");
    assert!(reason.contains("999999"), "reason: {reason}");
    // The heuristic default still placed the promo in the allowed range.
    assert!(outcome.report.chosen_insertion_ms >= 30_000);
    assert!(outcome.report.chosen_insertion_ms <= 120_000 - 15_000);
}

#[test]
fn valid_arbitrated_choice_is_honored() {
    let host = speech_with_gaps(120_000, &[(45_000, 900), (70_000, 900)]);
    let promo = speech_with_gaps(8_000, &[]);

    // Find out what the engine offers, then echo the second candidate.
    let probe = recommend::insert_promo(
        &host,
        &promo,
        Mode::SpokenWord,
        &sponsor(),
        &NoArbiter,
        &NoTranscriber,
        &PathwayParams::interactive(),
        &CandidateConfig::default(),
        &InsertionConfig::promo(),
        &SpliceConfig::default(),
    )
    .unwrap();
    let offered = probe.report.candidates_for_prompt_ms.clone();
    assert!(offered.len() >= 2);

    let honest = FixedArbiter(ArbitrationChoice {
        chosen_index: 1,
        chosen_insertion_ms: offered[1],
        rationale: "cleaner topic break".to_string(),
        refined_text: Some("Acme: rocket skates, now with brakes.".to_string()),
    });
    let outcome = recommend::insert_promo(
        &host,
        &promo,
        Mode::SpokenWord,
        &sponsor(),
        &honest,
        &NoTranscriber,
        &PathwayParams::interactive(),
        &CandidateConfig::default(),
        &InsertionConfig::promo(),
        &SpliceConfig::default(),
    )
    .unwrap();

    assert!(outcome.report.arbitration_fallback.is_none());
    assert_eq!(outcome.report.chosen_insertion_ms, offered[1]);
    assert_eq!(
        outcome.report.refined_text.as_deref(),
        Some("Acme: rocket skates, now with brakes.")
    );
}

#[test]
fn oversized_promo_is_refused() {
    let host = speech_with_gaps(120_000, &[(45_000, 900)]);
    let promo = constant_tone(21_000, 0.3);
    let err = recommend::insert_promo(
        &host,
        &promo,
        Mode::SpokenWord,
        &sponsor(),
        &NoArbiter,
        &NoTranscriber,
        &PathwayParams::interactive(),
        &CandidateConfig::default(),
        &InsertionConfig::promo(),
        &SpliceConfig::default(),
    )
    .unwrap_err();
    assert!(err.contains("20000ms"), "err: {err}");

    // The same promo fits under the generated-ad limit.
    assert!(
        recommend::insert_promo(
            &host,
            &promo,
            Mode::SpokenWord,
            &sponsor(),
            &NoArbiter,
            &NoTranscriber,
            &PathwayParams::interactive(),
            &CandidateConfig::default(),
            &InsertionConfig::generated_ad(),
            &SpliceConfig::default(),
        )
        .is_ok()
    );
}

// ── Splice and loudness properties ────────────────────────────────────────

#[test]
fn concat_splice_grows_by_promo_minus_crossfades() {
    let host = constant_tone(30_000, 0.2);
    let promo = constant_tone(5_000, 0.5);
    let cfg = SpliceConfig::default();
    let out = splice::insert_concat(&host, &promo, 12_000, &cfg).unwrap();
    assert_eq!(
        out.duration_ms(),
        30_000 + 5_000 - 2 * cfg.crossfade_ms
    );
}

#[test]
fn loudness_match_round_trip() {
    let loud = stereo_sine(5_000, 0.5);
    let quiet = stereo_sine(5_000, 0.05);
    let target = loudness::measure_lufs(&loud).unwrap();
    let matched = loudness::match_loudness(&quiet, target).unwrap();
    assert!(
        (matched.after_lufs - target).abs() < 0.5,
        "after={} target={}",
        matched.after_lufs,
        target
    );
    // Matching back down recovers the original level.
    let back = loudness::match_loudness(&matched.matched, matched.before_lufs).unwrap();
    assert!((back.after_lufs - matched.before_lufs).abs() < 0.5);
}

#[test]
fn beat_analysis_recovers_click_track_tempo() {
    let frames = (30_000u64 * RATE as u64 / 1000) as usize;
    let mut samples = vec![0.0f32; frames];
    let frames_per_beat = RATE as usize / 2; // 120 BPM
    for beat in 0..(frames / frames_per_beat) {
        let start = beat * frames_per_beat;
        for s in samples.iter_mut().skip(start).take(RATE as usize / 100) {
            *s = 0.8;
        }
    }
    let host = SampleBuffer::new(samples, RATE, 1).unwrap();
    let analysis = tempo::analyze(&host);
    let bpm = analysis.tempo.expect("tempo detected");
    assert!((bpm - 120.0).abs() < 3.0, "bpm={bpm}");
    assert!(!analysis.candidates_ms.is_empty());
}
