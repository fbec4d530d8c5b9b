//! Selector: picks the top scored candidates and explains each pick.

use serde::{Deserialize, Serialize};

use crate::candidates::{Candidate, Mode};
use crate::scoring::quietness;

/// Number of slots surfaced to the caller by default.
pub const DEFAULT_TOP_N: usize = 3;
/// Selected slots are kept at least this far apart when possible.
pub const DEFAULT_MIN_SEP_MS: u64 = 6000;

const PROXIMITY_MS: u64 = 5000;

/// Top-N selection with a minimum-separation constraint.
///
/// Candidates are ordered by descending score, ties broken by earlier
/// insertion time, then taken greedily while keeping selections at least
/// `min_sep_ms` apart. If the constraint starves the selection below
/// `top_n`, remaining candidates are backfilled in score order regardless
/// of separation.
pub fn select_top(candidates: &[Candidate], top_n: usize, min_sep_ms: u64) -> Vec<Candidate> {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.insertion_ms.cmp(&b.insertion_ms))
    });

    let mut selected: Vec<&Candidate> = Vec::new();
    for cand in &ordered {
        if selected
            .iter()
            .all(|sel| cand.insertion_ms.abs_diff(sel.insertion_ms) >= min_sep_ms)
        {
            selected.push(cand);
        }
        if selected.len() >= top_n {
            break;
        }
    }
    if selected.len() < top_n {
        for cand in &ordered {
            if !selected.iter().any(|sel| std::ptr::eq(*sel, *cand)) {
                selected.push(cand);
            }
            if selected.len() >= top_n {
                break;
            }
        }
    }
    selected.into_iter().cloned().collect()
}

fn spoken_word_pros_cons(cand: &Candidate, duration_ms: u64) -> (Vec<String>, Vec<String>, String) {
    let mut pros: Vec<String> = Vec::new();
    let mut cons: Vec<String> = Vec::new();

    let silence_ms = cand.silence_ms.unwrap_or(0);
    if silence_ms >= 800 {
        pros.push(format!("Natural pause detected (~{silence_ms}ms silence)"));
    } else if silence_ms >= 500 {
        pros.push(format!("Short pause detected (~{silence_ms}ms silence)"));
    }

    if cand.sentence_boundary {
        pros.push("Likely sentence boundary or topic shift".to_string());
    }

    let quiet_before = quietness(cand.rms_before);
    let quiet_after = quietness(cand.rms_after);
    if quiet_before >= 0.7 {
        pros.push("Low background energy before insert".to_string());
    }
    if quiet_after >= 0.7 {
        pros.push("Low background energy after insert".to_string());
    }

    if silence_ms < 600 {
        cons.push(format!("Short pause (only ~{silence_ms}ms) could feel abrupt"));
    }
    if quiet_after < 0.5 {
        cons.push("Higher energy immediately after insertion".to_string());
    }
    if cand.insertion_ms < PROXIMITY_MS {
        cons.push("Close to the start of the audio".to_string());
    }
    if duration_ms.saturating_sub(cand.insertion_ms) < PROXIMITY_MS {
        cons.push("Close to the end of the audio".to_string());
    }

    if pros.len() < 2 {
        pros.push("Balanced pause with manageable energy shift".to_string());
    }
    if pros.len() < 2 {
        pros.push("Workable energy profile at this position".to_string());
    }
    pros.truncate(3);
    if cons.is_empty() {
        cons.push("Minor timing tradeoff compared to top slot".to_string());
    } else {
        cons.truncate(2);
    }
    let rationale = pros[..pros.len().min(2)].join(" ");
    (pros, cons, rationale)
}

fn music_pros_cons(cand: &Candidate, duration_ms: u64) -> (Vec<String>, Vec<String>, String) {
    let mut pros: Vec<String> = Vec::new();
    let mut cons: Vec<String> = Vec::new();

    if cand.beat_aligned {
        pros.push("Beat-aligned insertion point".to_string());
    }
    let valley = quietness(cand.rms_center.unwrap_or(0.0));
    if valley >= 0.7 {
        pros.push("Low-energy valley (smooth entry)".to_string());
    }
    let quiet_after = quietness(cand.rms_after);
    if quiet_after >= 0.6 {
        pros.push("Stable energy after insert".to_string());
    }

    if !cand.beat_aligned {
        cons.push("Not perfectly beat-aligned".to_string());
    }
    if valley < 0.5 {
        cons.push("Energy valley is modest".to_string());
    }
    if quiet_after < 0.5 {
        cons.push("Higher energy change after insertion".to_string());
    }
    if cand.insertion_ms < PROXIMITY_MS
        || duration_ms.saturating_sub(cand.insertion_ms) < PROXIMITY_MS
    {
        cons.push("Close to the intro or outro".to_string());
    }

    if pros.len() < 2 {
        pros.push("Solid rhythmic placement with manageable energy".to_string());
    }
    if pros.len() < 2 {
        pros.push("Energy change stays within a workable range".to_string());
    }
    pros.truncate(3);
    if cons.is_empty() {
        cons.push("Less optimal alignment compared to top choice".to_string());
    } else {
        cons.truncate(2);
    }
    let rationale = pros[..pros.len().min(2)].join(" ");
    (pros, cons, rationale)
}

/// Human-readable pros, cons, and a short rationale for one candidate.
pub fn explain(cand: &Candidate, duration_ms: u64, mode: Mode) -> (Vec<String>, Vec<String>, String) {
    match mode {
        Mode::SpokenWord => spoken_word_pros_cons(cand, duration_ms),
        Mode::Music => music_pros_cons(cand, duration_ms),
    }
}

// ── Report shape ─────────────────────────────────────────────────────────────

/// Per-candidate metrics echoed inside each recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub insertion_ms: u64,
    pub silence_ms: Option<u64>,
    pub rms_before: f32,
    pub rms_after: f32,
    pub beat_aligned: bool,
    pub notes: String,
}

impl CandidateMetrics {
    fn from_candidate(cand: &Candidate) -> Self {
        CandidateMetrics {
            insertion_ms: cand.insertion_ms,
            silence_ms: cand.silence_ms,
            rms_before: round6(cand.rms_before),
            rms_after: round6(cand.rms_after),
            beat_aligned: cand.beat_aligned,
            notes: cand.notes.clone(),
        }
    }
}

/// One recommended slot, ready for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "slotId")]
    pub slot_id: String,
    pub insertion_ms: u64,
    pub insertion_time_seconds: f64,
    pub seamlessness_percent: u32,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub rationale: String,
    pub candidate: CandidateMetrics,
}

/// Full debug snapshot of one scored candidate, present only when the
/// caller asked for debug output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDebug {
    pub insertion_ms: u64,
    pub silence_ms: Option<u64>,
    pub rms_before: f32,
    pub rms_after: f32,
    pub beat_aligned: bool,
    pub notes: String,
    pub boundary: bool,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugInfo {
    pub candidates: Vec<CandidateDebug>,
}

/// The top-level recommendation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub duration_ms: u64,
    pub mode: String,
    pub candidates_count: usize,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// Build the report from the full scored candidate set and the selection.
pub fn build_report(
    duration_ms: u64,
    mode: Mode,
    candidates: &[Candidate],
    selected: &[Candidate],
    debug: bool,
) -> RecommendationReport {
    let recommendations = selected
        .iter()
        .enumerate()
        .map(|(index, cand)| {
            let (pros, cons, rationale) = explain(cand, duration_ms, mode);
            Recommendation {
                slot_id: format!("slot-{index}"),
                insertion_ms: cand.insertion_ms,
                insertion_time_seconds: round2(cand.insertion_ms as f64 / 1000.0),
                seamlessness_percent: cand.score.round().clamp(0.0, 100.0) as u32,
                pros,
                cons,
                rationale,
                candidate: CandidateMetrics::from_candidate(cand),
            }
        })
        .collect();

    let debug = debug.then(|| DebugInfo {
        candidates: candidates
            .iter()
            .map(|cand| CandidateDebug {
                insertion_ms: cand.insertion_ms,
                silence_ms: cand.silence_ms,
                rms_before: cand.rms_before,
                rms_after: cand.rms_after,
                beat_aligned: cand.beat_aligned,
                notes: cand.notes.clone(),
                boundary: cand.sentence_boundary,
                score: cand.score,
            })
            .collect(),
    });

    RecommendationReport {
        duration_ms,
        mode: mode.as_str().to_string(),
        candidates_count: candidates.len(),
        recommendations,
        debug,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round6(value: f32) -> f32 {
    (value * 1e6).round() / 1e6
}
