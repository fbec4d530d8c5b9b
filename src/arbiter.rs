//! External arbitration seam.
//!
//! An arbiter is an outside collaborator (an LLM, an editor UI, a rules
//! service) asked to pick among pre-vetted insertion candidates and
//! optionally refine the promo copy. Its answer is never trusted: a choice
//! must name a valid candidate index AND echo that candidate's exact
//! insertion time, or the whole answer is discarded in favor of the
//! heuristic ranking. Arbitration can improve a choice, never widen it.

use serde::{Deserialize, Serialize};

use crate::candidates::{Candidate, Mode};

/// One candidate as offered to the arbiter: the insertion time plus the
/// transcript snippet that precedes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationCandidate {
    pub ms: u64,
    #[serde(default)]
    pub snippet: String,
}

/// Everything the arbiter sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationRequest {
    pub mode: String,
    pub sponsor_name: String,
    pub sponsor_blurb: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_url: Option<String>,
    pub duration_ms: u64,
    pub candidates: Vec<ArbitrationCandidate>,
}

impl ArbitrationRequest {
    pub fn new(
        mode: Mode,
        sponsor_name: impl Into<String>,
        sponsor_blurb: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        ArbitrationRequest {
            mode: mode.as_str().to_string(),
            sponsor_name: sponsor_name.into(),
            sponsor_blurb: sponsor_blurb.into(),
            sponsor_url: None,
            duration_ms,
            candidates: Vec::new(),
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<ArbitrationCandidate>) -> Self {
        self.candidates = candidates;
        self
    }
}

/// The arbiter's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationChoice {
    pub chosen_index: usize,
    pub chosen_insertion_ms: u64,
    #[serde(default)]
    pub rationale: String,
    /// Refined promo copy, when the arbiter rewrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_text: Option<String>,
}

/// How an arbitration round resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ArbitrationOutcome {
    /// The choice named a real candidate and echoed its time.
    Accepted {
        index: usize,
        insertion_ms: u64,
        refined_text: Option<String>,
    },
    /// The arbiter declined or its answer failed validation; the caller
    /// falls back to the heuristic ranking. The reason is surfaced in the
    /// final report.
    Fallback { reason: String },
}

/// Something that can arbitrate. Implementations decline by returning
/// `Ok(None)`; transport failures return `Err` and are folded into a
/// fallback by [`resolve`].
pub trait Arbiter {
    fn arbitrate(&self, request: &ArbitrationRequest) -> Result<Option<ArbitrationChoice>, String>;
}

/// An arbiter that always declines.
pub struct NoArbiter;

impl Arbiter for NoArbiter {
    fn arbitrate(&self, _request: &ArbitrationRequest) -> Result<Option<ArbitrationChoice>, String> {
        Ok(None)
    }
}

/// Validate a choice against the candidates it was offered. Both checks
/// must pass: the index must be in range, and the echoed insertion time
/// must equal that candidate's time exactly. A time that matches a
/// DIFFERENT candidate is still rejected.
pub fn validate_choice(choice: &ArbitrationChoice, candidates: &[Candidate]) -> Result<(), String> {
    let Some(cand) = candidates.get(choice.chosen_index) else {
        return Err(format!(
            "arbiter chose index {} out of {} candidates",
            choice.chosen_index,
            candidates.len()
        ));
    };
    if cand.insertion_ms != choice.chosen_insertion_ms {
        return Err(format!(
            "arbiter echoed {}ms for index {} but that candidate sits at {}ms",
            choice.chosen_insertion_ms, choice.chosen_index, cand.insertion_ms
        ));
    }
    Ok(())
}

/// Run one arbitration round and fold every failure path into an outcome.
pub fn resolve(
    arbiter: &dyn Arbiter,
    request: &ArbitrationRequest,
    candidates: &[Candidate],
) -> ArbitrationOutcome {
    match arbiter.arbitrate(request) {
        Ok(Some(choice)) => match validate_choice(&choice, candidates) {
            Ok(()) => ArbitrationOutcome::Accepted {
                index: choice.chosen_index,
                insertion_ms: choice.chosen_insertion_ms,
                refined_text: choice.refined_text,
            },
            Err(reason) => ArbitrationOutcome::Fallback { reason },
        },
        Ok(None) => ArbitrationOutcome::Fallback {
            reason: "arbiter declined to choose".to_string(),
        },
        Err(err) => ArbitrationOutcome::Fallback {
            reason: format!("arbitration failed: {err}"),
        },
    }
}
