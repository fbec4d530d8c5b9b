//! Explicit configuration threaded through every pipeline call.
//!
//! Nothing here is process-global: callers construct (or default) these
//! structs and pass them down, so alternate parameters are trivially
//! testable. The two documented values for the beat-alignment tolerance
//! (60 vs 80 ms) and the RMS window (400 vs 800 ms) are intentional:
//! different pathways used different values and unifying them would change
//! recommendation behavior, so each pathway has its own preset.

use serde::{Deserialize, Serialize};

/// Per-pathway analysis windows and tolerances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathwayParams {
    /// RMS window measured before and after a candidate, in ms.
    pub rms_window_ms: u64,
    /// Narrow window centered on a candidate (music energy valley), in ms
    /// to each side.
    pub center_window_ms: u64,
    /// A candidate counts as beat-aligned when a beat lies within this many ms.
    pub beat_tolerance_ms: u64,
    /// Minimum silent-interval length that yields a candidate, in ms.
    pub min_silence_ms: u64,
    /// How much audio preceding a candidate is transcribed for boundary
    /// checks and prompt snippets, in ms.
    pub snippet_window_ms: u64,
    /// At most this many candidates get a transcript snippet.
    pub max_snippets: usize,
}

impl PathwayParams {
    /// Human-facing recommendation pathway.
    pub fn recommendation() -> Self {
        PathwayParams {
            rms_window_ms: 800,
            center_window_ms: 200,
            beat_tolerance_ms: 80,
            min_silence_ms: 500,
            snippet_window_ms: 12000,
            max_snippets: 8,
        }
    }

    /// Interactive pathway that builds the arbitration payload.
    pub fn interactive() -> Self {
        PathwayParams {
            rms_window_ms: 400,
            center_window_ms: 200,
            beat_tolerance_ms: 60,
            min_silence_ms: 500,
            snippet_window_ms: 15000,
            max_snippets: 5,
        }
    }

    /// Standalone analysis pathway (stricter silence requirement).
    pub fn standalone_analysis() -> Self {
        PathwayParams {
            min_silence_ms: 700,
            ..PathwayParams::recommendation()
        }
    }
}

impl Default for PathwayParams {
    fn default() -> Self {
        PathwayParams::recommendation()
    }
}

/// Candidate count bounds for the Generator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CandidateConfig {
    /// Below this count, fallback points are added.
    pub min_candidates: usize,
    /// Padding stops once this many candidates exist.
    pub pad_target: usize,
    /// Above this count, the set is truncated.
    pub max_candidates: usize,
    /// Fallback points are spread over the central portion of the recording,
    /// from `fallback_start_frac` to `fallback_end_frac` of the duration.
    pub fallback_start_frac: f64,
    pub fallback_end_frac: f64,
    /// Number of uniformly spaced fallback points generated.
    pub fallback_count: usize,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        CandidateConfig {
            min_candidates: 10,
            pad_target: 12,
            max_candidates: 30,
            fallback_start_frac: 0.15,
            fallback_end_frac: 0.85,
            fallback_count: 12,
        }
    }
}

/// Parameters for the final splice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpliceConfig {
    /// Attenuation applied to the host under the insert; 0 disables ducking.
    pub duck_db: f32,
    /// Crossfade at each seam, in ms.
    pub crossfade_ms: u64,
    /// Fade-in/out applied to the insert before overlay, in ms.
    pub insert_fade_ms: u64,
    /// Room tone is taken from this much host audio before the insertion point.
    pub room_tone_ms: u64,
    /// Attenuation applied to the room-tone bed, in dB (negative).
    pub room_tone_gain_db: f32,
    /// Half-width of the loudness context window around the insertion point.
    pub context_window_ms: u64,
}

impl Default for SpliceConfig {
    fn default() -> Self {
        SpliceConfig {
            duck_db: 0.0,
            crossfade_ms: 250,
            insert_fade_ms: 250,
            room_tone_ms: 600,
            room_tone_gain_db: -26.0,
            context_window_ms: 4000,
        }
    }
}

/// Placement constraints for the insertion pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InsertionConfig {
    /// Earliest acceptable insertion point, in ms.
    pub min_offset_ms: u64,
    /// Keep the insertion point at least this far from the end, in ms.
    pub end_buffer_ms: u64,
    /// Inserts longer than this are rejected outright, in ms.
    pub max_insert_ms: u64,
}

impl InsertionConfig {
    /// Direct promo-clip pathway (20 s insert cap).
    pub fn promo() -> Self {
        InsertionConfig {
            min_offset_ms: 30000,
            end_buffer_ms: 15000,
            max_insert_ms: 20000,
        }
    }

    /// Generated-ad pathway (25 s insert cap).
    pub fn generated_ad() -> Self {
        InsertionConfig {
            max_insert_ms: 25000,
            ..InsertionConfig::promo()
        }
    }
}

impl Default for InsertionConfig {
    fn default() -> Self {
        InsertionConfig::promo()
    }
}
