//! Feature Extractor: per-candidate acoustic features.
//!
//! Enriches a candidate set in place with windowed RMS measurements, beat
//! alignment (music), and best-effort transcript sentence boundaries
//! (spoken word). Window sizes and the beat tolerance come from the
//! pathway's `PathwayParams` — the recommendation and interactive pathways
//! deliberately use different values.

use crate::buffer::SampleBuffer;
use crate::candidates::{Candidate, Mode, NOTE_BEAT, NOTE_ENERGY};
use crate::config::PathwayParams;
use crate::transcript::{Transcriber, ends_sentence};

/// Compute windowed RMS features (and beat alignment, for music) for every
/// candidate.
pub fn extract(
    buffer: &SampleBuffer,
    candidates: &mut [Candidate],
    mode: Mode,
    beat_times_ms: &[u64],
    params: &PathwayParams,
) {
    let window = params.rms_window_ms as i64;
    let center = params.center_window_ms as i64;
    for cand in candidates.iter_mut() {
        let at = cand.insertion_ms as i64;
        cand.rms_before = buffer.rms_window_ms(at - window, at);
        cand.rms_after = buffer.rms_window_ms(at, at + window);
        if mode == Mode::Music {
            cand.rms_center = Some(buffer.rms_window_ms(at - center, at + center));
            cand.beat_aligned = beat_times_ms
                .iter()
                .any(|b| b.abs_diff(cand.insertion_ms) <= params.beat_tolerance_ms);
            if cand.beat_aligned && cand.notes == NOTE_ENERGY {
                cand.notes = NOTE_BEAT.to_string();
            }
        }
    }
}

/// Mark sentence boundaries on the most promising candidates (spoken word).
///
/// Candidates are ranked by descending silence length; only the top
/// `params.max_snippets` get a transcription call over their preceding
/// `params.snippet_window_ms` window. Transcription failures silently leave
/// the flag false — this step degrades, never aborts.
pub fn apply_transcript_boundaries(
    buffer: &SampleBuffer,
    candidates: &mut [Candidate],
    transcriber: &dyn Transcriber,
    params: &PathwayParams,
) {
    if candidates.is_empty() {
        return;
    }
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|a, b| {
        candidates[*b]
            .silence_ms
            .unwrap_or(0)
            .cmp(&candidates[*a].silence_ms.unwrap_or(0))
    });

    for idx in order.into_iter().take(params.max_snippets) {
        let cand = &mut candidates[idx];
        let end = cand.insertion_ms as i64;
        let start = end - params.snippet_window_ms as i64;
        let snippet = transcriber.transcribe(buffer, start, end);
        let Some(text) = snippet.text() else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        if ends_sentence(text) {
            cand.sentence_boundary = true;
            if cand.notes.is_empty() {
                cand.notes = "boundary".to_string();
            } else {
                cand.notes = format!("{},boundary", cand.notes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::NOTE_SILENCE;
    use crate::transcript::Transcript;

    fn half_loud_buffer(rate: u32) -> SampleBuffer {
        // 0–5000ms loud, 5000–10000ms near-silent.
        let frames = (10000 * rate as u64 / 1000) as usize;
        let half = frames / 2;
        let samples: Vec<f32> = (0..frames)
            .map(|i| {
                let amp = if i < half { 0.5 } else { 0.001 };
                if i % 2 == 0 { amp } else { -amp }
            })
            .collect();
        SampleBuffer::new(samples, rate, 1).unwrap()
    }

    #[test]
    fn rms_windows_straddle_the_candidate() {
        let buf = half_loud_buffer(8000);
        let mut cands = vec![Candidate::at(5000, NOTE_SILENCE)];
        extract(&buf, &mut cands, Mode::SpokenWord, &[], &PathwayParams::recommendation());
        assert!(cands[0].rms_before > 0.3);
        assert!(cands[0].rms_after < 0.01);
        assert!(cands[0].rms_center.is_none());
        assert!(!cands[0].beat_aligned);
    }

    #[test]
    fn music_mode_fills_center_and_beat_alignment() {
        let buf = half_loud_buffer(8000);
        let mut cands = vec![Candidate::at(5000, NOTE_ENERGY), Candidate::at(2000, NOTE_ENERGY)];
        let beats = vec![4950, 8000];
        extract(&buf, &mut cands, Mode::Music, &beats, &PathwayParams::recommendation());
        // 4950 is within the 80ms recommendation tolerance of 5000.
        assert!(cands[0].beat_aligned);
        assert_eq!(cands[0].notes, NOTE_BEAT);
        assert!(cands[0].rms_center.is_some());
        // Nothing within tolerance of 2000.
        assert!(!cands[1].beat_aligned);
        assert_eq!(cands[1].notes, NOTE_ENERGY);
    }

    #[test]
    fn interactive_tolerance_is_tighter() {
        let buf = half_loud_buffer(8000);
        let mut cands = vec![Candidate::at(5000, NOTE_ENERGY)];
        let beats = vec![4930]; // 70ms away: inside 80, outside 60.
        extract(&buf, &mut cands, Mode::Music, &beats, &PathwayParams::recommendation());
        assert!(cands[0].beat_aligned);

        let mut cands = vec![Candidate::at(5000, NOTE_ENERGY)];
        extract(&buf, &mut cands, Mode::Music, &beats, &PathwayParams::interactive());
        assert!(!cands[0].beat_aligned);
    }

    /// Transcriber returning a fixed text for any window.
    struct FixedTranscriber(&'static str);

    impl Transcriber for FixedTranscriber {
        fn transcribe(&self, _b: &SampleBuffer, _s: i64, _e: i64) -> Transcript {
            Transcript::from_wire(self.0)
        }
    }

    fn silence_cand(ms: u64, silence: u64) -> Candidate {
        let mut c = Candidate::at(ms, NOTE_SILENCE);
        c.silence_ms = Some(silence);
        c
    }

    #[test]
    fn boundary_marked_when_transcript_ends_sentence() {
        let buf = half_loud_buffer(8000);
        let mut cands = vec![silence_cand(5000, 900)];
        apply_transcript_boundaries(
            &buf,
            &mut cands,
            &FixedTranscriber("And that wraps it up."),
            &PathwayParams::recommendation(),
        );
        assert!(cands[0].sentence_boundary);
        assert_eq!(cands[0].notes, "silence,boundary");
    }

    #[test]
    fn boundary_skipped_mid_sentence() {
        let buf = half_loud_buffer(8000);
        let mut cands = vec![silence_cand(5000, 900)];
        apply_transcript_boundaries(
            &buf,
            &mut cands,
            &FixedTranscriber("and then we decided to"),
            &PathwayParams::recommendation(),
        );
        assert!(!cands[0].sentence_boundary);
    }

    #[test]
    fn unavailable_transcription_degrades_silently() {
        let buf = half_loud_buffer(8000);
        let mut cands = vec![silence_cand(5000, 900)];
        apply_transcript_boundaries(
            &buf,
            &mut cands,
            &FixedTranscriber(crate::transcript::TRANSCRIPT_UNAVAILABLE),
            &PathwayParams::recommendation(),
        );
        assert!(!cands[0].sentence_boundary);
        assert_eq!(cands[0].notes, NOTE_SILENCE);
    }

    #[test]
    fn only_longest_silences_are_transcribed() {
        struct CountingTranscriber(std::cell::Cell<usize>);
        impl Transcriber for CountingTranscriber {
            fn transcribe(&self, _b: &SampleBuffer, _s: i64, _e: i64) -> Transcript {
                self.0.set(self.0.get() + 1);
                Transcript::Text("Done.".to_string())
            }
        }
        let buf = half_loud_buffer(8000);
        let mut cands: Vec<Candidate> =
            (0..12).map(|i| silence_cand(i * 700, 500 + i * 10)).collect();
        let t = CountingTranscriber(std::cell::Cell::new(0));
        let params = PathwayParams::recommendation();
        apply_transcript_boundaries(&buf, &mut cands, &t, &params);
        assert_eq!(t.0.get(), params.max_snippets);
        // The longest silences (largest i) got the calls.
        assert!(cands[11].sentence_boundary);
        assert!(!cands[0].sentence_boundary);
    }
}
