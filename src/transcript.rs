//! Transcription collaborator boundary.
//!
//! Transcription is best-effort: when the capability is missing or a call
//! fails, the collaborator reports unavailability instead of raising, and
//! the pipeline degrades (boundary features stay false) rather than aborts.
//! The wire protocol uses the literal sentinel `TRANSCRIPT_UNAVAILABLE`,
//! which other collaborators key off, so it is preserved verbatim at the
//! boundary even though the crate models the condition as a typed value.

use crate::buffer::SampleBuffer;

/// Wire sentinel meaning "transcription capability absent or failed".
pub const TRANSCRIPT_UNAVAILABLE: &str = "TRANSCRIPT_UNAVAILABLE";

/// Result of a transcription request. An empty `Text` is a valid
/// "no speech in this window" answer; `Unavailable` means the capability
/// was missing or the call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    Text(String),
    Unavailable,
}

impl Transcript {
    /// Parse a wire value. The sentinel (and nothing else) maps to
    /// `Unavailable`; it must never be treated as real speech.
    pub fn from_wire(text: &str) -> Self {
        if text == TRANSCRIPT_UNAVAILABLE {
            Transcript::Unavailable
        } else {
            Transcript::Text(text.to_string())
        }
    }

    /// Wire representation, restoring the sentinel for `Unavailable`.
    pub fn as_wire(&self) -> &str {
        match self {
            Transcript::Text(text) => text,
            Transcript::Unavailable => TRANSCRIPT_UNAVAILABLE,
        }
    }

    /// The transcribed text, if the call succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            Transcript::Text(text) => Some(text),
            Transcript::Unavailable => None,
        }
    }

    /// Text for scoring purposes: unavailability reads as empty, never as
    /// content.
    pub fn text_or_empty(&self) -> &str {
        self.text().unwrap_or("")
    }
}

/// External speech-to-text collaborator.
///
/// `start_ms` may be negative (windows are computed relative to a candidate
/// and clamped by the implementation); implementations must clamp to the
/// buffer and never panic or error — degraded capability is expressed as
/// `Transcript::Unavailable`.
pub trait Transcriber {
    fn transcribe(&self, buffer: &SampleBuffer, start_ms: i64, end_ms: i64) -> Transcript;
}

/// A transcriber that is always unavailable. Stands in when no speech-to-text
/// collaborator is wired up.
pub struct NoTranscriber;

impl Transcriber for NoTranscriber {
    fn transcribe(&self, _buffer: &SampleBuffer, _start_ms: i64, _end_ms: i64) -> Transcript {
        Transcript::Unavailable
    }
}

// ── Text heuristics ──────────────────────────────────────────────────────────

/// Characters that may trail sentence-terminal punctuation.
const CLOSING_MARKS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}'];

/// True when the text ends a sentence: terminal punctuation (`.`, `!`, `?`),
/// optionally followed by a closing quote/bracket, before trailing whitespace.
pub fn ends_sentence(text: &str) -> bool {
    let trimmed = text.trim_end();
    let stripped = trimmed.trim_end_matches(|c| CLOSING_MARKS.contains(&c));
    stripped.ends_with(['.', '!', '?'])
}

/// True when the text looks cut off mid-sentence: it ends in an alphanumeric
/// character with no terminal punctuation.
pub fn looks_mid_sentence(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .map_or(false, |c| c.is_alphanumeric())
}

/// True when the text starts like a fresh sentence: an uppercase letter or
/// an opening quote.
pub fn starts_sentence(text: &str) -> bool {
    let trimmed = text.trim_start();
    match trimmed.chars().next() {
        Some(c) => c.is_uppercase() || c == '"' || c == '\'' || c == '\u{201c}' || c == '\u{2018}',
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_roundtrip() {
        let t = Transcript::from_wire(TRANSCRIPT_UNAVAILABLE);
        assert_eq!(t, Transcript::Unavailable);
        assert_eq!(t.as_wire(), TRANSCRIPT_UNAVAILABLE);
        assert_eq!(t.text(), None);
        assert_eq!(t.text_or_empty(), "");
    }

    #[test]
    fn plain_text_roundtrip() {
        let t = Transcript::from_wire("so that wraps up the segment.");
        assert_eq!(t.text(), Some("so that wraps up the segment."));
        assert_eq!(t.as_wire(), "so that wraps up the segment.");
    }

    #[test]
    fn empty_text_is_valid_no_speech() {
        let t = Transcript::from_wire("");
        assert_eq!(t, Transcript::Text(String::new()));
        assert!(t.text().is_some());
    }

    #[test]
    fn ends_sentence_basic() {
        assert!(ends_sentence("That was the last point."));
        assert!(ends_sentence("Right?  "));
        assert!(ends_sentence("No way!"));
        assert!(!ends_sentence("and then we"));
        assert!(!ends_sentence(""));
    }

    #[test]
    fn ends_sentence_with_closing_quote() {
        assert!(ends_sentence("he said \"that's all.\""));
        assert!(ends_sentence("(done.)"));
        assert!(!ends_sentence("\"unfinished"));
    }

    #[test]
    fn mid_sentence_detection() {
        assert!(looks_mid_sentence("and so the"));
        assert!(looks_mid_sentence("chapter 12"));
        assert!(!looks_mid_sentence("Done."));
        assert!(!looks_mid_sentence(""));
    }

    #[test]
    fn sentence_start_detection() {
        assert!(starts_sentence("Welcome back"));
        assert!(starts_sentence("\"Quoted opening"));
        assert!(!starts_sentence("lowercase continuation"));
        assert!(!starts_sentence(""));
    }

    #[test]
    fn no_transcriber_is_unavailable() {
        let buf = SampleBuffer::silent(1000, 1000, 1);
        let t = NoTranscriber.transcribe(&buf, -500, 500);
        assert_eq!(t, Transcript::Unavailable);
    }
}
