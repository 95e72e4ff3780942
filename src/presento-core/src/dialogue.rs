//! Splitting a turn-tagged podcast transcript into speaker segments.

use crate::slide::{DialogueSegment, Speaker};

/// Marker opening a host turn.
pub const HOST_MARKER: &str = "|*";
/// Marker opening a guest turn.
pub const GUEST_MARKER: &str = "|+";

fn turn_start(line: &str) -> Option<(Speaker, &str)> {
    if let Some(rest) = line.strip_prefix(HOST_MARKER) {
        Some((Speaker::Host, rest))
    } else {
        line.strip_prefix(GUEST_MARKER)
            .map(|rest| (Speaker::Guest, rest))
    }
}

/// Parse a transcript line by line into ordered segments.
///
/// A line beginning with a marker closes the open segment and starts a new
/// one; any other line continues the open segment. Text before the first
/// marker is dropped. A turn with no words is still emitted.
pub fn segment(transcript: &str) -> Vec<DialogueSegment> {
    let mut segments = Vec::new();
    let mut open: Option<DialogueSegment> = None;

    for raw_line in transcript.lines() {
        if let Some((speaker, rest)) = turn_start(raw_line) {
            segments.extend(open.take());
            open = Some(DialogueSegment::new(speaker, rest.trim()));
            continue;
        }

        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(current) = open.as_mut() {
            if !current.utterance.is_empty() {
                current.utterance.push(' ');
            }
            current.utterance.push_str(line);
        }
    }

    segments.extend(open.take());
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_lines_join_with_space() {
        let segments = segment("|* Hello\nworld\n|+ Hi there");
        assert_eq!(
            segments,
            vec![
                DialogueSegment::new(Speaker::Host, "Hello world"),
                DialogueSegment::new(Speaker::Guest, "Hi there"),
            ]
        );
    }

    #[test]
    fn test_no_markers_yields_nothing() {
        assert!(segment("Just some narration.\nMore of it.").is_empty());
        assert!(segment("").is_empty());
    }

    #[test]
    fn test_consecutive_host_turns_stay_separate() {
        let segments = segment("|* First thought\n|* Second thought");
        assert_eq!(
            segments,
            vec![
                DialogueSegment::new(Speaker::Host, "First thought"),
                DialogueSegment::new(Speaker::Host, "Second thought"),
            ]
        );
    }

    #[test]
    fn test_preamble_before_first_marker_ignored() {
        let segments = segment("Here is your podcast:\n\n|+ Welcome back\n  everyone  \n");
        assert_eq!(
            segments,
            vec![DialogueSegment::new(Speaker::Guest, "Welcome back everyone")]
        );
    }

    #[test]
    fn test_marker_alone_takes_following_line() {
        let segments = segment("|*\nGood morning\n|+ Morning");
        assert_eq!(segments[0], DialogueSegment::new(Speaker::Host, "Good morning"));
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_empty_turns_are_kept() {
        let segments = segment("|*\n|+ Hi\n|*");
        assert_eq!(
            segments,
            vec![
                DialogueSegment::new(Speaker::Host, ""),
                DialogueSegment::new(Speaker::Guest, "Hi"),
                DialogueSegment::new(Speaker::Host, ""),
            ]
        );
    }

    #[test]
    fn test_indented_marker_is_not_a_turn() {
        assert!(segment("  |* Hello").is_empty());

        let segments = segment("|+ Hi\n  |* there");
        assert_eq!(
            segments,
            vec![DialogueSegment::new(Speaker::Guest, "Hi |* there")]
        );
    }

    #[test]
    fn test_turn_order_preserved() {
        let segments = segment("|* a\n|+ b\n|* c\n|+ d");
        let speakers: Vec<Speaker> = segments.iter().map(|s| s.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::Host, Speaker::Guest, Speaker::Host, Speaker::Guest]
        );
    }
}
