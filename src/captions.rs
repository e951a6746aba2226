use std::sync::LazyLock;

use regex::Regex;

use crate::chunk::RawSegment;

/// C9: parse a subtitle file into a canonical segment list plus two cleaned
/// plain-text variants.
#[derive(Debug, Clone)]
pub struct ParsedCaptions {
    pub segments: Vec<RawSegment>,
    /// All newlines collapsed to spaces, whitespace normalized.
    pub merged_text: String,
    /// Timestamps/headers/tags gone, newlines kept.
    pub line_preserving_text: String,
}

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^(WEBVTT.*|STYLE.*|NOTE.*)$").unwrap());
static LONG_TIMESTAMP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d{2}:\d{2}:\d{2}\.\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}\.\d{3}.*$").unwrap());
static SHORT_TIMESTAMP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d{2}:\d{2}\.\d{3}\s*-->\s*\d{2}:\d{2}\.\d{3}.*$").unwrap());
static STYLE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static POSITIONAL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(align:\w+|position:\d+%|line:\d+%|size:\d+%)\b").unwrap());

/// Parse the full VTT document into segments and both text variants.
pub fn parse(vtt_text: &str) -> ParsedCaptions {
    ParsedCaptions {
        segments: parse_segments(vtt_text),
        merged_text: strip(vtt_text, true),
        line_preserving_text: strip(vtt_text, false),
    }
}

fn parse_segments(vtt_text: &str) -> Vec<RawSegment> {
    let lines: Vec<&str> = vtt_text.lines().map(str::trim).collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.contains("-->") {
            let parsed = parse_timestamp_line(line);
            i += 1;
            let Some((start, end)) = parsed else {
                continue;
            };

            let mut text_lines = Vec::new();
            while i < lines.len() && !lines[i].is_empty() {
                text_lines.push(lines[i]);
                i += 1;
            }

            let text = clean_cue_text(&text_lines.join(" "));
            if !text.is_empty() {
                segments.push(RawSegment { start, end, text });
            }
        } else {
            i += 1;
        }
    }

    segments
}

fn parse_timestamp_line(line: &str) -> Option<(f64, f64)> {
    let (start_part, end_part) = line.split_once("-->")?;
    let start = parse_timestamp(start_part.trim().split(' ').next()?)?;
    let end = parse_timestamp(end_part.trim().split(' ').next()?)?;
    Some((start, end))
}

/// Accepts both `HH:MM:SS.mmm` and `MM:SS.mmm`.
fn parse_timestamp(ts: &str) -> Option<f64> {
    let parts: Vec<&str> = ts.split(':').collect();
    match parts.as_slice() {
        [h, m, s] => {
            let hours: f64 = h.parse().ok()?;
            let minutes: f64 = m.parse().ok()?;
            let seconds: f64 = s.parse().ok()?;
            Some(hours * 3600.0 + minutes * 60.0 + seconds)
        }
        [m, s] => {
            let minutes: f64 = m.parse().ok()?;
            let seconds: f64 = s.parse().ok()?;
            Some(minutes * 60.0 + seconds)
        }
        _ => None,
    }
}

fn clean_cue_text(text: &str) -> String {
    let text = STYLE_TAG.replace_all(text, "");
    let text = POSITIONAL_TOKEN.replace_all(&text, "");
    text.trim().to_string()
}

fn strip(raw: &str, merge_lines: bool) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = HEADER_LINE.replace_all(raw, "");
    let text = LONG_TIMESTAMP_LINE.replace_all(&text, "");
    let text = SHORT_TIMESTAMP_LINE.replace_all(&text, "");
    let text = STYLE_TAG.replace_all(&text, "");
    let text = POSITIONAL_TOKEN.replace_all(&text, "");

    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    if merge_lines {
        normalize_whitespace(&lines.join(" "))
    } else {
        lines.join("\n")
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "WEBVTT\n\n00:00:00.000 --> 00:00:02.500\nHello there\n\n00:00:02.500 --> 00:00:05.000 align:middle\n<c>World</c>\n";

    #[test]
    fn parses_segments_with_timestamps() {
        let parsed = parse(SAMPLE);
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].start, 0.0);
        assert_eq!(parsed.segments[0].end, 2.5);
        assert_eq!(parsed.segments[0].text, "Hello there");
        assert_eq!(parsed.segments[1].text, "World");
    }

    #[test]
    fn merged_text_strips_tags_and_headers() {
        let parsed = parse(SAMPLE);
        assert_eq!(parsed.merged_text, "Hello there World");
    }

    #[test]
    fn line_preserving_keeps_newlines() {
        let parsed = parse(SAMPLE);
        assert!(parsed.line_preserving_text.contains('\n'));
        assert!(!parsed.line_preserving_text.contains("-->"));
    }

    #[test]
    fn short_form_timestamps_are_supported() {
        let short = "WEBVTT\n\n00:00.000 --> 00:02.500\nShort form\n";
        let parsed = parse(short);
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].end, 2.5);
    }
}
