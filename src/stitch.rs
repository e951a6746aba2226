use crate::chunk::{ChunkResult, RawSegment};

/// Stitched output before post-processing: the space-joined, whitespace
/// collapsed text plus absolute-timestamped segments.
#[derive(Debug, Clone)]
pub struct Stitched {
    pub text: String,
    pub segments: Option<Vec<RawSegment>>,
    pub duration_seconds: Option<f64>,
}

/// C7: concatenate completed chunks' text in ascending index order and
/// rebase each chunk's segments onto the absolute timeline.
///
/// `results` need not arrive pre-sorted — stitching depends only on the
/// ordered-by-index pairs, so this sorts by index first (the "stitching
/// order" testable property: reordering inputs by index before stitching is
/// an identity).
pub fn stitch(mut results: Vec<(ChunkResult, f64)>, probed_duration: Option<f64>) -> Stitched {
    results.sort_by_key(|(result, _)| result.index);

    let mut texts = Vec::with_capacity(results.len());
    let mut all_segments: Vec<RawSegment> = Vec::new();
    let mut has_any_segments = false;
    let mut max_end = 0.0_f64;

    for (result, chunk_start) in &results {
        if let Some(text) = &result.text {
            texts.push(text.as_str());
        }

        if let Some(segments) = &result.segments {
            has_any_segments = true;
            for seg in segments {
                let absolute = RawSegment {
                    start: chunk_start + seg.start,
                    end: chunk_start + seg.end,
                    text: seg.text.trim().to_string(),
                };
                max_end = max_end.max(absolute.end);
                all_segments.push(absolute);
            }
        }
    }

    let joined = texts.join(" ");
    let text = collapse_whitespace(&joined);

    let duration_seconds = probed_duration.or(if has_any_segments { Some(max_end) } else { None });

    Stitched {
        text,
        segments: if has_any_segments { Some(all_segments) } else { None },
        duration_seconds,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
