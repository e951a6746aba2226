use crate::asset::AudioAsset;
use crate::chunk::{ChunkPlan, ChunkSpec};

/// Minimum chunk duration; `D_eff` is never allowed below this.
const MIN_CHUNK_SECONDS: f64 = 1.0;

/// C2: purely data-driven, deterministic chunk planning.
///
/// Given the same `AudioAsset`, target duration and byte ceiling, this always
/// produces the same plan — required for checkpoint validity, since on
/// resume the stored plan is authoritative and the planner is never re-run.
pub fn plan_chunks(asset: &AudioAsset, target_duration_seconds: f64, max_bytes_per_chunk: u64) -> ChunkPlan {
    let duration = match asset.duration_seconds {
        Some(d) if d > 0.0 => d,
        _ => {
            // Unknown or zero duration: degrade to a single chunk over the
            // whole asset rather than guessing a boundary count.
            return ChunkPlan {
                chunks: vec![ChunkSpec {
                    index: 0,
                    start_seconds: 0.0,
                    duration_seconds: asset.duration_seconds.unwrap_or(0.0),
                    file_path: None,
                }],
            };
        }
    };

    let bytes_per_second = asset.size_bytes as f64 / duration;
    let d_size = if bytes_per_second > 0.0 {
        (max_bytes_per_chunk as f64 / bytes_per_second).floor()
    } else {
        target_duration_seconds
    };

    let d_eff = target_duration_seconds.min(d_size).max(MIN_CHUNK_SECONDS);

    let chunk_count = (duration / d_eff).ceil().max(1.0) as u32;

    let mut chunks = Vec::with_capacity(chunk_count as usize);
    for i in 0..chunk_count {
        let start = i as f64 * d_eff;
        if start >= duration {
            break;
        }
        let chunk_duration = d_eff.min(duration - start);
        chunks.push(ChunkSpec {
            index: i,
            start_seconds: start,
            duration_seconds: chunk_duration,
            file_path: None,
        });
    }

    ChunkPlan { chunks }
}
