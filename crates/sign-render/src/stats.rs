use crate::types::*;
use std::collections::HashSet;
use std::time::Duration;

/// Calculate statistics for a finished batch
pub fn calculate_statistics(
    ids: &[&str],
    succeeded: usize,
    failed: usize,
    timings: &[StageTimings],
    chunks: usize,
    elapsed: Duration,
) -> BatchStatistics {
    let unique_templates = ids
        .iter()
        .map(|id| template_base(id))
        .collect::<HashSet<_>>()
        .len();

    BatchStatistics {
        total: ids.len(),
        succeeded,
        failed,
        unique_templates,
        chunks,
        render: summarize(timings.iter().map(|t| t.render)),
        compose: summarize(timings.iter().map(|t| t.compose)),
        export: summarize(timings.iter().map(|t| t.export)),
        elapsed: elapsed.as_secs_f64(),
    }
}

/// Artifact id without a trailing numeric copy suffix (`Pumpe_3` -> `Pumpe`)
pub fn template_base(id: &str) -> &str {
    match id.rsplit_once('_') {
        Some((base, suffix))
            if !base.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => id,
    }
}

fn summarize(values: impl Iterator<Item = f64>) -> TimingSummary {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = 0.0f64;
    for value in values {
        count += 1;
        sum += value;
        min = min.min(value);
        max = max.max(value);
    }

    if count == 0 {
        return TimingSummary::default();
    }

    TimingSummary {
        min,
        max,
        avg: sum / count as f64,
    }
}
