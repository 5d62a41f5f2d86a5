//! Realism extraction and score aggregation.

use serde_json::Value;

use dfguard_models::{FinalVerdict, PerFrameResult};

use crate::error::{PipelineError, PipelineResult};
use crate::labels::{parse_label_scores, LabelScoreMap};

/// Labels carrying the realism probability, in priority order.
pub const REALISM_LABELS: [&str; 4] = ["realism", "real", "bonafide", "bona fide"];

/// Realism probability of one normalized response, if it carries one.
pub fn realism_probability(map: &LabelScoreMap) -> Option<f64> {
    REALISM_LABELS
        .iter()
        .find_map(|label| map.get(label))
        .map(|p| p.clamp(0.0, 1.0))
}

/// Realism samples from raw outputs, in input order, capped at `max_samples`.
///
/// Outputs without a realism label contribute nothing.
pub fn realism_samples<'a, I>(outputs: I, max_samples: usize) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Value>,
{
    outputs
        .into_iter()
        .filter_map(|raw| realism_probability(&parse_label_scores(raw)))
        .take(max_samples)
        .collect()
}

/// Mean realism of the successful frames, scaled to 0..100 and classified.
///
/// `failed` is only used to describe the error when no frame is usable.
pub fn aggregate_verdict(
    results: &[PerFrameResult],
    failed: usize,
    max_samples: usize,
    threshold: f64,
) -> PipelineResult<FinalVerdict> {
    let samples = realism_samples(results.iter().map(|r| &r.raw_output), max_samples);

    if samples.is_empty() {
        return Err(PipelineError::NoParsableScore {
            attempted: results.len() + failed,
            failed,
        });
    }

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    Ok(FinalVerdict::from_score(mean.clamp(0.0, 1.0) * 100.0, threshold))
}
