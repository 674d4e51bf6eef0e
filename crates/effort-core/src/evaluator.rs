//! Bounded edit-distance comparison with an accept/reject tolerance.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Distance between a candidate and its reference, plus the tolerance verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceVerdict {
    pub distance: usize,
    pub accepted: bool,
}

/// Length of a text in Unicode scalar values, the unit edit distance counts in.
pub fn text_len(text: &str) -> usize {
    text.chars().count()
}

/// Number of edits tolerated for a reference of `reference_len` characters.
///
/// A non-positive (or NaN) rate tolerates nothing.
pub fn allowed_edits(reference_len: usize, max_error_rate: f64) -> usize {
    if max_error_rate.is_nan() || max_error_rate <= 0.0 {
        return 0;
    }
    (max_error_rate * reference_len as f64).floor() as usize
}

/// Levenshtein distance between `candidate` and `reference` and whether it is
/// within `max_error_rate` of the reference length.
///
/// A rate of zero requires an exact match.
pub fn distance_and_verdict(candidate: &str, reference: &str, max_error_rate: f64) -> DistanceVerdict {
    let distance = strsim::levenshtein(candidate, reference);
    let accepted = if max_error_rate > 0.0 {
        distance <= allowed_edits(text_len(reference), max_error_rate)
    } else {
        distance == 0
    };
    DistanceVerdict { distance, accepted }
}

/// `1 - distance / max_distance`, clamped into `[0, 1]`.
///
/// A clamp only happens when the distance exceeds the normalization length,
/// which the tolerance check normally rules out; it is logged as an anomaly.
pub fn accuracy_ratio(distance: usize, max_distance: usize) -> f64 {
    if max_distance == 0 {
        if distance == 0 {
            return 1.0;
        }
        warn!(distance, max_distance, "accuracy ratio clamped: empty reference");
        return 0.0;
    }
    let raw = 1.0 - distance as f64 / max_distance as f64;
    if raw < 0.0 {
        warn!(distance, max_distance, raw, "accuracy ratio clamped to 0");
        return 0.0;
    }
    raw
}
