//! Classifier seam and the score → (label index, confidence) reduction.
//!
//! A [`Classify`] implementation owns the model and turns a preprocessed
//! tensor into a probability distribution, one entry per category label.
//! Selection is argmax with the lowest index winning ties; confidence is the
//! winning probability in percent, rounded half away from zero to two
//! decimals.

use crate::error::InferenceError;
use crate::preprocess::Tensor;

/// Maximum distance from 1.0 at which a score vector still counts as a distribution.
pub const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// Forward pass over a single preprocessed image.
///
/// Implementations are read-only after construction and may be called from
/// many requests at once.
pub trait Classify: Send + Sync {
    /// Output dimensionality; must equal the label count.
    fn num_classes(&self) -> usize;

    /// Probability distribution over categories: non-negative, summing to ~1.0.
    fn infer(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError>;
}

// ── Distribution helpers ──

/// True if every score is finite and non-negative and the scores sum to ~1.0.
pub fn is_distribution(scores: &[f32]) -> bool {
    if scores.is_empty() || scores.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return false;
    }
    let sum: f32 = scores.iter().sum();
    (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE
}

/// Normalise raw model output into a probability distribution.
///
/// Output that already is a distribution (softmax head) passes through
/// unchanged; anything else is treated as logits and softmaxed.
pub fn into_distribution(mut scores: Vec<f32>) -> Result<Vec<f32>, InferenceError> {
    if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
        return Err(InferenceError::NonFinite(i));
    }
    if !is_distribution(&scores) {
        softmax(&mut scores);
    }
    Ok(scores)
}

/// Numerically stable softmax in place.
pub fn softmax(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}

// ── Selection helpers ──

/// Index and value of the largest score.
///
/// Ties resolve to the lowest index. NaN entries are skipped; `None` if
/// nothing is left.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best
}

/// `100 × probability`, rounded half away from zero to two decimals.
///
/// Computed in `f64` from the `f32` probability, so `0.123456` gives `12.35`
/// and `0.9` gives `90.0`. Exact halves round up in magnitude (`0.125` →
/// `0.13` in [`round_to_cents`]), unlike banker's rounding.
pub fn confidence_percent(probability: f32) -> f64 {
    round_to_cents(probability as f64 * 100.0)
}

/// Round to two decimal places, half away from zero.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
    }

    #[test]
    fn argmax_ties_resolve_to_lowest_index() {
        assert_eq!(argmax(&[0.1, 0.4, 0.1, 0.4]), Some((1, 0.4)));
        assert_eq!(argmax(&[0.25, 0.25, 0.25, 0.25]), Some((0, 0.25)));
        assert_eq!(argmax(&[0.0, 0.0]), Some((0, 0.0)));
    }

    #[test]
    fn argmax_of_empty_is_none() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[f32::NAN]), None);
    }

    #[test]
    fn confidence_rounds_to_two_decimals() {
        assert_eq!(confidence_percent(0.123456), 12.35);
        assert_eq!(confidence_percent(0.9), 90.0);
        assert_eq!(confidence_percent(1.0), 100.0);
        assert_eq!(confidence_percent(0.0), 0.0);
        assert_eq!(confidence_percent(0.5), 50.0);
    }

    #[test]
    fn exact_halves_round_away_from_zero() {
        assert_eq!(round_to_cents(0.125), 0.13);
        assert_eq!(round_to_cents(0.625), 0.63);
        assert_eq!(round_to_cents(0.375), 0.38);
        assert_eq!(round_to_cents(12.0), 12.0);
    }

    #[test]
    fn distribution_passes_through_unchanged() {
        let probs = vec![0.9, 0.05, 0.05];
        assert!(is_distribution(&probs));
        assert_eq!(into_distribution(probs.clone()).unwrap(), probs);
    }

    #[test]
    fn logits_are_softmaxed() {
        let out = into_distribution(vec![2.0, 1.0, -1.0]).unwrap();
        assert!(is_distribution(&out), "{out:?}");
        assert!(out.iter().all(|&p| p > 0.0));
        assert_eq!(argmax(&out).map(|(i, _)| i), Some(0));
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let mut scores = vec![1000.0, 1000.0, 0.0];
        softmax(&mut scores);
        assert!((scores[0] - 0.5).abs() < 1e-6);
        assert!((scores[1] - 0.5).abs() < 1e-6);
        assert!(scores[2] >= 0.0 && scores[2] < 1e-6);
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let err = into_distribution(vec![0.5, f32::NAN, 0.5]).unwrap_err();
        assert!(matches!(err, InferenceError::NonFinite(1)));
        let err = into_distribution(vec![f32::INFINITY, 0.0]).unwrap_err();
        assert!(matches!(err, InferenceError::NonFinite(0)));
    }

    #[test]
    fn negative_or_unnormalised_scores_are_not_distributions() {
        assert!(!is_distribution(&[0.5, 0.6]));
        assert!(!is_distribution(&[1.2, -0.2]));
        assert!(!is_distribution(&[]));
    }
}
