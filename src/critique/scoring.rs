// Weighted composite scoring across reviewers

use serde::Serialize;
use std::collections::BTreeMap;

use super::types::Critique;

/// Weight used for roles that have no entry in the weight map
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Composite score plus the per-role scores that went into it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompositeScore {
    /// `None` when no reviewer contributed a usable score
    pub composite: Option<f64>,
    pub scores: BTreeMap<String, f64>,
}

/// Weighted mean of per-role scores, rounded to 2 decimals.
///
/// Returns `None` when nothing contributes or the total weight is not
/// positive.
pub fn weighted_composite<'a>(
    scores: impl IntoIterator<Item = (&'a str, f64)>,
    weights: &BTreeMap<String, f64>,
) -> Option<f64> {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut contributed = 0usize;

    for (role, score) in scores {
        let weight = weights.get(role).copied().unwrap_or(DEFAULT_WEIGHT);
        numerator += score * weight;
        denominator += weight;
        contributed += 1;
    }

    if contributed == 0 || denominator <= 0.0 {
        return None;
    }
    Some(round_to(numerator / denominator, 2))
}

/// Composite of the critiques' usable scores. Missing, NaN and out-of-range
/// scores are left out of both sides of the mean.
pub fn compute_composite_score(
    critiques: &[Critique],
    weights: &BTreeMap<String, f64>,
) -> CompositeScore {
    let scores: BTreeMap<String, f64> = critiques
        .iter()
        .filter_map(|c| c.usable_score().map(|s| (c.reviewer_role.clone(), s)))
        .collect();

    let composite = weighted_composite(
        critiques
            .iter()
            .filter_map(|c| c.usable_score().map(|s| (c.reviewer_role.as_str(), s))),
        weights,
    );

    CompositeScore { composite, scores }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_weighted_composite_formula() {
        let critiques = vec![
            Critique::clean("security", Some(8.0)),
            Critique::clean("testing", Some(5.0)),
        ];
        let result =
            compute_composite_score(&critiques, &weights(&[("security", 2.0), ("testing", 1.0)]));
        assert_eq!(result.composite, Some(7.0));
        assert_eq!(result.scores.len(), 2);
    }

    #[test]
    fn test_missing_weight_defaults_to_one() {
        let critiques = vec![
            Critique::clean("security", Some(9.0)),
            Critique::clean("clarity", Some(6.0)),
        ];
        let result = compute_composite_score(&critiques, &weights(&[("security", 2.0)]));
        // (9*2 + 6*1) / 3 = 8.0
        assert_eq!(result.composite, Some(8.0));
    }

    #[test]
    fn test_unusable_scores_are_excluded_not_zeroed() {
        let critiques = vec![
            Critique::clean("security", Some(8.0)),
            Critique::clean("clarity", Some(f64::NAN)),
            Critique::clean("testing", Some(11.0)),
            Critique::clean("style", None),
        ];
        let result = compute_composite_score(&critiques, &BTreeMap::new());
        assert_eq!(result.composite, Some(8.0));
        assert_eq!(result.scores.keys().collect::<Vec<_>>(), vec!["security"]);
    }

    #[test]
    fn test_no_usable_scores_is_none() {
        let critiques = vec![Critique::clean("style", None)];
        let result = compute_composite_score(&critiques, &BTreeMap::new());
        assert_eq!(result.composite, None);
        assert!(result.scores.is_empty());
    }

    #[test]
    fn test_zero_total_weight_is_none() {
        let critiques = vec![Critique::clean("security", Some(8.0))];
        let result = compute_composite_score(&critiques, &weights(&[("security", 0.0)]));
        assert_eq!(result.composite, None);
    }

    #[test]
    fn test_composite_rounds_to_two_decimals() {
        let critiques = vec![
            Critique::clean("a", Some(7.0)),
            Critique::clean("b", Some(8.0)),
            Critique::clean("c", Some(8.0)),
        ];
        let result = compute_composite_score(&critiques, &BTreeMap::new());
        assert_eq!(result.composite, Some(7.67));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.756_49, 4), 0.7565);
        assert_eq!(round_to(1.005_1, 2), 1.01);
        assert_eq!(round_to(2.0, 2), 2.0);
    }
}
