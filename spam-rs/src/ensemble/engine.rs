//! Ensemble decision engine
//!
//! Reduces independent member classifier results to one verdict. The engine
//! is a pure function of (member results, configuration): no I/O, no clock,
//! no shared mutable state, so any number of scoring calls may run in
//! parallel against the same `EnsembleConfig`.
//!
//! # Scoring
//!
//! 1. Each available member becomes a signed vote in [-1, +1]
//!    (`+confidence/100` for Spam, `-confidence/100` for Not Spam).
//! 2. Votes are averaged with the configured weights, normalized by the
//!    weights of the members actually present.
//! 3. The weighted vote maps linearly onto `spam_score` in [0, 100].
//! 4. `is_spam = spam_score >= threshold`. The threshold is inclusive:
//!    a score exactly at the threshold is spam.
//! 5. `confidence = |spam_score - 50| * 2`.

use tracing::debug;

use super::types::*;
use crate::error::{EngineError, Result};

/// Score a set of member results against the ensemble configuration.
///
/// Configured members missing from `member_results` are recorded as
/// unavailable. Fails with `InvalidInput` on unknown or duplicate model ids
/// and on confidences outside [0, 100], and with `AllMembersUnavailable`
/// when no member voted.
pub fn score(member_results: &[MemberResult], config: &EnsembleConfig) -> Result<EnsembleVerdict> {
    let mut slots: Vec<Option<&MemberResult>> = vec![None; config.members().len()];

    for result in member_results {
        let index = config.position(&result.model_id).ok_or_else(|| {
            EngineError::InvalidInput(format!("unknown classifier '{}'", result.model_id))
        })?;

        if slots[index].is_some() {
            return Err(EngineError::InvalidInput(format!(
                "duplicate result for classifier '{}'",
                result.model_id
            )));
        }

        if let MemberOutcome::Vote { confidence, .. } = result.outcome {
            if !(0.0..=100.0).contains(&confidence) {
                return Err(EngineError::InvalidInput(format!(
                    "confidence of '{}' must be within [0, 100], got {}",
                    result.model_id, confidence
                )));
            }
        }

        slots[index] = Some(result);
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut members_available = 0;
    let mut spam_votes = 0;
    let mut resolved = Vec::with_capacity(slots.len());

    for (member, slot) in config.members().iter().zip(slots) {
        let result = match slot {
            Some(result) => result.clone(),
            None => MemberResult::unavailable(member.id.clone(), NOT_REPORTED),
        };

        if let Some(vote) = result.spam_vote() {
            weighted_sum += member.weight * vote;
            weight_total += member.weight;
            members_available += 1;
            if result.label() == Some(Label::Spam) {
                spam_votes += 1;
            }
        }

        resolved.push(result);
    }

    if members_available == 0 {
        return Err(EngineError::AllMembersUnavailable {
            configured: config.members().len(),
        });
    }

    let weighted_vote = weighted_sum / weight_total;
    let spam_score = spam_score_from_vote(weighted_vote);
    debug_assert!(spam_score.is_finite(), "weight total {} overflowed", weight_total);
    let is_spam = spam_score >= config.threshold();
    let confidence = ensemble_confidence(spam_score);

    debug!(
        spam_score,
        confidence,
        is_spam,
        members_available,
        configured = config.members().len(),
        "ensemble scored"
    );

    Ok(EnsembleVerdict {
        is_spam,
        confidence,
        spam_score,
        members_available,
        spam_votes,
        member_results: MemberResults::from_ordered(resolved),
    })
}

/// Per-model breakdown exactly as `score` produced it
pub fn explain(verdict: &EnsembleVerdict) -> &MemberResults {
    &verdict.member_results
}

/// Map a weighted vote in [-1, +1] onto the public [0, 100] scale
fn spam_score_from_vote(weighted_vote: f64) -> f64 {
    ((weighted_vote + 1.0) / 2.0 * 100.0).clamp(0.0, 100.0)
}

/// Distance from the 50 mark, rescaled to [0, 100]
fn ensemble_confidence(spam_score: f64) -> f64 {
    ((spam_score - 50.0).abs() * 2.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MODELS: [&str; 4] = ["svm", "naive_bayes", "random_forest", "logistic_regression"];

    fn config() -> EnsembleConfig {
        EnsembleConfig::equal_weights(MODELS).unwrap()
    }

    fn weighted_config(pairs: &[(&str, f64)], threshold: f64) -> EnsembleConfig {
        let members = pairs
            .iter()
            .map(|(id, weight)| MemberWeight {
                id: ModelId::from(*id),
                weight: *weight,
            })
            .collect();
        EnsembleConfig::new(members, threshold, Duration::from_secs(1)).unwrap()
    }

    fn all(label: Label, confidence: f64) -> Vec<MemberResult> {
        MODELS
            .iter()
            .map(|id| MemberResult::vote(*id, label, confidence))
            .collect()
    }

    fn flipped(results: &[MemberResult]) -> Vec<MemberResult> {
        results
            .iter()
            .map(|r| match &r.outcome {
                MemberOutcome::Vote { label, confidence } => {
                    MemberResult::vote(r.model_id.clone(), label.flipped(), *confidence)
                }
                MemberOutcome::Unavailable { reason } => {
                    MemberResult::unavailable(r.model_id.clone(), reason.clone())
                }
            })
            .collect()
    }

    fn example_run() -> Vec<MemberResult> {
        vec![
            MemberResult::vote("svm", Label::Spam, 98.0),
            MemberResult::vote("naive_bayes", Label::Spam, 97.0),
            MemberResult::vote("random_forest", Label::Spam, 84.7),
            MemberResult::vote("logistic_regression", Label::NotSpam, 72.0),
        ]
    }

    #[test]
    fn test_unanimous_confident_spam() {
        let verdict = score(&all(Label::Spam, 100.0), &config()).unwrap();

        assert_eq!(verdict.spam_score, 100.0);
        assert!(verdict.is_spam);
        assert_eq!(verdict.confidence, 100.0);
        assert_eq!(verdict.spam_votes, 4);
        assert_eq!(verdict.prediction(), Label::Spam);
    }

    #[test]
    fn test_unanimous_confident_not_spam() {
        let verdict = score(&all(Label::NotSpam, 100.0), &config()).unwrap();

        assert_eq!(verdict.spam_score, 0.0);
        assert!(!verdict.is_spam);
        assert_eq!(verdict.confidence, 100.0);
        assert_eq!(verdict.spam_votes, 0);
    }

    #[test]
    fn test_example_run_exact_score() {
        let verdict = score(&example_run(), &config()).unwrap();

        // Same expression, same summation order as the engine.
        let weighted_vote =
            (98.0 / 100.0 + 97.0 / 100.0 + 84.7 / 100.0 + -(72.0 / 100.0)) / 4.0;
        let expected = (weighted_vote + 1.0) / 2.0 * 100.0;

        assert_eq!(verdict.spam_score, expected);
        assert!((verdict.spam_score - 75.9625).abs() < 1e-9);
        assert!(verdict.is_spam);
        assert_eq!(verdict.confidence, (expected - 50.0).abs() * 2.0);
        assert!((verdict.confidence - 51.925).abs() < 1e-9);
        assert_eq!(verdict.members_available, 4);
        assert_eq!(verdict.spam_votes, 3);
    }

    #[test]
    fn test_symmetry_under_label_swap() {
        let cases = vec![
            example_run(),
            all(Label::Spam, 63.0),
            vec![
                MemberResult::vote("svm", Label::Spam, 55.5),
                MemberResult::unavailable("naive_bayes", "timed out"),
                MemberResult::vote("random_forest", Label::NotSpam, 91.0),
            ],
        ];
        let config = weighted_config(
            &[
                ("svm", 3.0),
                ("naive_bayes", 1.0),
                ("random_forest", 0.5),
                ("logistic_regression", 2.0),
            ],
            50.0,
        );

        for results in cases {
            let base = score(&results, &config).unwrap();
            let swapped = score(&flipped(&results), &config).unwrap();
            assert!(
                (swapped.spam_score - (100.0 - base.spam_score)).abs() < 1e-9,
                "{} vs {}",
                swapped.spam_score,
                base.spam_score
            );
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // Perfect disagreement lands exactly on 50.
        let results = vec![
            MemberResult::vote("svm", Label::Spam, 60.0),
            MemberResult::vote("naive_bayes", Label::NotSpam, 60.0),
        ];
        let config = weighted_config(&[("svm", 1.0), ("naive_bayes", 1.0)], 50.0);
        let verdict = score(&results, &config).unwrap();

        assert_eq!(verdict.spam_score, 50.0);
        assert!(verdict.is_spam);
        assert_eq!(verdict.confidence, 0.0);

        // A single Spam@50 vote lands exactly on 75.
        let config = weighted_config(&[("svm", 1.0)], 75.0);
        let verdict = score(&[MemberResult::vote("svm", Label::Spam, 50.0)], &config).unwrap();

        assert_eq!(verdict.spam_score, 75.0);
        assert!(verdict.is_spam);
    }

    #[test]
    fn test_missing_member_matches_weighted_mean_vote() {
        let config = weighted_config(&[("a", 2.0), ("b", 1.0), ("c", 1.5)], 50.0);

        let without_c = vec![
            MemberResult::vote("a", Label::Spam, 90.0),
            MemberResult::vote("b", Label::NotSpam, 30.0),
        ];
        // Weighted mean of the others: (2 * 0.9 + 1 * -0.3) / 3 = 0.5
        let with_c_at_mean = vec![
            MemberResult::vote("a", Label::Spam, 90.0),
            MemberResult::vote("b", Label::NotSpam, 30.0),
            MemberResult::vote("c", Label::Spam, 50.0),
        ];

        let missing = score(&without_c, &config).unwrap();
        let present = score(&with_c_at_mean, &config).unwrap();

        assert!((missing.spam_score - present.spam_score).abs() < 1e-9);
        assert!((missing.spam_score - 75.0).abs() < 1e-9);
        assert_eq!(missing.members_available, 2);
        assert_eq!(present.members_available, 3);
    }

    #[test]
    fn test_large_weights_keep_score_finite() {
        let config = weighted_config(&[("svm", 1e307), ("naive_bayes", 1e307)], 50.0);
        let results = vec![
            MemberResult::vote("svm", Label::Spam, 90.0),
            MemberResult::vote("naive_bayes", Label::Spam, 90.0),
        ];

        let verdict = score(&results, &config).unwrap();
        assert!(verdict.is_spam);
        assert!((verdict.spam_score - 95.0).abs() < 1e-9);
        assert!((verdict.confidence - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_member_is_represented() {
        let results = vec![MemberResult::vote("svm", Label::Spam, 90.0)];
        let verdict = score(&results, &config()).unwrap();

        assert_eq!(verdict.member_results.len(), 4);
        let order: Vec<&str> = verdict.member_results.model_ids().map(|id| id.as_str()).collect();
        assert_eq!(order, MODELS.to_vec());

        let missing = verdict.member_results.get("naive_bayes").unwrap();
        assert_eq!(
            missing.outcome,
            MemberOutcome::Unavailable {
                reason: NOT_REPORTED.to_string()
            }
        );
        assert_eq!(verdict.members_available, 1);
    }

    #[test]
    fn test_unavailable_member_is_excluded_from_weights() {
        let results = vec![
            MemberResult::vote("svm", Label::Spam, 100.0),
            MemberResult::unavailable("naive_bayes", "model file not found"),
            MemberResult::unavailable("random_forest", "timed out after 2000ms"),
            MemberResult::unavailable("logistic_regression", "connection refused"),
        ];
        let verdict = score(&results, &config()).unwrap();

        assert_eq!(verdict.spam_score, 100.0);
        assert_eq!(verdict.members_available, 1);
        assert!(!verdict.member_results.get("random_forest").unwrap().is_available());
    }

    #[test]
    fn test_deterministic_output() {
        let first = serde_json::to_vec(&score(&example_run(), &config()).unwrap()).unwrap();
        let second = serde_json::to_vec(&score(&example_run(), &config()).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut reversed = example_run();
        reversed.reverse();

        let a = score(&example_run(), &config()).unwrap();
        let b = score(&reversed, &config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input_fails() {
        let err = score(&[], &config()).unwrap_err();
        assert!(matches!(err, EngineError::AllMembersUnavailable { configured: 4 }));
    }

    #[test]
    fn test_all_unavailable_fails() {
        let results: Vec<MemberResult> = MODELS
            .iter()
            .map(|id| MemberResult::unavailable(*id, "timed out"))
            .collect();
        let err = score(&results, &config()).unwrap_err();
        assert!(matches!(err, EngineError::AllMembersUnavailable { .. }));
    }

    #[test]
    fn test_duplicate_member_is_invalid() {
        let results = vec![
            MemberResult::vote("svm", Label::Spam, 90.0),
            MemberResult::vote("svm", Label::NotSpam, 90.0),
        ];
        let err = score(&results, &config()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_member_is_invalid() {
        let results = vec![MemberResult::vote("knn", Label::Spam, 90.0)];
        let err = score(&results, &config()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_out_of_range_confidence_is_invalid() {
        for bad in [-1.0, 100.1, f64::NAN] {
            let results = vec![MemberResult::vote("svm", Label::Spam, bad)];
            let err = score(&results, &config()).unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)), "confidence {}", bad);
        }
    }

    #[test]
    fn test_explain_returns_breakdown_unchanged() {
        let verdict = score(&example_run(), &config()).unwrap();
        let breakdown = explain(&verdict);

        assert_eq!(breakdown, &verdict.member_results);
        assert_eq!(
            breakdown.get("logistic_regression").unwrap().outcome,
            MemberOutcome::Vote {
                label: Label::NotSpam,
                confidence: 72.0
            }
        );
    }

    #[test]
    fn test_weights_shift_score() {
        let results = vec![
            MemberResult::vote("svm", Label::Spam, 100.0),
            MemberResult::vote("naive_bayes", Label::NotSpam, 100.0),
        ];
        let config = weighted_config(&[("svm", 3.0), ("naive_bayes", 1.0)], 50.0);
        let verdict = score(&results, &config).unwrap();

        // (3 - 1) / 4 = 0.5 -> 75
        assert_eq!(verdict.spam_score, 75.0);
        assert_eq!(verdict.confidence, 50.0);
    }
}
