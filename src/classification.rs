//! Helpers shared by the evaluation and classify routes: picking the winning
//! candidate, the confidence floor, and the rating table.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Results below this are rejected as a client error (input not specific enough).
pub const MIN_CONFIDENCE: f64 = 0.25;

const RATING_TABLE: [(&str, &str); 10] = [
    ("one", "10%"),
    ("two", "20%"),
    ("three", "30%"),
    ("four", "40%"),
    ("five", "50%"),
    ("six", "60%"),
    ("seven", "70%"),
    ("eight", "80%"),
    ("nine", "90%"),
    ("ten", "100%"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationCandidate {
    pub label: String,
    pub confidence: f64,
}

/// Highest-confidence candidate. Ties keep the first one seen.
pub fn best_candidate(candidates: &[ClassificationCandidate]) -> Option<&ClassificationCandidate> {
    candidates.iter().fold(None, |best, c| match best {
        Some(b) if b.confidence >= c.confidence => Some(b),
        _ => Some(c),
    })
}

/// Pick the winner and apply the confidence floor.
pub fn confident_winner(
    candidates: Vec<ClassificationCandidate>,
) -> Result<ClassificationCandidate, AppError> {
    let winner = best_candidate(&candidates)
        .cloned()
        .ok_or_else(|| AppError::Provider("classification returned no candidates".into()))?;

    if winner.confidence < MIN_CONFIDENCE {
        return Err(AppError::LowConfidence {
            confidence: winner.confidence,
        });
    }
    Ok(winner)
}

/// Map an ordinal label (`one`..`ten`) to its percentage rating.
pub fn rating_for_label(label: &str) -> Option<&'static str> {
    RATING_TABLE
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, pct)| *pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cand(label: &str, confidence: f64) -> ClassificationCandidate {
        ClassificationCandidate {
            label: label.into(),
            confidence,
        }
    }

    #[test]
    fn test_best_candidate_picks_max() {
        let cands = vec![cand("one", 0.2), cand("seven", 0.7), cand("three", 0.1)];
        assert_eq!(best_candidate(&cands).unwrap().label, "seven");
    }

    #[test]
    fn test_best_candidate_tie_keeps_first() {
        let cands = vec![cand("a", 0.5), cand("b", 0.5)];
        assert_eq!(best_candidate(&cands).unwrap().label, "a");
    }

    #[test]
    fn test_best_candidate_empty() {
        assert!(best_candidate(&[]).is_none());
    }

    #[test]
    fn test_confident_winner_floor_is_inclusive() {
        let winner = confident_winner(vec![cand("two", MIN_CONFIDENCE)]).unwrap();
        assert_eq!(winner.label, "two");

        let err = confident_winner(vec![cand("two", 0.2499)]).unwrap_err();
        assert!(matches!(err, AppError::LowConfidence { .. }));
    }

    #[test]
    fn test_confident_winner_empty_is_provider_error() {
        let err = confident_winner(Vec::new()).unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[test]
    fn test_rating_table_is_stable() {
        let expected = [
            "10%", "20%", "30%", "40%", "50%", "60%", "70%", "80%", "90%", "100%",
        ];
        let labels = [
            "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        ];
        for (label, pct) in labels.iter().zip(expected) {
            assert_eq!(rating_for_label(label), Some(pct));
            assert_eq!(rating_for_label(label), rating_for_label(label));
        }
    }

    #[test]
    fn test_rating_unknown_label() {
        assert_eq!(rating_for_label("eleven"), None);
        assert_eq!(rating_for_label("One"), None);
    }

    proptest! {
        #[test]
        fn prop_numeric_labels_have_no_rating(n in 0u32..1000) {
            prop_assert_eq!(rating_for_label(&n.to_string()), None);
        }
    }
}
