//! Final-answer composition.
//!
//! The composer reads the accumulated state and writes the user-facing
//! verdict: a caution message with the best-scoring substitutes when danger
//! was found, or a reassurance when the product cleared every check. It is
//! the only stage that sets the terminal routing step.

use serde::{Deserialize, Serialize};

use super::policy::NextStep;
use super::state::PipelineState;
use crate::recommend::SubRecommendation;

/// How many substitutes the caution message surfaces.
pub const TOP_RECOMMENDATIONS: usize = 3;

/// Caution verdict when substitutes were found.
pub const MSG_CAUTION_WITH_SUBSTITUTES: &str =
    "Caution substances detected; showing substitute products.";
/// Caution verdict when retrieval or scoring came up empty.
pub const MSG_CAUTION_NO_SUBSTITUTES: &str =
    "Caution substances detected; no substitute found.";
/// Verdict when nothing exceeded and no allergen was detected.
pub const MSG_SAFE: &str = "This product is relatively safe under the current profile.";

/// The composed answer, also kept on the state as `final_answer` text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedAnswer {
    pub message: String,
    pub top_recommendations: Vec<SubRecommendation>,
    /// Exceeded nutrient names, for the caution case.
    pub exceeded_nutrients: Vec<String>,
    /// Detected allergen source substances, for the caution case.
    pub allergens: Vec<String>,
}

/// Composes the final answer and terminates routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseComposer;

impl ResponseComposer {
    pub fn new() -> Self {
        ResponseComposer
    }

    /// Write `final_answer` and set the routing cursor to [`NextStep::End`].
    pub fn compose(&self, state: &mut PipelineState) -> ComposedAnswer {
        let danger = state.any_exceed() || state.any_allergen();

        let answer = if danger {
            let top: Vec<SubRecommendation> = state
                .recommendations
                .iter()
                .take(TOP_RECOMMENDATIONS)
                .cloned()
                .collect();
            let message = if top.is_empty() {
                MSG_CAUTION_NO_SUBSTITUTES
            } else {
                MSG_CAUTION_WITH_SUBSTITUTES
            };
            ComposedAnswer {
                message: message.to_string(),
                top_recommendations: top,
                exceeded_nutrients: state
                    .evaluation
                    .as_ref()
                    .map(|e| e.exceeded_nutrients.clone())
                    .unwrap_or_default(),
                allergens: state.allergen.allergens.clone(),
            }
        } else {
            ComposedAnswer {
                message: MSG_SAFE.to_string(),
                top_recommendations: Vec::new(),
                exceeded_nutrients: Vec::new(),
                allergens: Vec::new(),
            }
        };

        state.final_answer = answer.message.clone();
        state.next_step = NextStep::End;
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::DiseaseKind;
    use crate::threshold::ThresholdEvaluation;

    fn recommendation(product_id: u64, score: f64) -> SubRecommendation {
        SubRecommendation {
            product_id,
            rank: 1,
            disease: DiseaseKind::Diabetes,
            score,
            reason: format!("DIABETES health score {score:.1}/100"),
        }
    }

    #[test]
    fn test_safe_message_when_no_danger() {
        let mut state = PipelineState::new("u-1", 1);
        state.evaluation = Some(ThresholdEvaluation::default());

        let answer = ResponseComposer::new().compose(&mut state);
        assert_eq!(answer.message, MSG_SAFE);
        assert!(answer.top_recommendations.is_empty());
        assert_eq!(state.final_answer, MSG_SAFE);
        assert_eq!(state.next_step, NextStep::End);
    }

    #[test]
    fn test_caution_with_top_three_substitutes() {
        let mut state = PipelineState::new("u-1", 1);
        state.evaluation = Some(ThresholdEvaluation {
            any_exceed: true,
            exceeded_nutrients: vec!["sugar".into()],
        });
        state.recommendations = vec![
            recommendation(10, 91.0),
            recommendation(11, 85.5),
            recommendation(12, 70.2),
            recommendation(13, 41.0),
        ];

        let answer = ResponseComposer::new().compose(&mut state);
        assert_eq!(answer.message, MSG_CAUTION_WITH_SUBSTITUTES);
        assert_eq!(answer.top_recommendations.len(), TOP_RECOMMENDATIONS);
        assert_eq!(answer.top_recommendations[0].product_id, 10);
        assert_eq!(answer.exceeded_nutrients, vec!["sugar"]);
    }

    #[test]
    fn test_caution_without_substitutes() {
        let mut state = PipelineState::new("u-1", 1);
        state.allergen.any_allergen = true;
        state.allergen.allergens = vec!["우유".into()];

        let answer = ResponseComposer::new().compose(&mut state);
        assert_eq!(answer.message, MSG_CAUTION_NO_SUBSTITUTES);
        assert_eq!(answer.allergens, vec!["우유"]);
        assert_eq!(state.next_step, NextStep::End);
    }
}
