//! Nutrient threshold exceedance evaluation.
//!
//! Compares a product's canonical nutrient vector against the merged
//! [`ThresholdProfile`](crate::profile::ThresholdProfile). This is a total,
//! deterministic function: absent nutrients read as zero and can only fail
//! to exceed.

use serde::{Deserialize, Serialize};

use crate::nutrient::{NutrientVector, names};
use crate::profile::ThresholdProfile;

/// Derived profile key checked as a calorie ratio instead of a raw amount.
const FAT_RATIO_KEY: &str = "fat_ratio";

/// Outcome of a threshold check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdEvaluation {
    /// True iff at least one nutrient exceeded its limit.
    pub any_exceed: bool,
    /// Names of the exceeded nutrients, in profile iteration order.
    pub exceeded_nutrients: Vec<String>,
}

/// Evaluates products against a user's threshold profile.
#[derive(Debug, Clone, Default)]
pub struct NutrientThresholdEvaluator;

impl NutrientThresholdEvaluator {
    pub fn new() -> Self {
        NutrientThresholdEvaluator
    }

    /// Check every profile limit against the product vector.
    ///
    /// A nutrient is flagged when its actual value is strictly greater than
    /// the limit. `fat_ratio` is derived as `fat·9 / calories`; with zero or
    /// negative calories the ratio is undefined and never flags.
    pub fn evaluate(
        &self,
        profile: &ThresholdProfile,
        vector: &NutrientVector,
    ) -> ThresholdEvaluation {
        let mut exceeded = Vec::new();

        for (nutrient, limit) in profile.limits() {
            let actual = if nutrient == FAT_RATIO_KEY {
                let calories = vector.get(names::CALORIES);
                if calories <= 0.0 {
                    continue;
                }
                vector.get(names::FAT) * 9.0 / calories
            } else {
                vector.get(nutrient)
            };

            if actual > limit {
                exceeded.push(nutrient.to_string());
            }
        }

        ThresholdEvaluation {
            any_exceed: !exceeded.is_empty(),
            exceeded_nutrients: exceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ThresholdProfile;

    fn profile_with(limits: &[(&str, f64)]) -> ThresholdProfile {
        let mut profile = ThresholdProfile::default();
        for (nutrient, limit) in limits {
            profile.insert_if_absent(*nutrient, *limit);
        }
        profile
    }

    #[test]
    fn test_strictly_exclusive_boundary() {
        let profile = profile_with(&[("sodium", 500.0)]);
        let evaluator = NutrientThresholdEvaluator::new();

        let mut at_limit = NutrientVector::new();
        at_limit.set("sodium", 500.0);
        let result = evaluator.evaluate(&profile, &at_limit);
        assert!(!result.any_exceed);

        let mut over_limit = NutrientVector::new();
        over_limit.set("sodium", 500.01);
        let result = evaluator.evaluate(&profile, &over_limit);
        assert!(result.any_exceed);
        assert_eq!(result.exceeded_nutrients, vec!["sodium"]);
    }

    #[test]
    fn test_absent_nutrient_reads_zero() {
        let profile = profile_with(&[("sugar", 1.67), ("potassium_min", 1166.67)]);
        let result =
            NutrientThresholdEvaluator::new().evaluate(&profile, &NutrientVector::new());
        assert!(!result.any_exceed);
        assert!(result.exceeded_nutrients.is_empty());
    }

    #[test]
    fn test_fat_ratio_derived_value() {
        let profile = profile_with(&[("fat_ratio", 0.25)]);
        let evaluator = NutrientThresholdEvaluator::new();

        // 10g fat = 90 kcal out of 200 kcal -> ratio 0.45, exceeds 0.25.
        let mut fatty = NutrientVector::new();
        fatty.set("fat", 10.0).set("calories", 200.0);
        assert!(evaluator.evaluate(&profile, &fatty).any_exceed);

        // 2g fat = 18 kcal out of 200 kcal -> ratio 0.09.
        let mut lean = NutrientVector::new();
        lean.set("fat", 2.0).set("calories", 200.0);
        assert!(!evaluator.evaluate(&profile, &lean).any_exceed);
    }

    #[test]
    fn test_fat_ratio_zero_calories_never_flags() {
        let profile = profile_with(&[("fat_ratio", 0.25)]);
        let mut vector = NutrientVector::new();
        vector.set("fat", 50.0).set("calories", 0.0);

        let result = NutrientThresholdEvaluator::new().evaluate(&profile, &vector);
        assert!(!result.any_exceed);
    }

    #[test]
    fn test_multiple_exceedances_collected() {
        let profile = profile_with(&[("sodium", 100.0), ("sugar", 5.0)]);
        let mut vector = NutrientVector::new();
        vector.set("sodium", 300.0).set("sugar", 20.0);

        let result = NutrientThresholdEvaluator::new().evaluate(&profile, &vector);
        assert!(result.any_exceed);
        assert_eq!(result.exceeded_nutrients.len(), 2);
    }
}
