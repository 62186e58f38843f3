//! Substitute-product recommendation over retrieved candidates.
//!
//! For every active, scorable condition and every candidate, the recommender
//! computes that condition's health score and emits one row. The output is
//! sorted by score alone, so when several conditions are active their rows
//! interleave rather than group by condition; hosts that want per-condition
//! grouping sort on `disease` themselves.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogStore;
use crate::error::Result;
use crate::nutrient::ColumnMapping;
use crate::profile::{DiseaseFlags, DiseaseKind};
use crate::retrieval::Candidate;
use crate::scoring::{KidneyParams, score_for};

/// One scored substitute recommendation for one condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubRecommendation {
    pub product_id: u64,
    /// The candidate's retrieval rank, carried through unchanged.
    pub rank: u32,
    pub disease: DiseaseKind,
    /// Health-compatibility score in [0, 100].
    pub score: f64,
    /// Human-readable justification embedding the condition and score.
    pub reason: String,
}

/// Conditions the recommender scores, in emission order.
const SCORABLE: [DiseaseKind; 3] = [
    DiseaseKind::Diabetes,
    DiseaseKind::Hypertension,
    DiseaseKind::KidneyDisease,
];

/// Ranks retrieved candidates per active condition.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionRecommender {
    mapping: ColumnMapping,
}

impl SubstitutionRecommender {
    pub fn new(mapping: ColumnMapping) -> Self {
        SubstitutionRecommender { mapping }
    }

    /// Score every (condition, candidate) pair and sort descending by score.
    ///
    /// Returns an empty list without touching the catalog when no scorable
    /// condition is active. Candidates missing from the catalog are skipped.
    pub fn recommend(
        &self,
        catalog: &dyn CatalogStore,
        flags: &DiseaseFlags,
        candidates: &[Candidate],
    ) -> Result<Vec<SubRecommendation>> {
        let active: Vec<DiseaseKind> = SCORABLE
            .iter()
            .copied()
            .filter(|kind| flags.is_active(*kind))
            .collect();
        if active.is_empty() {
            return Ok(Vec::new());
        }

        let kidney = KidneyParams {
            stage: flags.kidney_stage,
            processed_food: flags.processed_food,
            weight_kg: flags.weight_kg,
        };

        let mut recommendations = Vec::with_capacity(active.len() * candidates.len());
        for kind in active {
            for candidate in candidates {
                let Some(product) = catalog.product(candidate.product_id)? else {
                    warn!(
                        "candidate product {} missing from catalog, skipping",
                        candidate.product_id
                    );
                    continue;
                };
                let nutrients = product.nutrient_vector(&self.mapping);
                let Some(score) = score_for(kind, &nutrients, &kidney) else {
                    continue;
                };

                recommendations.push(SubRecommendation {
                    product_id: candidate.product_id,
                    rank: candidate.rank,
                    disease: kind,
                    score,
                    reason: format!(
                        "{} health score {score:.1}/100",
                        kind.label().to_uppercase()
                    ),
                });
            }
        }

        recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(recommendations)
    }
}
