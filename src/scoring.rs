//! Per-disease health-compatibility scoring.
//!
//! Each disease maps a canonical nutrient vector (plus disease-specific
//! parameters) to a score in `[0, 100]`. All curves are saturating Hill /
//! Michaelis-Menten responses rather than linear scales: scores compress
//! once a nutrient is safely low and penalize sharply past a biologically
//! meaningful threshold. The functions are total over non-negative inputs;
//! non-positive calories, potassium or weight take the documented guard
//! paths instead of producing NaN.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::nutrient::{NutrientVector, names};
use crate::profile::{DiseaseKind, KidneyStage};

/// Neutral sub-score used when a required parameter (body weight) is unknown.
const NEUTRAL_SUBSCORE: f64 = 50.0;

/// Saturating Hill response `vmax·xⁿ/(kmⁿ+xⁿ)`, computed in ratio form so
/// large inputs converge to `vmax` instead of overflowing to NaN.
pub fn hill(x: f64, n: f64, km: f64, vmax: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let t = (km / x).powf(n);
    if t.is_infinite() {
        return 0.0;
    }
    vmax / (1.0 + t)
}

/// Michaelis-Menten special case of [`hill`] with `n = 1`.
pub fn michaelis_menten(x: f64, km: f64, vmax: f64) -> f64 {
    hill(x, 1.0, km, vmax)
}

/// Hypertension compatibility score.
///
/// Potassium earns points on a Michaelis-Menten curve; the sodium-to-
/// potassium ratio subtracts a weighted penalty. A product with no potassium
/// has an undefined ratio and scores 0.
pub fn hypertension_score(nutrients: &NutrientVector) -> f64 {
    const V_MAX: f64 = 102.0;
    const C_K: f64 = 150.0;
    const SENSITIVITY_W: f64 = 3.0;
    const SCALE_C: f64 = 10.0;

    let potassium = nutrients.get(names::POTASSIUM);
    let sodium = nutrients.get(names::SODIUM);

    if potassium <= 0.0 {
        return 0.0;
    }

    let score_k = michaelis_menten(potassium, C_K, V_MAX).min(100.0);
    let penalty = (sodium / potassium) * SENSITIVITY_W * SCALE_C;

    (score_k - penalty).max(0.0)
}

/// Diabetes compatibility score.
///
/// Net carbs are carbohydrate minus fiber, floored by sugar. The score
/// weighs the fraction of calories coming from net carbs (60%) against the
/// sugar share of net carbs (40%), with a flat penalty once sugar makes up
/// more than 10% of net carbs.
pub fn diabetes_score(nutrients: &NutrientVector) -> f64 {
    const W_CAL: f64 = 0.6;
    const W_SUGAR: f64 = 0.4;
    const SUGAR_SHARE_LIMIT: f64 = 10.0;
    const SUGAR_PENALTY: f64 = 15.0;

    let carbohydrate = nutrients.get(names::CARBOHYDRATE);
    let sugar = nutrients.get(names::SUGAR);
    let fiber = nutrients.get(names::FIBER);
    let calories = nutrients.get(names::CALORIES);

    let net_carb = sugar.max(carbohydrate - fiber);
    if calories <= 0.0 || net_carb <= 0.0 {
        return 0.0;
    }

    let r_cal = net_carb * 4.0 / calories * 100.0;
    let r_sugar = sugar / net_carb * 100.0;

    let mut score = 100.0 - (W_CAL * r_cal + W_SUGAR * r_sugar);
    if r_sugar > SUGAR_SHARE_LIMIT {
        score -= SUGAR_PENALTY;
    }

    score.max(0.0)
}

/// Disease-specific parameters for kidney scoring, drawn from the profile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KidneyParams {
    pub stage: Option<KidneyStage>,
    /// Processed food raises effective phosphorus absorption by 1.5x.
    pub processed_food: bool,
    pub weight_kg: Option<f64>,
}

/// Kidney disease compatibility score.
///
/// Four independent risk sub-scores (sodium, potassium, phosphorus, protein)
/// are blended as `100 − (0.7·max + 0.3·mean)`: the single worst nutrient
/// dominates, with the average as a secondary correction. An unrecognized or
/// missing stage falls back to the most conservative (pre-dialysis) curves.
pub fn kidney_score(nutrients: &NutrientVector, params: &KidneyParams) -> f64 {
    let stage = params.stage.unwrap_or_else(|| {
        warn!("kidney stage unknown, falling back to pre-dialysis curves");
        KidneyStage::PreDialysis
    });

    let sodium = nutrients.get(names::SODIUM);
    let potassium = nutrients.get(names::POTASSIUM);
    let phosphorus = nutrients.get(names::PHOSPHORUS);
    let protein = nutrients.get(names::PROTEIN);

    let risk_na = hill(sodium, 10.0, 730.0, 139.5).min(100.0);

    let risk_k = match stage {
        KidneyStage::PreDialysis => hill(potassium, 5.0, 420.0, 141.8).min(100.0),
        KidneyStage::Hemodialysis => hill(potassium, 5.0, 550.0, 140.2).min(100.0),
        KidneyStage::PeritonealDialysis => michaelis_menten(potassium, 150.0, 102.0).min(100.0),
    };

    let effective_p = if params.processed_food {
        phosphorus * 1.5
    } else {
        phosphorus
    };
    let risk_p = hill(effective_p, 6.0, 250.0, 118.8);

    let risk_pr = protein_risk(protein, stage, params.weight_kg);

    let risks = [risk_na, risk_k, risk_p, risk_pr];
    let max_risk = risks.iter().copied().fold(f64::MIN, f64::max);
    let avg_risk = risks.iter().sum::<f64>() / risks.len() as f64;

    (100.0 - (0.7 * max_risk + 0.3 * avg_risk)).clamp(0.0, 100.0)
}

/// Protein risk sub-score, stage- and weight-dependent.
///
/// Pre-dialysis uses a quadratic Hill curve with a knee at 85% of the
/// per-meal target (daily 0.6 g/kg over three meals), normalized so the
/// target itself maps to 100. Dialysis of either modality targets 1.2 g/kg
/// daily and penalizes squared deviation from the per-meal target in either
/// direction. Unknown weight yields a neutral sub-score.
fn protein_risk(protein: f64, stage: KidneyStage, weight_kg: Option<f64>) -> f64 {
    let weight = match weight_kg {
        Some(w) if w > 0.0 => w,
        _ => {
            warn!("body weight unavailable, using neutral protein sub-score");
            return NEUTRAL_SUBSCORE;
        }
    };

    if stage.is_dialysis() {
        let target = 1.2 * weight / 3.0;
        if target <= 0.0 {
            return NEUTRAL_SUBSCORE;
        }
        let deviation = (protein - target) / target;
        return (100.0 * deviation * deviation).min(100.0);
    }

    let limit = 0.6 * weight / 3.0;
    if limit <= 0.0 {
        return NEUTRAL_SUBSCORE;
    }
    let knee = 0.85 * limit;
    let scale = 100.0 * (knee * knee + limit * limit) / (limit * limit);
    let raw = scale * protein * protein / (knee * knee + protein * protein);
    raw.min(100.0)
}

/// Score a nutrient vector for one disease, if that disease is scorable.
///
/// The allergy condition routes the pipeline but has no nutrient curve;
/// it returns `None`.
pub fn score_for(
    kind: DiseaseKind,
    nutrients: &NutrientVector,
    kidney: &KidneyParams,
) -> Option<f64> {
    match kind {
        DiseaseKind::Diabetes => Some(diabetes_score(nutrients)),
        DiseaseKind::Hypertension => Some(hypertension_score(nutrients)),
        DiseaseKind::KidneyDisease => Some(kidney_score(nutrients, kidney)),
        DiseaseKind::Allergy => None,
    }
}
