//! The mutable state record threading through every pipeline stage.

use serde::{Deserialize, Serialize};

use crate::allergen::AllergenVerdict;
use crate::pipeline::policy::NextStep;
use crate::profile::{DiseaseFlags, ThresholdProfile};
use crate::recommend::SubRecommendation;
use crate::retrieval::Candidate;
use crate::threshold::ThresholdEvaluation;

/// Default number of substitute candidates to retrieve.
pub const DEFAULT_CANDIDATE_COUNT: usize = 5;

/// Everything one evaluation request accumulates.
///
/// Created at request start, discarded at request end; nothing here is
/// persisted. Stages only ever add to the state, the routing policy only
/// reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub user_id: String,
    /// The product the user clicked.
    pub product_id: u64,
    /// Candidate count requested from retrieval.
    pub k: usize,

    /// Normalized condition flags; all unset until the profile stage runs.
    pub flags: DiseaseFlags,
    /// Merged nutrient thresholds, once built.
    pub profile: Option<ThresholdProfile>,

    /// Threshold exceedance result, once the evaluation stage ran.
    pub evaluation: Option<ThresholdEvaluation>,
    /// Allergen verdict; stays at the zero value until evaluated (or when
    /// parsing degraded).
    pub allergen: AllergenVerdict,

    pub candidates: Vec<Candidate>,
    pub recommendations: Vec<SubRecommendation>,

    /// Routing cursor: the stage to run next.
    pub next_step: NextStep,
    /// Human-facing verdict, filled by the composer.
    pub final_answer: String,
    /// Audit trail of degraded decisions (parse failures, lookup misses).
    pub degraded: Vec<String>,
}

impl PipelineState {
    pub fn new<S: Into<String>>(user_id: S, product_id: u64) -> Self {
        PipelineState {
            user_id: user_id.into(),
            product_id,
            k: DEFAULT_CANDIDATE_COUNT,
            flags: DiseaseFlags::unset(),
            profile: None,
            evaluation: None,
            allergen: AllergenVerdict::default(),
            candidates: Vec::new(),
            recommendations: Vec::new(),
            next_step: NextStep::UserAgent,
            final_answer: String::new(),
            degraded: Vec::new(),
        }
    }

    pub fn with_candidate_count(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Whether any nutrient exceeded its threshold.
    pub fn any_exceed(&self) -> bool {
        self.evaluation
            .as_ref()
            .is_some_and(|evaluation| evaluation.any_exceed)
    }

    /// Whether an allergen was detected.
    pub fn any_allergen(&self) -> bool {
        self.allergen.any_allergen
    }

    /// Whether the evaluation stage has produced a result.
    pub fn evaluated(&self) -> bool {
        self.evaluation.is_some()
    }

    /// Record a degraded decision for audit.
    pub fn record_degraded<S: Into<String>>(&mut self, reason: S) {
        self.degraded.push(reason.into());
    }
}
