//! The pipeline runner: policy-driven stage dispatch with explicit edges.
//!
//! Routing alternates between the policy and the stages. The policy decides
//! entry, re-entry after profile loading and after evaluation; the
//! retrieval, scoring and composer stages are chained by fixed edges since
//! no decision remains once danger is established. A step ceiling guards
//! against routing bugs ever looping a request.

use std::sync::Arc;

use log::{debug, info};

use super::policy::{NextStep, RoutingPolicy};
use super::stage::{
    ComposerStage, EvaluationStage, PipelineStage, ProfileStage, RetrievalStage, ScoringStage,
};
use super::state::PipelineState;
use crate::allergen::TextGenerator;
use crate::catalog::CatalogStore;
use crate::error::{NutriGuardError, Result};
use crate::nutrient::ColumnMapping;
use crate::profile::ProfileStore;
use crate::retrieval::{IndexCache, RetrievalConfig};

/// Upper bound on dispatch steps for one request. The longest legitimate
/// path is five stages plus routing re-entries, so hitting this means a
/// routing bug, not a long request.
const MAX_STEPS: usize = 16;

/// The assembled evaluation pipeline.
///
/// Construction wires the collaborators once; [`Pipeline::run`] is then
/// `&self` and safe to call concurrently, with the retrieval index shared
/// through an internal cache.
pub struct Pipeline {
    policy: RoutingPolicy,
    profile_stage: ProfileStage,
    evaluation_stage: EvaluationStage,
    retrieval_stage: RetrievalStage,
    scoring_stage: ScoringStage,
    composer_stage: ComposerStage,
}

impl Pipeline {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        catalog: Arc<dyn CatalogStore>,
        generator: Arc<dyn TextGenerator>,
        retrieval: RetrievalConfig,
        mapping: ColumnMapping,
    ) -> Self {
        let cache = Arc::new(IndexCache::new());
        Pipeline {
            policy: RoutingPolicy::new(),
            profile_stage: ProfileStage::new(profiles),
            evaluation_stage: EvaluationStage::new(
                Arc::clone(&catalog),
                generator,
                mapping.clone(),
            ),
            retrieval_stage: RetrievalStage::new(Arc::clone(&catalog), cache, retrieval),
            scoring_stage: ScoringStage::new(catalog, mapping),
            composer_stage: ComposerStage::new(),
        }
    }

    /// Evaluate one request to completion and return the final state.
    pub fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        info!(
            "pipeline start: user={} product={} k={}",
            state.user_id, state.product_id, state.k
        );
        state.next_step = self.policy.decide(&state);

        for _ in 0..MAX_STEPS {
            debug!("dispatch -> {}", state.next_step);
            match state.next_step {
                NextStep::End => {
                    // The policy can terminate a request before any stage
                    // wrote a verdict (all flags present, none active); the
                    // user still gets the safe message.
                    if state.final_answer.is_empty() {
                        self.composer_stage.evaluate(&mut state)?;
                    }
                    info!(
                        "pipeline end: user={} product={} answer={:?}",
                        state.user_id, state.product_id, state.final_answer
                    );
                    return Ok(state);
                }
                NextStep::UserAgent => {
                    self.profile_stage.evaluate(&mut state)?;
                    state.next_step = self.policy.decide(&state);
                }
                NextStep::ChatAgent => {
                    if state.evaluated() {
                        // Evaluation already ran and found no danger, or the
                        // policy would have routed to retrieval. Compose the
                        // safe verdict instead of re-evaluating.
                        self.composer_stage.evaluate(&mut state)?;
                    } else {
                        self.evaluation_stage.evaluate(&mut state)?;
                        state.next_step = self.policy.decide(&state);
                    }
                }
                NextStep::RecoAgent => {
                    self.retrieval_stage.evaluate(&mut state)?;
                    state.next_step = NextStep::SubRecoAgent;
                }
                NextStep::SubRecoAgent => {
                    self.scoring_stage.evaluate(&mut state)?;
                    state.next_step = NextStep::RespAgent;
                }
                NextStep::RespAgent => {
                    self.composer_stage.evaluate(&mut state)?;
                }
            }
        }

        Err(NutriGuardError::pipeline(format!(
            "routing did not terminate within {MAX_STEPS} steps"
        )))
    }
}
