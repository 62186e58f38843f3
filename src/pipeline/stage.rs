//! The pipeline stages.
//!
//! Each stage is a small adapter wiring one domain component into the shared
//! [`PipelineState`]; the routing policy decides the order they run in.
//! Stages read their inputs from the state and write their outputs back, so
//! they stay individually testable with a hand-built state.

use std::sync::Arc;

use log::{debug, warn};

use super::composer::ResponseComposer;
use super::state::PipelineState;
use crate::allergen::{TextGenerator, build_allergen_prompt, parse_allergen_response};
use crate::catalog::CatalogStore;
use crate::error::{NutriGuardError, Result};
use crate::nutrient::ColumnMapping;
use crate::profile::{DiseaseFlags, ProfileStore, ThresholdProfileBuilder};
use crate::recommend::SubstitutionRecommender;
use crate::retrieval::{CandidateRetriever, CatalogIndex, IndexCache, RetrievalConfig};
use crate::threshold::NutrientThresholdEvaluator;

/// One unit of pipeline work.
pub trait PipelineStage: Send + Sync {
    /// Stable stage name, used in logs.
    fn name(&self) -> &'static str;

    /// Run the stage against the shared state.
    fn evaluate(&self, state: &mut PipelineState) -> Result<()>;
}

/// Fetches the raw health profile and normalizes it into flags and the
/// merged threshold profile.
pub struct ProfileStage {
    store: Arc<dyn ProfileStore>,
    builder: ThresholdProfileBuilder,
}

impl ProfileStage {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        ProfileStage {
            store,
            builder: ThresholdProfileBuilder::new(),
        }
    }
}

impl PipelineStage for ProfileStage {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn evaluate(&self, state: &mut PipelineState) -> Result<()> {
        let raw = self
            .store
            .fetch_profile(&state.user_id)?
            .ok_or_else(|| {
                NutriGuardError::profile(format!("no health profile for user {}", state.user_id))
            })?;

        state.flags = DiseaseFlags::from_raw(&raw);
        state.profile = Some(self.builder.build(&state.user_id, &state.flags));
        debug!(
            "profile stage: user={} active_conditions={}",
            state.user_id,
            state.flags.active_count()
        );
        Ok(())
    }
}

/// Runs the threshold check and, when restrictions exist, the allergen
/// inference over generated text.
///
/// Generation and parse failures degrade to the zero allergen verdict with
/// the reason recorded on the state; the threshold half always completes.
pub struct EvaluationStage {
    catalog: Arc<dyn CatalogStore>,
    generator: Arc<dyn TextGenerator>,
    mapping: ColumnMapping,
    evaluator: NutrientThresholdEvaluator,
}

impl EvaluationStage {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        generator: Arc<dyn TextGenerator>,
        mapping: ColumnMapping,
    ) -> Self {
        EvaluationStage {
            catalog,
            generator,
            mapping,
            evaluator: NutrientThresholdEvaluator::new(),
        }
    }
}

impl PipelineStage for EvaluationStage {
    fn name(&self) -> &'static str {
        "evaluation"
    }

    fn evaluate(&self, state: &mut PipelineState) -> Result<()> {
        let product = self
            .catalog
            .product(state.product_id)?
            .ok_or_else(|| {
                NutriGuardError::catalog(format!("product {} not in catalog", state.product_id))
            })?;
        let profile = state.profile.as_ref().ok_or_else(|| {
            NutriGuardError::pipeline("evaluation stage reached without a threshold profile")
        })?;

        let vector = product.nutrient_vector(&self.mapping);
        let evaluation = self.evaluator.evaluate(profile, &vector);
        debug!(
            "evaluation stage: product={} exceeded={:?}",
            state.product_id, evaluation.exceeded_nutrients
        );

        // Allergen inference only runs when there is something to restrict.
        if !profile.restricted_ingredients().is_empty() {
            let prompt = build_allergen_prompt(&product, profile);
            match self.generator.generate(&prompt) {
                Ok(raw) => match parse_allergen_response(&raw) {
                    Ok(verdict) => state.allergen = verdict,
                    Err(e) => {
                        warn!("allergen response unparseable, degrading to no-allergen: {e}");
                        state.record_degraded(format!("allergen parse failed: {e}"));
                    }
                },
                Err(e) => {
                    warn!("allergen generation failed, degrading to no-allergen: {e}");
                    state.record_degraded(format!("allergen generation failed: {e}"));
                }
            }
        }

        state.evaluation = Some(evaluation);
        Ok(())
    }
}

/// Retrieves substitute candidates around the clicked product.
pub struct RetrievalStage {
    catalog: Arc<dyn CatalogStore>,
    cache: Arc<IndexCache>,
    config: RetrievalConfig,
}

impl RetrievalStage {
    pub fn new(catalog: Arc<dyn CatalogStore>, cache: Arc<IndexCache>, config: RetrievalConfig) -> Self {
        RetrievalStage {
            catalog,
            cache,
            config,
        }
    }

    fn index(&self) -> Result<Arc<CatalogIndex>> {
        if let Some(index) = self.cache.get() {
            return Ok(index);
        }
        let products = self.catalog.all_products()?;
        Ok(self
            .cache
            .get_or_build(|| CatalogIndex::build(&products, &self.config)))
    }
}

impl PipelineStage for RetrievalStage {
    fn name(&self) -> &'static str {
        "retrieval"
    }

    fn evaluate(&self, state: &mut PipelineState) -> Result<()> {
        let index = self.index()?;
        let retriever = CandidateRetriever::new(index, self.config.clone());
        state.candidates = retriever.retrieve(state.product_id, state.k);
        debug!(
            "retrieval stage: product={} k={} candidates={}",
            state.product_id,
            state.k,
            state.candidates.len()
        );
        Ok(())
    }
}

/// Scores retrieved candidates per active condition.
pub struct ScoringStage {
    catalog: Arc<dyn CatalogStore>,
    recommender: SubstitutionRecommender,
}

impl ScoringStage {
    pub fn new(catalog: Arc<dyn CatalogStore>, mapping: ColumnMapping) -> Self {
        ScoringStage {
            catalog,
            recommender: SubstitutionRecommender::new(mapping),
        }
    }
}

impl PipelineStage for ScoringStage {
    fn name(&self) -> &'static str {
        "scoring"
    }

    fn evaluate(&self, state: &mut PipelineState) -> Result<()> {
        state.recommendations =
            self.recommender
                .recommend(self.catalog.as_ref(), &state.flags, &state.candidates)?;
        debug!(
            "scoring stage: candidates={} recommendations={}",
            state.candidates.len(),
            state.recommendations.len()
        );
        Ok(())
    }
}

/// Composes the final answer and ends routing.
#[derive(Default)]
pub struct ComposerStage {
    composer: ResponseComposer,
}

impl ComposerStage {
    pub fn new() -> Self {
        ComposerStage::default()
    }
}

impl PipelineStage for ComposerStage {
    fn name(&self) -> &'static str {
        "composer"
    }

    fn evaluate(&self, state: &mut PipelineState) -> Result<()> {
        let answer = self.composer.compose(state);
        debug!("composer stage: {}", answer.message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allergen::StaticGenerator;
    use crate::catalog::{MemoryCatalog, ProductRecord};
    use crate::profile::{MemoryProfileStore, RawHealthProfile};
    use serde_json::json;

    fn store_with(user: &str, value: serde_json::Value) -> Arc<MemoryProfileStore> {
        let raw: RawHealthProfile = serde_json::from_value(value).unwrap();
        Arc::new(MemoryProfileStore::new([(user, raw)]))
    }

    fn catalog() -> Arc<MemoryCatalog> {
        let product: ProductRecord = serde_json::from_value(json!({
            "product_id": 1,
            "name": "초코 쿠키",
            "category": "과자",
            "ingredients_raw": "밀가루·설탕·전지분유",
            "당류(g)": 22.0,
            "에너지(kcal)": 480.0,
        }))
        .unwrap();
        Arc::new(MemoryCatalog::new(vec![product]))
    }

    #[test]
    fn test_profile_stage_sets_flags_and_profile() {
        let store = store_with("u-1", json!({
            "diabetes": 1, "hypertension": 0, "kidneydisease": 0, "allergy": 0,
        }));
        let stage = ProfileStage::new(store);
        let mut state = PipelineState::new("u-1", 1);

        stage.evaluate(&mut state).unwrap();
        assert!(!state.flags.any_unset());
        let profile = state.profile.as_ref().unwrap();
        assert_eq!(profile.limit("sugar"), Some(1.67));
    }

    #[test]
    fn test_profile_stage_unknown_user_errors() {
        let store = store_with("u-1", json!({ "diabetes": 1 }));
        let stage = ProfileStage::new(store);
        let mut state = PipelineState::new("stranger", 1);

        let err = stage.evaluate(&mut state).unwrap_err();
        assert!(matches!(err, NutriGuardError::Profile(_)));
    }

    #[test]
    fn test_evaluation_stage_flags_sugar_exceedance() {
        let store = store_with("u-1", json!({
            "diabetes": 1, "hypertension": 0, "kidneydisease": 0, "allergy": 0,
        }));
        let mut state = PipelineState::new("u-1", 1);
        ProfileStage::new(store).evaluate(&mut state).unwrap();

        let stage = EvaluationStage::new(
            catalog(),
            Arc::new(StaticGenerator::empty_report()),
            ColumnMapping::default(),
        );
        stage.evaluate(&mut state).unwrap();

        assert!(state.any_exceed());
        assert_eq!(
            state.evaluation.as_ref().unwrap().exceeded_nutrients,
            vec!["sugar"]
        );
        // No restrictions, so the generator was never consulted.
        assert!(!state.any_allergen());
        assert!(state.degraded.is_empty());
    }

    #[test]
    fn test_evaluation_stage_degrades_on_garbage_generation() {
        let store = store_with("u-1", json!({
            "diabetes": 0, "hypertension": 0, "kidneydisease": 0,
            "allergy_flag": 1, "allergy_list": ["우유"],
        }));
        let mut state = PipelineState::new("u-1", 1);
        ProfileStage::new(store).evaluate(&mut state).unwrap();

        let stage = EvaluationStage::new(
            catalog(),
            Arc::new(StaticGenerator::new("I cannot help with that.")),
            ColumnMapping::default(),
        );
        stage.evaluate(&mut state).unwrap();

        assert!(!state.any_allergen());
        assert_eq!(state.degraded.len(), 1);
        assert!(state.degraded[0].contains("parse failed"));
    }

    #[test]
    fn test_evaluation_stage_degrades_on_backend_failure() {
        let store = store_with("u-1", json!({
            "diabetes": 0, "hypertension": 0, "kidneydisease": 0,
            "allergy_flag": 1, "allergy_list": ["우유"],
        }));
        let mut state = PipelineState::new("u-1", 1);
        ProfileStage::new(store).evaluate(&mut state).unwrap();

        let failing =
            |_: &str| -> Result<String> { Err(NutriGuardError::generation("backend timed out")) };
        let stage = EvaluationStage::new(catalog(), Arc::new(failing), ColumnMapping::default());
        stage.evaluate(&mut state).unwrap();

        // The threshold half still completed; the allergen half degraded.
        assert!(state.evaluated());
        assert!(!state.any_allergen());
        assert_eq!(state.degraded.len(), 1);
        assert!(state.degraded[0].contains("generation failed"));
    }

    #[test]
    fn test_evaluation_stage_missing_product_errors() {
        let store = store_with("u-1", json!({
            "diabetes": 1, "hypertension": 0, "kidneydisease": 0, "allergy": 0,
        }));
        let mut state = PipelineState::new("u-1", 404);
        ProfileStage::new(store).evaluate(&mut state).unwrap();

        let stage = EvaluationStage::new(
            catalog(),
            Arc::new(StaticGenerator::empty_report()),
            ColumnMapping::default(),
        );
        let err = stage.evaluate(&mut state).unwrap_err();
        assert!(matches!(err, NutriGuardError::Catalog(_)));
    }

    #[test]
    fn test_retrieval_stage_reuses_cached_index() {
        let catalog = catalog();
        let cache = Arc::new(IndexCache::new());
        let stage = RetrievalStage::new(catalog, Arc::clone(&cache), RetrievalConfig::default());

        let mut state = PipelineState::new("u-1", 1);
        stage.evaluate(&mut state).unwrap();
        let first = cache.get().unwrap();

        stage.evaluate(&mut state).unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
