use std::sync::Arc;

use serde_json::json;

use nutriguard::allergen::StaticGenerator;
use nutriguard::catalog::{MemoryCatalog, ProductRecord};
use nutriguard::error::Result;
use nutriguard::nutrient::ColumnMapping;
use nutriguard::pipeline::composer::{
    MSG_CAUTION_NO_SUBSTITUTES, MSG_CAUTION_WITH_SUBSTITUTES, MSG_SAFE, TOP_RECOMMENDATIONS,
};
use nutriguard::pipeline::{Pipeline, PipelineState};
use nutriguard::profile::{DiseaseKind, MemoryProfileStore, RawHealthProfile};
use nutriguard::retrieval::RetrievalConfig;

#[test]
fn diabetic_user_clicking_sugary_snack_gets_ranked_substitutes() -> Result<()> {
    let pipeline = build_pipeline(
        json!({
            "diabetes_flag": 1, "hypertension_flag": 0,
            "kidneydisease_flag": 0, "allergy_flag": 0,
        }),
        StaticGenerator::empty_report(),
    );

    let state = pipeline.run(PipelineState::new("user-diabetic", 100).with_candidate_count(5))?;

    assert!(state.any_exceed());
    assert_eq!(
        state.evaluation.as_ref().unwrap().exceeded_nutrients,
        vec!["sugar"]
    );
    assert_eq!(state.final_answer, MSG_CAUTION_WITH_SUBSTITUTES);

    assert!(!state.recommendations.is_empty());
    assert!(
        state
            .recommendations
            .iter()
            .all(|rec| rec.disease == DiseaseKind::Diabetes)
    );
    assert!(
        state
            .recommendations
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
    // The low-sugar cracker must outrank the candy bar.
    let cracker_pos = state
        .recommendations
        .iter()
        .position(|rec| rec.product_id == 101)
        .unwrap();
    let candy_pos = state
        .recommendations
        .iter()
        .position(|rec| rec.product_id == 103)
        .unwrap();
    assert!(cracker_pos < candy_pos);
    Ok(())
}

#[test]
fn healthy_user_terminates_immediately_with_safe_verdict() -> Result<()> {
    let pipeline = build_pipeline(
        json!({
            "diabetes_flag": 0, "hypertension_flag": 0,
            "kidneydisease_flag": 0, "allergy_flag": 0,
        }),
        StaticGenerator::empty_report(),
    );

    let state = pipeline.run(PipelineState::new("user-healthy", 100))?;

    assert_eq!(state.final_answer, MSG_SAFE);
    // No active condition, so evaluation and retrieval never ran.
    assert!(!state.evaluated());
    assert!(state.candidates.is_empty());
    assert!(state.recommendations.is_empty());
    Ok(())
}

#[test]
fn milk_allergy_detection_drives_a_caution_without_scored_rows() -> Result<()> {
    let report = r#"```json
{
    "ingredient_analysis": [
        {"detected_ingredient": "전지분유", "derived_from": "우유",
         "substitute": "두유, 오트밀크", "is_allergen": true},
        {"detected_ingredient": "설탕", "derived_from": "없음",
         "substitute": "없음", "is_allergen": false},
    ],
    "safety_summary": "우유 유래 성분이 포함되어 있습니다."
}
```"#;
    let pipeline = build_pipeline(
        json!({
            "diabetes_flag": 0, "hypertension_flag": 0, "kidneydisease_flag": 0,
            "allergy_flag": 1, "allergy_detail": ["우유"],
        }),
        StaticGenerator::new(report),
    );

    let state = pipeline.run(PipelineState::new("user-allergic", 100))?;

    assert!(state.any_allergen());
    assert_eq!(state.allergen.allergens, vec!["우유"]);
    assert_eq!(state.allergen.substitutes, vec!["두유", "오트밀크"]);
    assert!(!state.candidates.is_empty());
    // Allergy alone has no scoring function, so no ranked rows exist and
    // the composer reports that no substitute could be offered.
    assert!(state.recommendations.is_empty());
    assert_eq!(state.final_answer, MSG_CAUTION_NO_SUBSTITUTES);
    Ok(())
}

#[test]
fn malformed_generation_output_degrades_to_no_allergen() -> Result<()> {
    let pipeline = build_pipeline(
        json!({
            "diabetes_flag": 0, "hypertension_flag": 0, "kidneydisease_flag": 0,
            "allergy_flag": 1, "allergy_detail": ["우유"],
        }),
        StaticGenerator::new("As an ingredient expert, I believe this product is fine."),
    );

    // The plain cracker has no exceedable nutrients for this profile.
    let state = pipeline.run(PipelineState::new("user-allergic", 101))?;

    assert!(!state.any_allergen());
    assert_eq!(state.degraded.len(), 1);
    assert!(state.degraded[0].contains("parse failed"));
    assert_eq!(state.final_answer, MSG_SAFE);
    Ok(())
}

#[test]
fn multiple_conditions_interleave_recommendations_and_cap_the_answer() -> Result<()> {
    let pipeline = build_pipeline(
        json!({
            "diabetes_flag": 1, "hypertension_flag": 1,
            "kidneydisease_flag": 0, "allergy_flag": 0,
        }),
        StaticGenerator::empty_report(),
    );

    let state = pipeline.run(PipelineState::new("user-multi", 100).with_candidate_count(4))?;

    assert!(state.any_exceed());
    // One row per (condition, candidate) pair.
    assert_eq!(state.recommendations.len(), state.candidates.len() * 2);
    let diseases: Vec<DiseaseKind> = state
        .recommendations
        .iter()
        .map(|rec| rec.disease)
        .collect();
    assert!(diseases.contains(&DiseaseKind::Diabetes));
    assert!(diseases.contains(&DiseaseKind::Hypertension));

    // The composed answer only surfaces the top few rows.
    assert_eq!(state.final_answer, MSG_CAUTION_WITH_SUBSTITUTES);
    assert!(state.recommendations.len() > TOP_RECOMMENDATIONS);
    Ok(())
}

#[test]
fn hypertensive_user_flags_salty_snack_via_sodium() -> Result<()> {
    let pipeline = build_pipeline(
        json!({
            "diabetes_flag": 0, "hypertension_flag": 1,
            "kidneydisease_flag": 0, "allergy_flag": 0,
        }),
        StaticGenerator::empty_report(),
    );

    let state = pipeline.run(PipelineState::new("user-ht", 102))?;

    assert!(state.any_exceed());
    assert!(
        state
            .evaluation
            .as_ref()
            .unwrap()
            .exceeded_nutrients
            .contains(&"sodium".to_string())
    );
    Ok(())
}

fn build_pipeline(profile: serde_json::Value, generator: StaticGenerator) -> Pipeline {
    let raw: RawHealthProfile = serde_json::from_value(profile).unwrap();
    let profiles = MemoryProfileStore::new([
        ("user-diabetic", raw.clone()),
        ("user-healthy", raw.clone()),
        ("user-allergic", raw.clone()),
        ("user-multi", raw.clone()),
        ("user-ht", raw),
    ]);

    Pipeline::new(
        Arc::new(profiles),
        Arc::new(sample_catalog()),
        Arc::new(generator),
        RetrievalConfig::default(),
        ColumnMapping::default(),
    )
}

fn sample_catalog() -> MemoryCatalog {
    let records: Vec<ProductRecord> = [
        json!({
            "product_id": 100, "name": "초코 쿠키", "category": "과자",
            "ingredients_raw": "밀가루·설탕·전지분유·코코아",
            "당류(g)": 22.0, "탄수화물(g)": 60.0, "지방(g)": 18.0,
            "에너지(kcal)": 480.0, "나트륨(mg)": 150.0, "칼륨(mg)": 120.0,
        }),
        json!({
            "product_id": 101, "name": "통밀 크래커", "category": "과자",
            "ingredients_raw": "통밀가루·올리브유",
            "당류(g)": 1.0, "탄수화물(g)": 20.0, "식이섬유(g)": 4.0, "지방(g)": 3.0,
            "에너지(kcal)": 380.0, "나트륨(mg)": 120.0, "칼륨(mg)": 200.0,
        }),
        json!({
            "product_id": 102, "name": "감자칩 오리지널", "category": "스낵",
            "ingredients_raw": "감자·팜유·소금",
            "당류(g)": 0.5, "탄수화물(g)": 50.0, "지방(g)": 30.0,
            "에너지(kcal)": 520.0, "나트륨(mg)": 900.0, "칼륨(mg)": 1200.0,
        }),
        json!({
            "product_id": 103, "name": "밀크 초코바", "category": "초콜릿류",
            "ingredients_raw": "설탕·전지분유·카카오버터",
            "당류(g)": 28.0, "탄수화물(g)": 55.0, "지방(g)": 25.0,
            "에너지(kcal)": 540.0, "나트륨(mg)": 80.0, "칼륨(mg)": 300.0,
        }),
        json!({
            "product_id": 104, "name": "플레인 비스킷", "category": "쿠키",
            "ingredients_raw": "밀가루·버터",
            "당류(g)": 3.0, "탄수화물(g)": 40.0, "지방(g)": 10.0,
            "에너지(kcal)": 400.0, "나트륨(mg)": 180.0, "칼륨(mg)": 90.0,
        }),
        json!({
            "product_id": 105, "name": "보리차", "category": "음료류",
            "ingredients_raw": "보리",
            "당류(g)": 0.0, "에너지(kcal)": 0.0, "나트륨(mg)": 5.0,
        }),
    ]
    .into_iter()
    .map(|value| serde_json::from_value(value).unwrap())
    .collect();

    MemoryCatalog::new(records)
}
