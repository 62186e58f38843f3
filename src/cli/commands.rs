//! Command implementations for the NutriGuard CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::allergen::StaticGenerator;
use crate::catalog::{CatalogStore, MemoryCatalog};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::{NutriGuardError, Result};
use crate::nutrient::ColumnMapping;
use crate::pipeline::{Pipeline, PipelineState};
use crate::profile::{MemoryProfileStore, RawHealthProfile};
use crate::retrieval::{CandidateRetriever, CatalogIndex, RetrievalConfig};

/// Execute a CLI command.
pub fn execute_command(args: NutriGuardArgs) -> Result<()> {
    match &args.command {
        Command::Evaluate(eval_args) => evaluate(eval_args.clone(), &args),
        Command::Retrieve(retrieve_args) => retrieve(retrieve_args.clone(), &args),
        Command::Stats(stats_args) => show_stats(stats_args.clone(), &args),
    }
}

/// Run the full evaluation pipeline for one user and one product.
fn evaluate(args: EvaluateArgs, cli_args: &NutriGuardArgs) -> Result<()> {
    if cli_args.verbosity() > 1 {
        println!("Loading catalog from: {}", args.catalog.display());
        println!("Loading profile from: {}", args.profile.display());
    }

    let catalog = Arc::new(MemoryCatalog::from_json_file(&args.catalog)?);
    let profiles = Arc::new(load_profiles(&args.profile, &args.user)?);

    let generator = match &args.allergen_report {
        Some(path) => StaticGenerator::new(fs::read_to_string(path)?),
        None => StaticGenerator::empty_report(),
    };

    let pipeline = Pipeline::new(
        profiles,
        catalog,
        Arc::new(generator),
        RetrievalConfig::default(),
        ColumnMapping::default(),
    );

    let state = pipeline.run(
        PipelineState::new(args.user.clone(), args.product).with_candidate_count(args.k),
    )?;

    output_result(
        "Evaluation complete",
        &EvaluationOutput {
            user_id: state.user_id.clone(),
            product_id: state.product_id,
            verdict: state.final_answer.clone(),
            exceeded_nutrients: state
                .evaluation
                .as_ref()
                .map(|e| e.exceeded_nutrients.clone())
                .unwrap_or_default(),
            allergens: state.allergen.allergens.clone(),
            substitutes: state.allergen.substitutes.clone(),
            recommendations: state.recommendations.clone(),
            degraded: state.degraded.clone(),
        },
        cli_args,
    )
}

/// Retrieve substitute candidates without running the pipeline.
fn retrieve(args: RetrieveArgs, cli_args: &NutriGuardArgs) -> Result<()> {
    if cli_args.verbosity() > 1 {
        println!("Loading catalog from: {}", args.catalog.display());
    }

    let catalog = MemoryCatalog::from_json_file(&args.catalog)?;
    let config = RetrievalConfig::default();
    let index = Arc::new(CatalogIndex::build(&catalog.all_products()?, &config));
    let retriever = CandidateRetriever::new(index, config);

    output_result(
        "Candidates retrieved",
        &RetrievalOutput {
            product_id: args.product,
            candidates: retriever.retrieve(args.product, args.k),
        },
        cli_args,
    )
}

/// Show catalog statistics.
fn show_stats(args: StatsArgs, cli_args: &NutriGuardArgs) -> Result<()> {
    let catalog = MemoryCatalog::from_json_file(&args.catalog)?;

    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    for product in catalog.all_products()? {
        let category = product.category.unwrap_or_else(|| "(none)".to_string());
        *categories.entry(category).or_insert(0) += 1;
    }

    output_result(
        "Catalog statistics",
        &CatalogStatsOutput {
            total_products: catalog.len(),
            categories: categories.into_iter().collect(),
        },
        cli_args,
    )
}

/// Load the profile store from a JSON file.
///
/// Accepts either a map of user id to profile object, or a single profile
/// object applied to the requested user id.
fn load_profiles(path: &Path, user: &str) -> Result<MemoryProfileStore> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text).map_err(|e| {
        NutriGuardError::profile(format!("invalid profile file {}: {e}", path.display()))
    })?;

    let Value::Object(map) = value else {
        return Err(NutriGuardError::profile(format!(
            "profile file {} must contain a JSON object",
            path.display()
        )));
    };

    // Map form: every value is itself an object.
    if !map.is_empty() && map.values().all(Value::is_object) {
        let mut profiles: Vec<(String, RawHealthProfile)> = Vec::with_capacity(map.len());
        for (user_id, profile) in map {
            profiles.push((user_id, serde_json::from_value(profile)?));
        }
        return Ok(MemoryProfileStore::new(profiles));
    }

    let profile: RawHealthProfile = serde_json::from_value(Value::Object(map))?;
    Ok(MemoryProfileStore::new([(user, profile)]))
}
