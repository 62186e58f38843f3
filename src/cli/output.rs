//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{NutriGuardArgs, OutputFormat};
use crate::error::Result;
use crate::recommend::SubRecommendation;
use crate::retrieval::Candidate;

/// Result structure for a full evaluation.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluationOutput {
    pub user_id: String,
    pub product_id: u64,
    pub verdict: String,
    pub exceeded_nutrients: Vec<String>,
    pub allergens: Vec<String>,
    pub substitutes: Vec<String>,
    pub recommendations: Vec<SubRecommendation>,
    pub degraded: Vec<String>,
}

/// Result structure for candidate retrieval.
#[derive(Debug, Serialize, Deserialize)]
pub struct RetrievalOutput {
    pub product_id: u64,
    pub candidates: Vec<Candidate>,
}

/// Catalog statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogStatsOutput {
    pub total_products: usize,
    pub categories: Vec<(String, usize)>,
}

/// Output a result in the configured format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &NutriGuardArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &NutriGuardArgs) -> Result<()> {
    let text = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{text}");
    Ok(())
}

fn output_human<T: Serialize>(message: &str, result: &T, args: &NutriGuardArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    match value {
        serde_json::Value::Object(map) => {
            if map.contains_key("verdict") {
                output_evaluation_human(&map)
            } else if map.contains_key("candidates") {
                output_retrieval_human(&map)
            } else {
                output_generic_human(&map)
            }
        }
        other => {
            println!("{other}");
            Ok(())
        }
    }
}

fn output_evaluation_human(map: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
    if let Some(verdict) = map.get("verdict").and_then(|v| v.as_str()) {
        println!("Verdict: {verdict}");
    }
    if let Some(exceeded) = map.get("exceeded_nutrients").and_then(|v| v.as_array())
        && !exceeded.is_empty()
    {
        let names: Vec<&str> = exceeded.iter().filter_map(|v| v.as_str()).collect();
        println!("Exceeded nutrients: {}", names.join(", "));
    }
    if let Some(allergens) = map.get("allergens").and_then(|v| v.as_array())
        && !allergens.is_empty()
    {
        let names: Vec<&str> = allergens.iter().filter_map(|v| v.as_str()).collect();
        println!("Detected allergens: {}", names.join(", "));
    }
    if let Some(recommendations) = map.get("recommendations").and_then(|v| v.as_array())
        && !recommendations.is_empty()
    {
        println!();
        println!("Substitute recommendations:");
        for (idx, rec) in recommendations.iter().enumerate() {
            let product = rec.get("product_id").and_then(|v| v.as_u64()).unwrap_or(0);
            let reason = rec.get("reason").and_then(|v| v.as_str()).unwrap_or("");
            println!("  {}. product {product}: {reason}", idx + 1);
        }
    }
    if let Some(degraded) = map.get("degraded").and_then(|v| v.as_array())
        && !degraded.is_empty()
    {
        println!();
        for reason in degraded.iter().filter_map(|v| v.as_str()) {
            println!("warning: {reason}");
        }
    }
    Ok(())
}

fn output_retrieval_human(map: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
    if let Some(candidates) = map.get("candidates").and_then(|v| v.as_array()) {
        if candidates.is_empty() {
            println!("No candidates found.");
            return Ok(());
        }
        for candidate in candidates {
            let rank = candidate.get("rank").and_then(|v| v.as_u64()).unwrap_or(0);
            let product = candidate
                .get("product_id")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            println!("  {rank}. product {product}");
        }
    }
    Ok(())
}

fn output_generic_human(map: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
    for (key, value) in map {
        println!("{key}: {value}");
    }
    Ok(())
}
