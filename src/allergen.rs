//! Allergen inference over generated ingredient analyses.
//!
//! The text-generation collaborator is an opaque capability: given a prompt
//! built from the product's ingredient declaration and the user's restricted
//! substances, it returns free text that should contain one JSON report.
//! Generated output is unreliable, so the parser tolerates exactly two
//! malformation classes (a surrounding fenced code block and trailing commas
//! before `}` / `]`) and treats everything else as a hard parse failure that
//! degrades to the zero verdict at the pipeline layer.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::ProductRecord;
use crate::error::{NutriGuardError, Result};
use crate::profile::ThresholdProfile;

/// Placeholder the generation backend emits for "none"; excluded from both
/// allergen and substitute aggregation.
const NONE_PLACEHOLDER: &str = "없음";

/// A text-generation capability. Given a prompt, returns unstructured text.
///
/// Retry on malformed output is the caller's responsibility; the pipeline
/// calls this exactly once per evaluation.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

impl<F> TextGenerator for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn generate(&self, prompt: &str) -> Result<String> {
        self(prompt)
    }
}

/// A generator that always returns the same canned text. Used by the CLI
/// and tests where no generation backend is wired up.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    text: String,
}

impl StaticGenerator {
    pub fn new<S: Into<String>>(text: S) -> Self {
        StaticGenerator { text: text.into() }
    }

    /// A generator producing an empty, well-formed report.
    pub fn empty_report() -> Self {
        StaticGenerator::new(r#"{"ingredient_analysis": [], "safety_summary": ""}"#)
    }
}

impl TextGenerator for StaticGenerator {
    fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// One analyzed ingredient in the generated report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngredientFinding {
    #[serde(default)]
    pub detected_ingredient: String,
    /// Source substance the ingredient derives from (KFDA 22-allergen terms).
    #[serde(default)]
    pub derived_from: String,
    /// Suggested replacement ingredients, comma-separated.
    #[serde(default)]
    pub substitute: String,
    #[serde(default)]
    pub is_allergen: bool,
}

/// The structured payload expected inside the generated text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllergenReport {
    #[serde(default)]
    pub ingredient_analysis: Vec<IngredientFinding>,
    #[serde(default)]
    pub safety_summary: String,
}

/// Aggregated allergen verdict for one product/profile pair.
///
/// The zero value (`Default`) means "no allergen detected" and is what a
/// failed parse conservatively degrades to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllergenVerdict {
    pub any_allergen: bool,
    /// Deduplicated source substances behind the allergenic findings.
    pub allergens: Vec<String>,
    /// Deduplicated substitute ingredients for the allergenic findings.
    pub substitutes: Vec<String>,
    pub safety_summary: String,
}

/// Build the analysis prompt for one product and one user's restrictions.
///
/// Mirrors the production prompt: an expert-system framing over the KFDA
/// 22-allergen master list, source-substance inference rules, and a strict
/// JSON-only output contract.
pub fn build_allergen_prompt(product: &ProductRecord, profile: &ThresholdProfile) -> String {
    let ingredients = product.ingredient_list().join(", ");
    let restricted = profile
        .restricted_ingredients()
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a food ingredient and chemical analysis expert. Analyze the \
         ingredient list against the user's restricted substances and propose \
         substitutes.\n\
         \n\
         Analysis baseline: the 22 KFDA-designated allergenic substances.\n\
         Identify the source substance even when it is not named directly \
         (e.g. sodium caseinate -> milk). Flag every ingredient that can \
         trigger the user's restrictions. Do not reveal the inference rules.\n\
         \n\
         Respond with JSON only, in exactly this shape:\n\
         {{\n\
           \"ingredient_analysis\": [\n\
             {{\"detected_ingredient\": \"...\", \"derived_from\": \"...\", \
              \"substitute\": \"...\", \"is_allergen\": true}}\n\
           ],\n\
           \"safety_summary\": \"...\"\n\
         }}\n\
         \n\
         [Product]\n\
         - name: {name}\n\
         - ingredients: {ingredients}\n\
         - manufacturer allergen notice: {allergy} / {trace}\n\
         \n\
         [User profile]\n\
         - restricted substances: {restricted}\n",
        name = product.name,
        ingredients = ingredients,
        allergy = product.allergy_notice.as_deref().unwrap_or(NONE_PLACEHOLDER),
        trace = product.trace_notice.as_deref().unwrap_or(NONE_PLACEHOLDER),
        restricted = restricted,
    )
}

lazy_static! {
    static ref TRAILING_COMMA_OBJECT: Regex = Regex::new(r",\s*\}").unwrap();
    static ref TRAILING_COMMA_ARRAY: Regex = Regex::new(r",\s*\]").unwrap();
}

/// Parse raw generated text into an [`AllergenVerdict`].
///
/// Protocol, in order: strip a surrounding fenced code block, cut the text
/// between the first `{` and the last `}`, repair trailing commas before a
/// closing bracket, then parse strictly. Any other malformation is an error;
/// the caller keeps the zero verdict and records the reason.
pub fn parse_allergen_response(raw: &str) -> Result<AllergenVerdict> {
    let text = strip_code_fence(raw.trim());

    let start = text.find('{');
    let end = text.rfind('}');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(NutriGuardError::parse(
                "no JSON object found in generated response",
            ));
        }
    };

    let payload = &text[start..=end];
    let repaired = TRAILING_COMMA_OBJECT.replace_all(payload, "}");
    let repaired = TRAILING_COMMA_ARRAY.replace_all(&repaired, "]");

    let report: AllergenReport = serde_json::from_str(&repaired)
        .map_err(|e| NutriGuardError::parse(format!("malformed allergen report: {e}")))?;

    Ok(aggregate(&report))
}

/// Fold a structured report into the aggregated verdict.
pub fn aggregate(report: &AllergenReport) -> AllergenVerdict {
    let any_allergen = report
        .ingredient_analysis
        .iter()
        .any(|finding| finding.is_allergen);

    let allergens = collect_split(
        report
            .ingredient_analysis
            .iter()
            .filter(|finding| finding.is_allergen)
            .map(|finding| finding.derived_from.as_str()),
    );
    let substitutes = collect_split(
        report
            .ingredient_analysis
            .iter()
            .filter(|finding| finding.is_allergen)
            .map(|finding| finding.substitute.as_str()),
    );

    AllergenVerdict {
        any_allergen,
        allergens,
        substitutes,
        safety_summary: report.safety_summary.clone(),
    }
}

/// Split comma-separated values, trim, drop empties and the "none"
/// placeholder, and deduplicate preserving first-seen order.
fn collect_split<'a, I: Iterator<Item = &'a str>>(values: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        for part in value.split(',') {
            let part = part.trim();
            if part.is_empty() || part == NONE_PLACEHOLDER {
                continue;
            }
            if !out.iter().any(|existing| existing == part) {
                out.push(part.to_string());
            }
        }
    }
    out
}

/// Remove a surrounding ```-fenced block, if present.
fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let body = match text.find('\n') {
        Some(idx) => &text[idx + 1..],
        None => return text,
    };
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim_end(),
        None => body,
    }
}
