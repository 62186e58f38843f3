//! Health profiles: loose-input normalization, disease flags and the
//! priority-merged nutrient threshold profile.
//!
//! Profile data arrives from the profile collaborator in whatever shape its
//! storage produced: booleans, 0/1 numbers, enum strings, dotted enum paths,
//! `"N/A"` markers, lists of allergens. Everything is normalized once at the
//! boundary into [`DiseaseFlags`]; the scoring and evaluation stages never
//! see loose values.

use std::collections::BTreeSet;

use ahash::AHashMap;
use lazy_static::lazy_static;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Body weight assumed when the profile has none or an invalid one.
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

/// The four condition categories the pipeline evaluates, in merge priority
/// order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseKind {
    Allergy,
    KidneyDisease,
    Diabetes,
    Hypertension,
}

impl DiseaseKind {
    /// All kinds in threshold-merge priority order.
    pub const PRIORITY: [DiseaseKind; 4] = [
        DiseaseKind::Allergy,
        DiseaseKind::KidneyDisease,
        DiseaseKind::Diabetes,
        DiseaseKind::Hypertension,
    ];

    /// Stable lowercase label, as exposed in recommendations.
    pub fn label(&self) -> &'static str {
        match self {
            DiseaseKind::Allergy => "allergy",
            DiseaseKind::KidneyDisease => "kidney_disease",
            DiseaseKind::Diabetes => "diabetes",
            DiseaseKind::Hypertension => "hypertension",
        }
    }
}

/// Kidney disease treatment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KidneyStage {
    /// CKD stages 3-5, before dialysis.
    PreDialysis,
    /// Hemodialysis.
    Hemodialysis,
    /// Peritoneal dialysis.
    PeritonealDialysis,
}

impl KidneyStage {
    /// Parse a loosely typed stage marker.
    ///
    /// Accepts the storage enum codes (`CKD_3_5`, `HD`, `PD`), spelled-out
    /// variants and dotted enum paths (`KidneyStage.HD`). Anything else is
    /// `None`; the caller decides how to degrade.
    pub fn parse(raw: &str) -> Option<KidneyStage> {
        let token = raw.rsplit('.').next().unwrap_or(raw).trim();
        match token.to_ascii_uppercase().as_str() {
            "CKD_3_5" | "CKD3_5" | "CKD" | "PRE_DIALYSIS" | "PREDIALYSIS" => {
                Some(KidneyStage::PreDialysis)
            }
            "HD" | "HEMODIALYSIS" => Some(KidneyStage::Hemodialysis),
            "PD" | "PERITONEAL_DIALYSIS" | "PERITONEALDIALYSIS" => {
                Some(KidneyStage::PeritonealDialysis)
            }
            _ => None,
        }
    }

    /// Whether the stage involves dialysis of either modality.
    pub fn is_dialysis(&self) -> bool {
        matches!(
            self,
            KidneyStage::Hemodialysis | KidneyStage::PeritonealDialysis
        )
    }
}

/// A raw health profile as fetched from the profile collaborator.
///
/// Field names and value shapes vary between storage generations, so the
/// record is kept as an open map and interpreted by [`DiseaseFlags::from_raw`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHealthProfile {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl RawHealthProfile {
    /// First present value among several candidate field names.
    fn first(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|key| self.fields.get(*key))
    }
}

/// Read access to stored health profiles.
pub trait ProfileStore: Send + Sync {
    /// Fetch the raw profile for a user; `Ok(None)` on an unknown id.
    fn fetch_profile(&self, user_id: &str) -> Result<Option<RawHealthProfile>>;
}

/// In-memory profile store keyed by user id.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: AHashMap<String, RawHealthProfile>,
}

impl MemoryProfileStore {
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = (S, RawHealthProfile)>,
        S: Into<String>,
    {
        MemoryProfileStore {
            profiles: profiles
                .into_iter()
                .map(|(id, p)| (id.into(), p))
                .collect(),
        }
    }
}

impl ProfileStore for MemoryProfileStore {
    fn fetch_profile(&self, user_id: &str) -> Result<Option<RawHealthProfile>> {
        Ok(self.profiles.get(user_id).cloned())
    }
}

/// Normalized condition flags plus the disease-specific detail the scoring
/// engine needs. Computed once at pipeline entry, read-only afterward.
///
/// `None` means the flag was never established (profile stage has not run),
/// which the routing policy treats differently from an explicit `false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiseaseFlags {
    pub diabetes: Option<bool>,
    pub hypertension: Option<bool>,
    pub kidney_disease: Option<bool>,
    pub allergy: Option<bool>,
    pub kidney_stage: Option<KidneyStage>,
    pub processed_food: bool,
    pub weight_kg: Option<f64>,
    /// User-declared allergen substances, normalized and deduplicated.
    pub declared_allergens: Vec<String>,
}

impl DiseaseFlags {
    /// All four flags unset; the state a request starts in.
    pub fn unset() -> Self {
        DiseaseFlags::default()
    }

    /// Normalize a raw profile into flags.
    ///
    /// Each flag field accepts the historic aliases (`diabetes` /
    /// `diabetes_flag`, etc.). The allergy flag is set when the allergen
    /// list is non-empty, even without an explicit flag field.
    pub fn from_raw(raw: &RawHealthProfile) -> Self {
        let diabetes = flag_value(raw.first(&["diabetes_flag", "diabetes"]));
        let hypertension = flag_value(raw.first(&["hypertension_flag", "hypertension"]));
        let kidney_disease = flag_value(raw.first(&["kidneydisease_flag", "kidney_disease", "kidneydisease"]));

        let declared_allergens = allergen_list(raw.first(&["allergy_detail", "allergy_list", "allergy"]));
        let allergy = match flag_value(raw.first(&["allergy_flag", "allergy"])) {
            _ if !declared_allergens.is_empty() => Some(true),
            other => other,
        };

        let kidney_stage = raw
            .first(&["kidney_detail", "kidneydisease_detail", "kidney_stage"])
            .and_then(Value::as_str)
            .and_then(KidneyStage::parse);

        let weight_kg = raw.first(&["weight", "weight_kg"]).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        });

        let processed_food = flag_value(raw.first(&["is_processed_food", "processed_food"]))
            .unwrap_or(false);

        DiseaseFlags {
            diabetes,
            hypertension,
            kidney_disease,
            allergy,
            kidney_stage,
            processed_food,
            weight_kg,
            declared_allergens,
        }
    }

    /// Whether any of the four flags is still unset.
    pub fn any_unset(&self) -> bool {
        self.diabetes.is_none()
            || self.hypertension.is_none()
            || self.kidney_disease.is_none()
            || self.allergy.is_none()
    }

    /// Number of flags set to true, counting unset as 0.
    pub fn active_count(&self) -> usize {
        [self.diabetes, self.hypertension, self.kidney_disease, self.allergy]
            .iter()
            .filter(|flag| **flag == Some(true))
            .count()
    }

    /// Whether a given condition is flagged active.
    pub fn is_active(&self, kind: DiseaseKind) -> bool {
        let flag = match kind {
            DiseaseKind::Diabetes => self.diabetes,
            DiseaseKind::Hypertension => self.hypertension,
            DiseaseKind::KidneyDisease => self.kidney_disease,
            DiseaseKind::Allergy => self.allergy,
        };
        flag == Some(true)
    }

    /// Body weight with the documented default applied (and logged).
    pub fn weight_or_default(&self) -> f64 {
        match self.weight_kg {
            Some(w) if w > 0.0 => w,
            Some(w) => {
                warn!("invalid body weight {w}kg in profile, defaulting to {DEFAULT_WEIGHT_KG}kg");
                DEFAULT_WEIGHT_KG
            }
            None => {
                warn!("no body weight in profile, defaulting to {DEFAULT_WEIGHT_KG}kg");
                DEFAULT_WEIGHT_KG
            }
        }
    }
}

/// Markers that mean "no value" in loosely typed profile fields.
const EMPTY_MARKERS: [&str; 5] = ["", "n/a", "na", "none", "null"];

/// Interpret a loosely typed flag value.
///
/// Booleans and numbers map directly; strings are truthy unless they are an
/// empty marker or `"0"` (dotted enum paths count by their last segment);
/// lists are truthy when they contain at least one meaningful entry. A
/// missing field stays `None`.
fn flag_value(value: Option<&Value>) -> Option<bool> {
    let value = value?;
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|x| x > 0.0)),
        Value::Null => Some(false),
        Value::String(s) => {
            let token = s.rsplit('.').next().unwrap_or(s).trim().to_ascii_lowercase();
            Some(!(EMPTY_MARKERS.contains(&token.as_str()) || token == "0"))
        }
        Value::Array(items) => Some(items.iter().any(|item| match item {
            Value::String(s) => {
                let token = s.trim().to_ascii_lowercase();
                !(EMPTY_MARKERS.contains(&token.as_str()) || token == "0")
            }
            Value::Null => false,
            _ => true,
        })),
        Value::Object(_) => Some(true),
    }
}

/// Normalize a declared-allergen field into a clean list.
fn allergen_list(value: Option<&Value>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |text: &str| {
        let trimmed = text.trim();
        if trimmed.is_empty() || EMPTY_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
            return;
        }
        if !out.iter().any(|existing| existing == trimmed) {
            out.push(trimmed.to_string());
        }
    };

    match value {
        Some(Value::Array(items)) => {
            for item in items {
                if let Some(s) = item.as_str() {
                    push(s);
                }
            }
        }
        Some(Value::String(s)) => {
            for part in s.split(',') {
                push(part);
            }
        }
        _ => {}
    }
    out
}

/// The merged, priority-resolved nutrient limits for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub user_id: String,
    limits: AHashMap<String, f64>,
    restricted_ingredients: BTreeSet<String>,
}

impl ThresholdProfile {
    /// Limit for a nutrient key, if one was merged in.
    pub fn limit(&self, nutrient: &str) -> Option<f64> {
        self.limits.get(nutrient).copied()
    }

    /// Insert a limit unless a higher-priority disease already set one.
    pub fn insert_if_absent<S: Into<String>>(&mut self, nutrient: S, limit: f64) {
        self.limits.entry(nutrient.into()).or_insert(limit);
    }

    /// Iterate over `(nutrient, limit)` pairs.
    pub fn limits(&self) -> impl Iterator<Item = (&str, f64)> {
        self.limits.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The deduplicated restricted-ingredient set.
    pub fn restricted_ingredients(&self) -> &BTreeSet<String> {
        &self.restricted_ingredients
    }

    /// Add restricted ingredients (set union).
    pub fn restrict<I, S>(&mut self, ingredients: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for ingredient in ingredients {
            self.restricted_ingredients.insert(ingredient.into());
        }
    }
}

lazy_static! {
    /// Restricted substances applied by an active allergy flag, before any
    /// user-declared allergens are merged in.
    static ref ALLERGY_RESTRICTED: Vec<&'static str> =
        vec!["milk", "egg", "peanut", "nuts", "soy", "wheat", "fish", "shellfish"];

    /// Per-meal diabetes thresholds.
    static ref DIABETES_LIMITS: Vec<(&'static str, f64)> = vec![("sugar", 1.67)];

    /// Per-meal hypertension thresholds. `potassium_min` and `fat_ratio` are
    /// derived keys; see the threshold evaluator for how `fat_ratio` is read.
    static ref HYPERTENSION_LIMITS: Vec<(&'static str, f64)> = vec![
        ("sodium", 766.67),
        ("potassium_min", 1166.67),
        ("fat_ratio", 0.25),
    ];
}

/// Per-meal kidney thresholds for the pre-dialysis stage. Protein scales
/// with body weight (daily 0.6 g/kg over three meals).
fn kidney_pre_dialysis_limits(weight_kg: f64) -> Vec<(&'static str, f64)> {
    vec![
        ("protein", 0.20 * weight_kg),
        ("sodium", 766.67),
        ("phosphorus", 333.33),
        ("calcium", 333.33),
    ]
}

/// Per-meal kidney thresholds for dialysis patients (daily 1.2 g/kg protein
/// over three meals, plus a potassium cap).
///
/// TODO: the profile builder never selects this table; it always applies the
/// pre-dialysis variant even for HD/PD users while the scoring engine does
/// branch on stage. Awaiting a product-owner decision before wiring the
/// stage through `ThresholdProfileBuilder::build`.
pub fn kidney_dialysis_limits(weight_kg: f64) -> Vec<(&'static str, f64)> {
    vec![
        ("protein", 0.40 * weight_kg),
        ("sodium", 766.67),
        ("potassium", 666.67),
        ("phosphorus", 333.33),
        ("calcium", 333.33),
    ]
}

/// Builds one [`ThresholdProfile`] per user by merging per-disease threshold
/// tables in fixed priority order.
///
/// A nutrient limit set by a higher-priority disease is never overwritten by
/// a later one; restricted-ingredient lists accumulate by set union instead.
#[derive(Debug, Clone, Default)]
pub struct ThresholdProfileBuilder;

impl ThresholdProfileBuilder {
    pub fn new() -> Self {
        ThresholdProfileBuilder
    }

    /// Merge the threshold tables of every active disease into one profile.
    pub fn build(&self, user_id: &str, flags: &DiseaseFlags) -> ThresholdProfile {
        let mut profile = ThresholdProfile {
            user_id: user_id.to_string(),
            ..ThresholdProfile::default()
        };
        let weight = flags.weight_or_default();

        for kind in DiseaseKind::PRIORITY {
            if !flags.is_active(kind) {
                continue;
            }
            match kind {
                DiseaseKind::Allergy => {
                    profile.restrict(ALLERGY_RESTRICTED.iter().copied());
                }
                DiseaseKind::KidneyDisease => {
                    for (nutrient, limit) in kidney_pre_dialysis_limits(weight) {
                        profile.insert_if_absent(nutrient, limit);
                    }
                }
                DiseaseKind::Diabetes => {
                    for (nutrient, limit) in DIABETES_LIMITS.iter() {
                        profile.insert_if_absent(*nutrient, *limit);
                    }
                }
                DiseaseKind::Hypertension => {
                    for (nutrient, limit) in HYPERTENSION_LIMITS.iter() {
                        profile.insert_if_absent(*nutrient, *limit);
                    }
                }
            }
        }

        profile.restrict(flags.declared_allergens.iter().cloned());
        profile
    }
}
