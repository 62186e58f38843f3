//! Canonical nutrient vectors and native-column normalization.
//!
//! Catalog records arrive with heterogeneous field names (the production food
//! database uses Korean column labels such as `나트륨(mg)`). Everything past
//! the catalog boundary works on a [`NutrientVector`] keyed by the canonical
//! names below; missing fields read as `0.0`.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical nutrient names used throughout the crate.
pub mod names {
    pub const CALORIES: &str = "calories";
    pub const SODIUM: &str = "sodium";
    pub const CARBOHYDRATE: &str = "carbohydrate";
    pub const SUGAR: &str = "sugar";
    pub const FAT: &str = "fat";
    pub const TRANS_FAT: &str = "trans_fat";
    pub const SATURATED_FAT: &str = "saturated_fat";
    pub const CHOLESTEROL: &str = "cholesterol";
    pub const PROTEIN: &str = "protein";
    pub const PHOSPHORUS: &str = "phosphorus";
    pub const CALCIUM: &str = "calcium";
    pub const POTASSIUM: &str = "potassium";
    pub const FIBER: &str = "fiber";
}

/// All canonical nutrient names, in a fixed display order.
pub const CANONICAL_NUTRIENTS: [&str; 13] = [
    names::CALORIES,
    names::SODIUM,
    names::CARBOHYDRATE,
    names::SUGAR,
    names::FAT,
    names::TRANS_FAT,
    names::SATURATED_FAT,
    names::CHOLESTEROL,
    names::PROTEIN,
    names::PHOSPHORUS,
    names::CALCIUM,
    names::POTASSIUM,
    names::FIBER,
];

/// Mapping from canonical nutrient names to the native catalog column names.
///
/// The default mapping targets the KFDA food database columns the production
/// catalog was loaded from. A record may carry either the canonical or the
/// native name for any nutrient; the canonical name wins when both appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    columns: Vec<(String, String)>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        let columns = [
            (names::CALORIES, "에너지(kcal)"),
            (names::SODIUM, "나트륨(mg)"),
            (names::CARBOHYDRATE, "탄수화물(g)"),
            (names::SUGAR, "당류(g)"),
            (names::FAT, "지방(g)"),
            (names::TRANS_FAT, "트랜스지방(g)"),
            (names::SATURATED_FAT, "포화지방(g)"),
            (names::CHOLESTEROL, "콜레스테롤(mg)"),
            (names::PROTEIN, "단백질(g)"),
            (names::PHOSPHORUS, "인(mg)"),
            (names::CALCIUM, "칼슘(mg)"),
            (names::POTASSIUM, "칼륨(mg)"),
            (names::FIBER, "식이섬유(g)"),
        ];
        ColumnMapping {
            columns: columns
                .iter()
                .map(|(c, n)| (c.to_string(), n.to_string()))
                .collect(),
        }
    }
}

impl ColumnMapping {
    /// Create a mapping from explicit `(canonical, native)` pairs.
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        ColumnMapping {
            columns: pairs
                .into_iter()
                .map(|(c, n)| (c.into(), n.into()))
                .collect(),
        }
    }

    /// Iterate over `(canonical, native)` column pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }

    /// Look up the native column name for a canonical nutrient.
    pub fn native(&self, canonical: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(c, _)| c == canonical)
            .map(|(_, n)| n.as_str())
    }
}

/// An immutable per-product snapshot of nutrient amounts.
///
/// Keys are canonical nutrient names; [`NutrientVector::get`] returns `0.0`
/// for anything absent, so downstream arithmetic never has to branch on
/// missing data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NutrientVector {
    values: AHashMap<String, f64>,
}

impl NutrientVector {
    /// Create an empty vector.
    pub fn new() -> Self {
        NutrientVector::default()
    }

    /// Normalize a raw record's fields into a canonical vector.
    ///
    /// For each canonical nutrient the canonical key is tried first, then the
    /// mapped native column. Values may be JSON numbers or numeric strings;
    /// anything unparseable reads as absent.
    pub fn from_fields(fields: &serde_json::Map<String, Value>, mapping: &ColumnMapping) -> Self {
        let mut values = AHashMap::new();
        for (canonical, native) in mapping.iter() {
            let raw = fields.get(canonical).or_else(|| fields.get(native));
            if let Some(amount) = raw.and_then(numeric) {
                values.insert(canonical.to_string(), amount);
            }
        }
        NutrientVector { values }
    }

    /// Amount for a canonical nutrient, `0.0` when absent.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// Set a nutrient amount.
    pub fn set<S: Into<String>>(&mut self, name: S, amount: f64) -> &mut Self {
        self.values.insert(name.into(), amount);
        self
    }

    /// Whether no nutrient was recognized at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the recognized `(name, amount)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_native_column_normalization() {
        let raw = fields(json!({
            "나트륨(mg)": 320.0,
            "당류(g)": "12.5",
            "에너지(kcal)": 210,
        }));
        let vector = NutrientVector::from_fields(&raw, &ColumnMapping::default());

        assert_eq!(vector.get(names::SODIUM), 320.0);
        assert_eq!(vector.get(names::SUGAR), 12.5);
        assert_eq!(vector.get(names::CALORIES), 210.0);
    }

    #[test]
    fn test_canonical_name_wins_over_native() {
        let raw = fields(json!({
            "sodium": 100.0,
            "나트륨(mg)": 900.0,
        }));
        let vector = NutrientVector::from_fields(&raw, &ColumnMapping::default());
        assert_eq!(vector.get(names::SODIUM), 100.0);
    }

    #[test]
    fn test_missing_nutrient_reads_zero() {
        let vector = NutrientVector::new();
        assert_eq!(vector.get(names::POTASSIUM), 0.0);
        assert!(vector.is_empty());
    }

    #[test]
    fn test_vector_serde_round_trip() {
        let mut vector = NutrientVector::new();
        vector.set(names::SODIUM, 320.0).set(names::SUGAR, 12.5);

        let json = serde_json::to_string(&vector).unwrap();
        let back: NutrientVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(names::SODIUM), 320.0);
        assert_eq!(back.get(names::SUGAR), 12.5);
    }

    #[test]
    fn test_unparseable_value_reads_zero() {
        let raw = fields(json!({ "단백질(g)": "n/a" }));
        let vector = NutrientVector::from_fields(&raw, &ColumnMapping::default());
        assert_eq!(vector.get(names::PROTEIN), 0.0);
    }
}
