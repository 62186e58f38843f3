//! Product catalog records and the catalog capability trait.
//!
//! The persistent catalog (SQL schema, migrations, caching) lives outside
//! this crate; [`CatalogStore`] is the seam the host implements. The
//! [`MemoryCatalog`] implementation backs tests, fixtures and the CLI.

use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NutriGuardError, Result};
use crate::nutrient::{ColumnMapping, NutrientVector};

/// One product as the catalog collaborator hands it over.
///
/// Nutrient columns stay in the flattened `fields` map under whatever names
/// the source database uses; [`ProductRecord::nutrient_vector`] normalizes
/// them on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: u64,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Pre-split ingredient list, if the source already provides one.
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Raw ingredient declaration text, split lazily when `ingredients` is empty.
    #[serde(default)]
    pub ingredients_raw: Option<String>,
    /// Manufacturer-declared allergen notice.
    #[serde(default)]
    pub allergy_notice: Option<String>,
    /// Manufacturer cross-contamination notice.
    #[serde(default)]
    pub trace_notice: Option<String>,
    /// Whether the product counts as processed food for phosphorus scoring.
    #[serde(default)]
    pub processed: bool,
    /// Remaining source columns, including native-named nutrient amounts.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl ProductRecord {
    /// The product's ingredient list, splitting the raw declaration text
    /// when no pre-split list is available.
    pub fn ingredient_list(&self) -> Vec<String> {
        if !self.ingredients.is_empty() {
            return self.ingredients.clone();
        }
        self.ingredients_raw
            .as_deref()
            .map(split_ingredients)
            .unwrap_or_default()
    }

    /// Normalize this record's nutrient columns into a canonical vector.
    pub fn nutrient_vector(&self, mapping: &ColumnMapping) -> NutrientVector {
        NutrientVector::from_fields(&self.fields, mapping)
    }
}

/// Split a raw ingredient declaration into individual ingredient names.
///
/// Declarations in the source database separate items with commas, middle
/// dots or slashes, often inconsistently within one record.
pub fn split_ingredients(raw: &str) -> Vec<String> {
    raw.replace(['·', '/'], ",")
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read access to the product catalog.
///
/// Lookup misses are `Ok(None)`, never errors: an unknown product id must
/// degrade to an empty result instead of aborting the pipeline.
pub trait CatalogStore: Send + Sync {
    /// Fetch one product by id.
    fn product(&self, product_id: u64) -> Result<Option<ProductRecord>>;

    /// Fetch every product, for index construction.
    fn all_products(&self) -> Result<Vec<ProductRecord>>;

    /// Number of products in the catalog.
    fn len(&self) -> usize;

    /// Whether the catalog is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory catalog backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    products: AHashMap<u64, ProductRecord>,
}

impl MemoryCatalog {
    /// Build a catalog from a list of records. Later duplicates of a
    /// product id replace earlier ones.
    pub fn new<I: IntoIterator<Item = ProductRecord>>(records: I) -> Self {
        let products = records
            .into_iter()
            .map(|record| (record.product_id, record))
            .collect();
        MemoryCatalog { products }
    }

    /// Load a catalog from a JSON file containing an array of records.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let records: Vec<ProductRecord> = serde_json::from_str(&text).map_err(|e| {
            NutriGuardError::catalog(format!(
                "invalid catalog file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Ok(MemoryCatalog::new(records))
    }
}

impl CatalogStore for MemoryCatalog {
    fn product(&self, product_id: u64) -> Result<Option<ProductRecord>> {
        Ok(self.products.get(&product_id).cloned())
    }

    fn all_products(&self) -> Result<Vec<ProductRecord>> {
        Ok(self.products.values().cloned().collect())
    }

    fn len(&self) -> usize {
        self.products.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrient::names;
    use serde_json::json;
    use std::io::Write;

    fn record(value: Value) -> ProductRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_split_ingredients_mixed_separators() {
        let parts = split_ingredients("밀가루·설탕, 팜유/전지분유 , ");
        assert_eq!(parts, vec!["밀가루", "설탕", "팜유", "전지분유"]);
    }

    #[test]
    fn test_ingredient_list_prefers_presplit() {
        let product = record(json!({
            "product_id": 1,
            "name": "초코 쿠키",
            "ingredients": ["밀가루", "설탕"],
            "ingredients_raw": "ignored·text",
        }));
        assert_eq!(product.ingredient_list(), vec!["밀가루", "설탕"]);
    }

    #[test]
    fn test_nutrient_vector_from_flattened_fields() {
        let product = record(json!({
            "product_id": 2,
            "name": "감자칩",
            "나트륨(mg)": 450.0,
            "에너지(kcal)": 330,
        }));
        let vector = product.nutrient_vector(&ColumnMapping::default());
        assert_eq!(vector.get(names::SODIUM), 450.0);
        assert_eq!(vector.get(names::CALORIES), 330.0);
    }

    #[test]
    fn test_memory_catalog_lookup_miss_is_none() {
        let catalog = MemoryCatalog::new(vec![record(json!({
            "product_id": 7,
            "name": "크래커",
        }))]);
        assert!(catalog.product(7).unwrap().is_some());
        assert!(catalog.product(999).unwrap().is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_catalog_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"product_id": 11, "name": "요거트", "당류(g)": 9.0}}]"#
        )
        .unwrap();

        let catalog = MemoryCatalog::from_json_file(file.path()).unwrap();
        let product = catalog.product(11).unwrap().unwrap();
        assert_eq!(product.name, "요거트");
        assert_eq!(
            product.nutrient_vector(&ColumnMapping::default()).get(names::SUGAR),
            9.0
        );
    }
}
