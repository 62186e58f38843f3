//! Catalog index construction and memoization.
//!
//! Indexing is a one-time cost per catalog load: every product gets an index
//! text (name, brand, ingredients, plus taste tags for snack-allowlisted
//! categories), a token set for overlap scoring and its taste-tag set. The
//! build parallelizes over the catalog with rayon; the finished index is
//! immutable and shared behind an `Arc`, safe for concurrent readers.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::catalog::ProductRecord;
use super::lexicon::RetrievalConfig;

/// Per-product index entry.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub product_id: u64,
    pub category: Option<String>,
    /// Whitespace tokens of the lowercased index text (tags included).
    pub tokens: AHashSet<String>,
    /// Taste tags assigned by the lexicon; empty outside the snack allowlist.
    pub taste_tags: AHashSet<String>,
}

/// The immutable retrieval index over one catalog snapshot.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    entries: AHashMap<u64, IndexEntry>,
}

impl CatalogIndex {
    /// Build the index for a catalog snapshot.
    pub fn build(products: &[ProductRecord], config: &RetrievalConfig) -> CatalogIndex {
        let built: Vec<(u64, IndexEntry)> = products
            .par_iter()
            .map(|product| {
                let entry = index_product(product, config);
                (product.product_id, entry)
            })
            .collect();

        CatalogIndex {
            entries: built.into_iter().collect(),
        }
    }

    pub fn get(&self, product_id: u64) -> Option<&IndexEntry> {
        self.entries.get(&product_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn index_product(product: &ProductRecord, config: &RetrievalConfig) -> IndexEntry {
    let mut text = String::new();
    text.push_str(&product.name);
    if let Some(brand) = &product.brand {
        text.push(' ');
        text.push_str(brand);
    }
    for ingredient in product.ingredient_list() {
        text.push(' ');
        text.push_str(&ingredient);
    }
    let text = text.to_lowercase();

    let taste_tags = if config.is_snack(product.category.as_deref()) {
        config.lexicon.tags_for(&text)
    } else {
        AHashSet::new()
    };

    let mut tokens: AHashSet<String> =
        text.split_whitespace().map(str::to_string).collect();
    for tag in &taste_tags {
        tokens.insert(tag.to_lowercase());
    }

    IndexEntry {
        product_id: product.product_id,
        category: product.category.clone(),
        tokens,
        taste_tags,
    }
}

/// Memoized index shared across evaluation requests.
///
/// Rebuilding per request would be correctness-preserving but wasteful; the
/// cache builds once on first use and hands out `Arc` clones afterwards.
/// Catalog changes are an external concern signalled via [`IndexCache::invalidate`].
#[derive(Debug, Default)]
pub struct IndexCache {
    inner: RwLock<Option<Arc<CatalogIndex>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        IndexCache::default()
    }

    /// The cached index, if one was built.
    pub fn get(&self) -> Option<Arc<CatalogIndex>> {
        self.inner.read().as_ref().map(Arc::clone)
    }

    /// Return the cached index, building it with `build` if absent.
    pub fn get_or_build<F: FnOnce() -> CatalogIndex>(&self, build: F) -> Arc<CatalogIndex> {
        if let Some(index) = self.inner.read().as_ref() {
            return Arc::clone(index);
        }

        let mut slot = self.inner.write();
        // Another thread may have built it while we waited on the lock.
        if let Some(index) = slot.as_ref() {
            return Arc::clone(index);
        }
        let index = Arc::new(build());
        *slot = Some(Arc::clone(&index));
        index
    }

    /// Drop the cached index so the next request rebuilds it.
    pub fn invalidate(&self) {
        *self.inner.write() = None;
    }
}
