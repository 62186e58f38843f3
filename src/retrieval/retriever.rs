//! Quota-balanced candidate retrieval.
//!
//! Given a clicked product, candidates are partitioned into four disjoint
//! buckets by category match and taste-tag overlap, scored, and drawn per
//! bucket according to a largest-remainder quota split so the comparison
//! set keeps category diversity instead of collapsing onto one bucket.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use super::index::{CatalogIndex, IndexEntry};
use super::lexicon::RetrievalConfig;

/// One retrieved candidate with its dense 1..K rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub product_id: u64,
    pub rank: u32,
}

/// Scored candidate inside one bucket, before ranks are assigned.
#[derive(Debug, Clone, Copy)]
struct ScoredEntry {
    product_id: u64,
    /// Taste-tag overlap count times 10.
    taste_score: u64,
    /// Token-overlap fallback: intersection size of whitespace token sets.
    fallback_score: u64,
}

/// Retrieves a diversity-balanced candidate set relative to a clicked product.
pub struct CandidateRetriever {
    index: Arc<CatalogIndex>,
    config: RetrievalConfig,
}

impl CandidateRetriever {
    pub fn new(index: Arc<CatalogIndex>, config: RetrievalConfig) -> Self {
        CandidateRetriever { index, config }
    }

    /// Retrieve up to `k` candidates for the clicked product.
    ///
    /// An unknown clicked product yields an empty result, never an error.
    pub fn retrieve(&self, clicked_id: u64, k: usize) -> Vec<Candidate> {
        if k == 0 {
            return Vec::new();
        }
        let Some(anchor) = self.index.get(clicked_id) else {
            warn!("clicked product {clicked_id} not in the retrieval index, returning no candidates");
            return Vec::new();
        };

        // Bucket 0: same category, taste overlap. Bucket 1: same category
        // only. Bucket 2: neighbor category with taste overlap. Bucket 3:
        // everything else.
        let mut buckets: [Vec<ScoredEntry>; 4] = Default::default();
        for entry in self.index.iter() {
            if entry.product_id == clicked_id {
                continue;
            }
            let scored = score_entry(anchor, entry);
            buckets[self.bucket_of(anchor, entry)].push(scored);
        }

        for bucket in &mut buckets {
            bucket.sort_by(|a, b| {
                b.taste_score
                    .cmp(&a.taste_score)
                    .then(b.fallback_score.cmp(&a.fallback_score))
                    .then(a.product_id.cmp(&b.product_id))
            });
        }

        let quotas = apportion(k, &self.config.bucket_weights);
        let mut picked: Vec<ScoredEntry> = Vec::with_capacity(k);
        let mut cursors = [0usize; 4];

        for (bucket_idx, quota) in quotas.iter().enumerate() {
            let take = (*quota).min(buckets[bucket_idx].len());
            picked.extend_from_slice(&buckets[bucket_idx][..take]);
            cursors[bucket_idx] = take;
        }

        // Backfill from the catch-all bucket first, then from whatever the
        // quota'd buckets still hold, so the result only comes up short when
        // the catalog itself does.
        for bucket_idx in [3usize, 0, 1, 2] {
            while picked.len() < k && cursors[bucket_idx] < buckets[bucket_idx].len() {
                picked.push(buckets[bucket_idx][cursors[bucket_idx]]);
                cursors[bucket_idx] += 1;
            }
        }

        picked.truncate(k);
        picked
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| Candidate {
                product_id: entry.product_id,
                rank: idx as u32 + 1,
            })
            .collect()
    }

    fn bucket_of(&self, anchor: &IndexEntry, entry: &IndexEntry) -> usize {
        let same_category = match (&anchor.category, &entry.category) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        let neighbor = match (&anchor.category, &entry.category) {
            (Some(a), Some(b)) => self.config.neighbors.is_neighbor(a, b),
            _ => false,
        };
        let taste_overlap = anchor
            .taste_tags
            .iter()
            .any(|tag| entry.taste_tags.contains(tag));

        match (same_category, taste_overlap, neighbor) {
            (true, true, _) => 0,
            (true, false, _) => 1,
            (false, true, true) => 2,
            _ => 3,
        }
    }
}

fn score_entry(anchor: &IndexEntry, entry: &IndexEntry) -> ScoredEntry {
    let taste_overlap = anchor
        .taste_tags
        .iter()
        .filter(|tag| entry.taste_tags.contains(*tag))
        .count() as u64;
    let token_overlap = anchor
        .tokens
        .iter()
        .filter(|token| entry.tokens.contains(*token))
        .count() as u64;

    ScoredEntry {
        product_id: entry.product_id,
        taste_score: taste_overlap * 10,
        fallback_score: token_overlap,
    }
}

/// Largest-remainder apportionment of `k` slots across weighted buckets.
///
/// Shares are floored, then the leftover units go to the largest fractional
/// remainders; on equal remainders the bucket with the smaller floor wins
/// (keeping low-share buckets represented), then the earlier index.
pub fn apportion(k: usize, weights: &[f64]) -> Vec<usize> {
    let mut allocated: Vec<usize> = Vec::with_capacity(weights.len());
    let mut remainders: Vec<(usize, f64, usize)> = Vec::with_capacity(weights.len());

    for (idx, weight) in weights.iter().enumerate() {
        let share = k as f64 * weight.max(0.0);
        let floor = share.floor() as usize;
        allocated.push(floor);
        remainders.push((idx, share - floor as f64, floor));
    }

    let assigned: usize = allocated.iter().sum();
    let mut leftover = k.saturating_sub(assigned);

    remainders.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.2.cmp(&b.2))
            .then(a.0.cmp(&b.0))
    });

    for (idx, _, _) in remainders {
        if leftover == 0 {
            break;
        }
        allocated[idx] += 1;
        leftover -= 1;
    }

    allocated
}
