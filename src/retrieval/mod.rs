//! Candidate retrieval: taste/category indexing and the quota-balanced
//! bucket search that narrows the catalog to a small comparison set.

pub mod index;
pub mod lexicon;
pub mod retriever;

pub use index::{CatalogIndex, IndexCache, IndexEntry};
pub use lexicon::{CategoryNeighbors, RetrievalConfig, TasteLexicon, TasteTag};
pub use retriever::{Candidate, CandidateRetriever, apportion};
