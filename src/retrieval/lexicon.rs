//! Taste lexicon, category adjacency and retrieval configuration.
//!
//! These are process-wide static configuration in production, but they are
//! injected as constructor arguments so tests can substitute small fixtures.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

/// One taste tag and the keywords that assign it.
///
/// A tag is assigned when any of its keywords appears, case-insensitively,
/// in a product's index text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasteTag {
    pub name: String,
    pub keywords: Vec<String>,
}

impl TasteTag {
    pub fn new<S, I, K>(name: S, keywords: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        TasteTag {
            name: name.into(),
            keywords: keywords.into_iter().map(|k| k.into().to_lowercase()).collect(),
        }
    }
}

/// Keyword lexicon mapping index text to taste tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasteLexicon {
    tags: Vec<TasteTag>,
}

impl TasteLexicon {
    pub fn new<I: IntoIterator<Item = TasteTag>>(tags: I) -> Self {
        TasteLexicon {
            tags: tags.into_iter().collect(),
        }
    }

    /// Tags whose keywords appear in the (already lowercased) text.
    pub fn tags_for(&self, text: &str) -> AHashSet<String> {
        self.tags
            .iter()
            .filter(|tag| tag.keywords.iter().any(|kw| text.contains(kw.as_str())))
            .map(|tag| tag.name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for TasteLexicon {
    /// Bilingual seed lexicon for the snack categories of the production
    /// catalog. Hosts with their own merchandising data replace this.
    fn default() -> Self {
        TasteLexicon::new([
            TasteTag::new("sweet", ["달콤", "설탕", "꿀", "honey", "sweet", "시럽"]),
            TasteTag::new("chocolate", ["초코", "초콜릿", "chocolate", "카카오", "cacao"]),
            TasteTag::new("salty", ["짭짤", "소금", "salted", "salty", "간장"]),
            TasteTag::new("spicy", ["매운", "매콤", "spicy", "hot", "불닭", "칠리"]),
            TasteTag::new("sour", ["새콤", "신맛", "sour", "레몬", "유자"]),
            TasteTag::new("savory", ["고소", "savory", "치즈", "cheese", "버터", "butter"]),
            TasteTag::new("nutty", ["땅콩", "아몬드", "호두", "nut", "peanut", "almond"]),
            TasteTag::new("fruity", ["딸기", "사과", "포도", "바나나", "fruit", "berry"]),
        ])
    }
}

/// Symmetrized category adjacency.
///
/// The configured map is directed; construction adds the reverse of every
/// edge so neighborhood checks are order-independent.
#[derive(Debug, Clone, Default)]
pub struct CategoryNeighbors {
    map: AHashMap<String, AHashSet<String>>,
}

impl CategoryNeighbors {
    /// Build from directed edges, symmetrizing as we go.
    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut map: AHashMap<String, AHashSet<String>> = AHashMap::new();
        for (a, b) in edges {
            let (a, b) = (a.into(), b.into());
            if a == b {
                continue;
            }
            map.entry(a.clone()).or_default().insert(b.clone());
            map.entry(b).or_default().insert(a);
        }
        CategoryNeighbors { map }
    }

    /// Whether two categories are adjacent.
    pub fn is_neighbor(&self, a: &str, b: &str) -> bool {
        self.map.get(a).is_some_and(|set| set.contains(b))
    }

    pub fn neighbors(&self, category: &str) -> Option<&AHashSet<String>> {
        self.map.get(category)
    }
}

/// Configuration for the candidate retriever.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub lexicon: TasteLexicon,
    pub neighbors: CategoryNeighbors,
    /// Categories whose index entries receive taste tags.
    pub snack_categories: Vec<String>,
    /// Slot shares for buckets 1-3 (same+taste, same, neighbor+taste).
    pub bucket_weights: [f64; 3],
}

impl RetrievalConfig {
    /// Whether a product category is on the snack allowlist.
    pub fn is_snack(&self, category: Option<&str>) -> bool {
        category.is_some_and(|cat| self.snack_categories.iter().any(|snack| snack == cat))
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let snack_categories = [
            "과자",
            "쿠키",
            "스낵",
            "초콜릿류",
            "캔디류",
            "빙과류",
            "빵류",
        ];
        RetrievalConfig {
            lexicon: TasteLexicon::default(),
            neighbors: CategoryNeighbors::from_edges([
                ("과자", "쿠키"),
                ("과자", "스낵"),
                ("쿠키", "빵류"),
                ("초콜릿류", "캔디류"),
                ("초콜릿류", "쿠키"),
                ("캔디류", "빙과류"),
                ("음료류", "빙과류"),
            ]),
            snack_categories: snack_categories.iter().map(|s| s.to_string()).collect(),
            bucket_weights: [0.6, 0.3, 0.1],
        }
    }
}
