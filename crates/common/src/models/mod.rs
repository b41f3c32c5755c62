//! Paper data model shared by the resolver and knowledge crates

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A paper as returned by the paper source.
///
/// `id` is the provider-assigned identifier and is stable across calls.
/// Everything else is descriptive metadata; PDF resolution and analysis
/// results are kept outside of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,

    pub title: String,

    /// Author names in publication order
    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub venue: String,

    #[serde(default)]
    pub citations: u64,

    #[serde(default)]
    pub url: String,

    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,

    #[serde(default)]
    pub doi: Option<String>,

    #[serde(default)]
    pub arxiv_id: Option<String>,

    /// Direct open-access PDF link reported by the paper source
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl Paper {
    /// Minimal paper with only identity and title set
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            year: None,
            venue: String::new(),
            citations: 0,
            url: String::new(),
            abstract_text: None,
            doi: None,
            arxiv_id: None,
            pdf_url: None,
        }
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }
}

/// Which side of the citation graph a related paper sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationDirection {
    /// Papers the seed cites
    Reference,
    /// Papers citing the seed
    Citation,
}

impl CitationDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationDirection::Reference => "reference",
            CitationDirection::Citation => "citation",
        }
    }
}

/// Edge between a seed paper and one related paper. Never a self-edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationEdge {
    pub seed_id: String,
    pub related_id: String,
    pub direction: CitationDirection,
}

impl CitationEdge {
    /// Returns `None` for a self-edge.
    pub fn new(seed_id: &str, related_id: &str, direction: CitationDirection) -> Option<Self> {
        if seed_id == related_id {
            return None;
        }
        Some(Self {
            seed_id: seed_id.to_string(),
            related_id: related_id.to_string(),
            direction,
        })
    }
}

/// Keyword search request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 500, message = "Keyword must be 1-500 characters"))]
    pub keyword: String,

    #[validate(range(min = 1900, max = 2100))]
    #[serde(default)]
    pub year_from: Option<i32>,

    #[validate(range(min = 1900, max = 2100))]
    #[serde(default)]
    pub year_to: Option<i32>,

    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            year_from: None,
            year_to: None,
            limit: default_limit(),
        }
    }

    pub fn years(mut self, from: i32, to: i32) -> Self {
        self.year_from = Some(from);
        self.year_to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether a publication year satisfies the requested range.
    /// Papers without a year only match an unbounded query.
    pub fn accepts_year(&self, year: Option<i32>) -> bool {
        if self.year_from.is_none() && self.year_to.is_none() {
            return true;
        }
        let Some(year) = year else {
            return false;
        };
        self.year_from.map_or(true, |from| year >= from) && self.year_to.map_or(true, |to| year <= to)
    }
}
