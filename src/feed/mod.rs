pub mod collector;
pub mod discovery;
pub mod fetcher;
pub mod parser;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// News category a feed is filed under. The store resolves these by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Policy,
    Accident,
    Business,
    International,
    Tech,
}

impl Category {
    /// Ingestion order.
    pub const ALL: [Category; 5] = [
        Category::Policy,
        Category::Accident,
        Category::Business,
        Category::International,
        Category::Tech,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Policy => "policy",
            Category::Accident => "accident",
            Category::Business => "business",
            Category::International => "international",
            Category::Tech => "tech",
        }
    }

    /// Position of this category's feed among the site's feed inputs.
    pub fn default_position(&self) -> usize {
        match self {
            Category::Accident => 5,
            Category::Policy => 6,
            Category::Business => 7,
            Category::International => 8,
            Category::Tech => 9,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Invalid(format!("Unknown category: {}", s)))
    }
}

/// One normalized record handed from the collector to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateArticle {
    /// The `idx` query parameter of the article link, when present.
    pub natural_key: Option<String>,
    pub title: String,
    pub link: String,
    pub category: String,
    pub published_date: String,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
}
