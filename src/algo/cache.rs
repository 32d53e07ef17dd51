//! Cache keys for memoised query results.
//!
//! Always compiled. Only the SQLite backend (`storage.rs`) needs the `cache`
//! feature.

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

use super::dataset::Dataset;

/// Query results that can be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Aggregation,
    Categories,
    Table,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregation => "aggregation",
            Self::Categories => "categories",
            Self::Table => "table",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "aggregation" | "aggregate" => Some(Self::Aggregation),
            "categories" => Some(Self::Categories),
            "table" => Some(Self::Table),
            _ => None,
        }
    }
}

/// Identifies one query result: what was asked, of which data, with which
/// arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: ArtifactKind,
    pub dataset: u64,
    pub args: u64,
}

impl CacheKey {
    pub fn new(kind: ArtifactKind, dataset: &Dataset, args: &impl Serialize) -> Self {
        Self {
            kind,
            dataset: dataset.fingerprint(),
            args: args_hash(args),
        }
    }
}

/// Hash query arguments for cache keying. Callers pass selections as sorted
/// sequences so equal selections hash equally.
pub fn args_hash(args: &impl Serialize) -> u64 {
    let mut hasher = SipHasher13::new();
    serde_json::to_string(args)
        .unwrap_or_default()
        .hash(&mut hasher);
    hasher.finish()
}
