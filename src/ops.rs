//! Shared operation wrappers for all interfaces (CLI, MCP, plugin).
//!
//! Each `op_*` function is a synchronous wrapper around one or more `algo`
//! modules. Output is `serde_json::Value`, with no dependency on rmcp, clap
//! or nu-plugin.
//!
//! Group selections are passed as `Option<&[GroupId]>`: `None` means every
//! group in the dataset.
//!
//! When the `cache` feature is enabled, the `*_cached` variants accept an
//! optional `cache_path`. On a valid hit the stored result is returned as is.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::algo::aggregate::aggregate;
use crate::algo::catalog::{list_categories, selected_groups, total_participants};
use crate::algo::dataset::{
    count_to_json, default_dataset, embedded_fixture_json, load_dataset, Dataset, GroupId,
    VillageId,
};
use crate::algo::selection::{filter_villages, SelectionState};
use crate::algo::table::{build_table, TableQuery};
use crate::error::{Error, Result};

use crate::algo::cache;
#[cfg(feature = "cache")]
use crate::algo::storage;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Load the dataset from an explicit path, or fall back to the env / XDG /
/// embedded fixture chain.
pub fn resolve_dataset(path: Option<&str>) -> Result<Dataset> {
    match path {
        Some(p) => load_dataset(p),
        None => Ok(default_dataset()),
    }
}

/// Parse a comma-separated list of group ids, e.g. `"101, 102,201"`.
pub fn parse_group_list(s: &str) -> Result<Vec<GroupId>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<GroupId>()
                .map_err(|_| Error::invalid_argument(format!("'{t}' is not a scout group id")))
        })
        .collect()
}

/// The set of groups a query covers.
pub fn selection_set(dataset: &Dataset, groups: Option<&[GroupId]>) -> HashSet<GroupId> {
    match groups {
        Some(ids) => ids.iter().copied().collect(),
        None => dataset.groups().map(|g| g.id).collect(),
    }
}

/// Sorted id list, used for stable cache keys.
fn sorted_ids(selected: &HashSet<GroupId>) -> Vec<GroupId> {
    let mut ids: Vec<GroupId> = selected.iter().copied().collect();
    ids.sort_unstable();
    ids
}

// ── Queries ──────────────────────────────────────────────────────────────────

pub fn op_categories(dataset: &Dataset, groups: Option<&[GroupId]>) -> Value {
    let selected = selection_set(dataset, groups);
    json!(list_categories(&dataset.villages, &selected))
}

pub fn op_participants(dataset: &Dataset, groups: Option<&[GroupId]>) -> Value {
    let selected = selection_set(dataset, groups);
    let group_count = selected_groups(&dataset.villages, &selected).count();
    json!({
        "total": count_to_json(total_participants(&dataset.villages, &selected)),
        "groups": group_count,
    })
}

/// Aggregate one category. The result carries the dashboard display order of
/// the sub-questions next to the sub-questions themselves.
pub fn op_aggregate(dataset: &Dataset, groups: Option<&[GroupId]>, category: &str) -> Value {
    let selected = selection_set(dataset, groups);
    let aggregation = aggregate(&dataset.villages, &selected, category);
    let display_order: Vec<&str> = aggregation
        .ordered_sub_questions()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    let totals: serde_json::Map<String, Value> = aggregation
        .sub_questions
        .iter()
        .map(|(key, sq)| (key.clone(), count_to_json(sq.total())))
        .collect();
    json!({
        "category": category,
        "participants": count_to_json(total_participants(&dataset.villages, &selected)),
        "subQuestions": &aggregation.sub_questions,
        "displayOrder": display_order,
        "totals": totals,
    })
}

pub fn op_table(dataset: &Dataset, groups: Option<&[GroupId]>, query: &TableQuery) -> Value {
    let selected = selection_set(dataset, groups);
    let rows: Vec<_> = selected_groups(&dataset.villages, &selected).collect();
    serde_json::to_value(build_table(&rows, query)).unwrap_or(Value::Null)
}

/// Villages with their groups, optionally narrowed by a search term.
pub fn op_villages(dataset: &Dataset, filter: Option<&str>) -> Value {
    let villages = filter_villages(&dataset.villages, filter.unwrap_or(""));
    serde_json::to_value(
        villages
            .into_iter()
            .map(|v| {
                json!({
                    "id": v.id,
                    "name": v.name,
                    "num_participants": v.num_participants.map(count_to_json),
                    "groups": v.scout_groups.iter().map(|g| json!({
                        "id": g.id,
                        "name": g.name,
                        "num_participants": g.num_participants.map(count_to_json),
                    })).collect::<Vec<_>>(),
                })
            })
            .collect::<Vec<_>>(),
    )
    .unwrap_or(Value::Null)
}

pub fn op_fixture() -> Result<Value> {
    Ok(serde_json::from_str(embedded_fixture_json())?)
}

// ── Selection ────────────────────────────────────────────────────────────────

/// One selection operation, as received from an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum SelectOp {
    ToggleGroup {
        id: GroupId,
    },
    ToggleVillage {
        village: VillageId,
    },
    Clear,
    /// Select every group of the villages matching `filter` (all if absent).
    SelectAll {
        #[serde(default)]
        filter: Option<String>,
    },
    Narrow {
        ids: Vec<GroupId>,
        #[serde(default)]
        label: Option<String>,
    },
    /// Narrow to the groups that gave `answer` to a per-group sub-question,
    /// labelled with the answer.
    #[serde(rename_all = "camelCase")]
    NarrowByAnswer {
        category: String,
        sub_question: String,
        answer: String,
    },
    ToggleExpansion {
        village: VillageId,
    },
}

impl SelectOp {
    pub fn apply(&self, dataset: &Dataset, state: &mut SelectionState) -> Result<()> {
        match self {
            Self::ToggleGroup { id } => state.toggle_group(*id),
            Self::ToggleVillage { village } => state.toggle_village(&dataset.villages, village),
            Self::Clear => state.clear_selection(),
            Self::SelectAll { filter } => {
                state.select_all(filter_villages(&dataset.villages, filter.as_deref().unwrap_or("")))
            }
            Self::Narrow { ids, label } => {
                state.narrow_selection(ids.iter().copied(), label.as_deref())
            }
            Self::NarrowByAnswer {
                category,
                sub_question,
                answer,
            } => {
                let ids = answer_group_ids(dataset, state, category, sub_question, answer)?;
                state.narrow_selection(ids, Some(answer.as_str()));
            }
            Self::ToggleExpansion { village } => state.toggle_village_expansion(village),
        }
        Ok(())
    }
}

/// Ids of the groups that answered `answer`, within the current selection
/// (or the whole dataset while nothing is selected).
fn answer_group_ids(
    dataset: &Dataset,
    state: &SelectionState,
    category: &str,
    sub_question: &str,
    answer: &str,
) -> Result<Vec<GroupId>> {
    let scope = if state.selected_group_ids.is_empty() {
        selection_set(dataset, None)
    } else {
        state.selected_set()
    };
    let aggregation = aggregate(&dataset.villages, &scope, category);
    let grouped = aggregation
        .sub_questions
        .get(sub_question)
        .and_then(|sq| sq.grouped_by_answer())
        .ok_or_else(|| {
            Error::invalid_argument(format!(
                "'{sub_question}' is not a per-group question in category '{category}'"
            ))
        })?;
    Ok(grouped
        .get(answer)
        .map(|g| g.scout_group_ids.clone())
        .unwrap_or_default())
}

/// Apply `op` to `state` and report the new state with its derived views.
pub fn op_select(dataset: &Dataset, mut state: SelectionState, op: &SelectOp) -> Result<Value> {
    op.apply(dataset, &mut state)?;
    Ok(selection_report(dataset, &state))
}

/// The state plus everything a selector UI derives from it.
pub fn selection_report(dataset: &Dataset, state: &SelectionState) -> Value {
    let selected = state.selected_set();
    let villages: Vec<Value> = dataset
        .villages
        .iter()
        .map(|v| {
            json!({
                "id": v.id,
                "name": v.name,
                "checkState": state.village_check_state(v),
                "expanded": state.is_expanded(&v.id),
            })
        })
        .collect();
    json!({
        "state": state,
        "label": state.choice_label_display(),
        "selectedCount": selected_groups(&dataset.villages, &selected).count(),
        "participants": count_to_json(total_participants(&dataset.villages, &selected)),
        "villages": villages,
    })
}

// ── Cache-aware operations ──────────────────────────────────────────────────

#[derive(Serialize)]
struct AggregateArgs<'a> {
    groups: Vec<GroupId>,
    category: &'a str,
}

#[derive(Serialize)]
struct CategoriesArgs {
    groups: Vec<GroupId>,
}

#[derive(Serialize)]
struct TableArgs<'a> {
    groups: Vec<GroupId>,
    query: &'a TableQuery,
}

/// Run `compute` through the cache at `cache_path`. The dataset and
/// argument hashes are only taken when a cache is in use.
fn with_cache(
    #[cfg_attr(not(feature = "cache"), allow(unused))] kind: cache::ArtifactKind,
    #[cfg_attr(not(feature = "cache"), allow(unused))] dataset: &Dataset,
    #[cfg_attr(not(feature = "cache"), allow(unused))] args: &impl Serialize,
    cache_path: Option<&str>,
    compute: impl FnOnce() -> Value,
) -> Value {
    #[cfg(feature = "cache")]
    if let Some(path) = cache_path {
        return through_cache(path, cache::CacheKey::new(kind, dataset, args), compute);
    }

    let _ = cache_path;
    compute()
}

/// Any cache failure falls back to computing the result.
#[cfg(feature = "cache")]
fn through_cache(path: &str, key: cache::CacheKey, compute: impl FnOnce() -> Value) -> Value {
    let db = match storage::CacheDb::open(path) {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!(error = %e, "cache unavailable, recomputing");
            return compute();
        }
    };
    match db.fetch(&key) {
        Ok(Some(value)) => {
            tracing::debug!(kind = key.kind.as_str(), "cache hit");
            return value;
        }
        Ok(None) => tracing::debug!(kind = key.kind.as_str(), "cache miss"),
        Err(e) => tracing::warn!(error = %e, "unreadable cache entry, recomputing"),
    }
    let value = compute();
    if let Err(e) = db.store(&key, &value) {
        tracing::warn!(error = %e, "failed to store cache entry");
    }
    value
}

pub fn op_categories_cached(
    dataset: &Dataset,
    groups: Option<&[GroupId]>,
    cache_path: Option<&str>,
) -> Value {
    let args = CategoriesArgs {
        groups: sorted_ids(&selection_set(dataset, groups)),
    };
    with_cache(
        cache::ArtifactKind::Categories,
        dataset,
        &args,
        cache_path,
        || op_categories(dataset, groups),
    )
}

pub fn op_aggregate_cached(
    dataset: &Dataset,
    groups: Option<&[GroupId]>,
    category: &str,
    cache_path: Option<&str>,
) -> Value {
    let args = AggregateArgs {
        groups: sorted_ids(&selection_set(dataset, groups)),
        category,
    };
    with_cache(
        cache::ArtifactKind::Aggregation,
        dataset,
        &args,
        cache_path,
        || op_aggregate(dataset, groups, category),
    )
}

pub fn op_table_cached(
    dataset: &Dataset,
    groups: Option<&[GroupId]>,
    query: &TableQuery,
    cache_path: Option<&str>,
) -> Value {
    let args = TableArgs {
        groups: sorted_ids(&selection_set(dataset, groups)),
        query,
    };
    with_cache(
        cache::ArtifactKind::Table,
        dataset,
        &args,
        cache_path,
        || op_table(dataset, groups, query),
    )
}

// ── Cache management operations ─────────────────────────────────────────────

/// Return info about a cache database.
pub fn op_cache_info(#[cfg_attr(not(feature = "cache"), allow(unused))] cache_path: &str) -> Result<Value> {
    #[cfg(feature = "cache")]
    {
        let summary = storage::CacheDb::open(cache_path)?.summary()?;
        return Ok(json!({
            "path": cache_path,
            "size_bytes": summary.file_bytes,
            "total": summary.entries,
            "kinds": summary.kinds,
        }));
    }

    #[cfg(not(feature = "cache"))]
    Err(Error::Cache("Cache feature not enabled. Build with --features cache".into()))
}

/// Clear entries from a cache database.
pub fn op_cache_clear(
    #[cfg_attr(not(feature = "cache"), allow(unused))] cache_path: &str,
    #[cfg_attr(not(feature = "cache"), allow(unused))] kind: Option<&str>,
) -> Result<Value> {
    #[cfg(feature = "cache")]
    {
        let db = storage::CacheDb::open(cache_path)?;
        let artifact_kind = match kind {
            Some(k) => Some(cache::ArtifactKind::from_str(k).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "Unknown cache kind '{k}'. Use: aggregation, categories, table"
                ))
            })?),
            None => None,
        };
        let deleted = db.clear(artifact_kind)?;
        return Ok(json!({
            "path": cache_path,
            "deleted": deleted,
            "kind": kind.unwrap_or("all"),
        }));
    }

    #[cfg(not(feature = "cache"))]
    Err(Error::Cache("Cache feature not enabled. Build with --features cache".into()))
}
