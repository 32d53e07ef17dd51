//! Per-group table view: one row per scout group, one column per leaf found
//! in any group's `stats`.
//!
//! A column id is the path to its leaf, parts joined by [`COLUMN_SEPARATOR`]:
//! `Kön§Man` for a leaf directly under a category, `Resa§Färdsätt§Buss` for
//! an answer under a sub-question.

use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::collate::{compare_sv, sort_sv};
use super::dataset::{count_to_json, serialize_count, GroupId, ScoutGroup};

pub const COLUMN_SEPARATOR: &str = "§";

/// Row fields that are always present and never looked up in `stats`.
pub const NAME_COLUMN: &str = "name";
pub const PARTICIPANTS_COLUMN: &str = "num_participants";

// ── Hierarchy ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HierarchyNode {
    Branch {
        name: String,
        children: Vec<HierarchyNode>,
    },
    Leaf {
        name: String,
        #[serde(rename = "columnId")]
        column_id: String,
    },
}

impl HierarchyNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Branch { name, .. } | Self::Leaf { name, .. } => name,
        }
    }

    fn collect_column_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Leaf { column_id, .. } => out.push(column_id),
            Self::Branch { children, .. } => {
                for child in children {
                    child.collect_column_ids(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryNode {
    pub name: String,
    pub children: Vec<HierarchyNode>,
}

impl CategoryNode {
    pub fn column_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for child in &self.children {
            child.collect_column_ids(&mut out);
        }
        out
    }
}

/// Column id → leaf name, for headers.
pub fn column_headers(hierarchy: &[CategoryNode]) -> IndexMap<String, String> {
    fn walk(node: &HierarchyNode, out: &mut IndexMap<String, String>) {
        match node {
            HierarchyNode::Leaf { name, column_id } => {
                out.insert(column_id.clone(), name.clone());
            }
            HierarchyNode::Branch { children, .. } => {
                for c in children {
                    walk(c, out);
                }
            }
        }
    }
    let mut out = IndexMap::new();
    for category in hierarchy {
        for child in &category.children {
            walk(child, &mut out);
        }
    }
    out
}

/// Every leaf column id in hierarchy order.
pub fn all_column_ids(hierarchy: &[CategoryNode]) -> Vec<String> {
    hierarchy
        .iter()
        .flat_map(|c| c.column_ids())
        .map(str::to_string)
        .collect()
}

pub fn column_id(parts: &[&str]) -> String {
    parts.join(COLUMN_SEPARATOR)
}

enum PendingChild {
    Branch { name: String, leaves: IndexSet<String> },
    Leaf { name: String },
}

/// Build the category tree over all groups. Every level is sorted with
/// Swedish collation. Nodes exist only above at least one leaf column:
/// `null` values, empty answer maps and non-object category payloads add
/// nothing.
pub fn stats_hierarchy<'a>(groups: impl IntoIterator<Item = &'a ScoutGroup>) -> Vec<CategoryNode> {
    // Children are keyed by sub-question name for branches and by column id
    // for direct leaves, so a key that is nested in one group and flat in
    // another yields both a branch and a leaf.
    let mut categories: IndexMap<String, IndexMap<String, PendingChild>> = IndexMap::new();

    for group in groups {
        for (category, payload) in &group.stats {
            let Value::Object(entries) = payload else {
                continue;
            };
            for (key, value) in entries {
                match value {
                    Value::Null => {}
                    Value::Object(answers) if answers.is_empty() => {}
                    Value::Object(answers) => {
                        let child = categories
                            .entry(category.clone())
                            .or_default()
                            .entry(key.clone())
                            .or_insert_with(|| PendingChild::Branch {
                                name: key.clone(),
                                leaves: IndexSet::new(),
                            });
                        if let PendingChild::Branch { leaves, .. } = child {
                            leaves.extend(answers.keys().cloned());
                        }
                    }
                    _ => {
                        categories
                            .entry(category.clone())
                            .or_default()
                            .entry(column_id(&[category.as_str(), key.as_str()]))
                            .or_insert_with(|| PendingChild::Leaf { name: key.clone() });
                    }
                }
            }
        }
    }

    let mut hierarchy: Vec<CategoryNode> = categories
        .into_iter()
        .map(|(category, children)| {
            let mut children: Vec<HierarchyNode> = children
                .into_values()
                .map(|child| match child {
                    PendingChild::Leaf { name } => HierarchyNode::Leaf {
                        column_id: column_id(&[category.as_str(), name.as_str()]),
                        name,
                    },
                    PendingChild::Branch { name, leaves } => {
                        let mut leaves: Vec<String> = leaves.into_iter().collect();
                        sort_sv(&mut leaves);
                        let children = leaves
                            .into_iter()
                            .map(|leaf| HierarchyNode::Leaf {
                                column_id: column_id(&[category.as_str(), name.as_str(), leaf.as_str()]),
                                name: leaf,
                            })
                            .collect();
                        HierarchyNode::Branch { name, children }
                    }
                })
                .collect();
            children.sort_by(|a, b| compare_sv(a.name(), b.name()));
            CategoryNode {
                name: category,
                children,
            }
        })
        .collect();
    hierarchy.sort_by(|a, b| compare_sv(&a.name, &b.name));
    hierarchy
}

// ── Cells ───────────────────────────────────────────────────────────────────

/// One table cell. Arrays show as their length.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Display text; whole numbers print without a fraction.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Number(n) => count_to_json(*n).to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            Self::Empty => None,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => s.serialize_none(),
            Self::Number(n) => serialize_count(n, s),
            Self::Text(t) => s.serialize_str(t),
        }
    }
}

/// Look a column up in one group's `stats`.
pub fn value_at_path(stats: &Map<String, Value>, column_id: &str) -> Cell {
    let mut parts = column_id.split(COLUMN_SEPARATOR);
    let mut current = parts.next().and_then(|first| stats.get(first));
    for part in parts {
        current = current.and_then(Value::as_object).and_then(|m| m.get(part));
    }
    match current {
        Some(Value::Number(n)) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
        Some(Value::String(s)) => Cell::Text(s.clone()),
        Some(Value::Array(items)) => Cell::Number(items.len() as f64),
        _ => Cell::Empty,
    }
}

// ── Column metadata ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Text {
        #[serde(rename = "uniqueValues")]
        unique_values: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub id: String,
    pub header: String,
    #[serde(flatten)]
    pub kind: ColumnKind,
}

/// Column kind: numeric when every non-empty cell is a number and there is
/// at least one; otherwise text with the distinct values, Swedish-sorted.
pub fn column_kind(groups: &[&ScoutGroup], column_id: &str) -> ColumnKind {
    let cells: Vec<Cell> = groups
        .iter()
        .map(|g| value_at_path(&g.stats, column_id))
        .filter(|c| !c.is_empty())
        .collect();
    if !cells.is_empty() && cells.iter().all(|c| matches!(c, Cell::Number(_))) {
        return ColumnKind::Number;
    }
    let mut unique_values: Vec<String> = cells
        .iter()
        .map(Cell::to_text)
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect();
    sort_sv(&mut unique_values);
    ColumnKind::Text { unique_values }
}

/// Metadata for every leaf column of `hierarchy`, in hierarchy order.
pub fn column_meta(groups: &[&ScoutGroup], hierarchy: &[CategoryNode]) -> Vec<TableColumn> {
    let headers = column_headers(hierarchy);
    headers
        .into_iter()
        .map(|(id, header)| TableColumn {
            kind: column_kind(groups, &id),
            id,
            header,
        })
        .collect()
}

// ── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub id: GroupId,
    pub name: String,
    #[serde(serialize_with = "serialize_count")]
    pub num_participants: f64,
    pub cells: IndexMap<String, Cell>,
}

impl TableRow {
    /// Cell for a column id, including the fixed `name` and
    /// `num_participants` columns.
    pub fn cell(&self, column: &str) -> Cell {
        match column {
            NAME_COLUMN => Cell::Text(self.name.clone()),
            PARTICIPANTS_COLUMN => Cell::Number(self.num_participants),
            _ => self.cells.get(column).cloned().unwrap_or(Cell::Empty),
        }
    }
}

/// One row per group with a cell for each requested column. The fixed
/// columns are row fields and are not repeated in `cells`.
pub fn table_rows(groups: &[&ScoutGroup], columns: &[String]) -> Vec<TableRow> {
    groups
        .par_iter()
        .map(|g| TableRow {
            id: g.id,
            name: g.name.clone(),
            num_participants: g.participants(),
            cells: columns
                .iter()
                .filter(|c| c.as_str() != NAME_COLUMN && c.as_str() != PARTICIPANTS_COLUMN)
                .map(|c| (c.clone(), value_at_path(&g.stats, c)))
                .collect(),
        })
        .collect()
}

// ── Filtering & sorting ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnFilter {
    /// Inclusive bounds; either may be open. Empty cells never match.
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Cell text equals one of the values. An empty list matches all rows.
    OneOf(Vec<String>),
    /// Case-insensitive substring of the cell text. Empty text matches all.
    Contains(String),
}

impl ColumnFilter {
    pub fn matches(&self, cell: &Cell) -> bool {
        match self {
            Self::Range { min, max } => {
                let Some(n) = cell.as_number() else {
                    return false;
                };
                min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m)
            }
            Self::OneOf(values) => {
                values.is_empty() || values.iter().any(|v| *v == cell.to_text())
            }
            Self::Contains(text) => {
                text.is_empty() || cell.to_text().to_lowercase().contains(&text.to_lowercase())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilterSpec {
    pub column: String,
    #[serde(flatten)]
    pub filter: ColumnFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parse `column` or `column:asc|desc`. The direction is split off the
    /// last `:` only when it names a direction, so column ids may contain
    /// colons.
    pub fn parse(s: &str) -> Self {
        if let Some((column, dir)) = s.rsplit_once(':') {
            if let Some(direction) = SortDirection::from_str(dir) {
                return Self {
                    column: column.to_string(),
                    direction,
                };
            }
        }
        Self {
            column: s.to_string(),
            direction: SortDirection::Asc,
        }
    }
}

/// Keep rows matching every filter.
pub fn filter_rows(rows: Vec<TableRow>, filters: &[ColumnFilterSpec]) -> Vec<TableRow> {
    rows.into_iter()
        .filter(|row| filters.iter().all(|f| f.filter.matches(&row.cell(&f.column))))
        .collect()
}

/// Numbers order before text; empty cells stay last in either direction.
pub fn compare_cells(a: &Cell, b: &Cell, direction: SortDirection) -> Ordering {
    let ord = match (a, b) {
        (Cell::Empty, Cell::Empty) => return Ordering::Equal,
        (Cell::Empty, _) => return Ordering::Greater,
        (_, Cell::Empty) => return Ordering::Less,
        (Cell::Number(x), Cell::Number(y)) => x.total_cmp(y),
        (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
        (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
        (Cell::Text(x), Cell::Text(y)) => compare_sv(x, y),
    };
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

/// Stable sort by one column.
pub fn sort_rows(rows: &mut [TableRow], sort: &SortSpec) {
    rows.sort_by(|a, b| compare_cells(&a.cell(&sort.column), &b.cell(&sort.column), sort.direction));
}

// ── Assembled view ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableQuery {
    /// Columns to include. Empty means every leaf column.
    pub columns: Vec<String>,
    pub filters: Vec<ColumnFilterSpec>,
    pub sort: Option<SortSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub hierarchy: Vec<CategoryNode>,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<TableRow>,
}

/// Build the full table view for `groups`.
pub fn build_table(groups: &[&ScoutGroup], query: &TableQuery) -> Table {
    let hierarchy = stats_hierarchy(groups.iter().copied());
    let mut columns = column_meta(groups, &hierarchy);
    let selected: Vec<String> = if query.columns.is_empty() {
        columns.iter().map(|c| c.id.clone()).collect()
    } else {
        query.columns.clone()
    };
    columns.retain(|c| selected.contains(&c.id));

    let mut rows = filter_rows(table_rows(groups, &selected), &query.filters);
    if let Some(sort) = &query.sort {
        sort_rows(&mut rows, sort);
    }
    Table {
        hierarchy,
        columns,
        rows,
    }
}
