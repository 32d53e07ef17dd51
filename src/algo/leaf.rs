//! Classification of the raw values found in a group's `stats` payload.
//!
//! Payloads have no fixed schema. Every value is reconstructed into a
//! [`Leaf`] at the aggregation boundary so the aggregator can match over a
//! closed set of shapes instead of inspecting JSON types ad hoc.

use serde_json::{Map, Value};

/// Semantic kind of one payload value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Empty,
    Number,
    Text,
    TextList,
    SubMap,
}

/// A payload value viewed through its semantic kind, borrowing from the
/// underlying JSON.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leaf<'a> {
    /// `null`, booleans and anything else without meaning as survey data.
    Empty,
    /// A direct count.
    Number(f64),
    /// One free-text or categorical answer owned by a single group.
    Text(&'a str),
    /// Free-text answers, one count per element.
    TextList(&'a [Value]),
    /// A sub-question whose keys are answer options.
    SubMap(&'a Map<String, Value>),
}

impl<'a> Leaf<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Null | Value::Bool(_) => Self::Empty,
            Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Empty),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::TextList(items),
            Value::Object(map) => Self::SubMap(map),
        }
    }

    pub fn kind(&self) -> LeafKind {
        match self {
            Self::Empty => LeafKind::Empty,
            Self::Number(_) => LeafKind::Number,
            Self::Text(_) => LeafKind::Text,
            Self::TextList(_) => LeafKind::TextList,
            Self::SubMap(_) => LeafKind::SubMap,
        }
    }
}

/// Classify a single raw value. Total over every JSON value.
pub fn classify(value: &Value) -> LeafKind {
    Leaf::from_value(value).kind()
}

/// A category payload has sub-questions when at least one of its values is
/// a nested map. Arrays, numbers and strings do not count.
pub fn category_has_sub_questions(payload: &Map<String, Value>) -> bool {
    payload
        .values()
        .any(|v| classify(v) == LeafKind::SubMap)
}

/// Render one free-text list element. Strings are kept verbatim, any other
/// element keeps its JSON text so it still counts as an answer.
pub fn free_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
