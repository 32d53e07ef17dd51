//! Category aggregation: fold one category's payload across the selected
//! groups into a presentation-ready breakdown.
//!
//! The result is rebuilt from scratch on every call. Nothing here fails:
//! absent categories, non-object payloads and unrecognised value shapes are
//! skipped.
//!
//! Routing of each payload entry, decided per group:
//!
//! | value      | sub-question key                | answer key             |
//! |------------|---------------------------------|------------------------|
//! | nested map | entry key                       | each nested key        |
//! | number     | entry key, or `_direct` if flat | `_count`, or entry key |
//! | string     | entry key (per-group)           | group id               |
//! | array      | entry key                       | `_text`                |

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use super::catalog::selected_groups;
use super::dataset::{serialize_count, GroupId, ScoutGroup, Village};
use super::grouping::{group_by_answer, GroupedAnswer, PerGroupAnswer};
use super::leaf::{category_has_sub_questions, free_text, Leaf};

/// Sub-question collecting the bare counts of a flat category.
pub const DIRECT_SUB_QUESTION: &str = "_direct";
/// Answer holding a bare count placed beside sub-questions.
pub const COUNT_ANSWER: &str = "_count";
pub const COUNT_ANSWER_NAME: &str = "Antal";
/// Answer collecting a free-text list placed directly in the category.
pub const TEXT_ANSWER: &str = "_text";
pub const TEXT_ANSWER_NAME: &str = "Svar";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerValue {
    pub name: String,
    #[serde(serialize_with = "serialize_count")]
    pub count: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_text_answers: Option<Vec<String>>,
}

impl AnswerValue {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: 0.0,
            free_text_answers: None,
        }
    }

    fn add_free_text(&mut self, items: &[Value]) {
        self.count += items.len() as f64;
        self.free_text_answers
            .get_or_insert_with(Vec::new)
            .extend(items.iter().map(free_text));
    }
}

/// The kind of a sub-question is fixed by the first contribution that
/// creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubQuestionKind {
    Answers,
    PerGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SubQuestion {
    /// Answer options with summed counts.
    Answers { values: IndexMap<String, AnswerValue> },
    /// One string answer per contributing group, plus the answer → groups
    /// index built after all groups are folded.
    #[serde(rename_all = "camelCase")]
    PerGroup {
        values: IndexMap<GroupId, PerGroupAnswer>,
        grouped_by_answer: IndexMap<String, GroupedAnswer>,
    },
}

impl SubQuestion {
    pub fn kind(&self) -> SubQuestionKind {
        match self {
            Self::Answers { .. } => SubQuestionKind::Answers,
            Self::PerGroup { .. } => SubQuestionKind::PerGroup,
        }
    }

    /// True when any answer carries at least one free-text item.
    pub fn has_free_text(&self) -> bool {
        match self {
            Self::Answers { values } => values.values().any(|v| {
                v.free_text_answers
                    .as_ref()
                    .map(|t| !t.is_empty())
                    .unwrap_or(false)
            }),
            Self::PerGroup { .. } => false,
        }
    }

    /// Sum of answer counts, or number of contributing groups for per-group
    /// sub-questions.
    pub fn total(&self) -> f64 {
        match self {
            Self::Answers { values } => values.values().map(|v| v.count).sum(),
            Self::PerGroup { values, .. } => values.len() as f64,
        }
    }

    pub fn answers(&self) -> Option<&IndexMap<String, AnswerValue>> {
        match self {
            Self::Answers { values } => Some(values),
            Self::PerGroup { .. } => None,
        }
    }

    pub fn grouped_by_answer(&self) -> Option<&IndexMap<String, GroupedAnswer>> {
        match self {
            Self::PerGroup {
                grouped_by_answer, ..
            } => Some(grouped_by_answer),
            Self::Answers { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub sub_questions: IndexMap<String, SubQuestion>,
}

impl Aggregation {
    /// Sub-questions for display: encounter order, except that those with
    /// free-text answers move after those without.
    pub fn ordered_sub_questions(&self) -> Vec<(&str, &SubQuestion)> {
        let mut entries: Vec<(&str, &SubQuestion)> = self
            .sub_questions
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        entries.sort_by_key(|(_, sq)| sq.has_free_text());
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.sub_questions.is_empty()
    }
}

/// Aggregate `category` over every selected group.
///
/// Groups are visited in village order, then group order, which fixes the
/// order of free-text answers and of first-seen keys.
pub fn aggregate(villages: &[Village], selected: &HashSet<GroupId>, category: &str) -> Aggregation {
    let mut acc = Accumulator::default();
    for group in selected_groups(villages, selected) {
        if let Some(Value::Object(payload)) = group.stats.get(category) {
            acc.fold_group(group, payload);
        }
    }
    acc.finish()
}

#[derive(Default)]
struct Accumulator {
    sub_questions: IndexMap<String, SubQuestion>,
}

impl Accumulator {
    fn fold_group(&mut self, group: &ScoutGroup, payload: &Map<String, Value>) {
        // Re-derived per group: groups may disagree on the category's shape.
        let has_sub = category_has_sub_questions(payload);
        for (key, value) in payload {
            match Leaf::from_value(value) {
                Leaf::SubMap(nested) => self.fold_nested(key, nested),
                Leaf::Number(n) => self.fold_count(key, n, has_sub),
                Leaf::Text(answer) => self.fold_per_group(key, group, answer),
                Leaf::TextList(items) => self.fold_text_list(key, items),
                Leaf::Empty => {}
            }
        }
    }

    fn fold_nested(&mut self, key: &str, nested: &Map<String, Value>) {
        let Some(values) = self.answers_mut(key) else {
            return;
        };
        for (answer_key, answer_value) in nested {
            match Leaf::from_value(answer_value) {
                Leaf::Number(n) => {
                    values
                        .entry(answer_key.clone())
                        .or_insert_with(|| AnswerValue::new(answer_key))
                        .count += n;
                }
                Leaf::TextList(items) => {
                    values
                        .entry(answer_key.clone())
                        .or_insert_with(|| AnswerValue::new(answer_key))
                        .add_free_text(items);
                }
                Leaf::Empty | Leaf::Text(_) | Leaf::SubMap(_) => {}
            }
        }
    }

    fn fold_count(&mut self, key: &str, n: f64, has_sub: bool) {
        let (sub_key, answer_key, answer_name) = if has_sub {
            (key, COUNT_ANSWER, COUNT_ANSWER_NAME)
        } else {
            (DIRECT_SUB_QUESTION, key, key)
        };
        if let Some(values) = self.answers_mut(sub_key) {
            values
                .entry(answer_key.to_string())
                .or_insert_with(|| AnswerValue::new(answer_name))
                .count += n;
        }
    }

    fn fold_per_group(&mut self, key: &str, group: &ScoutGroup, answer: &str) {
        let entry = self
            .sub_questions
            .entry(key.to_string())
            .or_insert_with(|| SubQuestion::PerGroup {
                values: IndexMap::new(),
                grouped_by_answer: IndexMap::new(),
            });
        if let SubQuestion::PerGroup { values, .. } = entry {
            values.insert(
                group.id,
                PerGroupAnswer {
                    name: answer.to_string(),
                    scout_group_name: group.name.clone(),
                },
            );
        }
    }

    fn fold_text_list(&mut self, key: &str, items: &[Value]) {
        if let Some(values) = self.answers_mut(key) {
            values
                .entry(TEXT_ANSWER.to_string())
                .or_insert_with(|| AnswerValue::new(TEXT_ANSWER_NAME))
                .add_free_text(items);
        }
    }

    /// Answer map of an `Answers` sub-question, created on first use. `None`
    /// when the key is already taken by a per-group sub-question; such
    /// contributions are dropped.
    fn answers_mut(&mut self, key: &str) -> Option<&mut IndexMap<String, AnswerValue>> {
        let entry = self
            .sub_questions
            .entry(key.to_string())
            .or_insert_with(|| SubQuestion::Answers {
                values: IndexMap::new(),
            });
        match entry {
            SubQuestion::Answers { values } => Some(values),
            SubQuestion::PerGroup { .. } => None,
        }
    }

    fn finish(mut self) -> Aggregation {
        for sub_question in self.sub_questions.values_mut() {
            if let SubQuestion::PerGroup {
                values,
                grouped_by_answer,
            } = sub_question
            {
                *grouped_by_answer = group_by_answer(values);
            }
        }
        Aggregation {
            sub_questions: self.sub_questions,
        }
    }
}
