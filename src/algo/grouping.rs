//! Drill-down index for per-group sub-questions: each distinct answer maps to
//! the groups that gave it, names in Swedish order with their ids aligned.

use indexmap::IndexMap;
use serde::Serialize;

use super::collate::compare_sv;
use super::dataset::GroupId;

/// One group's string answer to a per-group sub-question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerGroupAnswer {
    /// The answer text.
    pub name: String,
    pub scout_group_name: String,
}

/// All groups that gave the same answer.
///
/// `scout_groups` is sorted with Swedish collation and `scout_group_ids[i]`
/// is always the id of `scout_groups[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedAnswer {
    pub count: usize,
    pub scout_groups: Vec<String>,
    pub scout_group_ids: Vec<GroupId>,
}

/// Invert per-group answers into an answer → groups index, answers in first
/// encounter order.
pub fn group_by_answer(values: &IndexMap<GroupId, PerGroupAnswer>) -> IndexMap<String, GroupedAnswer> {
    let mut grouped: IndexMap<String, Vec<(&str, GroupId)>> = IndexMap::new();
    for (&group_id, answer) in values {
        grouped
            .entry(answer.name.clone())
            .or_default()
            .push((answer.scout_group_name.as_str(), group_id));
    }

    grouped
        .into_iter()
        .map(|(answer, mut members)| {
            // Stable: groups sharing a name keep their encounter order.
            members.sort_by(|(a, _), (b, _)| compare_sv(a, b));
            let count = members.len();
            let (scout_groups, scout_group_ids): (Vec<String>, Vec<GroupId>) = members
                .into_iter()
                .map(|(name, id)| (name.to_string(), id))
                .unzip();
            let grouped = GroupedAnswer {
                count,
                scout_groups,
                scout_group_ids,
            };
            (answer, grouped)
        })
        .collect()
}
