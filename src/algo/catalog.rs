//! Queries over the current selection: which groups, which categories, how
//! many participants.

use std::collections::{BTreeSet, HashSet};

use super::dataset::{GroupId, ScoutGroup, Village};

/// Selected groups in village order, then group order within each village.
pub fn selected_groups<'a>(
    villages: &'a [Village],
    selected: &'a HashSet<GroupId>,
) -> impl Iterator<Item = &'a ScoutGroup> + 'a {
    villages
        .iter()
        .flat_map(|v| v.scout_groups.iter())
        .filter(move |g| selected.contains(&g.id))
}

/// Every category name present in any selected group's `stats`,
/// deduplicated and sorted by plain code point order.
pub fn list_categories(villages: &[Village], selected: &HashSet<GroupId>) -> Vec<String> {
    selected_groups(villages, selected)
        .flat_map(|g| g.stats.keys().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Sum of `num_participants` over the selected groups. Missing or
/// non-numeric counts add nothing.
pub fn total_participants(villages: &[Village], selected: &HashSet<GroupId>) -> f64 {
    selected_groups(villages, selected)
        .map(ScoutGroup::participants)
        .sum()
}
