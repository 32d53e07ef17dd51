//! Group selection state and the operations that change it.
//!
//! The state is a plain value owned by the caller. Every operation mutates it
//! in place and leaves it fully consistent before returning. Any manual change
//! (toggle, clear, select all) drops the narrowing label chain; only
//! [`SelectionState::narrow_selection`] extends it.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::dataset::{GroupId, Village, VillageId};

/// Separator used when showing the narrowing label chain.
pub const LABEL_SEPARATOR: &str = " → ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionState {
    pub selected_group_ids: BTreeSet<GroupId>,
    /// Answers the selection was narrowed by, oldest first. `None` once the
    /// selection has been edited by hand.
    pub selection_choice_label: Option<Vec<String>>,
    pub expanded_village_ids: BTreeSet<VillageId>,
}

/// Tri-state checkbox of a village in the selection tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Unchecked,
    Indeterminate,
    Checked,
}

impl SelectionState {
    /// State with exactly `ids` selected and no label.
    pub fn with_groups(ids: impl IntoIterator<Item = GroupId>) -> Self {
        Self {
            selected_group_ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_selected(&self, id: GroupId) -> bool {
        self.selected_group_ids.contains(&id)
    }

    /// The selection as a hash set, the form the aggregation queries take.
    pub fn selected_set(&self) -> HashSet<GroupId> {
        self.selected_group_ids.iter().copied().collect()
    }

    pub fn toggle_group(&mut self, id: GroupId) {
        if !self.selected_group_ids.remove(&id) {
            self.selected_group_ids.insert(id);
        }
        self.selection_choice_label = None;
    }

    /// Deselect the village's groups if all of them are selected, otherwise
    /// select all of them. Unknown villages leave the state untouched.
    pub fn toggle_village(&mut self, villages: &[Village], village_id: &VillageId) {
        let Some(village) = villages.iter().find(|v| &v.id == village_id) else {
            return;
        };
        self.toggle_village_groups(village);
    }

    /// [`toggle_village`](Self::toggle_village) for a village already in hand.
    pub fn toggle_village_groups(&mut self, village: &Village) {
        if self.is_fully_selected(village) {
            for id in village.group_ids() {
                self.selected_group_ids.remove(&id);
            }
        } else {
            self.selected_group_ids.extend(village.group_ids());
        }
        self.selection_choice_label = None;
    }

    pub fn clear_selection(&mut self) {
        self.selected_group_ids.clear();
        self.selection_choice_label = None;
    }

    /// Replace the selection with every group of `villages`, usually the
    /// villages left after a search filter.
    pub fn select_all<'a>(&mut self, villages: impl IntoIterator<Item = &'a Village>) {
        self.selected_group_ids = villages
            .into_iter()
            .flat_map(|v| v.group_ids())
            .collect();
        self.selection_choice_label = None;
    }

    /// Drill down to `ids`. An empty selection is replaced by `ids`; a
    /// non-empty one is intersected with it. A non-empty `label` is appended
    /// to the label chain.
    pub fn narrow_selection(&mut self, ids: impl IntoIterator<Item = GroupId>, label: Option<&str>) {
        let ids: BTreeSet<GroupId> = ids.into_iter().collect();
        if self.selected_group_ids.is_empty() {
            self.selected_group_ids = ids;
        } else {
            self.selected_group_ids.retain(|id| ids.contains(id));
        }

        if let Some(label) = label.filter(|l| !l.is_empty()) {
            self.selection_choice_label
                .get_or_insert_with(Vec::new)
                .push(label.to_string());
        }
    }

    /// True when every group of the village is selected. Vacuously true for
    /// a village without groups.
    pub fn is_fully_selected(&self, village: &Village) -> bool {
        village.group_ids().all(|id| self.is_selected(id))
    }

    /// True when some, but not all, of the village's groups are selected.
    pub fn is_partially_selected(&self, village: &Village) -> bool {
        village.group_ids().any(|id| self.is_selected(id)) && !self.is_fully_selected(village)
    }

    pub fn village_check_state(&self, village: &Village) -> CheckState {
        if village.scout_groups.is_empty() {
            CheckState::Unchecked
        } else if self.is_fully_selected(village) {
            CheckState::Checked
        } else if self.is_partially_selected(village) {
            CheckState::Indeterminate
        } else {
            CheckState::Unchecked
        }
    }

    pub fn toggle_village_expansion(&mut self, village_id: &VillageId) {
        if !self.expanded_village_ids.remove(village_id) {
            self.expanded_village_ids.insert(village_id.clone());
        }
    }

    pub fn is_expanded(&self, village_id: &VillageId) -> bool {
        self.expanded_village_ids.contains(village_id)
    }

    /// The label chain as shown to the user, e.g. `"Ja → 08:00"`.
    pub fn choice_label_display(&self) -> Option<String> {
        self.selection_choice_label
            .as_ref()
            .map(|chain| chain.join(LABEL_SEPARATOR))
    }
}

/// Villages matching a search term: the village name or any of its group
/// names contains `term`, ignoring case. An empty term keeps every village.
pub fn filter_villages<'a>(villages: &'a [Village], term: &str) -> Vec<&'a Village> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return villages.iter().collect();
    }
    villages
        .iter()
        .filter(|v| {
            v.name.to_lowercase().contains(&needle)
                || v.scout_groups
                    .iter()
                    .any(|g| g.name.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::dataset::{embedded_fixture, Dataset};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn village(id: i64, groups: &[GroupId]) -> Village {
        let groups: Vec<_> = groups
            .iter()
            .map(|g| json!({"id": g, "name": format!("Kår {g}")}))
            .collect();
        let d = Dataset::from_value(&json!({
            "villages": [{"id": id, "name": format!("By {id}"), "scoutGroups": groups}]
        }));
        d.villages.into_iter().next().unwrap()
    }

    fn ids(state: &SelectionState) -> Vec<GroupId> {
        state.selected_group_ids.iter().copied().collect()
    }

    #[test]
    fn narrowing_chain() {
        let mut s = SelectionState::default();
        s.narrow_selection([1, 2, 3], Some("Ja"));
        assert_eq!(ids(&s), vec![1, 2, 3]);
        assert_eq!(s.selection_choice_label, Some(vec!["Ja".to_string()]));

        s.narrow_selection([2, 3, 4], Some("08:00"));
        assert_eq!(ids(&s), vec![2, 3]);
        assert_eq!(
            s.selection_choice_label,
            Some(vec!["Ja".to_string(), "08:00".to_string()])
        );
        assert_eq!(s.choice_label_display().as_deref(), Some("Ja → 08:00"));
    }

    #[test]
    fn narrowing_without_label_keeps_chain() {
        let mut s = SelectionState::default();
        s.narrow_selection([1, 2], Some("Ja"));
        s.narrow_selection([2], None);
        s.narrow_selection([2], Some(""));
        assert_eq!(ids(&s), vec![2]);
        assert_eq!(s.choice_label_display().as_deref(), Some("Ja"));
    }

    #[test]
    fn narrowing_to_disjoint_set_empties_selection() {
        let mut s = SelectionState::with_groups([1, 2]);
        s.narrow_selection([3], Some("Nej"));
        assert!(s.selected_group_ids.is_empty());
        // The next narrowing starts over from the candidate set.
        s.narrow_selection([5, 6], None);
        assert_eq!(ids(&s), vec![5, 6]);
    }

    #[test]
    fn toggle_group_flips_and_clears_label() {
        let mut s = SelectionState::default();
        s.narrow_selection([1], Some("Ja"));
        s.toggle_group(2);
        assert_eq!(ids(&s), vec![1, 2]);
        assert_eq!(s.selection_choice_label, None);
        s.toggle_group(1);
        assert_eq!(ids(&s), vec![2]);
    }

    #[test]
    fn partial_village_toggle_fills_remainder() {
        let v = village(1, &[1, 2, 3]);
        let mut s = SelectionState::with_groups([1, 2]);
        assert!(s.is_partially_selected(&v));
        s.toggle_village_groups(&v);
        assert_eq!(ids(&s), vec![1, 2, 3]);
        s.toggle_village_groups(&v);
        assert!(s.selected_group_ids.is_empty());
    }

    #[test]
    fn village_toggle_leaves_other_villages() {
        let d = embedded_fixture();
        let mut s = SelectionState::with_groups([201]);
        s.narrow_selection([201], Some("Ja"));
        s.toggle_village(&d.villages, &VillageId::Int(1));
        assert_eq!(ids(&s), vec![101, 102, 201]);
        assert_eq!(s.selection_choice_label, None);
    }

    #[test]
    fn unknown_village_is_noop() {
        let d = embedded_fixture();
        let mut s = SelectionState::default();
        s.narrow_selection([101], Some("Ja"));
        let before = s.clone();
        s.toggle_village(&d.villages, &VillageId::Text("saknas".into()));
        assert_eq!(s, before);
    }

    #[test]
    fn clear_and_select_all() {
        let d = embedded_fixture();
        let mut s = SelectionState::default();
        s.narrow_selection([101], Some("Ja"));
        s.select_all(&d.villages);
        assert_eq!(ids(&s), vec![101, 102, 201, 202]);
        assert_eq!(s.selection_choice_label, None);

        s.select_all(filter_villages(&d.villages, "tallmon"));
        assert_eq!(ids(&s), vec![201, 202]);

        s.clear_selection();
        assert!(s.selected_group_ids.is_empty());
    }

    #[test]
    fn check_states() {
        let v = village(1, &[1, 2]);
        let empty = village(2, &[]);
        let mut s = SelectionState::default();
        assert_eq!(s.village_check_state(&v), CheckState::Unchecked);
        s.toggle_group(1);
        assert_eq!(s.village_check_state(&v), CheckState::Indeterminate);
        s.toggle_group(2);
        assert_eq!(s.village_check_state(&v), CheckState::Checked);
        assert!(!s.is_partially_selected(&v));

        assert!(s.is_fully_selected(&empty));
        assert_eq!(s.village_check_state(&empty), CheckState::Unchecked);
    }

    #[test]
    fn expansion_toggles() {
        let mut s = SelectionState::default();
        let id = VillageId::Int(1);
        s.toggle_village_expansion(&id);
        assert!(s.is_expanded(&id));
        s.toggle_village_expansion(&id);
        assert!(!s.is_expanded(&id));
    }

    #[test]
    fn filter_matches_village_or_group_names() {
        let d = embedded_fixture();
        let names = |term: &str| -> Vec<String> {
            filter_villages(&d.villages, term)
                .into_iter()
                .map(|v| v.name.clone())
                .collect()
        };
        assert_eq!(names(""), vec!["Byn Ekbacken", "Byn Tallmon"]);
        assert_eq!(names("EKBACK"), vec!["Byn Ekbacken"]);
        assert_eq!(names("bromma"), vec!["Byn Tallmon"]);
        assert_eq!(names("örby"), vec!["Byn Ekbacken"]);
        assert!(names("Göteborg").is_empty());
    }

    #[test]
    fn state_serde_uses_camel_case() {
        let mut s = SelectionState::with_groups([2, 1]);
        s.narrow_selection([1], Some("Ja"));
        s.toggle_village_expansion(&VillageId::Text("all".into()));
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(
            v,
            json!({
                "selectedGroupIds": [1],
                "selectionChoiceLabel": ["Ja"],
                "expandedVillageIds": ["all"]
            })
        );
        let back: SelectionState = serde_json::from_value(v).unwrap();
        assert_eq!(back, s);

        let partial: SelectionState = serde_json::from_value(json!({"selectedGroupIds": [3]})).unwrap();
        assert_eq!(partial, SelectionState::with_groups([3]));
    }

    proptest! {
        #[test]
        fn narrowing_never_grows_selection(
            start in proptest::collection::btree_set(0i64..50, 1..20),
            candidates in proptest::collection::vec(0i64..50, 0..30),
        ) {
            let mut s = SelectionState::with_groups(start.iter().copied());
            s.narrow_selection(candidates.iter().copied(), Some("x"));
            prop_assert!(s.selected_group_ids.is_subset(&start));
            for id in &s.selected_group_ids {
                prop_assert!(candidates.contains(id));
            }
        }
    }
}
