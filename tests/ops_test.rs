use nu_plugin_scoutstats::algo::dataset::{embedded_fixture, Dataset, VillageId};
use nu_plugin_scoutstats::algo::selection::SelectionState;
use nu_plugin_scoutstats::algo::table::{ColumnFilter, ColumnFilterSpec, SortSpec, TableQuery};
use nu_plugin_scoutstats::ops::{self, SelectOp};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn fixture() -> Dataset {
    embedded_fixture()
}

fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect()
}

#[test]
fn ops_categories_all_groups() {
    let result = ops::op_categories(&fixture(), None);
    assert_eq!(result, json!(["Kön", "Mat", "Resa", "Samtycke", "Övrigt"]));
}

#[test]
fn ops_categories_follow_selection() {
    let result = ops::op_categories(&fixture(), Some(&[202]));
    assert_eq!(result, json!(["Kön", "Mat", "Resa", "Samtycke"]));
}

#[test]
fn ops_categories_empty_selection() {
    assert_eq!(ops::op_categories(&fixture(), Some(&[])), json!([]));
}

#[test]
fn ops_participants_totals() {
    let d = fixture();
    assert_eq!(ops::op_participants(&d, None), json!({"total": 97, "groups": 4}));
    assert_eq!(
        ops::op_participants(&d, Some(&[101, 201])),
        json!({"total": 43, "groups": 2})
    );
}

#[test]
fn ops_participants_ignore_unknown_ids() {
    let result = ops::op_participants(&fixture(), Some(&[101, 999]));
    assert_eq!(result, json!({"total": 24, "groups": 1}));
}

#[test]
fn ops_aggregate_flat_category() {
    let result = ops::op_aggregate(&fixture(), None, "Kön");
    assert_eq!(result["category"], "Kön");
    assert_eq!(result["participants"], 97);
    let direct = &result["subQuestions"]["_direct"];
    assert_eq!(direct["type"], "answers");
    assert_eq!(direct["values"]["Kvinna"], json!({"name": "Kvinna", "count": 48}));
    assert_eq!(direct["values"]["Man"], json!({"name": "Man", "count": 48}));
    assert_eq!(direct["values"]["Annat"], json!({"name": "Annat", "count": 1}));
    assert_eq!(result["totals"]["_direct"], 97);
}

#[test]
fn ops_aggregate_nested_category() {
    let result = ops::op_aggregate(&fixture(), None, "Resa");
    let sub = &result["subQuestions"];

    let travel = &sub["Färdsätt"]["values"];
    assert_eq!(travel["Buss"]["count"], 53);
    assert_eq!(travel["Tåg"]["count"], 44);
    assert_eq!(travel["Annat"], json!({"name": "Annat", "count": 1, "freeTextAnswers": ["Cykel"]}));

    let arrival = &sub["Ankomsttid"];
    assert_eq!(arrival["type"], "perGroup");
    assert_eq!(arrival["values"]["101"]["name"], "08:00");
    assert_eq!(arrival["values"]["102"]["scoutGroupName"], "Alby Sjöscoutkår");
    let early = &arrival["groupedByAnswer"]["08:00"];
    assert_eq!(early["count"], 3);
    assert_eq!(
        early["scoutGroups"],
        json!(["Bromma Scoutkår", "Ängby Scoutkår", "Örby Scoutkår"])
    );
    assert_eq!(ids(&early["scoutGroupIds"]), vec![202, 201, 101]);

    // Free-text sub-questions are shown last.
    assert_eq!(result["displayOrder"], json!(["Ankomsttid", "Färdsätt"]));
    assert_eq!(result["totals"]["Ankomsttid"], 4);
}

#[test]
fn ops_aggregate_shape_decided_per_group() {
    // Group 202 reports Mat without sub-questions, the others with.
    let result = ops::op_aggregate(&fixture(), None, "Mat");
    let sub = &result["subQuestions"];
    assert_eq!(sub["Vegetarianer"]["values"]["_count"], json!({"name": "Antal", "count": 9}));
    assert_eq!(sub["_direct"]["values"]["Vegetarianer"]["count"], 2);
    let other = &sub["Allergier"]["values"]["Annat"];
    assert_eq!(other["count"], 2);
    assert_eq!(other["freeTextAnswers"], json!(["Selleri", "Senap"]));
}

#[test]
fn ops_aggregate_missing_category_is_empty() {
    let result = ops::op_aggregate(&fixture(), None, "Finns inte");
    assert_eq!(result["subQuestions"], json!({}));
    assert_eq!(result["displayOrder"], json!([]));
}

#[test]
fn ops_table_filters_and_sorts() {
    let query = TableQuery {
        columns: vec!["Resa§Ankomsttid".into(), "Kön§Man".into()],
        filters: vec![ColumnFilterSpec {
            column: "Resa§Ankomsttid".into(),
            filter: ColumnFilter::OneOf(vec!["08:00".into()]),
        }],
        sort: Some(SortSpec::parse("num_participants:desc")),
    };
    let result = ops::op_table(&fixture(), None, &query);
    let rows = result["rows"].as_array().unwrap();
    let row_ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(row_ids, vec![101, 202, 201]);
    assert_eq!(rows[0]["cells"]["Kön§Man"], 11);

    let columns: Vec<&str> = result["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(columns, vec!["Kön§Man", "Resa§Ankomsttid"]);
}

#[test]
fn ops_table_missing_leaf_is_null() {
    let query = TableQuery {
        columns: vec!["Övrigt§Kommentarer".into()],
        ..TableQuery::default()
    };
    let result = ops::op_table(&fixture(), Some(&[101, 102]), &query);
    let rows = result["rows"].as_array().unwrap();
    assert_eq!(rows[0]["cells"]["Övrigt§Kommentarer"], 1);
    assert_eq!(rows[1]["cells"]["Övrigt§Kommentarer"], Value::Null);
}

#[test]
fn ops_table_filter_spec_from_json() {
    let spec: ColumnFilterSpec =
        serde_json::from_value(json!({"column": "num_participants", "range": {"min": 21}})).unwrap();
    let query = TableQuery {
        filters: vec![spec],
        ..TableQuery::default()
    };
    let result = ops::op_table(&fixture(), None, &query);
    let row_ids: Vec<i64> = result["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(row_ids, vec![101, 102, 202]);
}

#[test]
fn ops_villages_filter() {
    let d = fixture();
    assert_eq!(ops::op_villages(&d, None).as_array().unwrap().len(), 2);
    let hits = ops::op_villages(&d, Some("bromma"));
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], "2");
    assert_eq!(hits[0]["groups"][1]["name"], "Bromma Scoutkår");
}

#[test]
fn ops_fixture_matches_embedded_dataset() {
    let value = ops::op_fixture().unwrap();
    assert_eq!(Dataset::from_value(&value), fixture());
}

#[test]
fn ops_parse_group_list() {
    assert_eq!(ops::parse_group_list("101, 102,,201").unwrap(), vec![101, 102, 201]);
    assert!(ops::parse_group_list("101,abc").is_err());
}

#[test]
fn ops_select_toggle_village() {
    let d = fixture();
    let op = SelectOp::ToggleVillage {
        village: VillageId::Int(1),
    };
    let result = ops::op_select(&d, SelectionState::default(), &op).unwrap();
    assert_eq!(ids(&result["state"]["selectedGroupIds"]), vec![101, 102]);
    assert_eq!(result["selectedCount"], 2);
    assert_eq!(result["participants"], 57);
    assert_eq!(result["villages"][0]["checkState"], "checked");
    assert_eq!(result["villages"][1]["checkState"], "unchecked");
}

#[test]
fn ops_select_partial_village() {
    let d = fixture();
    let op = SelectOp::ToggleGroup { id: 201 };
    let result = ops::op_select(&d, SelectionState::default(), &op).unwrap();
    assert_eq!(result["villages"][1]["checkState"], "indeterminate");
    assert_eq!(result["label"], Value::Null);
}

#[test]
fn ops_select_narrow_by_answer_chain() {
    let d = fixture();
    let first: SelectOp = serde_json::from_value(json!({
        "op": "narrowByAnswer",
        "category": "Samtycke",
        "subQuestion": "Fotografering",
        "answer": "Ja"
    }))
    .unwrap();
    let result = ops::op_select(&d, SelectionState::default(), &first).unwrap();
    assert_eq!(ids(&result["state"]["selectedGroupIds"]), vec![101, 201, 202]);

    let state: SelectionState = serde_json::from_value(result["state"].clone()).unwrap();
    let second = SelectOp::NarrowByAnswer {
        category: "Resa".into(),
        sub_question: "Ankomsttid".into(),
        answer: "08:00".into(),
    };
    let result = ops::op_select(&d, state, &second).unwrap();
    assert_eq!(ids(&result["state"]["selectedGroupIds"]), vec![101, 201, 202]);
    assert_eq!(result["label"], "Ja → 08:00");
    assert_eq!(result["state"]["selectionChoiceLabel"], json!(["Ja", "08:00"]));
}

#[test]
fn ops_select_narrow_by_answer_rejects_count_question() {
    let op = SelectOp::NarrowByAnswer {
        category: "Resa".into(),
        sub_question: "Färdsätt".into(),
        answer: "Buss".into(),
    };
    assert!(ops::op_select(&fixture(), SelectionState::default(), &op).is_err());
}

#[test]
fn ops_select_manual_edit_drops_label() {
    let d = fixture();
    let narrow = SelectOp::Narrow {
        ids: vec![101, 102],
        label: Some("Ja".into()),
    };
    let result = ops::op_select(&d, SelectionState::default(), &narrow).unwrap();
    assert_eq!(result["label"], "Ja");

    let state: SelectionState = serde_json::from_value(result["state"].clone()).unwrap();
    let result = ops::op_select(&d, state, &SelectOp::ToggleGroup { id: 201 }).unwrap();
    assert_eq!(result["label"], Value::Null);
    assert_eq!(ids(&result["state"]["selectedGroupIds"]), vec![101, 102, 201]);
}

#[test]
fn ops_select_all_with_filter() {
    let d = fixture();
    let op = SelectOp::SelectAll {
        filter: Some("tallmon".into()),
    };
    let result = ops::op_select(&d, SelectionState::with_groups([101]), &op).unwrap();
    assert_eq!(ids(&result["state"]["selectedGroupIds"]), vec![201, 202]);
}

#[test]
fn ops_select_expansion_round_trip() {
    let d = fixture();
    let op = SelectOp::ToggleExpansion {
        village: VillageId::Text("2".into()),
    };
    let result = ops::op_select(&d, SelectionState::default(), &op).unwrap();
    assert_eq!(result["villages"][1]["expanded"], true);
    let state: SelectionState = serde_json::from_value(result["state"].clone()).unwrap();
    let result = ops::op_select(&d, state, &op).unwrap();
    assert_eq!(result["villages"][1]["expanded"], false);
}

#[cfg(feature = "cache")]
mod cached {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cached_aggregate_matches_uncached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let path = path.to_str().unwrap();
        let d = fixture();

        let direct = ops::op_aggregate(&d, None, "Resa");
        let first = ops::op_aggregate_cached(&d, None, "Resa", Some(path));
        let second = ops::op_aggregate_cached(&d, None, "Resa", Some(path));
        assert_eq!(first, direct);
        assert_eq!(second, direct);

        let info = ops::op_cache_info(path).unwrap();
        assert_eq!(info["total"], 1);
    }

    #[test]
    fn cache_clear_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let path = path.to_str().unwrap();
        let d = fixture();

        ops::op_categories_cached(&d, None, Some(path));
        ops::op_table_cached(&d, Some(&[101]), &TableQuery::default(), Some(path));
        assert_eq!(ops::op_cache_info(path).unwrap()["total"], 2);

        let cleared = ops::op_cache_clear(path, Some("table")).unwrap();
        assert_eq!(cleared["deleted"], 1);
        assert_eq!(ops::op_cache_info(path).unwrap()["total"], 1);
        assert!(ops::op_cache_clear(path, Some("bogus")).is_err());
    }

    #[test]
    fn cached_results_follow_dataset_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let path = path.to_str().unwrap();
        let before = Dataset::from_value(&json!([{"id": 1, "name": "A", "stats": {"Resa": {"Buss": 2}}}]));
        let after = Dataset::from_value(&json!([{"id": 1, "name": "A", "stats": {"Resa": {"Buss": 5}}}]));

        let first = ops::op_aggregate_cached(&before, None, "Resa", Some(path));
        let second = ops::op_aggregate_cached(&after, None, "Resa", Some(path));
        assert_eq!(first, ops::op_aggregate(&before, None, "Resa"));
        assert_eq!(second, ops::op_aggregate(&after, None, "Resa"));
        assert_ne!(first, second);
        assert_eq!(ops::op_cache_info(path).unwrap()["total"], 2);
    }
}
