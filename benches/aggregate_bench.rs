use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nu_plugin_scoutstats::algo::dataset::{Dataset, GroupId};
use nu_plugin_scoutstats::algo::{aggregate, catalog, selection::SelectionState, table};
use serde_json::{json, Value};
use std::collections::HashSet;

const ARRIVALS: [&str; 4] = ["08:00", "09:30", "10:30", "13:00"];
const NAMES: [&str; 6] = ["Örby", "Alby", "Ängby", "Bromma", "Åkersberga", "Eskilstuna"];

/// Synthetic dataset: `villages` villages with ten groups each.
fn generate_dataset(villages: usize) -> Dataset {
    let villages: Vec<Value> = (0..villages)
        .map(|v| {
            let groups: Vec<Value> = (0..10)
                .map(|g| {
                    let id = (v * 100 + g) as i64;
                    json!({
                        "id": id,
                        "name": format!("{} Scoutkår {id}", NAMES[(v + g) % NAMES.len()]),
                        "num_participants": 10 + (id % 30),
                        "stats": {
                            "Kön": {"Kvinna": id % 13, "Man": id % 11, "Annat": id % 2},
                            "Resa": {
                                "Färdsätt": {"Buss": id % 17, "Tåg": id % 7, "Annat": ["Cykel"]},
                                "Ankomsttid": ARRIVALS[g % ARRIVALS.len()]
                            },
                            "Mat": {
                                "Allergier": {"Gluten": id % 3, "Laktos": id % 5},
                                "Vegetarianer": id % 9
                            },
                            "Övrigt": {"Kommentarer": [format!("kommentar {id}")]}
                        }
                    })
                })
                .collect();
            json!({"id": v, "name": format!("Byn {v}"), "scoutGroups": groups})
        })
        .collect();
    Dataset::from_value(&json!({ "villages": villages }))
}

fn all_ids(dataset: &Dataset) -> HashSet<GroupId> {
    dataset.groups().map(|g| g.id).collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    for size in [10, 100, 500] {
        let dataset = generate_dataset(size);
        let selected = all_ids(&dataset);
        group.bench_with_input(BenchmarkId::from_parameter(size * 10), &dataset, |b, d| {
            b.iter(|| black_box(aggregate::aggregate(&d.villages, &selected, "Resa")))
        });
    }
    group.finish();
}

fn bench_categories(c: &mut Criterion) {
    let dataset = generate_dataset(100);
    let selected = all_ids(&dataset);
    c.bench_function("categories/1000_groups", |b| {
        b.iter(|| black_box(catalog::list_categories(&dataset.villages, &selected)))
    });
}

fn bench_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("table");
    group.sample_size(20);
    for size in [10, 100] {
        let dataset = generate_dataset(size);
        let groups: Vec<_> = dataset.groups().collect();
        let query = table::TableQuery {
            sort: Some(table::SortSpec::parse("Resa§Ankomsttid:desc")),
            ..table::TableQuery::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(size * 10), &groups, |b, g| {
            b.iter(|| black_box(table::build_table(g, &query)))
        });
    }
    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let dataset = generate_dataset(100);
    c.bench_function("selection/toggle_every_village", |b| {
        b.iter(|| {
            let mut state = SelectionState::default();
            for village in &dataset.villages {
                state.toggle_village_groups(village);
            }
            black_box(state.selected_group_ids.len())
        })
    });
}

criterion_group!(
    benches,
    bench_aggregate,
    bench_categories,
    bench_table,
    bench_selection,
);
criterion_main!(benches);
