use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use driversync::engine::plan::{apply, build_plan};
use driversync::events::NullSink;
use driversync::store::{OverlaySettings, Reputations};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::hint::black_box;

/// Half of the overlay drivers also appear in CrewChief, the rest are new on
/// each side.
fn create_sources(size: usize) -> (OverlaySettings, Reputations) {
    let tags: Vec<Value> = (0..size)
        .map(|i| {
            json!({
                "id": i + 1,
                "identifier": format!("{}", 100_000 + i),
                "name": format!("Driver {i}"),
                "tagId": if i % 3 == 0 { 2 } else { 1 },
            })
        })
        .collect();
    let overlay = OverlaySettings::from_value(json!({
        "modules": {
            "drivertagging": {
                "tagcategory": [
                    {"id": 1, "name": "Friends", "color": "#0000FF"},
                    {"id": 2, "name": "Slow", "color": "#AAAAAA"},
                    {"id": 3, "name": "CrewChief", "color": "#FF0000"}
                ],
                "drivertag": tags,
            }
        }
    }))
    .unwrap();

    let records: Vec<Value> = (size / 2..size + size / 2)
        .map(|i| json!({"customer_id": 100_000 + i, "name": format!("Driver {i}")}))
        .collect();
    let reputations = Reputations::from_value(Value::Array(records)).unwrap();

    (overlay, reputations)
}

fn benchmark_build_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_plan");
    let enabled: BTreeSet<i64> = [1, 3].into_iter().collect();

    for size in [100, 1_000, 10_000] {
        let (overlay, reputations) = create_sources(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| build_plan(black_box(&overlay), black_box(&reputations), &enabled, &NullSink))
        });
    }

    group.finish();
}

fn benchmark_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    let enabled: BTreeSet<i64> = [1, 3].into_iter().collect();
    let today = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    for size in [100, 1_000, 10_000] {
        let (overlay, reputations) = create_sources(size);
        let plan = build_plan(&overlay, &reputations, &enabled, &NullSink);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut overlay = overlay.clone();
                let mut reputations = reputations.clone();
                apply(&plan, &mut overlay, &mut reputations, 3, today);
                black_box((overlay, reputations))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_build_plan, benchmark_apply);
criterion_main!(benches);
