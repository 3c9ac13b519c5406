use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mapplz::{LatLng, MapStore, standardize};
use serde_json::{Value, json};

fn sample_points(n: usize) -> Value {
    let points: Vec<Value> = (0..n)
        .map(|i| {
            let lat = 40.7128 + (i as f64 * 0.0001);
            let lng = -74.0060 + (i as f64 * 0.0001);
            json!([lat, lng, {"id": i, "label": format!("point {}", i)}])
        })
        .collect();
    Value::Array(points)
}

fn sample_csv(n: usize) -> String {
    let mut text = String::from("lat,lng,label\n");
    for i in 0..n {
        text.push_str(&format!(
            "{},{},row {}\n",
            40.7128 + (i as f64 * 0.0001),
            -74.0060 + (i as f64 * 0.0001),
            i
        ));
    }
    text
}

fn benchmark_ingestion(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingestion");

    for size in [100, 1000] {
        let points = sample_points(size);
        group.bench_with_input(BenchmarkId::new("json_points", size), &points, |b, input| {
            b.iter(|| standardize(black_box(input.clone()), false).unwrap())
        });

        let csv = sample_csv(size);
        group.bench_with_input(BenchmarkId::new("csv_rows", size), &csv, |b, input| {
            b.iter(|| standardize(black_box(input.as_str()), false).unwrap())
        });
    }

    let wkt = "POLYGON((-72 38, -68 38, -68 42, -72 42, -72 38))";
    group.bench_function("wkt_polygon", |b| {
        b.iter(|| standardize(black_box(wkt), false).unwrap())
    });

    group.finish();
}

fn benchmark_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    let mut store = MapStore::new();
    store.add(sample_points(10_000)).unwrap();

    group.bench_function("filter_two_conditions", |b| {
        b.iter(|| {
            store
                .query(black_box(Some("lat > 40.8 AND lng < -73.5")), None)
                .unwrap()
        })
    });

    let origin = LatLng::new(40.75, -73.95);
    for limit in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::new("near", limit), &limit, |b, &limit| {
            b.iter(|| store.near(black_box(origin), black_box(limit)).unwrap())
        });
    }

    let ring: Vec<LatLng> = [
        [40.70, -74.02],
        [40.70, -73.90],
        [40.80, -73.90],
        [40.80, -74.02],
        [40.70, -74.02],
    ]
    .into_iter()
    .map(LatLng::from)
    .collect();
    group.bench_function("inside_ring", |b| {
        b.iter(|| store.inside(black_box(&ring)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, benchmark_ingestion, benchmark_queries);
criterion_main!(benches);
