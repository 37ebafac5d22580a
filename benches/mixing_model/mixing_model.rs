use criterion::{criterion_group, criterion_main, Criterion};
use seirmix::{run_multiple, EntitySpec, MemorySaver, SeirMixingModel};

static POPULATION: usize = 10_000;
static SEED: u64 = 123;
static DAYS: usize = 100;

fn model() -> SeirMixingModel {
    let entities: Vec<EntitySpec> = (0..4)
        .map(|group| EntitySpec::with_size(format!("group-{group}"), POPULATION / 4))
        .collect();
    #[rustfmt::skip]
    let contact_matrix = vec![
        0.70, 0.10, 0.10, 0.10,
        0.10, 0.70, 0.10, 0.10,
        0.10, 0.10, 0.70, 0.10,
        0.10, 0.10, 0.10, 0.70,
    ];
    SeirMixingModel::new(
        "flu",
        POPULATION,
        0.01,
        4.0,
        0.2,
        5.0,
        0.15,
        contact_matrix,
        &entities,
    )
    .expect("failed to build the benchmark model")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let template = model();

    c.bench_function("mixing model single run", |bencher| {
        bencher.iter_with_large_drop(|| {
            let mut model = template.clone();
            model.run(DAYS, SEED).expect("run failed");
            model
        });
    });

    c.bench_function("mixing model 8 replicates on 4 threads", |bencher| {
        bencher.iter(|| {
            let saver = MemorySaver::new();
            run_multiple(&template, DAYS, 8, SEED, &saver, true, 4).expect("batch failed");
            saver
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
