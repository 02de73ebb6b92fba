#![forbid(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use doublets::{Flow, HeapMemory, LinksExt, LinksOptions, MemoryLinks};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const POPULATION: u64 = 10_000;

fn populated(points: u64) -> MemoryLinks<u64, HeapMemory> {
    let mut links = MemoryLinks::open(
        HeapMemory::new(),
        LinksOptions::new().reservation_links::<u64>(points * 2),
    )
    .expect("open store");
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..points {
        links.create_point().expect("point");
    }
    for _ in 0..points {
        let source = rng.gen_range(1..=points);
        let target = rng.gen_range(1..=points);
        links.create_and_update(source, target).expect("link");
    }
    links
}

fn micro_links(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/links");
    group.sample_size(30);

    group.throughput(Throughput::Elements(1));
    group.bench_function("create_update_delete", |b| {
        let mut links = populated(POPULATION);
        b.iter(|| {
            let index = links.create_and_update(1, 2).expect("create");
            links.delete_link(black_box(index)).expect("delete");
        });
    });

    let links = populated(POPULATION);
    let any = links.constants().any;
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    group.bench_function("search", |b| {
        b.iter(|| {
            let source = rng.gen_range(1..=POPULATION);
            let target = rng.gen_range(1..=POPULATION);
            black_box(links.search(source, target).expect("search"))
        });
    });
    group.bench_function("count_usages", |b| {
        b.iter(|| {
            let value = rng.gen_range(1..=POPULATION);
            black_box(links.count(&[any, value]).expect("count"))
        });
    });

    for shape in ["source", "target"] {
        group.bench_with_input(BenchmarkId::new("each", shape), &shape, |b, &shape| {
            b.iter(|| {
                let value = rng.gen_range(1..=POPULATION);
                let restriction = match shape {
                    "source" => [any, value, any],
                    _ => [any, any, value],
                };
                let mut visited = 0u64;
                links
                    .each(&restriction, |_| {
                        visited += 1;
                        Flow::Continue
                    })
                    .expect("each");
                black_box(visited)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, micro_links);
criterion_main!(benches);
