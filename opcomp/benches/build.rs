//! Component build benchmarks.
//!
//! Compares in-core and disk-staged builds across system sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use opcomp::dense::{DenseBlock, DenseBlockOperator, SiteBasis, StateInfo};
use opcomp::kinds::{CreCreDes, CreDes};
use opcomp::{
    BuildStrategy, ComponentConfig, ComponentRegistry, OperatorComponent, OperatorComponentBase,
};

fn bench_build_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_strategies");
    group.sample_size(20);
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = ComponentRegistry::new();

    for &orbitals in &[4usize, 6, 8] {
        let basis = SiteBasis::full(orbitals, StateInfo::new(vec![4, 4, 2]));
        group.throughput(Throughput::Elements((orbitals * orbitals * orbitals) as u64));

        for strategy in [BuildStrategy::InCore, BuildStrategy::OutOfCore] {
            group.bench_with_input(
                BenchmarkId::new(format!("{strategy:?}"), orbitals),
                &basis,
                |b, basis| {
                    b.iter(|| {
                        let mut component = OperatorComponent::<CreCreDes, DenseBlockOperator>::new(
                            &registry,
                            ComponentConfig::default().with_staging_dir(dir.path()),
                        );
                        component.build_with(basis, strategy).expect("build");
                        black_box(component.global_count())
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_renormalise(c: &mut Criterion) {
    let mut group = c.benchmark_group("renormalise");
    let registry = ComponentRegistry::new();
    let state_info = StateInfo::new(vec![16, 16]);
    let basis = SiteBasis::full(8, state_info.clone());
    let rotations = vec![DenseBlock::identity(16), DenseBlock::identity(16)];

    let mut component =
        OperatorComponent::<CreDes, DenseBlockOperator>::new(&registry, ComponentConfig::default());
    component.build(&basis).expect("build");

    group.bench_function("credes_identity", |b| {
        b.iter(|| {
            component
                .renormalise_transform(black_box(&rotations), &state_info)
                .expect("transform")
        })
    });

    group.finish();
}

criterion_group!(benches, bench_build_strategies, bench_renormalise);
criterion_main!(benches);
