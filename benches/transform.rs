use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{arr0, Array1};
use noncentered::{eight_schools, CpuLogpFunc, NonCenteredGaussian, Operand, Parametrization};
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

fn raw_draws(n: usize) -> Vec<f64> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    (0..n)
        .map(|_| {
            let draw: f64 = StandardNormal.sample(&mut rng);
            draw
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let transform = NonCenteredGaussian::default();

    for n in [10, 1000, 100_000] {
        let raw = raw_draws(n);
        let loc = raw_draws(n);
        let mut out = vec![0f64; n];

        c.bench_function(&format!("transform_into scalar {}", n), |b| {
            b.iter(|| {
                transform
                    .transform_into(
                        black_box(&raw),
                        Operand::Scalar(1.5),
                        Operand::Scalar(0.3),
                        &mut out,
                    )
                    .unwrap();
            })
        });

        c.bench_function(&format!("transform_into slice {}", n), |b| {
            b.iter(|| {
                transform
                    .transform_into(
                        black_box(&raw),
                        Operand::Slice(&loc),
                        Operand::Scalar(0.3),
                        &mut out,
                    )
                    .unwrap();
            })
        });

        let raw = Array1::from(raw);
        c.bench_function(&format!("transform array {}", n), |b| {
            b.iter(|| {
                transform
                    .transform(black_box(&raw), &arr0(1.5), &arr0(0.3))
                    .unwrap()
            })
        });
    }

    for parametrization in [Parametrization::Centered, Parametrization::NonCentered] {
        let model = eight_schools(parametrization).unwrap();
        let mut density = model.density();
        let position = vec![0.5f64; model.dim()];
        let mut grad = vec![0f64; model.dim()];
        c.bench_function(&format!("eight schools logp {:?}", parametrization), |b| {
            b.iter(|| density.logp(black_box(&position), &mut grad).unwrap())
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
