use RustedDogleg::numerical::Trust_region::dogleg_config::DoglegConfig;
use RustedDogleg::numerical::Trust_region::dogleg_step::DoglegStep;
use RustedDogleg::numerical::Trust_region::trust_region_step::TrustRegionStep;
use RustedDogleg::somelinalg::normal_equations::LinearSolverKind;
use criterion::{Criterion, criterion_group, criterion_main};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use strum::IntoEnumIterator;

fn random_problem(n: usize, m: usize) -> (DMatrix<f64>, DVector<f64>, DVector<f64>) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut jacobian = DMatrix::from_fn(m, n, |_, _| rng.random_range(-1.0..1.0));
    for i in 0..n {
        jacobian[(i, i)] += 4.0;
    }
    let residuals = DVector::from_fn(m, |_, _| rng.random_range(-5.0..5.0));
    let gradient = jacobian.transpose() * &residuals;
    (jacobian, residuals, gradient)
}

// set_inputs plus one step per radius: the Gauss-Newton solve is done once per iteration
fn bench_dogleg_iteration(c: &mut Criterion) {
    let (n, m) = (50, 80);
    let (jacobian, residuals, gradient) = random_problem(n, m);
    let x = DVector::zeros(n);
    let mut group = c.benchmark_group("dogleg iteration 50x80");
    for kind in LinearSolverKind::iter() {
        let mut dogleg = DoglegStep::new(DoglegConfig::default().with_linear_solver(kind));
        if dogleg.init(n, m).is_err() {
            continue;
        }
        let mut step = DVector::zeros(n);
        group.bench_function(format!("{} solver", kind), |b| {
            b.iter(|| {
                let _ = dogleg.set_inputs(&x, &residuals, &jacobian, &gradient, -1.0);
                for radius in [0.01, 0.1, 1.0, 10.0] {
                    let _ = dogleg.compute_step(black_box(radius), &mut step);
                }
                black_box(dogleg.predicted_reduction())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dogleg_iteration);
criterion_main!(benches);
