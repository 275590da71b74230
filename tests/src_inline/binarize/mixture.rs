use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal as SampleNormal};

use super::{GaussianMixture, MixtureOptions, equal_tail_crossing, fit_gaussian_mixture};
use crate::binarize::FallbackReason;

fn options(n_components: usize) -> MixtureOptions {
    MixtureOptions {
        n_components,
        max_iter: 200,
        tolerance: 1e-6,
        reg_variance: 1e-6,
    }
}

fn two_clusters(seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let low = SampleNormal::new(0.1, 0.01).unwrap();
    let high = SampleNormal::new(0.8, 0.01).unwrap();
    let mut values: Vec<f64> = (0..50).map(|_| low.sample(&mut rng)).collect();
    values.extend((0..50).map(|_| high.sample(&mut rng)));
    values
}

#[test]
fn test_fit_recovers_two_clusters() {
    let values = two_clusters(11);
    let mut rng = StdRng::seed_from_u64(3);
    let fit = fit_gaussian_mixture(&values, &options(2), &mut rng).unwrap();
    assert!(fit.converged);
    let active = fit.active_component();
    let inactive = 1 - active;
    assert!((fit.means[active] - 0.8).abs() < 0.02);
    assert!((fit.means[inactive] - 0.1).abs() < 0.02);
    assert!((fit.weights[active] - 0.5).abs() < 0.05);
}

#[test]
fn test_fit_is_reproducible_for_a_seed() {
    let values = two_clusters(5);
    let a = fit_gaussian_mixture(&values, &options(3), &mut StdRng::seed_from_u64(9)).unwrap();
    let b = fit_gaussian_mixture(&values, &options(3), &mut StdRng::seed_from_u64(9)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_single_iteration_does_not_converge() {
    let values = two_clusters(2);
    let opts = MixtureOptions {
        max_iter: 1,
        ..options(2)
    };
    let fit = fit_gaussian_mixture(&values, &opts, &mut StdRng::seed_from_u64(1)).unwrap();
    assert!(!fit.converged);
    assert_eq!(fit.iterations, 1);
}

#[test]
fn test_too_few_distinct_values_collapse() {
    // Two distinct values cannot seed three centers.
    let values = [0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    let err = fit_gaussian_mixture(&values, &options(3), &mut StdRng::seed_from_u64(1)).unwrap_err();
    assert_eq!(err, FallbackReason::CollapsedComponent);
}

#[test]
fn test_crossing_of_symmetric_mixture_is_midpoint() {
    let mixture = GaussianMixture {
        weights: vec![0.5, 0.5],
        means: vec![0.8, 0.1],
        variances: vec![0.0001, 0.0001],
        iterations: 1,
        converged: true,
        log_likelihood: 0.0,
    };
    assert_eq!(mixture.active_component(), 0);
    let t = equal_tail_crossing(&mixture).unwrap();
    assert!((t - 0.45).abs() < 1e-9);
}

#[test]
fn test_crossing_moves_toward_narrow_component() {
    let mixture = GaussianMixture {
        weights: vec![0.5, 0.5],
        means: vec![0.0, 1.0],
        variances: vec![0.04, 0.01],
        iterations: 1,
        converged: true,
        log_likelihood: 0.0,
    };
    // Equal z-scores: (t - 0) / 0.2 == (1 - t) / 0.1
    let t = equal_tail_crossing(&mixture).unwrap();
    assert!((t - 2.0 / 3.0).abs() < 1e-9);
}
