use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use super::stats::robust_threshold;
use super::{BinarizeParams, FallbackReason, ThresholdMethod, binarize, derive_threshold};
use crate::aucell::AucMatrix;
use crate::error::CtxError;

fn two_clusters(seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let low = Normal::new(0.1, 0.01).unwrap();
    let high = Normal::new(0.8, 0.01).unwrap();
    let mut values: Vec<f64> = (0..50).map(|_| low.sample(&mut rng)).collect();
    values.extend((0..50).map(|_| high.sample(&mut rng)));
    values
}

/// Row-major matrix from per-signature columns.
fn auc_from_columns(columns: &[Vec<f64>]) -> AucMatrix {
    let n_rows = columns[0].len();
    let mut values = Vec::with_capacity(n_rows * columns.len());
    for r in 0..n_rows {
        for column in columns {
            values.push(column[r]);
        }
    }
    AucMatrix::new(
        (0..n_rows).map(|i| format!("cell{i}")).collect(),
        (0..columns.len()).map(|i| format!("sig{i}")).collect(),
        values,
    )
    .unwrap()
}

#[test]
fn test_two_clusters_are_separated() {
    let values = two_clusters(42);
    let auc = auc_from_columns(std::slice::from_ref(&values));
    let result = binarize(&auc, &BinarizeParams::new(7)).unwrap();
    let sig = &result.signatures[0];
    assert!(matches!(sig.method, ThresholdMethod::MixtureCrossing { components: 2, .. }));
    assert!(sig.threshold > 0.3 && sig.threshold < 0.6, "threshold {}", sig.threshold);
    for (i, call) in sig.calls.iter().enumerate() {
        assert_eq!(*call, i >= 50, "row {i}");
    }
    assert_eq!(sig.n_active(), 50);
    assert!(result.warnings().is_empty());
}

#[test]
fn test_three_components_still_split_two_clusters() {
    let values = two_clusters(8);
    let auc = auc_from_columns(std::slice::from_ref(&values));
    let result = binarize(&auc, &BinarizeParams::new(7).n_components(3)).unwrap();
    let sig = &result.signatures[0];
    for (i, call) in sig.calls.iter().enumerate() {
        assert_eq!(*call, values[i] > sig.threshold);
    }
}

#[test]
fn test_constant_vector_is_degenerate() {
    let auc = auc_from_columns(&[vec![0.25; 30]]);
    let result = binarize(&auc, &BinarizeParams::new(1)).unwrap();
    let sig = &result.signatures[0];
    assert_eq!(sig.method, ThresholdMethod::Degenerate);
    assert_eq!(sig.threshold, 0.25);
    assert!(sig.calls.iter().all(|c| !c));
}

#[test]
fn test_constant_vector_above_activity_floor() {
    let auc = auc_from_columns(&[vec![0.25; 30]]);
    let result = binarize(&auc, &BinarizeParams::new(1).min_activity(0.1)).unwrap();
    let sig = &result.signatures[0];
    assert_eq!(sig.threshold, 0.1);
    assert_eq!(sig.n_active(), 30);

    let below = binarize(&auc, &BinarizeParams::new(1).min_activity(0.5)).unwrap();
    assert_eq!(below.signatures[0].n_active(), 0);
}

#[test]
fn test_spread_below_fit_resolution_is_degenerate() {
    let mut values = vec![0.3; 50];
    values.extend(std::iter::repeat_n(0.3 + 1e-5, 50));
    let params = BinarizeParams::new(1);
    let (threshold, method) = derive_threshold("s", &values, &params).unwrap();
    assert_eq!(method, ThresholdMethod::Degenerate);
    assert_eq!(threshold, 0.3 + 1e-5);
    assert!(values.iter().all(|v| *v <= threshold));

    let auc = auc_from_columns(&[values]);
    assert_eq!(binarize(&auc, &params).unwrap().signatures[0].n_active(), 0);
}

#[test]
fn test_all_zero_population_never_active() {
    let mut params = BinarizeParams::new(1);
    params.min_activity = Some(-0.1);
    let (threshold, method) = derive_threshold("s", &[0.0; 10], &params).unwrap();
    assert_eq!(method, ThresholdMethod::Degenerate);
    assert_eq!(threshold, 0.0);

    let auc = auc_from_columns(&[vec![0.0; 10]]);
    let err = binarize(&auc, &params).unwrap_err();
    assert!(matches!(err, CtxError::InvalidConfig(_)));
    let result = binarize(&auc, &BinarizeParams::new(1).min_activity(0.0)).unwrap();
    assert_eq!(result.signatures[0].n_active(), 0);
}

#[test]
fn test_degenerate_error_when_fallback_disabled() {
    let mut params = BinarizeParams::new(1);
    params.degenerate_fallback = false;
    let err = derive_threshold("flat", &[0.0; 10], &params).unwrap_err();
    assert!(matches!(err, CtxError::DegenerateInput { ref signature, .. } if signature == "flat"));
}

#[test]
fn test_iteration_budget_falls_back_to_robust_threshold() {
    let values = two_clusters(3);
    let params = BinarizeParams::new(7).max_iter(1).fallback_k(3.0);
    let (threshold, method) = derive_threshold("s", &values, &params).unwrap();
    assert_eq!(
        method,
        ThresholdMethod::RobustFallback {
            reason: FallbackReason::NotConverged
        }
    );
    assert_eq!(threshold, robust_threshold(&values, 3.0));

    let auc = auc_from_columns(std::slice::from_ref(&values));
    let result = binarize(&auc, &params).unwrap();
    assert_eq!(result.warnings(), vec![("sig0", FallbackReason::NotConverged)]);
}

#[test]
fn test_small_population_uses_fallback() {
    let values = [0.1, 0.2, 0.9, 0.3];
    let (threshold, method) = derive_threshold("s", &values, &BinarizeParams::new(1)).unwrap();
    assert_eq!(
        method,
        ThresholdMethod::RobustFallback {
            reason: FallbackReason::TooFewSamples
        }
    );
    assert_eq!(threshold, robust_threshold(&values, 2.0));
}

#[test]
fn test_non_finite_auc_rejected() {
    let err = derive_threshold("s", &[0.1, f64::NAN], &BinarizeParams::new(1)).unwrap_err();
    assert!(matches!(err, CtxError::InvalidInput(_)));
}

#[test]
fn test_same_seed_same_result_for_any_worker_count() {
    let columns: Vec<Vec<f64>> = (0..6).map(two_clusters).collect();
    let auc = auc_from_columns(&columns);
    let serial = binarize(&auc, &BinarizeParams::new(99)).unwrap();
    for workers in [2, 4, 0] {
        let parallel = binarize(&auc, &BinarizeParams::new(99).num_workers(workers)).unwrap();
        assert_eq!(parallel, serial);
    }
    assert_eq!(serial.thresholds().len(), 6);
    assert_eq!(serial.get("sig5").map(|s| s.calls.len()), Some(100));
    assert_eq!(serial.call("cell99", "sig2"), Some(true));
    assert_eq!(serial.call("cell0", "sig2"), Some(false));
    assert_eq!(serial.call("cell0", "missing"), None);
}

#[test]
fn test_invalid_params_rejected() {
    let auc = auc_from_columns(&[vec![0.1, 0.2, 0.3]]);
    for params in [
        BinarizeParams::new(1).n_components(4),
        BinarizeParams::new(1).fallback_k(-1.0),
        BinarizeParams::new(1).fallback_k(f64::INFINITY),
        BinarizeParams::new(1).max_iter(0),
    ] {
        assert!(matches!(binarize(&auc, &params), Err(CtxError::InvalidConfig(_))));
    }
}

#[test]
fn test_params_from_json() {
    let params: BinarizeParams = serde_json::from_str(r#"{"seed": 5, "fallback_k": 3.0}"#).unwrap();
    assert_eq!(params.seed, 5);
    assert_eq!(params.fallback_k, 3.0);
    assert_eq!(params.n_components, 2);
    assert_eq!(params.max_iter, 200);
    assert!(params.degenerate_fallback);
    assert!(serde_json::from_str::<BinarizeParams>(r#"{"fallback_k": 3.0}"#).is_err());
}

#[test]
fn test_identical_columns_get_identical_thresholds() {
    let values = two_clusters(11);
    let auc = auc_from_columns(&[values.clone(), values]);
    let result = binarize(&auc, &BinarizeParams::new(4).num_workers(2)).unwrap();
    let (a, b) = (&result.signatures[0], &result.signatures[1]);
    assert_eq!(a.threshold, b.threshold);
    assert_eq!(a.method, b.method);
    assert_eq!(a.calls, b.calls);
}
