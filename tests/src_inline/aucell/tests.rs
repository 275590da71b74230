use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{AucMatrix, AucNormalization, AucParams, RankThreshold, calc_auc};
use crate::error::CtxError;
use crate::model::{ColumnAxis, FeatureMatrix, MatrixValues, RowAxis};
use crate::signatures::Signature;
use crate::testutil::{COLS, ROWS, fixture_ranks, strings};

fn fixture_matrix() -> FeatureMatrix {
    let ranks: Vec<u32> = fixture_ranks().concat().iter().map(|&v| v as u32).collect();
    FeatureMatrix::new(
        RowAxis::Motifs,
        Some(ColumnAxis::Genes),
        strings(&ROWS),
        strings(&COLS),
        COLS.len(),
        MatrixValues::Ranks(ranks),
    )
    .unwrap()
}

fn random_matrix(n_rows: usize, n_cols: usize, seed: u64) -> FeatureMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(n_rows * n_cols);
    for _ in 0..n_rows {
        let mut row: Vec<u32> = (0..n_cols as u32).collect();
        row.shuffle(&mut rng);
        values.extend(row);
    }
    FeatureMatrix::new(
        RowAxis::Tracks,
        Some(ColumnAxis::Regions),
        (0..n_rows).map(|i| format!("t{i}")).collect(),
        (0..n_cols).map(|i| format!("r{i}")).collect(),
        n_cols,
        MatrixValues::Ranks(values),
    )
    .unwrap()
}

#[test]
fn test_rank_threshold_resolution() {
    assert_eq!(RankThreshold::Fraction(0.5).resolve(6).unwrap(), 3);
    assert_eq!(RankThreshold::Fraction(0.01).resolve(6).unwrap(), 1);
    assert_eq!(RankThreshold::Fraction(1.0).resolve(6).unwrap(), 6);
    assert_eq!(RankThreshold::Absolute(4).resolve(6).unwrap(), 4);
    assert_eq!(RankThreshold::Absolute(10).resolve(6).unwrap(), 6);
    for bad in [
        RankThreshold::Fraction(0.0),
        RankThreshold::Fraction(1.5),
        RankThreshold::Fraction(f64::NAN),
        RankThreshold::Absolute(0),
    ] {
        assert!(matches!(bad.resolve(6), Err(CtxError::InvalidConfig(_))));
    }
    assert!(RankThreshold::Absolute(3).resolve(0).is_err());
}

#[test]
fn test_perfect_recovery_scores_one() {
    let matrix = fixture_matrix();
    let sig = Signature::new("top", ["g1", "g2"]).unwrap();
    let auc = calc_auc(&matrix, &[sig], &AucParams::new(RankThreshold::Absolute(3))).unwrap();
    assert_eq!(auc.rank_cutoff, 3);
    assert_eq!(auc.value("m1", "top"), Some(1.0));
    // m2 holds g1/g2 at ranks 5 and 4.
    assert_eq!(auc.value("m2", "top"), Some(0.0));
    // m3: g2 at rank 0 (3 steps), g1 at rank 2 (1 step) over a maximum of 5.
    assert_eq!(auc.value("m3", "top"), Some(0.8));
}

#[test]
fn test_perfect_weighted_recovery_scores_one() {
    let matrix = fixture_matrix();
    // heaviest member at rank 0 for m1
    let sig = Signature::with_weights("w", [("g1", 2.0), ("g2", 0.5), ("g3", 1.0)]).unwrap();
    let params = AucParams::new(RankThreshold::Absolute(4)).weighted(true);
    let auc = calc_auc(&matrix, std::slice::from_ref(&sig), &params).unwrap();
    // g1@1, g2@2, g3@3 → 2*4 + 0.5*3 + 1*2 = 11.5 over max 2*4 + 1*3 + 0.5*2 = 12
    let expected = 11.5 / 12.0;
    assert!((auc.value("m1", "w").unwrap() - expected).abs() < 1e-12);

    let sig = Signature::with_weights("w2", [("g1", 2.0), ("g2", 1.0)]).unwrap();
    let auc = calc_auc(&matrix, &[sig], &params).unwrap();
    assert_eq!(auc.value("m1", "w2"), Some(1.0));
}

#[test]
fn test_window_normalization() {
    let matrix = fixture_matrix();
    let sig = Signature::new("top", ["g1", "g2"]).unwrap();
    let params =
        AucParams::new(RankThreshold::Absolute(3)).normalization(AucNormalization::Window);
    let auc = calc_auc(&matrix, &[sig], &params).unwrap();
    assert!((auc.value("m1", "top").unwrap() - 5.0 / 6.0).abs() < 1e-12);
}

#[test]
fn test_members_outside_window_score_zero() {
    let matrix = fixture_matrix();
    let sig = Signature::new("tail", ["g5", "g6"]).unwrap();
    let auc = calc_auc(&matrix, &[sig], &AucParams::new(RankThreshold::Absolute(2))).unwrap();
    assert_eq!(auc.value("m1", "tail"), Some(0.0));
    assert_eq!(auc.value("m2", "tail"), Some(1.0));
}

#[test]
fn test_empty_after_filtering_scores_zero() {
    let matrix = fixture_matrix();
    let sig = Signature::new("ghost", ["x1", "x2", "x3"]).unwrap();
    let auc = calc_auc(&matrix, &[sig], &AucParams::new(RankThreshold::Fraction(0.5))).unwrap();
    assert_eq!(auc.column(0), vec![0.0, 0.0, 0.0]);
    let audit = &auc.audits[0];
    assert!(audit.is_empty_after_filtering());
    assert_eq!(audit.dropped(), audit.size_defined);
    assert_eq!(audit.dropped_members, strings(&["x1", "x2", "x3"]));
}

#[test]
fn test_partially_mapped_signature_is_audited() {
    let matrix = fixture_matrix();
    let sig = Signature::new("mixed", ["g1", "nope"]).unwrap();
    let auc = calc_auc(&matrix, &[sig], &AucParams::new(RankThreshold::Absolute(1))).unwrap();
    assert_eq!(auc.audits[0].size_defined, 2);
    assert_eq!(auc.audits[0].size_mappable, 1);
    assert_eq!(auc.value("m1", "mixed"), Some(1.0));
}

#[test]
fn test_axis_mismatch_is_missing_feature() {
    let matrix = fixture_matrix();
    let sig = Signature::new("regions", ["chr1:1-100"])
        .unwrap()
        .with_axis(ColumnAxis::Regions);
    let err = calc_auc(&matrix, &[sig], &AucParams::new(RankThreshold::Absolute(3))).unwrap_err();
    match err {
        CtxError::MissingFeature { rows, columns } => {
            assert!(rows.is_empty());
            assert_eq!(columns, strings(&["chr1:1-100"]));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_scores_are_ranked_before_scoring() {
    let scores = MatrixValues::Scores(vec![
        9.0, 8.0, 7.0, 6.0, 5.0, 4.0, //
        0.0, 1.0, 2.0, 3.0, 4.0, 5.0, //
        7.0, 9.0, 3.0, 8.0, 1.0, 5.0,
    ]);
    let matrix = FeatureMatrix::new(
        RowAxis::Motifs,
        Some(ColumnAxis::Genes),
        strings(&ROWS),
        strings(&COLS),
        COLS.len(),
        scores,
    )
    .unwrap();
    let sigs = [
        Signature::new("a", ["g1", "g2"]).unwrap(),
        Signature::new("b", ["g4", "g6", "g3"]).unwrap(),
    ];
    let params = AucParams::new(RankThreshold::Absolute(3));
    let from_scores = calc_auc(&matrix, &sigs, &params).unwrap();
    let from_ranks = calc_auc(&fixture_matrix(), &sigs, &params).unwrap();
    assert_eq!(from_scores.values, from_ranks.values);
}

#[test]
fn test_values_bounded_and_deterministic_across_workers() {
    let matrix = random_matrix(40, 120, 7);
    let sigs: Vec<Signature> = (0..5)
        .map(|s| {
            let members: Vec<String> = (0..10).map(|i| format!("r{}", s * 17 + i * 3)).collect();
            Signature::new(format!("sig{s}"), members).unwrap()
        })
        .collect();
    let base = AucParams::new(RankThreshold::Fraction(0.05));
    let serial = calc_auc(&matrix, &sigs, &base).unwrap();
    assert!(serial.values.iter().all(|v| (0.0..=1.0).contains(v)));
    for workers in [2, 4, 0] {
        let parallel = calc_auc(&matrix, &sigs, &base.clone().num_workers(workers)).unwrap();
        assert_eq!(parallel, serial);
    }
}

#[test]
fn test_auc_matrix_accessors() {
    let auc = AucMatrix::new(
        strings(&["a", "b"]),
        strings(&["s1", "s2", "s3"]),
        vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
    )
    .unwrap();
    assert_eq!(auc.n_rows(), 2);
    assert_eq!(auc.n_signatures(), 3);
    assert_eq!(auc.get(1, 2), 0.6);
    assert_eq!(auc.row(0), &[0.1, 0.2, 0.3]);
    assert_eq!(auc.column(1), vec![0.2, 0.5]);
    assert_eq!(auc.signature_index("s3"), Some(2));
    assert_eq!(auc.value("b", "s1"), Some(0.4));
    assert!(AucMatrix::new(strings(&["a"]), strings(&["s1"]), vec![]).is_err());
}

#[test]
fn test_params_from_json() {
    let params: AucParams =
        serde_json::from_str(r#"{"rank_threshold": {"fraction": 0.05}, "weighted": true}"#)
            .unwrap();
    assert_eq!(params.rank_threshold, RankThreshold::Fraction(0.05));
    assert!(params.weighted);
    assert_eq!(params.normalization, AucNormalization::MaxAttainable);
    assert_eq!(params.num_workers, 1);
    assert!(serde_json::from_str::<AucParams>(r#"{"weighted": true}"#).is_err());
}
