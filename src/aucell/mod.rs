use std::borrow::Cow;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod ranks;
pub mod recovery;

use crate::error::{CtxError, Result};
use crate::model::{FeatureMatrix, ValueKind};
use crate::signatures::{ResolvedSignature, Signature, SignatureAudit, resolve_signature};
use recovery::{max_recovery_area, recovery_area, window_area};

/// Size of the top-ranked window `T`; callers must always choose one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankThreshold {
    /// Fraction of the column universe, in `(0, 1]`.
    Fraction(f64),
    /// Absolute number of top positions.
    Absolute(usize),
}

impl RankThreshold {
    pub fn resolve(&self, universe: usize) -> Result<usize> {
        if universe == 0 {
            return Err(CtxError::InvalidInput(
                "cannot resolve a rank threshold over an empty column universe".to_string(),
            ));
        }
        match *self {
            RankThreshold::Fraction(f) => {
                if !f.is_finite() || f <= 0.0 || f > 1.0 {
                    return Err(CtxError::InvalidConfig(format!(
                        "rank_threshold fraction must be in (0, 1], got {f}"
                    )));
                }
                Ok(((f * universe as f64).round() as usize).clamp(1, universe))
            }
            RankThreshold::Absolute(0) => Err(CtxError::InvalidConfig(
                "rank_threshold must be at least 1".to_string(),
            )),
            RankThreshold::Absolute(n) if n > universe => {
                warn!(
                    requested = n,
                    universe, "rank_threshold exceeds the column universe; clamping"
                );
                Ok(universe)
            }
            RankThreshold::Absolute(n) => Ok(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AucNormalization {
    /// Divide by the largest area the signature can reach (exactly 1.0 when
    /// all members occupy the top positions).
    #[default]
    MaxAttainable,
    /// Divide by `T * sum(weights)`.
    Window,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AucParams {
    pub rank_threshold: RankThreshold,
    #[serde(default)]
    pub weighted: bool,
    #[serde(default)]
    pub normalization: AucNormalization,
    /// 0 = all available cores.
    #[serde(default = "default_workers")]
    pub num_workers: usize,
}

fn default_workers() -> usize {
    1
}

impl AucParams {
    pub fn new(rank_threshold: RankThreshold) -> Self {
        Self {
            rank_threshold,
            weighted: false,
            normalization: AucNormalization::default(),
            num_workers: default_workers(),
        }
    }

    pub fn weighted(mut self, weighted: bool) -> Self {
        self.weighted = weighted;
        self
    }

    pub fn normalization(mut self, normalization: AucNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }
}

/// Enrichment per (row id, signature), row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AucMatrix {
    pub row_ids: Vec<String>,
    pub signatures: Vec<String>,
    pub values: Vec<f64>,
    pub audits: Vec<SignatureAudit>,
    pub rank_cutoff: usize,
}

impl AucMatrix {
    pub fn new(row_ids: Vec<String>, signatures: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if values.len() != row_ids.len() * signatures.len() {
            return Err(CtxError::InvalidInput(format!(
                "{} AUC values for {} rows x {} signatures",
                values.len(),
                row_ids.len(),
                signatures.len()
            )));
        }
        let audits = signatures
            .iter()
            .map(|s| SignatureAudit {
                signature: s.clone(),
                size_defined: 0,
                size_mappable: 0,
                dropped_members: Vec::new(),
            })
            .collect();
        Ok(Self {
            row_ids,
            signatures,
            values,
            audits,
            rank_cutoff: 0,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn n_signatures(&self) -> usize {
        self.signatures.len()
    }

    pub fn get(&self, row: usize, signature: usize) -> f64 {
        self.values[row * self.n_signatures() + signature]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let n = self.n_signatures();
        &self.values[row * n..(row + 1) * n]
    }

    pub fn column(&self, signature: usize) -> Vec<f64> {
        (0..self.n_rows()).map(|r| self.get(r, signature)).collect()
    }

    pub fn signature_index(&self, name: &str) -> Option<usize> {
        self.signatures.iter().position(|s| s == name)
    }

    pub fn value(&self, row_id: &str, signature: &str) -> Option<f64> {
        let row = self.row_ids.iter().position(|r| r == row_id)?;
        let sig = self.signature_index(signature)?;
        Some(self.get(row, sig))
    }
}

struct PreparedSignature {
    resolved: ResolvedSignature,
    denominator: f64,
}

pub(crate) fn build_pool(num_workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build()
        .map_err(|e| CtxError::ThreadPool(e.to_string()))
}

/// Scores every row of `matrix` against every signature.
///
/// Score matrices are first converted to ranks (see
/// [`FeatureMatrix::to_rankings`]). Members absent from the matrix columns are
/// dropped and reported in `audits`; a signature left empty scores 0.
pub fn calc_auc(
    matrix: &FeatureMatrix,
    signatures: &[Signature],
    params: &AucParams,
) -> Result<AucMatrix> {
    let rankings: Cow<'_, FeatureMatrix> = match matrix.value_kind() {
        ValueKind::Rankings => Cow::Borrowed(matrix),
        ValueKind::Scores => Cow::Owned(matrix.to_rankings()?),
    };
    let rank_cutoff = params.rank_threshold.resolve(rankings.universe)?;

    let column_index = rankings.column_index();
    let mut prepared = Vec::with_capacity(signatures.len());
    for signature in signatures {
        if let (Some(sig_axis), Some(db_axis)) = (signature.axis, rankings.column_axis) {
            if sig_axis != db_axis {
                return Err(CtxError::MissingFeature {
                    rows: Vec::new(),
                    columns: signature.members().to_vec(),
                });
            }
        }
        let resolved = resolve_signature(signature, &column_index);
        let audit = &resolved.audit;
        if audit.is_empty_after_filtering() {
            warn!(
                signature = %signature.name,
                dropped = audit.dropped(),
                "no signature member present; AUC is 0 for every row"
            );
        } else if audit.dropped() > 0 {
            info!(
                signature = %signature.name,
                dropped = audit.dropped(),
                kept = audit.size_mappable,
                "dropped signature members absent from the database"
            );
        }
        let weights: Vec<f64> = if params.weighted {
            resolved.weights.clone()
        } else {
            vec![1.0; resolved.positions.len()]
        };
        let denominator = match params.normalization {
            AucNormalization::MaxAttainable => max_recovery_area(&weights, rank_cutoff),
            AucNormalization::Window => window_area(&weights, rank_cutoff),
        };
        prepared.push(PreparedSignature {
            resolved,
            denominator,
        });
    }

    debug!(
        n_rows = rankings.n_rows(),
        n_signatures = prepared.len(),
        rank_cutoff,
        weighted = params.weighted,
        "computing AUC"
    );

    let score_row = |row: usize| -> Vec<f64> {
        let ranks = rankings.rank_row(row).unwrap_or_default();
        prepared
            .iter()
            .map(|p| {
                if p.denominator <= 0.0 {
                    return 0.0;
                }
                let weights = params.weighted.then_some(p.resolved.weights.as_slice());
                let area = recovery_area(ranks, &p.resolved.positions, weights, rank_cutoff);
                (area / p.denominator).clamp(0.0, 1.0)
            })
            .collect()
    };

    let pool = build_pool(params.num_workers)?;
    let rows: Vec<Vec<f64>> =
        pool.install(|| (0..rankings.n_rows()).into_par_iter().map(score_row).collect());

    let mut values = Vec::with_capacity(rankings.n_rows() * prepared.len());
    for row in rows {
        values.extend(row);
    }

    Ok(AucMatrix {
        row_ids: rankings.row_ids.clone(),
        signatures: signatures.iter().map(|s| s.name.clone()).collect(),
        values,
        audits: prepared.into_iter().map(|p| p.resolved.audit).collect(),
        rank_cutoff,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/aucell/tests.rs"]
mod tests;
