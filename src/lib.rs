//! Ranking/score database reader with AUCell-style recovery scoring and
//! per-signature binarization.

pub mod aucell;
pub mod binarize;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod signatures;
pub mod table;

use std::path::Path;

pub use aucell::{AucMatrix, AucNormalization, AucParams, RankThreshold};
pub use binarize::{BinarizeParams, BinarizeResult, FallbackReason, SignatureCalls, ThresholdMethod};
pub use config::CoreConfig;
pub use db::{Database, QueryMode, QueryResult};
pub use error::{CtxError, Result};
pub use model::{ColumnAxis, FeatureMatrix, MatrixValues, RowAxis, ValueKind};
pub use signatures::{Signature, SignatureAudit};

pub fn load_database(path: &Path, value_kind: Option<ValueKind>) -> Result<Database> {
    Database::load(path, value_kind)
}

pub fn calc_auc(
    matrix: &FeatureMatrix,
    signatures: &[Signature],
    params: &AucParams,
) -> Result<AucMatrix> {
    aucell::calc_auc(matrix, signatures, params)
}

pub fn binarize(auc: &AucMatrix, params: &BinarizeParams) -> Result<BinarizeResult> {
    binarize::binarize(auc, params)
}

#[cfg(test)]
#[path = "../tests/src_inline/testutil.rs"]
pub(crate) mod testutil;

#[cfg(test)]
#[path = "../tests/src_inline/lib_inline.rs"]
mod tests;
