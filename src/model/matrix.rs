use std::collections::HashMap;

use crate::aucell::ranks::rank_scores_descending;
use crate::error::{CtxError, Result};
use crate::model::axes::{ColumnAxis, RowAxis, ValueKind};

/// Row-major values; `len == n_rows * n_cols`.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixValues {
    Ranks(Vec<u32>),
    Scores(Vec<f32>),
}

impl MatrixValues {
    pub fn len(&self) -> usize {
        match self {
            MatrixValues::Ranks(v) => v.len(),
            MatrixValues::Scores(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            MatrixValues::Ranks(_) => ValueKind::Rankings,
            MatrixValues::Scores(_) => ValueKind::Scores,
        }
    }

    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Rankings => MatrixValues::Ranks(Vec::new()),
            ValueKind::Scores => MatrixValues::Scores(Vec::new()),
        }
    }
}

/// A labeled (motif/track x region/gene) block of a database.
///
/// `universe` is the number of columns in the source database, which is what
/// rank thresholds are resolved against even when only a few columns were read.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub row_axis: RowAxis,
    pub column_axis: Option<ColumnAxis>,
    pub row_ids: Vec<String>,
    pub column_ids: Vec<String>,
    pub universe: usize,
    pub values: MatrixValues,
}

impl FeatureMatrix {
    pub fn new(
        row_axis: RowAxis,
        column_axis: Option<ColumnAxis>,
        row_ids: Vec<String>,
        column_ids: Vec<String>,
        universe: usize,
        values: MatrixValues,
    ) -> Result<Self> {
        let expected = row_ids.len() * column_ids.len();
        if values.len() != expected {
            return Err(CtxError::InvalidInput(format!(
                "matrix has {} values, expected {} rows x {} columns",
                values.len(),
                row_ids.len(),
                column_ids.len()
            )));
        }
        if column_ids.len() > universe {
            return Err(CtxError::InvalidInput(format!(
                "matrix has {} columns but a universe of {}",
                column_ids.len(),
                universe
            )));
        }
        Ok(Self {
            row_axis,
            column_axis,
            row_ids,
            column_ids,
            universe,
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn n_cols(&self) -> usize {
        self.column_ids.len()
    }

    pub fn value_kind(&self) -> ValueKind {
        self.values.kind()
    }

    pub fn is_complete(&self) -> bool {
        self.n_cols() == self.universe
    }

    pub fn rank_row(&self, row: usize) -> Option<&[u32]> {
        match &self.values {
            MatrixValues::Ranks(v) => v.get(row * self.n_cols()..(row + 1) * self.n_cols()),
            MatrixValues::Scores(_) => None,
        }
    }

    pub fn score_row(&self, row: usize) -> Option<&[f32]> {
        match &self.values {
            MatrixValues::Scores(v) => v.get(row * self.n_cols()..(row + 1) * self.n_cols()),
            MatrixValues::Ranks(_) => None,
        }
    }

    pub fn column_index(&self) -> HashMap<&str, usize> {
        self.column_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect()
    }

    pub fn row_position(&self, row_id: &str) -> Option<usize> {
        self.row_ids.iter().position(|r| r == row_id)
    }

    /// Converts a score matrix into 0-based ranks (highest score = rank 0),
    /// row by row. Ties keep the matrix column order. Rank matrices are
    /// returned unchanged.
    pub fn to_rankings(&self) -> Result<FeatureMatrix> {
        let scores = match &self.values {
            MatrixValues::Ranks(_) => return Ok(self.clone()),
            MatrixValues::Scores(v) => v,
        };
        if !self.is_complete() {
            return Err(CtxError::InvalidInput(format!(
                "cannot rank a score matrix with {} of {} columns; load all columns first",
                self.n_cols(),
                self.universe
            )));
        }
        let n_cols = self.n_cols();
        let mut ranks = Vec::with_capacity(scores.len());
        if n_cols > 0 {
            for row in scores.chunks_exact(n_cols) {
                ranks.extend(rank_scores_descending(row));
            }
        }
        Ok(FeatureMatrix {
            row_axis: self.row_axis,
            column_axis: self.column_axis,
            row_ids: self.row_ids.clone(),
            column_ids: self.column_ids.clone(),
            universe: self.universe,
            values: MatrixValues::Ranks(ranks),
        })
    }

    /// Bitwise equality, NaN-safe for score matrices.
    pub fn bit_identical(&self, other: &FeatureMatrix) -> bool {
        let same_values = match (&self.values, &other.values) {
            (MatrixValues::Ranks(a), MatrixValues::Ranks(b)) => a == b,
            (MatrixValues::Scores(a), MatrixValues::Scores(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        };
        same_values
            && self.row_axis == other.row_axis
            && self.column_axis == other.column_axis
            && self.row_ids == other.row_ids
            && self.column_ids == other.column_ids
            && self.universe == other.universe
    }
}
