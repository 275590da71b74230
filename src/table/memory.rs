use tracing::debug;

use crate::error::{CtxError, Result};
use crate::model::{MatrixValues, RowAxis, ValueDtype, ValueKind};
use crate::table::{TableReader, TableSchema, check_positions, gather};

/// A table fully materialized in memory, stored column-major.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    schema: TableSchema,
    columns: MemoryColumns,
}

#[derive(Debug, Clone)]
enum MemoryColumns {
    Ranks(Vec<Vec<u32>>),
    Scores(Vec<Vec<f32>>),
}

impl MemoryTable {
    pub fn load(source: &dyn TableReader, kind: ValueKind) -> Result<Self> {
        let schema = source.schema().clone();
        let values = source.read_positions(None, None, kind)?;
        debug!(
            n_rows = schema.row_ids.len(),
            n_columns = schema.column_ids.len(),
            "materialized table in memory"
        );
        Self::from_parts(
            schema.index_column,
            schema.row_ids,
            schema.column_ids,
            schema.value_dtype,
            values,
        )
    }

    pub fn from_parts(
        index_column: String,
        row_ids: Vec<String>,
        column_ids: Vec<String>,
        value_dtype: ValueDtype,
        values: MatrixValues,
    ) -> Result<Self> {
        if RowAxis::from_index_name(&index_column).is_none() {
            return Err(CtxError::Format(format!(
                "unknown index column {index_column:?}"
            )));
        }
        let n_rows = row_ids.len();
        let n_cols = column_ids.len();
        if values.len() != n_rows * n_cols {
            return Err(CtxError::InvalidInput(format!(
                "{} values for a {} x {} table",
                values.len(),
                n_rows,
                n_cols
            )));
        }
        let columns = match values {
            MatrixValues::Ranks(v) => MemoryColumns::Ranks(transpose(&v, n_rows, n_cols)),
            MatrixValues::Scores(v) => MemoryColumns::Scores(transpose(&v, n_rows, n_cols)),
        };
        Ok(Self {
            schema: TableSchema {
                index_column,
                row_ids,
                column_ids,
                value_dtype,
            },
            columns,
        })
    }

    pub fn value_kind(&self) -> ValueKind {
        match self.columns {
            MemoryColumns::Ranks(_) => ValueKind::Rankings,
            MemoryColumns::Scores(_) => ValueKind::Scores,
        }
    }
}

fn transpose<T: Copy>(row_major: &[T], n_rows: usize, n_cols: usize) -> Vec<Vec<T>> {
    (0..n_cols)
        .map(|c| (0..n_rows).map(|r| row_major[r * n_cols + c]).collect())
        .collect()
}

impl TableReader for MemoryTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn supports_partial_read(&self) -> bool {
        false
    }

    fn read_positions(
        &self,
        rows: Option<&[usize]>,
        columns: Option<&[usize]>,
        kind: ValueKind,
    ) -> Result<MatrixValues> {
        check_positions(&self.schema, rows, columns)?;
        let all_rows: Vec<usize> = match rows {
            Some(r) => r.to_vec(),
            None => (0..self.schema.row_ids.len()).collect(),
        };
        let all_columns: Vec<usize> = match columns {
            Some(c) => c.to_vec(),
            None => (0..self.schema.column_ids.len()).collect(),
        };
        match (&self.columns, kind) {
            (MemoryColumns::Ranks(cols), ValueKind::Rankings) => {
                Ok(MatrixValues::Ranks(gather(cols, &all_columns, &all_rows)))
            }
            (MemoryColumns::Scores(cols), ValueKind::Scores) => {
                Ok(MatrixValues::Scores(gather(cols, &all_columns, &all_rows)))
            }
            (MemoryColumns::Ranks(cols), ValueKind::Scores) => Ok(MatrixValues::Scores(
                gather(cols, &all_columns, &all_rows)
                    .into_iter()
                    .map(|v| v as f32)
                    .collect(),
            )),
            (MemoryColumns::Scores(_), ValueKind::Rankings) => Err(CtxError::InvalidInput(
                "in-memory score table cannot be read as rankings".to_string(),
            )),
        }
    }
}
