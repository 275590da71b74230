use std::collections::HashMap;
use std::fmt::Debug;

pub mod cache;
pub mod feather;
pub mod memory;

pub use cache::{CacheKey, DEFAULT_CACHE_CAPACITY, HandleCache};
pub use feather::{FeatherTable, open_feather};
pub use memory::MemoryTable;

use crate::error::{CtxError, Result};
use crate::model::{MatrixValues, ValueDtype, ValueKind};

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    /// Index column name exactly as stored (one of the row-axis aliases).
    pub index_column: String,
    pub row_ids: Vec<String>,
    pub column_ids: Vec<String>,
    pub value_dtype: ValueDtype,
}

impl TableSchema {
    pub fn row_lookup(&self) -> HashMap<String, usize> {
        self.row_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect()
    }

    pub fn column_lookup(&self) -> HashMap<String, usize> {
        self.column_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub row_ids: Vec<String>,
    pub column_ids: Vec<String>,
    pub values: MatrixValues,
}

/// Read capability of a storage backend. Implementations are immutable after
/// construction, so concurrent reads need no locking.
pub trait TableReader: Debug + Send + Sync {
    fn schema(&self) -> &TableSchema;

    /// Whether `read_positions` touches only the requested columns in storage.
    fn supports_partial_read(&self) -> bool;

    /// Reads values at schema positions, row-major in the given order.
    /// `None` selects every row/column in storage order.
    fn read_positions(
        &self,
        rows: Option<&[usize]>,
        columns: Option<&[usize]>,
        kind: ValueKind,
    ) -> Result<MatrixValues>;

    fn read(
        &self,
        rows: Option<&[String]>,
        columns: Option<&[String]>,
        kind: ValueKind,
    ) -> Result<RawTable> {
        let schema = self.schema();
        let row_lookup = schema.row_lookup();
        let column_lookup = schema.column_lookup();
        let missing_rows = rows
            .map(|ids| missing_ids(ids, &row_lookup))
            .unwrap_or_default();
        let missing_columns = columns
            .map(|ids| missing_ids(ids, &column_lookup))
            .unwrap_or_default();
        if !missing_rows.is_empty() || !missing_columns.is_empty() {
            return Err(CtxError::MissingFeature {
                rows: missing_rows,
                columns: missing_columns,
            });
        }
        let row_pos = rows.map(|ids| positions(ids, &row_lookup));
        let col_pos = columns.map(|ids| positions(ids, &column_lookup));
        let values = self.read_positions(row_pos.as_deref(), col_pos.as_deref(), kind)?;
        Ok(RawTable {
            row_ids: select_labels(&schema.row_ids, row_pos.as_deref()),
            column_ids: select_labels(&schema.column_ids, col_pos.as_deref()),
            values,
        })
    }
}

fn positions(ids: &[String], lookup: &HashMap<String, usize>) -> Vec<usize> {
    ids.iter().filter_map(|id| lookup.get(id).copied()).collect()
}

pub(crate) fn missing_ids(ids: &[String], lookup: &HashMap<String, usize>) -> Vec<String> {
    ids.iter()
        .filter(|id| !lookup.contains_key(id.as_str()))
        .cloned()
        .collect()
}

pub(crate) fn select_labels(labels: &[String], positions: Option<&[usize]>) -> Vec<String> {
    match positions {
        Some(pos) => pos.iter().map(|&p| labels[p].clone()).collect(),
        None => labels.to_vec(),
    }
}

pub(crate) fn check_positions(
    schema: &TableSchema,
    rows: Option<&[usize]>,
    columns: Option<&[usize]>,
) -> Result<()> {
    let axes = [
        ("row", rows, schema.row_ids.len()),
        ("column", columns, schema.column_ids.len()),
    ];
    for (axis, positions, len) in axes {
        if let Some(bad) = positions.and_then(|ps| ps.iter().find(|&&p| p >= len)) {
            return Err(CtxError::InvalidInput(format!(
                "{axis} position {bad} out of range for {len} {axis}s"
            )));
        }
    }
    Ok(())
}

pub(crate) fn gather<T: Copy>(
    columns: &[Vec<T>],
    column_slots: &[usize],
    rows: &[usize],
) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len() * column_slots.len());
    for &row in rows {
        for &slot in column_slots {
            out.push(columns[slot][row]);
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/src_inline/table/tests.rs"]
mod tests;
