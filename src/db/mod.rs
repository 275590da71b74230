use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod naming;

pub use naming::DatabaseName;

use crate::error::{CtxError, Result};
use crate::model::{ColumnAxis, FeatureMatrix, RowAxis, ValueKind};
use crate::signatures::Signature;
use crate::table::{HandleCache, MemoryTable, TableReader, TableSchema, missing_ids, open_feather};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Any unknown identifier fails the query.
    #[default]
    Strict,
    /// Unknown identifiers are dropped and reported.
    Partial,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub matrix: FeatureMatrix,
    pub unmatched_rows: Vec<String>,
    pub unmatched_columns: Vec<String>,
}

impl QueryResult {
    pub fn is_complete(&self) -> bool {
        self.unmatched_rows.is_empty() && self.unmatched_columns.is_empty()
    }
}

/// A read-only ranking or score database.
///
/// Cloning is cheap; clones share the underlying table, and all queries take
/// `&self`, so one instance can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    path: Option<PathBuf>,
    row_axis: RowAxis,
    column_axis: Option<ColumnAxis>,
    value_kind: ValueKind,
    table: Arc<dyn TableReader>,
    row_lookup: Arc<HashMap<String, usize>>,
    column_lookup: Arc<HashMap<String, usize>>,
}

impl Database {
    pub fn load(path: &Path, value_kind: Option<ValueKind>) -> Result<Self> {
        let table = Arc::new(open_feather(path)?);
        Self::from_table(DatabaseName::from_path(path), Some(path), table, value_kind)
    }

    pub fn load_cached(
        cache: &HandleCache,
        path: &Path,
        value_kind: Option<ValueKind>,
    ) -> Result<Self> {
        let table = cache.open(path)?;
        Self::from_table(DatabaseName::from_path(path), Some(path), table, value_kind)
    }

    /// Wraps any table backend. Value kind resolution: `value_kind` hint,
    /// then the file-name convention, then the stored dtype.
    pub fn from_table(
        naming: DatabaseName,
        path: Option<&Path>,
        table: Arc<dyn TableReader>,
        value_kind: Option<ValueKind>,
    ) -> Result<Self> {
        let schema = table.schema();
        let location = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| naming.name.clone());

        let index_axis = RowAxis::from_index_name(&schema.index_column).ok_or_else(|| {
            CtxError::Format(format!(
                "{location}: unknown index column {:?}",
                schema.index_column
            ))
        })?;
        let row_axis = match index_axis {
            RowAxis::Features => naming.row_axis.unwrap_or(RowAxis::Features),
            axis => {
                if let Some(named) = naming.row_axis {
                    if named != axis {
                        warn!(
                            database = %naming.name,
                            index_column = %schema.index_column,
                            file_name_axis = named.as_str(),
                            "index column disagrees with file name; using index column"
                        );
                    }
                }
                axis
            }
        };

        let value_kind = value_kind
            .or(naming.value_kind)
            .unwrap_or_else(|| schema.value_dtype.natural_kind());
        if value_kind == ValueKind::Rankings
            && !schema.value_dtype.is_integer()
            && !schema.column_ids.is_empty()
        {
            return Err(CtxError::Format(format!(
                "{location}: rankings database holds non-integer values ({:?})",
                schema.value_dtype
            )));
        }

        info!(
            database = %naming.name,
            row_axis = row_axis.as_str(),
            column_axis = naming.column_axis.map(|a| a.as_str()).unwrap_or("unknown"),
            kind = ?value_kind,
            n_rows = schema.row_ids.len(),
            n_columns = schema.column_ids.len(),
            "loaded database"
        );

        Ok(Self {
            row_lookup: Arc::new(schema.row_lookup()),
            column_lookup: Arc::new(schema.column_lookup()),
            name: naming.name,
            path: path.map(Path::to_path_buf),
            row_axis,
            column_axis: naming.column_axis,
            value_kind,
            table,
        })
    }

    /// Reads the whole table once; later queries are served from memory.
    pub fn in_memory(&self) -> Result<Self> {
        if !self.table.supports_partial_read() {
            return Ok(self.clone());
        }
        let table = MemoryTable::load(self.table.as_ref(), self.value_kind)?;
        Ok(Self {
            table: Arc::new(table),
            ..self.clone()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn row_axis(&self) -> RowAxis {
        self.row_axis
    }

    pub fn column_axis(&self) -> Option<ColumnAxis> {
        self.column_axis
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn schema(&self) -> &TableSchema {
        self.table.schema()
    }

    pub fn supports_partial_read(&self) -> bool {
        self.table.supports_partial_read()
    }

    pub fn row_ids(&self) -> &[String] {
        &self.table.schema().row_ids
    }

    pub fn column_ids(&self) -> &[String] {
        &self.table.schema().column_ids
    }

    pub fn total_rows(&self) -> usize {
        self.row_ids().len()
    }

    pub fn total_columns(&self) -> usize {
        self.column_ids().len()
    }

    pub fn contains_row(&self, id: &str) -> bool {
        self.row_lookup.contains_key(id)
    }

    pub fn contains_column(&self, id: &str) -> bool {
        self.column_lookup.contains_key(id)
    }

    pub fn load_full(&self) -> Result<FeatureMatrix> {
        Ok(self.query(None, None, QueryMode::Strict)?.matrix)
    }

    /// Reads a labeled block. `None` selects the whole axis in storage order;
    /// a subset keeps the caller's order (first occurrence of duplicates).
    pub fn query(
        &self,
        rows: Option<&[String]>,
        columns: Option<&[String]>,
        mode: QueryMode,
    ) -> Result<QueryResult> {
        let rows = rows.map(dedup_ids);
        let columns = columns.map(dedup_ids);

        let unmatched_rows = rows
            .as_deref()
            .map(|ids| missing_ids(ids, &self.row_lookup))
            .unwrap_or_default();
        let unmatched_columns = columns
            .as_deref()
            .map(|ids| missing_ids(ids, &self.column_lookup))
            .unwrap_or_default();

        if mode == QueryMode::Strict && (!unmatched_rows.is_empty() || !unmatched_columns.is_empty())
        {
            return Err(CtxError::MissingFeature {
                rows: unmatched_rows,
                columns: unmatched_columns,
            });
        }
        if !unmatched_rows.is_empty() || !unmatched_columns.is_empty() {
            warn!(
                database = %self.name,
                unmatched_rows = unmatched_rows.len(),
                unmatched_columns = unmatched_columns.len(),
                "partial query dropped unknown identifiers"
            );
        }

        let row_pos = rows.as_deref().map(|ids| self.positions(ids, &self.row_lookup));
        let col_pos = columns
            .as_deref()
            .map(|ids| self.positions(ids, &self.column_lookup));

        let values = self
            .table
            .read_positions(row_pos.as_deref(), col_pos.as_deref(), self.value_kind)?;
        let schema = self.table.schema();
        let matrix = FeatureMatrix::new(
            self.row_axis,
            self.column_axis,
            crate::table::select_labels(&schema.row_ids, row_pos.as_deref()),
            crate::table::select_labels(&schema.column_ids, col_pos.as_deref()),
            schema.column_ids.len(),
            values,
        )?;
        debug!(
            database = %self.name,
            n_rows = matrix.n_rows(),
            n_columns = matrix.n_cols(),
            "query"
        );

        Ok(QueryResult {
            matrix,
            unmatched_rows,
            unmatched_columns,
        })
    }

    /// All rows, restricted to the signature members present in the
    /// database (storage column order). Absent members are reported, never
    /// an error.
    pub fn load_signature(&self, signature: &Signature) -> Result<QueryResult> {
        self.load_signatures(std::slice::from_ref(signature))
    }

    pub fn load_signatures(&self, signatures: &[Signature]) -> Result<QueryResult> {
        let mut present = HashSet::new();
        let mut absent = Vec::new();
        let mut absent_seen = HashSet::new();
        for signature in signatures {
            for member in signature.members() {
                match self.column_lookup.get(member) {
                    Some(&pos) => {
                        present.insert(pos);
                    }
                    None => {
                        if absent_seen.insert(member.as_str()) {
                            absent.push(member.clone());
                        }
                    }
                }
            }
        }
        let mut positions: Vec<usize> = present.into_iter().collect();
        positions.sort_unstable();
        let columns: Vec<String> = positions
            .iter()
            .map(|&p| self.column_ids()[p].clone())
            .collect();

        let mut result = self.query(None, Some(&columns), QueryMode::Strict)?;
        result.unmatched_columns = absent;
        Ok(result)
    }

    fn positions(&self, ids: &[String], lookup: &HashMap<String, usize>) -> Vec<usize> {
        ids.iter().filter_map(|id| lookup.get(id).copied()).collect()
    }
}

fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "../../tests/src_inline/db/tests.rs"]
mod tests;
