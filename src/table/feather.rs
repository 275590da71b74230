use std::collections::HashSet;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float32Type, Int64Type, SchemaRef};
use arrow::ipc::reader::FileReader;
use memmap2::Mmap;
use tracing::debug;

use crate::error::{CtxError, Result};
use crate::model::{MatrixValues, RowAxis, ValueDtype, ValueKind};
use crate::table::{TableReader, TableSchema, check_positions, gather};

const ARROW_MAGIC: &[u8; 6] = b"ARROW1";
const FEATHER_V1_MAGIC: &[u8; 4] = b"FEA1";
// Leading magic + padding, trailing footer length + magic.
const MIN_FILE_BYTES: usize = 8 + 4 + 6;

#[derive(Debug)]
pub struct FeatherTable {
    path: PathBuf,
    mmap: Mmap,
    schema: TableSchema,
    index_field: usize,
    value_fields: Vec<usize>,
}

pub fn open_feather(path: &Path) -> Result<FeatherTable> {
    let file = File::open(path)?;
    let file_bytes = file.metadata()?.len();
    if (file_bytes as usize) < MIN_FILE_BYTES {
        return Err(CtxError::format(
            path,
            format!("file too small ({file_bytes} bytes) to be a Feather file"),
        ));
    }
    let mmap = unsafe { Mmap::map(&file)? };
    check_magic(path, &mmap)?;

    let reader = FileReader::try_new(Cursor::new(&mmap[..]), None)
        .map_err(|e| CtxError::from_arrow(path, e))?;
    let arrow_schema = reader.schema();
    drop(reader);

    let (index_field, value_fields, value_dtype) = inspect_fields(path, &arrow_schema)?;
    let index_column = arrow_schema.field(index_field).name().clone();
    let column_ids: Vec<String> = value_fields
        .iter()
        .map(|&idx| arrow_schema.field(idx).name().clone())
        .collect();
    check_unique(path, "column", &column_ids)?;

    let row_ids = read_index_column(path, &mmap, index_field)?;
    check_unique(path, "row", &row_ids)?;

    debug!(
        path = %path.display(),
        index_column = %index_column,
        n_rows = row_ids.len(),
        n_columns = column_ids.len(),
        dtype = ?value_dtype,
        "opened feather table"
    );

    Ok(FeatherTable {
        path: path.to_path_buf(),
        mmap,
        schema: TableSchema {
            index_column,
            row_ids,
            column_ids,
            value_dtype,
        },
        index_field,
        value_fields,
    })
}

fn check_magic(path: &Path, bytes: &[u8]) -> Result<()> {
    if bytes.starts_with(FEATHER_V1_MAGIC) {
        return Err(CtxError::format(
            path,
            "unsupported Feather version 1; only Feather v2 (Arrow IPC file) is readable",
        ));
    }
    if !bytes.starts_with(ARROW_MAGIC) || !bytes.ends_with(ARROW_MAGIC) {
        return Err(CtxError::format(
            path,
            "invalid magic; expected a Feather v2 (Arrow IPC file)",
        ));
    }
    Ok(())
}

fn inspect_fields(path: &Path, schema: &SchemaRef) -> Result<(usize, Vec<usize>, ValueDtype)> {
    let fields = schema.fields();
    let index_field = fields
        .iter()
        .position(|f| RowAxis::from_index_name(f.name()).is_some())
        .ok_or_else(|| {
            CtxError::format(
                path,
                format!(
                    "no index column found; expected one of: {}",
                    RowAxis::aliases().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;
    if !is_string_type(fields[index_field].data_type()) {
        return Err(CtxError::format(
            path,
            format!(
                "index column {:?} must hold strings, found {}",
                fields[index_field].name(),
                fields[index_field].data_type()
            ),
        ));
    }

    let value_fields: Vec<usize> = (0..fields.len()).filter(|&i| i != index_field).collect();
    let mut value_dtype: Option<ValueDtype> = None;
    for &idx in &value_fields {
        let field = &fields[idx];
        let dtype = ValueDtype::from_arrow(field.data_type()).ok_or_else(|| {
            CtxError::format(
                path,
                format!(
                    "column {:?} has unsupported type {}",
                    field.name(),
                    field.data_type()
                ),
            )
        })?;
        match value_dtype {
            None => value_dtype = Some(dtype),
            Some(existing) if existing != dtype => {
                return Err(CtxError::format(
                    path,
                    format!(
                        "mixed value types: {:?} and {:?} (column {:?})",
                        existing,
                        dtype,
                        field.name()
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    // A table without value columns is still a valid (empty) database.
    let value_dtype = value_dtype.unwrap_or(ValueDtype::Int32);
    Ok((index_field, value_fields, value_dtype))
}

fn is_string_type(dtype: &DataType) -> bool {
    match dtype {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => true,
        DataType::Dictionary(_, value) => is_string_type(value),
        _ => false,
    }
}

fn check_unique(path: &Path, what: &str, ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(CtxError::format(path, format!("duplicate {what} id {id:?}")));
        }
    }
    Ok(())
}

fn read_index_column(path: &Path, bytes: &[u8], index_field: usize) -> Result<Vec<String>> {
    let reader = FileReader::try_new(Cursor::new(bytes), Some(vec![index_field]))
        .map_err(|e| CtxError::from_arrow(path, e))?;
    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| CtxError::from_arrow(path, e))?;
        let column = batch.column(0);
        if column.null_count() > 0 {
            return Err(CtxError::format(path, "null values in index column"));
        }
        let strings = cast(column, &DataType::Utf8).map_err(|e| CtxError::from_arrow(path, e))?;
        let strings = strings.as_string::<i32>();
        for i in 0..strings.len() {
            out.push(strings.value(i).to_string());
        }
    }
    Ok(out)
}

impl FeatherTable {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index_field(&self) -> usize {
        self.index_field
    }

    fn decode_columns<T>(
        &self,
        projection: &[usize],
        decode: impl Fn(&ArrayRef, &str) -> Result<Vec<T>>,
    ) -> Result<Vec<Vec<T>>> {
        let n_rows = self.schema.row_ids.len();
        let mut columns: Vec<Vec<T>> = projection
            .iter()
            .map(|_| Vec::with_capacity(n_rows))
            .collect();
        let reader = FileReader::try_new(Cursor::new(&self.mmap[..]), Some(projection.to_vec()))
            .map_err(|e| CtxError::from_arrow(&self.path, e))?;
        for batch in reader {
            let batch = batch.map_err(|e| CtxError::from_arrow(&self.path, e))?;
            for (slot, out) in columns.iter_mut().enumerate() {
                let name = self.schema.column_ids[self.column_position(projection[slot])].as_str();
                out.extend(decode(batch.column(slot), name)?);
            }
        }
        for (slot, column) in columns.iter().enumerate() {
            if column.len() != n_rows {
                return Err(CtxError::format(
                    &self.path,
                    format!(
                        "column {:?} has {} values, expected {}",
                        self.schema.column_ids[self.column_position(projection[slot])],
                        column.len(),
                        n_rows
                    ),
                ));
            }
        }
        Ok(columns)
    }

    fn column_position(&self, field: usize) -> usize {
        if field > self.index_field { field - 1 } else { field }
    }

    fn decode_ranks(&self, array: &ArrayRef, name: &str) -> Result<Vec<u32>> {
        if array.null_count() > 0 {
            return Err(CtxError::format(
                &self.path,
                format!("null values in column {name:?}"),
            ));
        }
        let wide = cast(array, &DataType::Int64).map_err(|e| CtxError::from_arrow(&self.path, e))?;
        let wide = wide.as_primitive::<Int64Type>();
        let universe = self.schema.column_ids.len() as i64;
        let mut out = Vec::with_capacity(wide.len());
        for &v in wide.values().iter() {
            if v < 0 || v >= universe || v > u32::MAX as i64 {
                return Err(CtxError::format(
                    &self.path,
                    format!("rank {v} out of range in column {name:?}"),
                ));
            }
            out.push(v as u32);
        }
        Ok(out)
    }

    fn decode_scores(&self, array: &ArrayRef, name: &str) -> Result<Vec<f32>> {
        if array.null_count() > 0 {
            return Err(CtxError::format(
                &self.path,
                format!("null values in column {name:?}"),
            ));
        }
        let narrow =
            cast(array, &DataType::Float32).map_err(|e| CtxError::from_arrow(&self.path, e))?;
        Ok(narrow.as_primitive::<Float32Type>().values().to_vec())
    }
}

impl TableReader for FeatherTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn supports_partial_read(&self) -> bool {
        true
    }

    fn read_positions(
        &self,
        rows: Option<&[usize]>,
        columns: Option<&[usize]>,
        kind: ValueKind,
    ) -> Result<MatrixValues> {
        check_positions(&self.schema, rows, columns)?;
        let n_rows = self.schema.row_ids.len();
        let all_rows: Vec<usize>;
        let rows = match rows {
            Some(r) => r,
            None => {
                all_rows = (0..n_rows).collect();
                &all_rows
            }
        };
        let all_columns: Vec<usize>;
        let columns = match columns {
            Some(c) => c,
            None => {
                all_columns = (0..self.schema.column_ids.len()).collect();
                &all_columns
            }
        };
        if rows.is_empty() || columns.is_empty() {
            return Ok(MatrixValues::empty(kind));
        }

        // Storage-ordered, de-duplicated projection; `slots` maps each
        // requested column back onto it.
        let mut projection: Vec<usize> = columns.iter().map(|&c| self.value_fields[c]).collect();
        projection.sort_unstable();
        projection.dedup();
        let slots: Vec<usize> = columns
            .iter()
            .map(|&c| {
                projection
                    .binary_search(&self.value_fields[c])
                    .unwrap_or_default()
            })
            .collect();

        let values = match kind {
            ValueKind::Rankings => {
                let decoded = self.decode_columns(&projection, |a, n| self.decode_ranks(a, n))?;
                MatrixValues::Ranks(gather(&decoded, &slots, rows))
            }
            ValueKind::Scores => {
                let decoded = self.decode_columns(&projection, |a, n| self.decode_scores(a, n))?;
                MatrixValues::Scores(gather(&decoded, &slots, rows))
            }
        };
        debug!(
            path = %self.path.display(),
            n_rows = rows.len(),
            n_columns = columns.len(),
            projected = projection.len(),
            "read feather block"
        );
        Ok(values)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/table/feather.rs"]
mod tests;
