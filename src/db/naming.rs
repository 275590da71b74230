use std::path::Path;

use crate::model::{ColumnAxis, RowAxis, ValueKind};

/// Parts of a `<prefix>.<genes|regions>_vs_<motifs|tracks>.<rankings|scores>.feather`
/// database file name. Anything not following the convention leaves the
/// corresponding part unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseName {
    pub name: String,
    pub column_axis: Option<ColumnAxis>,
    pub row_axis: Option<RowAxis>,
    pub value_kind: Option<ValueKind>,
}

impl DatabaseName {
    pub fn from_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&file_name)
    }

    pub fn parse(file_name: &str) -> Self {
        let name = file_name
            .strip_suffix(".feather")
            .unwrap_or(file_name)
            .to_string();

        let (stem, value_kind) = if let Some(stem) = name.strip_suffix(".rankings") {
            (stem, Some(ValueKind::Rankings))
        } else if let Some(stem) = name.strip_suffix(".scores") {
            (stem, Some(ValueKind::Scores))
        } else {
            (name.as_str(), None)
        };

        let axes = stem.rsplit('.').next().unwrap_or_default();
        let (column_axis, row_axis) = match axes.split_once("_vs_") {
            Some((cols, rows)) => (parse_column_axis(cols), parse_row_axis(rows)),
            None => (None, None),
        };

        Self {
            column_axis,
            row_axis,
            value_kind,
            name,
        }
    }
}

fn parse_column_axis(s: &str) -> Option<ColumnAxis> {
    match s {
        "genes" => Some(ColumnAxis::Genes),
        "regions" => Some(ColumnAxis::Regions),
        _ => None,
    }
}

fn parse_row_axis(s: &str) -> Option<RowAxis> {
    match s {
        "motifs" => Some(RowAxis::Motifs),
        "tracks" => Some(RowAxis::Tracks),
        _ => None,
    }
}
