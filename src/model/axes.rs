use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAxis {
    Motifs,
    Tracks,
    /// Legacy alias whose biological meaning is not recorded in the file.
    Features,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAxis {
    Genes,
    Regions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Rankings,
    Scores,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueDtype {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
}

const ROW_AXIS_ALIASES: &[(&str, RowAxis)] = &[
    ("motifs", RowAxis::Motifs),
    ("tracks", RowAxis::Tracks),
    ("features", RowAxis::Features),
];

impl RowAxis {
    pub fn from_index_name(name: &str) -> Option<Self> {
        ROW_AXIS_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, axis)| *axis)
    }

    pub fn aliases() -> impl Iterator<Item = &'static str> {
        ROW_AXIS_ALIASES.iter().map(|(alias, _)| *alias)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowAxis::Motifs => "motifs",
            RowAxis::Tracks => "tracks",
            RowAxis::Features => "features",
        }
    }
}

impl ColumnAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnAxis::Genes => "genes",
            ColumnAxis::Regions => "regions",
        }
    }
}

impl ValueDtype {
    pub fn from_arrow(dtype: &DataType) -> Option<Self> {
        let out = match dtype {
            DataType::Int8 => ValueDtype::Int8,
            DataType::Int16 => ValueDtype::Int16,
            DataType::Int32 => ValueDtype::Int32,
            DataType::Int64 => ValueDtype::Int64,
            DataType::UInt8 => ValueDtype::UInt8,
            DataType::UInt16 => ValueDtype::UInt16,
            DataType::UInt32 => ValueDtype::UInt32,
            DataType::UInt64 => ValueDtype::UInt64,
            DataType::Float16 => ValueDtype::Float16,
            DataType::Float32 => ValueDtype::Float32,
            DataType::Float64 => ValueDtype::Float64,
            _ => return None,
        };
        Some(out)
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            ValueDtype::Float16 | ValueDtype::Float32 | ValueDtype::Float64
        )
    }

    pub fn natural_kind(&self) -> ValueKind {
        if self.is_integer() {
            ValueKind::Rankings
        } else {
            ValueKind::Scores
        }
    }
}
