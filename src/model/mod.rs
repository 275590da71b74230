pub mod axes;
pub mod matrix;

pub use axes::{ColumnAxis, RowAxis, ValueDtype, ValueKind};
pub use matrix::{FeatureMatrix, MatrixValues};

#[cfg(test)]
#[path = "../../tests/src_inline/model/matrix.rs"]
mod tests;
