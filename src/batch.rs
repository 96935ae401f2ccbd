//! Tabular data model for streaming transfer.
//!
//! A `RowBatch` is the unit of transfer: a schema plus column buffers of
//! equal length. A `Table` is a complete in-memory dataset that the writer
//! splits into fixed-size batches. Byte sizes are wire buffer sizes, so a
//! batch's declared size always equals the sum of its column buffer sizes.

use serde::{Deserialize, Serialize};

use super::error::{ClientError, Result};

/// Column data types supported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int64,
    Float64,
    Utf8,
}

/// A named, typed column in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Field {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered set of fields shared by every batch in a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Schema { fields }
    }
}

/// One column buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int64(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Column::Int64(_) => DataType::Int64,
            Column::Float64(_) => DataType::Float64,
            Column::Utf8(_) => DataType::Utf8,
        }
    }

    /// Exact size of this column's wire buffer: 8 bytes per fixed-width
    /// value, a 4-byte length prefix plus the payload per string value.
    pub fn byte_size(&self) -> usize {
        match self {
            Column::Int64(v) => v.len() * 8,
            Column::Float64(v) => v.len() * 8,
            Column::Utf8(v) => v.iter().map(|s| 4 + s.len()).sum(),
        }
    }

    /// Copy out `len` values starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Column {
        match self {
            Column::Int64(v) => Column::Int64(v[offset..offset + len].to_vec()),
            Column::Float64(v) => Column::Float64(v[offset..offset + len].to_vec()),
            Column::Utf8(v) => Column::Utf8(v[offset..offset + len].to_vec()),
        }
    }
}

/// One chunk of rows sharing a schema, the unit of streaming transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    schema: Schema,
    columns: Vec<Column>,
}

impl RowBatch {
    /// Build a batch, validating that columns match the schema in count and
    /// type and that every column has the same length.
    pub fn try_new(schema: Schema, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.fields.len() {
            return Err(ClientError::InvalidBatch(format!(
                "schema has {} fields but {} columns were given",
                schema.fields.len(),
                columns.len()
            )));
        }
        for (field, column) in schema.fields.iter().zip(&columns) {
            if field.data_type != column.data_type() {
                return Err(ClientError::InvalidBatch(format!(
                    "column `{}` is {:?} but schema declares {:?}",
                    field.name,
                    column.data_type(),
                    field.data_type
                )));
            }
        }
        if let Some(first) = columns.first() {
            let rows = first.len();
            for (field, column) in schema.fields.iter().zip(&columns) {
                if column.len() != rows {
                    return Err(ClientError::InvalidBatch(format!(
                        "column `{}` has {} rows, expected {}",
                        field.name,
                        column.len(),
                        rows
                    )));
                }
            }
        }
        Ok(RowBatch { schema, columns })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Sum of the column buffer sizes.
    pub fn byte_size(&self) -> usize {
        self.columns.iter().map(Column::byte_size).sum()
    }

    /// Copy out a row range as a new batch.
    pub fn slice(&self, offset: usize, len: usize) -> RowBatch {
        RowBatch {
            schema: self.schema.clone(),
            columns: self.columns.iter().map(|c| c.slice(offset, len)).collect(),
        }
    }
}

/// A complete in-memory tabular dataset, the input to whole-table writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    batch: RowBatch,
}

impl Table {
    pub fn try_new(schema: Schema, columns: Vec<Column>) -> Result<Self> {
        Ok(Table {
            batch: RowBatch::try_new(schema, columns)?,
        })
    }

    pub fn from_batch(batch: RowBatch) -> Self {
        Table { batch }
    }

    pub fn schema(&self) -> &Schema {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn byte_size(&self) -> usize {
        self.batch.byte_size()
    }

    /// Split the table into batches of at most `chunk_size` rows.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn chunks(&self, chunk_size: usize) -> impl Iterator<Item = RowBatch> + '_ {
        assert!(chunk_size > 0, "chunk size must be positive");
        let rows = self.num_rows();
        (0..rows)
            .step_by(chunk_size)
            .map(move |offset| self.batch.slice(offset, chunk_size.min(rows - offset)))
    }
}

/// Accounting summary of a completed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferResult {
    pub rows: u64,
    pub bytes: u64,
}
