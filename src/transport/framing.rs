//! Conversion between row batches and wire frames.
//!
//! A data stream opens with a schema frame (JSON schema in `data_header`,
//! write descriptor attached when putting), followed by one frame per
//! batch: the row count in `data_header`, caller metadata in
//! `app_metadata`, and the column buffers in `data_body`, each prefixed
//! with its big-endian `u32` length.

use super::grpc::proto::{flight_descriptor, FlightData, FlightDescriptor};
use crate::batch::{Column, DataType, RowBatch, Schema};
use crate::error::{ClientError, Result};

/// Opening frame of a stream: schema only, no rows.
pub(crate) fn schema_frame(descriptor: Option<Vec<u8>>, schema: &Schema) -> Result<FlightData> {
    Ok(FlightData {
        flight_descriptor: descriptor.map(|cmd| FlightDescriptor {
            r#type: flight_descriptor::DescriptorType::Cmd as i32,
            cmd,
            path: Vec::new(),
        }),
        data_header: serde_json::to_vec(schema)?,
        app_metadata: Vec::new(),
        data_body: Vec::new(),
    })
}

pub(crate) fn decode_schema(frame: &FlightData) -> Result<Schema> {
    serde_json::from_slice(&frame.data_header)
        .map_err(|e| ClientError::Decode(format!("schema frame: {}", e)))
}

pub(crate) fn batch_frame(batch: &RowBatch, app_metadata: &[u8]) -> FlightData {
    let mut body = Vec::with_capacity(batch.byte_size() + 4 * batch.columns().len());
    for column in batch.columns() {
        let buffer = encode_column(column);
        body.extend_from_slice(&(buffer.len() as u32).to_be_bytes());
        body.extend_from_slice(&buffer);
    }
    FlightData {
        flight_descriptor: None,
        data_header: (batch.num_rows() as u32).to_be_bytes().to_vec(),
        app_metadata: app_metadata.to_vec(),
        data_body: body,
    }
}

pub(crate) fn decode_batch(schema: &Schema, frame: &FlightData) -> Result<RowBatch> {
    let header: [u8; 4] = frame
        .data_header
        .as_slice()
        .try_into()
        .map_err(|_| ClientError::Decode("batch frame is missing its row count".into()))?;
    let rows = u32::from_be_bytes(header) as usize;

    let body = frame.data_body.as_slice();
    let mut offset = 0;
    let mut columns = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        if body.len() < offset + 4 {
            return Err(ClientError::Decode(format!(
                "batch frame ends before column `{}`",
                field.name
            )));
        }
        let len = u32::from_be_bytes(body[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        if body.len() < offset + len {
            return Err(ClientError::Decode(format!(
                "column `{}` buffer shorter than its declared length",
                field.name
            )));
        }
        columns.push(decode_column(
            field.data_type,
            rows,
            &body[offset..offset + len],
            &field.name,
        )?);
        offset += len;
    }
    if offset != body.len() {
        return Err(ClientError::Decode(format!(
            "batch frame has {} trailing bytes",
            body.len() - offset
        )));
    }

    RowBatch::try_new(schema.clone(), columns)
}

fn encode_column(column: &Column) -> Vec<u8> {
    match column {
        Column::Int64(values) => {
            let mut buffer = Vec::with_capacity(values.len() * 8);
            for v in values {
                buffer.extend_from_slice(&v.to_be_bytes());
            }
            buffer
        }
        Column::Float64(values) => {
            let mut buffer = Vec::with_capacity(values.len() * 8);
            for v in values {
                buffer.extend_from_slice(&v.to_be_bytes());
            }
            buffer
        }
        Column::Utf8(values) => {
            let mut buffer = Vec::with_capacity(column.byte_size());
            for v in values {
                buffer.extend_from_slice(&(v.len() as u32).to_be_bytes());
                buffer.extend_from_slice(v.as_bytes());
            }
            buffer
        }
    }
}

fn decode_column(data_type: DataType, rows: usize, buffer: &[u8], name: &str) -> Result<Column> {
    match data_type {
        DataType::Int64 | DataType::Float64 => {
            let expected = rows.saturating_mul(8);
            if buffer.len() != expected {
                return Err(ClientError::Decode(format!(
                    "column `{}` has {} bytes, expected {} for {} rows",
                    name,
                    buffer.len(),
                    expected,
                    rows
                )));
            }
            let values = buffer.chunks_exact(8).map(|c| c.try_into().unwrap());
            Ok(match data_type {
                DataType::Int64 => Column::Int64(values.map(i64::from_be_bytes).collect()),
                _ => Column::Float64(values.map(f64::from_be_bytes).collect()),
            })
        }
        DataType::Utf8 => {
            // Every value carries a 4-byte length prefix, so the buffer
            // bounds the row count. Checked before reserving anything: the
            // count comes off the wire.
            if buffer.len() < rows.saturating_mul(4) {
                return Err(ClientError::Decode(format!(
                    "column `{}` has {} bytes, too few for {} rows",
                    name,
                    buffer.len(),
                    rows
                )));
            }
            let mut values = Vec::with_capacity(rows);
            let mut offset = 0;
            while offset < buffer.len() {
                if buffer.len() < offset + 4 {
                    return Err(ClientError::Decode(format!(
                        "column `{}` has a truncated length prefix",
                        name
                    )));
                }
                let len =
                    u32::from_be_bytes(buffer[offset..offset + 4].try_into().unwrap()) as usize;
                offset += 4;
                if buffer.len() < offset + len {
                    return Err(ClientError::Decode(format!(
                        "column `{}` has a value shorter than its declared length",
                        name
                    )));
                }
                let value = std::str::from_utf8(&buffer[offset..offset + len])
                    .map_err(|e| {
                        ClientError::Decode(format!("column `{}` is not UTF-8: {}", name, e))
                    })?;
                values.push(value.to_string());
                offset += len;
            }
            if values.len() != rows {
                return Err(ClientError::Decode(format!(
                    "column `{}` has {} values, expected {}",
                    name,
                    values.len(),
                    rows
                )));
            }
            Ok(Column::Utf8(values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Field;

    fn sample_batch() -> RowBatch {
        RowBatch::try_new(
            Schema::new(vec![
                Field::new("id", DataType::Int64),
                Field::new("score", DataType::Float64),
                Field::new("label", DataType::Utf8),
            ]),
            vec![
                Column::Int64(vec![1, -2, i64::MAX]),
                Column::Float64(vec![0.5, -1.25, 2e300]),
                Column::Utf8(vec!["a".into(), "".into(), "longer value".into()]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_schema_frame_round_trip() {
        let batch = sample_batch();
        let frame = schema_frame(Some(b"ticket-wire".to_vec()), batch.schema()).unwrap();
        assert_eq!(
            frame.flight_descriptor.as_ref().unwrap().cmd,
            b"ticket-wire".to_vec()
        );
        assert!(frame.data_body.is_empty());
        assert_eq!(&decode_schema(&frame).unwrap(), batch.schema());
    }

    #[test]
    fn test_batch_frame_round_trip() {
        let batch = sample_batch();
        let frame = batch_frame(&batch, b"meta");
        assert_eq!(frame.app_metadata, b"meta".to_vec());
        let decoded = decode_batch(batch.schema(), &frame).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_body_size_matches_batch_accounting() {
        let batch = sample_batch();
        let frame = batch_frame(&batch, &[]);
        // One u32 length prefix per column on top of the buffers themselves.
        assert_eq!(
            frame.data_body.len(),
            batch.byte_size() + 4 * batch.columns().len()
        );
    }

    #[test]
    fn test_truncated_body_rejected() {
        let batch = sample_batch();
        let mut frame = batch_frame(&batch, &[]);
        frame.data_body.truncate(frame.data_body.len() - 1);
        assert!(decode_batch(batch.schema(), &frame).is_err());
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let batch = sample_batch();
        let mut frame = batch_frame(&batch, &[]);
        frame.data_header = 2u32.to_be_bytes().to_vec();
        assert!(decode_batch(batch.schema(), &frame).is_err());
    }

    #[test]
    fn test_absurd_row_count_rejected_without_allocating() {
        let schema = Schema::new(vec![Field::new("label", DataType::Utf8)]);
        let batch =
            RowBatch::try_new(schema.clone(), vec![Column::Utf8(vec!["x".into()])]).unwrap();
        let mut frame = batch_frame(&batch, &[]);
        // A frame claiming u32::MAX rows must fail cleanly, not reserve
        // gigabytes for the claimed count.
        frame.data_header = u32::MAX.to_be_bytes().to_vec();
        assert!(matches!(
            decode_batch(&schema, &frame).unwrap_err(),
            ClientError::Decode(_)
        ));
    }

    #[test]
    fn test_garbage_schema_frame_rejected() {
        let frame = FlightData {
            flight_descriptor: None,
            data_header: b"not json".to_vec(),
            app_metadata: Vec::new(),
            data_body: Vec::new(),
        };
        assert!(matches!(
            decode_schema(&frame).unwrap_err(),
            ClientError::Decode(_)
        ));
    }
}
