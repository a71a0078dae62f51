//! Parquet writer.
//!
//! Every column is `OPTIONAL` with a physical type taken from
//! [`Frame::column_type`]. A frame is written as a single row group.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parquet::basic::{BrotliLevel, Compression, GzipLevel, LogicalType, Repetition, Type as PhysicalType};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::Type;
use tracing::debug;

use super::{ExportError, ParquetCompression, write_atomically};
use crate::frame::{Cell, ColumnType, Frame};

impl From<ParquetCompression> for Compression {
    fn from(codec: ParquetCompression) -> Self {
        match codec {
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Brotli => Compression::BROTLI(BrotliLevel::default()),
            ParquetCompression::None => Compression::UNCOMPRESSED,
        }
    }
}

/// Writes `frame` as a single-row-group Parquet file.
///
/// # Errors
///
/// Returns [`ExportError::Parquet`] or [`ExportError::Io`] on failure; `path`
/// is left untouched in that case.
pub fn write_parquet(
    frame: &Frame,
    path: &Path,
    compression: ParquetCompression,
) -> Result<(), ExportError> {
    write_atomically(path, |file, tmp| {
        write_file(frame, file, compression).map_err(|source| ExportError::Parquet {
            path: tmp.to_path_buf(),
            source,
        })?;
        Ok(())
    })?;
    debug!(path = %path.display(), rows = frame.len(), %compression, "parquet written");
    Ok(())
}

fn write_file(frame: &Frame, file: File, compression: ParquetCompression) -> Result<(), ParquetError> {
    let types: Vec<ColumnType> = (0..frame.columns().len())
        .map(|index| frame.column_type(index))
        .collect();
    let schema = Arc::new(build_schema(frame.columns(), &types)?);
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(compression.into())
            .build(),
    );

    let mut writer = SerializedFileWriter::new(file, schema, props)?;
    let mut row_group = writer.next_row_group()?;
    let mut index = 0;
    while let Some(mut column) = row_group.next_column()? {
        let ty = types.get(index).copied().unwrap_or(ColumnType::Text);
        write_column(column.untyped(), frame.column_cells(index), ty)?;
        column.close()?;
        index += 1;
    }
    row_group.close()?;
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(())
}

fn build_schema(columns: &[String], types: &[ColumnType]) -> Result<Type, ParquetError> {
    let fields = columns
        .iter()
        .zip(types)
        .map(|(name, ty)| {
            let builder = match ty {
                ColumnType::Int => Type::primitive_type_builder(name, PhysicalType::INT64),
                ColumnType::Float => Type::primitive_type_builder(name, PhysicalType::DOUBLE),
                ColumnType::Bool => Type::primitive_type_builder(name, PhysicalType::BOOLEAN),
                ColumnType::Text => Type::primitive_type_builder(name, PhysicalType::BYTE_ARRAY)
                    .with_logical_type(Some(LogicalType::String)),
            };
            builder
                .with_repetition(Repetition::OPTIONAL)
                .build()
                .map(Arc::new)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Type::group_type_builder("schema").with_fields(fields).build()
}

/// Writes one column: non-null values plus a definition level per row.
#[allow(clippy::cast_precision_loss)]
fn write_column<'a>(
    writer: &mut ColumnWriter<'_>,
    cells: impl Iterator<Item = &'a Cell>,
    ty: ColumnType,
) -> Result<(), ParquetError> {
    let cells: Vec<&Cell> = cells.collect();
    let levels: Vec<i16> = cells.iter().map(|cell| i16::from(!cell.is_null())).collect();

    match (writer, ty) {
        (ColumnWriter::Int64ColumnWriter(w), ColumnType::Int) => {
            let values: Vec<i64> = cells
                .iter()
                .filter_map(|cell| match cell {
                    Cell::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            w.write_batch(&values, Some(&levels), None)?;
        }
        (ColumnWriter::DoubleColumnWriter(w), ColumnType::Float) => {
            let values: Vec<f64> = cells
                .iter()
                .filter_map(|cell| match cell {
                    Cell::Int(i) => Some(*i as f64),
                    Cell::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            w.write_batch(&values, Some(&levels), None)?;
        }
        (ColumnWriter::BoolColumnWriter(w), ColumnType::Bool) => {
            let values: Vec<bool> = cells
                .iter()
                .filter_map(|cell| match cell {
                    Cell::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            w.write_batch(&values, Some(&levels), None)?;
        }
        (ColumnWriter::ByteArrayColumnWriter(w), ColumnType::Text) => {
            let values: Vec<ByteArray> = cells
                .iter()
                .filter(|cell| !cell.is_null())
                .map(|cell| ByteArray::from(cell.to_string().into_bytes()))
                .collect();
            w.write_batch(&values, Some(&levels), None)?;
        }
        (_, ty) => {
            return Err(ParquetError::General(format!(
                "column writer does not match column type {ty:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    use super::*;

    fn read_rows(path: &Path) -> Vec<Value> {
        let reader = SerializedFileReader::new(File::open(path).unwrap()).unwrap();
        reader
            .get_row_iter(None)
            .unwrap()
            .map(|row| row.unwrap().to_json_value())
            .collect()
    }

    fn physical_types(path: &Path) -> Vec<PhysicalType> {
        let reader = SerializedFileReader::new(File::open(path).unwrap()).unwrap();
        let schema = reader.metadata().file_metadata().schema_descr_ptr();
        schema.columns().iter().map(|c| c.physical_type()).collect()
    }

    fn mixed_frame() -> Frame {
        let mut frame = Frame::new(vec![
            "area".into(),
            "year".into(),
            "value".into(),
            "flag".into(),
            "mixed".into(),
        ]);
        frame.push_row(vec![
            Cell::Text("Chad".into()),
            Cell::Int(2020),
            Cell::Float(5.5),
            Cell::Bool(true),
            Cell::Int(1),
        ]);
        frame.push_row(vec![
            Cell::Text("France".into()),
            Cell::Null,
            Cell::Int(3),
            Cell::Null,
            Cell::Text("a".into()),
        ]);
        frame
    }

    #[test]
    fn test_write_parquet_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.parquet");
        write_parquet(&mixed_frame(), &path, ParquetCompression::Snappy).unwrap();

        let rows = read_rows(&path);
        assert_eq!(
            rows,
            vec![
                json!({"area": "Chad", "year": 2020, "value": 5.5, "flag": true, "mixed": "1"}),
                json!({"area": "France", "year": null, "value": 3.0, "flag": null, "mixed": "a"}),
            ]
        );
    }

    #[test]
    fn test_write_parquet_column_types() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.parquet");
        write_parquet(&mixed_frame(), &path, ParquetCompression::None).unwrap();

        assert_eq!(
            physical_types(&path),
            vec![
                PhysicalType::BYTE_ARRAY,
                PhysicalType::INT64,
                PhysicalType::DOUBLE,
                PhysicalType::BOOLEAN,
                PhysicalType::BYTE_ARRAY,
            ]
        );
    }

    #[test]
    fn test_write_parquet_declared_type_for_all_null_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.parquet");
        let mut frame = Frame::new(vec!["year".into()]);
        frame.push_row(vec![Cell::Null]);
        frame.declare_type(0, ColumnType::Int);
        write_parquet(&frame, &path, ParquetCompression::Snappy).unwrap();

        assert_eq!(physical_types(&path), vec![PhysicalType::INT64]);
        assert_eq!(read_rows(&path), vec![json!({"year": null})]);
    }

    #[test]
    fn test_write_parquet_every_codec() {
        let dir = TempDir::new().unwrap();
        for codec in [
            ParquetCompression::Snappy,
            ParquetCompression::Gzip,
            ParquetCompression::Brotli,
            ParquetCompression::None,
        ] {
            let path = dir.path().join(format!("{codec}.parquet"));
            write_parquet(&mixed_frame(), &path, codec).unwrap();
            assert_eq!(read_rows(&path).len(), 2, "codec {codec}");
        }
    }
}
